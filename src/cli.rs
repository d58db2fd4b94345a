//! Command-line argument parsing for sqlgate.

use crate::config::{Config, ConnectionConfig};
use crate::error::Result;
use crate::safety::PolicyPreset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table or message.
    #[default]
    Text,
    /// JSON body, one document per invocation.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Ask a database questions in plain language, safely.
#[derive(Parser, Debug)]
#[command(name = "sqlgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// PostgreSQL connection string (overrides DATABASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,

    /// Policy preset: read_only or limited_write
    #[arg(long, global = true, value_name = "PRESET")]
    pub policy: Option<String>,

    /// Generator provider: openai or mock
    #[arg(long, global = true, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Generator model name (overrides MODEL_NAME)
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Statement timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Use the in-memory mock store instead of PostgreSQL
    #[arg(long, global = true)]
    pub mock_db: bool,

    /// Output format: text or json
    #[arg(long, global = true, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// What to do.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Turn a question into SQL, validate it and run it
    Ask {
        /// The natural-language question
        question: String,
        /// Declared intent: auto, select, insert, update or delete
        #[arg(long, value_name = "OP")]
        op: Option<String>,
    },
    /// Validate a SQL statement without running it
    Check {
        /// The statement to validate
        sql: String,
        /// Declared intent: auto, select, insert, update or delete
        #[arg(long, value_name = "OP")]
        op: Option<String>,
    },
    /// Run SELECT 1 against the store
    Health,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.output.parse()
    }

    /// Applies CLI flags on top of file and environment configuration.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(url) = &self.database_url {
            config.database = Some(ConnectionConfig::from_connection_string(url)?);
        }
        if let Some(policy) = &self.policy {
            config.policy.preset = policy.parse::<PolicyPreset>()?;
        }
        if let Some(provider) = &self.llm {
            config.llm.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(secs) = self.timeout {
            config.execution.timeout_secs = secs;
        }
        Ok(())
    }
}
