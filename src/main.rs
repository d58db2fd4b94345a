//! sqlgate - ask a database questions in plain language, safely.

use sqlgate::cli::{Cli, Command, OutputFormat};
use sqlgate::config::Config;
use sqlgate::db::MockDatabaseClient;
use sqlgate::error::Result;
use sqlgate::gateway::{AskRequest, Gateway};
use sqlgate::logging;
use sqlgate::output::{self, CheckResponse};
use sqlgate::safety::{DeclaredIntent, Policy};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: could not load .env: {e}");
        }
    }

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    let format = match cli.parse_output_format() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli, format).await {
        error!("{}: {}", e.category(), e);
        println!("{}", output::render_error(&e, format));
        std::process::exit(e.status().exit_code());
    }
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config)?;

    match &cli.command {
        Command::Check { sql, op } => {
            let policy = Policy::from_config(&config.policy)?;
            let intent = DeclaredIntent::parse_optional(op.as_deref())?;
            let approved = policy.validate(sql, intent).into_result()?;
            println!(
                "{}",
                output::render_check(&CheckResponse::from(&approved), format)
            );
        }
        Command::Ask { question, op } => {
            let gateway = build_gateway(&cli, &config).await?;
            let request = AskRequest {
                question: question.clone(),
                op: op.clone(),
            };

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling request");
                    interrupt.cancel();
                }
            });

            let response = gateway.ask(&request, &cancel).await?;
            println!("{}", output::render_ask(&response, format));
        }
        Command::Health => {
            build_gateway(&cli, &config).await?.health().await?;
            match format {
                OutputFormat::Json => println!(r#"{{"status":"ok"}}"#),
                OutputFormat::Text => println!("ok"),
            }
        }
    }

    Ok(())
}

async fn build_gateway(cli: &Cli, config: &Config) -> Result<Gateway> {
    let gateway = if cli.mock_db {
        Gateway::with_mock_store(config, MockDatabaseClient::new())?
    } else {
        Gateway::from_config(config).await?
    };
    info!("Policy: {}", gateway.policy().name());
    Ok(gateway)
}
