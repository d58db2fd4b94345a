//! Policy configuration.
//!
//! A policy is plain data: which leading verbs are permitted, which keywords
//! may not appear anywhere, whether a permitted mutation may carry a second
//! kind of mutation, and how the statement is scanned. Strict
//! read-only and limited-write deployments are two instances of the same
//! validator, never two code paths.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

use super::{DeclaredIntent, ReasonCode, Rejection, Verb};

/// Keywords blocked by the read-only preset.
const READ_ONLY_FORBIDDEN: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "REPLACE",
];

/// Keywords blocked by the limited-write preset.
const LIMITED_WRITE_FORBIDDEN: &[&str] = &["DROP", "TRUNCATE", "ALTER"];

/// How the statement body is scanned for separators and keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Raw text. Semicolons and keywords inside literals or comments count.
    #[default]
    Lexical,
    /// Tokenized. Literals, quoted identifiers and comments are skipped;
    /// text that cannot be tokenized is rejected.
    TokenAware,
}

/// Named policy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    /// SELECT only; all DML and DDL keywords forbidden.
    #[default]
    ReadOnly,
    /// SELECT, INSERT, UPDATE and DELETE; destructive DDL forbidden.
    LimitedWrite,
}

impl PolicyPreset {
    /// Returns the preset as a string for display and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::LimitedWrite => "limited_write",
        }
    }

    fn permitted(&self) -> &'static [Verb] {
        match self {
            Self::ReadOnly => &[Verb::Select],
            Self::LimitedWrite => &Verb::ALL,
        }
    }

    fn forbidden(&self) -> &'static [&'static str] {
        match self {
            Self::ReadOnly => READ_ONLY_FORBIDDEN,
            Self::LimitedWrite => LIMITED_WRITE_FORBIDDEN,
        }
    }

    /// Both presets keep DML keywords out of statements led by another verb.
    fn forbids_cross_mutation(&self) -> bool {
        match self {
            Self::ReadOnly | Self::LimitedWrite => true,
        }
    }
}

impl FromStr for PolicyPreset {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(Self::ReadOnly),
            "limited_write" | "write" => Ok(Self::LimitedWrite),
            _ => Err(GatewayError::config(format!(
                "Unknown policy '{s}'. Expected 'read_only' or 'limited_write'"
            ))),
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy section of the configuration file.
///
/// ```toml
/// [policy]
/// preset = "limited_write"
/// forbidden = ["drop", "truncate", "alter", "grant"]
/// forbid_cross_mutation = false
/// scan = "token_aware"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Starting point for permitted and forbidden sets.
    #[serde(default)]
    pub preset: PolicyPreset,

    /// Overrides the preset's permitted leading verbs.
    #[serde(default)]
    pub permitted: Option<Vec<Verb>>,

    /// Overrides the preset's forbidden keywords.
    #[serde(default)]
    pub forbidden: Option<Vec<String>>,

    /// Overrides whether INSERT, UPDATE and DELETE are also forbidden in a
    /// statement led by a different verb.
    #[serde(default)]
    pub forbid_cross_mutation: Option<bool>,

    /// Scan mode.
    #[serde(default)]
    pub scan: ScanMode,
}

/// An immutable validation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    permitted: BTreeSet<Verb>,
    forbidden: BTreeSet<String>,
    cross_mutation: bool,
    scan_mode: ScanMode,
}

impl Policy {
    /// Builds a policy, checking that the sets are coherent.
    ///
    /// Only `forbidden` is scanned for; see [`Policy::with_cross_mutation`]
    /// to also keep other DML verbs out. Fails if nothing is permitted, if a
    /// forbidden keyword is not a single word, or if a permitted verb is
    /// also forbidden.
    pub fn new<I, S>(
        name: impl Into<String>,
        permitted: impl IntoIterator<Item = Verb>,
        forbidden: I,
        scan_mode: ScanMode,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let permitted: BTreeSet<Verb> = permitted.into_iter().collect();
        if permitted.is_empty() {
            return Err(GatewayError::config(format!(
                "Policy '{name}' permits no verbs"
            )));
        }

        let mut keywords = BTreeSet::new();
        for keyword in forbidden {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() || !keyword.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(GatewayError::config(format!(
                    "Forbidden keyword '{keyword}' in policy '{name}' must be a single word"
                )));
            }
            keywords.insert(keyword.to_uppercase());
        }

        if let Some(verb) = permitted.iter().find(|v| keywords.contains(v.keyword())) {
            return Err(GatewayError::config(format!(
                "Policy '{name}' both permits and forbids {verb}"
            )));
        }

        Ok(Self {
            name,
            permitted,
            forbidden: keywords,
            cross_mutation: false,
            scan_mode,
        })
    }

    /// Builds a policy from a preset with the default scan mode.
    pub fn preset(preset: PolicyPreset) -> Self {
        Self {
            name: preset.as_str().to_string(),
            permitted: preset.permitted().iter().copied().collect(),
            forbidden: preset.forbidden().iter().map(|k| k.to_string()).collect(),
            cross_mutation: preset.forbids_cross_mutation(),
            scan_mode: ScanMode::default(),
        }
    }

    /// SELECT-only policy.
    pub fn read_only() -> Self {
        Self::preset(PolicyPreset::ReadOnly)
    }

    /// SELECT/INSERT/UPDATE/DELETE with DROP, TRUNCATE and ALTER forbidden.
    pub fn limited_write() -> Self {
        Self::preset(PolicyPreset::LimitedWrite)
    }

    /// Builds a policy from its configuration section.
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        let base = Self::preset(config.preset);
        let permitted = config
            .permitted
            .clone()
            .map(|verbs| verbs.into_iter().collect())
            .unwrap_or(base.permitted);
        let forbidden: Vec<String> = config
            .forbidden
            .clone()
            .unwrap_or_else(|| base.forbidden.into_iter().collect());

        let cross_mutation = config
            .forbid_cross_mutation
            .unwrap_or(base.cross_mutation);

        let customized = config.permitted.is_some()
            || config.forbidden.is_some()
            || config.forbid_cross_mutation.is_some();
        let name = if customized {
            format!("{} (custom)", config.preset)
        } else {
            config.preset.to_string()
        };

        Ok(Self::new(name, permitted, forbidden, config.scan)?.with_cross_mutation(cross_mutation))
    }

    /// Returns a copy of this policy using the given scan mode.
    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    /// Returns a copy of this policy that also forbids every DML verb other
    /// than the one leading the statement, or stops doing so.
    pub fn with_cross_mutation(mut self, enabled: bool) -> Self {
        self.cross_mutation = enabled;
        self
    }

    /// Policy name, for logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permitted leading verbs.
    pub fn permitted(&self) -> &BTreeSet<Verb> {
        &self.permitted
    }

    /// Forbidden keywords, uppercased.
    pub fn forbidden(&self) -> &BTreeSet<String> {
        &self.forbidden
    }

    /// True if INSERT, UPDATE and DELETE are scanned for in statements led
    /// by another verb.
    pub fn forbids_cross_mutation(&self) -> bool {
        self.cross_mutation
    }

    /// Scan mode.
    pub fn scan_mode(&self) -> ScanMode {
        self.scan_mode
    }

    /// True if the verb may lead an approved statement.
    pub fn permits(&self, verb: Verb) -> bool {
        self.permitted.contains(&verb)
    }

    /// True when SELECT is the only permitted verb.
    pub fn is_read_only(&self) -> bool {
        self.permitted.len() == 1 && self.permits(Verb::Select)
    }

    /// Rejects a declared intent that names a verb this policy never permits.
    pub fn check_intent(&self, intent: DeclaredIntent) -> std::result::Result<(), Rejection> {
        match intent.verb() {
            Some(verb) if !self.permits(verb) => Err(Rejection::new(
                ReasonCode::UnsupportedOperation,
                format!(
                    "{verb} operations are not supported by this deployment. Permitted: {}",
                    self.permitted_list()
                ),
            )),
            _ => Ok(()),
        }
    }

    /// The operation the generator should be asked for.
    ///
    /// A read-only policy always asks for SELECT, whatever the caller declared.
    pub fn generator_target(&self, intent: DeclaredIntent) -> DeclaredIntent {
        if self.is_read_only() {
            DeclaredIntent::Verb(Verb::Select)
        } else {
            intent
        }
    }

    /// Permitted verbs as a comma-separated list, for messages.
    pub(crate) fn permitted_list(&self) -> String {
        self.permitted
            .iter()
            .map(Verb::keyword)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Keywords that may not appear in a statement approved with `verb`.
    ///
    /// The configured forbidden set, plus every mutating verb other than
    /// `verb` when cross-mutation scanning is on.
    pub(crate) fn forbidden_for(&self, verb: Verb) -> Vec<&str> {
        let mut keywords: Vec<&str> = self.forbidden.iter().map(String::as_str).collect();
        if !self.cross_mutation {
            return keywords;
        }
        for other in Verb::ALL {
            if other != verb && other.is_mutating() && !self.forbidden.contains(other.keyword()) {
                keywords.push(other.keyword());
            }
        }
        keywords
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::read_only()
    }
}
