//! Statement normalization and policy validation.
//!
//! Takes untrusted SQL text from the generator plus the caller's declared
//! intent and either approves a single, normalized statement or rejects it
//! with a stable reason code. Nothing in this module performs I/O.

mod policy;
mod scanner;
mod validator;

pub use policy::{Policy, PolicyConfig, PolicyPreset, ScanMode};
pub use validator::normalize;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A leading SQL verb that a policy can permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
}

impl Verb {
    /// All verbs, in declaration order.
    pub const ALL: [Verb; 4] = [Verb::Select, Verb::Insert, Verb::Update, Verb::Delete];

    /// Returns the verb as an uppercase SQL keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Matches a SQL word against the verbs, ignoring case.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.keyword().eq_ignore_ascii_case(word))
    }

    /// True for verbs that change data.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Select)
    }

    /// True when an approved statement with this verb must carry a WHERE clause.
    pub fn requires_where(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The operation category the caller says the statement must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclaredIntent {
    /// Any verb the policy permits.
    #[default]
    Auto,
    /// Exactly this verb.
    Verb(Verb),
}

impl DeclaredIntent {
    /// Parses an optional intent string from a request. Absent means `Auto`.
    pub fn parse_optional(op: Option<&str>) -> std::result::Result<Self, Rejection> {
        match op.map(str::trim) {
            None | Some("") => Ok(Self::Auto),
            Some(s) => s.parse(),
        }
    }

    /// Returns the specific verb, if any.
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Self::Auto => None,
            Self::Verb(v) => Some(*v),
        }
    }

    /// Returns the intent as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Verb(Verb::Select) => "select",
            Self::Verb(Verb::Insert) => "insert",
            Self::Verb(Verb::Update) => "update",
            Self::Verb(Verb::Delete) => "delete",
        }
    }
}

impl FromStr for DeclaredIntent {
    type Err = Rejection;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        Verb::from_keyword(s).map(Self::Verb).ok_or_else(|| {
            Rejection::new(
                ReasonCode::UnsupportedOperation,
                format!("Unknown operation '{s}'. Expected auto, select, insert, update or delete"),
            )
        })
    }
}

impl fmt::Display for DeclaredIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable reason codes carried by every rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// More than one statement, or a semicolon that cannot be ruled out as a separator.
    MultiStatement,
    /// The leading verb is missing or not the expected one.
    WrongVerb,
    /// A forbidden keyword appears somewhere in the statement.
    ForbiddenVerb,
    /// UPDATE or DELETE without a WHERE clause.
    MissingWhere,
    /// The declared intent is not something this policy permits.
    UnsupportedOperation,
}

impl ReasonCode {
    /// Returns the code as it appears in responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiStatement => "MULTI_STATEMENT",
            Self::WrongVerb => "WRONG_VERB",
            Self::ForbiddenVerb => "FORBIDDEN_VERB",
            Self::MissingWhere => "MISSING_WHERE",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy rejection: reason code plus a human-readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct Rejection {
    pub code: ReasonCode,
    pub message: String,
}

impl Rejection {
    /// Creates a rejection with the given code and message.
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A statement that passed every guard of the policy that approved it.
///
/// Only the validator can construct one, so the execution adapter can never
/// be handed text that skipped validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedStatement {
    sql: String,
    verb: Verb,
}

impl ApprovedStatement {
    pub(crate) fn new(sql: String, verb: Verb) -> Self {
        Self { sql, verb }
    }

    /// The normalized statement text, exactly as it will be executed.
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// The statement's leading verb.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Consumes the statement, returning its text.
    pub fn into_sql(self) -> String {
        self.sql
    }
}

impl fmt::Display for ApprovedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Result of validating a candidate statement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum ValidationOutcome {
    Approved(ApprovedStatement),
    Rejected(Rejection),
}

impl ValidationOutcome {
    /// Returns true if the statement was approved.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved(_))
    }

    /// Returns the rejection reason code, if rejected.
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Approved(_) => None,
            Self::Rejected(rejection) => Some(rejection.code),
        }
    }

    /// Converts the outcome into a `Result` for `?` propagation.
    pub fn into_result(self) -> std::result::Result<ApprovedStatement, Rejection> {
        match self {
            Self::Approved(statement) => Ok(statement),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}
