//! Statement normalizer and policy validator.
//!
//! Guards run in a fixed order and stop at the first failure, so the
//! reported reason is deterministic:
//!
//! 1. intent (is the declared verb permitted at all?)
//! 2. normalize whitespace
//! 3. single statement
//! 4. leading verb
//! 5. forbidden keywords anywhere in the body
//! 6. mandatory WHERE for UPDATE and DELETE
//!
//! The scan mode decides how guards 3 and 5 read the text. Guard 6 always
//! reads tokens, so a `where` inside a literal or comment never satisfies it.

use tracing::{debug, warn};

use super::scanner::{scan, scan_tokens, ScannedStatement};
use super::{
    ApprovedStatement, DeclaredIntent, Policy, ReasonCode, Rejection, ScanMode,
    ValidationOutcome, Verb,
};

/// Collapses every whitespace run to a single space and trims both ends.
///
/// Idempotent: normalizing a normalized string returns it unchanged.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Policy {
    /// Validates an untrusted candidate statement against this policy.
    ///
    /// Pure: no I/O, no shared state, safe to call from any thread.
    pub fn validate(&self, raw: &str, intent: DeclaredIntent) -> ValidationOutcome {
        match self.run_guards(raw, intent) {
            Ok(statement) => {
                debug!(
                    policy = %self.name(),
                    verb = %statement.verb(),
                    sql = %statement,
                    "Statement approved"
                );
                ValidationOutcome::Approved(statement)
            }
            Err(rejection) => {
                warn!(
                    policy = %self.name(),
                    intent = %intent,
                    code = %rejection.code,
                    "Statement rejected: {}",
                    rejection.message
                );
                debug!(sql = %raw, "Rejected statement text");
                ValidationOutcome::Rejected(rejection)
            }
        }
    }

    fn run_guards(
        &self,
        raw: &str,
        intent: DeclaredIntent,
    ) -> Result<ApprovedStatement, Rejection> {
        self.check_intent(intent)?;

        let normalized = normalize(raw);
        let body = strip_trailing_semicolon(&normalized);

        let scanned = self.check_single_statement(body)?;
        let verb = self.check_leading_verb(&scanned, intent)?;
        self.check_forbidden(&scanned, verb)?;
        self.check_where(body, &scanned, verb)?;

        Ok(ApprovedStatement::new(body.to_string(), verb))
    }

    fn check_single_statement(&self, body: &str) -> Result<ScannedStatement, Rejection> {
        let scanned = scan(body, self.scan_mode())
            .map_err(|msg| Rejection::new(ReasonCode::MultiStatement, msg))?;

        if scanned.has_separator {
            return Err(Rejection::new(
                ReasonCode::MultiStatement,
                "Only a single SQL statement is allowed",
            ));
        }
        Ok(scanned)
    }

    fn check_leading_verb(
        &self,
        scanned: &ScannedStatement,
        intent: DeclaredIntent,
    ) -> Result<Verb, Rejection> {
        let expected = match intent.verb() {
            Some(verb) => verb.keyword().to_string(),
            None => self.permitted_list(),
        };

        let Some(leading) = scanned.leading.as_deref() else {
            let message = if scanned.words.is_empty() {
                "Empty SQL statement".to_string()
            } else {
                format!("Statement must start with {expected}")
            };
            return Err(Rejection::new(ReasonCode::WrongVerb, message));
        };

        let verb = Verb::from_keyword(leading).filter(|v| match intent.verb() {
            Some(declared) => *v == declared,
            None => self.permits(*v),
        });

        verb.ok_or_else(|| {
            let message = if self.is_read_only() {
                "This deployment is read-only. Only SELECT statements are allowed".to_string()
            } else {
                format!("Statement must start with {expected}, found {leading}")
            };
            Rejection::new(ReasonCode::WrongVerb, message)
        })
    }

    fn check_forbidden(&self, scanned: &ScannedStatement, verb: Verb) -> Result<(), Rejection> {
        let forbidden = self.forbidden_for(verb);
        match scanned.find_any(forbidden.iter().copied()) {
            Some(keyword) => {
                let message = if self.is_read_only() {
                    format!("Write/DDL operations are disabled. Found {keyword}")
                } else {
                    format!("{keyword} is not allowed in a {verb} statement")
                };
                Err(Rejection::new(ReasonCode::ForbiddenVerb, message))
            }
            None => Ok(()),
        }
    }

    fn check_where(
        &self,
        body: &str,
        scanned: &ScannedStatement,
        verb: Verb,
    ) -> Result<(), Rejection> {
        if !verb.requires_where() {
            return Ok(());
        }

        let has_where = match self.scan_mode() {
            ScanMode::TokenAware => scanned.contains("WHERE"),
            ScanMode::Lexical => scan_tokens(body)
                .map_err(|msg| {
                    Rejection::new(
                        ReasonCode::MissingWhere,
                        format!("WHERE clause could not be verified. {msg}"),
                    )
                })?
                .contains("WHERE"),
        };

        if !has_where {
            return Err(Rejection::new(
                ReasonCode::MissingWhere,
                format!("{verb} statements must include a WHERE clause"),
            ));
        }
        Ok(())
    }
}

/// Removes at most one trailing semicolon and the space before it.
fn strip_trailing_semicolon(normalized: &str) -> &str {
    normalized
        .strip_suffix(';')
        .map(str::trim_end)
        .unwrap_or(normalized)
}
