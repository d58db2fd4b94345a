//! Surface scanning of a normalized statement.
//!
//! Extracts the signals the guards work on: the leading word, every bare
//! word, and whether a statement separator is present. No grammar is
//! parsed; `sqlparser`'s tokenizer is only used to tell literals and
//! comments apart from code.

use std::sync::OnceLock;

use regex::Regex;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::ScanMode;

/// Signals extracted from a statement body (trailing semicolon already removed).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ScannedStatement {
    /// Uppercased first word, if the statement starts with one.
    pub leading: Option<String>,
    /// Every bare word, uppercased, in order of appearance.
    pub words: Vec<String>,
    /// True if a `;` separator remains in the body.
    pub has_separator: bool,
}

impl ScannedStatement {
    /// Returns the first word from `keywords` that appears in the statement.
    pub fn find_any<'a, I>(&self, keywords: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.words
            .iter()
            .find(|w| keywords.clone().into_iter().any(|k| k == w.as_str()))
            .map(String::as_str)
    }

    /// True if the word appears anywhere in the statement.
    pub fn contains(&self, keyword: &str) -> bool {
        self.words.iter().any(|w| w == keyword)
    }
}

/// Scans a statement body with the given mode.
///
/// Returns an error message when the token-aware mode cannot tokenize the
/// body, which callers must treat as a rejection.
pub(crate) fn scan(body: &str, mode: ScanMode) -> Result<ScannedStatement, String> {
    match mode {
        ScanMode::Lexical => Ok(scan_lexical(body)),
        ScanMode::TokenAware => scan_tokens(body),
    }
}

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("word pattern is valid"))
}

/// Raw-text scan: every `\w+` run is a word and every `;` is a separator.
///
/// Words inside literals and comments count too, which errs toward rejection.
fn scan_lexical(body: &str) -> ScannedStatement {
    let mut leading = None;
    let mut words = Vec::new();

    for m in word_pattern().find_iter(body) {
        let word = m.as_str().to_uppercase();
        if m.start() == 0 {
            leading = Some(word.clone());
        }
        words.push(word);
    }

    ScannedStatement {
        leading,
        words,
        has_separator: body.contains(';'),
    }
}

/// Token scan: string literals, quoted identifiers and comments are skipped.
///
/// Used for every scan in token-aware mode, and for the mandatory-clause
/// check in both modes.
pub(crate) fn scan_tokens(body: &str) -> Result<ScannedStatement, String> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, body)
        .tokenize()
        .map_err(|e| format!("Statement could not be tokenized: {e}"))?;

    let mut scanned = ScannedStatement::default();
    let mut seen_significant = false;

    for token in &tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => continue,
            Token::SemiColon => scanned.has_separator = true,
            Token::Word(word) if word.quote_style.is_none() => {
                let upper = word.value.to_uppercase();
                if !seen_significant {
                    scanned.leading = Some(upper.clone());
                }
                scanned.words.push(upper);
            }
            _ => {}
        }
        seen_significant = true;
    }

    Ok(scanned)
}
