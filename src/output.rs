//! Rendering of command results for the terminal.
//!
//! JSON output is the serialized response body. Text output is a plain
//! table that keeps the column order of the result.

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::db::RowRecord;
use crate::error::GatewayError;
use crate::gateway::{AskResponse, ErrorBody};
use crate::safety::ApprovedStatement;

/// Body printed for a successful `check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResponse {
    pub sql: String,
    pub verb: String,
}

impl From<&ApprovedStatement> for CheckResponse {
    fn from(statement: &ApprovedStatement) -> Self {
        Self {
            sql: statement.as_str().to_string(),
            verb: statement.verb().to_string(),
        }
    }
}

/// Renders an answered question.
pub fn render_ask(response: &AskResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(response),
        OutputFormat::Text => {
            let mut out = format!("{}\n\n", response.sql);
            out.push_str(&render_table(&response.rows));
            out
        }
    }
}

/// Renders an approved statement.
pub fn render_check(response: &CheckResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(response),
        OutputFormat::Text => format!("approved ({}): {}", response.verb, response.sql),
    }
}

/// Renders a failed request.
pub fn render_error(err: &GatewayError, format: OutputFormat) -> String {
    let body = ErrorBody::from(err);
    match format {
        OutputFormat::Json => to_json(&body),
        OutputFormat::Text => format!("error [{}]: {}", body.code, body.message),
    }
}

/// Formats rows as an aligned text table with a trailing row count.
pub fn render_table(rows: &[RowRecord]) -> String {
    let Some(first) = rows.first() else {
        return "(0 rows)".to_string();
    };

    let headers: Vec<String> = first.columns().map(str::to_string).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|(_, v)| v.to_display_string()).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(&headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(cells.iter().map(|row| format_line(row)));

    let noun = if rows.len() == 1 { "row" } else { "rows" };
    lines.push(format!("({} {noun})", rows.len()));
    lines.join("\n")
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"status":"internal","message":"{e}"}}"#))
}
