//! Response parsing for generator outputs.
//!
//! Extracts the candidate SQL from a response that may wrap it in a
//! markdown code block. The result is untrusted and goes straight to the
//! validator.

/// Returns the candidate statement contained in a generator response.
///
/// Looks for SQL in the following formats, first match wins:
/// - ```sql ... ```
/// - ``` ... ``` (no language specified)
///
/// Without a usable code block the whole response, trimmed, is the candidate.
pub fn extract_candidate(response: &str) -> String {
    extract_code_block(response, "sql")
        .or_else(|| extract_code_block(response, ""))
        .unwrap_or(response)
        .trim()
        .to_string()
}

/// Extracts content from the first markdown code block with the given language.
///
/// Pass an empty string for `lang` to match blocks without a language specifier.
fn extract_code_block<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find("```") {
        let fence = search_from + offset;
        let after_fence = fence + 3;
        let line_end = after_fence + text[after_fence..].find('\n')?;
        let info = text[after_fence..line_end].trim();

        let content_start = line_end + 1;
        let content_len = text[content_start..].find("```")?;
        let block_end = content_start + content_len + 3;

        if info.eq_ignore_ascii_case(lang) {
            return Some(&text[content_start..content_start + content_len]);
        }
        search_from = block_end;
    }

    None
}
