//! Bracketed status report printed on stdout for an external controller.

use serde::Serialize;

use crate::supervisor::ChildProcessRecord;

pub const START_SENTINEL: &str = "<<<START_INFO>>>";
pub const END_SENTINEL: &str = "<<<END_INFO>>>";

#[derive(Debug, Serialize)]
struct ErrorReport<'a> {
    error: &'a str,
}

fn bracket(body: &str) -> String {
    format!("{START_SENTINEL}\n{body}\n{END_SENTINEL}\n")
}

/// Launched children as a pretty JSON array between the sentinels.
pub fn render_records(records: &[ChildProcessRecord]) -> Result<String, serde_json::Error> {
    Ok(bracket(&serde_json::to_string_pretty(records)?))
}

/// A single `{"error": ...}` object between the sentinels.
pub fn render_error(message: &str) -> String {
    let body = serde_json::to_string_pretty(&ErrorReport { error: message })
        .unwrap_or_else(|_| r#"{"error": "unreportable error"}"#.to_string());
    bracket(&body)
}
