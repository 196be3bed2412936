//! Best-effort SQL extraction from oracle free text

use once_cell::sync::Lazy;
use regex::Regex;

/// A terminated SELECT where a statement can start: line start or after `:`
static TERMINATED_SELECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ims)(?:^|:)[ \t]*\r?\n?[ \t]*(SELECT\b[^;]*;)").expect("valid select regex")
});

static FENCED_SELECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```[A-Za-z]*\s*(SELECT\b.*?)\s*```").expect("valid fenced select regex")
});

static LINE_START_SELECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^[ \t]*(SELECT\b.*)\z").expect("valid line select regex"));

/// Pull a single SELECT statement out of free text.
///
/// Tried in order: a fenced block starting with SELECT, the first
/// `SELECT ... ;` opening a line or following a colon, an upper-case
/// `SELECT` at the start of a line running to the end of the text.
/// A "select" in the middle of a sentence is prose, not SQL.
pub fn extract_sql(text: &str) -> Option<String> {
    let first_capture = |re: &Regex| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    if let Some(sql) = first_capture(&FENCED_SELECT) {
        return Some(sql);
    }

    if let Some(sql) = first_capture(&TERMINATED_SELECT) {
        return Some(sql);
    }

    LINE_START_SELECT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|sql| !sql.is_empty())
}
