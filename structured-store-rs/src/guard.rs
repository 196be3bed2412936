//! Read-only statement guard

use crate::error::{Result, StoreError};

pub const SELECT_ONLY_MESSAGE: &str = "Only SELECT queries are allowed";
pub const STACKED_STATEMENT_MESSAGE: &str = "Multiple statements are not allowed";

/// Validate that `sql` is a single SELECT statement.
///
/// Returns the statement trimmed and without its trailing `;`. Semicolons
/// inside quoted literals, identifiers or comments do not count as
/// separators.
pub fn ensure_select(sql: &str) -> Result<&str> {
    let trimmed = sql.trim();

    if !starts_with_select(trimmed) {
        return Err(StoreError::UnauthorizedQuery(SELECT_ONLY_MESSAGE.to_string()));
    }

    let statement = trimmed.trim_end_matches(|c: char| c == ';' || c.is_whitespace());

    if contains_unquoted_semicolon(statement) {
        return Err(StoreError::UnauthorizedQuery(STACKED_STATEMENT_MESSAGE.to_string()));
    }

    Ok(statement)
}

fn starts_with_select(sql: &str) -> bool {
    let mut chars = sql.chars();
    let keyword: String = chars.by_ref().take(6).collect();

    keyword.eq_ignore_ascii_case("select")
        && chars
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
}

/// Scan for a statement separator outside quotes and comments. A quote
/// character inside `-- ...` or `/* ... */` does not open a literal.
fn contains_unquoted_semicolon(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            ';' => return true,
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_select_and_strips_terminator() {
        assert_eq!(ensure_select("  SELECT * FROM devices;  ").unwrap(), "SELECT * FROM devices");
        assert_eq!(ensure_select("select count(*) from t").unwrap(), "select count(*) from t");
        assert_eq!(ensure_select("SELECT\n1;;").unwrap(), "SELECT\n1");
    }

    #[test]
    fn rejects_writes() {
        for sql in ["DROP TABLE devices", "delete from t", "UPDATE t SET a = 1", "  insert into t values (1)"] {
            let err = ensure_select(sql).unwrap_err();
            assert!(matches!(err, StoreError::UnauthorizedQuery(ref m) if m == SELECT_ONLY_MESSAGE));
        }
    }

    #[test]
    fn rejects_select_prefixed_identifiers() {
        assert!(ensure_select("SELECTED_ROWS").is_err());
        assert!(ensure_select("").is_err());
    }

    #[test]
    fn rejects_stacked_statements() {
        let err = ensure_select("SELECT 1; DROP TABLE devices;").unwrap_err();
        assert_eq!(err.to_string(), STACKED_STATEMENT_MESSAGE);
    }

    #[test]
    fn semicolons_in_literals_are_allowed() {
        let sql = "SELECT * FROM logs WHERE message = 'a;b'";
        assert_eq!(ensure_select(sql).unwrap(), sql);
    }

    #[test]
    fn quotes_inside_comments_do_not_hide_separators() {
        for sql in [
            "SELECT 1 -- it's fine\n; DROP TABLE telemetry_readings",
            "SELECT 1 /* don't */; DROP TABLE telemetry_readings",
        ] {
            let err = ensure_select(sql).unwrap_err();
            assert_eq!(err.to_string(), STACKED_STATEMENT_MESSAGE, "{}", sql);
        }
    }

    #[test]
    fn semicolons_in_comments_are_allowed() {
        let sql = "SELECT device_id -- one; per row\nFROM telemetry_readings /* a;b */";
        assert_eq!(ensure_select(sql).unwrap(), sql);
    }
}
