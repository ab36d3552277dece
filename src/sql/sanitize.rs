//! SQL identifier and token sanitization utilities
//!
//! Column and table tokens only ever reach statement text through
//! [`quote_identifier`], after being checked against an introspected column
//! set. Values never reach statement text at all.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RepositoryError, Result};

/// Quote an identifier with square brackets
///
/// # Example
/// ```
/// use generic_repository::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("FirstName"), "[FirstName]");
/// assert_eq!(quote_identifier("odd]name"), "[odd]]name]");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    // Escape closing brackets by doubling them
    let escaped = identifier.replace(']', "]]");
    format!("[{}]", escaped)
}

/// Derive a placeholder-safe parameter name from a column name
///
/// Anything outside `[A-Za-z0-9_]` becomes an underscore, so the result can
/// always follow an `@` sigil.
pub fn param_name(column: &str) -> String {
    column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Parameter name carrying a batch index suffix (`FirstName_3`)
pub fn indexed_param_name(column: &str, index: usize) -> String {
    format!("{}_{}", param_name(column), index)
}

/// Remove a trailing `ORDER BY ...` clause, if any
///
/// Only the last top-level `ORDER BY` is considered, so ordering inside a
/// wrapped subquery survives.
pub fn strip_trailing_order_by(query: &str) -> &str {
    let upper = query.to_ascii_uppercase();
    let Some(pos) = upper.rfind("ORDER BY") else {
        return query;
    };

    // An ORDER BY followed by an unbalanced ')' belongs to a subquery
    let mut depth: i32 = 0;
    for c in query[pos..].chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return query;
                }
            }
            _ => {}
        }
    }

    query[..pos].trim_end()
}

fn procedure_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .unwrap_or_else(|e| panic!("invalid procedure name pattern: {e}"))
    })
}

/// Validate a stored procedure name (`name` or `schema.name`)
pub fn validate_procedure_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RepositoryError::validation("Procedure name cannot be empty"));
    }
    if !procedure_name_regex().is_match(name) {
        return Err(RepositoryError::validation(format!(
            "Procedure name '{}' is invalid. Must be an identifier, optionally schema-qualified.",
            name
        )));
    }
    Ok(())
}
