//! Statement splitting and placeholder translation for PostgreSQL
//!
//! Generated text uses `[Name]` identifiers and `@name` placeholders. Before
//! it is sent to PostgreSQL, identifiers become `"Name"` and each distinct
//! placeholder becomes a positional `$n`. String literals and quoted
//! identifiers pass through untouched.

use crate::error::{RepositoryError, Result};
use crate::types::{Params, Value};

/// Statement text ready for PostgreSQL plus its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Positional {
    pub sql: String,
    pub values: Vec<Value>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Copy a quoted run starting at `chars[start]` (the opening `quote`),
/// honoring doubled quotes. Returns the index after the closing quote.
fn copy_quoted(chars: &[char], start: usize, quote: char, out: &mut String) -> usize {
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                out.push(quote);
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Whether a `[` at this point opens a bracket identifier rather than an
/// array subscript (`tags[1]`, `(arr)[2]`)
fn opens_identifier(out: &str) -> bool {
    match out.chars().last() {
        None => true,
        Some(c) => !(is_ident_char(c) || c == ']' || c == ')' || c == '"'),
    }
}

/// Rewrite `[Name]` identifiers and `@name` placeholders for PostgreSQL
///
/// A placeholder used twice binds one value. `NULL` values are written
/// inline, so they never carry a type that conflicts with the target column.
/// A placeholder with no matching parameter is an error.
pub fn to_positional(text: &str, params: &Params) -> Result<Positional> {
    let chars: Vec<char> = text.chars().collect();
    let mut sql = String::with_capacity(text.len());
    let mut names: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                i = copy_quoted(&chars, i, c, &mut sql);
            }
            '[' if opens_identifier(&sql) => {
                let mut ident = String::new();
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    if chars[j] == ']' {
                        if chars.get(j + 1) == Some(&']') {
                            ident.push(']');
                            j += 2;
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    ident.push(chars[j]);
                    j += 1;
                }
                if !closed {
                    return Err(RepositoryError::validation(format!(
                        "Unterminated identifier in statement: {}",
                        text
                    )));
                }
                sql.push('"');
                sql.push_str(&ident.replace('"', "\"\""));
                sql.push('"');
                i = j + 1;
            }
            '@' if chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let mut j = i + 1;
                while j < chars.len() && is_ident_char(chars[j]) {
                    j += 1;
                }
                let name: String = chars[i + 1..j].iter().collect();
                let value = params.get(&name).ok_or_else(|| {
                    RepositoryError::validation(format!("No value supplied for parameter @{}", name))
                })?;

                if value.is_null() {
                    sql.push_str("NULL");
                } else {
                    let position = match names.iter().position(|n| *n == name) {
                        Some(p) => p,
                        None => {
                            names.push(name);
                            values.push(value.clone());
                            values.len() - 1
                        }
                    };
                    sql.push('$');
                    sql.push_str(&(position + 1).to_string());
                }
                i = j;
            }
            _ => {
                sql.push(c);
                i += 1;
            }
        }
    }

    Ok(Positional { sql, values })
}

/// Split a batch on top-level `;`, dropping empty statements
pub fn split_statements(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                i = copy_quoted(&chars, i, c, &mut current);
            }
            '[' => {
                // bracket identifiers may contain ';'
                i = copy_quoted_until(&chars, i, ']', &mut current);
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    statements
}

fn copy_quoted_until(chars: &[char], start: usize, close: char, out: &mut String) -> usize {
    let mut i = start;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i] == close && i > start {
            if chars.get(i + 1) == Some(&close) {
                out.push(close);
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}
