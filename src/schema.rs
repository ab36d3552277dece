//! Table column sets and schema introspection
//!
//! A repository introspects its table once at construction and keeps the
//! resulting [`ColumnSet`] for its whole lifetime. The set validates every
//! caller-supplied column name and drives projection and parameter lists.

use crate::config::ColumnConventions;
use crate::connection::{Command, Connection, ConnectionProvider};
use crate::error::Result;
use crate::types::{Params, Row};

/// Introspected columns of one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    all: Vec<String>,
    filtered: Vec<String>,
}

impl ColumnSet {
    /// Split introspected columns into all columns and filtered columns
    /// (all minus the audit columns named by `conventions`)
    pub fn from_columns(columns: Vec<String>, conventions: &ColumnConventions) -> Self {
        let filtered = columns
            .iter()
            .filter(|c| !conventions.is_audit(c))
            .cloned()
            .collect();
        Self {
            all: columns,
            filtered,
        }
    }

    /// Every column, audit columns included
    pub fn all(&self) -> &[String] {
        &self.all
    }

    /// Columns a caller may supply values for
    pub fn filtered(&self) -> &[String] {
        &self.filtered
    }

    /// Exact-match membership in the full column set
    pub fn contains(&self, column: &str) -> bool {
        self.all.iter().any(|c| c == column)
    }

    /// Resolve a caller-supplied name to the introspected spelling,
    /// exact match first, then ASCII case-insensitive
    pub fn resolve(&self, column: &str) -> Option<&str> {
        self.all
            .iter()
            .find(|c| *c == column)
            .or_else(|| self.all.iter().find(|c| c.eq_ignore_ascii_case(column)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

const COLUMNS_QUERY: &str = "SELECT CAST(COLUMN_NAME AS VARCHAR(128)) AS ColumnName \
     FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = @TableName";

/// Build the introspection command for one table
///
/// `index` suffixes the table-name parameter so several of these can share
/// one batch.
pub fn columns_command(table_name: &str, index: Option<usize>, schema: Option<&str>) -> Command {
    let (table_param, schema_param) = match index {
        Some(i) => (format!("TableName{}", i), format!("TableSchema{}", i)),
        None => ("TableName".to_string(), "TableSchema".to_string()),
    };

    let mut text = COLUMNS_QUERY.replace("@TableName", &format!("@{}", table_param));
    let mut params = Params::new().with(&table_param, table_name);

    if let Some(schema) = schema {
        text.push_str(&format!(" AND TABLE_SCHEMA = @{}", schema_param));
        params.add(&schema_param, schema);
    }
    text.push_str(" ORDER BY ORDINAL_POSITION");

    Command::text(text, params)
}

fn names_from_rows(rows: &[Row]) -> Result<Vec<String>> {
    rows.iter().map(|row| row.get_at::<String>(0)).collect()
}

/// Column names of one table, in ordinal order
pub async fn column_names<P>(provider: &P, table_name: &str, schema: Option<&str>) -> Result<Vec<String>>
where
    P: ConnectionProvider + ?Sized,
{
    let command = columns_command(table_name, None, schema);

    let mut connection = provider.create_connection();
    connection.open().await?;
    let rows = connection.query(&command).await?;

    names_from_rows(&rows)
}

/// Column names of several tables in one batch, duplicates removed
/// (first occurrence wins)
pub async fn many_tables_column_names<P, S>(
    provider: &P,
    table_names: &[S],
    schema: Option<&str>,
) -> Result<Vec<String>>
where
    P: ConnectionProvider + ?Sized,
    S: AsRef<str>,
{
    if table_names.is_empty() {
        return Ok(Vec::new());
    }

    let mut text = String::new();
    let mut params = Params::new();
    for (i, table) in table_names.iter().enumerate() {
        let command = columns_command(table.as_ref(), Some(i), schema);
        text.push_str(&command.text);
        text.push_str("; ");
        params.extend(command.params);
    }
    let command = Command::text(text.trim_end().to_string(), params);

    let mut connection = provider.create_connection();
    connection.open().await?;
    let sets = connection.query_multiple(&command).await?;

    let mut names: Vec<String> = Vec::new();
    for rows in &sets {
        for name in names_from_rows(rows)? {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    Ok(names)
}
