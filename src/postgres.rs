//! PostgreSQL connection provider backed by an sqlx pool

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};

use crate::config::ConnectionConfig;
use crate::connection::{Command, CommandKind, Connection, ConnectionProvider};
use crate::error::{RepositoryError, Result};
use crate::sql::bind::{split_statements, to_positional};
use crate::sql::sanitize::{param_name, validate_procedure_name};
use crate::types::{Params, Row, Value};

/// Hands out unopened [`PgConnection`]s drawing from one shared pool
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
    schema: Option<String>,
}

impl PgConnectionProvider {
    /// Create a pool from configuration
    ///
    /// With a schema configured, every pooled connection starts with its
    /// `search_path` set to that schema.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout);

        if let Some(schema) = &config.schema {
            let set_search_path = format!("SET search_path TO \"{}\"", schema.replace('"', "\"\""));
            options = options.after_connect(move |conn, _meta| {
                let sql = set_search_path.clone();
                Box::pin(async move {
                    sqlx::query(&sql).execute(&mut *conn).await?;
                    Ok(())
                })
            });
        }

        let pool = options
            .connect(&config.database_url)
            .await
            .map_err(|e| RepositoryError::Connection(format!("Database connection failed: {}", e)))?;

        tracing::info!(
            max_connections = config.max_connections,
            schema = config.schema.as_deref().unwrap_or("*"),
            "PostgreSQL pool ready"
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// Wrap an existing pool
    ///
    /// Use this to share one pool between repositories and other code.
    pub fn from_pool(pool: PgPool, schema: Option<String>) -> Self {
        Self { pool, schema }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ConnectionProvider for PgConnectionProvider {
    type Connection = PgConnection;

    fn create_connection(&self) -> PgConnection {
        PgConnection {
            pool: self.pool.clone(),
            state: State::Closed,
        }
    }

    fn introspection_schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

enum State {
    Closed,
    /// Opened, but the pooled connection went back after a transaction;
    /// the next statement acquires a fresh one
    Released,
    Open(PoolConnection<Postgres>),
    InTransaction(sqlx::Transaction<'static, Postgres>),
}

/// One pooled PostgreSQL connection
///
/// Dropping it mid-transaction rolls the transaction back and returns the
/// connection to the pool.
pub struct PgConnection {
    pool: PgPool,
    state: State,
}

impl PgConnection {
    async fn raw(&mut self) -> Result<&mut sqlx::PgConnection> {
        if matches!(self.state, State::Released) {
            self.state = State::Open(self.pool.acquire().await?);
        }
        match &mut self.state {
            State::Closed | State::Released => Err(RepositoryError::Connection(
                "Connection is not open".to_string(),
            )),
            State::Open(conn) => Ok(&mut **conn),
            State::InTransaction(tx) => Ok(&mut **tx),
        }
    }

    /// Take the running transaction, leaving the connection released
    fn take_transaction(&mut self) -> Result<sqlx::Transaction<'static, Postgres>> {
        match std::mem::replace(&mut self.state, State::Released) {
            State::InTransaction(tx) => Ok(tx),
            other => {
                self.state = other;
                Err(RepositoryError::execution("No transaction in progress"))
            }
        }
    }

    async fn run_execute(&mut self, sql: &str, params: &Params) -> Result<u64> {
        let mut affected = 0;
        for statement in split_statements(sql) {
            let positional = to_positional(&statement, params)?;
            let query = bind_all(sqlx::query(&positional.sql), positional.values);
            affected += query.execute(self.raw().await?).await?.rows_affected();
        }
        Ok(affected)
    }

    async fn run_query(&mut self, sql: &str, params: &Params) -> Result<Vec<Vec<Row>>> {
        let mut sets = Vec::new();
        for statement in split_statements(sql) {
            let positional = to_positional(&statement, params)?;
            let query = bind_all(sqlx::query(&positional.sql), positional.values);
            let rows = query.fetch_all(self.raw().await?).await?;
            sets.push(rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?);
        }
        Ok(sets)
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn open(&mut self) -> Result<()> {
        if matches!(self.state, State::Closed) {
            let conn = self.pool.acquire().await?;
            self.state = State::Open(conn);
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        if matches!(self.state, State::Closed) {
            return Err(RepositoryError::Connection(
                "Connection is not open".to_string(),
            ));
        }
        if matches!(self.state, State::InTransaction(_)) {
            return Err(RepositoryError::execution("Transaction already in progress"));
        }

        // the pooled connection goes back before the transaction takes its own
        self.state = State::Released;
        self.state = State::InTransaction(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.take_transaction()?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.take_transaction()?;
        tx.rollback().await?;
        Ok(())
    }

    async fn execute(&mut self, command: &Command) -> Result<u64> {
        tracing::debug!(sql = %command.text, params = command.params.len(), "execute");
        let sql = command_sql(command, false)?;
        self.run_execute(&sql, &command.params).await
    }

    async fn query(&mut self, command: &Command) -> Result<Vec<Row>> {
        tracing::debug!(sql = %command.text, params = command.params.len(), "query");
        let sql = command_sql(command, true)?;
        let mut sets = self.run_query(&sql, &command.params).await?;
        Ok(if sets.is_empty() { Vec::new() } else { sets.swap_remove(0) })
    }

    async fn query_multiple(&mut self, command: &Command) -> Result<Vec<Vec<Row>>> {
        tracing::debug!(sql = %command.text, params = command.params.len(), "query multiple");
        let sql = command_sql(command, true)?;
        self.run_query(&sql, &command.params).await
    }
}

/// Statement text for a command; procedures become `CALL` for writes and
/// a set-returning function call for reads, with named arguments
fn command_sql(command: &Command, returns_rows: bool) -> Result<String> {
    match command.kind {
        CommandKind::Text => Ok(command.text.clone()),
        CommandKind::StoredProcedure => {
            validate_procedure_name(&command.text)?;
            let mut args = Vec::with_capacity(command.params.len());
            for (name, _) in command.params.iter() {
                if param_name(name) != name {
                    return Err(RepositoryError::validation(format!(
                        "Procedure argument '{}' is not a plain identifier",
                        name
                    )));
                }
                args.push(format!("{} => @{}", name, name));
            }
            let call = format!("{}({})", command.text, args.join(", "));
            Ok(if returns_rows {
                format!("SELECT * FROM {}", call)
            } else {
                format!("CALL {}", call)
            })
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: Vec<Value>,
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Decimal(d) => query.bind(d),
            Value::Text(s) => query.bind(s),
            Value::Timestamp(t) => query.bind(t),
            Value::Uuid(u) => query.bind(u),
            Value::Json(j) => query.bind(j),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_cell(row, i, column.type_info().name())?);
    }
    Ok(Row::new(columns, values))
}

fn decode_cell(row: &PgRow, i: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
        "INT2" => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::Int),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(Value::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(Value::Float),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(i)?.map(Value::Decimal),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(i)?.map(Value::Text)
        }
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(i)?
            .map(Value::Timestamp),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(i)?
            .map(|t| Value::Timestamp(t.and_utc())),
        "UUID" => row.try_get::<Option<uuid::Uuid>, _>(i)?.map(Value::Uuid),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(i)?
            .map(Value::Json),
        // anything else is surfaced as text when the driver can decode it
        _ => row.try_get::<Option<String>, _>(i).ok().flatten().map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_command_passes_through() {
        let command = Command::text("SELECT 1", Params::new());
        assert_eq!(command_sql(&command, true).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_procedure_call_forms() {
        let params = Params::new().with("Name", "Ada").with("Age", 36);
        let command = Command::procedure("people_upsert", params);

        assert_eq!(
            command_sql(&command, false).unwrap(),
            "CALL people_upsert(Age => @Age, Name => @Name)"
        );
        assert_eq!(
            command_sql(&command, true).unwrap(),
            "SELECT * FROM people_upsert(Age => @Age, Name => @Name)"
        );
    }

    #[test]
    fn test_procedure_name_validated() {
        let command = Command::procedure("drop table x; --", Params::new());
        assert!(command_sql(&command, false).unwrap_err().is_validation());
    }
}
