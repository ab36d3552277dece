//! Connection capability and execution surface
//!
//! The repository never creates physical connections itself. It asks a
//! [`ConnectionProvider`] for an unopened [`Connection`] per call, opens it,
//! sends [`Command`]s through it and lets it drop on every exit path.

use async_trait::async_trait;

use crate::error::{RepositoryError, Result};
use crate::types::{Params, Row};

/// Whether command text is a statement batch or a stored procedure name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Text,
    StoredProcedure,
}

/// Parameterized command sent to the data store
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// SQL text with `@name` placeholders, or a procedure name
    pub text: String,
    pub kind: CommandKind,
    pub params: Params,
}

impl Command {
    pub fn text(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            kind: CommandKind::Text,
            params,
        }
    }

    pub fn procedure(name: impl Into<String>, params: Params) -> Self {
        Self {
            text: name.into(),
            kind: CommandKind::StoredProcedure,
            params,
        }
    }
}

/// One data store connection
///
/// Implementations discard any open transaction when dropped.
#[async_trait]
pub trait Connection: Send {
    async fn open(&mut self) -> Result<()>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Run a command, returning the affected row count
    async fn execute(&mut self, command: &Command) -> Result<u64>;

    /// Run a command, returning its single result set
    async fn query(&mut self, command: &Command) -> Result<Vec<Row>>;

    /// Run a command, returning each result set in order
    async fn query_multiple(&mut self, command: &Command) -> Result<Vec<Vec<Row>>>;
}

/// Source of unopened connections
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    fn create_connection(&self) -> Self::Connection;

    /// Schema that column introspection is restricted to, if any
    fn introspection_schema(&self) -> Option<&str> {
        None
    }
}

/// Explicit transaction handle over an open connection
///
/// Finish it with [`Transaction::commit`] or [`Transaction::rollback`].
pub struct Transaction<'c, C: Connection + ?Sized> {
    connection: &'c mut C,
    finished: bool,
}

impl<'c, C: Connection + ?Sized> Transaction<'c, C> {
    pub async fn begin(connection: &'c mut C) -> Result<Self> {
        connection.begin().await?;
        Ok(Self {
            connection,
            finished: false,
        })
    }

    pub async fn execute(&mut self, command: &Command) -> Result<u64> {
        tracing::debug!(sql = %command.text, params = command.params.len(), "executing in transaction");
        self.connection.execute(command).await
    }

    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.connection.commit().await
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.connection.rollback().await
    }

    /// Roll back after `error`, then hand `error` back to the caller
    ///
    /// A failing rollback is reported together with the originating error.
    pub async fn rollback_after(self, error: RepositoryError) -> RepositoryError {
        match self.rollback().await {
            Ok(()) => error,
            Err(rollback) => RepositoryError::RollbackFailed {
                error: Box::new(error),
                rollback: Box::new(rollback),
            },
        }
    }
}

impl<C: Connection + ?Sized> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Transaction dropped without explicit commit or rollback");
        }
    }
}

/// Run every command inside one transaction on a fresh connection
///
/// Any failure rolls the whole batch back before the error propagates.
/// Returns the summed affected row count.
pub async fn run_in_transaction<P>(provider: &P, commands: &[Command]) -> Result<u64>
where
    P: ConnectionProvider + ?Sized,
{
    let mut connection = provider.create_connection();
    connection.open().await?;

    let mut tx = Transaction::begin(&mut connection).await?;
    let mut affected = 0;
    for (i, command) in commands.iter().enumerate() {
        match tx.execute(command).await {
            Ok(rows) => affected += rows,
            Err(error) => {
                tracing::warn!(statement = i, error = %error, "Batch statement failed, rolling back");
                return Err(tx.rollback_after(error).await);
            }
        }
    }
    tx.commit().await?;
    Ok(affected)
}
