//! # generic-repository
//!
//! A schema-driven generic repository over parameterized SQL.
//!
//! Given an entity type, a [`Repository`] resolves the entity's table and
//! introspects its columns once, then builds parameterized INSERT, UPDATE,
//! DELETE and SELECT text for it. Caller-supplied column names are always
//! checked against the introspected set before any statement is sent, and
//! values only ever travel as bound parameters.
//!
//! ## Features
//!
//! - **Condition Builder**: structured `(column, operator, value)` terms joined
//!   by AND/OR, validated before any text is produced
//! - **Filter/Sort/Page Pipeline**: wraps a base query, filters, orders and pages
//!   it, and returns the pre-paging row count alongside the page
//! - **Batch CRUD**: multi-row INSERT with per-row indexed parameters, and
//!   transactional multi-statement updates and deletes
//! - **Audit Columns**: `CreatedMoment` is written on insert and
//!   `ModifiedMoment` on every update/replace
//! - **Sync and Async**: [`BlockingRepository`] mirrors every [`Repository`] operation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use generic_repository::{
//!     ConditionParams, ConnectionConfig, Entity, FromRow, PagingOptions, PgConnectionProvider,
//!     Repository, Result, Row, SortDirection, Value,
//! };
//!
//! struct Person {
//!     id: i64,
//!     first_name: String,
//! }
//!
//! impl FromRow for Person {
//!     fn from_row(row: &Row) -> Result<Self> {
//!         Ok(Self { id: row.get("Id")?, first_name: row.get("FirstName")? })
//!     }
//! }
//!
//! impl Entity for Person {
//!     const NAME: &'static str = "Person";
//!     const FIELDS: &'static [&'static str] = &["Id", "FirstName"];
//!
//!     fn value_of(&self, field: &str) -> Option<Value> {
//!         match field {
//!             "Id" => Some(self.id.into()),
//!             "FirstName" => Some(self.first_name.clone().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConnectionConfig::builder("postgres://localhost/mydb").build();
//!     let provider = PgConnectionProvider::connect(&config).await?;
//!
//!     // Introspects the "People" table
//!     let people = Repository::<Person, _>::new(provider).await?;
//!
//!     people.insert(&Person { id: 0, first_name: "Ada".into() }, false).await?;
//!
//!     let page = people
//!         .get_with_paging(
//!             PagingOptions::new("SELECT * FROM [People]")
//!                 .with_filter(ConditionParams::eq("FirstName", "Ada"))
//!                 .with_sort("Id", SortDirection::Desc)
//!                 .with_page(1, 20),
//!         )
//!         .await?;
//!
//!     println!("{} of {}", page.data.len(), page.total_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Dialect
//!
//! Generated text uses `[Column]` identifiers and `@name` placeholders. The
//! PostgreSQL provider rewrites both before sending (`"Column"`, `$1`), so
//! hand-written queries passed to the repository may use either form.

pub mod blocking;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod postgres;
pub mod repository;
pub mod schema;
pub mod sql;
pub mod types;

// Re-export main types for convenience
pub use blocking::BlockingRepository;
pub use config::{ColumnConventions, ConnectionConfig, ConnectionConfigBuilder};
pub use connection::{Command, CommandKind, Connection, ConnectionProvider, Transaction};
pub use entity::{Changes, Entity, pluralize};
pub use error::{RepositoryError, Result};
pub use postgres::{PgConnection, PgConnectionProvider};
pub use repository::Repository;
pub use schema::{ColumnSet, column_names, many_tables_column_names};
pub use types::{FromRow, FromValue, Params, Row, Value};

// Re-export SQL building blocks for advanced users
pub use sql::condition::{
    ComparisonOperator, ConditionClause, ConditionParams, LogicOperator, build_condition_clause,
};
pub use sql::dml::DmlGenerator;
pub use sql::pipeline::{PagedQuery, PaginationResult, PagingOptions, SortDirection};
