//! SQL generation for repository commands
//!
//! Provides condition building, DML generation, the paging pipeline,
//! identifier sanitization and PostgreSQL placeholder translation.

pub mod bind;
pub mod condition;
pub mod dml;
pub mod pipeline;
pub mod sanitize;

pub use condition::{
    ComparisonOperator, ConditionClause, ConditionParams, LogicOperator, build_condition_clause,
};
pub use dml::DmlGenerator;
pub use pipeline::{PagedQuery, PaginationResult, PagingOptions, SortDirection};
pub use sanitize::{quote_identifier, validate_procedure_name};
