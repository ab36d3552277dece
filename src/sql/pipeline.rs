//! Filter → Sort → Page query rewriting
//!
//! Each stage takes the query text built so far and returns new text with an
//! extended parameter set. The final text is a two-statement batch: the
//! requested page of rows, then the pre-paging row count.

use serde::{Deserialize, Serialize};

use crate::connection::Command;
use crate::error::{RepositoryError, Result};
use crate::schema::ColumnSet;
use crate::sql::condition::{ConditionParams, build_condition_clause};
use crate::sql::sanitize::{quote_identifier, strip_trailing_order_by};
use crate::types::Params;

/// Page size meaning "return every row"
pub const UNPAGED: i64 = -1;

/// Page size used when the requested one is out of range
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Column ordered by when no sort column is requested
pub const DEFAULT_SORT_COLUMN: &str = "CreatedMoment";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Page number clamped to at least 1
pub fn normalize_page(page: i64) -> i64 {
    page.max(1)
}

/// Page size, with anything below 1 other than [`UNPAGED`] treated as
/// [`DEFAULT_PAGE_SIZE`]
pub fn normalize_page_size(page_size: i64) -> i64 {
    if page_size < 1 && page_size != UNPAGED {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    }
}

/// Query text plus parameters moving through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PagedQuery {
    pub text: String,
    pub params: Params,
}

impl PagedQuery {
    pub fn new(base_query: impl Into<String>, params: Params) -> Self {
        Self {
            text: base_query.into(),
            params,
        }
    }

    /// Wrap the query as `BaseQuery` and append the condition's WHERE clause
    ///
    /// With no terms only the wrap happens.
    pub fn filter(mut self, condition: &ConditionParams, valid_columns: Option<&ColumnSet>) -> Result<Self> {
        let wrapped = format!("SELECT * FROM ({}) AS BaseQuery", self.text.trim());

        if condition.is_empty() {
            self.text = wrapped;
            return Ok(self);
        }

        let clause = build_condition_clause(condition, valid_columns, 0)?;
        self.text = format!("{} {}", wrapped, clause.where_clause);
        self.params.extend(clause.params);
        Ok(self)
    }

    /// Append `ORDER BY [column] ASC|DESC`, defaulting to the creation
    /// audit column
    pub fn sort(mut self, column: Option<&str>, direction: SortDirection) -> Self {
        let column = column.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_SORT_COLUMN);
        self.text = format!(
            "{} ORDER BY {} {}",
            self.text,
            quote_identifier(column),
            direction.as_sql()
        );
        self
    }

    /// Append OFFSET/FETCH (unless unpaged) and the row-count statement
    ///
    /// A page whose row offset does not fit in an `i64` fails with
    /// [`RepositoryError::Validation`].
    pub fn page(mut self, page: i64, page_size: i64) -> Result<Self> {
        let page = normalize_page(page);
        let size = normalize_page_size(page_size);
        let count = format!(
            "SELECT COUNT(*) FROM ({}) AS RowsCount",
            strip_trailing_order_by(&self.text)
        );

        if size == UNPAGED {
            self.text = format!("{}; {}", self.text, count);
        } else {
            self.text = format!(
                "{} OFFSET @Offset ROWS FETCH NEXT @Next ROWS ONLY; {}",
                self.text, count
            );
            let offset = (page - 1).checked_mul(size).ok_or_else(|| {
                RepositoryError::validation(format!(
                    "Page {} with page size {} is out of range",
                    page, size
                ))
            })?;
            self.params.add("Offset", offset);
            self.params.add("Next", size);
        }
        Ok(self)
    }

    pub fn into_command(self) -> Command {
        Command::text(self.text, self.params)
    }
}

/// Caller options for a paged, filtered, sorted read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingOptions {
    /// Base query the pipeline wraps
    pub sql_query: String,
    #[serde(default)]
    pub parameters: Params,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(flatten)]
    pub filter: ConditionParams,
    #[serde(rename = "orderColumnName", skip_serializing_if = "Option::is_none")]
    pub sort_column: Option<String>,
    #[serde(rename = "orderDirection", default)]
    pub sort_direction: SortDirection,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl PagingOptions {
    pub fn new(sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
            parameters: Params::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filter: ConditionParams::default(),
            sort_column: None,
            sort_direction: SortDirection::Asc,
        }
    }

    /// Set the base query's own parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.parameters = params;
        self
    }

    /// Set page number and size (`UNPAGED` for every row)
    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, filter: ConditionParams) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_column = Some(column.into());
        self.sort_direction = direction;
        self
    }

    /// Run the full pipeline over the base query
    pub fn build(&self, valid_columns: Option<&ColumnSet>) -> Result<Command> {
        let query = PagedQuery::new(self.sql_query.clone(), self.parameters.clone())
            .filter(&self.filter, valid_columns)?
            .sort(self.sort_column.as_deref(), self.sort_direction)
            .page(self.page, self.page_size)?;
        Ok(query.into_command())
    }
}

/// One page of rows with totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult<T> {
    pub total_count: i64,
    pub page_count: i64,
    pub data: Vec<T>,
}

impl<T> PaginationResult<T> {
    /// `page_count` is `ceil(total / page_size)`, or 1 when unpaged
    pub fn new(data: Vec<T>, total_count: i64, page_size: i64) -> Self {
        let size = normalize_page_size(page_size);
        let page_count = if size == UNPAGED {
            1
        } else {
            total_count / size + i64::from(total_count % size > 0)
        };
        Self {
            total_count,
            page_count,
            data,
        }
    }
}
