//! Condition building for SQL WHERE clauses
//!
//! Converts [`ConditionParams`] (parallel lists of column, comparison
//! operator and literal, plus the logic operators joining them) into a
//! WHERE clause and a named parameter map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};
use crate::schema::ColumnSet;
use crate::sql::sanitize::quote_identifier;
use crate::types::{Params, Value};

/// Comparison between a column and a bound literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl ComparisonOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Gte => ">=",
            ComparisonOperator::Lte => "<=",
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = RepositoryError;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim() {
            "=" => Ok(ComparisonOperator::Eq),
            "!=" => Ok(ComparisonOperator::Ne),
            ">" => Ok(ComparisonOperator::Gt),
            "<" => Ok(ComparisonOperator::Lt),
            ">=" => Ok(ComparisonOperator::Gte),
            "<=" => Ok(ComparisonOperator::Lte),
            other => Err(RepositoryError::InvalidOperator(other.to_string())),
        }
    }
}

impl TryFrom<String> for ComparisonOperator {
    type Error = RepositoryError;

    fn try_from(token: String) -> Result<Self> {
        token.parse()
    }
}

impl From<ComparisonOperator> for String {
    fn from(op: ComparisonOperator) -> Self {
        op.as_sql().to_string()
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Connector between two consecutive condition terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicOperator {
    And,
    Or,
}

impl LogicOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
        }
    }
}

impl FromStr for LogicOperator {
    type Err = RepositoryError;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(LogicOperator::And),
            "OR" => Ok(LogicOperator::Or),
            _ => Err(RepositoryError::InvalidOperator(token.to_string())),
        }
    }
}

impl TryFrom<String> for LogicOperator {
    type Error = RepositoryError;

    fn try_from(token: String) -> Result<Self> {
        token.parse()
    }
}

impl From<LogicOperator> for String {
    fn from(op: LogicOperator) -> Self {
        op.as_sql().to_string()
    }
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Structured set of comparison terms
///
/// `left`, `operators` and `right` run in parallel: term `i` is
/// `left[i] operators[i] right[i]`. With more than one term, `logic` holds
/// exactly `len - 1` connectors; otherwise it is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionParams {
    #[serde(rename = "conditionLeftSide", default)]
    pub left: Vec<String>,
    #[serde(rename = "comparisonOperators", default)]
    pub operators: Vec<ComparisonOperator>,
    #[serde(rename = "conditionRightSide", default)]
    pub right: Vec<Value>,
    #[serde(rename = "logicOperators", default)]
    pub logic: Vec<LogicOperator>,
}

impl ConditionParams {
    /// Start with a single term
    pub fn new(column: impl Into<String>, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        Self {
            left: vec![column.into()],
            operators: vec![op],
            right: vec![value.into()],
            logic: Vec::new(),
        }
    }

    /// Single equality term
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, ComparisonOperator::Eq, value)
    }

    /// Append a term joined to the previous one with `logic`
    pub fn push(
        mut self,
        logic: LogicOperator,
        column: impl Into<String>,
        op: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        if !self.left.is_empty() {
            self.logic.push(logic);
        }
        self.left.push(column.into());
        self.operators.push(op);
        self.right.push(value.into());
        self
    }

    pub fn and(self, column: impl Into<String>, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        self.push(LogicOperator::And, column, op, value)
    }

    pub fn or(self, column: impl Into<String>, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        self.push(LogicOperator::Or, column, op, value)
    }

    /// Build from raw operator tokens such as `">="` and `"or"`
    ///
    /// Fails with `InvalidOperator` on the first token outside the
    /// comparison or logic sets.
    pub fn from_tokens<S, O, L>(
        left: Vec<S>,
        operators: &[O],
        right: Vec<Value>,
        logic: &[L],
    ) -> Result<Self>
    where
        S: Into<String>,
        O: AsRef<str>,
        L: AsRef<str>,
    {
        let operators = operators
            .iter()
            .map(|t| t.as_ref().parse())
            .collect::<Result<Vec<ComparisonOperator>>>()?;
        let logic = logic
            .iter()
            .map(|t| t.as_ref().parse())
            .collect::<Result<Vec<LogicOperator>>>()?;

        Ok(Self {
            left: left.into_iter().map(Into::into).collect(),
            operators,
            right,
            logic,
        })
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True when no term was supplied on any of the three lists
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.operators.is_empty() && self.right.is_empty()
    }

    /// Structural validation, in order: column membership, list lengths,
    /// logic operator count
    pub fn validate(&self, valid_columns: Option<&ColumnSet>) -> Result<()> {
        if let Some(columns) = valid_columns {
            if let Some(unknown) = self.left.iter().find(|c| !columns.contains(c)) {
                return Err(RepositoryError::invalid_column(unknown.clone()));
            }
        }

        if self.left.len() != self.operators.len() || self.operators.len() != self.right.len() {
            return Err(RepositoryError::malformed(format!(
                "condition lists differ in length: {} columns, {} operators, {} values",
                self.left.len(),
                self.operators.len(),
                self.right.len()
            )));
        }

        let count = self.left.len();
        if count == 0 {
            return Err(RepositoryError::malformed(
                "at least one condition term is required",
            ));
        }

        if count > 1 && self.logic.is_empty() {
            return Err(RepositoryError::MissingLogicOperator(count));
        }

        let expected = count - 1;
        if self.logic.len() != expected {
            return Err(RepositoryError::WrongLogicOperatorCount {
                expected,
                actual: self.logic.len(),
            });
        }

        Ok(())
    }
}

/// Output of the condition builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionClause {
    /// `WHERE [a] = @cond_0_0 AND ...`
    pub where_clause: String,
    pub params: Params,
}

/// Placeholder name for term `term` in batch row `batch_index`
pub fn condition_param_name(term: usize, batch_index: usize) -> String {
    format!("cond_{}_{}", term, batch_index)
}

/// Build a WHERE clause from ConditionParams
///
/// Every literal is bound as `@cond_{term}_{batch_index}`; the batch index
/// keeps names unique when the builder runs once per row of a combined
/// statement. Column tokens come from validated names only and operator
/// tokens from the enumerations.
///
/// # Arguments
/// * `condition` - The terms to convert
/// * `valid_columns` - Column set every left-hand name must belong to
/// * `batch_index` - Suffix appended to every parameter name
pub fn build_condition_clause(
    condition: &ConditionParams,
    valid_columns: Option<&ColumnSet>,
    batch_index: usize,
) -> Result<ConditionClause> {
    condition.validate(valid_columns)?;

    let mut where_clause = String::from("WHERE ");
    let mut params = Params::new();

    for (i, column) in condition.left.iter().enumerate() {
        let name = condition_param_name(i, batch_index);
        where_clause.push_str(&format!(
            "{} {} @{}",
            quote_identifier(column),
            condition.operators[i].as_sql(),
            name
        ));

        if let Some(logic) = condition.logic.get(i) {
            where_clause.push(' ');
            where_clause.push_str(logic.as_sql());
            where_clause.push(' ');
        }

        params.add(&name, condition.right[i].clone());
    }

    Ok(ConditionClause {
        where_clause,
        params,
    })
}
