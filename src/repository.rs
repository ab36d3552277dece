//! Generic repository - CRUD and query surface for one entity type
//!
//! A [`Repository`] resolves its table name and column set once, at
//! construction, and keeps both for its lifetime. Every operation builds its
//! commands first (so validation failures never reach the data store), then
//! opens a fresh connection from the provider and drops it before returning.

use std::marker::PhantomData;

use chrono::Utc;

use crate::config::ColumnConventions;
use crate::connection::{Command, Connection, ConnectionProvider, run_in_transaction};
use crate::entity::{Changes, Entity};
use crate::error::{RepositoryError, Result};
use crate::schema::{ColumnSet, column_names};
use crate::sql::condition::ConditionParams;
use crate::sql::dml::DmlGenerator;
use crate::sql::pipeline::{PaginationResult, PagingOptions};
use crate::sql::sanitize::validate_procedure_name;
use crate::types::{FromRow, Params, Row, Value};

fn map_rows<T: FromRow>(rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(T::from_row).collect()
}

/// Result set `index` mapped to `T`; a missing set is empty
fn map_set<T: FromRow>(sets: &[Vec<Row>], index: usize) -> Result<Vec<T>> {
    sets.get(index).map_or_else(|| Ok(Vec::new()), |rows| map_rows(rows))
}

/// Generic repository over entity `E`, executing through provider `P`
pub struct Repository<E, P> {
    provider: P,
    table_name: String,
    columns: ColumnSet,
    conventions: ColumnConventions,
    _entity: PhantomData<fn() -> E>,
}

impl<E, P> Repository<E, P>
where
    E: Entity,
    P: ConnectionProvider,
{
    /// Create a repository, introspecting the entity's table
    pub async fn new(provider: P) -> Result<Self> {
        Self::with_conventions(provider, ColumnConventions::default()).await
    }

    /// Create a repository with non-default key/audit column names
    pub async fn with_conventions(provider: P, conventions: ColumnConventions) -> Result<Self> {
        let table_name = E::table_name();
        let names = column_names(&provider, &table_name, provider.introspection_schema()).await?;
        if names.is_empty() {
            return Err(RepositoryError::validation(format!(
                "Table '{}' has no columns or does not exist",
                table_name
            )));
        }
        Ok(Self::with_column_set(provider, names, conventions))
    }

    /// Create a repository over a declared column list, skipping
    /// introspection
    pub fn with_column_set(provider: P, columns: Vec<String>, conventions: ColumnConventions) -> Self {
        let table_name = E::table_name();
        let columns = ColumnSet::from_columns(columns, &conventions);

        tracing::info!(
            entity = E::NAME,
            table = %table_name,
            columns = columns.len(),
            "Repository ready"
        );

        Self {
            provider,
            table_name,
            columns,
            conventions,
            _entity: PhantomData,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn conventions(&self) -> &ColumnConventions {
        &self.conventions
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn dml(&self) -> DmlGenerator<'_> {
        DmlGenerator::new(&self.table_name, &self.columns, &self.conventions)
    }

    async fn open(&self) -> Result<P::Connection> {
        let mut connection = self.provider.create_connection();
        connection.open().await?;
        Ok(connection)
    }

    async fn execute_one(&self, command: &Command) -> Result<u64> {
        let mut connection = self.open().await?;
        connection.execute(command).await
    }

    async fn execute_batch(&self, commands: &[Command]) -> Result<u64> {
        if commands.is_empty() {
            tracing::debug!(table = %self.table_name, "Empty batch, nothing to execute");
            return Ok(0);
        }
        run_in_transaction(&self.provider, commands).await
    }

    async fn query_sets(&self, command: &Command) -> Result<Vec<Vec<Row>>> {
        let mut connection = self.open().await?;
        connection.query_multiple(command).await
    }

    async fn query_rows(&self, command: &Command) -> Result<Vec<Row>> {
        let mut connection = self.open().await?;
        connection.query(command).await
    }

    fn pair_commands<S: AsRef<str>>(
        texts: &[S],
        params: Vec<Params>,
        make: impl Fn(&str, Params) -> Result<Command>,
    ) -> Result<Vec<Command>> {
        if !params.is_empty() && params.len() != texts.len() {
            return Err(RepositoryError::validation(format!(
                "{} statements but {} parameter sets",
                texts.len(),
                params.len()
            )));
        }

        let mut params = params.into_iter();
        texts
            .iter()
            .map(|text| make(text.as_ref(), params.next().unwrap_or_default()))
            .collect()
    }

    fn procedure(name: &str, params: Params) -> Result<Command> {
        validate_procedure_name(name)?;
        Ok(Command::procedure(name, params))
    }

    // =========================================================================
    // Arbitrary statements
    // =========================================================================

    /// Run parameterized text, returning the affected row count
    pub async fn execute_query(&self, sql: &str, params: Params) -> Result<u64> {
        self.execute_one(&Command::text(sql, params)).await
    }

    /// Run several statements in one transaction
    ///
    /// `params` is either empty or holds one set per statement. Any failure
    /// rolls every statement back.
    pub async fn execute_many_queries<S: AsRef<str>>(&self, queries: &[S], params: Vec<Params>) -> Result<u64> {
        let commands = Self::pair_commands(queries, params, |sql, p| Ok(Command::text(sql, p)))?;
        self.execute_batch(&commands).await
    }

    pub async fn execute_procedure(&self, name: &str, params: Params) -> Result<u64> {
        let command = Self::procedure(name, params)?;
        self.execute_one(&command).await
    }

    /// Run several procedures in one transaction
    pub async fn execute_many_procedures<S: AsRef<str>>(&self, names: &[S], params: Vec<Params>) -> Result<u64> {
        let commands = Self::pair_commands(names, params, Self::procedure)?;
        self.execute_batch(&commands).await
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert one entity; the key column is written only when `contains_id`
    pub async fn insert(&self, entity: &E, contains_id: bool) -> Result<u64> {
        let command = self.dml().insert(entity, contains_id, Utc::now())?;
        self.execute_one(&command).await
    }

    /// Insert every entity with one multi-row statement
    pub async fn insert_many(&self, entities: &[E], contains_id: bool) -> Result<u64> {
        if entities.is_empty() {
            return Ok(0);
        }
        let command = self.dml().insert_many(entities, contains_id, Utc::now())?;
        self.execute_one(&command).await
    }

    // =========================================================================
    // Replace (full row)
    // =========================================================================

    pub async fn replace(&self, entity: &E) -> Result<u64> {
        let command = self.dml().replace(entity, Utc::now())?;
        self.execute_one(&command).await
    }

    pub async fn replace_where(&self, entity: &E, condition: &ConditionParams) -> Result<u64> {
        let command = self.dml().replace_where(entity, condition, Utc::now())?;
        self.execute_one(&command).await
    }

    pub async fn replace_many(&self, entities: &[E]) -> Result<u64> {
        let commands = self.dml().replace_many(entities, Utc::now())?;
        self.execute_batch(&commands).await
    }

    /// Replace each entity in the rows matched by its aligned condition
    pub async fn replace_many_where(&self, entities: &[E], conditions: &[ConditionParams]) -> Result<u64> {
        let commands = self.dml().replace_many_where(entities, conditions, Utc::now())?;
        self.execute_batch(&commands).await
    }

    // =========================================================================
    // Update (partial)
    // =========================================================================

    /// Update the fields in `changes` on the row keyed by its key field
    pub async fn update(&self, changes: &Changes) -> Result<u64> {
        let command = self.dml().update(changes, Utc::now())?;
        self.execute_one(&command).await
    }

    pub async fn update_where(&self, changes: &Changes, condition: &ConditionParams) -> Result<u64> {
        let command = self.dml().update_where(changes, condition, Utc::now())?;
        self.execute_one(&command).await
    }

    pub async fn update_many(&self, changes: &[Changes]) -> Result<u64> {
        let commands = self.dml().update_many(changes, Utc::now())?;
        self.execute_batch(&commands).await
    }

    pub async fn update_many_where(&self, changes: &[Changes], conditions: &[ConditionParams]) -> Result<u64> {
        let commands = self.dml().update_many_where(changes, conditions, Utc::now())?;
        self.execute_batch(&commands).await
    }

    // =========================================================================
    // Delete
    // =========================================================================

    pub async fn delete(&self, id: impl Into<Value>) -> Result<u64> {
        let command = self.dml().delete(id.into())?;
        self.execute_one(&command).await
    }

    pub async fn delete_where(&self, condition: &ConditionParams) -> Result<u64> {
        let command = self.dml().delete_where(condition)?;
        self.execute_one(&command).await
    }

    pub async fn delete_many<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Result<u64> {
        let commands = self.dml().delete_many(ids.into_iter().map(Into::into).collect())?;
        self.execute_batch(&commands).await
    }

    /// One DELETE per condition, in one transaction
    pub async fn delete_many_where(&self, conditions: &[ConditionParams]) -> Result<u64> {
        let commands = self.dml().delete_many_where(conditions)?;
        self.execute_batch(&commands).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    async fn find_one(&self, command: Command) -> Result<Option<E>> {
        let rows = self.query_rows(&command).await?;
        rows.first().map(E::from_row).transpose()
    }

    async fn get_all(&self, command: Command) -> Result<Vec<E>> {
        map_rows(&self.query_rows(&command).await?)
    }

    async fn get_pair<E2: FromRow>(&self, command: Command) -> Result<(Vec<E>, Vec<E2>)> {
        let sets = self.query_sets(&command).await?;
        Ok((map_set(&sets, 0)?, map_set(&sets, 1)?))
    }

    async fn get_triple<E2: FromRow, E3: FromRow>(
        &self,
        command: Command,
    ) -> Result<(Vec<E>, Vec<E2>, Vec<E3>)> {
        let sets = self.query_sets(&command).await?;
        Ok((map_set(&sets, 0)?, map_set(&sets, 1)?, map_set(&sets, 2)?))
    }

    /// First row of the query's result, if any
    pub async fn find_one_with_query(&self, sql: &str, params: Params) -> Result<Option<E>> {
        self.find_one(Command::text(sql, params)).await
    }

    pub async fn get_with_query(&self, sql: &str, params: Params) -> Result<Vec<E>> {
        self.get_all(Command::text(sql, params)).await
    }

    /// Read two result sets from one batch
    pub async fn get_pair_with_query<E2: FromRow>(&self, sql: &str, params: Params) -> Result<(Vec<E>, Vec<E2>)> {
        self.get_pair(Command::text(sql, params)).await
    }

    /// Read three result sets from one batch
    pub async fn get_triple_with_query<E2: FromRow, E3: FromRow>(
        &self,
        sql: &str,
        params: Params,
    ) -> Result<(Vec<E>, Vec<E2>, Vec<E3>)> {
        self.get_triple(Command::text(sql, params)).await
    }

    pub async fn find_one_with_procedure(&self, name: &str, params: Params) -> Result<Option<E>> {
        self.find_one(Self::procedure(name, params)?).await
    }

    pub async fn get_with_procedure(&self, name: &str, params: Params) -> Result<Vec<E>> {
        self.get_all(Self::procedure(name, params)?).await
    }

    pub async fn get_pair_with_procedure<E2: FromRow>(
        &self,
        name: &str,
        params: Params,
    ) -> Result<(Vec<E>, Vec<E2>)> {
        self.get_pair(Self::procedure(name, params)?).await
    }

    pub async fn get_triple_with_procedure<E2: FromRow, E3: FromRow>(
        &self,
        name: &str,
        params: Params,
    ) -> Result<(Vec<E>, Vec<E2>, Vec<E3>)> {
        self.get_triple(Self::procedure(name, params)?).await
    }

    // =========================================================================
    // Paging
    // =========================================================================

    /// Filter, sort and page `options.sql_query`
    ///
    /// Filter and sort columns are checked against the table's columns
    /// before anything is sent. Without a sort column, rows are ordered by
    /// the creation audit column.
    pub async fn get_with_paging(&self, options: PagingOptions) -> Result<PaginationResult<E>> {
        let mut options = options;
        match options.sort_column.as_deref().filter(|c| !c.is_empty()) {
            Some(column) if !self.columns.contains(column) => {
                return Err(RepositoryError::invalid_column(column));
            }
            Some(_) => {}
            None => options.sort_column = Some(self.conventions.created.clone()),
        }

        let command = options.build(Some(&self.columns))?;
        let sets = self.query_sets(&command).await?;

        let data = map_set(&sets, 0)?;
        let total_count = match sets.get(1).and_then(|rows| rows.first()) {
            Some(row) => row.get_at::<i64>(0)?,
            None => 0,
        };

        Ok(PaginationResult::new(data, total_count, options.page_size))
    }
}
