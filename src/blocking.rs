//! Synchronous repository surface
//!
//! [`BlockingRepository`] owns a current-thread tokio runtime and drives the
//! async [`Repository`] on it, so both forms share one implementation. Do
//! not call it from inside an async context; use [`Repository`] there.

use tokio::runtime::{Builder, Runtime};

use crate::config::{ColumnConventions, ConnectionConfig};
use crate::connection::ConnectionProvider;
use crate::entity::{Changes, Entity};
use crate::error::Result;
use crate::postgres::PgConnectionProvider;
use crate::repository::Repository;
use crate::schema::ColumnSet;
use crate::sql::condition::ConditionParams;
use crate::sql::pipeline::{PaginationResult, PagingOptions};
use crate::types::{FromRow, Params, Value};

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

/// Blocking wrapper around [`Repository`]
pub struct BlockingRepository<E, P> {
    inner: Repository<E, P>,
    runtime: Runtime,
}

impl<E: Entity> BlockingRepository<E, PgConnectionProvider> {
    /// Connect to PostgreSQL and introspect the entity's table
    ///
    /// The pool is created on this wrapper's runtime, which then drives
    /// every connection it hands out.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        Self::connect_with_conventions(config, ColumnConventions::default())
    }

    pub fn connect_with_conventions(config: &ConnectionConfig, conventions: ColumnConventions) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(async {
            let provider = PgConnectionProvider::connect(config).await?;
            Repository::with_conventions(provider, conventions).await
        })?;
        Ok(Self { inner, runtime })
    }
}

impl<E, P> BlockingRepository<E, P>
where
    E: Entity,
    P: ConnectionProvider,
{
    pub fn new(provider: P) -> Result<Self> {
        Self::with_conventions(provider, ColumnConventions::default())
    }

    pub fn with_conventions(provider: P, conventions: ColumnConventions) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(Repository::with_conventions(provider, conventions))?;
        Ok(Self { inner, runtime })
    }

    pub fn with_column_set(provider: P, columns: Vec<String>, conventions: ColumnConventions) -> Result<Self> {
        Ok(Self {
            inner: Repository::with_column_set(provider, columns, conventions),
            runtime: runtime()?,
        })
    }

    /// The async repository this wrapper drives
    pub fn inner(&self) -> &Repository<E, P> {
        &self.inner
    }

    pub fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    pub fn columns(&self) -> &ColumnSet {
        self.inner.columns()
    }

    pub fn execute_query(&self, sql: &str, params: Params) -> Result<u64> {
        self.runtime.block_on(self.inner.execute_query(sql, params))
    }

    pub fn execute_many_queries<S: AsRef<str>>(&self, queries: &[S], params: Vec<Params>) -> Result<u64> {
        self.runtime.block_on(self.inner.execute_many_queries(queries, params))
    }

    pub fn execute_procedure(&self, name: &str, params: Params) -> Result<u64> {
        self.runtime.block_on(self.inner.execute_procedure(name, params))
    }

    pub fn execute_many_procedures<S: AsRef<str>>(&self, names: &[S], params: Vec<Params>) -> Result<u64> {
        self.runtime.block_on(self.inner.execute_many_procedures(names, params))
    }

    pub fn insert(&self, entity: &E, contains_id: bool) -> Result<u64> {
        self.runtime.block_on(self.inner.insert(entity, contains_id))
    }

    pub fn insert_many(&self, entities: &[E], contains_id: bool) -> Result<u64> {
        self.runtime.block_on(self.inner.insert_many(entities, contains_id))
    }

    pub fn replace(&self, entity: &E) -> Result<u64> {
        self.runtime.block_on(self.inner.replace(entity))
    }

    pub fn replace_where(&self, entity: &E, condition: &ConditionParams) -> Result<u64> {
        self.runtime.block_on(self.inner.replace_where(entity, condition))
    }

    pub fn replace_many(&self, entities: &[E]) -> Result<u64> {
        self.runtime.block_on(self.inner.replace_many(entities))
    }

    pub fn replace_many_where(&self, entities: &[E], conditions: &[ConditionParams]) -> Result<u64> {
        self.runtime.block_on(self.inner.replace_many_where(entities, conditions))
    }

    pub fn update(&self, changes: &Changes) -> Result<u64> {
        self.runtime.block_on(self.inner.update(changes))
    }

    pub fn update_where(&self, changes: &Changes, condition: &ConditionParams) -> Result<u64> {
        self.runtime.block_on(self.inner.update_where(changes, condition))
    }

    pub fn update_many(&self, changes: &[Changes]) -> Result<u64> {
        self.runtime.block_on(self.inner.update_many(changes))
    }

    pub fn update_many_where(&self, changes: &[Changes], conditions: &[ConditionParams]) -> Result<u64> {
        self.runtime.block_on(self.inner.update_many_where(changes, conditions))
    }

    pub fn delete(&self, id: impl Into<Value>) -> Result<u64> {
        self.runtime.block_on(self.inner.delete(id))
    }

    pub fn delete_where(&self, condition: &ConditionParams) -> Result<u64> {
        self.runtime.block_on(self.inner.delete_where(condition))
    }

    pub fn delete_many<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Result<u64> {
        self.runtime.block_on(self.inner.delete_many(ids))
    }

    pub fn delete_many_where(&self, conditions: &[ConditionParams]) -> Result<u64> {
        self.runtime.block_on(self.inner.delete_many_where(conditions))
    }

    pub fn find_one_with_query(&self, sql: &str, params: Params) -> Result<Option<E>> {
        self.runtime.block_on(self.inner.find_one_with_query(sql, params))
    }

    pub fn get_with_query(&self, sql: &str, params: Params) -> Result<Vec<E>> {
        self.runtime.block_on(self.inner.get_with_query(sql, params))
    }

    pub fn get_pair_with_query<E2: FromRow>(&self, sql: &str, params: Params) -> Result<(Vec<E>, Vec<E2>)> {
        self.runtime.block_on(self.inner.get_pair_with_query(sql, params))
    }

    pub fn get_triple_with_query<E2: FromRow, E3: FromRow>(
        &self,
        sql: &str,
        params: Params,
    ) -> Result<(Vec<E>, Vec<E2>, Vec<E3>)> {
        self.runtime.block_on(self.inner.get_triple_with_query(sql, params))
    }

    pub fn find_one_with_procedure(&self, name: &str, params: Params) -> Result<Option<E>> {
        self.runtime.block_on(self.inner.find_one_with_procedure(name, params))
    }

    pub fn get_with_procedure(&self, name: &str, params: Params) -> Result<Vec<E>> {
        self.runtime.block_on(self.inner.get_with_procedure(name, params))
    }

    pub fn get_pair_with_procedure<E2: FromRow>(&self, name: &str, params: Params) -> Result<(Vec<E>, Vec<E2>)> {
        self.runtime.block_on(self.inner.get_pair_with_procedure(name, params))
    }

    pub fn get_triple_with_procedure<E2: FromRow, E3: FromRow>(
        &self,
        name: &str,
        params: Params,
    ) -> Result<(Vec<E>, Vec<E2>, Vec<E3>)> {
        self.runtime.block_on(self.inner.get_triple_with_procedure(name, params))
    }

    pub fn get_with_paging(&self, options: PagingOptions) -> Result<PaginationResult<E>> {
        self.runtime.block_on(self.inner.get_with_paging(options))
    }
}
