//! Shared fixtures: an in-memory connection provider and a sample entity

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use generic_repository::{
    Command, Connection, ConnectionProvider, Entity, FromRow, RepositoryError, Result, Row, Value,
};

pub const PEOPLE_COLUMNS: &[&str] = &["Id", "FirstName", "LastName", "CreatedMoment", "ModifiedMoment"];

/// Everything the provider has seen, shared by all its connections
#[derive(Debug, Default)]
pub struct MemoryState {
    /// Column names per table, answered to introspection queries
    pub tables: HashMap<String, Vec<String>>,
    /// Introspection commands received
    pub introspections: Vec<Command>,
    /// Every other command received, in order
    pub sent: Vec<Command>,
    /// Commands whose effects are visible: executed outside a transaction
    /// or in one that committed
    pub committed: Vec<Command>,
    /// Scripted result sets, one entry per read command
    pub results: VecDeque<Vec<Vec<Row>>>,
    /// Fail any execute whose text contains this
    pub fail_when: Option<String>,
    pub opened: usize,
    pub closed: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that knows the People table
    pub fn with_people() -> Self {
        Self::new().table("People", PEOPLE_COLUMNS)
    }

    pub fn table(self, name: &str, columns: &[&str]) -> Self {
        self.state()
            .tables
            .insert(name.to_string(), columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn fail_when(&self, fragment: &str) {
        self.state().fail_when = Some(fragment.to_string());
    }

    /// Queue the result sets for the next read
    pub fn respond(&self, sets: Vec<Vec<Row>>) {
        self.state().results.push_back(sets);
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sent(&self) -> Vec<Command> {
        self.state().sent.clone()
    }

    pub fn committed(&self) -> Vec<Command> {
        self.state().committed.clone()
    }
}

impl ConnectionProvider for MemoryProvider {
    type Connection = MemoryConnection;

    fn create_connection(&self) -> MemoryConnection {
        MemoryConnection {
            state: Arc::clone(&self.state),
            open: false,
            pending: None,
        }
    }
}

pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    open: bool,
    pending: Option<Vec<Command>>,
}

impl MemoryConnection {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(RepositoryError::Connection("Connection is not open".to_string()))
        }
    }

    fn introspect(&self, command: &Command) -> Vec<Vec<Row>> {
        let mut state = self.state();
        state.introspections.push(command.clone());

        let mut names = Vec::new();
        if let Some(Value::Text(name)) = command.params.get("TableName") {
            names.push(name.clone());
        }
        let mut i = 0;
        while let Some(Value::Text(name)) = command.params.get(&format!("TableName{}", i)) {
            names.push(name.clone());
            i += 1;
        }

        names
            .iter()
            .map(|table| {
                state
                    .tables
                    .get(table)
                    .map(|columns| {
                        columns
                            .iter()
                            .map(|c| Row::from_pairs([("ColumnName", c.as_str())]))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }

    fn read(&self, command: &Command) -> Result<Vec<Vec<Row>>> {
        self.ensure_open()?;
        if command.text.contains("INFORMATION_SCHEMA.COLUMNS") {
            return Ok(self.introspect(command));
        }
        let mut state = self.state();
        state.sent.push(command.clone());
        Ok(state.results.pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn open(&mut self) -> Result<()> {
        if !self.open {
            self.open = true;
            self.state().opened += 1;
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(RepositoryError::execution("Transaction already in progress"));
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| RepositoryError::execution("No transaction in progress"))?;
        let mut state = self.state();
        state.committed.extend(pending);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending
            .take()
            .ok_or_else(|| RepositoryError::execution("No transaction in progress"))?;
        self.state().rollbacks += 1;
        Ok(())
    }

    async fn execute(&mut self, command: &Command) -> Result<u64> {
        self.ensure_open()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sent.push(command.clone());

        if let Some(fragment) = &state.fail_when {
            if command.text.contains(fragment.as_str()) {
                return Err(RepositoryError::execution(format!(
                    "constraint violated by: {}",
                    command.text
                )));
            }
        }

        match self.pending.as_mut() {
            Some(pending) => pending.push(command.clone()),
            None => state.committed.push(command.clone()),
        }
        Ok(1)
    }

    async fn query(&mut self, command: &Command) -> Result<Vec<Row>> {
        Ok(self.read(command)?.into_iter().next().unwrap_or_default())
    }

    async fn query_multiple(&mut self, command: &Command) -> Result<Vec<Vec<Row>>> {
        self.read(command)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if self.open {
            self.state().closed += 1;
        }
    }
}

// ============================================================================
// Sample entity
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Person {
    pub fn new(id: i64, first_name: &str, last_name: Option<&str>) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.map(str::to_string),
        }
    }

    pub fn row(&self) -> Row {
        Row::from_pairs([
            ("Id", Value::Int(self.id)),
            ("FirstName", Value::from(self.first_name.as_str())),
            ("LastName", Value::from(self.last_name.clone())),
        ])
    }
}

impl FromRow for Person {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get("Id")?,
            first_name: row.get("FirstName")?,
            last_name: row.get("LastName")?,
        })
    }
}

impl Entity for Person {
    const NAME: &'static str = "Person";
    const FIELDS: &'static [&'static str] = &["Id", "FirstName", "LastName"];

    fn value_of(&self, field: &str) -> Option<Value> {
        match field {
            "Id" => Some(self.id.into()),
            "FirstName" => Some(self.first_name.clone().into()),
            "LastName" => Some(self.last_name.clone().into()),
            _ => None,
        }
    }
}

/// Second record type for multi-set reads
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

impl FromRow for Tag {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get("Id")?,
            label: row.get("Label")?,
        })
    }
}

pub fn tag_row(id: i64, label: &str) -> Row {
    Row::from_pairs([("Id", Value::Int(id)), ("Label", Value::from(label))])
}
