//! DML generation for entity tables
//!
//! Builds INSERT, UPDATE and DELETE commands from an entity's declared
//! fields intersected with the table's introspected columns. Batch forms
//! suffix every parameter with the row's position so rows never collide
//! inside one combined statement.

use chrono::{DateTime, Utc};

use crate::config::ColumnConventions;
use crate::connection::Command;
use crate::entity::{Changes, Entity};
use crate::error::{RepositoryError, Result};
use crate::schema::ColumnSet;
use crate::sql::condition::{ConditionParams, build_condition_clause};
use crate::sql::sanitize::{indexed_param_name, param_name, quote_identifier};
use crate::types::{Params, Value};

fn placeholder(column: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => indexed_param_name(column, i),
        None => param_name(column),
    }
}

/// Add a parameter, failing if another column already produced its name
///
/// Distinct columns such as `Zip Code` and `Zip_Code` share one parameter
/// name once sanitized.
fn bind_unique(params: &mut Params, name: &str, value: impl Into<Value>) -> Result<()> {
    if params.contains(name) {
        return Err(RepositoryError::validation(format!(
            "Parameter name '@{}' is produced by more than one column",
            name
        )));
    }
    params.add(name, value);
    Ok(())
}

/// DML generator for one table
pub struct DmlGenerator<'a> {
    table: String,
    columns: &'a ColumnSet,
    conventions: &'a ColumnConventions,
}

impl<'a> DmlGenerator<'a> {
    /// Create a generator for `table_name` over its introspected columns
    pub fn new(table_name: &str, columns: &'a ColumnSet, conventions: &'a ColumnConventions) -> Self {
        Self {
            table: quote_identifier(table_name),
            columns,
            conventions,
        }
    }

    fn key_column(&self) -> Result<&'a str> {
        self.columns
            .resolve(&self.conventions.id)
            .ok_or_else(|| RepositoryError::invalid_column(self.conventions.id.clone()))
    }

    fn created_column(&self) -> Option<&'a str> {
        self.columns.resolve(&self.conventions.created)
    }

    fn modified_column(&self) -> Option<&'a str> {
        self.columns.resolve(&self.conventions.modified)
    }

    /// Filtered columns the entity declares, optionally without the key
    fn entity_columns<E: Entity>(&self, include_id: bool) -> Result<Vec<&'a str>> {
        let columns: Vec<&str> = self
            .columns
            .filtered()
            .iter()
            .map(String::as_str)
            .filter(|c| E::declares(c))
            .filter(|c| include_id || !self.conventions.is_id(c))
            .collect();

        if columns.is_empty() {
            return Err(RepositoryError::validation(format!(
                "{} declares no writable columns of {}",
                E::NAME,
                self.table
            )));
        }
        Ok(columns)
    }

    fn key_value<E: Entity>(&self, entity: &E) -> Result<Value> {
        let value = entity.column_value(&self.conventions.id);
        if value.is_null() {
            return Err(RepositoryError::validation(format!(
                "{} has no value for key column '{}'",
                E::NAME,
                self.conventions.id
            )));
        }
        Ok(value)
    }

    /// Resolve a change set to `(column, value)` pairs for a SET clause
    ///
    /// Unknown names fail; the key and audit columns are never settable.
    fn set_columns(&self, changes: &Changes) -> Result<Vec<(&'a str, Value)>> {
        let mut set = Vec::new();
        for (field, value) in changes.iter() {
            let column = self
                .columns
                .resolve(field)
                .ok_or_else(|| RepositoryError::invalid_column(field))?;
            if self.conventions.is_id(column) || self.conventions.is_audit(column) {
                continue;
            }
            set.push((column, value.clone()));
        }

        if set.is_empty() {
            return Err(RepositoryError::validation(
                "Changes contain no updatable columns",
            ));
        }
        Ok(set)
    }

    fn changes_key(&self, changes: &Changes) -> Result<Value> {
        match changes.get(&self.conventions.id) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(RepositoryError::validation(format!(
                "Update by key requires a value for '{}'",
                self.conventions.id
            ))),
        }
    }

    /// `SET [a] = @a, ..., [ModifiedMoment] = @ModifiedMoment`
    fn set_clause(
        &self,
        assignments: Vec<(&str, Value)>,
        index: Option<usize>,
        now: DateTime<Utc>,
        params: &mut Params,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(assignments.len() + 1);
        for (column, value) in assignments {
            let name = placeholder(column, index);
            parts.push(format!("{} = @{}", quote_identifier(column), name));
            bind_unique(params, &name, value)?;
        }
        if let Some(modified) = self.modified_column() {
            let name = placeholder(modified, index);
            parts.push(format!("{} = @{}", quote_identifier(modified), name));
            bind_unique(params, &name, now)?;
        }
        Ok(format!("SET {}", parts.join(", ")))
    }

    /// `WHERE [Id] = @Id`
    fn key_clause(&self, key: Value, index: Option<usize>, params: &mut Params) -> Result<String> {
        let column = self.key_column()?;
        let name = placeholder(column, index);
        bind_unique(params, &name, key)?;
        Ok(format!("WHERE {} = @{}", quote_identifier(column), name))
    }

    fn condition_clause(
        &self,
        condition: &ConditionParams,
        index: usize,
        params: &mut Params,
    ) -> Result<String> {
        let clause = build_condition_clause(condition, Some(self.columns), index)?;
        for (name, value) in clause.params.iter() {
            bind_unique(params, name, value.clone())?;
        }
        Ok(clause.where_clause)
    }

    // =========================================================================
    // INSERT
    // =========================================================================

    fn insert_header(&self, columns: &[&str]) -> String {
        let mut names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        if let Some(created) = self.created_column() {
            names.push(quote_identifier(created));
        }
        format!("INSERT INTO {} ({}) VALUES", self.table, names.join(", "))
    }

    fn insert_tuple<E: Entity>(
        &self,
        entity: &E,
        columns: &[&str],
        index: Option<usize>,
        now: DateTime<Utc>,
        params: &mut Params,
    ) -> Result<String> {
        let mut placeholders = Vec::with_capacity(columns.len() + 1);
        for column in columns {
            let name = placeholder(column, index);
            placeholders.push(format!("@{}", name));
            bind_unique(params, &name, entity.column_value(column))?;
        }
        if let Some(created) = self.created_column() {
            let name = placeholder(created, index);
            placeholders.push(format!("@{}", name));
            bind_unique(params, &name, now)?;
        }
        Ok(format!("({})", placeholders.join(", ")))
    }

    /// Single-row INSERT; the key column is left out unless `contains_id`
    pub fn insert<E: Entity>(&self, entity: &E, contains_id: bool, now: DateTime<Utc>) -> Result<Command> {
        let columns = self.entity_columns::<E>(contains_id)?;
        let mut params = Params::new();
        let tuple = self.insert_tuple(entity, &columns, None, now, &mut params)?;
        let text = format!("{} {}", self.insert_header(&columns), tuple);
        Ok(Command::text(text, params))
    }

    /// One multi-row INSERT with per-row indexed parameters
    pub fn insert_many<E: Entity>(
        &self,
        entities: &[E],
        contains_id: bool,
        now: DateTime<Utc>,
    ) -> Result<Command> {
        let columns = self.entity_columns::<E>(contains_id)?;
        let mut params = Params::new();
        let tuples = entities
            .iter()
            .enumerate()
            .map(|(i, entity)| self.insert_tuple(entity, &columns, Some(i), now, &mut params))
            .collect::<Result<Vec<_>>>()?;
        let text = format!("{} {}", self.insert_header(&columns), tuples.join(", "));
        Ok(Command::text(text, params))
    }

    // =========================================================================
    // UPDATE (full row)
    // =========================================================================

    fn replace_assignments<E: Entity>(&self, entity: &E) -> Result<Vec<(&'a str, Value)>> {
        Ok(self
            .entity_columns::<E>(false)?
            .into_iter()
            .map(|c| (c, entity.column_value(c)))
            .collect())
    }

    fn replace_by_key<E: Entity>(&self, entity: &E, index: Option<usize>, now: DateTime<Utc>) -> Result<Command> {
        let key = self.key_value(entity)?;
        let mut params = Params::new();
        let set = self.set_clause(self.replace_assignments(entity)?, index, now, &mut params)?;
        let filter = self.key_clause(key, index, &mut params)?;
        Ok(Command::text(format!("UPDATE {} {} {}", self.table, set, filter), params))
    }

    fn replace_by_condition<E: Entity>(
        &self,
        entity: &E,
        condition: &ConditionParams,
        index: usize,
        indexed: bool,
        now: DateTime<Utc>,
    ) -> Result<Command> {
        let mut params = Params::new();
        let set = self.set_clause(
            self.replace_assignments(entity)?,
            indexed.then_some(index),
            now,
            &mut params,
        )?;
        let filter = self.condition_clause(condition, index, &mut params)?;
        Ok(Command::text(format!("UPDATE {} {} {}", self.table, set, filter), params))
    }

    /// Full-row UPDATE keyed by the entity's key value
    pub fn replace<E: Entity>(&self, entity: &E, now: DateTime<Utc>) -> Result<Command> {
        self.replace_by_key(entity, None, now)
    }

    /// Full-row UPDATE of every row matching `condition`
    pub fn replace_where<E: Entity>(
        &self,
        entity: &E,
        condition: &ConditionParams,
        now: DateTime<Utc>,
    ) -> Result<Command> {
        self.replace_by_condition(entity, condition, 0, false, now)
    }

    /// One keyed UPDATE per entity
    pub fn replace_many<E: Entity>(&self, entities: &[E], now: DateTime<Utc>) -> Result<Vec<Command>> {
        entities
            .iter()
            .enumerate()
            .map(|(i, entity)| self.replace_by_key(entity, Some(i), now))
            .collect()
    }

    /// One conditioned UPDATE per entity; `conditions` must align 1:1
    pub fn replace_many_where<E: Entity>(
        &self,
        entities: &[E],
        conditions: &[ConditionParams],
        now: DateTime<Utc>,
    ) -> Result<Vec<Command>> {
        ensure_aligned(entities.len(), conditions.len())?;
        entities
            .iter()
            .zip(conditions)
            .enumerate()
            .map(|(i, (entity, condition))| self.replace_by_condition(entity, condition, i, true, now))
            .collect()
    }

    // =========================================================================
    // UPDATE (partial)
    // =========================================================================

    fn update_by_key(&self, changes: &Changes, index: Option<usize>, now: DateTime<Utc>) -> Result<Command> {
        let key = self.changes_key(changes)?;
        let mut params = Params::new();
        let set = self.set_clause(self.set_columns(changes)?, index, now, &mut params)?;
        let filter = self.key_clause(key, index, &mut params)?;
        Ok(Command::text(format!("UPDATE {} {} {}", self.table, set, filter), params))
    }

    fn update_by_condition(
        &self,
        changes: &Changes,
        condition: &ConditionParams,
        index: usize,
        indexed: bool,
        now: DateTime<Utc>,
    ) -> Result<Command> {
        let mut params = Params::new();
        let set = self.set_clause(
            self.set_columns(changes)?,
            indexed.then_some(index),
            now,
            &mut params,
        )?;
        let filter = self.condition_clause(condition, index, &mut params)?;
        Ok(Command::text(format!("UPDATE {} {} {}", self.table, set, filter), params))
    }

    /// Partial UPDATE keyed by the key value carried in `changes`
    pub fn update(&self, changes: &Changes, now: DateTime<Utc>) -> Result<Command> {
        self.update_by_key(changes, None, now)
    }

    /// Partial UPDATE of every row matching `condition`
    pub fn update_where(
        &self,
        changes: &Changes,
        condition: &ConditionParams,
        now: DateTime<Utc>,
    ) -> Result<Command> {
        self.update_by_condition(changes, condition, 0, false, now)
    }

    pub fn update_many(&self, changes: &[Changes], now: DateTime<Utc>) -> Result<Vec<Command>> {
        changes
            .iter()
            .enumerate()
            .map(|(i, c)| self.update_by_key(c, Some(i), now))
            .collect()
    }

    pub fn update_many_where(
        &self,
        changes: &[Changes],
        conditions: &[ConditionParams],
        now: DateTime<Utc>,
    ) -> Result<Vec<Command>> {
        ensure_aligned(changes.len(), conditions.len())?;
        changes
            .iter()
            .zip(conditions)
            .enumerate()
            .map(|(i, (c, condition))| self.update_by_condition(c, condition, i, true, now))
            .collect()
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    fn delete_by_key(&self, id: Value, index: Option<usize>) -> Result<Command> {
        let mut params = Params::new();
        let filter = self.key_clause(id, index, &mut params)?;
        Ok(Command::text(format!("DELETE FROM {} {}", self.table, filter), params))
    }

    pub fn delete(&self, id: Value) -> Result<Command> {
        self.delete_by_key(id, None)
    }

    pub fn delete_where(&self, condition: &ConditionParams) -> Result<Command> {
        let mut params = Params::new();
        let filter = self.condition_clause(condition, 0, &mut params)?;
        Ok(Command::text(format!("DELETE FROM {} {}", self.table, filter), params))
    }

    pub fn delete_many(&self, ids: Vec<Value>) -> Result<Vec<Command>> {
        ids.into_iter()
            .enumerate()
            .map(|(i, id)| self.delete_by_key(id, Some(i)))
            .collect()
    }

    pub fn delete_many_where(&self, conditions: &[ConditionParams]) -> Result<Vec<Command>> {
        conditions
            .iter()
            .enumerate()
            .map(|(i, condition)| {
                let mut params = Params::new();
                let filter = self.condition_clause(condition, i, &mut params)?;
                Ok(Command::text(format!("DELETE FROM {} {}", self.table, filter), params))
            })
            .collect()
    }
}

fn ensure_aligned(rows: usize, conditions: usize) -> Result<()> {
    if rows != conditions {
        return Err(RepositoryError::malformed(format!(
            "{} rows but {} conditions; each row needs exactly one condition",
            rows, conditions
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::condition::ComparisonOperator;
    use crate::types::{FromRow, Row};

    struct Person {
        id: i64,
        name: String,
    }

    impl FromRow for Person {
        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get("Id")?,
                name: row.get("Name")?,
            })
        }
    }

    impl Entity for Person {
        const NAME: &'static str = "Person";
        const FIELDS: &'static [&'static str] = &["Id", "Name"];

        fn value_of(&self, field: &str) -> Option<Value> {
            match field {
                "Id" => Some(self.id.into()),
                "Name" => Some(self.name.clone().into()),
                _ => None,
            }
        }
    }

    fn people_columns() -> ColumnSet {
        ColumnSet::from_columns(
            ["Id", "Name", "CreatedMoment", "ModifiedMoment"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            &ColumnConventions::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn pair() -> Vec<Person> {
        vec![
            Person {
                id: 1,
                name: "A".to_string(),
            },
            Person {
                id: 2,
                name: "B".to_string(),
            },
        ]
    }

    // ==================== INSERT ====================

    #[test]
    fn test_insert_excludes_id() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let command = dml.insert(&pair()[0], false, now()).unwrap();

        assert_eq!(
            command.text,
            "INSERT INTO [People] ([Name], [CreatedMoment]) VALUES (@Name, @CreatedMoment)"
        );
        assert_eq!(command.params.get("Name"), Some(&Value::from("A")));
        assert_eq!(command.params.get("CreatedMoment"), Some(&Value::Timestamp(now())));
        assert!(!command.params.contains("Id"));
    }

    #[test]
    fn test_insert_with_id() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let command = dml.insert(&pair()[0], true, now()).unwrap();

        assert!(command.text.starts_with("INSERT INTO [People] ([Id], [Name], [CreatedMoment])"));
        assert_eq!(command.params.get("Id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_insert_many_single_statement() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let command = dml.insert_many(&pair(), false, now()).unwrap();

        assert_eq!(
            command.text,
            "INSERT INTO [People] ([Name], [CreatedMoment]) VALUES \
             (@Name_0, @CreatedMoment_0), (@Name_1, @CreatedMoment_1)"
        );
        assert!(!command.text.contains("[Id]"));
        assert!(command.params.contains("CreatedMoment_0"));
        assert!(command.params.contains("CreatedMoment_1"));
        assert_eq!(command.params.get("Name_1"), Some(&Value::from("B")));
        assert_eq!(command.params.len(), 4);
    }

    // ==================== REPLACE ====================

    #[test]
    fn test_replace_by_key() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let command = dml.replace(&pair()[1], now()).unwrap();

        assert_eq!(
            command.text,
            "UPDATE [People] SET [Name] = @Name, [ModifiedMoment] = @ModifiedMoment WHERE [Id] = @Id"
        );
        assert_eq!(command.params.get("Id"), Some(&Value::Int(2)));
        assert!(!command.text.contains("[CreatedMoment]"));
    }

    #[test]
    fn test_replace_where() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let command = dml
            .replace_where(&pair()[0], &ConditionParams::eq("Name", "Old"), now())
            .unwrap();

        assert_eq!(
            command.text,
            "UPDATE [People] SET [Name] = @Name, [ModifiedMoment] = @ModifiedMoment \
             WHERE [Name] = @cond_0_0"
        );
        assert_eq!(command.params.get("cond_0_0"), Some(&Value::from("Old")));
        assert_eq!(command.params.get("Name"), Some(&Value::from("A")));
    }

    #[test]
    fn test_replace_many_indexes_rows() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let commands = dml.replace_many(&pair(), now()).unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[1].text,
            "UPDATE [People] SET [Name] = @Name_1, [ModifiedMoment] = @ModifiedMoment_1 \
             WHERE [Id] = @Id_1"
        );
    }

    #[test]
    fn test_replace_many_where_misaligned() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let err = dml
            .replace_many_where(&pair(), &[ConditionParams::eq("Id", 1)], now())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MalformedCondition(_)));
    }

    #[test]
    fn test_replace_many_where_indexes_conditions() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let commands = dml
            .replace_many_where(
                &pair(),
                &[ConditionParams::eq("Id", 1), ConditionParams::eq("Id", 2)],
                now(),
            )
            .unwrap();

        assert!(commands[1].text.ends_with("WHERE [Id] = @cond_0_1"));
        assert!(commands[1].params.contains("Name_1"));
    }

    // ==================== UPDATE ====================

    #[test]
    fn test_update_excludes_id_from_set() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let changes = Changes::new().set("Id", 9).set("Name", "Z");
        let command = dml.update(&changes, now()).unwrap();

        assert_eq!(
            command.text,
            "UPDATE [People] SET [Name] = @Name, [ModifiedMoment] = @ModifiedMoment WHERE [Id] = @Id"
        );
        assert_eq!(command.params.get("Id"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_update_requires_key() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let err = dml.update(&Changes::new().set("Name", "Z"), now()).unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[test]
    fn test_update_unknown_field() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let changes = Changes::new().set("Id", 1).set("Salary", 10);
        let err = dml.update(&changes, now()).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidColumn(ref c) if c == "Salary"));
    }

    #[test]
    fn test_update_ignores_audit_fields() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let changes = Changes::new()
            .set("Id", 1)
            .set("CreatedMoment", now())
            .set("Name", "Z");
        let command = dml.update(&changes, now()).unwrap();
        assert!(!command.text.contains("[CreatedMoment]"));

        let only_audit = Changes::new().set("Id", 1).set("CreatedMoment", now());
        assert!(dml.update(&only_audit, now()).is_err());
    }

    #[test]
    fn test_update_many_where_excludes_id_consistently() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let changes = vec![Changes::new().set("Id", 1).set("Name", "Q")];
        let commands = dml
            .update_many_where(
                &changes,
                &[ConditionParams::eq("Name", "P").or("Id", ComparisonOperator::Gt, 5)],
                now(),
            )
            .unwrap();

        assert_eq!(
            commands[0].text,
            "UPDATE [People] SET [Name] = @Name_0, [ModifiedMoment] = @ModifiedMoment_0 \
             WHERE [Name] = @cond_0_0 OR [Id] > @cond_1_0"
        );
    }

    // ==================== Parameter names ====================

    struct Address {
        zip_spaced: String,
        zip_underscored: String,
    }

    impl FromRow for Address {
        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                zip_spaced: row.get("Zip Code")?,
                zip_underscored: row.get("Zip_Code")?,
            })
        }
    }

    impl Entity for Address {
        const NAME: &'static str = "Address";
        const FIELDS: &'static [&'static str] = &["Id", "Zip Code", "Zip_Code"];

        fn value_of(&self, field: &str) -> Option<Value> {
            match field {
                "Zip Code" => Some(self.zip_spaced.clone().into()),
                "Zip_Code" => Some(self.zip_underscored.clone().into()),
                _ => None,
            }
        }
    }

    fn address_columns() -> ColumnSet {
        ColumnSet::from_columns(
            ["Id", "Zip Code", "Zip_Code"].iter().map(|c| c.to_string()).collect(),
            &ColumnConventions::default(),
        )
    }

    #[test]
    fn test_colliding_parameter_names_rejected_on_insert() {
        let columns = address_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("Addresses", &columns, &conventions);
        let address = Address {
            zip_spaced: "10115".to_string(),
            zip_underscored: "20095".to_string(),
        };

        let err = dml.insert(&address, false, now()).unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(ref m) if m.contains("@Zip_Code")));

        let err = dml.insert_many(&[address], false, now()).unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(ref m) if m.contains("@Zip_Code_0")));
    }

    #[test]
    fn test_colliding_parameter_names_rejected_on_update() {
        let columns = address_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("Addresses", &columns, &conventions);

        let changes = Changes::new().set("Id", 1).set("Zip Code", "10115").set("Zip_Code", "20095");
        assert!(dml.update(&changes, now()).unwrap_err().is_validation());

        let single = Changes::new().set("Id", 1).set("Zip Code", "10115");
        let command = dml.update(&single, now()).unwrap();
        assert_eq!(command.text, "UPDATE [Addresses] SET [Zip Code] = @Zip_Code WHERE [Id] = @Id");
    }

    #[test]
    fn test_set_column_colliding_with_condition_parameter() {
        let columns = ColumnSet::from_columns(
            ["Id", "Name", "cond_0_0"].iter().map(|c| c.to_string()).collect(),
            &ColumnConventions::default(),
        );
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let err = dml
            .update_where(
                &Changes::new().set("cond_0_0", 1),
                &ConditionParams::eq("Name", "A"),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    // ==================== DELETE ====================

    #[test]
    fn test_delete_by_key() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let command = dml.delete(Value::Int(4)).unwrap();
        assert_eq!(command.text, "DELETE FROM [People] WHERE [Id] = @Id");
    }

    #[test]
    fn test_delete_many_where() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        let commands = dml
            .delete_many_where(&[ConditionParams::eq("Name", "A"), ConditionParams::eq("Name", "B")])
            .unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].text, "DELETE FROM [People] WHERE [Name] = @cond_0_1");
    }

    #[test]
    fn test_delete_where_unknown_column() {
        let columns = people_columns();
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("People", &columns, &conventions);

        assert!(dml.delete_where(&ConditionParams::eq("Email", "x")).is_err());
    }

    #[test]
    fn test_key_column_must_exist() {
        let columns = ColumnSet::from_columns(vec!["Name".to_string()], &ColumnConventions::default());
        let conventions = ColumnConventions::default();
        let dml = DmlGenerator::new("Tags", &columns, &conventions);

        let err = dml.delete(Value::Int(1)).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidColumn(ref c) if c == "Id"));
    }
}
