//! Configuration for repositories and the PostgreSQL connection provider
//!
//! Provides a builder pattern for connection settings and the column naming
//! conventions (key column, audit columns) a repository works with.

use std::time::Duration;

/// Names of the key column and the two audit columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConventions {
    /// Primary key column (default: "Id")
    pub id: String,
    /// Set once at creation (default: "CreatedMoment")
    pub created: String,
    /// Rewritten on every update or replace (default: "ModifiedMoment")
    pub modified: String,
}

impl Default for ColumnConventions {
    fn default() -> Self {
        Self {
            id: "Id".to_string(),
            created: "CreatedMoment".to_string(),
            modified: "ModifiedMoment".to_string(),
        }
    }
}

impl ColumnConventions {
    /// Set the key column name
    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.id = name.into();
        self
    }

    /// Set the creation audit column name
    pub fn created_column(mut self, name: impl Into<String>) -> Self {
        self.created = name.into();
        self
    }

    /// Set the modification audit column name
    pub fn modified_column(mut self, name: impl Into<String>) -> Self {
        self.modified = name.into();
        self
    }

    pub fn is_id(&self, column: &str) -> bool {
        column.eq_ignore_ascii_case(&self.id)
    }

    pub fn is_audit(&self, column: &str) -> bool {
        column.eq_ignore_ascii_case(&self.created) || column.eq_ignore_ascii_case(&self.modified)
    }
}

/// Connection settings for [`crate::postgres::PgConnectionProvider`]
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// PostgreSQL database URL
    pub database_url: String,
    /// Upper bound on pooled connections (default: 10)
    pub max_connections: u32,
    /// Connections kept open while idle (default: 0)
    pub min_connections: u32,
    /// How long to wait for a free connection (default: 30s)
    pub acquire_timeout: Duration,
    /// Restrict column introspection to one schema and make it the
    /// `search_path` of pooled connections (default: any, server path)
    pub schema: Option<String>,
}

impl ConnectionConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(database_url)
    }
}

/// Builder for ConnectionConfig
#[derive(Debug)]
pub struct ConnectionConfigBuilder {
    database_url: String,
    max_connections: u32,
    min_connections: u32,
    acquire_timeout: Duration,
    schema: Option<String>,
}

impl ConnectionConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            schema: None,
        }
    }

    /// Set the maximum pool size (default: 10)
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the minimum idle pool size (default: 0)
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the connection acquire timeout (default: 30s)
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Introspect and resolve unqualified names in a schema such as "public"
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            database_url: self.database_url,
            max_connections: self.max_connections,
            min_connections: self.min_connections.min(self.max_connections),
            acquire_timeout: self.acquire_timeout,
            schema: self.schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // ColumnConventions Tests
    // =========================================================================

    #[test]
    fn test_conventions_default() {
        let c = ColumnConventions::default();
        assert_eq!(c.id, "Id");
        assert_eq!(c.created, "CreatedMoment");
        assert_eq!(c.modified, "ModifiedMoment");
    }

    #[test]
    fn test_conventions_case_insensitive_checks() {
        let c = ColumnConventions::default();
        assert!(c.is_id("id"));
        assert!(c.is_id("ID"));
        assert!(c.is_audit("createdmoment"));
        assert!(c.is_audit("MODIFIEDMOMENT"));
        assert!(!c.is_audit("FirstName"));
    }

    #[test]
    fn test_conventions_custom_names() {
        let c = ColumnConventions::default()
            .id_column("person_id")
            .created_column("created_at")
            .modified_column("updated_at");

        assert!(c.is_id("person_id"));
        assert!(!c.is_id("Id"));
        assert!(c.is_audit("updated_at"));
        assert!(!c.is_audit("CreatedMoment"));
    }

    // =========================================================================
    // ConnectionConfig Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::builder("postgres://localhost/test").build();

        assert_eq!(config.database_url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert!(config.schema.is_none());
    }

    #[test]
    fn test_full_custom_config() {
        let config = ConnectionConfig::builder(String::from("postgres://localhost/db"))
            .max_connections(4)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .schema("public")
            .build();

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.schema.as_deref(), Some("public"));
    }

    #[test]
    fn test_min_connections_clamped_to_max() {
        let config = ConnectionConfig::builder("postgres://localhost/test")
            .max_connections(2)
            .min_connections(8)
            .build();

        assert_eq!(config.min_connections, 2);
    }

    #[test]
    fn test_builder_debug() {
        let builder = ConnectionConfig::builder("postgres://localhost/test");
        let debug_str = format!("{:?}", builder);
        assert!(debug_str.contains("ConnectionConfigBuilder"));
    }
}
