//! Store configuration.
//!
//! [`DocumentStoreConfig`] carries everything needed to reach a store and pick
//! the target database. It can be deserialized (all fields but the database
//! have defaults), parsed from a connection string, or read from the
//! environment:
//!
//! - `HFS_DOCSTORE_URL` (default: `mongodb://localhost:27017`)
//! - `HFS_DOCSTORE_DATABASE` (default: the path of the URL)
//! - `HFS_DOCSTORE_APP_NAME` (default: `helios-docstore`)
//! - `HFS_DOCSTORE_MAX_POOL_SIZE` (default: 10)
//! - `HFS_DOCSTORE_LOG_COMMANDS` (default: false)

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, StorageResult};

/// Databases reserved for the server's own use.
pub const RESERVED_DATABASES: [&str; 3] = ["admin", "local", "config"];

const MAX_DATABASE_NAME_LEN: usize = 64;
const FORBIDDEN_DATABASE_CHARS: [char; 7] = ['/', '\\', '.', ' ', '"', '$', '\0'];

/// Configuration for a document store connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    #[serde(default = "default_connection_string")]
    pub connection_string: String,

    /// Target database. Must be set explicitly.
    #[serde(default)]
    pub database: String,

    /// Application name reported to the server.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Server selection timeout in milliseconds.
    #[serde(default = "default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,

    /// Log every outgoing command at debug level.
    #[serde(default)]
    pub log_commands: bool,
}

fn default_connection_string() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_app_name() -> String {
    "helios-docstore".to_string()
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_server_selection_timeout_ms() -> u64 {
    30000
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            database: String::new(),
            app_name: default_app_name(),
            max_pool_size: default_max_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            server_selection_timeout_ms: default_server_selection_timeout_ms(),
            log_commands: false,
        }
    }
}

impl DocumentStoreConfig {
    /// Creates a configuration for `database` with default connection settings.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    /// Parses a connection string of the form
    /// `scheme://[user:pass@]host[:port][,host...]/database[?options]`.
    ///
    /// The database is taken from the URL path and validated.
    pub fn from_connection_string(url: &str) -> StorageResult<Self> {
        let database = database_from_url(url)?;
        let config = Self {
            connection_string: url.to_string(),
            database,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration from `HFS_DOCSTORE_*` environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let connection_string =
            std::env::var("HFS_DOCSTORE_URL").unwrap_or_else(|_| default_connection_string());
        let database = match std::env::var("HFS_DOCSTORE_DATABASE") {
            Ok(name) => name,
            Err(_) => database_from_url(&connection_string)?,
        };
        let config = Self {
            connection_string,
            database,
            app_name: std::env::var("HFS_DOCSTORE_APP_NAME")
                .unwrap_or_else(|_| default_app_name()),
            max_pool_size: std::env::var("HFS_DOCSTORE_MAX_POOL_SIZE")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_max_pool_size),
            log_commands: std::env::var("HFS_DOCSTORE_LOG_COMMANDS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the target database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the connection string.
    pub fn with_connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection_string = url.into();
        self
    }

    /// Enables or disables command logging.
    pub fn with_command_logging(mut self, enabled: bool) -> Self {
        self.log_commands = enabled;
        self
    }

    /// Checks the configuration without contacting the store.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.connection_string.contains("://") {
            return Err(ConfigurationError::InvalidConnectionString {
                message: format!("'{}' has no scheme", self.connection_string),
            });
        }
        validate_database_name(&self.database)
    }
}

/// Checks that `name` can be used as the target database.
///
/// Empty names, the reserved databases (`admin`, `local`, `config`, compared
/// case-insensitively) and names the server would reject are refused.
pub fn validate_database_name(name: &str) -> Result<(), ConfigurationError> {
    if name.is_empty() {
        return Err(ConfigurationError::MissingDatabaseName);
    }
    if RESERVED_DATABASES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(ConfigurationError::ReservedDatabaseName {
            name: name.to_string(),
        });
    }
    if name.len() >= MAX_DATABASE_NAME_LEN {
        return Err(ConfigurationError::InvalidDatabaseName {
            name: name.to_string(),
            reason: format!("must be shorter than {} bytes", MAX_DATABASE_NAME_LEN),
        });
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_DATABASE_CHARS.contains(c)) {
        return Err(ConfigurationError::InvalidDatabaseName {
            name: name.to_string(),
            reason: format!("contains forbidden character {:?}", c),
        });
    }
    Ok(())
}

fn database_from_url(url: &str) -> Result<String, ConfigurationError> {
    let (_, rest) = url
        .split_once("://")
        .ok_or_else(|| ConfigurationError::InvalidConnectionString {
            message: format!("'{}' has no scheme", url),
        })?;

    // Option values may contain '@', so drop them before looking for
    // credentials. Credentials may contain '/', so only look after the last '@'.
    let without_options = rest.split_once('?').map_or(rest, |(head, _)| head);
    let after_credentials = without_options
        .rsplit_once('@')
        .map_or(without_options, |(_, hosts)| hosts);
    let database = after_credentials
        .split_once('/')
        .map_or("", |(_, path)| path);
    Ok(database.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DocumentStoreConfig::default();
        assert_eq!(config.connection_string, "mongodb://localhost:27017");
        assert_eq!(config.max_pool_size, 10);
        assert!(!config.log_commands);
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::MissingDatabaseName)
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: DocumentStoreConfig =
            serde_json::from_str(r#"{"database": "clinic", "log_commands": true}"#).unwrap();
        assert_eq!(config.database, "clinic");
        assert!(config.log_commands);
        assert_eq!(config.app_name, "helios-docstore");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_connection_string() {
        let config = DocumentStoreConfig::from_connection_string(
            "mongodb://user:p/ss@db1:27017,db2:27017/clinic?replicaSet=rs0",
        )
        .unwrap();
        assert_eq!(config.database, "clinic");

        let err =
            DocumentStoreConfig::from_connection_string("mongodb://localhost:27017").unwrap_err();
        assert!(err.is_configuration());

        let err = DocumentStoreConfig::from_connection_string("mongodb://localhost/admin")
            .unwrap_err();
        assert!(err.is_configuration());

        assert!(DocumentStoreConfig::from_connection_string("localhost/clinic").is_err());
    }

    #[test]
    fn test_from_connection_string_with_at_in_options() {
        let config = DocumentStoreConfig::from_connection_string(
            "mongodb://host:27017/clinic?tlsCertificateKeyFile=/certs/svc@prod.pem",
        )
        .unwrap();
        assert_eq!(config.database, "clinic");

        let config = DocumentStoreConfig::from_connection_string(
            "mongodb://user:pw@host/ward_b?authMechanism=PLAIN&appName=a@b",
        )
        .unwrap();
        assert_eq!(config.database, "ward_b");

        let err = DocumentStoreConfig::from_connection_string("mongodb://host?appName=a@b/c")
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_database_name_rules() {
        assert!(validate_database_name("clinic").is_ok());
        assert!(validate_database_name("clinic_2024-prod").is_ok());

        assert_eq!(
            validate_database_name(""),
            Err(ConfigurationError::MissingDatabaseName)
        );
        for reserved in ["admin", "local", "config", "Admin"] {
            assert!(matches!(
                validate_database_name(reserved),
                Err(ConfigurationError::ReservedDatabaseName { .. })
            ));
        }
        for bad in ["a.b", "a b", "a/b", "a$b", "a\"b"] {
            assert!(matches!(
                validate_database_name(bad),
                Err(ConfigurationError::InvalidDatabaseName { .. })
            ));
        }
        assert!(validate_database_name(&"x".repeat(64)).is_err());
        assert!(validate_database_name(&"x".repeat(63)).is_ok());
    }
}
