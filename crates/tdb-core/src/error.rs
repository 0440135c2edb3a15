//! Error types for tdb-core.

use thiserror::Error;

/// Result type alias using tdb-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for tenant store operations
#[derive(Error, Debug)]
pub enum Error {
    // Startup errors
    #[error("Invalid migration catalogue: {0}")]
    Configuration(#[from] RegistryError),

    #[error("Invalid value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Invalid tenant id: {0:?}")]
    InvalidTenantId(String),

    // Migration errors
    #[error("Schema inspection failed: {source}")]
    Reconciliation {
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration {version} ({name}) failed: {source}")]
    MigrationStep {
        version: u32,
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store is at schema version {stored}, newer than the latest known version {latest}")]
    StoreAhead { stored: u32, latest: u32 },

    #[error("Stored schema version {0} is out of range")]
    InvalidStoredVersion(i64),

    #[error("Refusing to lower schema version from {current} to {requested}")]
    VersionRegression { current: u32, requested: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Tenant lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create an invalid config error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a failure raised while applying a migration step
    pub fn step_failed(version: u32, name: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::MigrationStep {
            version,
            name: name.into(),
            source,
        }
    }

    /// Reclassify a raw database failure as a failure to read the store's state
    pub(crate) fn unreadable(self) -> Self {
        match self {
            Self::Database(source) => Self::Reconciliation { source },
            other => other,
        }
    }

    /// Check if this error is a startup configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidConfig { .. })
    }

    /// Version of the step that failed, if this is a step failure
    pub fn failed_version(&self) -> Option<u32> {
        match self {
            Self::MigrationStep { version, .. } => Some(*version),
            _ => None,
        }
    }
}

/// Problems with the migration catalogue itself.
///
/// Any of these is fatal at process start: a catalogue that fails validation
/// must never be used to migrate a tenant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry contains no migration steps")]
    Empty,

    #[error("expected migration version {expected}, found {found}")]
    Gap { expected: u32, found: u32 },

    #[error("migration version {0} is defined more than once")]
    Duplicate(u32),

    #[error("migration {version} has no operations")]
    EmptyOperations { version: u32 },

    #[error("migration {version} operation #{index} is blank")]
    BlankOperation { version: u32, index: usize },

    #[error("migration {version} has an empty name")]
    EmptyName { version: u32 },

    #[error("legacy signature implies version {version}, but the latest migration is {latest}")]
    SignatureOutOfRange { version: u32, latest: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_display() {
        let err = Error::step_failed(2, "add_tables", rusqlite::Error::InvalidQuery);
        let msg = err.to_string();
        assert!(msg.contains("migration 2"));
        assert!(msg.contains("add_tables"));
        assert_eq!(err.failed_version(), Some(2));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_registry_error_is_configuration() {
        let err: Error = RegistryError::Gap { expected: 2, found: 3 }.into();
        assert!(err.is_configuration());
        assert!(err.failed_version().is_none());
        assert!(err.to_string().contains("expected migration version 2"));
    }

    #[test]
    fn test_unreadable_only_rewraps_database_errors() {
        let err = Error::Database(rusqlite::Error::InvalidQuery).unreadable();
        assert!(matches!(err, Error::Reconciliation { .. }));

        let err = Error::StoreAhead { stored: 9, latest: 3 }.unreadable();
        assert!(matches!(err, Error::StoreAhead { .. }));
    }
}
