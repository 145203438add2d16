//! Error types for schema migrations.

/// Errors that can occur while generating or running a schema change.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A non-nullable column was added without a default to backfill existing rows.
    #[error("Column '{column}' is not null but has no default")]
    NotNullWithoutDefault {
        /// The column being added.
        column: String,
    },

    /// A foreign key column was added without naming the referenced column.
    #[error("Foreign key column '{column}' must specify the referenced column")]
    ForeignKeyWithoutTarget {
        /// The column being added.
        column: String,
    },

    /// The configured dialect name is not recognised.
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    /// The table does not exist in the schema catalog.
    #[error("Table '{table}' not found")]
    TableNotFound {
        /// Table name.
        table: String,
    },

    /// The column does not exist in the introspected table.
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The stored `CREATE TABLE` statement could not be split into columns.
    #[error("Failed to parse DDL for table '{table}': {message}")]
    MalformedDdl {
        /// Table name.
        table: String,
        /// What went wrong.
        message: String,
    },

    /// A SQLite rebuild has to suspend foreign key enforcement, which only
    /// holds if every rebuild statement runs on the same connection.
    #[error("Rebuilding table '{table}' with foreign keys enforced needs a single connection")]
    RebuildNeedsSingleConnection {
        /// Table being rebuilt.
        table: String,
    },

    /// A catalog query returned rows of an unexpected shape.
    #[error("Unexpected introspection result: {0}")]
    Introspection(String),

    /// A result cell could not be decoded into a SQL value.
    #[error("Unsupported value in column '{column}' of type {type_name}")]
    UnsupportedValue {
        /// Result column name.
        column: String,
        /// Database type name.
        type_name: String,
    },

    /// Database error reported while executing a statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MigrateError {
    /// Returns true for caller misuse detected before any SQL runs.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotNullWithoutDefault { .. }
                | Self::ForeignKeyWithoutTarget { .. }
                | Self::UnknownDialect(_)
        )
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
