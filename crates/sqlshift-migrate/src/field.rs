//! Field descriptors for columns being added.
//!
//! A [`Field`] knows the column's type, whether it accepts NULL, how to
//! produce a default for existing rows, and what it references when it is a
//! foreign key.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlshift_core::{Node, SqlValue, ToSqlValue};

use crate::config::DialectKind;
use crate::error::{MigrateError, Result};

/// Column data types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(usize),
    /// Fixed-length character string.
    Char(usize),
    /// Boolean.
    Boolean,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    DateTime,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Fixed-point decimal with precision and scale.
    Decimal(u8, u8),
    /// Binary large object.
    Blob,
    /// UUID.
    Uuid,
    /// A type definition rendered verbatim.
    Custom(String),
}

impl FieldType {
    /// Renders the type for the given dialect.
    #[must_use]
    pub fn render(&self, dialect: DialectKind) -> String {
        match dialect {
            DialectKind::Postgres => self.postgres_name(),
            DialectKind::MySql => self.mysql_name(),
            DialectKind::Sqlite => self.sqlite_name(),
            DialectKind::Generic => self.generic_name(),
        }
    }

    fn generic_name(&self) -> String {
        match self {
            Self::Integer => "INTEGER".to_string(),
            Self::BigInt => "BIGINT".to_string(),
            Self::SmallInt => "SMALLINT".to_string(),
            Self::Text => "TEXT".to_string(),
            Self::Varchar(len) => format!("VARCHAR({len})"),
            Self::Char(len) => format!("CHAR({len})"),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Time => "TIME".to_string(),
            Self::DateTime => "TIMESTAMP".to_string(),
            Self::Real => "REAL".to_string(),
            Self::Double => "DOUBLE PRECISION".to_string(),
            Self::Decimal(p, s) => format!("DECIMAL({p}, {s})"),
            Self::Blob => "BLOB".to_string(),
            Self::Uuid => "CHAR(36)".to_string(),
            Self::Custom(raw) => raw.clone(),
        }
    }

    fn postgres_name(&self) -> String {
        match self {
            Self::Blob => "BYTEA".to_string(),
            Self::Uuid => "UUID".to_string(),
            other => other.generic_name(),
        }
    }

    fn mysql_name(&self) -> String {
        match self {
            Self::Boolean => "BOOL".to_string(),
            Self::DateTime => "DATETIME".to_string(),
            Self::Double => "DOUBLE".to_string(),
            Self::Blob => "LONGBLOB".to_string(),
            Self::Text => "LONGTEXT".to_string(),
            other => other.generic_name(),
        }
    }

    fn sqlite_name(&self) -> String {
        match self {
            Self::Integer | Self::SmallInt | Self::BigInt | Self::Boolean => {
                "INTEGER".to_string()
            }
            Self::Text | Self::Char(_) | Self::Uuid => "TEXT".to_string(),
            Self::Varchar(len) => format!("VARCHAR({len})"),
            Self::Date => "DATE".to_string(),
            Self::Time => "TIME".to_string(),
            Self::DateTime => "DATETIME".to_string(),
            Self::Real | Self::Double => "REAL".to_string(),
            Self::Decimal(p, s) => format!("DECIMAL({p}, {s})"),
            Self::Blob => "BLOB".to_string(),
            Self::Custom(raw) => raw.clone(),
        }
    }
}

/// The value a column is backfilled with.
#[derive(Clone)]
pub enum FieldDefault {
    /// A fixed value.
    Value(SqlValue),
    /// A zero-argument producer, called once per generated backfill.
    Producer(Arc<dyn Fn() -> SqlValue + Send + Sync>),
}

impl FieldDefault {
    /// Resolves the default to a concrete value.
    ///
    /// Producers are evaluated here, once; the resulting value is bound to
    /// the backfill statement and shared by every row it updates.
    #[must_use]
    pub fn resolve(&self) -> SqlValue {
        match self {
            Self::Value(value) => value.clone(),
            Self::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column. Required when the field is added to an existing table.
    pub column: Option<String>,
}

/// Describes a column to be added.
#[derive(Debug, Clone)]
pub struct Field {
    /// Column type.
    pub field_type: FieldType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column carries a UNIQUE constraint.
    pub unique: bool,
    /// Backfill default for existing rows.
    pub default: Option<FieldDefault>,
    /// Foreign key target, if any.
    pub references: Option<ForeignKey>,
}

impl Field {
    /// Creates a nullable field of the given type.
    #[must_use]
    pub const fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            nullable: true,
            unique: false,
            default: None,
            references: None,
        }
    }

    /// Creates an integer foreign key to `table` without a target column.
    ///
    /// Call [`Field::to_column`] before adding it to an existing table.
    #[must_use]
    pub fn foreign_key(table: impl Into<String>) -> Self {
        let mut field = Self::new(FieldType::Integer);
        field.references = Some(ForeignKey {
            table: table.into(),
            column: None,
        });
        field
    }

    /// Sets the referenced column of a foreign key.
    #[must_use]
    pub fn to_column(mut self, column: impl Into<String>) -> Self {
        if let Some(reference) = self.references.as_mut() {
            reference.column = Some(column.into());
        }
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column UNIQUE.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a fixed default.
    #[must_use]
    pub fn default(mut self, value: impl ToSqlValue) -> Self {
        self.default = Some(FieldDefault::Value(value.to_sql_value()));
        self
    }

    /// Sets a default computed by a zero-argument producer.
    #[must_use]
    pub fn default_with<F, V>(mut self, produce: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: ToSqlValue,
    {
        self.default = Some(FieldDefault::Producer(Arc::new(move || {
            produce().to_sql_value()
        })));
        self
    }

    /// Checks that the field can be added to a table that may already hold rows.
    pub fn validate(&self, column: &str) -> Result<()> {
        if !self.nullable && self.default.is_none() {
            return Err(MigrateError::NotNullWithoutDefault {
                column: column.to_string(),
            });
        }
        if let Some(reference) = &self.references {
            if reference.column.is_none() {
                return Err(MigrateError::ForeignKeyWithoutTarget {
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolves the backfill value; NULL when the field has no default.
    #[must_use]
    pub fn resolve_default(&self) -> SqlValue {
        self.default
            .as_ref()
            .map_or(SqlValue::Null, FieldDefault::resolve)
    }

    /// Builds the column definition clause for `column`.
    ///
    /// `force_nullable` omits the NOT NULL marker regardless of the field's
    /// own nullability, which is how new columns are first added.
    #[must_use]
    pub fn definition(&self, column: &str, dialect: DialectKind, force_nullable: bool) -> Node {
        let mut parts = vec![
            Node::entity(column),
            Node::sql(self.field_type.render(dialect)),
        ];
        if !self.nullable && !force_nullable {
            parts.push(Node::sql("NOT NULL"));
        }
        if self.unique {
            parts.push(Node::sql("UNIQUE"));
        }
        if let Some(ForeignKey {
            table,
            column: Some(target),
        }) = &self.references
        {
            parts.push(Node::sql("REFERENCES"));
            parts.push(Node::entity(table));
            parts.push(Node::enclosed(vec![Node::entity(target)]));
        }
        Node::clause(parts)
    }
}
