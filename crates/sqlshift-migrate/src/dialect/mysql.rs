//! MySQL strategy.
//!
//! MySQL has no statement that toggles nullability or renames a column on
//! its own: `MODIFY` and `CHANGE` both take a full column definition. The
//! current definition is read from `information_schema.COLUMNS` and
//! re-emitted with the one attribute that changes.
//!
//! MariaDB reports column defaults in its own format, so the server version
//! is read alongside the columns to tell the two apart.

use sqlshift_core::{Node, SqlValue};

use crate::config::DialectKind;
use crate::database::Database;
use crate::dialect::base;
use crate::error::{MigrateError, Result};
use crate::migrator::Migrator;
use crate::operation::{Command, Step};

const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, \
     COLUMN_DEFAULT, EXTRA, VERSION() \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

/// A column default, in the form it is written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDefault {
    /// A literal value, written as a quoted string.
    Literal(String),
    /// An expression or number, written as is, e.g. `CURRENT_TIMESTAMP`.
    Expression(String),
}

impl ColumnDefault {
    /// Reads a MySQL `COLUMN_DEFAULT`.
    ///
    /// Literals come unquoted. Expression defaults are flagged
    /// `DEFAULT_GENERATED` in `EXTRA`, except `CURRENT_TIMESTAMP` on servers
    /// older than 8.0.13.
    #[must_use]
    pub fn from_mysql(default: &str, extra: &str) -> Self {
        let generated = extra
            .split_whitespace()
            .any(|word| word.eq_ignore_ascii_case("DEFAULT_GENERATED"));
        if generated || default.to_ascii_uppercase().starts_with("CURRENT_TIMESTAMP") {
            Self::Expression(default.to_string())
        } else {
            Self::Literal(default.to_string())
        }
    }

    /// Reads a MariaDB `COLUMN_DEFAULT`.
    ///
    /// Since 10.2.7 literals come quoted and everything else is an
    /// expression. The text `NULL` means the default is NULL, which is what
    /// a nullable column gets without one.
    #[must_use]
    pub fn from_mariadb(default: &str) -> Option<Self> {
        if default.eq_ignore_ascii_case("NULL") {
            return None;
        }
        let literal = default
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''));
        Some(literal.map_or_else(
            || Self::Expression(default.to_string()),
            |inner| Self::Literal(inner.replace("''", "'")),
        ))
    }

    /// Renders the default for a column definition.
    #[must_use]
    pub fn sql(&self) -> String {
        match self {
            Self::Literal(value) => SqlValue::Text(value.clone()).to_sql_inline(),
            Self::Expression(expression) => expression.clone(),
        }
    }
}

/// One row of `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Full column type, e.g. `varchar(32)` or `int unsigned`.
    pub definition: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Key flag: `PRI`, `UNI`, `MUL` or empty.
    pub key: String,
    /// Default value, if the column has one.
    pub default: Option<ColumnDefault>,
    /// Extra attributes, e.g. `auto_increment`.
    pub extra: String,
}

impl ColumnDescriptor {
    /// Returns true if the column is (part of) the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.key == "PRI"
    }

    /// Returns true if the column carries a single-column unique index.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.key == "UNI"
    }

    /// Extra attributes worth re-declaring; `DEFAULT_GENERATED` is catalog
    /// bookkeeping, not syntax.
    fn extra_attributes(&self) -> String {
        self.extra
            .split_whitespace()
            .filter(|word| !word.eq_ignore_ascii_case("DEFAULT_GENERATED"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Builds the column definition for `MODIFY` or `CHANGE`.
    ///
    /// Keys are not re-declared: MySQL keeps a column's indexes across
    /// `MODIFY`/`CHANGE`, and declaring them again would duplicate them.
    #[must_use]
    pub fn sql(&self, name: &str, nullable: bool) -> Node {
        let mut parts = vec![Node::entity(name), Node::sql(self.definition.clone())];
        parts.push(Node::sql(if nullable { "NULL" } else { "NOT NULL" }));

        if let Some(default) = &self.default {
            parts.push(Node::sql(format!("DEFAULT {}", default.sql())));
        }

        let extra = self.extra_attributes();
        if !extra.is_empty() {
            parts.push(Node::sql(extra));
        }

        Node::clause(parts)
    }

    fn from_row(row: &[SqlValue]) -> Result<Self> {
        let text = |index: usize| -> Option<String> {
            row.get(index)
                .and_then(SqlValue::as_text)
                .map(str::to_string)
        };
        let required = |index: usize, what: &str| {
            text(index).ok_or_else(|| {
                MigrateError::Introspection(format!("column row is missing {what}"))
            })
        };

        let extra = text(5).unwrap_or_default();
        let mariadb = text(6).is_some_and(|version| version.contains("MariaDB"));
        let default = text(4).and_then(|default| {
            if mariadb {
                ColumnDefault::from_mariadb(&default)
            } else {
                Some(ColumnDefault::from_mysql(&default, &extra))
            }
        });

        Ok(Self {
            name: required(0, "COLUMN_NAME")?,
            definition: required(1, "COLUMN_TYPE")?,
            nullable: required(2, "IS_NULLABLE")?.eq_ignore_ascii_case("YES"),
            key: text(3).unwrap_or_default(),
            default,
            extra,
        })
    }
}

/// Generates the steps for `command` on MySQL.
pub async fn generate<D: Database>(migrator: &Migrator<D>, command: &Command) -> Result<Vec<Step>> {
    match command {
        Command::AddNotNull { table, column } => {
            let descriptor = column_definition(migrator, table, column).await?;
            Ok(vec![modify(table, &descriptor, false).into()])
        }
        Command::DropNotNull { table, column } => {
            let descriptor = column_definition(migrator, table, column).await?;
            Ok(vec![modify(table, &descriptor, true).into()])
        }
        Command::RenameColumn {
            table,
            old_name,
            new_name,
        } => {
            let descriptor = column_definition(migrator, table, old_name).await?;
            Ok(vec![change(table, &descriptor, new_name).into()])
        }
        Command::DropIndex { table, name } => Ok(vec![drop_index(table, name).into()]),
        _ => base::generate(DialectKind::MySql, command),
    }
}

/// `ALTER TABLE t MODIFY <definition with the given nullability>`.
#[must_use]
pub fn modify(table: &str, column: &ColumnDescriptor, nullable: bool) -> Node {
    Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(table),
        Node::sql("MODIFY"),
        column.sql(&column.name, nullable),
    ])
}

/// `ALTER TABLE t CHANGE old <definition under the new name>`.
#[must_use]
pub fn change(table: &str, column: &ColumnDescriptor, new_name: &str) -> Node {
    Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(table),
        Node::sql("CHANGE"),
        Node::entity(&column.name),
        column.sql(new_name, column.nullable),
    ])
}

/// `DROP INDEX name ON t`.
#[must_use]
pub fn drop_index(table: &str, name: &str) -> Node {
    Node::clause(vec![
        Node::sql("DROP INDEX"),
        Node::entity(name),
        Node::sql("ON"),
        Node::entity(table),
    ])
}

/// Reads every column of `table`, in declaration order.
pub async fn describe<D: Database>(migrator: &Migrator<D>, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let cursor = migrator
        .query(COLUMNS_QUERY, &[SqlValue::Text(table.to_string())])
        .await?;
    cursor
        .fetch_all()
        .iter()
        .map(|row| ColumnDescriptor::from_row(row))
        .collect()
}

/// Reads the definition of one column.
pub async fn column_definition<D: Database>(
    migrator: &Migrator<D>,
    table: &str,
    column: &str,
) -> Result<ColumnDescriptor> {
    let columns = describe(migrator, table).await?;
    if columns.is_empty() {
        return Err(MigrateError::TableNotFound {
            table: table.to_string(),
        });
    }
    columns
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(column))
        .ok_or_else(|| MigrateError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        })
}
