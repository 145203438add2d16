//! Clause builders shared by every dialect.
//!
//! These are pure: they read nothing from the database and return the
//! clauses (or nested commands) a change expands to.

use sqlshift_core::Node;

use crate::config::DialectKind;
use crate::error::Result;
use crate::field::Field;
use crate::operation::{Command, Step};

/// Longest index name emitted before hashing kicks in.
pub const MAX_INDEX_NAME_LEN: usize = 64;

/// Generates steps for a command with no dialect-specific handling.
pub fn generate(dialect: DialectKind, command: &Command) -> Result<Vec<Step>> {
    let steps = match command {
        Command::AddColumn {
            table,
            column,
            field,
        } => add_column(table, column, field)?,
        Command::AlterAddColumn {
            table,
            column,
            field,
        } => vec![alter_add_column(dialect, table, column, field).into()],
        Command::ApplyDefault {
            table,
            column,
            field,
        } => vec![apply_default(table, column, field).into()],
        Command::DropColumn {
            table,
            column,
            cascade,
        } => vec![drop_column(table, column, *cascade).into()],
        Command::RenameColumn {
            table,
            old_name,
            new_name,
        } => vec![rename_column(table, old_name, new_name).into()],
        Command::AddNotNull { table, column } => vec![add_not_null(table, column).into()],
        Command::DropNotNull { table, column } => vec![drop_not_null(table, column).into()],
        Command::RenameTable { old_name, new_name } => {
            vec![rename_table(old_name, new_name).into()]
        }
        Command::AddIndex {
            table,
            columns,
            unique,
        } => vec![add_index(table, columns, *unique).into()],
        Command::DropIndex { name, .. } => vec![drop_index(name).into()],
    };
    Ok(steps)
}

/// Expands an add-column into its steps.
///
/// The column is always added nullable first. A non-nullable field then gets
/// a backfill of its default and a NOT NULL constraint, in that order.
pub fn add_column(table: &str, column: &str, field: &Field) -> Result<Vec<Step>> {
    field.validate(column)?;

    let mut steps: Vec<Step> = vec![Command::AlterAddColumn {
        table: table.to_string(),
        column: column.to_string(),
        field: field.clone(),
    }
    .into()];

    if !field.nullable {
        steps.push(
            Command::ApplyDefault {
                table: table.to_string(),
                column: column.to_string(),
                field: field.clone(),
            }
            .into(),
        );
        steps.push(
            Command::AddNotNull {
                table: table.to_string(),
                column: column.to_string(),
            }
            .into(),
        );
    }

    Ok(steps)
}

/// `ALTER TABLE t ADD COLUMN <definition>` with the column forced nullable.
#[must_use]
pub fn alter_add_column(dialect: DialectKind, table: &str, column: &str, field: &Field) -> Node {
    Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(table),
        Node::sql("ADD COLUMN"),
        field.definition(column, dialect, true),
    ])
}

/// `UPDATE t SET c = ?`, with the default resolved now.
#[must_use]
pub fn apply_default(table: &str, column: &str, field: &Field) -> Node {
    Node::clause(vec![
        Node::sql("UPDATE"),
        Node::entity(table),
        Node::sql("SET"),
        Node::equals(Node::entity(column), Node::Param(field.resolve_default())),
    ])
}

/// `ALTER TABLE t DROP COLUMN c [CASCADE]`.
#[must_use]
pub fn drop_column(table: &str, column: &str, cascade: bool) -> Node {
    let node = Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(table),
        Node::sql("DROP COLUMN"),
        Node::entity(column),
    ]);
    if cascade {
        node.push(Node::sql("CASCADE"))
    } else {
        node
    }
}

/// `ALTER TABLE t RENAME COLUMN old TO new`.
#[must_use]
pub fn rename_column(table: &str, old_name: &str, new_name: &str) -> Node {
    Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(table),
        Node::sql("RENAME COLUMN"),
        Node::entity(old_name),
        Node::sql("TO"),
        Node::entity(new_name),
    ])
}

fn alter_column(table: &str, column: &str, action: &str) -> Node {
    Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(table),
        Node::sql("ALTER COLUMN"),
        Node::entity(column),
        Node::sql(action),
    ])
}

/// `ALTER TABLE t ALTER COLUMN c SET NOT NULL`.
#[must_use]
pub fn add_not_null(table: &str, column: &str) -> Node {
    alter_column(table, column, "SET NOT NULL")
}

/// `ALTER TABLE t ALTER COLUMN c DROP NOT NULL`.
#[must_use]
pub fn drop_not_null(table: &str, column: &str) -> Node {
    alter_column(table, column, "DROP NOT NULL")
}

/// `ALTER TABLE old RENAME TO new`.
#[must_use]
pub fn rename_table(old_name: &str, new_name: &str) -> Node {
    Node::clause(vec![
        Node::sql("ALTER TABLE"),
        Node::entity(old_name),
        Node::sql("RENAME TO"),
        Node::entity(new_name),
    ])
}

/// `CREATE [UNIQUE] INDEX <derived name> ON t (columns...)`.
#[must_use]
pub fn add_index(table: &str, columns: &[String], unique: bool) -> Node {
    let statement = if unique {
        "CREATE UNIQUE INDEX"
    } else {
        "CREATE INDEX"
    };
    Node::clause(vec![
        Node::sql(statement),
        Node::entity(index_name(table, columns)),
        Node::sql("ON"),
        Node::entity(table),
        Node::enclosed(Node::entities(columns)),
    ])
}

/// `DROP INDEX name`.
#[must_use]
pub fn drop_index(name: &str) -> Node {
    Node::clause(vec![Node::sql("DROP INDEX"), Node::entity(name)])
}

/// Derives an index name: `<table>_<col1>_<col2>...`.
///
/// Names over [`MAX_INDEX_NAME_LEN`] characters keep their first 55
/// characters followed by `_` and eight hex digits of a hash of the full name.
#[must_use]
pub fn index_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let mut name = table.to_string();
    for column in columns {
        name.push('_');
        name.push_str(column.as_ref());
    }
    if name.chars().count() <= MAX_INDEX_NAME_LEN {
        return name;
    }
    let prefix: String = name.chars().take(55).collect();
    format!("{prefix}_{:08x}", fnv1a(name.as_bytes()) & 0xffff_ffff)
}

/// 64-bit FNV-1a, stable across platforms and releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
