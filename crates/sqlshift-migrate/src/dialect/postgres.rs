//! PostgreSQL strategy.
//!
//! Everything is plain `ALTER TABLE` except renaming a table, which also
//! renames the serial sequence behind a single-column primary key so that
//! `<table>_<pk>_seq` keeps following the table name.

use sqlshift_core::{Node, SqlValue};
use tracing::{debug, warn};

use crate::config::DialectKind;
use crate::database::Database;
use crate::dialect::base;
use crate::error::{MigrateError, Result};
use crate::migrator::Migrator;
use crate::operation::{Command, Step};

const PRIMARY_KEY_QUERY: &str = "SELECT pg_attribute.attname \
     FROM pg_index, pg_class, pg_attribute \
     WHERE pg_class.oid = $1::regclass \
     AND indrelid = pg_class.oid \
     AND pg_attribute.attrelid = pg_class.oid \
     AND pg_attribute.attnum = any(pg_index.indkey) \
     AND indisprimary";

const SEQUENCE_QUERY: &str = "SELECT 1 FROM information_schema.sequences \
     WHERE sequence_schema = current_schema() AND sequence_name = $1";

/// Generates the steps for `command` on PostgreSQL.
pub async fn generate<D: Database>(migrator: &Migrator<D>, command: &Command) -> Result<Vec<Step>> {
    match command {
        Command::RenameTable { old_name, new_name } => {
            rename_table(migrator, old_name, new_name).await
        }
        _ => base::generate(DialectKind::Postgres, command),
    }
}

/// Name of the sequence a serial column owns.
#[must_use]
pub fn sequence_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_seq")
}

/// `ALTER SEQUENCE old RENAME TO new`.
#[must_use]
pub fn rename_sequence(old_name: &str, new_name: &str) -> Node {
    Node::clause(vec![
        Node::sql("ALTER SEQUENCE"),
        Node::entity(old_name),
        Node::sql("RENAME TO"),
        Node::entity(new_name),
    ])
}

async fn rename_table<D: Database>(
    migrator: &Migrator<D>,
    old_name: &str,
    new_name: &str,
) -> Result<Vec<Step>> {
    let mut steps: Vec<Step> = vec![base::rename_table(old_name, new_name).into()];

    let primary_keys = primary_key_columns(migrator, old_name).await?;
    debug!(table = %old_name, primary_keys = ?primary_keys, "Primary key columns");
    let [pk] = primary_keys.as_slice() else {
        warn!(
            table = %old_name,
            columns = primary_keys.len(),
            "Primary key is not a single column, leaving sequences alone"
        );
        return Ok(steps);
    };

    let sequence = sequence_name(old_name, pk);
    if sequence_exists(migrator, &sequence).await? {
        debug!(sequence = %sequence, "Renaming primary key sequence");
        steps.push(rename_sequence(&sequence, &sequence_name(new_name, pk)).into());
    } else {
        warn!(
            table = %old_name,
            sequence = %sequence,
            "No sequence found for primary key, leaving sequences alone"
        );
    }

    Ok(steps)
}

async fn primary_key_columns<D: Database>(migrator: &Migrator<D>, table: &str) -> Result<Vec<String>> {
    let cursor = migrator
        .query(PRIMARY_KEY_QUERY, &[SqlValue::Text(table.to_string())])
        .await?;
    cursor
        .fetch_all()
        .into_iter()
        .map(|row| {
            row.first()
                .and_then(SqlValue::as_text)
                .map(str::to_string)
                .ok_or_else(|| {
                    MigrateError::Introspection(format!(
                        "primary key lookup for '{table}' returned a row without a column name"
                    ))
                })
        })
        .collect()
}

async fn sequence_exists<D: Database>(migrator: &Migrator<D>, sequence: &str) -> Result<bool> {
    let cursor = migrator
        .query(SEQUENCE_QUERY, &[SqlValue::Text(sequence.to_string())])
        .await?;
    Ok(cursor.fetch_one().is_some())
}
