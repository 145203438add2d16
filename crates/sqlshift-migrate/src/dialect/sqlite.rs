//! SQLite strategy: table rebuilds.
//!
//! SQLite cannot drop a column, change its nullability or rename it while
//! keeping indexes pointed at it, so those changes rebuild the table. The
//! stored `CREATE TABLE` text is taken apart, the target definition
//! rewritten, and the rows copied into a fresh table that then replaces
//! the original:
//!
//! ```text
//! PRAGMA foreign_keys = OFF
//! DROP TABLE IF EXISTS "t__tmp__"
//! CREATE TABLE "t__tmp__" (<definitions, one rewritten>)
//! INSERT INTO "t__tmp__" (<new names>) SELECT <old names> FROM "t"
//! DROP TABLE "t"
//! ALTER TABLE "t__tmp__" RENAME TO "t"
//! <CREATE INDEX ... for each surviving index>
//! PRAGMA foreign_keys = ON
//! ```
//!
//! With foreign keys enforced, `DROP TABLE "t"` would delete every row of
//! `t` first and fire `ON DELETE` actions in child tables, so the rebuild
//! switches enforcement off around itself. The pragma is per connection and
//! has no effect inside a transaction: rebuilds need a database handle that
//! keeps to one connection, and a caller-managed transaction must disable
//! foreign keys before it begins.

use sqlshift_core::{Node, SqlValue};
use tracing::debug;

use crate::config::DialectKind;
use crate::database::Database;
use crate::ddl::{self, DdlError};
use crate::dialect::base;
use crate::error::{MigrateError, Result};
use crate::migrator::Migrator;
use crate::operation::{Command, Step};

/// Appended to a table name to name its rebuild copy.
pub const TEMP_TABLE_SUFFIX: &str = "__tmp__";

const CREATE_SQL_QUERY: &str =
    "SELECT sql FROM sqlite_master WHERE type = ? AND name = ? COLLATE NOCASE LIMIT 1";

const FOREIGN_KEYS_QUERY: &str = "PRAGMA foreign_keys";

const INDEXES_QUERY: &str = "SELECT name, sql FROM sqlite_master \
     WHERE type = ? AND tbl_name = ? COLLATE NOCASE AND sql IS NOT NULL \
     ORDER BY name";

/// An explicitly created index on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// The `CREATE INDEX` statement as stored.
    pub sql: String,
    /// Indexed columns, in key order. Expression keys are omitted.
    pub columns: Vec<String>,
}

impl IndexDescriptor {
    /// Returns true if the index uses `column` as a key, inside a key
    /// expression or in its `WHERE` predicate.
    pub fn references(&self, column: &str) -> std::result::Result<bool, DdlError> {
        if self.columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            return Ok(true);
        }
        ddl::index_references(&self.sql, column)
    }
}

/// How the target column's definition changes in a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRewrite {
    /// Remove the column.
    Drop,
    /// Give the column a new name.
    Rename(String),
    /// Add a NOT NULL constraint.
    AddNotNull,
    /// Remove any NOT NULL constraint.
    DropNotNull,
}

impl ColumnRewrite {
    /// Applies the rewrite to one definition. `None` drops the column.
    pub fn apply(&self, definition: &str) -> std::result::Result<Option<String>, DdlError> {
        match self {
            Self::Drop => Ok(None),
            Self::Rename(new_name) => ddl::rename_definition(definition, new_name).map(Some),
            Self::AddNotNull => ddl::add_not_null(definition).map(Some),
            Self::DropNotNull => ddl::drop_not_null(definition).map(Some),
        }
    }
}

/// Generates the steps for `command` on SQLite.
pub async fn generate<D: Database>(migrator: &Migrator<D>, command: &Command) -> Result<Vec<Step>> {
    match command {
        Command::DropColumn { table, column, .. } => {
            rebuild(migrator, table, column, ColumnRewrite::Drop).await
        }
        Command::RenameColumn {
            table,
            old_name,
            new_name,
        } => {
            rebuild(
                migrator,
                table,
                old_name,
                ColumnRewrite::Rename(new_name.clone()),
            )
            .await
        }
        Command::AddNotNull { table, column } => {
            rebuild(migrator, table, column, ColumnRewrite::AddNotNull).await
        }
        Command::DropNotNull { table, column } => {
            rebuild(migrator, table, column, ColumnRewrite::DropNotNull).await
        }
        _ => base::generate(DialectKind::Sqlite, command),
    }
}

/// Reads the table's current schema and plans a rebuild around `column`.
pub async fn rebuild<D: Database>(
    migrator: &Migrator<D>,
    table: &str,
    column: &str,
    rewrite: ColumnRewrite,
) -> Result<Vec<Step>> {
    let foreign_keys = foreign_keys_enforced(migrator).await?;
    if foreign_keys && !migrator.database().single_connection() {
        return Err(MigrateError::RebuildNeedsSingleConnection {
            table: table.to_string(),
        });
    }

    let create_sql = create_table_sql(migrator, table).await?;
    let indexes = indexes(migrator, table).await?;
    debug!(
        table = %table,
        column = %column,
        rewrite = ?rewrite,
        indexes = indexes.len(),
        "Planning table rebuild"
    );
    let mut steps = plan_rebuild(table, column, &create_sql, &indexes, |_, definition| {
        rewrite.apply(definition)
    })?;

    if foreign_keys {
        debug!(table = %table, "Suspending foreign key enforcement for the rebuild");
        steps.insert(0, Node::sql("PRAGMA foreign_keys = OFF").into());
        steps.push(Node::sql("PRAGMA foreign_keys = ON").into());
    }
    Ok(steps)
}

/// Plans the statements that rebuild `table` with `column` rewritten.
///
/// `rewrite` receives the column's name and full definition and returns the
/// replacement definition, or `None` to drop the column. Table constraints
/// are carried over, following a renamed column, and excluded from the row
/// copy.
pub fn plan_rebuild<F>(
    table: &str,
    column: &str,
    create_sql: &str,
    indexes: &[IndexDescriptor],
    rewrite: F,
) -> Result<Vec<Step>>
where
    F: Fn(&str, &str) -> std::result::Result<Option<String>, DdlError>,
{
    let malformed = |err: DdlError| MigrateError::MalformedDdl {
        table: table.to_string(),
        message: err.to_string(),
    };

    let statement = ddl::split_create_table(create_sql).map_err(malformed)?;
    let definitions = ddl::split_definitions(statement.body).map_err(malformed)?;

    let mut new_definitions = Vec::with_capacity(definitions.len());
    let mut original_columns = Vec::new();
    let mut new_columns = Vec::new();
    let mut constraints = Vec::new();
    // None until the target is seen; Some(None) once it has been dropped.
    let mut renamed_to: Option<Option<String>> = None;

    for definition in definitions {
        let Some(leading) = ddl::leading_name(&definition).map_err(malformed)? else {
            new_definitions.push(definition);
            continue;
        };

        if leading.is_table_constraint() {
            constraints.push(new_definitions.len());
            new_definitions.push(definition);
        } else if renamed_to.is_none() && leading.matches(column) {
            match rewrite(&leading.name, &definition).map_err(malformed)? {
                Some(rewritten) => {
                    let new_name = ddl::leading_name(&rewritten)
                        .map_err(malformed)?
                        .map_or_else(|| leading.name.clone(), |l| l.name);
                    original_columns.push(leading.name);
                    new_columns.push(new_name.clone());
                    new_definitions.push(rewritten);
                    renamed_to = Some(Some(new_name));
                }
                None => renamed_to = Some(None),
            }
        } else {
            original_columns.push(leading.name.clone());
            new_columns.push(leading.name);
            new_definitions.push(definition);
        }
    }

    let Some(renamed_to) = renamed_to else {
        return Err(MigrateError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        });
    };

    if let Some(new_name) = renamed_to.as_deref().filter(|n| !n.eq_ignore_ascii_case(column)) {
        for &i in &constraints {
            new_definitions[i] =
                ddl::rename_constraint_column(&new_definitions[i], column, new_name).map_err(malformed)?;
        }
    }

    debug!(
        table = %table,
        copied_from = ?original_columns,
        copied_to = ?new_columns,
        "Rebuilt column list"
    );

    let temp_table = format!("{table}{TEMP_TABLE_SUFFIX}");
    let header =
        ddl::rename_table_in_header(statement.header, table, &temp_table).map_err(malformed)?;
    let create = format!(
        "{} ({}){}",
        header.trim_end(),
        new_definitions.join(", "),
        statement.trailer.trim_end()
    );

    let mut steps: Vec<Step> = vec![
        Node::clause(vec![Node::sql("DROP TABLE IF EXISTS"), Node::entity(&temp_table)]).into(),
        Node::sql(create).into(),
        Node::clause(vec![
            Node::sql("INSERT INTO"),
            Node::entity(&temp_table),
            Node::enclosed(Node::entities(&new_columns)),
            Node::sql("SELECT"),
            Node::comma(Node::entities(&original_columns)),
            Node::sql("FROM"),
            Node::entity(table),
        ])
        .into(),
        Node::clause(vec![Node::sql("DROP TABLE"), Node::entity(table)]).into(),
        Command::RenameTable {
            old_name: temp_table,
            new_name: table.to_string(),
        }
        .into(),
    ];

    for index in indexes {
        if !index.references(column).map_err(malformed)? {
            steps.push(Node::sql(index.sql.clone()).into());
            continue;
        }
        match &renamed_to {
            Some(new_name) if !new_name.eq_ignore_ascii_case(column) => {
                let sql = ddl::rename_index_column(&index.sql, column, new_name).map_err(malformed)?;
                steps.push(Node::sql(sql).into());
            }
            Some(_) => steps.push(Node::sql(index.sql.clone()).into()),
            None => debug!(index = %index.name, "Index dropped with its column"),
        }
    }

    Ok(steps)
}

/// Returns true if the connection enforces foreign key constraints.
pub async fn foreign_keys_enforced<D: Database>(migrator: &Migrator<D>) -> Result<bool> {
    let enabled = migrator
        .query(FOREIGN_KEYS_QUERY, &[])
        .await?
        .fetch_one()
        .and_then(|row| row.first().and_then(SqlValue::as_i64));
    Ok(enabled == Some(1))
}

/// Returns the stored `CREATE TABLE` statement for `table`.
pub async fn create_table_sql<D: Database>(migrator: &Migrator<D>, table: &str) -> Result<String> {
    let row = migrator
        .query(
            CREATE_SQL_QUERY,
            &[SqlValue::Text("table".into()), SqlValue::Text(table.to_string())],
        )
        .await?
        .fetch_one()
        .ok_or_else(|| MigrateError::TableNotFound {
            table: table.to_string(),
        })?;

    row.first()
        .and_then(SqlValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| {
            MigrateError::Introspection(format!("no CREATE TABLE statement stored for '{table}'"))
        })
}

/// Returns the explicitly created indexes on `table`, ordered by name.
///
/// Automatic indexes backing UNIQUE and PRIMARY KEY constraints have no
/// stored SQL and are left out; the rebuilt table recreates them.
pub async fn indexes<D: Database>(migrator: &Migrator<D>, table: &str) -> Result<Vec<IndexDescriptor>> {
    let rows = migrator
        .query(
            INDEXES_QUERY,
            &[SqlValue::Text("index".into()), SqlValue::Text(table.to_string())],
        )
        .await?
        .fetch_all();

    let mut indexes = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(name), Some(sql)) = (
            row.first().and_then(SqlValue::as_text),
            row.get(1).and_then(SqlValue::as_text),
        ) else {
            continue;
        };

        let pragma = format!("PRAGMA index_info({})", ddl::quote(name));
        let columns = migrator
            .query(&pragma, &[])
            .await?
            .fetch_all()
            .into_iter()
            .filter_map(|info| info.get(2).and_then(SqlValue::as_text).map(str::to_string))
            .collect();

        indexes.push(IndexDescriptor {
            name: name.to_string(),
            sql: sql.to_string(),
            columns,
        });
    }
    Ok(indexes)
}
