//! The migrator: builds operations and executes what they generate.

use futures::future::{BoxFuture, FutureExt};
use sqlshift_core::{Compiler, Node, SqlValue};
use tracing::debug;

use crate::config::{DialectKind, MigratorConfig};
use crate::database::{Cursor, Database};
use crate::dialect;
use crate::error::Result;
use crate::field::Field;
use crate::operation::{migrate, Command, Operation, Step};

/// Generates and runs schema changes against one database.
///
/// The dialect strategy is fixed at construction.
pub struct Migrator<D> {
    db: D,
    dialect: DialectKind,
}

impl<D: Database> Migrator<D> {
    /// Creates a migrator for an explicit dialect.
    pub const fn new(db: D, dialect: DialectKind) -> Self {
        Self { db, dialect }
    }

    /// Creates a migrator for the dialect the database reports.
    pub fn from_database(db: D) -> Self {
        let dialect = db.dialect();
        Self::new(db, dialect)
    }

    /// Creates a migrator from loaded configuration.
    pub const fn with_config(db: D, config: MigratorConfig) -> Self {
        Self::new(db, config.dialect)
    }

    /// Returns the database handle.
    pub const fn database(&self) -> &D {
        &self.db
    }

    /// Returns the dialect strategy in use.
    pub const fn dialect(&self) -> DialectKind {
        self.dialect
    }

    /// Returns a clause compiler for this dialect.
    pub fn compiler(&self) -> Compiler<'static> {
        Compiler::new(self.dialect.sql_dialect())
    }

    /// Binds a command to this migrator.
    pub const fn operation(&self, command: Command) -> Operation<'_, D> {
        Operation::new(self, command)
    }

    /// Adds a column. Non-nullable fields need a default to backfill existing rows.
    pub fn add_column(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        field: Field,
    ) -> Operation<'_, D> {
        self.operation(Command::AddColumn {
            table: table.into(),
            column: column.into(),
            field,
        })
    }

    /// Drops a column, with `CASCADE` where supported.
    pub fn drop_column(&self, table: impl Into<String>, column: impl Into<String>) -> Operation<'_, D> {
        self.drop_column_with(table, column, true)
    }

    /// Drops a column, choosing whether to cascade.
    pub fn drop_column_with(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        cascade: bool,
    ) -> Operation<'_, D> {
        self.operation(Command::DropColumn {
            table: table.into(),
            column: column.into(),
            cascade,
        })
    }

    /// Renames a column.
    pub fn rename_column(
        &self,
        table: impl Into<String>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Operation<'_, D> {
        self.operation(Command::RenameColumn {
            table: table.into(),
            old_name: old_name.into(),
            new_name: new_name.into(),
        })
    }

    /// Makes a column NOT NULL. Existing NULLs make this fail at the database.
    pub fn add_not_null(&self, table: impl Into<String>, column: impl Into<String>) -> Operation<'_, D> {
        self.operation(Command::AddNotNull {
            table: table.into(),
            column: column.into(),
        })
    }

    /// Makes a column nullable.
    pub fn drop_not_null(&self, table: impl Into<String>, column: impl Into<String>) -> Operation<'_, D> {
        self.operation(Command::DropNotNull {
            table: table.into(),
            column: column.into(),
        })
    }

    /// Renames a table.
    pub fn rename_table(&self, old_name: impl Into<String>, new_name: impl Into<String>) -> Operation<'_, D> {
        self.operation(Command::RenameTable {
            old_name: old_name.into(),
            new_name: new_name.into(),
        })
    }

    /// Creates an index named after the table and columns.
    pub fn add_index<S: AsRef<str>>(
        &self,
        table: impl Into<String>,
        columns: &[S],
        unique: bool,
    ) -> Operation<'_, D> {
        self.operation(Command::AddIndex {
            table: table.into(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            unique,
        })
    }

    /// Drops an index.
    pub fn drop_index(&self, table: impl Into<String>, name: impl Into<String>) -> Operation<'_, D> {
        self.operation(Command::DropIndex {
            table: table.into(),
            name: name.into(),
        })
    }

    /// Backfills a column with the field's default.
    pub fn apply_default(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        field: Field,
    ) -> Operation<'_, D> {
        self.operation(Command::ApplyDefault {
            table: table.into(),
            column: column.into(),
            field,
        })
    }

    /// Runs operations in order. See [`migrate`].
    pub async fn migrate<'m, I>(&'m self, operations: I) -> Result<()>
    where
        I: IntoIterator<Item = Operation<'m, D>>,
    {
        migrate(operations).await
    }

    /// Generates the steps for one command using this migrator's dialect.
    pub async fn generate(&self, command: &Command) -> Result<Vec<Step>> {
        dialect::generate(self, command).await
    }

    /// Generates a command and executes its steps, recursing into nested commands.
    pub(crate) fn run_command<'a>(&'a self, command: &'a Command) -> BoxFuture<'a, Result<()>> {
        async move {
            let steps = self.generate(command).await?;
            debug!(
                operation = command.name(),
                steps = steps.len(),
                "Generated steps"
            );
            for step in steps {
                match step {
                    Step::Clause(node) => self.execute(&node).await?,
                    Step::Command(nested) => self.run_command(&nested).await?,
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Compiles a clause and executes it as one statement.
    pub async fn execute(&self, node: &Node) -> Result<()> {
        let (sql, params) = self.compiler().compile(node);
        debug!(sql = %sql, params = ?params, "Executing SQL");
        self.db.execute_sql(&sql, &params).await?;
        Ok(())
    }

    /// Runs a catalog query.
    pub(crate) async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Cursor> {
        debug!(sql = %sql, params = ?params, "Introspecting");
        self.db.execute_sql(sql, params).await
    }
}
