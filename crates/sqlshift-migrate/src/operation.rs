//! Deferred schema operations.
//!
//! A [`Command`] names one schema change and its arguments. Bound to the
//! [`Migrator`] that will carry it out it becomes an [`Operation`], which
//! does nothing until it is run. Generating a command yields [`Step`]s: plain
//! clauses that execute as exactly one statement each, or nested commands
//! that are generated and run only when reached.

use sqlshift_core::Node;
use tracing::info;

use crate::database::Database;
use crate::error::Result;
use crate::field::Field;
use crate::migrator::Migrator;

/// A schema change and its arguments.
#[derive(Debug, Clone)]
pub enum Command {
    /// Add a column; non-nullable fields expand into add, backfill, constrain.
    AddColumn {
        /// Table name.
        table: String,
        /// New column name.
        column: String,
        /// Column description.
        field: Field,
    },

    /// The bare `ALTER TABLE ... ADD COLUMN`, always nullable.
    AlterAddColumn {
        /// Table name.
        table: String,
        /// New column name.
        column: String,
        /// Column description.
        field: Field,
    },

    /// Set every row's column to the field's default.
    ApplyDefault {
        /// Table name.
        table: String,
        /// Column to backfill.
        column: String,
        /// Field whose default is used.
        field: Field,
    },

    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column to drop.
        column: String,
        /// Append `CASCADE` where the dialect honours it.
        cascade: bool,
    },

    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Current column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Forbid NULL in a column.
    AddNotNull {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Allow NULL in a column.
    DropNotNull {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Rename a table.
    RenameTable {
        /// Current table name.
        old_name: String,
        /// New table name.
        new_name: String,
    },

    /// Create an index with a name derived from the table and columns.
    AddIndex {
        /// Table name.
        table: String,
        /// Indexed columns, in order.
        columns: Vec<String>,
        /// Create a UNIQUE index.
        unique: bool,
    },

    /// Drop an index.
    DropIndex {
        /// Table the index belongs to.
        table: String,
        /// Index name.
        name: String,
    },
}

impl Command {
    /// Returns the operation name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddColumn { .. } => "add_column",
            Self::AlterAddColumn { .. } => "alter_add_column",
            Self::ApplyDefault { .. } => "apply_default",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::AddNotNull { .. } => "add_not_null",
            Self::DropNotNull { .. } => "drop_not_null",
            Self::RenameTable { .. } => "rename_table",
            Self::AddIndex { .. } => "add_index",
            Self::DropIndex { .. } => "drop_index",
        }
    }

    /// Returns the table the command acts on.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::AddColumn { table, .. }
            | Self::AlterAddColumn { table, .. }
            | Self::ApplyDefault { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::AddNotNull { table, .. }
            | Self::DropNotNull { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. } => table,
            Self::RenameTable { old_name, .. } => old_name,
        }
    }

    /// Checks the arguments without touching the database.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::AddColumn { column, field, .. } => field.validate(column),
            _ => Ok(()),
        }
    }
}

/// One unit of generated output.
#[derive(Debug, Clone)]
pub enum Step {
    /// A clause compiled and executed as a single statement.
    Clause(Node),
    /// A command generated and run when this step is reached.
    Command(Command),
}

impl From<Node> for Step {
    fn from(node: Node) -> Self {
        Self::Clause(node)
    }
}

impl From<Command> for Step {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

/// A command bound to the migrator that will fulfil it.
///
/// Building an operation performs no database access. It is consumed when
/// run; re-running the same change is not guarded against and usually fails
/// at the database (adding a column that already exists, for instance).
pub struct Operation<'m, D: Database> {
    migrator: &'m Migrator<D>,
    command: Command,
}

impl<'m, D: Database> Operation<'m, D> {
    /// Binds a command to a migrator.
    #[must_use]
    pub const fn new(migrator: &'m Migrator<D>, command: Command) -> Self {
        Self { migrator, command }
    }

    /// Returns the wrapped command.
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Generates the steps this operation expands to, without executing them.
    ///
    /// Introspecting dialects read the catalog here. Nested commands are
    /// returned unexpanded.
    pub async fn generate(&self) -> Result<Vec<Step>> {
        self.migrator.generate(&self.command).await
    }

    /// Generates and executes the operation.
    ///
    /// Statements run in generation order; the first failure is returned
    /// unchanged and statements already executed stay applied.
    pub async fn run(self) -> Result<()> {
        info!(
            operation = self.command.name(),
            table = %self.command.table(),
            "Running operation"
        );
        self.migrator.run_command(&self.command).await
    }
}

/// Runs operations in order, stopping at the first error.
///
/// Every operation's arguments are validated before any statement runs.
/// Nothing is wrapped in a transaction; callers that need atomicity wrap
/// the call themselves on dialects with transactional DDL.
pub async fn migrate<'m, D, I>(operations: I) -> Result<()>
where
    D: Database + 'm,
    I: IntoIterator<Item = Operation<'m, D>>,
{
    let operations: Vec<Operation<'m, D>> = operations.into_iter().collect();
    for operation in &operations {
        operation.command.validate()?;
    }

    info!(count = operations.len(), "Applying schema operations");
    for operation in operations {
        operation.run().await?;
    }
    info!("Schema operations applied");

    Ok(())
}
