//! Incremental schema migrations for SQLite, PostgreSQL and MySQL.
//!
//! `sqlshift-migrate` applies small, individual schema changes (add a column,
//! rename a column, toggle NOT NULL, manage indexes) to a live database:
//! - Operations are deferred: building one touches nothing until it runs
//! - Each dialect picks the statements its engine can actually execute
//! - SQLite changes that `ALTER TABLE` cannot express rebuild the table,
//!   preserving rows and indexes
//!
//! # Architecture
//!
//! - **Migrator** - Owns the database handle and the dialect strategy, and
//!   builds operations
//! - **Operations** - A [`Command`] bound to a migrator; generating it yields
//!   [`Step`]s
//! - **Dialect** - Per-engine strategies over shared clause builders
//! - **DDL** - Tokenizer and splitter for stored `CREATE TABLE` text
//!
//! # Example
//!
//! ```rust,no_run
//! use sqlshift_migrate::prelude::*;
//!
//! # async fn run() -> sqlshift_migrate::Result<()> {
//! let pool = sqlx::SqlitePool::connect("sqlite:blog.db").await?;
//! let migrator = Migrator::from_database(pool);
//!
//! migrator
//!     .migrate([
//!         migrator.add_column(
//!             "story",
//!             "status",
//!             Field::new(FieldType::Varchar(16)).not_null().default("draft"),
//!         ),
//!         migrator.rename_column("story", "pub_date", "publish_date"),
//!         migrator.add_index("story", &["publish_date"], false),
//!     ])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Nothing is wrapped in a transaction. On engines with transactional DDL,
//! callers that need all-or-nothing behaviour open one around the call.

pub mod config;
pub mod database;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod field;
pub mod migrator;
pub mod operation;

pub use config::{DialectKind, MigratorConfig};
pub use database::{Cursor, Database};
pub use error::{MigrateError, Result};
pub use field::{Field, FieldDefault, FieldType, ForeignKey};
pub use migrator::Migrator;
pub use operation::{migrate, Command, Operation, Step};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{DialectKind, MigratorConfig};
    pub use crate::database::{Cursor, Database};
    pub use crate::error::{MigrateError, Result};
    pub use crate::field::{Field, FieldDefault, FieldType, ForeignKey};
    pub use crate::migrator::Migrator;
    pub use crate::operation::{migrate, Command, Operation, Step};
    pub use sqlshift_core::{SqlValue, ToSqlValue};
}
