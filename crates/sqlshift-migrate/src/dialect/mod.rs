//! Dialect strategies.
//!
//! Each strategy turns a [`Command`] into [`Step`]s. [`base`] holds the
//! clause builders shared by every dialect; the others override the commands
//! their engine cannot express with plain `ALTER TABLE` and defer to `base`
//! for the rest.

pub mod base;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::config::DialectKind;
use crate::database::Database;
use crate::error::Result;
use crate::migrator::Migrator;
use crate::operation::{Command, Step};

/// Dispatches to the strategy selected when the migrator was built.
pub(crate) async fn generate<D: Database>(
    migrator: &Migrator<D>,
    command: &Command,
) -> Result<Vec<Step>> {
    match migrator.dialect() {
        DialectKind::Generic => base::generate(DialectKind::Generic, command),
        DialectKind::Postgres => postgres::generate(migrator, command).await,
        DialectKind::MySql => mysql::generate(migrator, command).await,
        DialectKind::Sqlite => sqlite::generate(migrator, command).await,
    }
}
