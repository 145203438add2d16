//! The database collaborator.
//!
//! Strategies only ever talk to the database through [`Database::execute_sql`]:
//! catalog lookups read the returned [`Cursor`], schema statements ignore it.
//!
//! Pools and locked connections (`futures::lock::Mutex<SqliteConnection>`
//! and friends) both implement [`Database`]. A SQLite table rebuild with
//! foreign keys enforced needs one connection throughout: use a locked
//! connection or a pool capped at one connection.

use std::future::Future;

use futures::lock::Mutex;
use sqlshift_core::SqlValue;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::config::DialectKind;
use crate::error::{MigrateError, Result};

/// Rows returned by one statement, fully buffered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl Cursor {
    /// Creates a cursor over the given rows.
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    /// Creates a cursor with no rows, as returned by schema statements.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Returns the result column names.
    ///
    /// Drivers only learn column names from a returned row, so this is empty
    /// for statements that produced no rows.
    #[must_use]
    pub fn description(&self) -> &[String] {
        &self.columns
    }

    /// Consumes the cursor, returning every row.
    #[must_use]
    pub fn fetch_all(self) -> Vec<Vec<SqlValue>> {
        self.rows
    }

    /// Consumes the cursor, returning the first row if there is one.
    #[must_use]
    pub fn fetch_one(self) -> Option<Vec<SqlValue>> {
        self.rows.into_iter().next()
    }
}

/// A database handle migrations execute against.
pub trait Database: Send + Sync {
    /// Returns the dialect this database speaks.
    fn dialect(&self) -> DialectKind;

    /// Executes one statement with positional parameters.
    fn execute_sql(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = Result<Cursor>> + Send;

    /// Returns true if consecutive statements are guaranteed to share one
    /// connection, so that per-connection settings carry over between them.
    fn single_connection(&self) -> bool {
        true
    }
}

/// Implements [`Database`] for a sqlx pool or a locked sqlx connection.
///
/// Parameters are bound by variant. Result cells are decoded by trying the
/// widest compatible Rust type first, since catalog queries return a mix of
/// integer widths, text and driver-specific string types.
macro_rules! sqlx_database {
    (pool $pool:ty, $db:ty, $kind:expr) => {
        sqlx_database!($pool, $db, $kind, |pool| pool, |pool| {
            pool.options().get_max_connections() <= 1
        });
    };
    (connection $conn:ty, $db:ty, $kind:expr) => {
        sqlx_database!(Mutex<$conn>, $db, $kind, |conn| &mut *conn.lock().await, |_conn| true);
    };
    ($handle:ty, $db:ty, $kind:expr, |$this:ident| $executor:expr, |$that:ident| $single:expr) => {
        impl Database for $handle {
            fn dialect(&self) -> DialectKind {
                $kind
            }

            fn single_connection(&self) -> bool {
                let $that = self;
                $single
            }

            fn execute_sql(
                &self,
                sql: &str,
                params: &[SqlValue],
            ) -> impl Future<Output = Result<Cursor>> + Send {
                let $this = self;
                async move {
                    debug!(dialect = %$kind, sql = %sql, params = ?params, "Executing SQL");

                    let mut query = sqlx::query::<$db>(sql);
                    for param in params {
                        query = match param {
                            SqlValue::Null => query.bind(None::<String>),
                            SqlValue::Bool(v) => query.bind(*v),
                            SqlValue::Int(v) => query.bind(*v),
                            SqlValue::Float(v) => query.bind(*v),
                            SqlValue::Text(v) => query.bind(v.clone()),
                            SqlValue::Blob(v) => query.bind(v.clone()),
                        };
                    }

                    let rows = query.fetch_all($executor).await?;
                    let columns = rows.first().map_or_else(Vec::new, |row| {
                        row.columns().iter().map(|c| c.name().to_string()).collect()
                    });

                    let mut decoded = Vec::with_capacity(rows.len());
                    for row in &rows {
                        let mut values = Vec::with_capacity(row.len());
                        for index in 0..row.len() {
                            let raw = row.try_get_raw(index)?;
                            if raw.is_null() {
                                values.push(SqlValue::Null);
                                continue;
                            }
                            let type_name = raw.type_info().name().to_string();

                            let value = if let Ok(v) = row.try_get::<i64, _>(index) {
                                SqlValue::Int(v)
                            } else if let Ok(v) = row.try_get::<i32, _>(index) {
                                SqlValue::Int(i64::from(v))
                            } else if let Ok(v) = row.try_get::<i16, _>(index) {
                                SqlValue::Int(i64::from(v))
                            } else if let Ok(v) = row.try_get::<f64, _>(index) {
                                SqlValue::Float(v)
                            } else if let Ok(v) = row.try_get::<f32, _>(index) {
                                SqlValue::Float(f64::from(v))
                            } else if let Ok(v) = row.try_get::<bool, _>(index) {
                                SqlValue::Bool(v)
                            } else if let Ok(v) = row.try_get::<String, _>(index) {
                                SqlValue::Text(v)
                            } else if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
                                SqlValue::Blob(v)
                            } else {
                                return Err(MigrateError::UnsupportedValue {
                                    column: row.column(index).name().to_string(),
                                    type_name,
                                });
                            };
                            values.push(value);
                        }
                        decoded.push(values);
                    }

                    Ok(Cursor::new(columns, decoded))
                }
            }
        }
    };
}

sqlx_database!(pool sqlx::SqlitePool, sqlx::Sqlite, DialectKind::Sqlite);
sqlx_database!(pool sqlx::PgPool, sqlx::Postgres, DialectKind::Postgres);
sqlx_database!(pool sqlx::MySqlPool, sqlx::MySql, DialectKind::MySql);
sqlx_database!(connection sqlx::SqliteConnection, sqlx::Sqlite, DialectKind::Sqlite);
sqlx_database!(connection sqlx::PgConnection, sqlx::Postgres, DialectKind::Postgres);
sqlx_database!(connection sqlx::MySqlConnection, sqlx::MySql, DialectKind::MySql);
