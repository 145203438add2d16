#![allow(dead_code)]

use std::sync::Mutex;

use sqlshift_core::SqlValue;
use sqlshift_migrate::{Cursor, Database, DialectKind, MigrateError, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

pub async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

pub async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
}

/// Column names of `table`, in declaration order.
pub async fn columns(pool: &SqlitePool, table: &str) -> Vec<String> {
    sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

/// Whether `column` of `table` is declared NOT NULL.
pub async fn is_not_null(pool: &SqlitePool, table: &str, column: &str) -> bool {
    sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .find(|row| row.get::<String, _>("name") == column)
        .map(|row| row.get::<i64, _>("notnull") == 1)
        .unwrap_or_else(|| panic!("Column {column} not found in {table}"))
}

/// The stored SQL of an index, if it exists.
pub async fn index_sql(pool: &SqlitePool, name: &str) -> Option<String> {
    sqlx::query("SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .unwrap()
        .map(|row| row.get::<String, _>("sql"))
}

pub async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
    sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .unwrap()
        .is_some()
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await
        .unwrap()
        .get(0)
}

/// A database that records every statement and answers catalog queries
/// from a script.
pub struct RecordingDatabase {
    dialect: DialectKind,
    responses: Vec<(String, Cursor)>,
    fail_on: Option<String>,
    log: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl RecordingDatabase {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            responses: Vec::new(),
            fail_on: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answers statements containing `fragment` with `rows`.
    pub fn respond(mut self, fragment: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        let columns = columns.iter().map(ToString::to_string).collect();
        self.responses
            .push((fragment.to_string(), Cursor::new(columns, rows)));
        self
    }

    /// Fails statements containing `fragment`.
    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn executed(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.log.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|(sql, _)| sql).collect()
    }

    /// Statements other than catalog lookups.
    pub fn schema_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|sql| !sql.starts_with("SELECT") && !sql.starts_with("PRAGMA"))
            .collect()
    }
}

impl Database for RecordingDatabase {
    fn dialect(&self) -> DialectKind {
        self.dialect
    }

    async fn execute_sql(&self, sql: &str, params: &[SqlValue]) -> Result<Cursor> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if self.fail_on.as_deref().is_some_and(|f| sql.contains(f)) {
            return Err(MigrateError::Database(sqlx::Error::Protocol(format!(
                "scripted failure: {sql}"
            ))));
        }

        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map_or_else(Cursor::empty, |(_, cursor)| cursor.clone()))
    }
}
