//! SQL dialect support.
//!
//! The clause compiler only needs two things from a dialect: how to quote an
//! identifier and how to spell the n-th bound parameter.

mod generic;
mod mysql;
mod postgres;
mod sqlite;

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Trait for SQL dialect-specific rendering.
pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (`"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the placeholder for the parameter at 1-based `index`.
    fn placeholder(&self, index: usize) -> String {
        let _ = index;
        String::from("?")
    }

    /// Quotes an identifier, doubling any embedded quote character.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }
}
