//! Dialect selection.
//!
//! The target dialect is chosen once, when a [`Migrator`](crate::Migrator) is
//! built, either from the database handle itself or from configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlshift_core::{Dialect, GenericDialect, MySqlDialect, PostgresDialect, SqliteDialect};

use crate::error::MigrateError;

/// The SQL dialect a migrator generates statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// Plain `ALTER TABLE` support, no dialect-specific fix-ups.
    Generic,
    /// PostgreSQL: native `ALTER TABLE`, sequences follow table renames.
    Postgres,
    /// MySQL / MariaDB: `MODIFY` / `CHANGE` with introspected definitions.
    #[serde(rename = "mysql")]
    MySql,
    /// SQLite: table rebuilds for anything beyond add column and renames.
    #[default]
    Sqlite,
}

impl DialectKind {
    /// Returns the clause-rendering dialect.
    #[must_use]
    pub fn sql_dialect(self) -> &'static dyn Dialect {
        static GENERIC: GenericDialect = GenericDialect::new();
        static POSTGRES: PostgresDialect = PostgresDialect::new();
        static MYSQL: MySqlDialect = MySqlDialect::new();
        static SQLITE: SqliteDialect = SqliteDialect::new();

        match self {
            Self::Generic => &GENERIC,
            Self::Postgres => &POSTGRES,
            Self::MySql => &MYSQL,
            Self::Sqlite => &SQLITE,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Infers the dialect from a connection URL scheme, e.g. `postgres://...`.
    pub fn from_url(url: &str) -> Result<Self, MigrateError> {
        let scheme = url
            .split_once(':')
            .map_or(url, |(scheme, _)| scheme)
            .trim();
        scheme.parse()
    }
}

impl FromStr for DialectKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(MigrateError::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Migrator settings that can be loaded from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MigratorConfig {
    /// Target dialect.
    pub dialect: DialectKind,
}

impl MigratorConfig {
    /// Creates a config for the given dialect.
    #[must_use]
    pub const fn new(dialect: DialectKind) -> Self {
        Self { dialect }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("PostgreSQL".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!("mariadb".parse::<DialectKind>().unwrap(), DialectKind::MySql);
        assert_eq!("sqlite3".parse::<DialectKind>().unwrap(), DialectKind::Sqlite);
        assert!(matches!(
            "oracle".parse::<DialectKind>(),
            Err(MigrateError::UnknownDialect(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            DialectKind::from_url("postgres://app@localhost/blog").unwrap(),
            DialectKind::Postgres
        );
        assert_eq!(
            DialectKind::from_url("mysql://root@127.0.0.1:3306/blog").unwrap(),
            DialectKind::MySql
        );
        assert_eq!(DialectKind::from_url("sqlite::memory:").unwrap(), DialectKind::Sqlite);
        assert!(DialectKind::from_url("db.sqlite3").is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: MigratorConfig = serde_json::from_str(r#"{"dialect": "mysql"}"#).unwrap();
        assert_eq!(config.dialect, DialectKind::MySql);
        assert_eq!(config.dialect.sql_dialect().identifier_quote(), '`');

        let json = serde_json::to_string(&MigratorConfig::new(DialectKind::Postgres)).unwrap();
        assert_eq!(json, r#"{"dialect":"postgres"}"#);
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [
            DialectKind::Generic,
            DialectKind::Postgres,
            DialectKind::MySql,
            DialectKind::Sqlite,
        ] {
            assert_eq!(kind.to_string().parse::<DialectKind>().unwrap(), kind);
        }
    }
}
