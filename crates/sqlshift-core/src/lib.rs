//! # sqlshift-core
//!
//! Dialect-aware clause trees for schema migrations.
//!
//! This crate provides:
//! - [`Node`], an abstract clause tree describing one SQL statement
//! - [`Dialect`] implementations for generic SQL, PostgreSQL, MySQL and SQLite
//! - [`Compiler`], which renders a tree into SQL text and positional parameters
//!
//! ## Example
//!
//! ```rust
//! use sqlshift_core::{Compiler, Node, PostgresDialect, SqlValue};
//!
//! let update = Node::clause(vec![
//!     Node::sql("UPDATE"),
//!     Node::entity("story"),
//!     Node::sql("SET"),
//!     Node::equals(Node::entity("status"), Node::param("open")),
//! ]);
//!
//! let (sql, params) = Compiler::new(&PostgresDialect).compile(&update);
//! assert_eq!(sql, "UPDATE \"story\" SET \"status\" = $1");
//! assert_eq!(params, vec![SqlValue::Text("open".into())]);
//! ```

pub mod clause;
pub mod compiler;
pub mod dialect;
pub mod value;

pub use clause::Node;
pub use compiler::Compiler;
pub use dialect::{Dialect, GenericDialect, MySqlDialect, PostgresDialect, SqliteDialect};
pub use value::{SqlValue, ToSqlValue};
