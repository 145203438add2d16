//! Abstract clause trees.
//!
//! A [`Node`] describes one SQL statement (or a fragment of one) before it is
//! rendered for a particular dialect. Identifiers stay unquoted and values
//! stay unbound until the [`Compiler`](crate::Compiler) walks the tree.

use crate::value::{SqlValue, ToSqlValue};

/// A node in an abstract clause tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An identifier (table, column, index or sequence name), quoted on render.
    Entity(String),
    /// Raw SQL text emitted verbatim (keywords, type definitions, whole statements).
    Sql(String),
    /// A bound parameter, rendered as the dialect's placeholder.
    Param(SqlValue),
    /// Children joined by single spaces.
    Clause(Vec<Node>),
    /// Children joined by `, `.
    Comma(Vec<Node>),
    /// Children joined by `, ` and wrapped in parentheses.
    Enclosed(Vec<Node>),
    /// `lhs = rhs`.
    Equals(Box<Node>, Box<Node>),
}

impl Node {
    /// Creates an identifier node.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    /// Creates a raw SQL node.
    #[must_use]
    pub fn sql(text: impl Into<String>) -> Self {
        Self::Sql(text.into())
    }

    /// Creates a parameter node.
    #[must_use]
    pub fn param(value: impl ToSqlValue) -> Self {
        Self::Param(value.to_sql_value())
    }

    /// Creates a space-joined clause.
    #[must_use]
    pub const fn clause(nodes: Vec<Self>) -> Self {
        Self::Clause(nodes)
    }

    /// Creates a comma-joined list.
    #[must_use]
    pub const fn comma(nodes: Vec<Self>) -> Self {
        Self::Comma(nodes)
    }

    /// Creates a parenthesised, comma-joined list.
    #[must_use]
    pub const fn enclosed(nodes: Vec<Self>) -> Self {
        Self::Enclosed(nodes)
    }

    /// Creates an equality expression.
    #[must_use]
    pub fn equals(lhs: Self, rhs: Self) -> Self {
        Self::Equals(Box::new(lhs), Box::new(rhs))
    }

    /// Maps a list of names to entity nodes.
    #[must_use]
    pub fn entities<S: AsRef<str>>(names: &[S]) -> Vec<Self> {
        names.iter().map(|n| Self::entity(n.as_ref())).collect()
    }

    /// Appends a node to a clause, turning any other node into a clause first.
    #[must_use]
    pub fn push(self, node: Self) -> Self {
        match self {
            Self::Clause(mut nodes) => {
                nodes.push(node);
                Self::Clause(nodes)
            }
            other => Self::Clause(vec![other, node]),
        }
    }
}
