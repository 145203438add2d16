//! Renders clause trees into SQL text plus positional parameters.

use crate::clause::Node;
use crate::dialect::Dialect;
use crate::value::SqlValue;

/// Compiles [`Node`] trees for one dialect.
pub struct Compiler<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> Compiler<'d> {
    /// Creates a compiler for the given dialect.
    #[must_use]
    pub const fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Compiles a node into `(sql, params)`.
    ///
    /// Placeholders are numbered in the order parameters appear in the text.
    #[must_use]
    pub fn compile(&self, node: &Node) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let sql = self.render(node, &mut params);
        (sql, params)
    }

    fn render(&self, node: &Node, params: &mut Vec<SqlValue>) -> String {
        match node {
            Node::Entity(name) => self.dialect.quote_identifier(name),
            Node::Sql(text) => text.clone(),
            Node::Param(value) => {
                params.push(value.clone());
                self.dialect.placeholder(params.len())
            }
            Node::Clause(nodes) => self.join(nodes, " ", params),
            Node::Comma(nodes) => self.join(nodes, ", ", params),
            Node::Enclosed(nodes) => format!("({})", self.join(nodes, ", ", params)),
            Node::Equals(lhs, rhs) => {
                let lhs = self.render(lhs, params);
                let rhs = self.render(rhs, params);
                format!("{lhs} = {rhs}")
            }
        }
    }

    fn join(&self, nodes: &[Node], separator: &str, params: &mut Vec<SqlValue>) -> String {
        nodes
            .iter()
            .map(|node| self.render(node, params))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};

    fn update_clause() -> Node {
        Node::clause(vec![
            Node::sql("UPDATE"),
            Node::entity("story"),
            Node::sql("SET"),
            Node::equals(Node::entity("status"), Node::param("open")),
        ])
    }

    #[test]
    fn test_compile_update_sqlite() {
        let (sql, params) = Compiler::new(&SqliteDialect).compile(&update_clause());
        assert_eq!(sql, "UPDATE \"story\" SET \"status\" = ?");
        assert_eq!(params, vec![SqlValue::Text(String::from("open"))]);
    }

    #[test]
    fn test_compile_update_postgres_numbers_placeholders() {
        let node = Node::clause(vec![
            Node::sql("UPDATE"),
            Node::entity("story"),
            Node::sql("SET"),
            Node::comma(vec![
                Node::equals(Node::entity("a"), Node::param(1_i64)),
                Node::equals(Node::entity("b"), Node::param(2_i64)),
            ]),
        ]);
        let (sql, params) = Compiler::new(&PostgresDialect).compile(&node);
        assert_eq!(sql, "UPDATE \"story\" SET \"a\" = $1, \"b\" = $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_compile_enclosed_list_mysql() {
        let node = Node::clause(vec![
            Node::sql("CREATE INDEX"),
            Node::entity("story_pub_date"),
            Node::sql("ON"),
            Node::entity("story"),
            Node::enclosed(Node::entities(&["pub_date", "status"])),
        ]);
        let (sql, params) = Compiler::new(&MySqlDialect).compile(&node);
        assert_eq!(
            sql,
            "CREATE INDEX `story_pub_date` ON `story` (`pub_date`, `status`)"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_empty_fragments_are_skipped() {
        let node = Node::clause(vec![Node::sql("DROP TABLE"), Node::sql(""), Node::entity("t")]);
        let (sql, _) = Compiler::new(&SqliteDialect).compile(&node);
        assert_eq!(sql, "DROP TABLE \"t\"");
    }

    #[test]
    fn test_push_extends_clause() {
        let node = Node::sql("DROP INDEX").push(Node::entity("idx"));
        let (sql, _) = Compiler::new(&SqliteDialect).compile(&node);
        assert_eq!(sql, "DROP INDEX \"idx\"");
    }
}
