//! Node catalog
//!
//! The deduplicated set of node identifiers (tables and expressions) that
//! references are resolved against.

use std::collections::HashMap;
use tracing::debug;
use crate::schema::{DataModelSchema, NodeOrigin, SchemaError};

/// Node identifier (table or expression name)
pub type NodeId = String;

/// A vertex of the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,

    /// Collection the node was declared in
    pub origin: NodeOrigin,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, origin: NodeOrigin) -> Self {
        Self {
            id: id.into(),
            origin,
        }
    }
}

/// Ordered, deduplicated node set
///
/// Insertion order is kept so that "first match" rules are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeCatalog {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
}

impl NodeCatalog {
    /// Build a catalog from nodes; the first node seen for an identifier wins
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut catalog = Self::default();

        for node in nodes {
            if catalog.index.contains_key(&node.id) {
                debug!(node = %node.id, origin = %node.origin, "duplicate node identifier ignored");
                continue;
            }

            catalog.index.insert(node.id.clone(), catalog.nodes.len());
            catalog.nodes.push(node);
        }

        catalog
    }

    /// Collect every table and expression name in the schema
    ///
    /// Tables come first, then expressions, each in declaration order.
    pub fn from_schema(schema: &DataModelSchema) -> Result<Self, SchemaError> {
        let tables = schema
            .tables()?
            .iter()
            .map(|table| Node::new(table.name.clone(), NodeOrigin::Table));

        let expressions = schema
            .expressions()
            .iter()
            .map(|expression| Node::new(expression.name.clone(), NodeOrigin::Expression));

        Ok(Self::from_nodes(tables.chain(expressions)))
    }

    /// Drop the first node whose identifier starts with `prefix`
    ///
    /// Only one node is removed even when several match.
    pub fn without_date_table(self, prefix: &str) -> (Self, Option<Node>) {
        let Some(position) = self.nodes.iter().position(|node| node.id.starts_with(prefix)) else {
            return (self, None);
        };

        let mut nodes = self.nodes;
        let removed = nodes.remove(position);
        (Self::from_nodes(nodes), Some(removed))
    }

    /// Drop every node matching `predicate`
    pub fn without_matching(self, predicate: impl Fn(&Node) -> bool) -> (Self, Vec<Node>) {
        let (removed, kept): (Vec<Node>, Vec<Node>) =
            self.nodes.into_iter().partition(|node| predicate(node));

        (Self::from_nodes(kept), removed)
    }

    /// Whether `id` is a catalog entry
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a node by identifier
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Nodes in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node identifiers in catalog order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build the catalog for a schema and apply the date-table filter
pub fn build_catalog(
    schema: &DataModelSchema,
    date_table_prefix: &str,
) -> Result<NodeCatalog, SchemaError> {
    let (catalog, removed) = NodeCatalog::from_schema(schema)?.without_date_table(date_table_prefix);

    if let Some(node) = removed {
        debug!(node = %node.id, "removed auto-generated date table");
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str) -> Node {
        Node::new(id, NodeOrigin::Table)
    }

    fn schema(json: &str) -> DataModelSchema {
        DataModelSchema::from_str(json).unwrap()
    }

    #[test]
    fn first_seen_wins() {
        let catalog = NodeCatalog::from_nodes(vec![
            table("Sales"),
            Node::new("Sales", NodeOrigin::Expression),
            table("Region"),
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Sales").unwrap().origin, NodeOrigin::Table);
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["Sales", "Region"]);
    }

    #[test]
    fn date_table_is_excluded() {
        let catalog = NodeCatalog::from_nodes(vec![
            table("DateTableTemplate_abc123"),
            table("Sales"),
            table("Region"),
        ]);

        let (filtered, removed) = catalog.without_date_table("DateTableTemplate");
        assert_eq!(removed.unwrap().id, "DateTableTemplate_abc123");
        assert_eq!(filtered.ids().collect::<Vec<_>>(), vec!["Sales", "Region"]);
        assert!(!filtered.contains("DateTableTemplate_abc123"));
    }

    #[test]
    fn only_first_date_table_is_excluded() {
        let catalog = NodeCatalog::from_nodes(vec![
            table("Sales"),
            table("DateTableTemplate_1"),
            table("DateTableTemplate_2"),
        ]);

        let (filtered, removed) = catalog.without_date_table("DateTableTemplate");
        assert_eq!(removed.unwrap().id, "DateTableTemplate_1");
        assert!(filtered.contains("DateTableTemplate_2"));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn no_date_table_is_a_noop() {
        let catalog = NodeCatalog::from_nodes(vec![table("Sales")]);
        let (filtered, removed) = catalog.clone().without_date_table("DateTableTemplate");
        assert!(removed.is_none());
        assert_eq!(filtered, catalog);
    }

    #[test]
    fn without_matching_reindexes() {
        let catalog = NodeCatalog::from_nodes(vec![table("A"), table("tmp_B"), table("C")]);
        let (filtered, removed) = catalog.without_matching(|node| node.id.starts_with("tmp_"));

        assert_eq!(removed.len(), 1);
        assert_eq!(filtered.get("C").unwrap().id, "C");
        assert!(!filtered.contains("tmp_B"));
    }

    #[test]
    fn catalog_from_schema_includes_expressions() {
        let schema = schema(
            r#"{ "model": {
                "tables": [ { "name": "Sales" }, { "name": "DateTableTemplate_9f" } ],
                "expressions": [ { "name": "Region", "kind": "m", "expression": "1" } ]
            } }"#,
        );

        let catalog = build_catalog(&schema, "DateTableTemplate").unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["Sales", "Region"]);
        assert_eq!(catalog.get("Region").unwrap().origin, NodeOrigin::Expression);
    }

    #[test]
    fn catalog_without_expressions_collection() {
        let schema = schema(r#"{ "model": { "tables": [ { "name": "Sales" } ] } }"#);
        let catalog = build_catalog(&schema, "DateTableTemplate").unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn catalog_requires_tables() {
        let schema = schema(r#"{ "model": {} }"#);
        assert!(matches!(
            build_catalog(&schema, "DateTableTemplate"),
            Err(SchemaError::MissingTables)
        ));
    }

    #[test]
    fn zero_nodes_is_ok() {
        let schema = schema(r#"{ "model": { "tables": [] } }"#);
        let catalog = build_catalog(&schema, "DateTableTemplate").unwrap();
        assert!(catalog.is_empty());
    }
}
