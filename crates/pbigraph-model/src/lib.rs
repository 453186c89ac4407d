//! Power BI data model and dependency graph
//!
//! This crate handles:
//! - Parsing the DataModelSchema document (tables, partitions, expressions)
//! - Building the node catalog, including date-table filtering
//! - Assembling and traversing the dependency graph

pub mod schema;
pub mod catalog;
pub mod graph;

pub use schema::{DataModelSchema, ModelDefinition, TableDefinition, Partition, PartitionSource, ExpressionDefinition, SourceText, NodeOrigin, NodeSource, SchemaError};
pub use catalog::{build_catalog, Node, NodeCatalog, NodeId};
pub use graph::{DependencyGraph, Edge};
