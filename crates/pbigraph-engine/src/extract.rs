//! Dependency graph extraction for a whole data model
//!
//! Builds the node catalog, resolves every Power Query source against it,
//! and assembles the resulting graph.

use pbigraph_core::{Config, ConfigError, Diagnostic, DiagnosticCode, Location, Report, ReportEdge, ReportNode, Severity};
use pbigraph_model::{DataModelSchema, DependencyGraph, Edge, Node, NodeCatalog, SchemaError};
use pbigraph_mquery::{ReferenceResolver, ResolutionWarning, ResolverOptions};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that stop an extraction before a graph exists
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ExtractError {
    /// Report diagnostic for this failure
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Schema(err) => err.to_diagnostic(),
            Self::Config(err) => Diagnostic::new(
                DiagnosticCode::SchemaParseError,
                Severity::Error,
                format!("configuration rejected: {err}"),
            ),
        }
    }
}

/// Result of extracting a graph from a schema
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The assembled dependency graph
    pub graph: DependencyGraph,

    /// Nodes removed from the catalog (date table, `skip_nodes`)
    pub filtered: Vec<Node>,

    /// Problems recovered from while resolving sources
    pub warnings: Vec<ResolutionWarning>,

    /// Edges the assembler refused because an endpoint is not a node
    pub dangling: Vec<Edge>,
}

impl Extraction {
    /// Convert everything worth reporting into diagnostics
    pub fn diagnostics(&self, config: &Config) -> Vec<Diagnostic> {
        let severity = |code, default| config.severity.get_severity(code, default);
        let mut diagnostics = Vec::new();

        for node in &self.filtered {
            let code = DiagnosticCode::GraphNodeFiltered;
            diagnostics.push(
                Diagnostic::new(
                    code,
                    severity(code, Severity::Info),
                    format!("{} '{}' left out of the graph", node.origin, node.id),
                )
                .with_location(Location::new(&node.id)),
            );
        }

        for warning in &self.warnings {
            diagnostics.push(warning.to_diagnostic(severity(warning.code(), Severity::Warn)));
        }

        for edge in &self.dangling {
            let code = DiagnosticCode::GraphDanglingEdge;
            diagnostics.push(
                Diagnostic::new(
                    code,
                    severity(code, Severity::Warn),
                    format!("edge {} names a node outside the catalog", edge),
                )
                .with_location(Location::new(&edge.target)),
            );
        }

        diagnostics
    }

    /// Build report.json content
    ///
    /// Ids lose their `:` characters when `sanitize_ids` is set.
    pub fn to_report(&self, config: &Config) -> Report {
        let id = |id: &str| {
            if config.sanitize_ids {
                DependencyGraph::sanitized_id(id)
            } else {
                id.to_string()
            }
        };

        let nodes = self
            .graph
            .nodes()
            .iter()
            .map(|node| ReportNode {
                id: id(&node.id),
                origin: node.origin.to_string(),
            })
            .collect();

        let edges = self
            .graph
            .edges()
            .iter()
            .map(|edge| ReportEdge {
                source: id(&edge.source),
                target: id(&edge.target),
            })
            .collect();

        Report::from_graph(nodes, edges, self.diagnostics(config))
    }
}

/// Runs the catalog -> resolve -> assemble pipeline
#[derive(Debug, Clone, Copy)]
pub struct GraphExtractor<'a> {
    config: &'a Config,
}

impl<'a> GraphExtractor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Build the filtered node catalog
    ///
    /// Returns the catalog together with the nodes that were filtered out.
    pub fn catalog(&self, schema: &DataModelSchema) -> Result<(NodeCatalog, Vec<Node>), ExtractError> {
        let skip = self.config.skip_matcher()?;
        let (catalog, date_table) =
            NodeCatalog::from_schema(schema)?.without_date_table(&self.config.date_table_prefix);
        let (catalog, mut filtered) = catalog.without_matching(|node| skip.is_match(&node.id));

        if let Some(node) = date_table {
            debug!(node = %node.id, "removed auto-generated date table");
            filtered.insert(0, node);
        }

        Ok((catalog, filtered))
    }

    /// Extract the dependency graph of a schema
    pub fn extract(&self, schema: &DataModelSchema) -> Result<Extraction, ExtractError> {
        let (catalog, filtered) = self.catalog(schema)?;
        let resolver = ReferenceResolver::new(&catalog).with_options(ResolverOptions {
            mask_field_access: self.config.mask_field_access,
        });

        let mut edges = Vec::new();
        let mut warnings = Vec::new();

        for source in schema.m_sources()? {
            if !catalog.contains(source.node) {
                debug!(node = %source.node, "source belongs to a filtered node, skipping");
                continue;
            }

            let resolution = resolver.resolve_source(source.node, &source.lines);
            debug!(
                node = %source.node,
                partition = source.partition.unwrap_or("-"),
                edges = resolution.edges.len(),
                "resolved source"
            );

            for warning in &resolution.warnings {
                warn!(node = %source.node, line = warning.line, "{}", warning);
            }

            edges.extend(resolution.edges);
            warnings.extend(resolution.warnings);
        }

        let (graph, dangling) =
            DependencyGraph::assemble_with_rejects(&catalog, edges, &self.config.graph);

        Ok(Extraction {
            graph,
            filtered,
            warnings,
            dangling,
        })
    }
}

/// Extract the dependency graph of `schema` using `config`
pub fn extract_graph(schema: &DataModelSchema, config: &Config) -> Result<Extraction, ExtractError> {
    GraphExtractor::new(config).extract(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(json: &str) -> DataModelSchema {
        DataModelSchema::from_str(json).unwrap()
    }

    #[test]
    fn date_table_source_is_not_resolved() {
        let schema = schema(
            r#"{ "model": { "tables": [
                { "name": "Sales", "partitions": [
                    { "source": { "type": "m", "expression": ["let", "  S = 1", "in", "  S"] } }
                ] },
                { "name": "DateTableTemplate_abc123", "partitions": [
                    { "source": { "type": "m", "expression": ["let", "  D = Sales", "in", "  D"] } }
                ] },
                { "name": "Region", "partitions": [] }
            ] } }"#,
        );

        let extraction = extract_graph(&schema, &Config::default()).unwrap();
        let ids: Vec<&String> = extraction.graph.node_ids().collect();

        assert_eq!(ids, vec!["Sales", "Region"]);
        assert!(extraction.graph.edges().is_empty());
        assert!(extraction.dangling.is_empty());
        assert_eq!(extraction.filtered[0].id, "DateTableTemplate_abc123");
    }

    #[test]
    fn skip_nodes_pattern() {
        let schema = schema(
            r#"{ "model": { "tables": [ { "name": "Sales" }, { "name": "Scratch Sales" } ] } }"#,
        );
        let config = Config {
            skip_nodes: vec!["Scratch *".to_string()],
            ..Config::default()
        };

        let (catalog, filtered) = GraphExtractor::new(&config).catalog(&schema).unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["Sales"]);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn bad_skip_pattern_fails_extraction() {
        let schema = schema(r#"{ "model": { "tables": [ { "name": "Sales" } ] } }"#);
        let config = Config {
            skip_nodes: vec!["Sales[".to_string()],
            ..Config::default()
        };

        let err = extract_graph(&schema, &config).unwrap_err();
        assert!(matches!(err, ExtractError::Config(ConfigError::InvalidPattern(..))));
        assert_eq!(err.to_diagnostic().severity, Severity::Error);
    }

    #[test]
    fn sanitize_ids_rewrites_report_ids() {
        let schema = schema(
            r##"{ "model": { "tables": [
                { "name": "Sheet1:Data" },
                { "name": "Sales", "partitions": [
                    { "source": { "type": "m", "expression": "#\"Sheet1:Data\"" } }
                ] }
            ] } }"##,
        );

        let mut config = Config::default();
        let extraction = extract_graph(&schema, &config).unwrap();
        assert_eq!(extraction.to_report(&config).nodes[0].id, "Sheet1:Data");

        config.sanitize_ids = true;
        let report = extraction.to_report(&config);
        assert_eq!(report.nodes[0].id, "Sheet1Data");
        assert_eq!(report.edges[0].source, "Sheet1Data");
        assert_eq!(report.edges[0].target, "Sales");
    }

    #[test]
    fn missing_tables_is_distinct_from_empty_model() {
        let config = Config::default();

        let err = extract_graph(&schema(r#"{ "model": {} }"#), &config).unwrap_err();
        assert!(matches!(err, ExtractError::Schema(SchemaError::MissingTables)));
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::SchemaMissingTables);

        let empty = extract_graph(&schema(r#"{ "model": { "tables": [] } }"#), &config).unwrap();
        assert!(empty.graph.nodes().is_empty());
    }

    #[test]
    fn diagnostics_respect_severity_overrides() {
        let schema = schema(
            r#"{ "model": { "tables": [
                { "name": "Sales", "partitions": [
                    { "source": { "type": "m", "expression": ["let", "  junk", "in", "  1"] } }
                ] }
            ] } }"#,
        );

        let mut config = Config::default();
        let extraction = extract_graph(&schema, &config).unwrap();
        assert_eq!(extraction.diagnostics(&config)[0].severity, Severity::Warn);

        config.severity.set_override(DiagnosticCode::SegmentNoDelimiter, Severity::Error);
        let report = extraction.to_report(&config);
        assert!(report.has_errors());
        assert_eq!(report.summary.nodes, 1);
    }
}
