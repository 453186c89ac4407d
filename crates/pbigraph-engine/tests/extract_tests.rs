//! End-to-end extraction over the sample model

use pbigraph_core::{Config, DiagnosticCode, GraphPolicy, Severity};
use pbigraph_engine::{extract_graph, GraphExtractor};
use pbigraph_model::DataModelSchema;
use pretty_assertions::assert_eq;
use std::path::Path;

const SAMPLE_MODEL: &str = "../../fixtures/sample-model/DataModelSchema.json";

fn sample() -> DataModelSchema {
    DataModelSchema::from_file(Path::new(SAMPLE_MODEL)).unwrap()
}

fn sorted_edges(graph: &pbigraph_model::DependencyGraph) -> Vec<(String, String)> {
    let mut edges: Vec<(String, String)> = graph
        .edges()
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();
    edges.sort();
    edges
}

fn pair(source: &str, target: &str) -> (String, String) {
    (source.to_string(), target.to_string())
}

#[test]
fn sample_model_graph() {
    let extraction = extract_graph(&sample(), &Config::default()).unwrap();
    let graph = &extraction.graph;

    let ids: Vec<&str> = graph.node_ids().map(String::as_str).collect();
    assert_eq!(
        ids,
        vec![
            "Customers",
            "Products",
            "Sales",
            "Sales Summary",
            "LocalDateTable_9b2e61d0",
            "ServerName",
            "DataFolder",
            "Raw Products",
            "fnClean",
        ]
    );

    assert_eq!(
        sorted_edges(graph),
        vec![
            pair("Customers", "Sales"),
            pair("DataFolder", "Sales"),
            pair("Products", "Sales"),
            pair("Raw Products", "Products"),
            pair("Sales", "Sales Summary"),
            pair("ServerName", "Customers"),
            pair("ServerName", "Raw Products"),
        ]
    );

    assert!(extraction.warnings.is_empty());
    assert!(extraction.dangling.is_empty());
}

#[test]
fn date_table_template_is_excluded() {
    let extraction = extract_graph(&sample(), &Config::default()).unwrap();

    assert!(!extraction.graph.contains_node("DateTableTemplate_3f1c2a4e"));
    assert_eq!(extraction.filtered.len(), 1);
    assert_eq!(extraction.filtered[0].id, "DateTableTemplate_3f1c2a4e");

    // Only the template is removed, local date tables stay
    assert!(extraction.graph.contains_node("LocalDateTable_9b2e61d0"));
}

#[test]
fn shadowing_binding_does_not_create_reverse_edge() {
    let extraction = extract_graph(&sample(), &Config::default()).unwrap();

    // `Raw Products` binds a step called `Products` and returns it
    assert!(!extraction.graph.contains_edge("Products", "Raw Products"));
    assert!(extraction.graph.contains_edge("Raw Products", "Products"));
}

#[test]
fn impact_and_lineage_queries() {
    let extraction = extract_graph(&sample(), &Config::default()).unwrap();
    let graph = &extraction.graph;

    let mut downstream = graph.downstream("ServerName");
    downstream.sort();
    assert_eq!(
        downstream,
        vec!["Customers", "Products", "Raw Products", "Sales", "Sales Summary"]
    );

    let mut upstream = graph.upstream("Sales Summary");
    upstream.sort();
    assert_eq!(
        upstream,
        vec!["Customers", "DataFolder", "Products", "Raw Products", "Sales", "ServerName"]
    );

    let mut isolated: Vec<&str> = graph.isolated_nodes().into_iter().map(String::as_str).collect();
    isolated.sort();
    assert_eq!(isolated, vec!["LocalDateTable_9b2e61d0", "fnClean"]);
}

#[test]
fn topological_order_respects_edges() {
    let extraction = extract_graph(&sample(), &Config::default()).unwrap();
    let order = extraction.graph.topological_sort().unwrap();
    let position = |id: &str| order.iter().position(|n| n == id).unwrap();

    for edge in extraction.graph.edges() {
        assert!(position(&edge.source) < position(&edge.target), "{edge}");
    }
}

#[test]
fn field_access_masking_can_be_disabled() {
    let config = Config {
        mask_field_access: false,
        ..Config::default()
    };
    let unmasked = extract_graph(&sample(), &config).unwrap();
    let masked = extract_graph(&sample(), &Config::default()).unwrap();

    // `Source{[Schema="dbo",Item="Products"]}` contributes only its field names
    assert!(!unmasked.graph.contains_edge("Products", "Raw Products"));
    assert_eq!(sorted_edges(&unmasked.graph), sorted_edges(&masked.graph));
}

#[test]
fn utf16_export_matches_utf8() {
    let text = std::fs::read_to_string(SAMPLE_MODEL).unwrap();
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));

    let utf16 = DataModelSchema::from_bytes(&bytes).unwrap();
    let config = Config::default();

    let from_utf16 = extract_graph(&utf16, &config).unwrap();
    let from_utf8 = extract_graph(&sample(), &config).unwrap();
    assert_eq!(sorted_edges(&from_utf16.graph), sorted_edges(&from_utf8.graph));
}

#[test]
fn cyclic_model_still_extracts() {
    let schema = DataModelSchema::from_str(
        r#"{ "model": {
            "tables": [
                { "name": "A", "partitions": [ { "source": { "type": "m", "expression": "B" } } ] },
                { "name": "B", "partitions": [ { "source": { "type": "m", "expression": "A" } } ] }
            ]
        } }"#,
    )
    .unwrap();

    let extraction = extract_graph(&schema, &Config::default()).unwrap();
    assert_eq!(extraction.graph.edges().len(), 2);
    assert!(extraction.graph.topological_sort().is_none());
}

#[test]
fn self_reference_follows_graph_policy() {
    let schema = DataModelSchema::from_str(
        r##"{ "model": {
            "tables": [
                { "name": "Sales", "partitions": [
                    { "source": { "type": "m", "expression": "Table.Buffer(#\"Sales\")" } }
                ] }
            ]
        } }"##,
    )
    .unwrap();

    let extraction = extract_graph(&schema, &Config::default()).unwrap();
    assert!(extraction.graph.contains_edge("Sales", "Sales"));

    let config = Config {
        graph: GraphPolicy {
            allow_self_loops: false,
            ..GraphPolicy::default()
        },
        ..Config::default()
    };
    let extraction = GraphExtractor::new(&config).extract(&schema).unwrap();
    assert!(extraction.graph.edges().is_empty());
}

#[test]
fn report_summarizes_sample_model() {
    let config = Config::default();
    let extraction = extract_graph(&sample(), &config).unwrap();
    let report = extraction.to_report(&config);

    assert_eq!(report.summary.nodes, 9);
    assert_eq!(report.summary.edges, 7);
    assert_eq!(report.summary.isolated, 2);
    assert_eq!(report.summary.errors, 0);
    assert_eq!(report.summary.info, 1);
    assert_eq!(report.diagnostics[0].code, DiagnosticCode::GraphNodeFiltered);
    assert_eq!(report.diagnostics[0].severity, Severity::Info);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["nodes"][0]["id"], "Customers");
    assert_eq!(json["nodes"][0]["origin"], "table");
}
