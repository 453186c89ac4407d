//! Diagnostic codes and warning reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they end up in report.json.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Schema shape (1xxx)
    /// The model has no `tables` collection
    SchemaMissingTables,

    /// The schema document could not be decoded or parsed
    SchemaParseError,

    // Segmentation and resolution (2xxx)
    /// A non-keyword line had no top-level `=`
    SegmentNoDelimiter,

    /// A string or quoted identifier was never closed
    SegmentUnterminatedLiteral,

    // Graph assembly (3xxx)
    /// An edge pointed at an identifier outside the catalog
    GraphDanglingEdge,

    /// A node was removed from the catalog by a filter rule
    GraphNodeFiltered,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaMissingTables => "SCHEMA_MISSING_TABLES",
            Self::SchemaParseError => "SCHEMA_PARSE_ERROR",
            Self::SegmentNoDelimiter => "SEGMENT_NO_DELIMITER",
            Self::SegmentUnterminatedLiteral => "SEGMENT_UNTERMINATED_LITERAL",
            Self::GraphDanglingEdge => "GRAPH_DANGLING_EDGE",
            Self::GraphNodeFiltered => "GRAPH_NODE_FILTERED",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - the graph is still produced, possibly incomplete
    Warn,

    /// Error - extraction could not complete
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Position inside a node's formula source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Node (table or expression) the source belongs to
    pub node: String,

    /// Optional line number (1-indexed, within the node's source)
    pub line: Option<usize>,
}

impl Location {
    /// Create a location pointing at a whole node
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            line: None,
        }
    }

    /// Create a location with node and line number
    pub fn with_line(node: impl Into<String>, line: usize) -> Self {
        Self {
            node: node.into(),
            line: Some(line),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.node, line),
            None => write!(f, "{}", self.node),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Offending source text, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            snippet: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach the source text that triggered the diagnostic
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::SchemaMissingTables.as_str(), "SCHEMA_MISSING_TABLES");
        assert_eq!(DiagnosticCode::SegmentNoDelimiter.as_str(), "SEGMENT_NO_DELIMITER");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::SegmentUnterminatedLiteral,
            Severity::Warn,
            "String literal is never closed",
        )
        .with_location(Location::with_line("Sales", 3));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("SEGMENT_UNTERMINATED_LITERAL"));
        assert!(json.contains("warn"));
        assert!(!json.contains("snippet"));
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::new("Sales").to_string(), "Sales");
        assert_eq!(Location::with_line("Sales", 4).to_string(), "Sales:4");
    }
}
