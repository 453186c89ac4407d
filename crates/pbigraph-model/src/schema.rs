//! DataModelSchema parsing
//!
//! Parses the JSON document Power BI embeds in a template (`DataModelSchema`)
//! to extract tables, their partitions, and standalone expressions.

use pbigraph_core::{Diagnostic, DiagnosticCode, Severity};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level DataModelSchema document (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModelSchema {
    /// Model name (usually a GUID)
    #[serde(default)]
    pub name: Option<String>,

    /// Tabular compatibility level
    #[serde(rename = "compatibilityLevel", default)]
    pub compatibility_level: Option<u32>,

    /// The data model itself
    pub model: ModelDefinition,
}

impl DataModelSchema {
    /// Load a schema from file
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let bytes = std::fs::read(path)
            .map_err(|e| SchemaError::Io(path.display().to_string(), e.to_string()))?;

        Self::from_bytes(&bytes)
    }

    /// Parse a schema from raw bytes
    ///
    /// Power BI writes the document as UTF-16LE; UTF-16 with a BOM and
    /// plain UTF-8 are accepted as well.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let text = decode_text(bytes)?;
        Self::from_str(&text)
    }

    /// Parse a schema from a JSON string
    pub fn from_str(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json.trim_start_matches('\u{feff}'))
            .map_err(|e| SchemaError::Parse(e.to_string()))
    }

    /// Table definitions
    ///
    /// A model without a `tables` collection is malformed; an empty one is fine.
    pub fn tables(&self) -> Result<&[TableDefinition], SchemaError> {
        self.model
            .tables
            .as_deref()
            .ok_or(SchemaError::MissingTables)
    }

    /// Standalone expressions (empty when the model has none)
    pub fn expressions(&self) -> &[ExpressionDefinition] {
        self.model.expressions.as_deref().unwrap_or_default()
    }

    /// All Power Query sources in the model, tables first, in declaration order
    ///
    /// Non-M sources (calculated tables, entity partitions, ...) are skipped.
    pub fn m_sources(&self) -> Result<Vec<NodeSource<'_>>, SchemaError> {
        let mut sources = Vec::new();

        for table in self.tables()? {
            for partition in &table.partitions {
                if !partition.source.is_m() {
                    debug!(
                        table = %table.name,
                        kind = %partition.source.source_type,
                        "skipping non-M partition"
                    );
                    continue;
                }

                let Some(expression) = &partition.source.expression else {
                    debug!(table = %table.name, "M partition has no expression");
                    continue;
                };

                sources.push(NodeSource {
                    node: &table.name,
                    origin: NodeOrigin::Table,
                    partition: partition.name.as_deref(),
                    lines: expression.lines(),
                });
            }
        }

        for expression in self.expressions() {
            if !expression.is_m() {
                debug!(expression = %expression.name, kind = %expression.kind, "skipping non-M expression");
                continue;
            }

            sources.push(NodeSource {
                node: &expression.name,
                origin: NodeOrigin::Expression,
                partition: None,
                lines: expression.expression.lines(),
            });
        }

        Ok(sources)
    }
}

/// The `model` object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Tables; absent only in malformed documents
    #[serde(default)]
    pub tables: Option<Vec<TableDefinition>>,

    /// Model-level shared expressions (queries and parameters)
    #[serde(default)]
    pub expressions: Option<Vec<ExpressionDefinition>>,
}

/// A table in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name (the node identifier)
    pub name: String,

    /// Data partitions
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

/// A table partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Partition name (usually the table name plus a GUID suffix)
    #[serde(default)]
    pub name: Option<String>,

    /// Where the partition's data comes from
    pub source: PartitionSource,
}

/// Partition source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSource {
    /// Source type ("m", "calculated", ...)
    #[serde(rename = "type")]
    pub source_type: String,

    /// Source text
    #[serde(default)]
    pub expression: Option<SourceText>,
}

impl PartitionSource {
    /// Whether the source is Power Query M
    pub fn is_m(&self) -> bool {
        self.source_type.eq_ignore_ascii_case("m")
    }
}

/// A standalone model expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionDefinition {
    /// Expression name (the node identifier)
    pub name: String,

    /// Expression language
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Source text
    pub expression: SourceText,
}

impl ExpressionDefinition {
    /// Whether the expression is Power Query M
    pub fn is_m(&self) -> bool {
        self.kind.eq_ignore_ascii_case("m")
    }
}

fn default_kind() -> String {
    "m".to_string()
}

/// Source text, stored either as one string or as an array of lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceText {
    Lines(Vec<String>),
    Text(String),
}

impl SourceText {
    /// Physical source lines, with embedded newlines split out
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::Lines(lines) => lines
                .iter()
                .flat_map(|line| match line.as_str() {
                    "" => vec![""],
                    line => line.lines().collect(),
                })
                .collect(),
            Self::Text(text) => text.lines().collect(),
        }
    }
}

/// Node origin: which schema collection declared it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOrigin {
    Table,
    Expression,
}

impl std::fmt::Display for NodeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Expression => write!(f, "expression"),
        }
    }
}

/// One M source to resolve, borrowed from the schema
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSource<'a> {
    /// Node that owns the source
    pub node: &'a str,

    /// Collection the node came from
    pub origin: NodeOrigin,

    /// Partition name, for table sources
    pub partition: Option<&'a str>,

    /// Source lines in order
    pub lines: Vec<&'a str>,
}

/// Decode schema bytes into text
fn decode_text(bytes: &[u8]) -> Result<String, SchemaError> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => utf8(rest),
        // No BOM: a NUL high byte in the first code unit means UTF-16LE
        [_, 0x00, ..] if bytes.len() % 2 == 0 => decode_utf16(bytes, u16::from_le_bytes),
        _ => utf8(bytes),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, SchemaError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| SchemaError::Encoding(e.to_string()))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, SchemaError> {
    if bytes.len() % 2 != 0 {
        return Err(SchemaError::Encoding("odd number of bytes in UTF-16 input".to_string()));
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| SchemaError::Encoding(e.to_string()))
}

/// Schema loading and shape errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Data model has no tables collection")]
    MissingTables,

    #[error("Failed to read schema file {0}: {1}")]
    Io(String, String),

    #[error("Failed to decode schema text: {0}")]
    Encoding(String),

    #[error("Failed to parse schema JSON: {0}")]
    Parse(String),
}

impl SchemaError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::MissingTables => DiagnosticCode::SchemaMissingTables,
            Self::Io(..) | Self::Encoding(_) | Self::Parse(_) => DiagnosticCode::SchemaParseError,
        }
    }

    /// Error diagnostic for a report that could not be built
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.code(), Severity::Error, self.to_string())
    }
}
