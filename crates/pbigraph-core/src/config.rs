//! Configuration schema (pbigraph.toml)

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::diagnostic::{DiagnosticCode, Severity};

/// Prefix Power BI gives the auto-generated calendar table
pub const DEFAULT_DATE_TABLE_PREFIX: &str = "DateTableTemplate";

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Simple vs multi graph policy applied by the graph assembler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPolicy {
    /// Collapse repeated (source, target) pairs into one edge
    #[serde(default = "default_true")]
    pub dedup_edges: bool,

    /// Keep edges whose source and target are the same node
    #[serde(default = "default_true")]
    pub allow_self_loops: bool,
}

impl Default for GraphPolicy {
    fn default() -> Self {
        Self {
            dedup_edges: true,
            allow_self_loops: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_date_table_prefix() -> String {
    DEFAULT_DATE_TABLE_PREFIX.to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier prefix of the auto-generated calendar table to drop
    #[serde(default = "default_date_table_prefix")]
    pub date_table_prefix: String,

    /// Mask `[...]` field access before matching bare identifiers
    #[serde(default = "default_true")]
    pub mask_field_access: bool,

    /// Nodes to leave out of the graph entirely (glob patterns)
    #[serde(default)]
    pub skip_nodes: Vec<String>,

    /// Strip `:` from node ids in the written report
    #[serde(default)]
    pub sanitize_ids: bool,

    /// Graph assembly policy
    #[serde(default)]
    pub graph: GraphPolicy,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            date_table_prefix: default_date_table_prefix(),
            mask_field_access: true,
            skip_nodes: Vec::new(),
            sanitize_ids: false,
            graph: GraphPolicy::default(),
            severity: SeverityThreshold::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    ///
    /// `skip_nodes` patterns are checked here so a bad glob fails at load time.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.skip_matcher()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Compile the `skip_nodes` glob patterns
    pub fn skip_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();

        for pattern in &self.skip_nodes {
            let glob = Glob::new(pattern)
                .map_err(|e| ConfigError::InvalidPattern(pattern.clone(), e.to_string()))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| ConfigError::InvalidPattern(self.skip_nodes.join(", "), e.to_string()))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid skip_nodes pattern '{0}': {1}")]
    InvalidPattern(String, String),
}
