//! pbigraph engine
//!
//! Runs the full extraction for a data model:
//! - Node catalog construction and filtering
//! - Reference resolution for every Power Query source
//! - Graph assembly and report generation

pub mod extract;

pub use extract::{extract_graph, ExtractError, Extraction, GraphExtractor};
