//! Recoverable problems found while segmenting or resolving a source

use pbigraph_core::{Diagnostic, DiagnosticCode, Location, Severity};
use crate::lexer::TokenKind;

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A non-keyword line had no top-level `=`; the line was skipped
    NoBindingDelimiter,

    /// A literal of this kind was never closed; masked to end of body
    UnterminatedLiteral(TokenKind),
}

/// A recovered segmentation or resolution problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub kind: WarningKind,

    /// Node the source belongs to, once known
    pub node: Option<String>,

    /// 1-indexed line within the node's source
    pub line: usize,

    /// The offending text
    pub text: String,
}

impl ResolutionWarning {
    pub fn new(kind: WarningKind, line: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            node: None,
            line,
            text: text.into(),
        }
    }

    /// Attach the owning node
    pub fn for_node(mut self, node: &str) -> Self {
        self.node = Some(node.to_string());
        self
    }

    pub fn code(&self) -> DiagnosticCode {
        match self.kind {
            WarningKind::NoBindingDelimiter => DiagnosticCode::SegmentNoDelimiter,
            WarningKind::UnterminatedLiteral(_) => DiagnosticCode::SegmentUnterminatedLiteral,
        }
    }

    /// Convert to a report diagnostic
    pub fn to_diagnostic(&self, severity: Severity) -> Diagnostic {
        let node = self.node.as_deref().unwrap_or("<unknown>");

        Diagnostic::new(self.code(), severity, self.to_string())
            .with_location(Location::with_line(node, self.line))
            .with_snippet(self.text.clone())
    }
}

impl std::fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            WarningKind::NoBindingDelimiter => {
                write!(f, "line {} is not a `name = expression` binding", self.line)
            }
            WarningKind::UnterminatedLiteral(kind) => {
                write!(f, "unterminated {} starting on line {}", kind, self.line)
            }
        }
    }
}
