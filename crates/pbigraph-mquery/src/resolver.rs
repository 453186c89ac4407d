//! Cross-node reference resolution
//!
//! Finds which catalog nodes each binding body of a node mentions and turns
//! them into dependency edges. For every body, in order:
//!
//! 1. `#"..."` quoted identifiers naming a catalog entry are references.
//! 2. Strings, quoted identifiers, comments and keywords are masked.
//!    `[...]` field access is masked too when `mask_field_access` is set.
//! 3. Names bound earlier in the same node are masked; a local step named
//!    like another node is a local use, not a dependency.
//! 4. Every other catalog entry occurring as a whole word is a reference.
//!
//! A binding's own name only shadows bodies that come after it.

use std::collections::HashSet;
use pbigraph_model::{Edge, NodeCatalog};
use tracing::debug;
use crate::lexer::{is_word_char, tokenize, Token, TokenKind};
use crate::segmenter::{segment, Segmentation};
use crate::warning::{ResolutionWarning, WarningKind};

/// Resolver settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Mask `[...]` spans before bare-word matching
    pub mask_field_access: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            mask_field_access: true,
        }
    }
}

/// Edges and warnings produced for one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Deduplicated edges `(referenced node, this node)` in discovery order
    pub edges: Vec<Edge>,

    pub warnings: Vec<ResolutionWarning>,
}

impl Resolution {
    /// Merge another resolution (e.g. a second partition) into this one
    pub fn merge(&mut self, other: Resolution) {
        for edge in other.edges {
            if !self.edges.contains(&edge) {
                self.edges.push(edge);
            }
        }
        self.warnings.extend(other.warnings);
    }
}

/// References found in a single body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyReferences<'c> {
    /// Referenced catalog identifiers, without duplicates
    pub nodes: Vec<&'c str>,

    /// Kind of the literal left open at the end of the body, if any
    pub unterminated: Option<TokenKind>,
}

/// Resolves references against a node catalog
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'c> {
    catalog: &'c NodeCatalog,
    options: ResolverOptions,
}

impl<'c> ReferenceResolver<'c> {
    pub fn new(catalog: &'c NodeCatalog) -> Self {
        Self {
            catalog,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Segment and resolve a node's source lines
    pub fn resolve_source<S: AsRef<str>>(&self, node_id: &str, lines: &[S]) -> Resolution {
        self.resolve(node_id, &segment(lines))
    }

    /// Resolve a segmented source into edges targeting `node_id`
    pub fn resolve(&self, node_id: &str, segmentation: &Segmentation) -> Resolution {
        let mut resolution = Resolution {
            edges: Vec::new(),
            warnings: segmentation
                .warnings
                .iter()
                .cloned()
                .map(|w| w.for_node(node_id))
                .collect(),
        };

        let mut shadowed: HashSet<&str> = HashSet::new();
        let bodies = segmentation
            .bindings
            .iter()
            .map(|b| (Some(b.name.as_str()), b.body.as_str(), b.line))
            .chain(
                segmentation
                    .result
                    .iter()
                    .map(|r| (None, r.body.as_str(), r.line)),
            );

        for (name, body, line) in bodies {
            let found = self.references_in(node_id, body, &shadowed);

            for source in &found.nodes {
                let edge = Edge::new(*source, node_id);
                if !resolution.edges.contains(&edge) {
                    debug!(source = %source, target = %node_id, line, "reference");
                    resolution.edges.push(edge);
                }
            }

            if let Some(kind) = found.unterminated {
                resolution.warnings.push(
                    ResolutionWarning::new(WarningKind::UnterminatedLiteral(kind), line, body)
                        .for_node(node_id),
                );
            }

            // Recorded only after the body: a binding cannot shadow itself
            if let Some(name) = name.filter(|n| self.catalog.contains(n)) {
                shadowed.insert(name);
            }
        }

        resolution
    }

    /// Catalog entries referenced by `body`, skipping shadowed names
    pub fn references_in(
        &self,
        node_id: &str,
        body: &str,
        shadowed: &HashSet<&str>,
    ) -> BodyReferences<'c> {
        let mut found = BodyReferences::default();
        let mut masked = String::with_capacity(body.len());

        for token in &tokenize(body) {
            if !token.terminated {
                found.unterminated = Some(token.kind);
            }
            self.mask_token(token, shadowed, &mut found, &mut masked);
        }

        for name in shadowed {
            masked = mask_word(&masked, name);
        }

        for node in self.catalog.iter() {
            if node.id != node_id && contains_word(&masked, &node.id) {
                found.push(&node.id);
            }
        }

        found
    }

    /// Append `token` to `masked`, recording quoted references on the way
    ///
    /// An unmasked `[...]` span is scanned token by token so the literals
    /// inside it stay masked.
    fn mask_token(
        &self,
        token: &Token<'_>,
        shadowed: &HashSet<&str>,
        found: &mut BodyReferences<'c>,
        masked: &mut String,
    ) {
        if let Some(name) = token.quoted_name() {
            if let Some(node) = self.catalog.get(&name) {
                if !shadowed.contains(name.as_ref()) {
                    found.push(&node.id);
                }
            }
        }

        if token.kind == TokenKind::FieldAccess && !self.options.mask_field_access {
            let inner = &token.text[1..];
            let inner = if token.terminated {
                &inner[..inner.len() - 1]
            } else {
                inner
            };

            masked.push('[');
            for inner_token in &tokenize(inner) {
                self.mask_token(inner_token, shadowed, found, masked);
            }
            if token.terminated {
                masked.push(']');
            }
        } else if self.is_masked(token.kind) {
            masked.push(' ');
        } else {
            masked.push_str(token.text);
        }
    }

    fn is_masked(&self, kind: TokenKind) -> bool {
        kind.is_literal()
            || kind == TokenKind::Keyword
            || (kind == TokenKind::FieldAccess && self.options.mask_field_access)
    }
}

impl<'c> BodyReferences<'c> {
    fn push(&mut self, node: &'c str) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }
}

/// Resolve `node_id`'s segmented source against `catalog` with default options
pub fn resolve(node_id: &str, segmentation: &Segmentation, catalog: &NodeCatalog) -> Resolution {
    ReferenceResolver::new(catalog).resolve(node_id, segmentation)
}

/// Byte offsets of whole-word occurrences of `word` in `text`
///
/// A dotted member chain such as `Date.From` is one name in M, so a `.`
/// joining two words is not a boundary.
fn word_matches<'a>(text: &'a str, word: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.match_indices(word)
        .map(|(start, _)| start)
        .filter(move |&start| {
            let mut before = text[..start].chars().rev();
            let mut after = text[start + word.len()..].chars();

            let joined_before = match before.next() {
                Some('.') => before.next().is_some_and(is_word_char),
                prev => prev.is_some_and(is_word_char),
            };
            let joined_after = match after.next() {
                Some('.') => after.next().is_some_and(is_word_char),
                next => next.is_some_and(is_word_char),
            };

            !joined_before && !joined_after
        })
        .filter(move |_| !word.is_empty())
}

/// Whether `word` occurs in `text` not adjacent to a word character
pub fn contains_word(text: &str, word: &str) -> bool {
    word_matches(text, word).next().is_some()
}

/// Replace whole-word occurrences of `word` with spaces
pub fn mask_word(text: &str, word: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut last = 0;

    for start in word_matches(text, word) {
        masked.push_str(&text[last..start]);
        masked.push(' ');
        last = start + word.len();
    }

    masked.push_str(&text[last..]);
    masked
}
