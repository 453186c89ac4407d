//! Power Query M reference analysis
//!
//! This crate handles:
//! - Tokenizing M source into classified spans (identifiers vs. literals)
//! - Segmenting `let ... in` blocks into ordered local bindings
//! - Resolving which catalog nodes each binding references

pub mod lexer;
pub mod segmenter;
pub mod resolver;
pub mod warning;

pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use segmenter::{segment, segment_text, Binding, ResultExpression, Segmentation};
pub use resolver::{resolve, BodyReferences, ReferenceResolver, Resolution, ResolverOptions};
pub use warning::{ResolutionWarning, WarningKind};
