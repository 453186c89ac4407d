//! Statement segmentation
//!
//! Splits a node's M source (`let ... in ...`) into its local bindings in
//! declaration order, plus the result expression after `in`.
//!
//! Segmentation is line based: each line holds one `name = body` binding,
//! split at its first top-level `=`. A binding whose body is visibly
//! incomplete (open brackets, a trailing operator, an unclosed nested `let`)
//! absorbs the following lines.

use crate::lexer::{tokenize, Token, TokenKind, KEYWORDS};
use crate::warning::{ResolutionWarning, WarningKind};

/// A local `name = body` definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Bound name; `#"..."` names are stored unquoted
    pub name: String,

    /// Text after the first top-level `=`, trimmed
    pub body: String,

    /// 1-indexed line the binding starts on
    pub line: usize,
}

/// The expression after `in`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultExpression {
    pub body: String,
    pub line: usize,
}

/// Output of [`segment`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    /// Bindings in declaration order
    pub bindings: Vec<Binding>,

    /// Result expression; the whole source when there is no `let` block
    pub result: Option<ResultExpression>,

    pub warnings: Vec<ResolutionWarning>,
}

impl Segmentation {
    /// Whether the source held nothing to resolve
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.result.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing significant seen yet
    Preamble,
    /// Inside `let`
    Bindings,
    /// After `in`
    Result,
}

/// Segment source lines into bindings
pub fn segment<S: AsRef<str>>(lines: &[S]) -> Segmentation {
    let mut segmenter = Segmenter::default();

    for (index, line) in lines.iter().enumerate() {
        segmenter.push_line(index + 1, line.as_ref().trim());
    }

    segmenter.finish()
}

/// Segment a source held as one string
pub fn segment_text(source: &str) -> Segmentation {
    segment(&source.lines().collect::<Vec<_>>())
}

#[derive(Debug)]
struct Segmenter {
    phase: Phase,
    current: Option<Binding>,
    /// A `/*` on a skipped line is still open
    in_block_comment: bool,
    out: Segmentation,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            phase: Phase::Preamble,
            current: None,
            in_block_comment: false,
            out: Segmentation::default(),
        }
    }
}

impl Segmenter {
    fn push_line(&mut self, line_no: usize, line: &str) {
        let Some(line) = self.after_open_comment(line) else {
            return;
        };

        if is_blank(line) {
            self.in_block_comment = opens_block_comment(line);
            return;
        }

        if self.phase == Phase::Result {
            self.extend_result(line_no, line);
            return;
        }

        if let Some(binding) = self.current.as_mut() {
            if continues(&binding.body) {
                if !binding.body.is_empty() {
                    binding.body.push('\n');
                }
                binding.body.push_str(line);
                self.split_inline_result(line_no);
                return;
            }
        }
        self.flush();

        let mut line = line;
        match leading_keyword(line) {
            Some(("let", rest)) => {
                self.phase = Phase::Bindings;
                if is_blank(rest) {
                    self.in_block_comment = opens_block_comment(rest);
                    return;
                }
                line = rest;
            }
            Some(("in", rest)) if self.phase == Phase::Bindings => {
                self.phase = Phase::Result;
                if !rest.is_empty() {
                    self.extend_result(line_no, rest);
                }
                return;
            }
            _ if self.phase == Phase::Preamble => {
                // No `let` block: the source is a single expression
                self.phase = Phase::Result;
                self.extend_result(line_no, line);
                return;
            }
            _ => {}
        }

        match split_binding(line) {
            Some((name, body)) => {
                self.current = Some(Binding {
                    name: normalize_name(name),
                    body: body.to_string(),
                    line: line_no,
                });
                self.split_inline_result(line_no);
            }
            None => {
                self.in_block_comment = opens_block_comment(line);
                self.out
                    .warnings
                    .push(ResolutionWarning::new(WarningKind::NoBindingDelimiter, line_no, line));
            }
        }
    }

    /// The part of `line` after a block comment left open on a skipped line
    ///
    /// `None` while the whole line is still inside the comment.
    fn after_open_comment<'l>(&mut self, line: &'l str) -> Option<&'l str> {
        if !self.in_block_comment {
            return Some(line);
        }

        let end = line.find("*/")?;
        self.in_block_comment = false;
        Some(line[end + 2..].trim())
    }

    /// Handle `Name = body in result` written on one line
    fn split_inline_result(&mut self, line_no: usize) {
        let Some(binding) = self.current.as_mut() else {
            return;
        };
        let Some(at) = block_end(&binding.body) else {
            return;
        };

        let result = binding.body[at.end..].trim().to_string();
        binding.body.truncate(at.start);
        binding.body = binding.body.trim_end().to_string();

        self.flush();
        self.phase = Phase::Result;
        if !result.is_empty() {
            self.extend_result(line_no, &result);
        }
    }

    fn extend_result(&mut self, line_no: usize, text: &str) {
        match self.out.result.as_mut() {
            Some(result) => {
                result.body.push('\n');
                result.body.push_str(text);
            }
            None => {
                self.out.result = Some(ResultExpression {
                    body: text.to_string(),
                    line: line_no,
                });
            }
        }
    }

    fn flush(&mut self) {
        if let Some(binding) = self.current.take() {
            self.out.bindings.push(binding);
        }
    }

    fn finish(mut self) -> Segmentation {
        self.flush();
        self.out
    }
}

/// Empty or comment-only
fn is_blank(line: &str) -> bool {
    tokenize(line).iter().all(|t| t.kind.is_trivia())
}

/// Whether `text` ends inside an unclosed `/* ...`
fn opens_block_comment(text: &str) -> bool {
    tokenize(text)
        .last()
        .is_some_and(|t| t.kind == TokenKind::Comment && !t.terminated)
}

fn significant(text: &str) -> Vec<Token<'_>> {
    tokenize(text)
        .into_iter()
        .filter(|t| !t.kind.is_trivia())
        .collect()
}

/// `let`/`in` at the start of a line, with the remaining text
fn leading_keyword(line: &str) -> Option<(&'static str, &str)> {
    let first = significant(line).into_iter().next()?;

    ["let", "in"]
        .into_iter()
        .find(|keyword| first.is_keyword(keyword))
        .map(|keyword| (keyword, line[first.span.end..].trim()))
}

/// Split at the first `=` outside strings, brackets, parentheses and braces
fn split_binding(line: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;

    for token in tokenize(line) {
        if token.kind != TokenKind::Other {
            continue;
        }

        match token.text {
            "(" | "{" => depth += 1,
            ")" | "}" => depth -= 1,
            "=" if depth <= 0 => {
                return Some((line[..token.span.start].trim(), line[token.span.end..].trim()));
            }
            _ => {}
        }
    }

    None
}

/// `#"Changed Type"` -> `Changed Type`; bare names are kept as written
fn normalize_name(name: &str) -> String {
    let tokens = significant(name);

    match tokens.as_slice() {
        [only] if only.kind == TokenKind::QuotedIdentifier => {
            only.quoted_name().map(|n| n.into_owned()).unwrap_or_default()
        }
        _ => name.to_string(),
    }
}

/// Whether a binding body is unfinished and should absorb the next line
fn continues(body: &str) -> bool {
    if tokenize(body).iter().any(|t| !t.terminated) {
        return true;
    }

    let tokens = significant(body);
    let Some(last) = tokens.last() else {
        return true;
    };

    let mut depth = 0i32;
    let mut lets = 0i32;
    for token in &tokens {
        match token.kind {
            TokenKind::Other if matches!(token.text, "(" | "{") => depth += 1,
            TokenKind::Other if matches!(token.text, ")" | "}") => depth -= 1,
            TokenKind::Keyword if token.text == "let" => lets += 1,
            TokenKind::Keyword if token.text == "in" => lets -= 1,
            _ => {}
        }
    }
    if depth > 0 || lets > 0 {
        return true;
    }

    match last.kind {
        TokenKind::Other => !matches!(last.text, ")" | "}" | "," | ";" | "..." | "?"),
        TokenKind::Keyword => {
            KEYWORDS.contains(&last.text) && !matches!(last.text, "true" | "false" | "null")
        }
        _ => false,
    }
}

/// Byte range of the `in` that closes the enclosing block, if the body has one
fn block_end(body: &str) -> Option<std::ops::Range<usize>> {
    let mut depth = 0i32;
    let mut lets = 0i32;

    for token in tokenize(body) {
        match token.kind {
            TokenKind::Other if matches!(token.text, "(" | "{") => depth += 1,
            TokenKind::Other if matches!(token.text, ")" | "}") => depth -= 1,
            TokenKind::Keyword if token.text == "let" => lets += 1,
            TokenKind::Keyword if token.text == "in" => {
                if depth <= 0 && lets == 0 {
                    return Some(token.span);
                }
                lets -= 1;
            }
            _ => {}
        }
    }

    None
}
