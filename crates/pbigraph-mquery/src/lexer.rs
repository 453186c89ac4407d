//! Token classifier for Power Query M source.
//!
//! Splits text into span-based tokens so literal text can be told apart from
//! identifiers. Each token is produced by one lexer state:
//!
//! - `Bare`: identifiers, keywords, numbers, operators, whitespace
//! - `InString`: `"..."` with `""` as an escaped quote, and `'...'`
//! - `InQuotedIdentifier`: `#"..."`
//! - `InBracket`: `[...]` field access / record syntax, nesting allowed
//! - `InLineComment` / `InBlockComment`: `// ...` and `/* ... */`
//!
//! Unterminated literals run to the end of input and are flagged rather than
//! rejected, so callers can recover.

use std::borrow::Cow;
use std::ops::Range;

/// Reserved words of the M language; never references
pub const KEYWORDS: &[&str] = &[
    "and", "as", "each", "else", "error", "false", "if", "in", "is", "let", "meta", "not",
    "null", "or", "otherwise", "section", "shared", "then", "true", "try", "type",
];

/// Multi-character operators, longest first
const OPERATORS: &[&str] = &["...", "=>", "<=", ">=", "<>", "??", ".."];

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Bare word: letters, digits, underscore, not starting with a digit
    Identifier,
    /// Reserved word, or a `#`-prefixed intrinsic such as `#table`
    Keyword,
    /// `#"..."`
    QuotedIdentifier,
    /// `"..."` or `'...'`
    StringLiteral,
    /// `[...]`
    FieldAccess,
    /// `// ...` or `/* ... */`
    Comment,
    /// Numeric literal
    Number,
    Whitespace,
    /// Operators and delimiters
    Other,
}

impl TokenKind {
    /// Whether text of this kind is literal, never a bare reference
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            Self::QuotedIdentifier | Self::StringLiteral | Self::Comment
        )
    }

    /// Whether the token carries no meaning for segmentation
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::Comment)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Identifier => "identifier",
            Self::Keyword => "keyword",
            Self::QuotedIdentifier => "quoted identifier",
            Self::StringLiteral => "string literal",
            Self::FieldAccess => "field access",
            Self::Comment => "comment",
            Self::Number => "number",
            Self::Whitespace => "whitespace",
            Self::Other => "operator",
        };
        write!(f, "{}", name)
    }
}

/// A classified slice of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    pub span: Range<usize>,
    /// False when a literal, bracket or block comment ran off the end of input
    pub terminated: bool,
}

impl<'s> Token<'s> {
    /// The name inside a quoted identifier, with `""` unescaped
    pub fn quoted_name(&self) -> Option<Cow<'s, str>> {
        if self.kind != TokenKind::QuotedIdentifier {
            return None;
        }

        let inner = &self.text[2..];
        let inner = if self.terminated {
            &inner[..inner.len() - 1]
        } else {
            inner
        };

        Some(unescape_quotes(inner))
    }

    /// Whether this is the keyword `word`
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    /// Whether this is the operator or delimiter `symbol`
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Other && self.text == symbol
    }
}

/// Lexer state for the token being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Bare,
    InString(char),
    InQuotedIdentifier,
    InBracket,
    InLineComment,
    InBlockComment,
}

/// Tokenize M source text
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Lexer::new(source).collect()
}

/// Whether `c` can be part of a bare word
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Iterator over the tokens of a source string
pub struct Lexer<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self { source, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    /// Pick the state for the token starting at the current position
    fn enter(&self) -> State {
        let rest = self.rest();
        let mut chars = rest.chars();
        let first = chars.next().unwrap_or_default();
        let second = chars.next();

        match (first, second) {
            ('#', Some('"')) => State::InQuotedIdentifier,
            ('"', _) | ('\'', _) => State::InString(first),
            ('[', _) => State::InBracket,
            ('/', Some('/')) => State::InLineComment,
            ('/', Some('*')) => State::InBlockComment,
            _ => State::Bare,
        }
    }

    /// Scan one token in `state`, returning its kind, end offset and whether it closed
    fn scan_state(&self, state: State) -> (TokenKind, usize, bool) {
        let rest = self.rest();

        match state {
            State::InQuotedIdentifier => {
                let (len, closed) = scan_quoted(&rest[1..], '"');
                (TokenKind::QuotedIdentifier, 1 + len, closed)
            }
            State::InString(quote) => {
                let (len, closed) = scan_quoted(rest, quote);
                (TokenKind::StringLiteral, len, closed)
            }
            State::InBracket => {
                let (len, closed) = scan_bracket(rest);
                (TokenKind::FieldAccess, len, closed)
            }
            State::InLineComment => {
                let len = rest.find('\n').unwrap_or(rest.len());
                (TokenKind::Comment, len, true)
            }
            State::InBlockComment => match rest[2..].find("*/") {
                Some(end) => (TokenKind::Comment, 2 + end + 2, true),
                None => (TokenKind::Comment, rest.len(), false),
            },
            State::Bare => {
                let (kind, len) = scan_bare(rest);
                (kind, len, true)
            }
        }
    }
}

impl<'s> Iterator for Lexer<'s> {
    type Item = Token<'s>;

    fn next(&mut self) -> Option<Token<'s>> {
        if self.pos >= self.source.len() {
            return None;
        }

        let start = self.pos;
        let (kind, len, terminated) = self.scan_state(self.enter());
        self.pos = start + len;

        Some(Token {
            kind,
            text: &self.source[start..self.pos],
            span: start..self.pos,
            terminated,
        })
    }
}

/// Scan a literal opened by `quote` at the start of `text`
///
/// A doubled quote inside the literal is an escape, not the end.
fn scan_quoted(text: &str, quote: char) -> (usize, bool) {
    let mut chars = text.char_indices().skip(1).peekable();

    while let Some((i, c)) = chars.next() {
        if c != quote {
            continue;
        }

        if quote == '"' && matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            continue;
        }

        return (i + c.len_utf8(), true);
    }

    (text.len(), false)
}

/// Scan a `[...]` span, allowing nested brackets and strings inside
fn scan_bracket(text: &str) -> (usize, bool) {
    let mut depth = 0usize;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let c = rest.chars().next().unwrap_or_default();

        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return (i + 1, true);
                }
            }
            '"' => {
                let (len, closed) = scan_quoted(rest, '"');
                if !closed {
                    return (text.len(), false);
                }
                i += len;
                continue;
            }
            _ => {}
        }

        i += c.len_utf8();
    }

    (text.len(), false)
}

/// Scan a bare token: word, number, `#` intrinsic, whitespace or operator
fn scan_bare(text: &str) -> (TokenKind, usize) {
    let first = text.chars().next().unwrap_or_default();

    if first.is_whitespace() {
        let len = text.find(|c: char| !c.is_whitespace()).unwrap_or(text.len());
        return (TokenKind::Whitespace, len);
    }

    if first == '#' {
        let word = word_len(&text[1..]);
        if word > 0 {
            return (TokenKind::Keyword, 1 + word);
        }
        return (TokenKind::Other, 1);
    }

    if first.is_ascii_digit() {
        return (TokenKind::Number, scan_number(text));
    }

    if is_word_char(first) {
        let len = word_len(text);
        let kind = if KEYWORDS.contains(&&text[..len]) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        return (kind, len);
    }

    let len = OPERATORS
        .iter()
        .find(|op| text.starts_with(*op))
        .map(|op| op.len())
        .unwrap_or(first.len_utf8());

    (TokenKind::Other, len)
}

fn word_len(text: &str) -> usize {
    text.find(|c: char| !is_word_char(c)).unwrap_or(text.len())
}

/// Digits with an optional fraction and exponent (`1`, `2.5`, `1e-3`, `0x1F`)
fn scan_number(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = word_len(text);

    // Fraction: only when a digit follows the dot, so `1..5` stays a range
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1 + word_len(&text[i + 1..]);
    }

    // Exponent sign (`1e-3`): the word scan stopped at the sign
    if matches!(bytes.get(i), Some(b'+' | b'-'))
        && matches!(bytes.get(i.wrapping_sub(1)), Some(b'e' | b'E'))
        && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
    {
        i += 1 + word_len(&text[i + 1..]);
    }

    i
}

fn unescape_quotes(text: &str) -> Cow<'_, str> {
    if text.contains("\"\"") {
        Cow::Owned(text.replace("\"\"", "\""))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn classifies_binding_line() {
        assert_eq!(
            kinds(r#"Source = Sql.Database("srv", "db")"#),
            vec![
                (TokenKind::Identifier, "Source"),
                (TokenKind::Other, "="),
                (TokenKind::Identifier, "Sql"),
                (TokenKind::Other, "."),
                (TokenKind::Identifier, "Database"),
                (TokenKind::Other, "("),
                (TokenKind::StringLiteral, "\"srv\""),
                (TokenKind::Other, ","),
                (TokenKind::StringLiteral, "\"db\""),
                (TokenKind::Other, ")"),
            ]
        );
    }

    #[test]
    fn quoted_identifier_with_spaces() {
        let tokens = tokenize(r#"#"Customer Table""#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::QuotedIdentifier);
        assert_eq!(tokens[0].quoted_name().unwrap(), "Customer Table");
    }

    #[test]
    fn doubled_quotes_are_escapes() {
        let tokens = tokenize(r#""say ""Sales"" twice" & x"#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, r#""say ""Sales"" twice""#);
        assert!(tokens[0].terminated);

        let quoted = tokenize(r#"#"a ""b"" c""#);
        assert_eq!(quoted[0].quoted_name().unwrap(), r#"a "b" c"#);
    }

    #[test]
    fn single_quoted_spans_are_strings() {
        assert_eq!(
            kinds("'Sales' & Region"),
            vec![
                (TokenKind::StringLiteral, "'Sales'"),
                (TokenKind::Other, "&"),
                (TokenKind::Identifier, "Region"),
            ]
        );
    }

    #[test]
    fn keywords_and_intrinsics() {
        assert_eq!(
            kinds("each #table(type table [a = text], {})"),
            vec![
                (TokenKind::Keyword, "each"),
                (TokenKind::Keyword, "#table"),
                (TokenKind::Other, "("),
                (TokenKind::Keyword, "type"),
                (TokenKind::Identifier, "table"),
                (TokenKind::FieldAccess, "[a = text]"),
                (TokenKind::Other, ","),
                (TokenKind::Other, "{"),
                (TokenKind::Other, "}"),
                (TokenKind::Other, ")"),
            ]
        );
    }

    #[test]
    fn nested_brackets_and_strings_inside() {
        let tokens = kinds(r#"x[a[b]]{0}[#"c]"]"#);
        assert_eq!(tokens[1], (TokenKind::FieldAccess, "[a[b]]"));
        assert_eq!(tokens[5], (TokenKind::FieldAccess, r#"[#"c]"]"#));
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("A // Sales\n/* Region */ B"),
            vec![
                (TokenKind::Identifier, "A"),
                (TokenKind::Comment, "// Sales"),
                (TokenKind::Comment, "/* Region */"),
                (TokenKind::Identifier, "B"),
            ]
        );
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let tokens = tokenize(r#"Text.Upper("Sales) & Region"#);
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::StringLiteral);
        assert_eq!(last.text, r#""Sales) & Region"#);
        assert!(!last.terminated);
    }

    #[test]
    fn unterminated_quoted_identifier() {
        let tokens = tokenize(r#"#"Customer"#);
        assert!(!tokens[0].terminated);
        assert_eq!(tokens[0].quoted_name().unwrap(), "Customer");
    }

    #[test]
    fn operators_and_numbers() {
        assert_eq!(
            kinds("(x) => x <> 1.5e-3 and y=-2"),
            vec![
                (TokenKind::Other, "("),
                (TokenKind::Identifier, "x"),
                (TokenKind::Other, ")"),
                (TokenKind::Other, "=>"),
                (TokenKind::Identifier, "x"),
                (TokenKind::Other, "<>"),
                (TokenKind::Number, "1.5e-3"),
                (TokenKind::Keyword, "and"),
                (TokenKind::Identifier, "y"),
                (TokenKind::Other, "="),
                (TokenKind::Other, "-"),
                (TokenKind::Number, "2"),
            ]
        );
    }

    #[test]
    fn spans_cover_the_source() {
        let source = "let\n  Src = #\"Sales Data\", // ok\n  Out = Src[Amount]\nin Out é";
        let tokens = tokenize(source);
        let rebuilt: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(rebuilt, source);
        for pair in tokens.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(kinds("Ventes_été"), vec![(TokenKind::Identifier, "Ventes_été")]);
    }
}
