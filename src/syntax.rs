//! Position-preserving syntax tree for s-expression documents.
//!
//! Tokenization is done by a `logos` lexer; the tree builder is a small
//! stack machine on top of it. Every node keeps its byte span and its
//! 1-based line/column, so later stages can pick whichever they need.

use std::fmt;

use logos::Logos;
use thiserror::Error;

use crate::resolve::PathSegment;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f,]+")]
#[logos(skip r";[^\n]*")]
enum Token {
    #[token("(")]
    ListOpen,
    #[token(")")]
    ListClose,
    #[token("[")]
    VectorOpen,
    #[token("]")]
    VectorClose,
    #[token("{")]
    MapOpen,
    #[token("#{")]
    SetOpen,
    #[token("}")]
    BraceClose,
    #[token("#_")]
    Discard,
    #[regex(r#""([^"\\]|\\.)*""#)]
    String,
    #[regex(r"\\(newline|space|tab|return|formfeed|backspace|u[0-9a-fA-F]{4}|[^\s])")]
    Char,
    #[regex(r#":[^\s,()\[\]{}";]+"#)]
    Keyword,
    #[regex(r#"[^\s,()\[\]{}";:#\\][^\s,()\[\]{}";]*"#)]
    Atom,
}

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    List,
    Vector,
    Map,
    Set,
    Keyword,
    Symbol,
    String,
    Number,
    Char,
}

impl NodeKind {
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            NodeKind::Document | NodeKind::List | NodeKind::Vector | NodeKind::Map | NodeKind::Set
        )
    }

    fn closing_delimiter(self) -> Option<char> {
        match self {
            NodeKind::List => Some(')'),
            NodeKind::Vector => Some(']'),
            NodeKind::Map | NodeKind::Set => Some('}'),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Document => "document",
            NodeKind::List => "list",
            NodeKind::Vector => "vector",
            NodeKind::Map => "map",
            NodeKind::Set => "set",
            NodeKind::Keyword => "keyword",
            NodeKind::Symbol => "symbol",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Char => "character",
        };
        f.write_str(name)
    }
}

/// Byte offsets `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A 1-based line/column position. Columns count Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TextPos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for TextPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// How a child is addressed inside its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Position inside a document, list, vector or set.
    Index(usize),
    /// Source text of a map key form, e.g. `:name`, `"name"` or `[1 2]`.
    Form(String),
}

impl Key {
    fn matches(&self, name: &str) -> bool {
        match self {
            Key::Index(_) => false,
            Key::Form(text) => key_text_matches(text, name),
        }
    }
}

/// `name` addresses a key written as `name`, `:name` or `"name"`.
fn key_text_matches(text: &str, name: &str) -> bool {
    text == name
        || text.strip_prefix(':') == Some(name)
        || text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .is_some_and(|t| t == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Span,
    pub start: TextPos,
    /// Position one past the last character of the node.
    pub end: TextPos,
    pub children: Vec<(Key, SyntaxNode)>,
    /// Named aliases for children: sections at document level, keyword
    /// options inside lists. Values index into `children`.
    labels: Vec<(String, usize)>,
}

impl SyntaxNode {
    fn leaf(kind: NodeKind, span: Span, index: &LineIndex<'_>) -> Self {
        Self {
            kind,
            span,
            start: index.position(span.start),
            end: index.position(span.end),
            children: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Source text covered by this node.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source
            .get(self.span.start..self.span.end)
            .unwrap_or_default()
    }

    pub fn is_collection(&self) -> bool {
        self.kind.is_collection()
    }

    /// Child nodes in source order, without their keys.
    pub fn nodes(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().map(|(_, node)| node)
    }

    /// The head symbol of a list, e.g. `defcfg` for `(defcfg ...)`.
    pub fn head_symbol<'a>(&self, source: &'a str) -> Option<&'a str> {
        if self.kind != NodeKind::List {
            return None;
        }
        self.nodes()
            .next()
            .filter(|head| head.kind == NodeKind::Symbol)
            .map(|head| head.text(source))
    }

    /// Looks up one path segment. Keyed children win over labels and the
    /// first occurrence wins among duplicates.
    pub fn child(&self, segment: &PathSegment) -> Option<&SyntaxNode> {
        match segment {
            PathSegment::Index(index) => self
                .children
                .iter()
                .find(|(key, _)| *key == Key::Index(*index))
                .map(|(_, node)| node),
            PathSegment::Key(name) => self
                .children
                .iter()
                .find(|(key, _)| key.matches(name))
                .map(|(_, node)| node)
                .or_else(|| {
                    self.labels
                        .iter()
                        .find(|(label, _)| key_text_matches(label, name))
                        .and_then(|(_, i)| self.children.get(*i))
                        .map(|(_, node)| node)
                }),
        }
    }
}

/// Reasons the text cannot be turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized input `{text}` at {position}")]
    InvalidToken { text: String, position: TextPos },
    #[error("unexpected `{found}` at {position}")]
    UnexpectedClose { found: String, position: TextPos },
    #[error("expected `{expected}` but found `{found}` at {position}")]
    MismatchedClose {
        expected: char,
        found: String,
        position: TextPos,
    },
}

impl ParseError {
    pub fn position(&self) -> TextPos {
        match self {
            ParseError::InvalidToken { position, .. }
            | ParseError::UnexpectedClose { position, .. }
            | ParseError::MismatchedClose { position, .. } => *position,
        }
    }
}

/// Maps byte offsets to 1-based line/column positions.
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    fn position(&self, offset: usize) -> TextPos {
        let line = self
            .starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.starts.get(line).copied().unwrap_or(0);
        let col = self
            .text
            .get(line_start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        TextPos {
            line: line as u32 + 1,
            col: col as u32 + 1,
        }
    }
}

/// A collection being filled while its closing delimiter is pending.
struct Frame {
    kind: NodeKind,
    open: usize,
    items: Vec<SyntaxNode>,
    /// Number of upcoming forms swallowed by `#_`.
    discard: usize,
}

impl Frame {
    fn new(kind: NodeKind, open: usize) -> Self {
        Self {
            kind,
            open,
            items: Vec::new(),
            discard: 0,
        }
    }

    fn push(&mut self, node: SyntaxNode) {
        if self.discard > 0 {
            self.discard -= 1;
        } else {
            self.items.push(node);
        }
    }

    fn finish(self, source: &str, index: &LineIndex<'_>, end: usize) -> SyntaxNode {
        let span = Span {
            start: self.open,
            end,
        };
        let labels = match self.kind {
            NodeKind::Document => section_labels(&self.items, source),
            NodeKind::List => option_labels(&self.items, source),
            _ => Vec::new(),
        };
        let children = if self.kind == NodeKind::Map {
            let mut entries = Vec::with_capacity(self.items.len() / 2);
            let mut items = self.items.into_iter();
            // A trailing key without a value has nothing to point at.
            while let (Some(key), Some(value)) = (items.next(), items.next()) {
                entries.push((Key::Form(key.text(source).to_string()), value));
            }
            entries
        } else {
            self.items
                .into_iter()
                .enumerate()
                .map(|(i, node)| (Key::Index(i), node))
                .collect()
        };

        SyntaxNode {
            kind: self.kind,
            span,
            start: index.position(span.start),
            end: index.position(span.end),
            children,
            labels,
        }
    }
}

fn section_labels(items: &[SyntaxNode], source: &str) -> Vec<(String, usize)> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.head_symbol(source).map(|name| (name.to_string(), i)))
        .collect()
}

fn option_labels(items: &[SyntaxNode], source: &str) -> Vec<(String, usize)> {
    let mut labels = Vec::new();
    let mut i = 1;
    while i + 1 < items.len() {
        if items[i].kind == NodeKind::Keyword {
            labels.push((items[i].text(source).to_string(), i + 1));
            i += 2;
        } else {
            i += 1;
        }
    }
    labels
}

fn atom_kind(text: &str) -> NodeKind {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
        NodeKind::Number
    } else {
        NodeKind::Symbol
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(20).collect()
}

struct TreeBuilder<'a> {
    source: &'a str,
    index: LineIndex<'a>,
    document: Frame,
    open: Vec<Frame>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            index: LineIndex::new(source),
            document: Frame::new(NodeKind::Document, 0),
            open: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Frame {
        self.open.last_mut().unwrap_or(&mut self.document)
    }

    fn close(&mut self, found: &str, span: std::ops::Range<usize>) -> Result<(), ParseError> {
        let position = self.index.position(span.start);
        let Some(frame) = self.open.pop() else {
            return Err(ParseError::UnexpectedClose {
                found: found.to_string(),
                position,
            });
        };
        match frame.kind.closing_delimiter() {
            Some(expected) if found.starts_with(expected) => {
                let node = frame.finish(self.source, &self.index, span.end);
                self.current().push(node);
                Ok(())
            }
            expected => Err(ParseError::MismatchedClose {
                expected: expected.unwrap_or(')'),
                found: found.to_string(),
                position,
            }),
        }
    }

    fn finish(mut self) -> SyntaxNode {
        let end = self.source.len();
        // Forms still open at end of input are closed where the text ends.
        while let Some(frame) = self.open.pop() {
            let node = frame.finish(self.source, &self.index, end);
            self.current().push(node);
        }
        self.document.finish(self.source, &self.index, end)
    }
}

/// Parses `text` into a tree rooted at a [`NodeKind::Document`] node.
pub fn parse(text: &str) -> Result<SyntaxNode, ParseError> {
    let mut builder = TreeBuilder::new(text);
    let mut lexer = Token::lexer(text);

    while let Some(token) = lexer.next() {
        let span = lexer.span();
        let Ok(token) = token else {
            return Err(ParseError::InvalidToken {
                text: snippet(lexer.slice()),
                position: builder.index.position(span.start),
            });
        };

        let leaf = match token {
            Token::ListOpen => {
                builder.open.push(Frame::new(NodeKind::List, span.start));
                continue;
            }
            Token::VectorOpen => {
                builder.open.push(Frame::new(NodeKind::Vector, span.start));
                continue;
            }
            Token::MapOpen => {
                builder.open.push(Frame::new(NodeKind::Map, span.start));
                continue;
            }
            Token::SetOpen => {
                builder.open.push(Frame::new(NodeKind::Set, span.start));
                continue;
            }
            Token::ListClose | Token::VectorClose | Token::BraceClose => {
                builder.close(lexer.slice(), span)?;
                continue;
            }
            Token::Discard => {
                builder.current().discard += 1;
                continue;
            }
            Token::String => NodeKind::String,
            Token::Char => NodeKind::Char,
            Token::Keyword => NodeKind::Keyword,
            Token::Atom => atom_kind(lexer.slice()),
        };

        let node = SyntaxNode::leaf(
            leaf,
            Span {
                start: span.start,
                end: span.end,
            },
            &builder.index,
        );
        builder.current().push(node);
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    fn pos(line: u32, col: u32) -> TextPos {
        TextPos { line, col }
    }

    #[test]
    fn test_document_spans_whole_text() {
        let text = "(a 1)\n{:b 2}\n";
        let tree = parse(text).unwrap();
        assert_eq!(tree.kind, NodeKind::Document);
        assert_eq!(tree.span, Span { start: 0, end: text.len() });
        assert_eq!(tree.start, pos(1, 1));
        assert_eq!(tree.end, pos(3, 1));
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn test_positions_are_one_based_and_end_exclusive() {
        let text = "(foo\n  {:bar 1})";
        let tree = parse(text).unwrap();
        let list = tree.child(&PathSegment::Index(0)).unwrap();
        assert_eq!(list.kind, NodeKind::List);
        assert_eq!((list.start, list.end), (pos(1, 1), pos(2, 12)));

        let map = list.child(&PathSegment::Index(1)).unwrap();
        assert_eq!(map.kind, NodeKind::Map);
        assert_eq!((map.start, map.end), (pos(2, 3), pos(2, 11)));

        let value = map.child(&key(":bar")).unwrap();
        assert_eq!(value.kind, NodeKind::Number);
        assert_eq!((value.start, value.end), (pos(2, 9), pos(2, 10)));
        assert_eq!(value.text(text), "1");
    }

    #[test]
    fn test_columns_count_characters_not_bytes() {
        let text = "{:näme \"wört\" :x 1}";
        let tree = parse(text).unwrap();
        let map = tree.child(&PathSegment::Index(0)).unwrap();
        let x = map.child(&key("x")).unwrap();
        assert_eq!(x.start, pos(1, 18));
    }

    #[test]
    fn test_map_keys_match_with_or_without_colon() {
        let tree = parse(r#"{:a 1 "b" 2 c 3 [1 2] 4}"#).unwrap();
        let map = tree.child(&PathSegment::Index(0)).unwrap();
        assert!(map.child(&key(":a")).is_some());
        assert!(map.child(&key("a")).is_some());
        assert!(map.child(&key("b")).is_some());
        assert!(map.child(&key("c")).is_some());
        assert!(map.child(&key("[1 2]")).is_some());
        assert!(map.child(&key("d")).is_none());
        assert!(map.child(&PathSegment::Index(0)).is_none());
    }

    #[test]
    fn test_duplicate_keys_resolve_to_first_occurrence() {
        let tree = parse("{:a 1 :a 2}").unwrap();
        let map = tree.child(&PathSegment::Index(0)).unwrap();
        assert_eq!(map.children.len(), 2);
        assert_eq!(map.child(&key(":a")).unwrap().start, pos(1, 5));
    }

    #[test]
    fn test_trailing_map_key_without_value_is_dropped() {
        let tree = parse("{:a 1 :b}").unwrap();
        let map = tree.child(&PathSegment::Index(0)).unwrap();
        assert_eq!(map.children.len(), 1);
        assert!(map.child(&key(":b")).is_none());
    }

    #[test]
    fn test_sections_are_addressable_by_head_symbol() {
        let text = "(defsrc a b)\n(defcfg :mode fast)\n(defcfg :mode slow)";
        let tree = parse(text).unwrap();
        let section = tree.child(&key("defcfg")).unwrap();
        assert_eq!(section.start, pos(2, 1));
        assert_eq!(section.head_symbol(text), Some("defcfg"));
    }

    #[test]
    fn test_list_options_are_addressable_by_keyword() {
        let text = "(schema {:a string?} :unknown-field 1 :other)";
        let tree = parse(text).unwrap();
        let form = tree.child(&PathSegment::Index(0)).unwrap();
        let value = form.child(&key(":unknown-field")).unwrap();
        assert_eq!(value.text(text), "1");
        // A keyword with nothing after it is not an option.
        assert!(form.child(&key(":other")).is_none());
        assert_eq!(form.child(&PathSegment::Index(4)).unwrap().text(text), ":other");
    }

    #[test]
    fn test_discard_skips_next_form() {
        let text = "[1 #_ (ignored form) 2 #_ #_ 3 4 5]";
        let tree = parse(text).unwrap();
        let vector = tree.child(&PathSegment::Index(0)).unwrap();
        let values: Vec<&str> = vector.nodes().map(|n| n.text(text)).collect();
        assert_eq!(values, ["1", "2", "5"]);
    }

    #[test]
    fn test_comments_and_commas_are_skipped() {
        let text = "; leading comment\n{:a 1, :b 2} ; trailing";
        let tree = parse(text).unwrap();
        let map = tree.child(&PathSegment::Index(0)).unwrap();
        assert_eq!(map.children.len(), 2);
        assert_eq!(map.start, pos(2, 1));
    }

    #[test]
    fn test_scalar_kinds() {
        let text = r#"(sym :kw "str" 42 -1.5 +7 \a \newline nil)"#;
        let tree = parse(text).unwrap();
        let list = tree.child(&PathSegment::Index(0)).unwrap();
        let kinds: Vec<NodeKind> = list.nodes().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            [
                NodeKind::Symbol,
                NodeKind::Keyword,
                NodeKind::String,
                NodeKind::Number,
                NodeKind::Number,
                NodeKind::Number,
                NodeKind::Char,
                NodeKind::Char,
                NodeKind::Symbol,
            ]
        );
    }

    #[test]
    fn test_unclosed_forms_close_at_end_of_text() {
        let text = "(defcfg :a [1 2";
        let tree = parse(text).unwrap();
        let list = tree.child(&PathSegment::Index(0)).unwrap();
        assert_eq!(list.span.end, text.len());
        let vector = list.child(&key(":a")).unwrap();
        assert_eq!(vector.kind, NodeKind::Vector);
        assert_eq!(vector.children.len(), 2);
    }

    #[test]
    fn test_unexpected_close_is_an_error() {
        let err = parse("(a))").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedClose { .. }));
        assert_eq!(err.position(), pos(1, 4));
    }

    #[test]
    fn test_mismatched_close_is_an_error() {
        let err = parse("(a\n  [b)").unwrap_err();
        assert_eq!(
            err,
            ParseError::MismatchedClose {
                expected: ']',
                found: ")".to_string(),
                position: pos(2, 5),
            }
        );
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let err = parse("(a \"never closed)").unwrap_err();
        assert!(matches!(err, ParseError::InvalidToken { .. }));
        assert_eq!(err.position().line, 1);
    }

    #[test]
    fn test_empty_text_is_an_empty_document() {
        let tree = parse("").unwrap();
        assert!(tree.children.is_empty());
        assert_eq!((tree.start, tree.end), (pos(1, 1), pos(1, 1)));
    }
}
