//! Walks a syntax tree along a validator path to find the node to blame.

use std::fmt;

use crate::syntax::{NodeKind, SyntaxNode};

/// One step of a validator path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A map key, option keyword or section name. `"a"` matches `a`, `:a` and `"a"`.
    Key(String),
    /// A position inside a sequence.
    Index(usize),
}

impl PathSegment {
    pub fn key(name: impl Into<String>) -> Self {
        PathSegment::Key(name.into())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Key(name.to_string())
    }
}

/// Outcome of following a path through the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Every segment matched.
    Exact(&'a SyntaxNode),
    /// The walk stopped early; `node` is the deepest match after `matched` segments.
    Partial { node: &'a SyntaxNode, matched: usize },
    /// The first segment matched nothing.
    Unresolved,
}

impl<'a> Resolution<'a> {
    pub fn node(&self) -> Option<&'a SyntaxNode> {
        match *self {
            Resolution::Exact(node) | Resolution::Partial { node, .. } => Some(node),
            Resolution::Unresolved => None,
        }
    }
}

/// Resolves `path` against `tree`.
///
/// With `unknown_key` set the last segment names a key that does not exist
/// in the schema, so the walk targets its parent container instead.
pub fn resolve<'a>(tree: &'a SyntaxNode, path: &[PathSegment], unknown_key: bool) -> Resolution<'a> {
    let target = if unknown_key {
        &path[..path.len().saturating_sub(1)]
    } else {
        path
    };

    // An empty target names the top level, which for a single-form
    // document is that form rather than the surrounding trivia.
    let Some((first, rest)) = target.split_first() else {
        return Resolution::Exact(sole_form(tree).unwrap_or(tree));
    };

    let Some(mut node) = tree
        .child(first)
        .or_else(|| sole_form(tree).and_then(|form| form.child(first)))
    else {
        return Resolution::Unresolved;
    };

    for (i, segment) in rest.iter().enumerate() {
        match node.child(segment) {
            Some(child) => node = child,
            None => {
                return Resolution::Partial {
                    node,
                    matched: i + 1,
                }
            }
        }
    }

    Resolution::Exact(node)
}

/// A document holding exactly one collection is addressed through it.
fn sole_form(tree: &SyntaxNode) -> Option<&SyntaxNode> {
    if tree.kind != NodeKind::Document || tree.children.len() != 1 {
        return None;
    }
    tree.nodes().next().filter(|form| form.is_collection())
}
