//! Lints s-expression configuration documents and locates each validation
//! error in the source text.
//!
//! Validators report problems as paths (`[defcfg :delay]`) into the data a
//! document denotes. This crate re-parses the text into a
//! position-preserving [`SyntaxNode`] tree, follows the path through it,
//! and turns the node it lands on into a 0-based [`TextRange`] an editor can
//! underline. [`Linter::lint`] ties those steps to a [`Validator`] for one
//! document at a time.

pub mod config;
pub mod lint;
pub mod range;
pub mod resolve;
pub mod schema;
pub mod syntax;
pub mod validate;

pub use config::{ConfigError, Settings};
pub use lint::{LintError, Linter};
pub use range::{Finding, Hints, Severity, TextRange};
pub use resolve::{resolve, PathSegment, Resolution};
pub use schema::{DocumentSchema, Schema, SchemaValidator};
pub use syntax::{parse, NodeKind, ParseError, SyntaxNode, TextPos};
pub use validate::{SubmitMeta, ValidationError, Validator, ValidatorError};
