//! A schema-driven validator for section-style documents.
//!
//! A document is a sequence of sections, top-level lists headed by a symbol
//! such as `(defcfg :mode fast)`. Each section named in the
//! [`DocumentSchema`] is checked against its [`Schema`], and every problem
//! is recorded as a [`ValidationError`] whose resource is the section name
//! and whose path is relative to the section form.
//!
//! Schemas are plain serde data so they can come straight from editor
//! settings:
//!
//! ```json
//! { "sections": { "defcfg": { "type": "form", "closed": true,
//!     "options": { ":mode": { "type": "one-of", "values": ["fast", "slow"] } } } },
//!   "closed": true }
//! ```

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde::Deserialize;

use crate::range::Hints;
use crate::resolve::PathSegment;
use crate::syntax::{parse, Key, NodeKind, SyntaxNode};
use crate::validate::{SubmitMeta, ValidationError, Validator, ValidatorError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Schema {
    Any,
    String,
    Keyword,
    Symbol,
    Integer,
    Number,
    Boolean,
    /// The node's source text must be one of `values`.
    OneOf { values: Vec<String> },
    Vector { items: Box<Schema> },
    /// Keys are written as they appear in source, e.g. `":port"`.
    Map {
        #[serde(default)]
        keys: BTreeMap<String, Schema>,
        #[serde(default)]
        required: Vec<String>,
        #[serde(default)]
        closed: bool,
    },
    /// A list: head, then `args` positionally, then keyword/value `options`.
    Form {
        #[serde(default)]
        args: Vec<Schema>,
        #[serde(default)]
        options: BTreeMap<String, Schema>,
        #[serde(default)]
        closed: bool,
    },
}

impl Schema {
    pub fn describe(&self) -> String {
        match self {
            Schema::Any => "any value".to_string(),
            Schema::String => "string".to_string(),
            Schema::Keyword => "keyword".to_string(),
            Schema::Symbol => "symbol".to_string(),
            Schema::Integer => "integer".to_string(),
            Schema::Number => "number".to_string(),
            Schema::Boolean => "boolean".to_string(),
            Schema::OneOf { values } => format!("one of {}", values.join(", ")),
            Schema::Vector { .. } => "vector".to_string(),
            Schema::Map { .. } => "map".to_string(),
            Schema::Form { .. } => "form".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSchema {
    /// Section name to the schema of the whole section form.
    pub sections: BTreeMap<String, Schema>,
    /// Report sections that have no schema.
    pub closed: bool,
}

/// Validates documents against a [`DocumentSchema`], accumulating errors
/// until [`Validator::clear_errors`] is called.
#[derive(Debug, Default)]
pub struct SchemaValidator {
    schema: DocumentSchema,
    errors: Vec<ValidationError>,
}

impl SchemaValidator {
    pub fn new(schema: DocumentSchema) -> Self {
        Self {
            schema,
            errors: Vec::new(),
        }
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn set_schema(&mut self, schema: DocumentSchema) {
        self.schema = schema;
    }
}

impl Validator for SchemaValidator {
    fn submit(&mut self, text: &str, meta: &SubmitMeta) -> Result<(), ValidatorError> {
        let tree = match parse(text) {
            Ok(tree) => tree,
            Err(err) => {
                let position = err.position();
                self.errors.push(
                    ValidationError::new(format!("syntax error: {err}"))
                        .with_severity("error")
                        .with_hints(Hints::at(position.line, position.col)),
                );
                return Ok(());
            }
        };

        let before = self.errors.len();
        for form in tree.nodes() {
            let Some(name) = form.head_symbol(text) else {
                continue;
            };
            match self.schema.sections.get(name) {
                Some(schema) => {
                    let mut checker = Checker {
                        source: text,
                        resource: name,
                        errors: &mut self.errors,
                    };
                    checker.check(form, schema, &mut Vec::new());
                }
                None if self.schema.closed => {
                    self.errors.push(
                        ValidationError::new(format!("unknown section `{name}`"))
                            .with_severity("warning")
                            .with_hints(Hints::spanning(
                                form.start.line,
                                form.start.col,
                                form.end.line,
                                form.end.col,
                            )),
                    );
                }
                None => {}
            }
        }

        debug!(
            "{}: {} schema errors",
            meta.file_id,
            self.errors.len() - before
        );
        Ok(())
    }

    fn read_errors(&self) -> Vec<ValidationError> {
        self.errors.clone()
    }

    fn clear_errors(&mut self) {
        self.errors.clear();
    }
}

struct Checker<'a> {
    source: &'a str,
    resource: &'a str,
    errors: &'a mut Vec<ValidationError>,
}

impl Checker<'_> {
    fn report(&mut self, path: &[PathSegment], severity: &str, message: String) {
        self.errors.push(
            ValidationError::new(message)
                .at_path(path.to_vec())
                .in_resource(self.resource)
                .with_severity(severity),
        );
    }

    fn mismatch(&mut self, node: &SyntaxNode, schema: &Schema, path: &[PathSegment]) {
        let message = format!("expected {}, found {}", schema.describe(), node.kind);
        self.report(path, "error", message);
    }

    fn check(&mut self, node: &SyntaxNode, schema: &Schema, path: &mut Vec<PathSegment>) {
        let text = node.text(self.source);
        let valid = match schema {
            Schema::Any => true,
            Schema::String => node.kind == NodeKind::String,
            Schema::Keyword => node.kind == NodeKind::Keyword,
            Schema::Symbol => node.kind == NodeKind::Symbol,
            Schema::Number => node.kind == NodeKind::Number,
            Schema::Integer => node.kind == NodeKind::Number && text.parse::<i64>().is_ok(),
            Schema::Boolean => node.kind == NodeKind::Symbol && matches!(text, "true" | "false"),
            Schema::OneOf { values } => {
                if !values.iter().any(|value| value == text) {
                    let message = format!("expected {}, found `{text}`", schema.describe());
                    self.report(path, "error", message);
                }
                true
            }
            Schema::Vector { items } => {
                if node.kind == NodeKind::Vector {
                    for (i, item) in node.nodes().enumerate() {
                        path.push(PathSegment::Index(i));
                        self.check(item, items, path);
                        path.pop();
                    }
                }
                node.kind == NodeKind::Vector
            }
            Schema::Map {
                keys,
                required,
                closed,
            } => {
                if node.kind == NodeKind::Map {
                    self.check_map(node, keys, required, *closed, path);
                }
                node.kind == NodeKind::Map
            }
            Schema::Form {
                args,
                options,
                closed,
            } => {
                if node.kind == NodeKind::List {
                    self.check_form(node, args, options, *closed, path);
                }
                node.kind == NodeKind::List
            }
        };

        if !valid {
            self.mismatch(node, schema, path);
        }
    }

    fn check_map(
        &mut self,
        node: &SyntaxNode,
        keys: &BTreeMap<String, Schema>,
        required: &[String],
        closed: bool,
        path: &mut Vec<PathSegment>,
    ) {
        let mut seen = HashSet::new();
        for (key, value) in &node.children {
            let Key::Form(name) = key else {
                continue;
            };
            path.push(PathSegment::Key(name.clone()));
            if !seen.insert(name.as_str()) {
                self.report(path, "warning", format!("duplicate key {name}"));
            } else if let Some(schema) = keys.get(name) {
                self.check(value, schema, path);
            } else if closed {
                self.report(path, "warning", format!("unknown key {name}"));
            }
            path.pop();
        }

        for key in required {
            if !seen.contains(key.as_str()) {
                self.report(path, "error", format!("missing required key {key}"));
            }
        }
    }

    fn check_form(
        &mut self,
        node: &SyntaxNode,
        args: &[Schema],
        options: &BTreeMap<String, Schema>,
        closed: bool,
        path: &mut Vec<PathSegment>,
    ) {
        let elements: Vec<&SyntaxNode> = node.nodes().collect();
        let supplied = elements.len().saturating_sub(1);

        if supplied < args.len() {
            let message = format!("expected {} arguments, found {supplied}", args.len());
            self.report(path, "error", message);
        }
        for (i, schema) in args.iter().enumerate().take(supplied) {
            path.push(PathSegment::Index(i + 1));
            self.check(elements[i + 1], schema, path);
            path.pop();
        }

        let mut index = args.len() + 1;
        while let Some(element) = elements.get(index) {
            if element.kind != NodeKind::Keyword {
                path.push(PathSegment::Index(index));
                let message = format!("unexpected argument `{}`", element.text(self.source));
                self.report(path, "error", message);
                path.pop();
                index += 1;
                continue;
            }

            let name = element.text(self.source);
            let Some(value) = elements.get(index + 1) else {
                path.push(PathSegment::Index(index));
                self.report(path, "error", format!("missing value for {name}"));
                path.pop();
                break;
            };

            path.push(PathSegment::Key(name.to_string()));
            match options.get(name) {
                Some(schema) => self.check(value, schema, path),
                None if closed => self.report(path, "warning", format!("unknown key {name}")),
                None => {}
            }
            path.pop();
            index += 2;
        }
    }
}
