//! The interface to whatever produces path-tagged validation errors.

use thiserror::Error;

use crate::range::Hints;
use crate::resolve::PathSegment;

/// Message fragments that mark an error about a key the schema does not know.
const UNKNOWN_KEY_MARKERS: [&str; 3] = ["unknown key", "unrecognized key", "disallowed key"];

/// An error reported by a validator, located by path rather than by position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub message: String,
    /// Keys and indices from the resource (or document) root to the offending value.
    pub path: Vec<PathSegment>,
    /// Section or namespace the error belongs to; prepended to `path`.
    pub resource: Option<String>,
    /// Free-form label such as `error`, `warning` or `info`.
    pub severity: Option<String>,
    pub hints: Hints,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn at_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn in_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    /// The path from the document root, resource first.
    pub fn full_path(&self) -> Vec<PathSegment> {
        self.resource
            .iter()
            .map(|resource| PathSegment::Key(resource.clone()))
            .chain(self.path.iter().cloned())
            .collect()
    }

    /// Whether the error names a key that has no schema entry. Such errors
    /// are located at the parent container.
    pub fn is_unknown_key(&self) -> bool {
        let message = self.message.to_ascii_lowercase();
        UNKNOWN_KEY_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

/// What the lint cycle tells the validator about a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitMeta {
    /// Logical identity of the document, usually its URI.
    pub file_id: String,
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator rejected {file_id}: {reason}")]
    Rejected { file_id: String, reason: String },
    #[error("validator failed: {0}")]
    Internal(String),
}

/// A validator that accumulates errors across `submit` calls until cleared.
///
/// The accumulator is shared by every document, so callers must treat
/// `submit`, `read_errors` and `clear_errors` as one unit.
pub trait Validator: Send {
    fn submit(&mut self, text: &str, meta: &SubmitMeta) -> Result<(), ValidatorError>;

    fn read_errors(&self) -> Vec<ValidationError>;

    fn clear_errors(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_is_prepended_to_path() {
        let error = ValidationError::new("expected string, found number")
            .at_path(vec![PathSegment::key(":name"), PathSegment::Index(2)])
            .in_resource("defcfg");
        assert_eq!(
            error.full_path(),
            vec![
                PathSegment::key("defcfg"),
                PathSegment::key(":name"),
                PathSegment::Index(2),
            ]
        );
    }

    #[test]
    fn test_path_without_resource_is_unchanged() {
        let error = ValidationError::new("boom").at_path(vec![PathSegment::Index(0)]);
        assert_eq!(error.full_path(), vec![PathSegment::Index(0)]);
    }

    #[test]
    fn test_unknown_key_detection() {
        assert!(ValidationError::new("unknown key :foo").is_unknown_key());
        assert!(ValidationError::new("Unrecognized key in map").is_unknown_key());
        assert!(ValidationError::new("disallowed key :bar").is_unknown_key());
        assert!(!ValidationError::new("unknown section `foo`").is_unknown_key());
        assert!(!ValidationError::new("expected string, found keyword").is_unknown_key());
    }
}
