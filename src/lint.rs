//! The per-document lint cycle.
//!
//! parse → validate → resolve → findings. The validator's error
//! accumulator is shared by every document, so submitting, reading and
//! clearing happen under one lock; everything else runs outside it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, RwLock};

use log::{debug, warn};
use thiserror::Error;

use crate::config::{self, Settings};
use crate::range::{to_range, Finding, Severity};
use crate::resolve::{resolve, Resolution};
use crate::syntax::{parse, SyntaxNode};
use crate::validate::{SubmitMeta, ValidationError, Validator, ValidatorError};

#[derive(Debug, Error)]
pub enum LintError {
    #[error(transparent)]
    Validator(#[from] ValidatorError),
    #[error("validator panicked: {0}")]
    ValidatorPanicked(String),
}

pub struct Linter<V> {
    validator: Mutex<V>,
    exclude: RwLock<Vec<glob::Pattern>>,
}

impl<V: Validator> Linter<V> {
    pub fn new(validator: V) -> Self {
        Self {
            validator: Mutex::new(validator),
            exclude: RwLock::new(Vec::new()),
        }
    }

    /// Applies the settings that concern the lint cycle itself.
    pub fn configure(&self, settings: &Settings) {
        let patterns = settings.exclude_patterns();
        *self.exclude.write().unwrap_or_else(PoisonError::into_inner) = patterns;
    }

    /// Runs `f` on the validator while no cycle is in flight.
    pub fn with_validator<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        let mut validator = self.validator.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut validator)
    }

    pub fn is_excluded(&self, uri: &str) -> bool {
        let patterns = self.exclude.read().unwrap_or_else(PoisonError::into_inner);
        config::is_excluded(&patterns, uri)
    }

    /// Lints one document. Never fails: problems are logged and yield no findings.
    pub fn lint(&self, text: &str, uri: &str) -> Vec<Finding> {
        if self.is_excluded(uri) {
            debug!("{uri}: excluded from linting");
            return Vec::new();
        }

        match self.run_cycle(text, uri) {
            Ok(findings) => findings,
            Err(err) => {
                warn!("{uri}: lint cycle failed: {err}");
                Vec::new()
            }
        }
    }

    fn run_cycle(&self, text: &str, uri: &str) -> Result<Vec<Finding>, LintError> {
        let tree = match parse(text) {
            Ok(tree) => Some(tree),
            Err(err) => {
                debug!("{uri}: {err}; only hinted positions are available");
                None
            }
        };

        let errors = self.validate(text, uri)?;
        let lines: Vec<&str> = text.lines().collect();

        Ok(errors
            .iter()
            .filter_map(|error| locate(tree.as_ref(), error, &lines, uri))
            .collect())
    }

    /// Submits, drains and clears the validator as one critical section.
    fn validate(&self, text: &str, uri: &str) -> Result<Vec<ValidationError>, LintError> {
        let meta = SubmitMeta {
            file_id: uri.to_string(),
        };
        // The accumulator is cleared before the guard drops, so a poisoned
        // lock never hands stale errors to the next cycle.
        let mut validator = self.validator.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            validator.submit(text, &meta)?;
            Ok::<_, ValidatorError>(validator.read_errors())
        }));
        validator.clear_errors();

        match outcome {
            Ok(errors) => Ok(errors?),
            Err(payload) => Err(LintError::ValidatorPanicked(panic_message(payload.as_ref()))),
        }
    }
}

/// Turns one validation error into a finding, if anything can be located.
fn locate(
    tree: Option<&SyntaxNode>,
    error: &ValidationError,
    lines: &[&str],
    uri: &str,
) -> Option<Finding> {
    let path = error.full_path();
    let node = tree.and_then(|tree| match resolve(tree, &path, error.is_unknown_key()) {
        Resolution::Exact(node) => Some(node),
        Resolution::Partial { node, matched } => {
            debug!(
                "{uri}: matched {matched} of {} path segments for `{}`",
                path.len(),
                error.message
            );
            Some(node)
        }
        Resolution::Unresolved => None,
    });

    let Some(range) = to_range(node, &error.hints, lines) else {
        debug!("{uri}: dropping unlocatable error `{}`", error.message);
        return None;
    };

    Some(Finding {
        range,
        message: error.message.clone(),
        severity: Severity::from_label(error.severity.as_deref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
