//! Editor-provided settings.
//!
//! Settings arrive as JSON through `initializationOptions` or
//! `workspace/didChangeConfiguration`, either bare or nested under a
//! `sexprLint` key.

use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::schema::DocumentSchema;

/// Key under which settings may be namespaced in client configuration.
pub const SETTINGS_SECTION: &str = "sexprLint";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings: {0}")]
    Invalid(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Glob patterns for documents that are never linted, matched against
    /// the document URI and, for `file://` URIs, its path.
    pub exclude: Vec<String>,
    pub schema: DocumentSchema,
}

impl Settings {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        let value = match value {
            serde_json::Value::Object(mut map) if map.contains_key(SETTINGS_SECTION) => map
                .remove(SETTINGS_SECTION)
                .unwrap_or(serde_json::Value::Null),
            other => other,
        };
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Compiles `exclude`, skipping patterns that do not parse.
    pub fn exclude_patterns(&self) -> Vec<glob::Pattern> {
        self.exclude
            .iter()
            .filter_map(|pattern| match glob::Pattern::new(pattern) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    warn!("ignoring exclude pattern `{pattern}`: {err}");
                    None
                }
            })
            .collect()
    }
}

/// Whether `uri` matches any of `patterns`.
pub fn is_excluded(patterns: &[glob::Pattern], uri: &str) -> bool {
    let path = uri.strip_prefix("file://");
    patterns.iter().any(|pattern| {
        pattern.matches(uri) || path.is_some_and(|path| pattern.matches(path))
    })
}
