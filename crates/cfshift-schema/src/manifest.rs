use crate::application::Application;
use crate::error::{FieldPath, NormalizeError};
use crate::normalize::{normalize_application_at, NormalizeOptions};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const SUPPORTED_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse manifest: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("unsupported manifest version: {0}, expected 1")]
    UnsupportedVersion(String),
    #[error("manifest error: {0}")]
    Malformed(String),
    #[error("manifest error: application {index}: {source}")]
    Normalize {
        index: usize,
        #[source]
        source: NormalizeError,
    },
}

/// A loaded manifest: the untyped application nodes, not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub version: Option<u64>,
    pub applications: Vec<Value>,
}

impl ManifestDocument {
    /// Accepts `{version?, applications: [...]}`, a single application
    /// mapping, or a bare sequence of applications (the canonical output of
    /// a previous run).
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        match value {
            Value::Array(applications) => Ok(Self {
                version: None,
                applications,
            }),
            Value::Object(mut map) => {
                let version = match map.remove("version") {
                    None | Some(Value::Null) => None,
                    Some(v) => match v.as_u64() {
                        Some(SUPPORTED_VERSION) => Some(SUPPORTED_VERSION),
                        _ => return Err(ManifestError::UnsupportedVersion(v.to_string())),
                    },
                };
                match map.remove("applications") {
                    Some(Value::Array(applications)) => Ok(Self {
                        version,
                        applications,
                    }),
                    Some(other) => Err(ManifestError::Malformed(format!(
                        "'applications' must be a sequence, got {other}"
                    ))),
                    None if map.contains_key("name") || map.contains_key("metadata") => {
                        Ok(Self {
                            version,
                            applications: vec![Value::Object(map)],
                        })
                    }
                    None => Err(ManifestError::Malformed(
                        "no 'applications' sequence and no application name".to_owned(),
                    )),
                }
            }
            other => Err(ManifestError::Malformed(format!(
                "expected a mapping or sequence at top level, got {other}"
            ))),
        }
    }

    /// Path under which errors for application `index` are reported.
    pub fn application_path(index: usize) -> FieldPath {
        FieldPath::root().field("applications").index(index)
    }

    /// Normalize one application of the document.
    pub fn normalize_one(
        &self,
        index: usize,
        options: &NormalizeOptions,
    ) -> Option<Result<Application, NormalizeError>> {
        self.applications
            .get(index)
            .map(|node| normalize_application_at(node, &Self::application_path(index), options))
    }

    /// Normalize every application independently; one failure does not
    /// affect the others.
    pub fn normalize_each(
        &self,
        options: &NormalizeOptions,
    ) -> Vec<Result<Application, NormalizeError>> {
        (0..self.applications.len())
            .filter_map(|i| self.normalize_one(i, options))
            .collect()
    }

    /// Normalize every application, failing on the first error.
    pub fn normalize_all(
        &self,
        options: &NormalizeOptions,
    ) -> Result<Vec<Application>, ManifestError> {
        self.normalize_each(options)
            .into_iter()
            .enumerate()
            .map(|(index, r)| r.map_err(|source| ManifestError::Normalize { index, source }))
            .collect()
    }

    /// Raw `name` of application `index`, if it has a readable one.
    pub fn application_name(&self, index: usize) -> Option<&str> {
        let node = self.applications.get(index)?;
        node.get("name")
            .or_else(|| node.get("metadata").and_then(|m| m.get("name")))
            .and_then(Value::as_str)
    }
}

/// Parse manifest text. YAML is a superset of JSON, so both are accepted.
/// Merge keys (`<<: *defaults`) are resolved before shapes are looked at.
pub fn parse_manifest_str(input: &str) -> Result<ManifestDocument, ManifestError> {
    let mut yaml: serde_yaml::Value = serde_yaml::from_str(input)?;
    yaml.apply_merge()?;
    let value: Value = serde_yaml::from_value(yaml)?;
    ManifestDocument::from_value(value)
}

pub fn parse_manifest_json(input: &str) -> Result<ManifestDocument, ManifestError> {
    let value: Value = serde_json::from_str(input)?;
    ManifestDocument::from_value(value)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestDocument, ManifestError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    debug!(
        "parsing {} as {}",
        path.display(),
        if is_json { "json" } else { "yaml" }
    );
    if is_json {
        parse_manifest_json(&content)
    } else {
        parse_manifest_str(&content)
    }
}
