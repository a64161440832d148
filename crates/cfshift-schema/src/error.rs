use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Dotted location of a node inside a manifest application, e.g.
/// `applications[0].processes[1].routes[0]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_owned())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{i}]", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Failure to bring one application into canonical form.
///
/// Every variant names the offending field path. Normalization is
/// all-or-nothing: an error means no `Application` was produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{path}: {value} does not match any known {expected} shape")]
    Shape {
        path: FieldPath,
        expected: &'static str,
        value: String,
    },
    #[error("{path}: duplicate route {url} port {port}, already declared at {first}")]
    DuplicateRoute {
        path: FieldPath,
        first: FieldPath,
        url: String,
        port: u16,
    },
    #[error("{path}: duplicate service '{name}', already declared at {first}")]
    DuplicateService {
        path: FieldPath,
        first: FieldPath,
        name: String,
    },
    #[error("{path}: duplicate sidecar '{name}', already declared at {first}")]
    DuplicateSidecar {
        path: FieldPath,
        first: FieldPath,
        name: String,
    },
    #[error("{path}: tcp route {value} has no port")]
    MissingPort { path: FieldPath, value: String },
    #[error("{path}: required field '{field}' is missing or empty in {value}")]
    MissingRequiredField {
        path: FieldPath,
        field: &'static str,
        value: String,
    },
}

impl NormalizeError {
    pub(crate) fn shape(path: &FieldPath, expected: &'static str, value: &Value) -> Self {
        Self::Shape {
            path: path.clone(),
            expected,
            value: value.to_string(),
        }
    }

    pub(crate) fn missing(path: &FieldPath, field: &'static str, value: &Value) -> Self {
        Self::MissingRequiredField {
            path: path.clone(),
            field,
            value: value.to_string(),
        }
    }

    /// Path of the node that triggered the error.
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::Shape { path, .. }
            | Self::DuplicateRoute { path, .. }
            | Self::DuplicateService { path, .. }
            | Self::DuplicateSidecar { path, .. }
            | Self::MissingPort { path, .. }
            | Self::MissingRequiredField { path, .. } => path,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Shape { .. } => "shape",
            Self::DuplicateRoute { .. } => "duplicate_route",
            Self::DuplicateService { .. } => "duplicate_service",
            Self::DuplicateSidecar { .. } => "duplicate_sidecar",
            Self::MissingPort { .. } => "missing_port",
            Self::MissingRequiredField { .. } => "missing_required_field",
        }
    }
}
