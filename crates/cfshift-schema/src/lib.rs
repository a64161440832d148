//! Cloud Foundry manifest normalization for cfshift.
//!
//! This crate defines the schema layer: manifest loading (`ManifestDocument`),
//! structural shape detection over the untyped manifest tree (`shape`), the
//! route, service and process normalizers, and the assembler that turns one
//! application node into a canonical `Application`. It also provides the
//! application identity and content fingerprint used for change detection.

pub mod application;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod normalize;
mod process;
pub mod route;
pub mod service;
pub mod shape;
pub mod types;

pub use application::{
    Application, EnvVars, Metadata, Probe, Process, ProcessType, Protocol, Route, Service, Sidecar,
};
pub use error::{FieldPath, NormalizeError};
pub use identity::{compute_fingerprint, AppFingerprint, AppIdentity};
pub use manifest::{
    parse_manifest_file, parse_manifest_json, parse_manifest_str, ManifestDocument, ManifestError,
};
pub use normalize::{
    normalize_application, normalize_application_at, NormalizeOptions, DEFAULT_STARTUP_TIMEOUT,
};
pub use route::normalize_route;
pub use service::normalize_service;
pub use types::{AppDigest, ShortDigest};
