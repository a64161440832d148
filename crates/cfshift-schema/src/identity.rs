use crate::application::Application;
use crate::types::{AppDigest, ShortDigest};
use serde::Serialize;
use std::fmt;

/// The stable identity of an application: two applications are the same
/// entity iff name and space match, whatever else differs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppIdentity {
    pub name: String,
    pub space: String,
}

impl fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.space.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.space, self.name)
        }
    }
}

/// Content digest of a canonical application. Unlike [`AppIdentity`] it
/// changes whenever any normalized field changes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppFingerprint {
    pub digest: AppDigest,
    pub short_digest: ShortDigest,
}

impl Application {
    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            name: self.metadata.name.clone(),
            space: self.metadata.space.clone(),
        }
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Blake3 over the canonical JSON rendering of `app`.
pub fn compute_fingerprint(app: &Application) -> Result<AppFingerprint, serde_json::Error> {
    let digest = AppDigest::of(app.canonical_json()?.as_bytes());
    Ok(AppFingerprint {
        short_digest: digest.short(),
        digest,
    })
}
