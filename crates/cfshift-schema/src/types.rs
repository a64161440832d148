//! Digest strings carried by fingerprints and batch reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex characters kept by [`ShortDigest`].
pub const SHORT_DIGEST_LEN: usize = 12;

macro_rules! digest_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

digest_string!(
    /// Full 64-character hex blake3 digest of a canonical application.
    AppDigest
);

digest_string!(
    /// Leading characters of an [`AppDigest`], used in terminal output.
    ShortDigest
);

impl AppDigest {
    /// Blake3 of `bytes`, hex encoded.
    pub fn of(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn short(&self) -> ShortDigest {
        ShortDigest(self.0.get(..SHORT_DIGEST_LEN).unwrap_or(&self.0).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_hex_of_expected_length() {
        let d = AppDigest::of(b"{}");
        assert_eq!(d.as_str().len(), 64);
        assert!(d.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(d, AppDigest::of(b"{}"));
        assert_ne!(d, AppDigest::of(b"[]"));
    }

    #[test]
    fn short_digest_is_a_prefix() {
        let d = AppDigest::of(b"abc");
        let short = d.short();
        assert_eq!(short.as_str().len(), SHORT_DIGEST_LEN);
        assert!(d.to_string().starts_with(&short.to_string()));
    }

    #[test]
    fn digest_serializes_as_plain_string() {
        let d = AppDigest::of(b"x");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{d}\""));
        let back: AppDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
