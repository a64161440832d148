use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical, fully-resolved representation of one Cloud Foundry application.
///
/// Routes carry an inferred port, probes carry their default timeouts, and
/// route synthesis has already happened. A Kubernetes generator can consume
/// this value without looking at the original manifest again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(flatten)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "EnvVars::is_empty")]
    pub env: EnvVars,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<Process>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Sidecar>,
    /// Informational only; stacks have no Kubernetes counterpart.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stack: String,
    /// Seconds an instance may take to pass its first check.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub startup_timeout: u32,
    pub replicas: u32,
}

impl Application {
    /// Instance count a process actually runs with. An application scaled to
    /// zero runs nothing, whatever its processes declare.
    pub fn effective_replicas(&self, process: &Process) -> u32 {
        if self.replicas == 0 {
            0
        } else {
            process.replicas
        }
    }

    /// Environment seen by `process`: application variables first, process
    /// variables replacing them on key collision.
    pub fn effective_env(&self, process: &Process) -> EnvVars {
        let mut merged = self.env.clone();
        for (key, value) in process.env.iter() {
            merged.insert(key.to_owned(), value.to_owned());
        }
        merged
    }

    /// Whether any process declares a health or readiness check.
    pub fn has_probes(&self) -> bool {
        self.processes
            .iter()
            .any(|p| !p.health_check.is_sentinel() || !p.readiness_check.is_sentinel())
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    /// Empty when the application comes straight from a manifest and is not
    /// bound to a runtime space yet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub space: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
}

impl Protocol {
    /// Accepts the spellings found in manifests. `http2` is served over TLS
    /// and therefore lands on HTTPS.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" | "http2" => Some(Self::Https),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }

    /// Port implied by the protocol alone. TCP has none.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::Http => Some(crate::route::HTTP_PORT),
            Self::Https => Some(crate::route::HTTPS_PORT),
            Self::Tcp => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route with its port fully resolved. For TCP routes any `:port` suffix
/// has been moved out of `url` into `port`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Route {
    pub url: String,
    pub protocol: Protocol,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    Web,
    Worker,
}

impl ProcessType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Some(Self::Web),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(rename = "type")]
    pub process_type: ProcessType,
    pub name: String,
    #[serde(default)]
    pub image: String,
    /// Empty means the image entrypoint is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,
    #[serde(rename = "disk", default, skip_serializing_if = "String::is_empty")]
    pub disk_quota: String,
    pub health_check: Probe,
    pub readiness_check: Probe,
    pub replicas: u32,
    /// Overrides for application-level variables; see
    /// [`Application::effective_env`].
    #[serde(default, skip_serializing_if = "EnvVars::is_empty")]
    pub env: EnvVars,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_rate_limit: String,
}

/// Health or readiness check. The all-empty value means "not configured".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Probe {
    pub endpoint: String,
    pub timeout: u32,
    pub interval: u32,
}

impl Probe {
    pub const DEFAULT_TIMEOUT: u32 = 1;
    pub const DEFAULT_INTERVAL: u32 = 30;

    /// Build a probe, filling zero timeout/interval with defaults when an
    /// endpoint is set. An empty endpoint always yields the sentinel.
    pub fn new(endpoint: impl Into<String>, timeout: u32, interval: u32) -> Self {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Self::default();
        }
        Self {
            endpoint,
            timeout: if timeout == 0 {
                Self::DEFAULT_TIMEOUT
            } else {
                timeout
            },
            interval: if interval == 0 {
                Self::DEFAULT_INTERVAL
            } else {
                interval
            },
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.endpoint.is_empty() && self.timeout == 0 && self.interval == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    pub name: String,
    pub process_types: Vec<ProcessType>,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,
}

/// Insertion-ordered environment variables with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars(Vec<(String, String)>);

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place so the original
    /// position is kept.
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.0.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        for (k, v) in iter {
            env.insert(k.into(), v.into());
        }
        env
    }
}

impl Serialize for EnvVars {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvVars {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EnvVisitor;

        impl<'de> Visitor<'de> for EnvVisitor {
            type Value = EnvVars;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of environment variable names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<EnvVars, A::Error> {
                let mut env = EnvVars::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    env.insert(k, v);
                }
                Ok(env)
            }
        }

        deserializer.deserialize_map(EnvVisitor)
    }
}
