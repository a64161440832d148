//! Structural shape detection over untyped manifest nodes.
//!
//! Manifest authors write the same concept in several incompatible ways.
//! Each detector here looks only at the structure of a node (scalar,
//! sequence, mapping and which keys are present) and names the shape it
//! matches. The normalizers then decode each shape with a dedicated function.
//! A node that matches no documented shape is a [`NormalizeError::Shape`].

use crate::error::{FieldPath, NormalizeError};
use serde_json::{Map, Value};

/// The service forms: `- db` or `- name: db` with optional `parameters`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServiceShape<'a> {
    Bare(&'a str),
    Named(&'a Map<String, Value>),
}

/// A single route entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteShape<'a> {
    /// `{hostname|fqdn, protocol, port?}`
    HostProtocol(&'a Map<String, Value>),
    /// `{url|route, protocol?, port?}`
    Url(&'a Map<String, Value>),
    /// `example.com`, `tcp.example.com:1024`, `https://example.com`
    Bare(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Synthesize one route from the application name when none are listed.
    Default,
    /// Use the listed routes verbatim, never synthesize.
    Random,
}

/// The whole `routes` field: a plain list or a `{type, routes}` envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoutesShape<'a> {
    List(&'a [Value]),
    Envelope {
        policy: RoutePolicy,
        routes: &'a [Value],
    },
}

/// Where a process takes its health check from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeShape<'a> {
    Structured(&'a Map<String, Value>),
    /// Sibling `livenessProbe*` scalars on the process itself.
    Legacy(&'a Map<String, Value>),
    Absent,
}

pub(crate) const LEGACY_PROBE_KEYS: [&str; 5] = [
    "livenessProbe",
    "livenessProbeTimeout",
    "livenessProbeInterval",
    "livenessProbeInitialDelay",
    "livenessProbeRetries",
];

pub fn detect_service<'a>(
    node: &'a Value,
    path: &FieldPath,
) -> Result<ServiceShape<'a>, NormalizeError> {
    match node {
        Value::String(s) => Ok(ServiceShape::Bare(s)),
        Value::Object(map) if map.contains_key("name") => Ok(ServiceShape::Named(map)),
        Value::Object(_) => Err(NormalizeError::missing(path, "name", node)),
        other => Err(NormalizeError::shape(path, "service", other)),
    }
}

pub fn detect_routes<'a>(
    node: Option<&'a Value>,
    path: &FieldPath,
) -> Result<RoutesShape<'a>, NormalizeError> {
    match node {
        None | Some(Value::Null) => Ok(RoutesShape::List(&[])),
        Some(Value::Array(items)) => Ok(RoutesShape::List(items)),
        Some(Value::Object(map)) if map.contains_key("type") && map.contains_key("routes") => {
            let policy = route_policy(&map["type"], &path.field("type"))?;
            let routes = sequence(map.get("routes"), &path.field("routes"), "route list")?;
            Ok(RoutesShape::Envelope { policy, routes })
        }
        Some(other) => Err(NormalizeError::shape(path, "routes", other)),
    }
}

pub fn detect_route<'a>(
    node: &'a Value,
    path: &FieldPath,
) -> Result<RouteShape<'a>, NormalizeError> {
    match node {
        Value::String(s) => Ok(RouteShape::Bare(s)),
        Value::Object(map)
            if (map.contains_key("hostname") || map.contains_key("fqdn"))
                && map.contains_key("protocol") =>
        {
            Ok(RouteShape::HostProtocol(map))
        }
        Value::Object(map) if map.contains_key("url") || map.contains_key("route") => {
            Ok(RouteShape::Url(map))
        }
        other => Err(NormalizeError::shape(path, "route", other)),
    }
}

pub fn detect_probe<'a>(
    process: &'a Map<String, Value>,
    path: &FieldPath,
) -> Result<ProbeShape<'a>, NormalizeError> {
    match process.get("healthCheck") {
        Some(Value::Object(map)) => Ok(ProbeShape::Structured(map)),
        Some(Value::Null) | None => {
            if LEGACY_PROBE_KEYS
                .iter()
                .any(|k| process.get(*k).is_some_and(|v| !v.is_null()))
            {
                Ok(ProbeShape::Legacy(process))
            } else {
                Ok(ProbeShape::Absent)
            }
        }
        Some(other) => Err(NormalizeError::shape(
            &path.field("healthCheck"),
            "probe",
            other,
        )),
    }
}

fn route_policy(node: &Value, path: &FieldPath) -> Result<RoutePolicy, NormalizeError> {
    match node.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("default") => Ok(RoutePolicy::Default),
        Some("random") => Ok(RoutePolicy::Random),
        _ => Err(NormalizeError::shape(path, "route policy", node)),
    }
}

pub(crate) fn mapping<'a>(
    node: &'a Value,
    path: &FieldPath,
    expected: &'static str,
) -> Result<&'a Map<String, Value>, NormalizeError> {
    node.as_object()
        .ok_or_else(|| NormalizeError::shape(path, expected, node))
}

/// A sequence field; absent or null reads as empty.
pub(crate) fn sequence<'a>(
    node: Option<&'a Value>,
    path: &FieldPath,
    expected: &'static str,
) -> Result<&'a [Value], NormalizeError> {
    match node {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(NormalizeError::shape(path, expected, other)),
    }
}

/// First non-null value among `keys`, together with the key that matched.
pub(crate) fn lookup<'a>(
    map: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter()
        .find_map(|k| map.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
}

/// Like [`lookup`] for keys that are aliases of one field. Two aliases set
/// to different values is a shape error at the later key.
pub(crate) fn aliased<'a>(
    map: &'a Map<String, Value>,
    keys: &[&'static str],
    path: &FieldPath,
) -> Result<Option<(&'static str, &'a Value)>, NormalizeError> {
    let mut found: Option<(&'static str, &'a Value)> = None;
    for &key in keys {
        let Some(value) = map.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        match found {
            None => found = Some((key, value)),
            Some((_, first)) if first == value => {}
            Some(_) => {
                return Err(NormalizeError::shape(
                    &path.field(key),
                    "value agreeing with its aliases",
                    value,
                ))
            }
        }
    }
    Ok(found)
}

pub(crate) fn string_at<'a>(
    map: &'a Map<String, Value>,
    keys: &[&'static str],
    path: &FieldPath,
) -> Result<Option<&'a str>, NormalizeError> {
    match aliased(map, keys, path)? {
        None => Ok(None),
        Some((_, Value::String(s))) => Ok(Some(s)),
        Some((key, other)) => Err(NormalizeError::shape(&path.field(key), "string", other)),
    }
}

pub(crate) fn flag_at(
    map: &Map<String, Value>,
    keys: &[&'static str],
    path: &FieldPath,
) -> Result<Option<bool>, NormalizeError> {
    match aliased(map, keys, path)? {
        None => Ok(None),
        Some((_, Value::Bool(b))) => Ok(Some(*b)),
        Some((key, other)) => Err(NormalizeError::shape(&path.field(key), "boolean", other)),
    }
}

/// A free-form scalar (string, number or bool) read back as text, e.g.
/// `memory: 512M` or `memory: 512`.
pub(crate) fn text_at(
    map: &Map<String, Value>,
    keys: &[&'static str],
    path: &FieldPath,
) -> Result<Option<String>, NormalizeError> {
    aliased(map, keys, path)?
        .map(|(key, v)| scalar_text(v, &path.field(key)))
        .transpose()
}

pub(crate) fn uint_at(
    map: &Map<String, Value>,
    keys: &[&'static str],
    path: &FieldPath,
) -> Result<Option<u32>, NormalizeError> {
    match aliased(map, keys, path)? {
        None => Ok(None),
        Some((key, v)) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| NormalizeError::shape(&path.field(key), "unsigned integer", v)),
    }
}

pub(crate) fn scalar_text(node: &Value, path: &FieldPath) -> Result<String, NormalizeError> {
    match node {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(NormalizeError::shape(path, "scalar", other)),
    }
}

/// A mapping of scalar values, as used by `env`, `labels` and `annotations`.
pub(crate) fn string_pairs(
    node: Option<&Value>,
    path: &FieldPath,
) -> Result<Vec<(String, String)>, NormalizeError> {
    match node {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v {
                // `KEY:` with nothing after it.
                Value::Null => Ok((k.clone(), String::new())),
                _ => Ok((k.clone(), scalar_text(v, &path.field(k))?)),
            })
            .collect(),
        Some(other) => Err(NormalizeError::shape(path, "mapping", other)),
    }
}

/// `command: ./run --fast` keeps the string as one argument; a sequence is
/// taken argument by argument.
pub(crate) fn command_list(node: &Value, path: &FieldPath) -> Result<Vec<String>, NormalizeError> {
    match node {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(NormalizeError::shape(&path.index(i), "command argument", other)),
            })
            .collect(),
        other => Err(NormalizeError::shape(path, "command", other)),
    }
}
