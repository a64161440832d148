use crate::application::{Application, EnvVars, Metadata, ProcessType};
use crate::error::{FieldPath, NormalizeError};
use crate::process::{normalize_processes, normalize_sidecars, ProcessDraft};
use crate::route::{normalize_routes_with_policy, RouteSet};
use crate::service::normalize_services;
use crate::shape::{flag_at, lookup, mapping, string_at, string_pairs, uint_at, RoutePolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Seconds granted to start when probes exist but no timeout was given.
pub const DEFAULT_STARTUP_TIMEOUT: u32 = 60;
pub const DEFAULT_REPLICAS: u32 = 1;

const KNOWN_KEYS: &[&str] = &[
    "name",
    "metadata",
    "space",
    "labels",
    "annotations",
    "env",
    "routes",
    "no-route",
    "random-route",
    "services",
    "processes",
    "sidecars",
    "stack",
    "startupTimeout",
    "timeout",
    "replicas",
    "instances",
];

/// Knobs that change how normalization fills in missing data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Domain appended to routes synthesized under the `default` policy.
    #[serde(default)]
    pub default_domain: Option<String>,
}

/// Normalize one application node into its canonical form.
pub fn normalize_application(
    node: &Value,
    options: &NormalizeOptions,
) -> Result<Application, NormalizeError> {
    normalize_application_at(node, &FieldPath::root(), options)
}

/// Same as [`normalize_application`], reporting errors relative to `path`.
pub fn normalize_application_at(
    node: &Value,
    path: &FieldPath,
    options: &NormalizeOptions,
) -> Result<Application, NormalizeError> {
    let map = mapping(node, path, "application")?;
    for key in map.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            debug!("{path}: ignoring unknown key '{key}'");
        }
    }

    let metadata = normalize_metadata(map, node, path)?;
    let domain = options.default_domain.as_deref();
    let env: EnvVars = string_pairs(map.get("env"), &path.field("env"))?
        .into_iter()
        .collect();

    let no_route = flag_at(map, &["no-route"], path)?.unwrap_or(false);
    let declared_policy = flag_at(map, &["random-route"], path)?
        .and_then(|random| random.then_some(RoutePolicy::Random));

    let mut routes = normalize_routes_with_policy(
        map.get("routes"),
        &path.field("routes"),
        &metadata.name,
        domain,
        declared_policy,
    )?;
    let services = normalize_services(map.get("services"), &path.field("services"))?;
    let mut drafts = normalize_processes(
        map.get("processes"),
        &path.field("processes"),
        &metadata.name,
        domain,
    )?;
    if no_route {
        // Routes are still validated above, then withdrawn.
        if !routes.is_empty() || drafts.iter().any(|d| !d.process.routes.is_empty()) {
            debug!("{path}: no-route set, dropping declared routes");
        }
        routes = RouteSet::default();
        for draft in &mut drafts {
            draft.process.routes.clear();
        }
    }
    for draft in &drafts {
        draft.register_routes(&mut routes)?;
    }
    let sidecars = normalize_sidecars(map.get("sidecars"), &path.field("sidecars"))?;

    let stack = string_at(map, &["stack"], path)?
        .unwrap_or_default()
        .to_owned();
    let declared_timeout = uint_at(map, &["startupTimeout", "timeout"], path)?;
    let declared_replicas = uint_at(map, &["replicas", "instances"], path)?;
    let replicas = declared_replicas.unwrap_or_else(|| default_replicas(&drafts));

    let mut application = Application {
        metadata,
        env,
        routes: routes.into_routes(),
        services,
        processes: drafts.into_iter().map(|d| d.process).collect(),
        sidecars,
        stack,
        startup_timeout: declared_timeout.unwrap_or(0),
        replicas,
    };
    if application.startup_timeout == 0 && application.has_probes() {
        application.startup_timeout = DEFAULT_STARTUP_TIMEOUT;
    }

    debug!(
        "{path}: normalized '{}' ({} routes, {} services, {} processes, {} sidecars)",
        application.metadata.name,
        application.routes.len(),
        application.services.len(),
        application.processes.len(),
        application.sidecars.len()
    );
    Ok(application)
}

/// Top-level replicas mirror CF `instances`, which scale the web process.
fn default_replicas(drafts: &[ProcessDraft]) -> u32 {
    drafts
        .iter()
        .find(|d| d.declares_replicas && d.process.process_type == ProcessType::Web)
        .map_or(DEFAULT_REPLICAS, |d| d.process.replicas)
}

fn normalize_metadata(
    map: &Map<String, Value>,
    node: &Value,
    path: &FieldPath,
) -> Result<Metadata, NormalizeError> {
    let empty = Map::new();
    let nested_path = path.field("metadata");
    let nested = match map.get("metadata") {
        None | Some(Value::Null) => &empty,
        Some(v) => mapping(v, &nested_path, "metadata")?,
    };

    // Top-level keys take precedence over the nested metadata block.
    let pick = |key: &'static str| match lookup(map, &[key]) {
        Some((_, v)) => (Some(v), path.field(key)),
        None => (
            lookup(nested, &[key]).map(|(_, v)| v),
            nested_path.field(key),
        ),
    };

    let name = match pick("name") {
        (Some(Value::String(s)), _) if !s.trim().is_empty() => s.trim().to_owned(),
        (Some(Value::String(_)) | None, _) => {
            return Err(NormalizeError::missing(path, "name", node))
        }
        (Some(other), name_path) => {
            return Err(NormalizeError::shape(&name_path, "string", other))
        }
    };

    let space = match pick("space") {
        (None, _) => String::new(),
        (Some(Value::String(s)), _) => s.trim().to_owned(),
        (Some(other), space_path) => {
            return Err(NormalizeError::shape(&space_path, "string", other))
        }
    };

    let (labels_node, labels_path) = pick("labels");
    let (annotations_node, annotations_path) = pick("annotations");

    Ok(Metadata {
        name,
        space,
        labels: string_pairs(labels_node, &labels_path)?
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
        annotations: string_pairs(annotations_node, &annotations_path)?
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
    })
}
