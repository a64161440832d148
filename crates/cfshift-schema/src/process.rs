use crate::application::{EnvVars, Probe, Process, ProcessType, Sidecar};
use crate::error::{FieldPath, NormalizeError};
use crate::normalize::DEFAULT_REPLICAS;
use crate::route::{normalize_routes, RouteSet};
use crate::shape::{
    aliased, command_list, detect_probe, lookup, mapping, sequence, string_at, string_pairs,
    text_at, uint_at, ProbeShape, LEGACY_PROBE_KEYS,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// A normalized process plus the facts the assembler needs about how it was
/// declared.
#[derive(Debug)]
pub(crate) struct ProcessDraft {
    pub process: Process,
    pub declares_replicas: bool,
    pub routes_path: FieldPath,
}

pub(crate) fn normalize_processes(
    node: Option<&Value>,
    path: &FieldPath,
    app_name: &str,
    domain: Option<&str>,
) -> Result<Vec<ProcessDraft>, NormalizeError> {
    sequence(node, path, "process list")?
        .iter()
        .enumerate()
        .map(|(i, item)| normalize_process(item, &path.index(i), app_name, domain))
        .collect()
}

fn normalize_process(
    node: &Value,
    path: &FieldPath,
    app_name: &str,
    domain: Option<&str>,
) -> Result<ProcessDraft, NormalizeError> {
    let map = mapping(node, path, "process")?;

    let routes_path = path.field("routes");
    let routes = normalize_routes(map.get("routes"), &routes_path, app_name, domain)?
        .into_routes();

    let process_type = match string_at(map, &["type"], path)? {
        Some(raw) => ProcessType::parse(raw)
            .ok_or_else(|| NormalizeError::shape(&path.field("type"), "process type", &map["type"]))?,
        None if routes.is_empty() => ProcessType::Worker,
        None => ProcessType::Web,
    };

    let name = string_at(map, &["name"], path)?
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| process_type.as_str().to_owned(), str::to_owned);

    let command = lookup(map, &["command"])
        .map(|(_, v)| command_list(v, &path.field("command")))
        .transpose()?
        .unwrap_or_default();

    let replicas = uint_at(map, &["replicas", "instances"], path)?;
    let env: EnvVars = string_pairs(map.get("env"), &path.field("env"))?
        .into_iter()
        .collect();

    let process = Process {
        process_type,
        name,
        image: string_at(map, &["image"], path)?.unwrap_or_default().to_owned(),
        command,
        memory: text_at(map, &["memory"], path)?.unwrap_or_default(),
        disk_quota: text_at(map, &["disk", "disk_quota", "disk-quota"], path)?.unwrap_or_default(),
        health_check: reconcile_health_check(map, path)?,
        readiness_check: match map.get("readinessCheck") {
            None | Some(Value::Null) => Probe::default(),
            Some(v) => structured_probe(
                mapping(v, &path.field("readinessCheck"), "probe")?,
                &path.field("readinessCheck"),
            )?,
        },
        replicas: replicas.unwrap_or(DEFAULT_REPLICAS),
        env,
        routes,
        log_rate_limit: text_at(map, &["logRateLimit", "log-rate-limit-per-second"], path)?
            .unwrap_or_default(),
    };

    Ok(ProcessDraft {
        process,
        declares_replicas: replicas.is_some(),
        routes_path,
    })
}

/// One health check from either the structured `healthCheck` object or the
/// flat `livenessProbe*` fields. The structured form wins outright.
fn reconcile_health_check(
    map: &Map<String, Value>,
    path: &FieldPath,
) -> Result<Probe, NormalizeError> {
    match detect_probe(map, path)? {
        ProbeShape::Structured(probe) => {
            if LEGACY_PROBE_KEYS.iter().any(|k| map.contains_key(*k)) {
                debug!("{path}: healthCheck present, ignoring livenessProbe fields");
            }
            structured_probe(probe, &path.field("healthCheck"))
        }
        ProbeShape::Legacy(fields) => legacy_probe(fields, path),
        ProbeShape::Absent => Ok(Probe::default()),
    }
}

fn structured_probe(map: &Map<String, Value>, path: &FieldPath) -> Result<Probe, NormalizeError> {
    let endpoint = string_at(map, &["endpoint"], path)?.unwrap_or_default().trim();
    let timeout = uint_at(map, &["timeout"], path)?.unwrap_or(0);
    let interval = uint_at(map, &["interval"], path)?.unwrap_or(0);
    if endpoint.is_empty() && (timeout != 0 || interval != 0) {
        debug!("{path}: probe without endpoint is not configured");
    }
    Ok(Probe::new(endpoint, timeout, interval))
}

fn legacy_probe(map: &Map<String, Value>, path: &FieldPath) -> Result<Probe, NormalizeError> {
    let endpoint = string_at(map, &["livenessProbe"], path)?.unwrap_or_default().trim();
    let timeout = uint_at(map, &["livenessProbeTimeout"], path)?.unwrap_or(0);
    let interval = uint_at(map, &["livenessProbeInterval"], path)?.unwrap_or(timeout);
    // Validated but not part of the canonical probe.
    uint_at(map, &["livenessProbeInitialDelay"], path)?;
    uint_at(map, &["livenessProbeRetries"], path)?;
    Ok(Probe::new(endpoint, timeout, interval))
}

pub(crate) fn normalize_sidecars(
    node: Option<&Value>,
    path: &FieldPath,
) -> Result<Vec<Sidecar>, NormalizeError> {
    let items = sequence(node, path, "sidecar list")?;
    let mut seen: HashMap<String, FieldPath> = HashMap::with_capacity(items.len());
    let mut sidecars = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let item_path = path.index(i);
        let sidecar = normalize_sidecar(item, &item_path)?;
        if let Some(first) = seen.get(&sidecar.name) {
            return Err(NormalizeError::DuplicateSidecar {
                path: item_path,
                first: first.clone(),
                name: sidecar.name,
            });
        }
        seen.insert(sidecar.name.clone(), item_path);
        sidecars.push(sidecar);
    }
    Ok(sidecars)
}

fn normalize_sidecar(node: &Value, path: &FieldPath) -> Result<Sidecar, NormalizeError> {
    let map = mapping(node, path, "sidecar")?;

    let name = string_at(map, &["name"], path)?
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| NormalizeError::missing(path, "name", node))?
        .to_owned();

    let (types_key, types_node) = aliased(map, &["processTypes", "process_types"], path)?
        .ok_or_else(|| NormalizeError::missing(path, "processTypes", node))?;
    let types_path = path.field(types_key);
    let mut process_types = Vec::new();
    for (i, t) in sequence(Some(types_node), &types_path, "process type list")?
        .iter()
        .enumerate()
    {
        let parsed = t
            .as_str()
            .and_then(ProcessType::parse)
            .ok_or_else(|| NormalizeError::shape(&types_path.index(i), "process type", t))?;
        if process_types.contains(&parsed) {
            return Err(NormalizeError::shape(&types_path.index(i), "process type set", t));
        }
        process_types.push(parsed);
    }
    if process_types.is_empty() {
        return Err(NormalizeError::missing(path, "processTypes", node));
    }

    let command = lookup(map, &["command"])
        .map(|(_, v)| command_list(v, &path.field("command")))
        .transpose()?
        .unwrap_or_default();
    if command.is_empty() {
        return Err(NormalizeError::missing(path, "command", node));
    }

    Ok(Sidecar {
        name,
        process_types,
        command,
        memory: text_at(map, &["memory"], path)?.unwrap_or_default(),
    })
}

impl ProcessDraft {
    /// Fold this process's routes into the application's route set.
    pub(crate) fn register_routes(&self, set: &mut RouteSet) -> Result<(), NormalizeError> {
        for (i, route) in self.process.routes.iter().enumerate() {
            set.absorb(route, &self.routes_path.index(i))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn process(node: Value) -> Result<Process, NormalizeError> {
        normalize_process(&node, &FieldPath::root().field("processes").index(0), "app", None)
            .map(|d| d.process)
    }

    fn sidecars(node: Value) -> Result<Vec<Sidecar>, NormalizeError> {
        normalize_sidecars(Some(&node), &FieldPath::root().field("sidecars"))
    }

    #[test]
    fn legacy_probe_interval_follows_timeout() {
        let p = process(json!({"type": "web", "livenessProbe": "/health", "livenessProbeTimeout": 5}))
            .unwrap();
        assert_eq!(p.health_check, Probe { endpoint: "/health".to_owned(), timeout: 5, interval: 5 });
    }

    #[test]
    fn legacy_probe_without_timeout_gets_defaults() {
        let p = process(json!({"livenessProbe": "/health"})).unwrap();
        assert_eq!(p.health_check.timeout, Probe::DEFAULT_TIMEOUT);
        assert_eq!(p.health_check.interval, Probe::DEFAULT_INTERVAL);
    }

    #[test]
    fn legacy_extra_fields_are_validated_and_dropped() {
        let p = process(json!({
            "livenessProbe": "/h",
            "livenessProbeTimeout": 3,
            "livenessProbeInitialDelay": 10,
            "livenessProbeRetries": 4
        }))
        .unwrap();
        assert_eq!(p.health_check.interval, 3);
        assert!(process(json!({"livenessProbe": "/h", "livenessProbeRetries": "many"})).is_err());
    }

    #[test]
    fn structured_health_check_wins() {
        let p = process(json!({
            "healthCheck": {"endpoint": "/live", "timeout": 2, "interval": 10},
            "livenessProbe": "/old",
            "livenessProbeTimeout": 9
        }))
        .unwrap();
        assert_eq!(p.health_check, Probe { endpoint: "/live".to_owned(), timeout: 2, interval: 10 });
    }

    #[test]
    fn structured_probe_defaults_fill_zero_values() {
        let p = process(json!({"readinessCheck": {"endpoint": "/ready"}})).unwrap();
        assert_eq!(p.readiness_check, Probe { endpoint: "/ready".to_owned(), timeout: 1, interval: 30 });
    }

    #[test]
    fn absent_probes_are_sentinels() {
        let p = process(json!({"type": "worker"})).unwrap();
        assert!(p.health_check.is_sentinel());
        assert!(p.readiness_check.is_sentinel());
    }

    #[test]
    fn undeclared_replicas_match_application_default() {
        let p = process(json!({"type": "worker"})).unwrap();
        assert_eq!(p.replicas, DEFAULT_REPLICAS);
    }

    #[test]
    fn type_inferred_from_routes() {
        let worker = process(json!({"command": "run"})).unwrap();
        assert_eq!(worker.process_type, ProcessType::Worker);
        assert_eq!(worker.name, "worker");

        let web = process(json!({"routes": ["app.example.com"]})).unwrap();
        assert_eq!(web.process_type, ProcessType::Web);
        assert_eq!(web.name, "web");
        assert_eq!(web.routes[0].port, 80);
    }

    #[test]
    fn explicit_type_is_kept_even_with_routes() {
        let p = process(json!({"type": "worker", "routes": ["a.example.com"]})).unwrap();
        assert_eq!(p.process_type, ProcessType::Worker);
    }

    #[test]
    fn unknown_type_is_shape_error() {
        let err = process(json!({"type": "cron"})).unwrap_err();
        assert_eq!(err.path().as_str(), "processes[0].type");
    }

    #[test]
    fn pass_through_fields_and_defaults() {
        let p = process(json!({
            "type": "web",
            "name": "frontend",
            "image": "registry.example.com/frontend:1.2",
            "command": ["node", "server.js"],
            "memory": "512M",
            "disk_quota": "1G",
            "instances": 3,
            "env": {"PORT": 8080, "DEBUG": false},
            "log-rate-limit-per-second": "16K"
        }))
        .unwrap();
        assert_eq!(p.name, "frontend");
        assert_eq!(p.image, "registry.example.com/frontend:1.2");
        assert_eq!(p.command, vec!["node", "server.js"]);
        assert_eq!(p.memory, "512M");
        assert_eq!(p.disk_quota, "1G");
        assert_eq!(p.replicas, 3);
        assert_eq!(p.env.get("PORT"), Some("8080"));
        assert_eq!(p.env.get("DEBUG"), Some("false"));
        assert_eq!(p.log_rate_limit, "16K");
    }

    #[test]
    fn replicas_default_to_one() {
        let draft = normalize_process(&json!({}), &FieldPath::root(), "app", None).unwrap();
        assert_eq!(draft.process.replicas, 1);
        assert!(!draft.declares_replicas);
    }

    #[test]
    fn nested_env_value_is_rejected() {
        let err = process(json!({"env": {"A": {"b": 1}}})).unwrap_err();
        assert_eq!(err.path().as_str(), "processes[0].env.A");
    }

    #[test]
    fn sidecar_normalizes() {
        let out = sidecars(json!([{
            "name": "proxy",
            "process_types": ["web", "worker"],
            "command": "./proxy --port 9000",
            "memory": "64M"
        }]))
        .unwrap();
        assert_eq!(out[0].process_types, vec![ProcessType::Web, ProcessType::Worker]);
        assert_eq!(out[0].command, vec!["./proxy --port 9000"]);
        assert_eq!(out[0].memory, "64M");
    }

    #[test]
    fn sidecar_requires_name_types_and_command() {
        assert!(matches!(
            sidecars(json!([{"processTypes": ["web"], "command": "x"}])),
            Err(NormalizeError::MissingRequiredField { field: "name", .. })
        ));
        assert!(matches!(
            sidecars(json!([{"name": "s", "processTypes": [], "command": "x"}])),
            Err(NormalizeError::MissingRequiredField { field: "processTypes", .. })
        ));
        assert!(matches!(
            sidecars(json!([{"name": "s", "processTypes": ["web"]}])),
            Err(NormalizeError::MissingRequiredField { field: "command", .. })
        ));
    }

    #[test]
    fn sidecar_repeated_type_is_rejected() {
        assert!(sidecars(json!([{"name": "s", "processTypes": ["web", "web"], "command": "x"}]))
            .is_err());
    }

    #[test]
    fn duplicate_sidecar_names_are_rejected() {
        let err = sidecars(json!([
            {"name": "s", "processTypes": ["web"], "command": "a"},
            {"name": "s", "processTypes": ["worker"], "command": "b"}
        ]))
        .unwrap_err();
        assert!(matches!(err, NormalizeError::DuplicateSidecar { .. }));
    }
}
