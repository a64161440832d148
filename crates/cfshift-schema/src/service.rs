use crate::application::Service;
use crate::error::{FieldPath, NormalizeError};
use crate::shape::{detect_service, sequence, ServiceShape};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Normalize the `services` sequence, keeping declaration order.
pub(crate) fn normalize_services(
    node: Option<&Value>,
    path: &FieldPath,
) -> Result<Vec<Service>, NormalizeError> {
    let items = sequence(node, path, "service list")?;
    let mut seen: HashMap<String, FieldPath> = HashMap::with_capacity(items.len());
    let mut services = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let item_path = path.index(i);
        let service = normalize_service(item, &item_path)?;
        if let Some(first) = seen.get(&service.name) {
            return Err(NormalizeError::DuplicateService {
                path: item_path,
                first: first.clone(),
                name: service.name,
            });
        }
        seen.insert(service.name.clone(), item_path);
        services.push(service);
    }
    Ok(services)
}

/// Normalize a single service entry of either shape.
pub fn normalize_service(node: &Value, path: &FieldPath) -> Result<Service, NormalizeError> {
    match detect_service(node, path)? {
        ServiceShape::Bare(name) => Ok(Service {
            name: required_name(name, node, path)?,
            parameters: Map::new(),
        }),
        ServiceShape::Named(map) => decode_named(map, node, path),
    }
}

fn decode_named(
    map: &Map<String, Value>,
    node: &Value,
    path: &FieldPath,
) -> Result<Service, NormalizeError> {
    let name = match &map["name"] {
        Value::String(s) => required_name(s, node, path)?,
        Value::Null => return Err(NormalizeError::missing(path, "name", node)),
        other => return Err(NormalizeError::shape(&path.field("name"), "string", other)),
    };

    let mut parameters = match map.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(p)) => p.clone(),
        Some(other) => {
            return Err(NormalizeError::shape(
                &path.field("parameters"),
                "mapping",
                other,
            ))
        }
    };

    // Keys this layer does not model (binding_name, ...) travel in parameters.
    for (key, value) in map {
        if key == "name" || key == "parameters" {
            continue;
        }
        if parameters.contains_key(key) {
            debug!("{path}: '{key}' shadowed by parameters.{key}");
            continue;
        }
        parameters.insert(key.clone(), value.clone());
    }

    Ok(Service { name, parameters })
}

fn required_name(name: &str, node: &Value, path: &FieldPath) -> Result<String, NormalizeError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::missing(path, "name", node));
    }
    Ok(trimmed.to_owned())
}
