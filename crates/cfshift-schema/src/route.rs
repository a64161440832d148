use crate::application::{Protocol, Route};
use crate::error::{FieldPath, NormalizeError};
use crate::shape::{detect_route, detect_routes, string_at, RoutePolicy, RouteShape, RoutesShape};
use serde_json::{Map, Value};
use tracing::{debug, trace};

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

/// Ordered routes with (url, port) uniqueness, remembering where each entry
/// was declared so duplicates can name both sides.
#[derive(Debug, Default)]
pub(crate) struct RouteSet {
    entries: Vec<(Route, FieldPath)>,
}

impl RouteSet {
    fn position(&self, route: &Route) -> Option<usize> {
        self.entries
            .iter()
            .position(|(r, _)| r.url == route.url && r.port == route.port)
    }

    /// Add a declared route; a repeated (url, port) is an error.
    pub(crate) fn push(&mut self, route: Route, path: FieldPath) -> Result<(), NormalizeError> {
        if let Some(i) = self.position(&route) {
            return Err(NormalizeError::DuplicateRoute {
                path,
                first: self.entries[i].1.clone(),
                url: route.url,
                port: route.port,
            });
        }
        self.entries.push((route, path));
        Ok(())
    }

    /// Add a route served by a process. A route the application already
    /// declares is the same route, not a duplicate.
    pub(crate) fn absorb(&mut self, route: &Route, path: &FieldPath) -> Result<(), NormalizeError> {
        match self.position(route) {
            Some(i) if self.entries[i].0.protocol == route.protocol => Ok(()),
            Some(i) => Err(NormalizeError::DuplicateRoute {
                path: path.clone(),
                first: self.entries[i].1.clone(),
                url: route.url.clone(),
                port: route.port,
            }),
            None => {
                self.entries.push((route.clone(), path.clone()));
                Ok(())
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.entries.into_iter().map(|(r, _)| r).collect()
    }
}

/// Normalize a `routes` field (plain list or `{type, routes}` envelope).
///
/// `app_name` is the hostname stem for the route synthesized under the
/// `default` policy; `domain`, when set, is appended to it.
pub(crate) fn normalize_routes(
    node: Option<&Value>,
    path: &FieldPath,
    app_name: &str,
    domain: Option<&str>,
) -> Result<RouteSet, NormalizeError> {
    normalize_routes_with_policy(node, path, app_name, domain, None)
}

/// Same as [`normalize_routes`], with a policy declared outside the field
/// (CF `random-route: true`). It applies to plain lists and must agree with
/// the policy of an envelope.
pub(crate) fn normalize_routes_with_policy(
    node: Option<&Value>,
    path: &FieldPath,
    app_name: &str,
    domain: Option<&str>,
    declared: Option<RoutePolicy>,
) -> Result<RouteSet, NormalizeError> {
    let (envelope, entries) = match detect_routes(node, path)? {
        RoutesShape::List(items) => (None, items),
        RoutesShape::Envelope { policy, routes } => (Some(policy), routes),
    };
    let entries_path = match envelope {
        Some(_) => path.field("routes"),
        None => path.clone(),
    };
    let policy = match (envelope, declared) {
        (Some(own), Some(other)) if own != other => {
            let kind = node.and_then(|n| n.get("type")).unwrap_or(&Value::Null);
            return Err(NormalizeError::shape(
                &path.field("type"),
                "route policy agreeing with random-route",
                kind,
            ));
        }
        (own, other) => own.or(other),
    };

    let mut set = RouteSet::default();
    for (i, entry) in entries.iter().enumerate() {
        let entry_path = entries_path.index(i);
        let route = normalize_route(entry, &entry_path)?;
        trace!("{entry_path}: {}:{} ({})", route.url, route.port, route.protocol);
        set.push(route, entry_path)?;
    }

    if policy == Some(RoutePolicy::Default) && entries.is_empty() {
        let route = synthesize_route(app_name, domain);
        debug!("{path}: no routes listed, synthesized {}", route.url);
        set.push(route, path.clone())?;
    }
    Ok(set)
}

/// Normalize one route entry of any shape.
pub fn normalize_route(node: &Value, path: &FieldPath) -> Result<Route, NormalizeError> {
    match detect_route(node, path)? {
        RouteShape::HostProtocol(map) => decode_host_protocol(map, node, path),
        RouteShape::Url(map) => decode_url_map(map, node, path),
        RouteShape::Bare(url) => resolve(url, None, None, node, path),
    }
}

fn synthesize_route(app_name: &str, domain: Option<&str>) -> Route {
    let url = match domain.map(|d| d.trim_matches('.')).filter(|d| !d.is_empty()) {
        Some(domain) => format!("{app_name}.{domain}"),
        None => app_name.to_owned(),
    };
    Route {
        url,
        protocol: Protocol::Http,
        port: HTTP_PORT,
    }
}

fn decode_host_protocol(
    map: &Map<String, Value>,
    node: &Value,
    path: &FieldPath,
) -> Result<Route, NormalizeError> {
    let host = string_at(map, &["hostname", "fqdn"], path)?
        .ok_or_else(|| NormalizeError::missing(path, "hostname", node))?;
    let protocol = protocol_field(map, path)?;
    let port = port_field(map, path)?;
    resolve(host, protocol, port, node, path)
}

fn decode_url_map(
    map: &Map<String, Value>,
    node: &Value,
    path: &FieldPath,
) -> Result<Route, NormalizeError> {
    let url = string_at(map, &["url", "route"], path)?
        .ok_or_else(|| NormalizeError::missing(path, "url", node))?;
    let protocol = protocol_field(map, path)?;
    let port = port_field(map, path)?;
    resolve(url, protocol, port, node, path)
}

fn protocol_field(
    map: &Map<String, Value>,
    path: &FieldPath,
) -> Result<Option<Protocol>, NormalizeError> {
    match map.get("protocol") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(Protocol::parse)
            .map(Some)
            .ok_or_else(|| NormalizeError::shape(&path.field("protocol"), "protocol", v)),
    }
}

fn port_field(map: &Map<String, Value>, path: &FieldPath) -> Result<Option<u16>, NormalizeError> {
    match map.get("port") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .filter(|n| *n != 0)
            .map(Some)
            .ok_or_else(|| NormalizeError::shape(&path.field("port"), "port", v)),
    }
}

/// Apply scheme stripping, TCP port extraction and the port inference table.
fn resolve(
    raw_url: &str,
    protocol: Option<Protocol>,
    explicit_port: Option<u16>,
    node: &Value,
    path: &FieldPath,
) -> Result<Route, NormalizeError> {
    let mut url = raw_url.trim();
    let mut scheme = None;
    if let Some((parsed, rest)) = url
        .split_once("://")
        .and_then(|(prefix, rest)| Protocol::parse(prefix).map(|p| (p, rest)))
    {
        if protocol.is_some_and(|p| p != parsed) {
            return Err(NormalizeError::shape(path, "route url", node));
        }
        scheme = Some(parsed);
        url = rest;
    }
    let protocol = protocol.or(scheme).unwrap_or(Protocol::Http);

    if url.is_empty() {
        return Err(NormalizeError::missing(path, "url", node));
    }

    let port = match protocol.default_port() {
        Some(default) => explicit_port.unwrap_or(default),
        None => {
            let (host, embedded) = split_embedded_port(url, node, path)?;
            url = host;
            match (embedded, explicit_port) {
                (Some(a), Some(b)) if a != b => {
                    return Err(NormalizeError::shape(path, "tcp route", node));
                }
                (Some(p), _) | (None, Some(p)) => p,
                (None, None) => {
                    return Err(NormalizeError::MissingPort {
                        path: path.clone(),
                        value: node.to_string(),
                    });
                }
            }
        }
    };

    Ok(Route {
        url: url.to_owned(),
        protocol,
        port,
    })
}

/// `tcp.example.com:1024` → (`tcp.example.com`, Some(1024)).
fn split_embedded_port<'a>(
    url: &'a str,
    node: &Value,
    path: &FieldPath,
) -> Result<(&'a str, Option<u16>), NormalizeError> {
    let Some((host, suffix)) = url.rsplit_once(':') else {
        return Ok((url, None));
    };
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Ok((url, None));
    }
    match suffix.parse::<u16>() {
        Ok(port) if port != 0 && !host.is_empty() => Ok((host, Some(port))),
        _ => Err(NormalizeError::shape(path, "tcp route", node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path() -> FieldPath {
        FieldPath::root().field("routes").index(0)
    }

    fn route(node: Value) -> Result<Route, NormalizeError> {
        normalize_route(&node, &path())
    }

    fn routes(node: Value, name: &str) -> Result<Vec<Route>, NormalizeError> {
        normalize_routes(Some(&node), &FieldPath::root().field("routes"), name, None)
            .map(RouteSet::into_routes)
    }

    #[test]
    fn http_routes_default_to_port_80() {
        for node in [
            json!("example.com"),
            json!({"url": "example.com"}),
            json!({"route": "example.com", "protocol": "http"}),
            json!({"hostname": "example.com", "protocol": "HTTP"}),
            json!({"fqdn": "example.com", "protocol": "http"}),
        ] {
            let r = route(node).unwrap();
            assert_eq!(r.protocol, Protocol::Http);
            assert_eq!(r.port, 80);
            assert_eq!(r.url, "example.com");
        }
    }

    #[test]
    fn https_and_http2_default_to_port_443() {
        let a = route(json!({"hostname": "a.example.com", "protocol": "https"})).unwrap();
        let b = route(json!({"route": "b.example.com", "protocol": "http2"})).unwrap();
        let c = route(json!("https://c.example.com")).unwrap();
        for r in [a, b, c] {
            assert_eq!(r.protocol, Protocol::Https);
            assert_eq!(r.port, 443);
        }
    }

    #[test]
    fn scheme_is_stripped_from_url() {
        let r = route(json!({"url": "https://secure.example.com/api"})).unwrap();
        assert_eq!(r.url, "secure.example.com/api");
    }

    #[test]
    fn explicit_port_overrides_http_default() {
        let r = route(json!({"url": "example.com", "port": 8080})).unwrap();
        assert_eq!(r.port, 8080);
    }

    #[test]
    fn tcp_port_is_extracted_from_url() {
        let r = route(json!({"route": "tcp.example.com:1234", "protocol": "tcp"})).unwrap();
        assert_eq!(r.url, "tcp.example.com");
        assert_eq!(r.port, 1234);
        assert_eq!(r.protocol, Protocol::Tcp);
    }

    #[test]
    fn tcp_explicit_port_field_is_used() {
        let r = route(json!({"hostname": "tcp.example.com", "protocol": "tcp", "port": 9000}))
            .unwrap();
        assert_eq!(r.url, "tcp.example.com");
        assert_eq!(r.port, 9000);
    }

    #[test]
    fn tcp_without_port_is_missing_port() {
        let err = route(json!({"hostname": "tcp.example.com", "protocol": "tcp"})).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingPort { .. }));
        assert_eq!(err.path(), &path());
    }

    #[test]
    fn tcp_conflicting_ports_are_rejected() {
        let err = route(json!({"url": "tcp://t.example.com:1000", "port": 2000})).unwrap_err();
        assert!(matches!(err, NormalizeError::Shape { .. }));
    }

    #[test]
    fn http_url_colon_suffix_is_left_alone() {
        let r = route(json!("example.com:8443")).unwrap();
        assert_eq!(r.url, "example.com:8443");
        assert_eq!(r.port, 80);
    }

    #[test]
    fn unknown_protocol_is_shape_error() {
        let err = route(json!({"hostname": "a.example.com", "protocol": "udp"})).unwrap_err();
        assert_eq!(err.path().as_str(), "routes[0].protocol");
    }

    #[test]
    fn scheme_conflicting_with_protocol_is_rejected() {
        assert!(route(json!({"url": "https://a.example.com", "protocol": "tcp"})).is_err());
    }

    #[test]
    fn default_policy_synthesizes_from_app_name() {
        let out = routes(json!({"type": "default", "routes": []}), "billing").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "billing");
        assert_eq!(out[0].protocol, Protocol::Http);
        assert_eq!(out[0].port, 80);
    }

    #[test]
    fn default_policy_appends_configured_domain() {
        let node = json!({"type": "default", "routes": []});
        let out = normalize_routes(
            Some(&node),
            &FieldPath::root(),
            "billing",
            Some("apps.example.com"),
        )
        .unwrap()
        .into_routes();
        assert_eq!(out[0].url, "billing.apps.example.com");
    }

    #[test]
    fn default_policy_keeps_listed_routes() {
        let out = routes(
            json!({"type": "default", "routes": ["a.example.com", "b.example.com"]}),
            "billing",
        )
        .unwrap();
        let urls: Vec<_> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn random_policy_never_synthesizes() {
        let out = routes(json!({"type": "random", "routes": []}), "billing").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn declared_random_policy_applies_to_plain_list() {
        let out = normalize_routes_with_policy(
            Some(&json!(["a.example.com"])),
            &FieldPath::root().field("routes"),
            "billing",
            None,
            Some(RoutePolicy::Random),
        )
        .unwrap()
        .into_routes();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "a.example.com");
    }

    #[test]
    fn declared_policy_must_agree_with_envelope() {
        let err = normalize_routes_with_policy(
            Some(&json!({"type": "default", "routes": []})),
            &FieldPath::root().field("routes"),
            "billing",
            None,
            Some(RoutePolicy::Random),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "shape");
        assert_eq!(err.path().as_str(), "routes.type");
    }

    #[test]
    fn duplicate_url_and_port_names_both_entries() {
        let err = routes(
            json!(["a.example.com", {"url": "b.example.com"}, {"hostname": "a.example.com", "protocol": "http"}]),
            "x",
        )
        .unwrap_err();
        match err {
            NormalizeError::DuplicateRoute { path, first, url, port } => {
                assert_eq!(path.as_str(), "routes[2]");
                assert_eq!(first.as_str(), "routes[0]");
                assert_eq!(url, "a.example.com");
                assert_eq!(port, 80);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn same_host_on_different_ports_is_allowed() {
        let out = routes(
            json!([
                {"url": "t.example.com:1000", "protocol": "tcp"},
                {"url": "t.example.com:1001", "protocol": "tcp"}
            ]),
            "x",
        )
        .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn absorb_accepts_already_declared_route() {
        let mut set = RouteSet::default();
        let r = route(json!("a.example.com")).unwrap();
        set.push(r.clone(), path()).unwrap();
        set.absorb(&r, &FieldPath::root().field("processes")).unwrap();
        assert_eq!(set.into_routes().len(), 1);
    }
}
