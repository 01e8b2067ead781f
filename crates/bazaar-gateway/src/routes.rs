//! # Route Table
//!
//! Maps path prefixes to backend services. Loaded once at startup from YAML
//! and read-only afterwards; the dispatcher shares it behind an `Arc` with no
//! lock.
//!
//! ```yaml
//! routes:
//!   - prefix: /catalog
//!     service: catalog
//!     target: http://catalog:4001
//!     rewrite: strip            # strip | preserve | { replace: /v2 }
//!     access: public            # public | authenticated | { roles: [...] } | { self_or_admin: <param> }
//!     policies:
//!       - path: /products
//!         methods: [POST]
//!         access: { roles: [admin] }
//! ```
//!
//! Matching picks the longest prefix that ends on a segment boundary, so
//! `/orders` matches `/orders` and `/orders/7` but not `/ordersx`. Within a
//! rule, the first policy whose pattern and method match decides access;
//! otherwise the rule-level `access` applies.
//!
//! Every malformed or ambiguous entry is a [`ConfigError`]. Nothing is
//! checked per request that could have been checked here.

use std::collections::{BTreeSet, HashSet};

use axum::http::Method;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use bazaar_core::Role;

use crate::config::ConfigError;
use crate::policy::{Access, PathParams};

/// Prefixes served by the gateway itself.
const RESERVED_PREFIXES: [&str; 2] = ["/health", "/metrics"];

const KNOWN_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

// ── File format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteFile {
    routes: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    prefix: String,
    service: String,
    target: String,
    #[serde(default)]
    rewrite: Option<RewriteSpec>,
    access: AccessSpec,
    #[serde(default)]
    policies: Vec<PolicySpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicySpec {
    path: String,
    #[serde(default)]
    methods: Option<Vec<String>>,
    access: AccessSpec,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccessSpec {
    Keyword(String),
    Roles(RolesSpec),
    SelfOrAdmin(SelfOrAdminSpec),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RolesSpec {
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelfOrAdminSpec {
    self_or_admin: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RewriteSpec {
    Keyword(String),
    Replace(ReplaceSpec),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplaceSpec {
    replace: String,
}

// ── Compiled table ──────────────────────────────────────────────────────────

/// How the matched prefix is rewritten before forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Remove the prefix once. `/catalog/products/42` → `/products/42`.
    Strip,
    /// Forward the path unchanged.
    Preserve,
    /// Swap the prefix for another one.
    Replace(String),
}

/// A per-path access override inside a rule.
#[derive(Clone)]
pub struct RoutePolicy {
    pattern: String,
    methods: Option<Vec<Method>>,
    access: Access,
    matcher: matchit::Router<()>,
}

impl std::fmt::Debug for RoutePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePolicy")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("access", &self.access)
            .finish()
    }
}

impl RoutePolicy {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn methods(&self) -> Option<&[Method]> {
        self.methods.as_deref()
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    fn applies_to(&self, method: &Method) -> bool {
        self.methods.as_ref().map_or(true, |m| m.contains(method))
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub prefix: String,
    pub service: String,
    pub target: Url,
    pub rewrite: Rewrite,
    pub access: Access,
    policies: Vec<RoutePolicy>,
}

impl RouteRule {
    pub fn policies(&self) -> &[RoutePolicy] {
        &self.policies
    }
}

/// Result of matching a request path against the table.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    path: String,
    suffix_start: usize,
}

impl RouteMatch<'_> {
    /// The path after the prefix, `/` when nothing follows it.
    pub fn relative_path(&self) -> &str {
        match &self.path[self.suffix_start..] {
            "" => "/",
            suffix => suffix,
        }
    }

    /// The path to request from the backend.
    pub fn upstream_path(&self) -> String {
        let suffix = &self.path[self.suffix_start..];
        match &self.rule.rewrite {
            Rewrite::Strip => self.relative_path().to_string(),
            Rewrite::Preserve => self.path.clone(),
            Rewrite::Replace(to) if to == "/" => self.relative_path().to_string(),
            Rewrite::Replace(to) => format!("{to}{suffix}"),
        }
    }

    /// The access requirement for `method` on this path, plus any captured
    /// path parameters.
    pub fn access(&self, method: &Method) -> (&Access, PathParams) {
        let relative = self.relative_path();
        let lookup = match relative.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => relative,
        };
        for policy in &self.rule.policies {
            if !policy.applies_to(method) {
                continue;
            }
            if let Ok(matched) = policy.matcher.at(lookup) {
                let params = matched
                    .params
                    .iter()
                    .map(|(k, v)| {
                        let value = urlencoding::decode(v).map_or_else(|_| v.into(), |d| d);
                        (k.to_string(), value.into_owned())
                    })
                    .collect();
                return (&policy.access, params);
            }
        }
        (&self.rule.access, PathParams::new())
    }
}

/// The immutable route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted by prefix length, longest first.
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Parse and validate a route file without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_with(yaml, |_| None)
    }

    /// Parse and validate a route file. `lookup` is consulted for
    /// `<SERVICE>_SERVICE_URL` target overrides.
    pub fn from_yaml_with(
        yaml: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: RouteFile =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if file.routes.is_empty() {
            return Err(ConfigError::Parse("route table has no routes".into()));
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(file.routes.len());
        for spec in file.routes {
            if !seen.insert(spec.prefix.clone()) {
                return Err(invalid(&spec.prefix, "duplicate prefix"));
            }
            let var = service_env_var(&spec.service);
            let target = lookup(&var).filter(|v| !v.is_empty());
            rules.push(compile_rule(spec, target.as_deref())?);
        }
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then(a.prefix.cmp(&b.prefix)));
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Longest matching prefix for a path already in canonical form.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            let suffix = path.strip_prefix(rule.prefix.as_str())?;
            (suffix.is_empty() || suffix.starts_with('/')).then(|| RouteMatch {
                rule,
                path: path.to_string(),
                suffix_start: rule.prefix.len(),
            })
        })
    }
}

/// Environment variable that overrides a service's target URL.
pub fn service_env_var(service: &str) -> String {
    format!("{}_SERVICE_URL", service.to_ascii_uppercase().replace('-', "_"))
}

/// Why a request path has no canonical form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is not valid UTF-8 once decoded")]
    InvalidUtf8,
    #[error("path segment \"{0}\" contains a separator")]
    EmbeddedSeparator(String),
    #[error("path contains a control character")]
    ControlCharacter,
}

/// The one spelling of a request path that routing, policy lookup and
/// forwarding all agree on.
///
/// Each segment is percent-decoded, dot segments and empty segments are
/// resolved, and each segment is re-encoded so that only unreserved
/// characters appear literally. `/catalog/%70roducts`, `/catalog//products`
/// and `/catalog/x/%2e%2e/products` all become `/catalog/products`. A
/// decoded segment holding `/` or `\` is rejected rather than guessed at.
/// A trailing slash is kept, and `..` never climbs above the root.
pub fn canonical_path(raw: &str) -> Result<String, PathError> {
    let mut decoded = Vec::new();
    for segment in raw.split('/') {
        let segment = urlencoding::decode(segment).map_err(|_| PathError::InvalidUtf8)?;
        if segment.contains(['/', '\\']) {
            return Err(PathError::EmbeddedSeparator(segment.into_owned()));
        }
        if segment.chars().any(char::is_control) {
            return Err(PathError::ControlCharacter);
        }
        decoded.push(segment);
    }
    let segments = resolve_segments(decoded.iter().map(|s| &**s));
    let encoded: Vec<_> = segments.iter().map(|s| urlencoding::encode(s)).collect();
    let encoded: Vec<&str> = encoded.iter().map(|s| &**s).collect();
    Ok(join_segments(&encoded, raw.ends_with('/')))
}

fn resolve_segments<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut segments = Vec::new();
    for segment in raw {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments
}

fn join_segments(segments: &[&str], trailing_slash: bool) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() || (trailing_slash && !segments.is_empty()) {
        out.push('/');
    }
    out
}

fn invalid(prefix: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRoute {
        prefix: prefix.to_string(),
        reason: reason.into(),
    }
}

fn compile_rule(spec: RuleSpec, target_override: Option<&str>) -> Result<RouteRule, ConfigError> {
    let prefix = spec.prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        return Err(invalid(&prefix, "prefix must start with '/' and must not end with '/'"));
    }
    if canonical_path(&prefix).ok().as_deref() != Some(prefix.as_str())
        || prefix.contains(['{', '}', '*', '?', '#'])
    {
        return Err(invalid(&prefix, "prefix must be a plain canonical path"));
    }
    if RESERVED_PREFIXES
        .iter()
        .any(|r| prefix == *r || prefix.starts_with(&format!("{r}/")))
    {
        return Err(invalid(&prefix, "prefix is reserved by the gateway"));
    }
    if spec.service.trim().is_empty() {
        return Err(invalid(&prefix, "service name must not be empty"));
    }

    let raw_target = target_override.unwrap_or(&spec.target);
    let target = parse_target(raw_target).map_err(|reason| invalid(&prefix, reason))?;

    let rewrite = match spec.rewrite {
        None => Rewrite::Strip,
        Some(RewriteSpec::Keyword(k)) if k == "strip" => Rewrite::Strip,
        Some(RewriteSpec::Keyword(k)) if k == "preserve" => Rewrite::Preserve,
        Some(RewriteSpec::Keyword(k)) => {
            return Err(invalid(&prefix, format!("unknown rewrite \"{k}\"")));
        }
        Some(RewriteSpec::Replace(ReplaceSpec { replace })) => {
            if !replace.starts_with('/') || (replace.len() > 1 && replace.ends_with('/')) {
                return Err(invalid(
                    &prefix,
                    "replacement prefix must start with '/' and must not end with '/'",
                ));
            }
            Rewrite::Replace(replace)
        }
    };

    let access = compile_access(spec.access).map_err(|reason| invalid(&prefix, reason))?;
    if let Access::SelfOrAdmin { .. } = access {
        return Err(invalid(
            &prefix,
            "self_or_admin needs a path parameter and is only valid on a policy",
        ));
    }

    let mut policies: Vec<RoutePolicy> = Vec::with_capacity(spec.policies.len());
    for policy in spec.policies {
        let compiled = compile_policy(policy).map_err(|reason| invalid(&prefix, reason))?;
        if let Some(clash) = policies
            .iter()
            .find(|p| p.pattern == compiled.pattern && methods_overlap(&p.methods, &compiled.methods))
        {
            return Err(invalid(
                &prefix,
                format!("duplicate policy for {} on overlapping methods", clash.pattern),
            ));
        }
        policies.push(compiled);
    }

    Ok(RouteRule {
        prefix,
        service: spec.service,
        target,
        rewrite,
        access,
        policies,
    })
}

fn parse_target(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid target URL \"{raw}\": {e}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(format!("target URL \"{raw}\" must be http(s) with a host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(format!("target URL \"{raw}\" must not have a query or fragment"));
    }
    Ok(url)
}

fn compile_access(spec: AccessSpec) -> Result<Access, String> {
    match spec {
        AccessSpec::Keyword(k) if k == "public" => Ok(Access::Public),
        AccessSpec::Keyword(k) if k == "authenticated" => Ok(Access::Authenticated),
        AccessSpec::Keyword(k) => Err(format!("unknown access \"{k}\"")),
        AccessSpec::Roles(RolesSpec { roles }) => {
            if roles.is_empty() {
                return Err("role set must not be empty".into());
            }
            let roles = roles
                .iter()
                .map(|r| r.parse::<Role>().map_err(|e| e.to_string()))
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(Access::Roles(roles))
        }
        AccessSpec::SelfOrAdmin(SelfOrAdminSpec { self_or_admin }) => {
            if self_or_admin.trim().is_empty() {
                return Err("self_or_admin parameter must not be empty".into());
            }
            Ok(Access::SelfOrAdmin {
                param: self_or_admin,
            })
        }
    }
}

fn compile_policy(spec: PolicySpec) -> Result<RoutePolicy, String> {
    if !spec.path.starts_with('/') {
        return Err(format!("policy path \"{}\" must start with '/'", spec.path));
    }
    let pattern = match spec.path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => spec.path,
    };

    // Requests are matched in canonical form, so a literal segment that is
    // not already canonical could never match.
    if let Some(segment) = pattern
        .split('/')
        .filter(|s| !s.starts_with('{'))
        .find(|s| *s == "." || *s == ".." || urlencoding::encode(s) != *s)
    {
        return Err(format!(
            "policy {pattern}: segment \"{segment}\" is not in canonical form"
        ));
    }

    let methods = match spec.methods {
        None => None,
        Some(names) if names.is_empty() => {
            return Err(format!("policy {pattern}: methods must not be empty when given"));
        }
        Some(names) => Some(
            names
                .iter()
                .map(|name| {
                    KNOWN_METHODS
                        .iter()
                        .find(|m| m.as_str().eq_ignore_ascii_case(name))
                        .cloned()
                        .ok_or_else(|| format!("policy {pattern}: invalid method \"{name}\""))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };

    let access = compile_access(spec.access).map_err(|e| format!("policy {pattern}: {e}"))?;
    if let Access::SelfOrAdmin { param } = &access {
        let plain = format!("{{{param}}}");
        let catch_all = format!("{{*{param}}}");
        if !pattern.contains(&plain) && !pattern.contains(&catch_all) {
            return Err(format!(
                "policy {pattern}: self_or_admin parameter \"{param}\" is not in the path"
            ));
        }
    }

    let mut matcher = matchit::Router::new();
    matcher
        .insert(pattern.clone(), ())
        .map_err(|e| format!("policy {pattern}: {e}"))?;

    Ok(RoutePolicy {
        pattern,
        methods,
        access,
        matcher,
    })
}

fn methods_overlap(a: &Option<Vec<Method>>, b: &Option<Vec<Method>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.iter().any(|m| b.contains(m)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
routes:
  - prefix: /catalog
    service: catalog
    target: http://catalog.internal:4001
    access: public
    policies:
      - path: /products
        methods: [POST]
        access: { roles: [admin] }
      - path: /products/{id}
        methods: [PUT, DELETE]
        access: { roles: [admin] }
  - prefix: /staff
    service: staff
    target: http://staff.internal:4002
    access: { roles: [admin] }
    policies:
      - path: /{id}
        methods: [GET, PUT]
        access: { self_or_admin: id }
  - prefix: /orders
    service: orders
    target: http://orders.internal:4004
    access: authenticated
  - prefix: /orders/archive
    service: archive
    target: http://archive.internal:4010/v1
    rewrite: { replace: /archived-orders }
    access: { roles: [admin, sales-staff] }
  - prefix: /auth
    service: auth
    target: http://auth.internal:4000
    rewrite: preserve
    access: public
"#;

    fn table() -> RouteTable {
        RouteTable::from_yaml(TABLE).unwrap()
    }

    fn route_err(yaml: &str) -> String {
        match RouteTable::from_yaml(yaml) {
            Err(ConfigError::InvalidRoute { reason, .. }) => reason,
            Err(other) => other.to_string(),
            Ok(_) => panic!("expected route table to be rejected"),
        }
    }

    #[test]
    fn strip_removes_prefix_once() {
        let t = table();
        let m = t.match_path("/catalog/products/42").unwrap();
        assert_eq!(m.rule.service, "catalog");
        assert_eq!(m.upstream_path(), "/products/42");

        let m = t.match_path("/catalog/catalog/x").unwrap();
        assert_eq!(m.upstream_path(), "/catalog/x");

        let m = t.match_path("/catalog").unwrap();
        assert_eq!(m.upstream_path(), "/");
    }

    #[test]
    fn longest_prefix_wins() {
        let t = table();
        let m = t.match_path("/orders/archive/2024").unwrap();
        assert_eq!(m.rule.service, "archive");
        assert_eq!(m.upstream_path(), "/archived-orders/2024");

        let m = t.match_path("/orders/123").unwrap();
        assert_eq!(m.rule.service, "orders");
    }

    #[test]
    fn prefix_matches_on_segment_boundary() {
        let t = table();
        assert!(t.match_path("/ordersx").is_none());
        assert!(t.match_path("/").is_none());
        assert!(t.match_path("/unknown/path").is_none());
    }

    #[test]
    fn preserve_keeps_full_path() {
        let t = table();
        let m = t.match_path("/auth/login").unwrap();
        assert_eq!(m.upstream_path(), "/auth/login");
    }

    #[test]
    fn policy_overrides_rule_access_by_method() {
        let t = table();
        let m = t.match_path("/catalog/products").unwrap();
        assert!(matches!(m.access(&Method::POST).0, Access::Roles(_)));
        assert_eq!(m.access(&Method::GET).0, &Access::Public);

        let m = t.match_path("/catalog/products/").unwrap();
        assert!(matches!(m.access(&Method::POST).0, Access::Roles(_)));
    }

    #[test]
    fn policy_captures_params() {
        let t = table();
        let m = t.match_path("/staff/tech-9").unwrap();
        let (access, params) = m.access(&Method::GET);
        assert_eq!(access, &Access::SelfOrAdmin { param: "id".into() });
        assert_eq!(params.get("id").map(String::as_str), Some("tech-9"));

        let (access, _) = m.access(&Method::DELETE);
        assert!(matches!(access, Access::Roles(_)));
    }

    #[test]
    fn target_override_from_lookup() {
        let t = RouteTable::from_yaml_with(TABLE, |var| {
            (var == "CATALOG_SERVICE_URL").then(|| "http://127.0.0.1:9999".to_string())
        })
        .unwrap();
        let m = t.match_path("/catalog").unwrap();
        assert_eq!(m.rule.target.as_str(), "http://127.0.0.1:9999/");
    }

    #[test]
    fn service_env_var_names() {
        assert_eq!(service_env_var("catalog"), "CATALOG_SERVICE_URL");
        assert_eq!(service_env_var("repair-shop"), "REPAIR_SHOP_SERVICE_URL");
    }

    #[test]
    fn canonical_path_collapses_and_resolves() {
        assert_eq!(canonical_path("//catalog///products").unwrap(), "/catalog/products");
        assert_eq!(canonical_path("/catalog/./products/").unwrap(), "/catalog/products/");
        assert_eq!(canonical_path("/staff/../catalog/x").unwrap(), "/catalog/x");
        assert_eq!(canonical_path("/../../etc").unwrap(), "/etc");
        assert_eq!(canonical_path("/").unwrap(), "/");
    }

    #[test]
    fn canonical_path_decodes_and_reencodes() {
        assert_eq!(canonical_path("/catalog/%70roducts").unwrap(), "/catalog/products");
        assert_eq!(canonical_path("/catalog/%7Eitem").unwrap(), "/catalog/~item");
        assert_eq!(canonical_path("/catalog/x/%2E%2E/products").unwrap(), "/catalog/products");
        assert_eq!(canonical_path("//catalog/./products/").unwrap(), "/catalog/products/");
        assert_eq!(canonical_path("/staff/a%40b").unwrap(), "/staff/a%40b");
        assert_eq!(canonical_path("/staff/a@b").unwrap(), "/staff/a%40b");
        assert_eq!(canonical_path("/search/red%20kettle").unwrap(), "/search/red%20kettle");
        assert_eq!(canonical_path("").unwrap(), "/");
    }

    #[test]
    fn canonical_path_rejects_embedded_separators() {
        assert_eq!(
            canonical_path("/catalog/a%2Fb"),
            Err(PathError::EmbeddedSeparator("a/b".into()))
        );
        assert!(canonical_path("/catalog/a%5cb").is_err());
        assert_eq!(canonical_path("/catalog/a%00b"), Err(PathError::ControlCharacter));
        assert_eq!(canonical_path("/catalog/%ff"), Err(PathError::InvalidUtf8));
    }

    #[test]
    fn self_or_admin_param_is_decoded() {
        let yaml = r#"
routes:
  - prefix: /staff
    service: staff
    target: "http://staff:1"
    access: { roles: [admin] }
    policies:
      - path: /{id}
        access: { self_or_admin: id }
"#;
        let table = RouteTable::from_yaml(yaml).unwrap();
        let path = canonical_path("/staff/a@b").unwrap();
        let matched = table.match_path(&path).unwrap();
        let (_, params) = matched.access(&Method::GET);
        assert_eq!(params.get("id").map(String::as_str), Some("a@b"));
    }

    #[test]
    fn rejects_non_canonical_policy_segment() {
        let yaml = r#"
routes:
  - prefix: /catalog
    service: catalog
    target: "http://catalog:1"
    access: public
    policies:
      - path: /%70roducts
        access: { roles: [admin] }
"#;
        assert!(route_err(yaml).contains("canonical"));
    }

    #[test]
    fn rejects_duplicate_prefix() {
        let yaml = r#"
routes:
  - { prefix: /a, service: a, target: "http://a", access: public }
  - { prefix: /a, service: b, target: "http://b", access: public }
"#;
        assert_eq!(route_err(yaml), "duplicate prefix");
    }

    #[test]
    fn rejects_trailing_slash_prefix() {
        let yaml = r#"
routes:
  - { prefix: /a/, service: a, target: "http://a", access: public }
"#;
        assert!(route_err(yaml).contains("must not end with '/'"));
    }

    #[test]
    fn rejects_reserved_prefix() {
        let yaml = r#"
routes:
  - { prefix: /health, service: a, target: "http://a", access: public }
"#;
        assert!(route_err(yaml).contains("reserved"));
    }

    #[test]
    fn rejects_empty_role_set() {
        let yaml = r#"
routes:
  - { prefix: /a, service: a, target: "http://a", access: { roles: [] } }
"#;
        assert!(route_err(yaml).contains("must not be empty"));
    }

    #[test]
    fn rejects_unknown_role() {
        let yaml = r#"
routes:
  - { prefix: /a, service: a, target: "http://a", access: { roles: [wizard] } }
"#;
        assert!(route_err(yaml).contains("unknown role"));
    }

    #[test]
    fn rejects_missing_access() {
        let yaml = r#"
routes:
  - { prefix: /a, service: a, target: "http://a" }
"#;
        assert!(matches!(
            RouteTable::from_yaml(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_self_or_admin_without_param_in_path() {
        let yaml = r#"
routes:
  - prefix: /staff
    service: staff
    target: "http://staff"
    access: authenticated
    policies:
      - path: /{id}
        access: { self_or_admin: user }
"#;
        assert!(route_err(yaml).contains("not in the path"));
    }

    #[test]
    fn rejects_rule_level_self_or_admin() {
        let yaml = r#"
routes:
  - { prefix: /staff, service: staff, target: "http://staff", access: { self_or_admin: id } }
"#;
        assert!(route_err(yaml).contains("only valid on a policy"));
    }

    #[test]
    fn rejects_invalid_method() {
        let yaml = r#"
routes:
  - prefix: /a
    service: a
    target: "http://a"
    access: public
    policies:
      - { path: /x, methods: [FETCH], access: authenticated }
"#;
        assert!(route_err(yaml).contains("invalid method"));
    }

    #[test]
    fn rejects_duplicate_policy() {
        let yaml = r#"
routes:
  - prefix: /a
    service: a
    target: "http://a"
    access: public
    policies:
      - { path: /x, methods: [GET, POST], access: authenticated }
      - { path: /x, methods: [POST], access: { roles: [admin] } }
"#;
        assert!(route_err(yaml).contains("duplicate policy"));
    }

    #[test]
    fn allows_same_path_on_disjoint_methods() {
        let yaml = r#"
routes:
  - prefix: /a
    service: a
    target: "http://a"
    access: public
    policies:
      - { path: /x, methods: [GET], access: authenticated }
      - { path: /x, methods: [POST], access: { roles: [admin] } }
"#;
        assert!(RouteTable::from_yaml(yaml).is_ok());
    }

    #[test]
    fn rejects_bad_target() {
        let yaml = r#"
routes:
  - { prefix: /a, service: a, target: "ftp://a", access: public }
"#;
        assert!(route_err(yaml).contains("http(s)"));
        let yaml = r#"
routes:
  - { prefix: /a, service: a, target: "not a url", access: public }
"#;
        assert!(route_err(yaml).contains("invalid target URL"));
    }

    #[test]
    fn rejects_empty_table() {
        assert!(matches!(
            RouteTable::from_yaml("routes: []"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn bundled_table_is_valid() {
        let t = RouteTable::from_yaml(crate::config::DEFAULT_ROUTES).unwrap();
        for prefix in ["/auth", "/catalog", "/staff", "/orders", "/payments", "/support"] {
            assert!(t.match_path(prefix).is_some(), "{prefix} missing");
        }
    }
}
