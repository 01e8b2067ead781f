//! # Gateway Dispatcher
//!
//! The fallback handler behind every path except the health endpoints:
//!
//! ```text
//! canonical path → match route → authenticate → resolve role → decide → forward
//! ```
//!
//! Forwarding buffers the request body (bounded by `max_body_bytes`), sends
//! it with the same method and headers minus hop-by-hop ones and `Host`, and
//! relays the backend's status, headers and body. Calls are never retried.
//! If the client disconnects, the handler future is dropped and the in-flight
//! backend call is dropped with it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::Method;
use axum::response::Response;
use url::Url;

use bazaar_auth::{authenticate, bearer_token, AuthError, Identity, RoleResolver, TokenVerifier};

use crate::error::GatewayError;
use crate::policy::{decide, Decision};
use crate::routes::{canonical_path, RouteMatch, RouteTable};
use crate::telemetry;

/// Subject id of the authenticated caller, set by the gateway for backends.
pub const SUBJECT_HEADER: &str = "x-bazaar-subject";
/// Resolved role of the authenticated caller.
pub const ROLE_HEADER: &str = "x-bazaar-role";

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Shared, read-only dispatcher state.
#[derive(Clone)]
pub struct GatewayState {
    pub routes: Arc<RouteTable>,
    pub verifier: Arc<TokenVerifier>,
    pub resolver: Arc<dyn RoleResolver>,
    pub http: reqwest::Client,
    pub max_body_bytes: usize,
    pub prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(
        routes: RouteTable,
        verifier: TokenVerifier,
        resolver: Arc<dyn RoleResolver>,
        upstream_timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            routes: Arc::new(routes),
            verifier: Arc::new(verifier),
            resolver,
            http,
            max_body_bytes,
            prometheus: None,
        })
    }

    pub fn with_prometheus(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

/// Route, authorize and forward one request.
pub async fn dispatch(
    State(state): State<GatewayState>,
    request: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();
    let path = match canonical_path(parts.uri.path()) {
        Ok(path) => path,
        Err(e) => {
            telemetry::record_request("none", "rejected");
            return Err(e.into());
        }
    };

    let Some(route) = state.routes.match_path(&path) else {
        telemetry::record_request("none", "no_route");
        return Err(GatewayError::NoRoute(path));
    };
    let service = route.rule.service.clone();

    let result = authorize_and_forward(&state, &route, parts, body).await;
    let outcome = match &result {
        Ok(_) => "forwarded",
        Err(GatewayError::Upstream { .. }) => "upstream_error",
        Err(_) => "rejected",
    };
    telemetry::record_request(&service, outcome);
    result
}

async fn authorize_and_forward(
    state: &GatewayState,
    route: &RouteMatch<'_>,
    mut parts: Parts,
    body: Body,
) -> Result<Response, GatewayError> {
    let (access, params) = route.access(&parts.method);
    let token = bearer_token(
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    );

    let identity = if access.is_public() {
        match token {
            None => None,
            Some(_) => match authenticate(&state.verifier, state.resolver.as_ref(), token).await {
                Ok(identity) => Some(identity),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unusable credential on public route");
                    None
                }
            },
        }
    } else {
        Some(authenticate(&state.verifier, state.resolver.as_ref(), token).await?)
    };

    match decide(access, identity.as_ref(), &params) {
        Decision::Allow => {}
        Decision::Unauthenticated => return Err(AuthError::MissingToken.into()),
        Decision::Deny(reason) => {
            tracing::info!(
                route = %route.rule.prefix,
                subject = identity.as_ref().map(|i| i.subject.as_str()).unwrap_or("-"),
                %access,
                "access denied"
            );
            return Err(GatewayError::Denied(reason));
        }
    }

    if let Some(identity) = &identity {
        parts.extensions.insert(identity.clone());
    }
    forward(state, route, parts, body, identity.as_ref()).await
}

async fn forward(
    state: &GatewayState,
    route: &RouteMatch<'_>,
    parts: Parts,
    body: Body,
    identity: Option<&Identity>,
) -> Result<Response, GatewayError> {
    let service = &route.rule.service;
    let too_large = || {
        GatewayError::InvalidRequest(format!(
            "request body exceeds {} bytes",
            state.max_body_bytes
        ))
    };
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.max_body_bytes) {
        return Err(too_large());
    }
    let bytes = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| too_large())?;

    let url = upstream_url(&route.rule.target, &route.upstream_path(), parts.uri.query());
    let mut headers = strip_hop_by_hop(&parts.headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(SUBJECT_HEADER);
    headers.remove(ROLE_HEADER);
    if let Some(identity) = identity {
        if let Ok(subject) = HeaderValue::from_str(identity.subject.as_str()) {
            headers.insert(SUBJECT_HEADER, subject);
        }
        headers.insert(ROLE_HEADER, HeaderValue::from_static(identity.role.as_str()));
    }

    tracing::debug!(service = %service, method = %parts.method, upstream = %url, "forwarding");

    let mut outbound = state.http.request(parts.method.clone(), url).headers(headers);
    if !bytes.is_empty() {
        outbound = outbound.body(bytes);
    }

    let started = Instant::now();
    let upstream_err = |e: reqwest::Error| {
        telemetry::record_upstream_failure(service);
        let reason = if e.is_timeout() {
            "timed out".to_string()
        } else {
            e.to_string()
        };
        GatewayError::Upstream {
            service: service.clone(),
            reason,
        }
    };
    let resp = outbound.send().await.map_err(upstream_err)?;
    let status = resp.status();
    let mut relay_headers = strip_hop_by_hop(resp.headers());
    let body: Bytes = resp.bytes().await.map_err(upstream_err)?;
    telemetry::record_upstream_latency(service, started.elapsed());

    if parts.method != Method::HEAD {
        relay_headers.remove(header::CONTENT_LENGTH);
    }
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = relay_headers;
    Ok(response)
}

/// Join the target's base path with the rewritten path and carry the query.
pub fn upstream_url(target: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = target.clone();
    let base = target.path().trim_end_matches('/');
    url.set_path(&format!("{base}{path}"));
    url.set_query(query);
    url
}

/// Copy headers, dropping hop-by-hop ones and any named in `Connection`.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(name) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
