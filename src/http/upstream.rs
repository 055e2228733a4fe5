//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the outbound request (method, body stream, target URL)
//! - Apply the header copy policy
//! - Issue the request once, under a deadline, and buffer the response body
//!
//! # Header policy
//! - hop-by-hop headers and the inbound Host are dropped
//! - `Accept-Encoding` is sent empty so the backend answers uncompressed
//! - `Referer` gets the public host swapped for the private one
//! - everything else is copied, duplicates included
//! - `X-Domain-Id`, `X-Domain-Host`, `X-Domain-Skin` are added

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, response, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::resilience::timeouts::with_deadline;
use crate::routing::RouteTarget;
use crate::tenants::Domain;

pub const X_DOMAIN_ID: &str = "x-domain-id";
pub const X_DOMAIN_HOST: &str = "x-domain-host";
pub const X_DOMAIN_SKIN: &str = "x-domain-skin";

/// True for headers that only make sense on a single transport leg.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Headers to send upstream for a request to `domain` received as
/// `public_host`.
pub fn upstream_headers(inbound: &HeaderMap, domain: &Domain, public_host: &str) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len() + 3);

    for (name, value) in inbound.iter() {
        if is_hop_by_hop(name) || name == header::HOST {
            continue;
        }
        if name == header::ACCEPT_ENCODING {
            out.append(header::ACCEPT_ENCODING, HeaderValue::from_static(""));
            continue;
        }
        if name == header::REFERER && !public_host.is_empty() {
            let swapped = value
                .to_str()
                .ok()
                .map(|v| v.replace(public_host, &domain.host_private))
                .and_then(|v| HeaderValue::from_str(&v).ok());
            out.append(header::REFERER, swapped.unwrap_or_else(|| value.clone()));
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    let tags = [
        (X_DOMAIN_ID, domain.id.to_string()),
        (X_DOMAIN_HOST, domain.host_public.clone()),
        (X_DOMAIN_SKIN, domain.skin.clone()),
    ];
    for (name, value) in tags {
        match HeaderValue::from_str(&value) {
            Ok(v) => {
                out.append(name, v);
            }
            Err(_) => tracing::warn!(header = name, domain_id = domain.id, "Skipping invalid tenant header"),
        }
    }

    out
}

/// Build the outbound request. Fails when the target URL is not an absolute
/// http(s) URL.
pub fn build_upstream_request(
    method: &Method,
    inbound_headers: &HeaderMap,
    body: Body,
    target: &RouteTarget,
    domain: &Domain,
    public_host: &str,
) -> Result<Request<Body>, GatewayError> {
    let url = target.url();
    let uri: Uri = url
        .parse()
        .map_err(|e| GatewayError::UpstreamRequest(format!("{}: {}", url, e)))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(GatewayError::UpstreamRequest(format!("{}: not an absolute URL", url)));
    }

    let mut headers = upstream_headers(inbound_headers, domain, public_host);
    if let Some(host) = &target.host_override {
        let value = HeaderValue::from_str(host)
            .map_err(|e| GatewayError::UpstreamRequest(format!("host {}: {}", host, e)))?;
        headers.insert(header::HOST, value);
    }

    let mut request = Request::new(body);
    *request.method_mut() = method.clone();
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Shared outbound client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    deadline: Duration,
    max_body_bytes: usize,
}

impl Forwarder {
    pub fn new(connect_timeout: Duration, deadline: Duration, max_body_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            deadline,
            max_body_bytes,
        }
    }

    /// Send `request` once and read the whole response body. The deadline
    /// covers both the round trip and the body read.
    pub async fn forward(&self, request: Request<Body>) -> Result<(response::Parts, Bytes), GatewayError> {
        with_deadline(self.deadline, async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| GatewayError::Upstream(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(|e| GatewayError::UpstreamBody(e.to_string()))?;
            Ok((parts, bytes))
        })
        .await
    }
}
