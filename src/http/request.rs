//! Inbound request helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every request
//! - Extract the tenant hostname (X-Forwarded-Host, then Host)

use axum::http::{header, HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of `headers`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Hostname the client asked for, without port.
///
/// `X-Forwarded-Host` (first entry) wins over `Host`, so the gateway can sit
/// behind a TLS-terminating load balancer. Falls back to the URI authority
/// for HTTP/2 requests that carry no Host header.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let raw = [X_FORWARDED_HOST, header::HOST.as_str()]
        .iter()
        .find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))?;

    let host = strip_port(&raw);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn strip_port(authority: &str) -> &str {
    // Bracketed IPv6 literal: keep the brackets, drop the port.
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    authority.split(':').next().unwrap_or(authority)
}
