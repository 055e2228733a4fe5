//! Request-path error type.
//!
//! Client-facing bodies are generic; the detail carried by each variant is
//! for the operational log only.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no Host header")]
    MissingHost,

    #[error("domain [{0}] not found")]
    UnknownHost(String),

    #[error("cannot build upstream request: {0}")]
    UpstreamRequest(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("upstream body read failed: {0}")]
    UpstreamBody(String),

    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingHost => StatusCode::BAD_REQUEST,
            GatewayError::UnknownHost(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(_) | GatewayError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingHost => "missing_host",
            GatewayError::UnknownHost(_) => "unknown_host",
            GatewayError::UpstreamRequest(_) => "request",
            GatewayError::Upstream(_) => "connect",
            GatewayError::UpstreamBody(_) => "body",
            GatewayError::UpstreamTimeout(_) => "timeout",
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            GatewayError::MissingHost => "Bad request",
            GatewayError::UnknownHost(_) => "Unknown host",
            GatewayError::UpstreamRequest(_) => "Error creating proxy request",
            GatewayError::Upstream(_) | GatewayError::UpstreamBody(_) => "Proxy error",
            GatewayError::UpstreamTimeout(_) => "Upstream timeout",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}
