//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0, request deadline
//!   longer than the upstream deadline)
//! - Check addresses and backend URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{GatewayConfig, StoreKind};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{}'", value)));
    }
}

fn check_backend(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
        _ => errors.push(ValidationError::new(field, format!("invalid backend URL '{}'", value))),
    }
}

fn check_prefix(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::new(field, "must start with '/'"));
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    match config.store.kind {
        StoreKind::Mysql if config.store.database_url.is_empty() => {
            errors.push(ValidationError::new("store.database_url", "required for mysql store"));
        }
        StoreKind::Fixture if config.store.fixture_path.is_empty() => {
            errors.push(ValidationError::new("store.fixture_path", "required for fixture store"));
        }
        _ => {}
    }
    if config.store.max_connections == 0 {
        errors.push(ValidationError::new("store.max_connections", "must be > 0"));
    }

    if config.refresh.interval_secs == 0 {
        errors.push(ValidationError::new("refresh.interval_secs", "must be > 0"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    } else if config.timeouts.request_secs <= config.timeouts.upstream_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than timeouts.upstream_secs",
        ));
    }

    let routing = &config.routing;
    check_prefix(&mut errors, "routing.diagnostics_prefix", &routing.diagnostics_prefix);
    check_prefix(&mut errors, "routing.image_transform_prefix", &routing.image_transform_prefix);
    check_prefix(&mut errors, "routing.dns_probe_path", &routing.dns_probe_path);
    check_backend(&mut errors, "routing.diagnostics_backend", &routing.diagnostics_backend);
    check_backend(&mut errors, "routing.image_transform_backend", &routing.image_transform_backend);

    if config.rewrite.max_body_bytes == 0 {
        errors.push(ValidationError::new("rewrite.max_body_bytes", "must be > 0"));
    }

    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
