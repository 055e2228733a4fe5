//! Backend selection for a tenant request.

use crate::config::RoutingConfig;
use crate::tenants::Domain;

/// Which backend a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Imager,
    Diagnostics,
    ImageTransform,
    Sitemap,
    DnsProbe,
    Cms,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Imager => "imager",
            Backend::Diagnostics => "diagnostics",
            Backend::ImageTransform => "image_transform",
            Backend::Sitemap => "sitemap",
            Backend::DnsProbe => "dns_probe",
            Backend::Cms => "cms",
        }
    }
}

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub backend: Backend,
    /// Backend base URL (scheme, host, optional port).
    pub base_url: String,
    /// Path and query to request from the backend.
    pub path_and_query: String,
    /// Host header to send instead of the one derived from `base_url`.
    pub host_override: Option<String>,
    /// Media and probe responses must pass through untouched.
    pub forbid_rewrite: bool,
}

impl RouteTarget {
    /// Full outbound URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path_and_query)
    }
}

/// Routes requests using fixed prefixes plus per-tenant backend URLs.
#[derive(Debug, Clone)]
pub struct Router {
    config: RoutingConfig,
}

impl Router {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Pick the backend for `path`. First match wins:
    ///
    /// 1. `/posts/`, `/fotos/` → imager
    /// 2. diagnostics prefix → diagnostics backend
    /// 3. image transform prefix → transform backend, `w`/`h` renamed
    /// 4. `/sitemap` → sitemap
    /// 5. DNS probe path (exact) → DNS backend
    /// 6. anything else → CMS with the private Host
    pub fn route(&self, domain: &Domain, path: &str, path_and_query: &str) -> RouteTarget {
        let passthrough = |backend: Backend, base_url: &str| RouteTarget {
            backend,
            base_url: base_url.to_string(),
            path_and_query: path_and_query.to_string(),
            host_override: None,
            forbid_rewrite: true,
        };

        if path.starts_with("/posts/") || path.starts_with("/fotos/") {
            return passthrough(Backend::Imager, &domain.service_imager);
        }

        if path.starts_with(&self.config.diagnostics_prefix) {
            return passthrough(Backend::Diagnostics, &self.config.diagnostics_backend);
        }

        if path.starts_with(&self.config.image_transform_prefix) {
            let mut target = passthrough(Backend::ImageTransform, &self.config.image_transform_backend);
            target.path_and_query = translate_image_query(path_and_query);
            return target;
        }

        if path.starts_with("/sitemap") {
            return passthrough(Backend::Sitemap, &domain.service_sitemap);
        }

        if path == self.config.dns_probe_path {
            return passthrough(Backend::DnsProbe, &domain.service_dns);
        }

        RouteTarget {
            backend: Backend::Cms,
            base_url: domain.service_dle.clone(),
            path_and_query: path_and_query.to_string(),
            host_override: Some(domain.host_private.clone()),
            forbid_rewrite: false,
        }
    }
}

/// Rename the short `w`/`h` query parameters to `width`/`height`, both as
/// the first parameter and as later `&`-joined ones.
pub fn translate_image_query(path_and_query: &str) -> String {
    let Some((path, query)) = path_and_query.split_once('?') else {
        return path_and_query.to_string();
    };
    let query = format!("?{}", query)
        .replace("?w=", "?width=")
        .replace("&w=", "&width=")
        .replace("?h=", "?height=")
        .replace("&h=", "&height=");
    format!("{}{}", path, query)
}
