//! Tenant configuration rows as loaded from the store.

use serde::{Deserialize, Serialize};

/// One public site served by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Domain {
    pub id: i64,
    pub title: String,
    /// Canonical public hostname (no scheme, no port).
    pub host_public: String,
    /// Hostname the CMS backend is virtual-hosted under.
    pub host_private: String,
    pub skin: String,
    pub service_dle: String,
    pub service_imager: String,
    pub service_sitemap: String,
    pub service_dns: String,
    pub news_number: i64,
    /// Public port, empty when the scheme default applies.
    pub port_public: String,
    pub scheme_public: String,
    pub disallow_robots: bool,
}

impl Domain {
    /// Public host with the port appended when one is configured.
    pub fn public_authority(&self) -> String {
        if self.port_public.is_empty() {
            self.host_public.clone()
        } else {
            format!("{}:{}", self.host_public, self.port_public)
        }
    }

    /// Reconstructed public origin, e.g. `https://example.com:8443`.
    pub fn public_origin(&self) -> String {
        let scheme = if self.scheme_public.is_empty() {
            "https"
        } else {
            self.scheme_public.as_str()
        };
        format!("{}://{}", scheme, self.public_authority())
    }
}

/// Alternate hostname that redirects to its owning domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DomainAlias {
    pub domain_id: i64,
    pub host: String,
}

/// Static file served verbatim for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DomainFile {
    pub id: i64,
    pub domain_id: i64,
    /// Stored without leading or trailing slashes.
    pub path: String,
    pub content_type: String,
    pub body: String,
}

/// What to do with a post URL whose slug is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(from = "i64", into = "i64")]
pub enum RedirectPolicy {
    /// Answer 451 with an empty body.
    #[default]
    Deny,
    /// Permanent redirect to the canonical slug.
    Redirect,
}

impl From<i64> for RedirectPolicy {
    fn from(value: i64) -> Self {
        if value == 1 {
            RedirectPolicy::Redirect
        } else {
            RedirectPolicy::Deny
        }
    }
}

impl From<RedirectPolicy> for i64 {
    fn from(value: RedirectPolicy) -> Self {
        match value {
            RedirectPolicy::Deny => 0,
            RedirectPolicy::Redirect => 1,
        }
    }
}

/// Slug override rule for one CMS post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PostOverride {
    pub id: i64,
    pub domain_id: i64,
    pub post_id: u64,
    pub alt_name: String,
    pub approve: bool,
    pub redirect: RedirectPolicy,
}
