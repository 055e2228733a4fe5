//! Hostname → tenant resolution.

use std::sync::Arc;

use crate::snapshot::SnapshotCache;
use crate::tenants::types::{Domain, DomainAlias};

pub type DomainCache = SnapshotCache<Vec<Domain>>;
pub type AliasCache = SnapshotCache<Vec<DomainAlias>>;

/// Resolves request hostnames against the domain and alias snapshots.
///
/// Lookups are linear scans over the pinned snapshot. Matching is exact and
/// case-sensitive; callers strip the port before asking.
#[derive(Clone)]
pub struct TenantDirectory {
    domains: Arc<DomainCache>,
    aliases: Arc<AliasCache>,
}

impl TenantDirectory {
    pub fn new(domains: Arc<DomainCache>, aliases: Arc<AliasCache>) -> Self {
        Self { domains, aliases }
    }

    pub fn domains(&self) -> &Arc<DomainCache> {
        &self.domains
    }

    pub fn aliases(&self) -> &Arc<AliasCache> {
        &self.aliases
    }

    /// Tenant whose public host is exactly `host`.
    pub fn resolve(&self, host: &str) -> Option<Domain> {
        self.domains
            .load()
            .iter()
            .find(|d| d.host_public == host)
            .cloned()
    }

    /// Alias entry for `host`, if it is an alternate hostname.
    pub fn resolve_alias(&self, host: &str) -> Option<DomainAlias> {
        self.aliases
            .load()
            .iter()
            .find(|a| a.host == host)
            .cloned()
    }

    pub fn resolve_by_id(&self, id: i64) -> Option<Domain> {
        self.domains.load().iter().find(|d| d.id == id).cloned()
    }

    /// Owning domain of an alias host. `None` when the host is not an alias
    /// or its domain no longer exists.
    pub fn alias_target(&self, host: &str) -> Option<Domain> {
        let alias = self.resolve_alias(host)?;
        let domain = self.resolve_by_id(alias.domain_id);
        if domain.is_none() {
            tracing::warn!(host, domain_id = alias.domain_id, "Alias points at unknown domain");
        }
        domain
    }

    /// Every tenant in the current snapshot.
    pub fn all(&self) -> Arc<Vec<Domain>> {
        self.domains.snapshot()
    }
}
