//! In-memory tenant store.
//!
//! Serves rows from process memory, optionally seeded from a JSON fixture
//! file. Used for local development without a database and by the tests,
//! which can swap the rows or make every fetch fail.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::store::{SnapshotSource, StoreError};
use crate::tenants::types::{Domain, DomainAlias, DomainFile, PostOverride};

/// Complete data set of the four tenant tables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Fixture {
    pub domains: Vec<Domain>,
    pub aliases: Vec<DomainAlias>,
    pub files: Vec<DomainFile>,
    pub posts: Vec<PostOverride>,
}

impl Fixture {
    /// Read a fixture from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Fixture>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            data: RwLock::new(fixture),
            failing: AtomicBool::new(false),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let fixture = Fixture::from_file(path)?;
        tracing::info!(
            path = %path.display(),
            domains = fixture.domains.len(),
            aliases = fixture.aliases.len(),
            files = fixture.files.len(),
            posts = fixture.posts.len(),
            "Fixture store loaded"
        );
        Ok(Self::new(fixture))
    }

    /// Replace every table at once.
    pub fn replace(&self, fixture: Fixture) {
        match self.data.write() {
            Ok(mut guard) => *guard = fixture,
            Err(poisoned) => *poisoned.into_inner() = fixture,
        }
    }

    /// While set, every fetch fails as if the database were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn read<T: Clone>(&self, pick: impl FnOnce(&Fixture) -> &Vec<T>) -> Result<Vec<T>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        let guard = self
            .data
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(pick(&guard).clone())
    }
}

impl SnapshotSource<Domain> for MemoryStore {
    async fn fetch_all(&self) -> Result<Vec<Domain>, StoreError> {
        self.read(|f| &f.domains)
    }
}

impl SnapshotSource<DomainAlias> for MemoryStore {
    async fn fetch_all(&self) -> Result<Vec<DomainAlias>, StoreError> {
        self.read(|f| &f.aliases)
    }
}

impl SnapshotSource<DomainFile> for MemoryStore {
    async fn fetch_all(&self) -> Result<Vec<DomainFile>, StoreError> {
        self.read(|f| &f.files)
    }
}

impl SnapshotSource<PostOverride> for MemoryStore {
    async fn fetch_all(&self) -> Result<Vec<PostOverride>, StoreError> {
        self.read(|f| &f.posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_and_fail() {
        let store = MemoryStore::new(Fixture {
            domains: vec![Domain {
                id: 1,
                host_public: "a.example".into(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let domains = SnapshotSource::<Domain>::fetch_all(&store).await.unwrap();
        assert_eq!(domains.len(), 1);

        store.set_failing(true);
        let res = SnapshotSource::<Domain>::fetch_all(&store).await;
        assert!(matches!(res, Err(StoreError::Unavailable(_))));

        store.set_failing(false);
        store.replace(Fixture::default());
        let domains = SnapshotSource::<Domain>::fetch_all(&store).await.unwrap();
        assert!(domains.is_empty());
    }

    #[test]
    fn test_fixture_parse() {
        let json = r#"{
            "domains": [{"id": 3, "host_public": "site.example", "disallow_robots": true}],
            "posts": [{"domain_id": 3, "post_id": 12, "alt_name": "slug", "redirect": 1}]
        }"#;
        let fixture: Fixture = serde_json::from_str(json).unwrap();
        assert_eq!(fixture.domains[0].id, 3);
        assert!(fixture.domains[0].disallow_robots);
        assert!(fixture.aliases.is_empty());
        assert_eq!(
            fixture.posts[0].redirect,
            crate::tenants::types::RedirectPolicy::Redirect
        );
    }
}
