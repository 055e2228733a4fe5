//! Per-tenant static file overrides.

use std::sync::Arc;

use crate::snapshot::SnapshotCache;
use crate::tenants::types::DomainFile;

pub type FileCache = SnapshotCache<Vec<DomainFile>>;

#[derive(Clone)]
pub struct StaticFileResolver {
    files: Arc<FileCache>,
}

impl StaticFileResolver {
    pub fn new(files: Arc<FileCache>) -> Self {
        Self { files }
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.files
    }

    /// File stored for `(domain_id, path)`. The request path is compared
    /// with its leading and trailing slashes removed; first match wins.
    pub fn get_file(&self, domain_id: i64, path: &str) -> Option<DomainFile> {
        let path = path.trim_matches('/');
        self.files
            .load()
            .iter()
            .find(|f| f.domain_id == domain_id && f.path == path)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64, domain_id: i64, path: &str, body: &str) -> DomainFile {
        DomainFile {
            id,
            domain_id,
            path: path.into(),
            content_type: "text/plain".into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_get_file() {
        let cache = Arc::new(FileCache::new("domain_file"));
        cache.replace(vec![
            file(1, 7, "ads.txt", "first"),
            file(2, 7, "ads.txt", "second"),
            file(3, 8, "ads.txt", "other tenant"),
            file(4, 7, "verify/google.html", "g"),
        ]);
        let resolver = StaticFileResolver::new(cache);

        assert_eq!(resolver.get_file(7, "/ads.txt").unwrap().body, "first");
        assert_eq!(resolver.get_file(7, "ads.txt/").unwrap().id, 1);
        assert_eq!(resolver.get_file(8, "/ads.txt").unwrap().id, 3);
        assert_eq!(resolver.get_file(7, "/verify/google.html").unwrap().id, 4);
        assert!(resolver.get_file(9, "/ads.txt").is_none());
        assert!(resolver.get_file(7, "/").is_none());
    }
}
