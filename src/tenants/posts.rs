//! Post URL overrides: canonical slug redirects and takedowns.
//!
//! CMS article URLs look like `/<post id>-<slug>.html`. When a rule exists
//! for the post and the slug in the request differs from the rule's
//! `alt_name`, the request is intercepted:
//!
//! | redirect | outcome                                   |
//! |----------|-------------------------------------------|
//! | 1        | 301 to the same URL with the right slug   |
//! | 0        | 451, empty body                           |

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::snapshot::{Snapshot, SnapshotCache};
use crate::tenants::types::{Domain, PostOverride, RedirectPolicy};

const POST_PATH_PATTERN: &str = r"/([0-9]+)-(.*)\.html$";

fn post_path_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(POST_PATH_PATTERN).ok()).as_ref()
}

/// Composite lookup key. Kept as two fields so large post ids cannot
/// collide across tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostKey {
    pub domain_id: i64,
    pub post_id: u64,
}

impl PostKey {
    pub fn new(domain_id: i64, post_id: u64) -> Self {
        Self { domain_id, post_id }
    }
}

/// Keyed snapshot of override rules. Later rows replace earlier ones with
/// the same key.
#[derive(Debug, Default)]
pub struct PostIndex(HashMap<PostKey, PostOverride>);

impl PostIndex {
    pub fn get(&self, key: &PostKey) -> Option<&PostOverride> {
        self.0.get(key)
    }
}

impl Snapshot for PostIndex {
    type Row = PostOverride;

    fn from_rows(rows: Vec<PostOverride>) -> Self {
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            map.insert(PostKey::new(row.domain_id, row.post_id), row);
        }
        PostIndex(map)
    }

    fn row_count(&self) -> usize {
        self.0.len()
    }
}

pub type PostCache = SnapshotCache<PostIndex>;

/// Post id and slug parsed out of a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPath<'a> {
    pub post_id: u64,
    pub slug: &'a str,
    /// Everything before the slug, including `<id>-`.
    head: &'a str,
}

impl<'a> PostPath<'a> {
    /// Same path with the slug swapped for `slug`.
    pub fn with_slug(&self, slug: &str) -> String {
        format!("{}{}.html", self.head, slug)
    }
}

/// Parse `/<digits>-<slug>.html`. Returns `None` when the path does not have
/// that shape or the id is zero or does not fit in a `u64`.
pub fn parse_post_path(path: &str) -> Option<PostPath<'_>> {
    let caps = post_path_regex()?.captures(path)?;
    let id = caps.get(1)?;
    let slug = caps.get(2)?;
    let post_id: u64 = id.as_str().parse().ok()?;
    if post_id == 0 {
        return None;
    }
    Some(PostPath {
        post_id,
        slug: slug.as_str(),
        head: &path[..slug.start()],
    })
}

/// What the gateway must answer instead of forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostDecision {
    /// Permanent redirect to the canonical slug.
    Redirect { location: String },
    /// 451 Unavailable For Legal Reasons.
    Unavailable,
}

#[derive(Clone)]
pub struct PostOverrideResolver {
    posts: Arc<PostCache>,
}

impl PostOverrideResolver {
    pub fn new(posts: Arc<PostCache>) -> Self {
        Self { posts }
    }

    pub fn cache(&self) -> &Arc<PostCache> {
        &self.posts
    }

    pub fn lookup(&self, domain_id: i64, post_id: u64) -> Option<PostOverride> {
        self.posts
            .load()
            .get(&PostKey::new(domain_id, post_id))
            .cloned()
    }

    /// Decide whether a request for `path` must be intercepted.
    ///
    /// `None` means "forward as usual": the path is not a post URL, no rule
    /// exists, or the slug is already canonical.
    pub fn decide(&self, domain: &Domain, path: &str, query: Option<&str>) -> Option<PostDecision> {
        if !path.ends_with(".html") {
            return None;
        }
        let parsed = parse_post_path(path)?;
        let rule = self.lookup(domain.id, parsed.post_id)?;
        if parsed.slug == rule.alt_name {
            return None;
        }

        match rule.redirect {
            RedirectPolicy::Redirect => {
                let mut location = domain.public_origin();
                location.push_str(&parsed.with_slug(&rule.alt_name));
                if let Some(q) = query {
                    location.push('?');
                    location.push_str(q);
                }
                Some(PostDecision::Redirect { location })
            }
            RedirectPolicy::Deny => Some(PostDecision::Unavailable),
        }
    }
}
