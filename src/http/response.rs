//! Response rewriting.
//!
//! # Responsibilities
//! - Hide backend identity (`Server`, `X-Powered-By`)
//! - Repair backend redirects (`Location` private origin → public origin)
//! - Rewrite text bodies so private hostnames never reach the client
//! - Canonicalize paginated `<link rel="canonical">` tags
//! - Emit an exact `Content-Length` plus timing and mode headers
//!
//! # Design Decisions
//! - Bodies are buffered: later substitutions depend on earlier ones
//! - Plain substring replacement, no HTML parsing
//! - Only text content types are touched, and never for media routes

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use memchr::memmem;
use regex::bytes::Regex;

use crate::config::RewriteConfig;
use crate::http::upstream::is_hop_by_hop;
use crate::tenants::Domain;

pub const X_PROXY_TM: &str = "x-proxy-tm";
pub const X_PROXY_MODE: &str = "x-proxy-mode";
pub const X_PROXY_REASON: &str = "x-proxy-reason";

const REWRITABLE_TYPES: [&str; 4] = ["text/html", "application/xml", "application/json", "text/plain"];

const CANONICAL_PATTERN: &str = r#"<link rel="canonical" href="([^"]*?)/page/[0-9]+/?">"#;
const CANONICAL_REPLACEMENT: &[u8] = br#"<link rel="canonical" href="${1}">"#;

fn canonical_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CANONICAL_PATTERN).ok()).as_ref()
}

/// Whether the body was rewritten or passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Modified,
    Direct,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Modified => "modified",
            Mode::Direct => "direct",
        }
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Body rewriting is allowed for text types unless the route forbids it.
pub fn needs_body_rewrite(headers: &HeaderMap, forbid_rewrite: bool) -> bool {
    let ct = content_type(headers);
    !forbid_rewrite && REWRITABLE_TYPES.iter().any(|t| ct.starts_with(t))
}

pub fn needs_canonical_fix(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("text/html")
}

/// Replace every occurrence of `from` with `to`. Empty patterns are a no-op.
pub fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || haystack.len() < from.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut last = 0;
    for at in memmem::find_iter(haystack, from) {
        // find_iter reports non-overlapping matches, left to right.
        out.extend_from_slice(&haystack[last..at]);
        out.extend_from_slice(to);
        last = at + from.len();
    }
    out.extend_from_slice(&haystack[last..]);
    out
}

/// Strip `/page/<n>` from canonical link tags.
pub fn fix_canonical(body: &[u8]) -> Vec<u8> {
    match canonical_regex() {
        Some(re) => re.replace_all(body, CANONICAL_REPLACEMENT).into_owned(),
        None => body.to_vec(),
    }
}

/// Applies per-tenant response rewriting.
#[derive(Debug, Clone)]
pub struct Rewriter {
    config: RewriteConfig,
}

impl Rewriter {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    /// Copy upstream headers for the client. `Content-Length` and
    /// hop-by-hop headers are always dropped: the body is re-emitted with
    /// its exact length.
    pub fn filter_headers(&self, upstream: &HeaderMap, domain: &Domain) -> HeaderMap {
        let private_origin = format!("https://{}", domain.host_private);
        let public_origin = domain.public_origin();
        let mut out = HeaderMap::with_capacity(upstream.len() + 3);

        for (name, value) in upstream.iter() {
            if name == header::SERVER
                || name.as_str() == "x-powered-by"
                || name == header::CONTENT_LENGTH
                || is_hop_by_hop(name)
            {
                continue;
            }
            if name == header::LOCATION && !domain.host_private.is_empty() {
                let fixed = value
                    .to_str()
                    .ok()
                    .map(|v| v.replace(&private_origin, &public_origin))
                    .and_then(|v| HeaderValue::from_str(&v).ok());
                out.append(header::LOCATION, fixed.unwrap_or_else(|| value.clone()));
                continue;
            }
            out.append(name.clone(), value.clone());
        }
        out
    }

    /// Rewrite a text body for `domain`, in order: admin hosts, private
    /// host, imager base URL, cache breaker, then canonical links.
    pub fn rewrite_body(&self, body: &[u8], domain: &Domain, canonical_fix: bool) -> Vec<u8> {
        let public = domain.public_authority();
        let public = public.as_bytes();
        let private = domain.host_private.as_bytes();

        let mut out = body.to_vec();
        if !private.is_empty() {
            let admin = format!("{}{}", self.config.admin_subdomain, domain.host_private);
            out = replace_all(&out, admin.as_bytes(), public);
        }
        out = replace_all(&out, self.config.legacy_admin_host.as_bytes(), public);
        out = replace_all(&out, private, public);
        out = replace_all(&out, domain.service_imager.as_bytes(), b"");
        if self.config.cache_breaker {
            out = replace_all(&out, b".jpg\"", b".jpg?v=1\"");
        }
        if canonical_fix {
            out = fix_canonical(&out);
        }
        out
    }

    /// Build the client response from the buffered upstream response.
    ///
    /// A `HEAD` response keeps the backend's `Content-Length`, since its
    /// buffered body is always empty.
    pub fn finish(
        &self,
        method: &Method,
        status: StatusCode,
        upstream_headers: &HeaderMap,
        body: Bytes,
        domain: &Domain,
        forbid_rewrite: bool,
        start: Instant,
    ) -> (Mode, Response) {
        let mut headers = self.filter_headers(upstream_headers, domain);

        let (mode, body) = if needs_body_rewrite(upstream_headers, forbid_rewrite) {
            let canonical = needs_canonical_fix(upstream_headers);
            let rewritten = self.rewrite_body(&body, domain, canonical);
            (Mode::Modified, Bytes::from(rewritten))
        } else {
            (Mode::Direct, body)
        };

        if *method == Method::HEAD {
            if let Some(length) = upstream_headers.get(header::CONTENT_LENGTH) {
                headers.insert(header::CONTENT_LENGTH, length.clone());
            }
        } else if status != StatusCode::NO_CONTENT && status != StatusCode::NOT_MODIFIED {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        headers.insert(X_PROXY_TM, HeaderValue::from(start.elapsed().as_millis() as u64));
        headers.insert(X_PROXY_MODE, HeaderValue::from_static(mode.as_str()));

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        (mode, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain {
            id: 1,
            host_public: "site.example".into(),
            host_private: "site.dle.internal".into(),
            service_imager: "https://cdn.s3.internal".into(),
            scheme_public: "https".into(),
            ..Default::default()
        }
    }

    fn rewriter() -> Rewriter {
        Rewriter::new(RewriteConfig::default())
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(k, v) in pairs {
            map.append(k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_replace_all() {
        assert_eq!(replace_all(b"a.b.a", b"a", b"xy"), b"xy.b.xy");
        assert_eq!(replace_all(b"abc", b"", b"z"), b"abc");
        assert_eq!(replace_all(b"ab", b"abc", b"z"), b"ab");
        assert_eq!(replace_all(b"aaa", b"aa", b"b"), b"ba");
        assert_eq!(replace_all(b"xaa", b"aa", b""), b"x");
    }

    #[test]
    fn test_content_type_gate() {
        assert!(needs_body_rewrite(&headers(&[("content-type", "text/html; charset=utf-8")]), false));
        assert!(needs_body_rewrite(&headers(&[("content-type", "application/json")]), false));
        assert!(needs_body_rewrite(&headers(&[("content-type", "application/xml")]), false));
        assert!(needs_body_rewrite(&headers(&[("content-type", "text/plain")]), false));
        assert!(!needs_body_rewrite(&headers(&[("content-type", "text/html")]), true));
        assert!(!needs_body_rewrite(&headers(&[("content-type", "image/jpeg")]), false));
        assert!(!needs_body_rewrite(&HeaderMap::new(), false));

        assert!(needs_canonical_fix(&headers(&[("content-type", "text/html")])));
        assert!(!needs_canonical_fix(&headers(&[("content-type", "application/json")])));
    }

    #[test]
    fn test_private_host_forms_collapse() {
        let body = b"a site.dle.internal b //site.dle.internal/x c http://site.dle.internal/y d https://site.dle.internal/z";
        let out = rewriter().rewrite_body(body, &domain(), false);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "a site.example b //site.example/x c http://site.example/y d https://site.example/z"
        );
        assert!(!out.contains("dle.internal"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let body = br#"<a href="https://odminko.site.dle.internal/admin">x</a>
<img src="https://cdn.s3.internal/posts/a.jpg">
<link rel="canonical" href="https://site.dle.internal/news/page/3">
<a href="https://odminko.printhouse.casa/">legacy</a>"#;
        let once = rewriter().rewrite_body(body, &domain(), true);
        let twice = rewriter().rewrite_body(&once, &domain(), true);
        assert_eq!(once, twice);

        let once = String::from_utf8(once).unwrap();
        assert!(once.contains(r#"href="https://site.example/admin""#));
        assert!(once.contains(r#"src="/posts/a.jpg?v=1""#));
        assert!(once.contains(r#"<link rel="canonical" href="https://site.example/news">"#));
        assert!(once.contains(r#"href="https://site.example/">legacy"#));
    }

    #[test]
    fn test_public_port_kept() {
        let mut d = domain();
        d.port_public = "8443".into();
        let out = rewriter().rewrite_body(b"//site.dle.internal/a", &d, false);
        assert_eq!(out, b"//site.example:8443/a");
    }

    #[test]
    fn test_canonical_fix() {
        assert_eq!(
            fix_canonical(br#"<link rel="canonical" href="https://x/y/page/3">"#),
            br#"<link rel="canonical" href="https://x/y">"#.to_vec()
        );
        assert_eq!(
            fix_canonical(br#"<link rel="canonical" href="https://x/y/page/12/">"#),
            br#"<link rel="canonical" href="https://x/y">"#.to_vec()
        );
        let untouched = br#"<link rel="canonical" href="https://x/y/">"#;
        assert_eq!(fix_canonical(untouched), untouched.to_vec());
        let not_canonical = br#"<link rel="next" href="https://x/y/page/3">"#;
        assert_eq!(fix_canonical(not_canonical), not_canonical.to_vec());
    }

    #[test]
    fn test_filter_headers() {
        let upstream = headers(&[
            ("server", "nginx"),
            ("x-powered-by", "PHP/8.2"),
            ("content-length", "999"),
            ("transfer-encoding", "chunked"),
            ("location", "https://site.dle.internal/login?x=1"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
        ]);
        let out = rewriter().filter_headers(&upstream, &domain());
        assert!(out.get("server").is_none());
        assert!(out.get("x-powered-by").is_none());
        assert!(out.get("content-length").is_none());
        assert!(out.get("transfer-encoding").is_none());
        assert_eq!(out.get("location").unwrap(), "https://site.example/login?x=1");
        assert_eq!(out.get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_finish_modified() {
        let upstream = headers(&[("content-type", "text/html"), ("content-length", "5")]);
        let (mode, resp) = rewriter().finish(
            &Method::GET,
            StatusCode::OK,
            &upstream,
            Bytes::from_static(b"<p>site.dle.internal</p>"),
            &domain(),
            false,
            Instant::now(),
        );
        assert_eq!(mode, Mode::Modified);
        assert_eq!(resp.headers().get(X_PROXY_MODE).unwrap(), "modified");
        assert_eq!(resp.headers().get(header::CONTENT_LENGTH).unwrap(), "19");
        assert!(resp.headers().get(X_PROXY_TM).is_some());
    }

    #[test]
    fn test_finish_direct_when_forbidden() {
        let upstream = headers(&[("content-type", "text/html")]);
        let body = Bytes::from_static(b"site.dle.internal");
        let (mode, resp) = rewriter().finish(
            &Method::GET,
            StatusCode::NOT_FOUND,
            &upstream,
            body,
            &domain(),
            true,
            Instant::now(),
        );
        assert_eq!(mode, Mode::Direct);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers().get(X_PROXY_MODE).unwrap(), "direct");
        assert_eq!(resp.headers().get(header::CONTENT_LENGTH).unwrap(), "17");
    }

    #[test]
    fn test_finish_head_keeps_backend_length() {
        let upstream = headers(&[("content-type", "text/html"), ("content-length", "1234")]);
        let (_, resp) = rewriter().finish(
            &Method::HEAD,
            StatusCode::OK,
            &upstream,
            Bytes::new(),
            &domain(),
            false,
            Instant::now(),
        );
        assert_eq!(resp.headers().get(header::CONTENT_LENGTH).unwrap(), "1234");
    }
}
