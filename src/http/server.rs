//! HTTP server setup and the request orchestrator.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Resolve the tenant and answer locally when possible
//! - Forward everything else once and rewrite the response
//!
//! # Request pipeline
//! ```text
//! host → alias redirect → tenant → robots.txt → static file
//!      → post override → route → forward → rewrite
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{request_host, request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::response::{Rewriter, X_PROXY_REASON};
use crate::http::upstream::{build_upstream_request, Forwarder};
use crate::observability::metrics;
use crate::routing::Router as BackendRouter;
use crate::tenants::{
    DomainFile, PostDecision, PostOverrideResolver, StaticFileResolver, TenantDirectory,
    TenantSnapshots,
};

pub const ROBOTS_DISALLOW_ALL: &str = "User-agent: *\nDisallow: /";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub tenants: TenantDirectory,
    pub files: StaticFileResolver,
    pub posts: PostOverrideResolver,
    pub router: Arc<BackendRouter>,
    pub forwarder: Forwarder,
    pub rewriter: Arc<Rewriter>,
}

impl AppState {
    pub fn new(config: &GatewayConfig, snapshots: &TenantSnapshots) -> Self {
        let forwarder = Forwarder::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.upstream_secs),
            config.rewrite.max_body_bytes,
        );
        Self {
            tenants: snapshots.directory(),
            files: snapshots.static_files(),
            posts: snapshots.post_overrides(),
            router: Arc::new(BackendRouter::new(config.routing.clone())),
            forwarder,
            rewriter: Arc::new(Rewriter::new(config.rewrite.clone())),
        }
    }
}

/// Public-facing gateway listener.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, snapshots: &TenantSnapshots) -> Self {
        let state = AppState::new(config, snapshots);
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, UuidRequestId))
    }

    /// The assembled router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    match dispatch(&state, request, start).await {
        Ok((outcome, response)) => {
            metrics::record_request(outcome, response.status().as_u16(), start);
            response
        }
        Err(err) => {
            metrics::record_request(err.kind(), err.status().as_u16(), start);
            err.into_response()
        }
    }
}

/// Run the pipeline for one request. Returns the outcome label with the
/// response.
async fn dispatch(
    state: &AppState,
    request: Request<Body>,
    start: Instant,
) -> Result<(&'static str, Response), GatewayError> {
    let (parts, body) = request.into_parts();
    let host = request_host(&parts.headers, &parts.uri).ok_or(GatewayError::MissingHost)?;
    let path = parts.uri.path();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);

    tracing::info!(host = %host, url = %path_and_query, "Request");

    if let Some(domain) = state.tenants.alias_target(&host) {
        let location = format!("https://{}{}", domain.host_public, path_and_query);
        tracing::debug!(host = %host, location = %location, "Alias redirect");
        let response = (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION.as_str(), location.as_str())],
        )
            .into_response();
        return Ok(("alias_redirect", response));
    }

    let domain = state.tenants.resolve(&host).ok_or_else(|| {
        tracing::warn!(host = %host, "Unknown host");
        GatewayError::UnknownHost(host.clone())
    })?;

    if domain.disallow_robots && path.starts_with("/robots.txt") {
        let response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            ROBOTS_DISALLOW_ALL,
        )
            .into_response();
        return Ok(("robots", response));
    }

    if let Some(file) = state.files.get_file(domain.id, path) {
        tracing::debug!(domain_id = domain.id, path = %file.path, "Serving static override");
        return Ok(("static_file", static_file_response(file)));
    }

    match state.posts.decide(&domain, path, parts.uri.query()) {
        Some(PostDecision::Redirect { location }) => {
            tracing::debug!(domain_id = domain.id, location = %location, "Post slug redirect");
            let response = (
                StatusCode::MOVED_PERMANENTLY,
                [
                    (header::LOCATION.as_str(), location.as_str()),
                    (X_PROXY_REASON, "post-redirect"),
                ],
            )
                .into_response();
            return Ok(("post_redirect", response));
        }
        Some(PostDecision::Unavailable) => {
            tracing::debug!(domain_id = domain.id, path = %path, "Post unavailable");
            let response = (
                StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
                [(X_PROXY_REASON, "post-unavailable")],
            )
                .into_response();
            return Ok(("post_unavailable", response));
        }
        None => {}
    }

    let target = state.router.route(&domain, path, path_and_query);
    let url = target.url();
    tracing::info!(
        method = %parts.method,
        host = %host,
        target = %url,
        backend = target.backend.as_str(),
        "Forwarding"
    );

    let outbound = build_upstream_request(
        &parts.method,
        &parts.headers,
        body,
        &target,
        &domain,
        &domain.host_public,
    );
    let forwarded = match outbound {
        Ok(req) => state.forwarder.forward(req).await,
        Err(e) => Err(e),
    };
    let (upstream, bytes) = forwarded.map_err(|e| {
        metrics::record_upstream_error(e.kind());
        tracing::error!(
            method = %parts.method,
            host = %host,
            target = %url,
            error = %e,
            "Upstream request failed"
        );
        e
    })?;

    let (mode, response) = state.rewriter.finish(
        &parts.method,
        upstream.status,
        &upstream.headers,
        bytes,
        &domain,
        target.forbid_rewrite,
        start,
    );
    tracing::debug!(
        host = %host,
        status = upstream.status.as_u16(),
        mode = mode.as_str(),
        "Response sent"
    );
    Ok((mode.as_str(), response))
}

fn static_file_response(file: DomainFile) -> Response {
    let content_type = if file.content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        file.content_type
    };
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], file.body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fixture, MemoryStore};
    use crate::tenants::{Domain, DomainAlias, PostOverride, RedirectPolicy};
    use tower::ServiceExt;

    fn fixture() -> Fixture {
        Fixture {
            domains: vec![Domain {
                id: 7,
                host_public: "site.example".into(),
                host_private: "site.dle.internal".into(),
                service_dle: "http://127.0.0.1:1".into(),
                scheme_public: "https".into(),
                disallow_robots: true,
                ..Default::default()
            }],
            aliases: vec![DomainAlias {
                domain_id: 7,
                host: "www.site.example".into(),
            }],
            files: vec![DomainFile {
                id: 1,
                domain_id: 7,
                path: "ads.txt".into(),
                content_type: "text/plain".into(),
                body: "google.com, pub-1".into(),
            }],
            posts: vec![
                PostOverride {
                    id: 1,
                    domain_id: 7,
                    post_id: 123,
                    alt_name: "right-slug".into(),
                    approve: true,
                    redirect: RedirectPolicy::Redirect,
                },
                PostOverride {
                    id: 2,
                    domain_id: 7,
                    post_id: 124,
                    alt_name: "gone".into(),
                    approve: false,
                    redirect: RedirectPolicy::Deny,
                },
            ],
        }
    }

    async fn app() -> Router {
        let store = MemoryStore::new(fixture());
        let snapshots = TenantSnapshots::new();
        snapshots.load_initial(&store).await.unwrap();
        GatewayServer::new(&GatewayConfig::default(), &snapshots).router()
    }

    fn get(host: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_alias_redirect_keeps_path_and_query() {
        let res = app().await.oneshot(get("www.site.example", "/a/b?x=1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers()[header::LOCATION], "https://site.example/a/b?x=1");
        assert!(res.headers().get(X_REQUEST_ID).is_some());
    }

    #[tokio::test]
    async fn test_unknown_host() {
        let res = app().await.oneshot(get("nobody.example", "/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(res).await, "Unknown host");
    }

    #[tokio::test]
    async fn test_robots_disallow() {
        let res = app().await.oneshot(get("site.example:443", "/robots.txt")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(res).await, ROBOTS_DISALLOW_ALL);
    }

    #[tokio::test]
    async fn test_static_file_served_without_backend() {
        let res = app().await.oneshot(get("site.example", "/ads.txt")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(res).await, "google.com, pub-1");
    }

    #[tokio::test]
    async fn test_post_overrides() {
        let res = app()
            .await
            .oneshot(get("site.example", "/news/123-wrong-slug.html?p=2"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            res.headers()[header::LOCATION],
            "https://site.example/news/123-right-slug.html?p=2"
        );
        assert_eq!(res.headers()[X_PROXY_REASON], "post-redirect");

        let res = app().await.oneshot(get("site.example", "/124-old.html")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);
        assert_eq!(res.headers()[X_PROXY_REASON], "post-unavailable");
        assert!(body_string(res).await.is_empty());
    }

    #[tokio::test]
    async fn test_backend_down_is_bad_gateway() {
        let res = app()
            .await
            .oneshot(get("site.example", "/news/123-right-slug.html"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_string(res).await, "Proxy error");
    }

    #[tokio::test]
    async fn test_missing_host() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = app().await.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_deadline_answers_gateway_timeout() {
        // Accepts connections into the backlog and never answers.
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut fixture = fixture();
        fixture.domains[0].service_dle = format!("http://{}", silent.local_addr().unwrap());

        let store = MemoryStore::new(fixture);
        let snapshots = TenantSnapshots::new();
        snapshots.load_initial(&store).await.unwrap();
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 1;
        config.timeouts.upstream_secs = 5;

        let res = GatewayServer::new(&config, &snapshots)
            .router()
            .oneshot(get("site.example", "/"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        drop(silent);
    }
}
