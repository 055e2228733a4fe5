//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dle_gateway::config::GatewayConfig;
use dle_gateway::lifecycle::{startup, Shutdown};
use dle_gateway::store::{Fixture, MemoryStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
}

impl Captured {
    /// First value of `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canned backend reply.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Advertised length when it differs from `body`, as for `HEAD`.
    pub content_length: Option<usize>,
    pub extra_headers: Vec<(&'static str, String)>,
}

impl MockResponse {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
            content_length: None,
            extra_headers: vec![
                ("Server", "nginx/1.25".to_string()),
                ("X-Powered-By", "PHP/8.2".to_string()),
            ],
        }
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn parse_head(head: &str) -> Captured {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or("").to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Captured {
        request_line,
        headers,
    }
}

/// Start a mock backend that records every request and answers with
/// `response`.
pub async fn start_capturing_backend(
    addr: SocketAddr,
    response: MockResponse,
) -> Arc<Mutex<Vec<Captured>>> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let log = Arc::clone(&log);
                    let response = response.clone();
                    tokio::spawn(async move {
                        let Some(head) = read_head(&mut socket).await else {
                            return;
                        };
                        log.lock().unwrap().push(parse_head(&head));

                        let mut out = format!(
                            "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            response.status,
                            response.content_type,
                            response.content_length.unwrap_or(response.body.len())
                        );
                        for (k, v) in &response.extra_headers {
                            out.push_str(&format!("{}: {}\r\n", k, v));
                        }
                        out.push_str("\r\n");
                        let mut bytes = out.into_bytes();
                        bytes.extend_from_slice(&response.body);
                        let _ = socket.write_all(&bytes).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    seen
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
}

/// Gateway config for tests: fast refresh, short upstream deadline.
pub fn test_config(addr: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = addr.to_string();
    config.refresh.interval_secs = 1;
    config.timeouts.connect_secs = 1;
    config.timeouts.upstream_secs = 2;
    config.observability.metrics_enabled = false;
    config
}

/// Start the gateway on `config.listener.bind_address` backed by an
/// in-memory store, and wait until it accepts connections.
pub async fn start_gateway(config: GatewayConfig, fixture: Fixture) -> (Arc<MemoryStore>, Shutdown) {
    let addr: SocketAddr = config.listener.bind_address.parse().unwrap();
    let store = Arc::new(MemoryStore::new(fixture));
    let shutdown = Shutdown::new();

    let source = Arc::clone(&store);
    let stop = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = startup::serve(config, source, stop).await {
            eprintln!("gateway exited: {}", e);
        }
    });

    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return (store, shutdown);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway did not start on {}", addr);
}

/// HTTP client that neither follows redirects nor pools connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
