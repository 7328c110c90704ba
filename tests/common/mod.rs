//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use media_relay::config::{FixedHeader, ProxyConfig};
use media_relay::http::{AppState, HttpServer};
use media_relay::lifecycle::Shutdown;
use media_relay::routing::{RouteSource, RouteTable};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
pub const ORIGIN_HOST: &str = "www.origin.example.com";

/// One request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the mock backend answers with.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub chunked: bool,
    /// Send the head with the body's length, then never send the body.
    pub stall: bool,
}

impl MockReply {
    pub fn new(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
            chunked: false,
            stall: false,
        }
    }

    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} OK\r\nContent-Type: {}\r\nConnection: close\r\n",
            self.status, self.content_type
        )
        .into_bytes();

        if self.stall {
            out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
        } else if self.chunked {
            out.extend_from_slice(b"Transfer-Encoding: chunked\r\n\r\n");
            if !self.body.is_empty() {
                out.extend_from_slice(format!("{:x}\r\n", self.body.len()).as_bytes());
                out.extend_from_slice(&self.body);
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"0\r\n\r\n");
        } else {
            out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
            out.extend_from_slice(&self.body);
        }
        out
    }
}

/// Raw TCP origin that records every request head it receives.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

pub async fn start_mock_backend(reply: MockReply) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let response = Arc::new(reply.encode());
    let stall = reply.stall;

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let recorded = recorded.clone();
            let response = response.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }
                if let Some(request) = parse_head(&head) {
                    recorded.lock().unwrap().push(request);
                }
                let _ = socket.write_all(&response).await;
                if stall {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    MockBackend { addr, requests }
}

fn parse_head(raw: &[u8]) -> Option<RecordedRequest> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    Some(RecordedRequest {
        method,
        target,
        headers,
    })
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Write a route file in the on-disk JSON format.
pub fn write_routes(path: &Path, routes: &[(&str, &str)]) {
    let map: serde_json::Map<String, serde_json::Value> = routes
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect();
    let body = serde_json::json!({ "routes": map });
    std::fs::write(path, body.to_string()).unwrap();
}

/// A relay bound to a random local port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub state: AppState,
    pub routes_file: NamedTempFile,
    pub shutdown: Shutdown,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until every checked-out buffer is back in the pool.
    pub async fn wait_for_idle_buffers(&self) -> bool {
        for _ in 0..100 {
            if self.state.buffers.active() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub fn relay_config(origin: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.origin = format!("http://{origin}");
    config.upstream.skip_tls_verify = true;
    config.upstream.headers = vec![
        FixedHeader::new("Host", ORIGIN_HOST),
        FixedHeader::new("User-Agent", BROWSER_UA),
        FixedHeader::new("Referer", format!("https://{ORIGIN_HOST}")),
    ];
    config.upstream.response_header_secs = 5;
    config.buffer.size_bytes = 16 * 1024;
    config.observability.telemetry_interval_secs = 0;
    config
}

pub async fn start_relay(config: ProxyConfig, routes: &[(&str, &str)]) -> TestRelay {
    let routes_file = NamedTempFile::new().unwrap();
    write_routes(routes_file.path(), routes);

    let table = Arc::new(RouteTable::load(&RouteSource::new(routes_file.path())).unwrap());
    let server = HttpServer::new(config, table).unwrap();
    let state = server.state().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestRelay {
        addr,
        state,
        routes_file,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
