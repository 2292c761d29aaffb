//! Shared harness for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use portico::lifecycle::Shutdown;
use portico::observability::{EventLog, LogEvent, RequestCounters, Severity};
use portico::{ServerBuilder, ServerConfig};

/// Loopback, ephemeral port, short start-line timeout.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.decode.start_line_timeout_ms = 300;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub events: EventLog,
    pub counters: Arc<RequestCounters>,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Build and run the server in the background.
pub async fn spawn(builder: ServerBuilder) -> TestServer {
    let server = builder.build().expect("server should build");
    let listener = server.bind().await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let events = server.events();
    let counters = server.counters();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.expect("server run");
    });

    TestServer {
        addr,
        events,
        counters,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client")
}

/// Write raw bytes and read until the server closes the connection.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw).await.expect("write");
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server closed in time")
        .expect("read");
    String::from_utf8_lossy(&out).into_owned()
}

/// Next event with the given severity, skipping everything else.
pub async fn next_event(rx: &mut broadcast::Receiver<LogEvent>, severity: Severity) -> LogEvent {
    let wait = async {
        loop {
            let event = rx.recv().await.expect("event stream open");
            if event.severity == severity {
                return event;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("event arrived in time")
}
