//! Portico demo server.
//!
//! ```text
//!   client ──TCP/TLS──▶ listener ──▶ codec ──▶ route table ──▶ middleware ──▶ handler
//!                                                  │                             │
//!                                           404 / 405                            ▼
//!                                                  └──────────▶ interceptors ◀───┘
//!                                                                    │
//!   client ◀──────────────────────── encode + close ◀────────────────┘
//! ```
//!
//! Routes:
//! - `GET /` welcome page
//! - `GET /health` liveness
//! - `GET /stats` request totals
//! - `POST /echo` echoes the body, `GET /echo/{word}` echoes the word

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use http::StatusCode;
use serde_json::json;

use portico::config::{load_config, ServerMode};
use portico::http::{Html, Json};
use portico::lifecycle::{spawn_signal_handler, Shutdown};
use portico::observability::{logging, metrics};
use portico::{
    Interceptor, Method, Middleware, Request, Response, Responsible, RouteGroup, RouteIdentifier,
    Segment, ServerBuilder, ServerConfig,
};

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "Self-hosted HTTP/1.1 server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,

    /// Show fault details to clients
    #[arg(long)]
    development: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if cli.development {
        config.mode = ServerMode::Development;
    }

    logging::init_tracing(&config.observability);
    tracing::info!("portico v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        mode = ?config.mode,
        workers = ?config.concurrency.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let builder = ServerBuilder::new(config);
    let counters = builder.counters();

    let echo = RouteGroup::new("echo")
        .prefix(Segment::literal("/echo"))
        .middleware(Middleware::new("echo-marker", |_req: &mut Request| {
            Ok(Responsible::next_with("X-Echo", "1"))
        }))
        .route(Method::Post, Segment::literal(""), |req: Request| async move {
            anyhow::Ok(Response::ok().payload(req.body().clone()))
        })
        .route(
            Method::Get,
            Segment::pattern("/(?P<word>[^/]+)"),
            |req: Request| async move {
                let word = req.capture("word").unwrap_or_default().to_string();
                anyhow::Ok(Response::text(StatusCode::OK, word))
            },
        );

    let server = builder
        .route(Method::Get, RouteIdentifier::exact("/"), |_req: Request| async {
            anyhow::Ok(Response::with_body(
                StatusCode::OK,
                &Html("<h1>portico</h1><p>It works.</p>".to_string()),
            ))
        })
        .route(Method::Get, RouteIdentifier::exact("/health"), |_req: Request| async {
            anyhow::Ok(Response::with_body(StatusCode::OK, &Json(json!({ "status": "ok" }))))
        })
        .route(Method::Get, RouteIdentifier::exact("/stats"), move |_req: Request| {
            let snapshot = counters.snapshot();
            async move { anyhow::Ok(Response::with_body(StatusCode::OK, &Json(snapshot))) }
        })
        .group(echo)
        .intercept(
            StatusCode::NOT_FOUND,
            Interceptor::new("not-found-page", |_req: &Request, _res: &mut Response| {
                Ok(Responsible::Terminate(Response::with_body(
                    StatusCode::NOT_FOUND,
                    &Html("<h1>Not Found</h1><p>Nothing lives at this address.</p>".to_string()),
                )))
            }),
        )
        .build()?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.serve(shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
