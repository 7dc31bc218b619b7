//! Transactional response demo server.
//!
//! # Routes
//!
//! ```text
//! /           normal flow plus one transaction per built-in scope
//! /transient  a failing transaction that leaves no trace
//! /request    a failing transaction that replaces the whole response
//! /linked     a chain stopped by its second transaction
//! /missing    a request-scoped failure rendered by the 404 error handler
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use clap::Parser;
use tokio::net::TcpListener;

use scoped_response::config::{load_config, AppConfig};
use scoped_response::lifecycle::{signals, Shutdown};
use scoped_response::observability::{logging, metrics};
use scoped_response::{HttpServer, RequestContext, TransactionErrorResult, TransactionScope};

#[derive(Debug, Parser)]
#[command(name = "scoped-response", version, about = "Transactional response demo server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("scoped-response v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        default_scope = ?config.response.default_scope,
        header_merge = ?config.response.header_merge,
        charset = %config.response.charset,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let server = HttpServer::new(config)
        .handle("/", index)
        .handle("/transient", transient)
        .handle("/request", request)
        .handle("/linked", linked)
        .handle("/missing", missing)
        .on_error(StatusCode::NOT_FOUND, |ctx| {
            ctx.response_mut().set_content_type("text/html; charset=UTF-8");
            ctx.response_mut()
                .set_body_string("<h1>Nothing here</h1><p>The resource is gone.</p>");
        });

    let server_task = tokio::spawn(server.run(listener, server_shutdown));
    signals::wait_for_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn index(ctx: &mut RequestContext) {
    ctx.response_mut().write_header(StatusCode::OK);
    ctx.response_mut().set_content_type("text/plain; charset=UTF-8");
    ctx.response_mut().write(b"normal flow\n");

    ctx.begin_transaction(|t| {
        t.response_mut().write(b"first transaction: committed\n");
        t.succeed();
    });

    ctx.begin_transaction(|t| {
        t.response_mut().write(b"second transaction: you should not see this\n");
        t.complete(Err("silent failure"));
    });

    ctx.begin_transaction(|t| {
        t.set_scope(TransactionScope::Linked);
        t.response_mut().write(b"third transaction: committed\n");
        t.succeed();
    });
}

fn transient(ctx: &mut RequestContext) {
    ctx.response_mut().write(b"only the normal flow is visible");
    ctx.begin_transaction(|t| {
        t.response_mut().write_header(StatusCode::BAD_GATEWAY);
        t.response_mut().write(b"partial");
        t.complete(Err("upstream call failed"));
    });
}

fn request(ctx: &mut RequestContext) {
    ctx.response_mut().write(b"this is replaced by the failure");
    ctx.begin_transaction(|t| {
        t.set_scope(TransactionScope::Request);
        t.response_mut().write(b"never sent");
        t.complete(Err(TransactionErrorResult::new(
            503,
            "database unavailable",
            "text/plain; charset=UTF-8",
        )));
    });
    ctx.begin_transaction(|t| {
        t.response_mut().write(b"skipped");
        t.succeed();
    });
}

fn linked(ctx: &mut RequestContext) {
    let steps: [(&str, bool); 3] = [("reserve stock", true), ("charge card", false), ("ship", true)];
    for (step, ok) in steps {
        ctx.begin_transaction(|t| {
            t.set_scope(TransactionScope::Linked);
            if !ok {
                t.complete(Err(format!("{step} failed")));
                return;
            }
            let written = t
                .response_mut()
                .write_json(&serde_json::json!({ "step": step, "ok": true }));
            t.complete(written.map(|_| ()));
        });
    }
}

fn missing(ctx: &mut RequestContext) {
    ctx.begin_transaction(|t| {
        t.set_scope(TransactionScope::Request);
        t.complete(Err(TransactionErrorResult::new(404, "", "")));
    });
}
