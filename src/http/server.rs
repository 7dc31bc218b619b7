//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with one route per registered handler
//! - Wire up middleware (tracing, request timeout)
//! - Buffer the request body and build a `RequestContext` per request
//! - Run the handler, then flush the context into the axum response
//! - Serve with graceful shutdown

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::context::{ContextSettings, ErrorHandlers, RequestContext};
use crate::http::sink::HttpSink;
use crate::response::WriterPool;

/// A transactional request handler.
pub type Handler = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ContextSettings>,
    pub pool: Arc<WriterPool>,
    pub max_body_bytes: usize,
}

/// HTTP server running transactional handlers.
pub struct HttpServer {
    config: AppConfig,
    routes: Vec<(String, Handler)>,
    error_handlers: ErrorHandlers,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            routes: Vec::new(),
            error_handlers: ErrorHandlers::new(),
        }
    }

    /// Register `handler` for every method on `path`.
    pub fn handle<F>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.routes.push((path.to_string(), Arc::new(handler)));
        self
    }

    /// Register the handler `emit_error` uses for `status`.
    pub fn on_error<F>(mut self, status: StatusCode, handler: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.error_handlers.register(status, handler);
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let state = AppState {
            settings: Arc::new(ContextSettings::from_config(
                &self.config.response,
                self.error_handlers.clone(),
            )),
            pool: Arc::new(WriterPool::new(self.config.response.pool_max_idle)),
            max_body_bytes: self.config.response.max_body_bytes,
        };

        let mut router: Router<AppState> = Router::new();
        for (path, handler) in &self.routes {
            let handler = handler.clone();
            router = router.route(
                path,
                any(move |State(state): State<AppState>, request: Request<Body>| {
                    let handler = handler.clone();
                    async move { dispatch(state, handler, request).await }
                }),
            );
        }

        router
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.len(),
            "HTTP server starting"
        );

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Buffer the request, run `handler` against a fresh context and flush it.
async fn dispatch(state: AppState, handler: Handler, mut request: Request<Body>) -> Response {
    let sink = HttpSink::from_request(&mut request);
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let mut ctx = RequestContext::new(parts, body, sink, state.settings, state.pool);
    let request_id = ctx.request_id();
    tracing::debug!(
        request_id = %request_id,
        method = %ctx.request().method,
        path = %ctx.request().uri.path(),
        "Dispatching request"
    );

    handler(&mut ctx);

    match ctx.finish() {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to flush response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
