//! Server initialization and routing
//!
//! Every endpoint is mounted under its own path and under the legacy `.php`
//! path the browser editor still calls. Each route carries its own CORS policy
//! allowing exactly the method it serves.

use crate::config::Config;
use crate::middleware::{log_requests, request_id};
use crate::routes::document::{load_document, save_document};
use crate::routes::validate::validate_document;
use crate::routes::{method_not_allowed, options};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::middleware::from_fn;
use axum::routing::{MethodRouter, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const LOAD_PATHS: [&str; 2] = ["/load", "/load_d4.php"];
pub const SAVE_PATHS: [&str; 2] = ["/save", "/save_d4.php"];
pub const VALIDATE_PATHS: [&str; 2] = ["/validate", "/validate_d4.php"];

fn cors_for(method: Method) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([method])
        .allow_headers([CONTENT_TYPE])
}

/// Build the Axum router with all routes and middleware
///
/// Middleware stack, outermost first:
/// 1. HTTP tracing
/// 2. Request ID tracking
/// 3. Request logging
/// 4. Body size limit
/// 5. Per-route CORS
pub fn build_router(state: AppState) -> Router {
    let load: MethodRouter<AppState> = get(load_document)
        .options(options)
        .fallback(method_not_allowed)
        .layer(cors_for(Method::GET));
    let save: MethodRouter<AppState> = post(save_document)
        .options(options)
        .fallback(method_not_allowed)
        .layer(cors_for(Method::POST));
    let validate: MethodRouter<AppState> = post(validate_document)
        .options(options)
        .fallback(method_not_allowed)
        .layer(cors_for(Method::POST));

    let mut router = Router::new();
    for path in LOAD_PATHS {
        router = router.route(path, load.clone());
    }
    for path in SAVE_PATHS {
        router = router.route(path, save.clone());
    }
    for path in VALIDATE_PATHS {
        router = router.route(path, validate.clone());
    }

    router = match &state.config.server.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(|| async { StatusCode::NOT_FOUND }),
    };

    router
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
///
/// Blocks until the server is shut down via SIGTERM or Ctrl+C.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let state = AppState::new(config)?;

    let document_path = state.store.path();
    if !tokio::fs::try_exists(document_path).await.unwrap_or(false) {
        tracing::warn!(
            path = %document_path.display(),
            "Document not found; load will return 404 until the first save"
        );
    }

    tracing::info!(
        document = %document_path.display(),
        fixed_dtd = state.validator.uses_fixed_dtd(),
        note_numbers = ?state.validator.grammar(),
        "Serving MIDNAM document"
    );
    if let Some(dir) = &state.config.server.static_dir {
        tracing::info!(dir = %dir.display(), "Serving static files");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
