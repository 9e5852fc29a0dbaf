//! HTTP server for the development bundle.
//!
//! Files come from the in-memory cache filled by the watch loop. Nothing is
//! read from disk.

use std::net::SocketAddr;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::dev::SharedState;
use crate::error::{CliError, Result};

pub struct DevServer {
    listener: TcpListener,
    state: SharedState,
}

impl DevServer {
    /// Bind `addr`. Binding happens up front so a taken port fails the
    /// command instead of a background task.
    pub async fn bind(addr: SocketAddr, state: SharedState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the task is dropped.
    pub async fn serve(self) -> Result<()> {
        axum::serve(self.listener, router(self.state))
            .await
            .map_err(|e| CliError::Server(format!("Server error: {e}")))
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/assets.json", get(handle_assets))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .fallback(handle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn handle_assets(State(state): State<SharedState>) -> Response {
    match state.assets() {
        Some(json) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            json,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "assets.json needs a package.json").into_response(),
    }
}

async fn handle_request(State(state): State<SharedState>, uri: Uri) -> Response {
    let path = match uri.path() {
        "/" => "/index.js",
        path => path,
    };

    if let Some((content, content_type)) = state.cached_file(path) {
        return (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            content,
        )
            .into_response();
    }

    // Before the first successful build the cache is empty; report why.
    if let Some(error) = state.status().error() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            error.to_string(),
        )
            .into_response();
    }

    (StatusCode::NOT_FOUND, format!("Not found: {path}")).into_response()
}
