//! Static audio asset routes
//!
//! Serves `GET /audio/<path>` from a directory, the endpoint that
//! `AudioLoopLoader` fetches from. Names containing a path separator are
//! refused; only files directly inside the root are served.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, error, info};

use crate::error::Result;

pub const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Router serving files under `root` at `/audio/:path`
pub fn audio_routes(root: impl Into<PathBuf>) -> Router {
    let root = Arc::new(root.into());
    Router::new()
        .route("/audio/:path", get(serve_audio))
        .with_state(root)
}

async fn serve_audio(State(root): State<Arc<PathBuf>>, Path(path): Path<String>) -> Response {
    debug!("GET /audio/{}", path);

    if is_forbidden(&path) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let file = root.join(&path);
    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!("Failed to stat audio asset {}: {}", path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match tokio::fs::read(&file).await {
        Ok(data) => ([(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)], data).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!("Failed to read audio asset {}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Names that would leave the root or name the root itself
fn is_forbidden(path: &str) -> bool {
    path.contains('/') || path.contains(std::path::MAIN_SEPARATOR) || path == "." || path == ".."
}

/// Serve `root` on `addr` until the process is stopped
pub async fn serve(root: PathBuf, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving audio from {} on http://{}", root.display(), listener.local_addr()?);
    axum::serve(listener, audio_routes(root)).await?;
    Ok(())
}
