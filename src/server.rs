use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path as AxumPath, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{info, warn};

use crate::config::{DownloadsConfig, ServerConfig};

#[derive(Clone)]
struct ServerState {
    video_dir: PathBuf,
}

/// Serve downloaded videos over HTTP so they can be linked from chats.
pub async fn run(server: &ServerConfig, downloads: &DownloadsConfig) -> Result<()> {
    let state = Arc::new(ServerState {
        video_dir: downloads.directory.clone(),
    });

    let app = Router::new()
        .route("/videos/{filename}", get(serve_video))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server.bind_addr))?;

    info!("Video server listening on {}", server.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn serve_video(
    State(state): State<Arc<ServerState>>,
    AxumPath(filename): AxumPath<String>,
) -> impl IntoResponse {
    // only plain filenames, nothing that escapes the video directory
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        warn!("Rejected suspicious video path: {}", filename);
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.video_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = content_type_for(&filename);
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
