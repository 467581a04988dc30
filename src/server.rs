use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use tracing::{debug, info, warn};

use crate::pipeline::{PipelineError, UpdatePipeline};

pub const WEBHOOK_PATH: &str = "/dikkeplaten";
pub const HEALTHCHECK_PATH: &str = "/healthcheck";
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

pub fn router(pipeline: Arc<UpdatePipeline>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle_update))
        .route(HEALTHCHECK_PATH, get(healthcheck))
        .with_state(pipeline)
}

async fn healthcheck() -> StatusCode {
    StatusCode::OK
}

/// POST /dikkeplaten. Pipeline failures are logged, never reported back:
/// anything but a bad secret answers 200 so Telegram doesn't redeliver.
async fn handle_update(
    State(pipeline): State<Arc<UpdatePipeline>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let token = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());

    match pipeline.handle(token, &body).await {
        Ok(delivered) => {
            info!(
                "Replaced message {} in chat {} with {} platform link(s)",
                delivered.replaced_message_id, delivered.chat_id, delivered.platforms
            );
            StatusCode::OK
        }
        Err(PipelineError::Unauthorized) => {
            warn!("Rejected webhook call with invalid secret token");
            StatusCode::UNAUTHORIZED
        }
        Err(e) if e.is_ignorable() => {
            debug!("Ignoring update: {}", e);
            StatusCode::OK
        }
        Err(e) => {
            warn!("Failed to handle update: {}", e);
            StatusCode::OK
        }
    }
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
        })
        .await
        .context("Server error")?;

    Ok(())
}
