//! Read-only status surfaces.
//!
//! An axum server exposing `/health`, `/progress` and `/state`, plus a
//! plain-text rendering of `Progress` for chat-style consumers and the CLI.
//! Nothing here can write to the store or the loop.

mod routes;
mod text;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::error::Result;
use crate::runner::LoopSnapshot;
use crate::storage::ProgressReader;

pub use routes::status_router;
pub use text::render_progress_text;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<dyn ProgressReader>,
    /// Absent when no loop is running in this process
    pub snapshot: Option<watch::Receiver<LoopSnapshot>>,
    /// Default record count for `/progress`
    pub recent_limit: usize,
}

impl AppState {
    pub fn new(reader: Arc<dyn ProgressReader>, recent_limit: usize) -> Self {
        Self {
            reader,
            snapshot: None,
            recent_limit,
        }
    }

    pub fn with_snapshot(mut self, snapshot: watch::Receiver<LoopSnapshot>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Router with state applied
pub fn app(state: AppState) -> Router {
    status_router().with_state(state)
}

/// Bind the status listener
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "status server listening");
    Ok(listener)
}

/// Serve until `shutdown` flips to true or its sender is dropped
pub async fn serve(listener: TcpListener, state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("status server shutting down");
        })
        .await?;
    Ok(())
}
