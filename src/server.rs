//! Multi-client HTTP transport: bind, serve, sweep, shut down.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::registry::ToolRegistry;
use crate::routes;
use crate::sessions::SessionManager;
use crate::stdio::shutdown_signal;
use crate::AppState;

/// Serve the HTTP transport until SIGINT/SIGTERM.
///
/// Fails only if the listener cannot be bound or the server errors out.
pub async fn run_http(config: Arc<Config>, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.server.listen).await?;
    info!(
        "Listening on {} ({} tools, session timeout {}s)",
        listener.local_addr()?,
        registry.len(),
        config.session.inactivity_timeout_secs
    );
    serve(listener, AppState::new(config, registry), shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let sweep_task = spawn_sweeper(
        state.session_manager.clone(),
        state.config.session.sweep_interval(),
    );
    // Open event streams hold their connections until the session goes
    // away, so the table is cleared before the drain starts.
    let manager = state.session_manager.clone();
    let app = routes::router(state);
    let shutdown = async move {
        shutdown.await;
        info!("Shutting down...");
        let dropped = manager.close_all().await;
        info!("Dropped {dropped} active session(s)");
    };

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    sweep_task.abort();
    result
}

/// Periodic expiry sweep, independent of request traffic.
pub fn spawn_sweeper(manager: SessionManager, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = manager.sweep().await;
            if !removed.is_empty() {
                debug!("Sweep removed {:?}", removed);
            }
        }
    })
}
