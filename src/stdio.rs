//! Single-stream transport: JSON-RPC over stdin/stdout, one frame per line.
//!
//! Frames are handled strictly in arrival order, so responses come back in
//! request order. The loop itself keeps the process alive for as long as
//! the stream is open. Nothing but protocol frames is ever written to the
//! output stream; logs go to stderr.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol;
use crate::registry::ToolRegistry;

/// How long an in-flight call may keep running once shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the transport on the process's stdin/stdout until EOF or a signal.
pub async fn run_stdio(registry: &ToolRegistry) -> std::io::Result<()> {
    info!("Serving MCP on stdio ({} tools)", registry.len());
    serve(
        registry,
        tokio::io::stdin(),
        tokio::io::stdout(),
        shutdown_signal(),
        SHUTDOWN_GRACE,
    )
    .await
}

/// Serve one duplex stream.
///
/// Returns `Ok(())` on EOF or shutdown and `Err` when the stream itself
/// fails. When `shutdown` resolves while a call is in flight, that call gets
/// at most `grace` to finish and its response is still written.
pub async fn serve<R, W, S>(
    registry: &ToolRegistry,
    reader: R,
    mut writer: W,
    shutdown: S,
    grace: Duration,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    tokio::pin!(shutdown);
    let mut stopping = false;

    while !stopping {
        buf.clear();
        let read = tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("Shutdown requested; closing stdio transport");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };

        if read == 0 {
            debug!("stdin closed");
            break;
        }
        let frame = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim(),
            Err(e) => {
                let response = protocol::error_response(
                    serde_json::Value::Null,
                    protocol::PARSE_ERROR,
                    format!("Parse error: frame is not UTF-8: {e}"),
                );
                write_frame(&mut writer, &response).await?;
                continue;
            }
        };
        if frame.is_empty() {
            continue;
        }

        let handling = protocol::handle_frame(registry, frame);
        tokio::pin!(handling);
        let response = tokio::select! {
            response = &mut handling => response,
            () = &mut shutdown => {
                stopping = true;
                info!("Shutdown requested; waiting up to {grace:?} for the in-flight call");
                match tokio::time::timeout(grace, &mut handling).await {
                    Ok(response) => response,
                    Err(_) => {
                        warn!("In-flight call did not finish within the grace period; dropping it");
                        break;
                    }
                }
            }
        };

        if let Some(response) = response {
            write_frame(&mut writer, &response).await?;
        }
    }

    writer.flush().await
}

/// Write one response (single line, flushed immediately).
async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &serde_json::Value,
) -> std::io::Result<()> {
    let mut output = serde_json::to_string(response)?;
    output.push('\n');
    writer.write_all(output.as_bytes()).await?;
    writer.flush().await
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM: {e}");
                ctrl_c.await;
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received SIGINT");
    }
}
