//! TCP gateway loop.
//!
//! One JSON document per line, both directions. The accept loop never blocks
//! on a connection: each accepted socket is served by its own task. Decode
//! failures produce a well-formed error envelope instead of closing the
//! socket; the connection terminates only on peer disconnect, write failure,
//! or an oversized line (an unusable framing state). No session state is
//! attached to a connection; device state is keyed by deviceId.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::config::config as global_config;
use crate::dispatcher::Dispatcher;
use crate::error::{ErrorBody, GatewayError};
use crate::request::{salvage_message_id, IpcRequest};
use crate::response::{fresh_message_id, IpcResponse};

/// Run the accept loop until the listener fails.
///
/// # Errors
///
/// Returns the accept error that ended the loop.
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "client connected");
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            handle_connection(stream, dispatcher).await;
            tracing::debug!(%peer, "client disconnected");
        });
    }
}

async fn handle_connection(stream: TcpStream, dispatcher: Arc<Dispatcher>) {
    let max_line = global_config().max_line_bytes;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        // cap the per-line read so an unframed client cannot grow the buffer unbounded
        let mut limited = (&mut reader).take(max_line as u64 + 1);
        let n = match limited.read_until(b'\n', &mut buf).await {
            Ok(0) => break, // peer closed
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "read failed");
                break;
            }
        };
        let oversized = n > max_line;
        let response = if oversized {
            IpcResponse::fail(
                fresh_message_id(),
                None,
                ErrorBody::from(GatewayError::Parse(format!(
                    "request exceeds {max_line} bytes"
                ))),
            )
        } else {
            let Ok(raw) = std::str::from_utf8(&buf) else {
                let resp = IpcResponse::fail(
                    fresh_message_id(),
                    None,
                    ErrorBody::from(GatewayError::Parse("request is not valid UTF-8".into())),
                );
                if !write_response(&mut write_half, &resp).await {
                    break;
                }
                continue;
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            decode_and_dispatch(trimmed, &dispatcher).await
        };

        if !write_response(&mut write_half, &response).await {
            break;
        }
        if oversized {
            // framing can no longer be trusted on this stream
            break;
        }
    }
}

async fn write_response(
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &IpcResponse,
) -> bool {
    let Ok(mut out) = serde_json::to_vec(response) else {
        tracing::error!("response serialization failed");
        return false;
    };
    out.push(b'\n');
    if let Err(e) = write_half.write_all(&out).await {
        tracing::debug!(error = %e, "write failed");
        return false;
    }
    true
}

async fn decode_and_dispatch(raw: &str, dispatcher: &Dispatcher) -> IpcResponse {
    match serde_json::from_str::<IpcRequest>(raw) {
        Ok(request) => dispatcher.dispatch(request).await,
        Err(e) => {
            let message_id = salvage_message_id(raw).unwrap_or_else(fresh_message_id);
            IpcResponse::fail(
                message_id,
                None,
                ErrorBody::from(GatewayError::Parse(e.to_string())),
            )
        }
    }
}
