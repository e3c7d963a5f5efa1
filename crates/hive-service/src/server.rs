//! The service loop.
//!
//! Reads one request line at a time, answers it, and writes exactly one
//! response line before reading the next. Lifecycle:
//! `starting -> ready -> draining -> stopped`.

use std::any::Any;
use std::io;
use std::sync::Arc;

use hive_types::{RequestId, Response};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::codec::decode_line;
use crate::error::ServiceError;
use crate::handler::RequestHandler;

/// Lifecycle state of a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceSummary {
    /// Non-blank lines answered
    pub requests: u64,
    /// How many of those answers were errors
    pub errors: u64,
}

enum Line {
    Complete,
    Oversized(usize),
}

/// Run the service until `reader` reaches end of input.
///
/// An unsolicited health response with id `startup` is written before the
/// first read. Only I/O failures on the channel itself end the loop early.
pub async fn run_service<R, W>(
    handler: Arc<RequestHandler>,
    mut reader: R,
    mut writer: W,
) -> io::Result<ServiceSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut state = ServiceState::Starting;
    let mut summary = ServiceSummary::default();
    let limit = handler.limits().max_request_bytes;

    info!(mode = %handler.mode(), "Model service starting");
    write_response(&mut writer, &handler.health(RequestId::startup())).await?;
    advance(&mut state, ServiceState::Ready);

    let mut buf = Vec::new();
    while let Some(line) = read_line(&mut reader, &mut buf, limit).await? {
        let response = match line {
            Line::Oversized(size) => {
                warn!(size, limit, "Request line too large");
                error_response(RequestId::unknown(), ServiceError::InputTooLarge { size, limit })
            }
            Line::Complete if buf.iter().all(u8::is_ascii_whitespace) => continue,
            Line::Complete => answer(&handler, &buf).await,
        };

        summary.requests += 1;
        if response.is_error() {
            summary.errors += 1;
        }
        write_response(&mut writer, &response).await?;
    }

    advance(&mut state, ServiceState::Draining);
    writer.flush().await?;
    advance(&mut state, ServiceState::Stopped);

    info!(
        requests = summary.requests,
        errors = summary.errors,
        "Model service stopped"
    );
    Ok(summary)
}

fn advance(state: &mut ServiceState, next: ServiceState) {
    debug!(from = ?*state, to = ?next, "Service state change");
    *state = next;
}

async fn answer(handler: &Arc<RequestHandler>, line: &[u8]) -> Response {
    let incoming = match decode_line(line) {
        Ok(incoming) => incoming,
        Err(failure) => {
            warn!(request_id = %failure.request_id, error = %failure.error, "Rejected request line");
            return error_response(failure.request_id, failure.error);
        }
    };

    let request_id = incoming.request_id.clone();
    debug!(kind = %incoming.request.kind(), request_id = %request_id, "Handling request");

    let worker = Arc::clone(handler);
    match tokio::task::spawn_blocking(move || worker.handle(incoming)).await {
        Ok(response) => response,
        Err(join_err) => {
            let reason = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                join_err.to_string()
            };
            error!(request_id = %request_id, reason = %reason, "Request handler aborted");
            error_response(request_id, ServiceError::InternalAnalysis(reason))
        }
    }
}

fn error_response(request_id: RequestId, err: ServiceError) -> Response {
    Response::error(request_id, err.code(), err.to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Read one `\n`-terminated line into `buf` without holding more than
/// `limit` bytes. Returns `None` at end of input.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Option<Line>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut total = 0usize;
    let mut seen_any = false;
    let mut oversized = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if !seen_any {
                return Ok(None);
            }
            break;
        }
        seen_any = true;

        let (chunk_len, consumed, finished) = match available.iter().position(|b| *b == b'\n') {
            Some(pos) => (pos, pos + 1, true),
            None => (available.len(), available.len(), false),
        };

        total += chunk_len;
        if !oversized {
            if total > limit {
                oversized = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..chunk_len]);
            }
        }
        reader.consume(consumed);

        if finished {
            break;
        }
    }

    Ok(Some(if oversized {
        Line::Oversized(total)
    } else {
        Line::Complete
    }))
}

async fn write_response<W>(writer: &mut W, response: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response).map_err(io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
