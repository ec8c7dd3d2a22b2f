//! Shell console pump (§4.7): bridges a PTY-attached interactive exec
//! session to a WebSocket with two concurrent pump loops and a shared
//! "alive" flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cyroid_runtime::backend::InteractiveExec;
use tokio::sync::Mutex;

use crate::ws::{WsConnection, WsMessage};

/// The shell command started inside the VM's container for an
/// interactive console (§4.7): prefer bash, fall back to sh.
pub const CONSOLE_SHELL_COMMAND: &[&str] = &["sh", "-c", "if [ -x /bin/bash ]; then exec /bin/bash; else exec /bin/sh; fi"];

/// Docker's stream-multiplexing frame header is 8 bytes: a 1-byte stream
/// type followed by 3 reserved bytes and a 4-byte big-endian length.
/// `exec_interactive` implementations that hand back the raw multiplexed
/// socket will have it on stdout chunks; ones built atop a client that
/// already demultiplexes (as `cyroid-runtime`'s `bollard` backend does)
/// will not. Detecting the header heuristically rather than always
/// assuming its presence (or absence) lets the same pump serve both
/// (§4.7, §9: "a pragmatic demultiplexing shortcut").
const DOCKER_FRAME_HEADER_LEN: usize = 8;

/// Strips a Docker stream frame header from `buf` if one is detected:
/// the heuristic is "at least 8 bytes, first byte in `{0,1,2}`" (stdin,
/// stdout, stderr stream types), per §4.7/§9.
#[must_use]
fn strip_frame_header(buf: &[u8]) -> &[u8] {
    if buf.len() >= DOCKER_FRAME_HEADER_LEN && matches!(buf[0], 0 | 1 | 2) {
        &buf[DOCKER_FRAME_HEADER_LEN..]
    } else {
        buf
    }
}

/// Runs the console pump until either side disconnects or errors.
///
/// Two loops race via a shared `alive` flag: the reader copies bytes
/// from the exec socket to the WebSocket as text (after stripping any
/// detected frame header); the writer copies WebSocket frames to the
/// exec socket's stdin. Either loop flips `alive` to `false` on
/// EOF/error/disconnect, which the other observes and exits on its next
/// iteration. The exec session itself is never force-killed on
/// disconnect — that is left to the container engine (§4.7).
pub async fn run_console(ws: Box<dyn WsConnection>, exec: Box<dyn InteractiveExec>) {
    let alive = Arc::new(AtomicBool::new(true));
    let ws = Arc::new(Mutex::new(ws));
    let exec = Arc::new(Mutex::new(exec));

    let reader = reader_loop(Arc::clone(&ws), Arc::clone(&exec), Arc::clone(&alive));
    let writer = writer_loop(ws, exec, alive);
    tokio::join!(reader, writer);
}

async fn reader_loop(
    ws: Arc<Mutex<Box<dyn WsConnection>>>,
    exec: Arc<Mutex<Box<dyn InteractiveExec>>>,
    alive: Arc<AtomicBool>,
) {
    let mut buf = [0_u8; 4096];
    while alive.load(Ordering::Acquire) {
        let read_result = exec.lock().await.read(&mut buf).await;
        match read_result {
            Ok(0) => {
                alive.store(false, Ordering::Release);
                break;
            }
            Ok(n) => {
                let payload = strip_frame_header(&buf[..n]);
                let text = String::from_utf8_lossy(payload).into_owned();
                if ws.lock().await.send_text(text).await.is_err() {
                    alive.store(false, Ordering::Release);
                    break;
                }
            }
            Err(err) => {
                tracing::debug!(%err, "console exec read failed, ending pump");
                alive.store(false, Ordering::Release);
                break;
            }
        }
    }
}

async fn writer_loop(
    ws: Arc<Mutex<Box<dyn WsConnection>>>,
    exec: Arc<Mutex<Box<dyn InteractiveExec>>>,
    alive: Arc<AtomicBool>,
) {
    while alive.load(Ordering::Acquire) {
        let message = ws.lock().await.recv().await;
        match message {
            Ok(Some(WsMessage::Text(text))) => {
                if exec.lock().await.write(text.as_bytes()).await.is_err() {
                    alive.store(false, Ordering::Release);
                    break;
                }
            }
            Ok(Some(WsMessage::Binary(data))) => {
                if exec.lock().await.write(&data).await.is_err() {
                    alive.store(false, Ordering::Release);
                    break;
                }
            }
            Ok(None) => {
                alive.store(false, Ordering::Release);
                break;
            }
            Err(err) => {
                tracing::debug!(%err, "console websocket recv failed, ending pump");
                alive.store(false, Ordering::Release);
                break;
            }
        }
    }
}
