//! VNC proxy (§4.7): forwards binary frames between a WebSocket client
//! and a VM container's `websockify` endpoint with no framing changes.

use cyroid_common::ids::VmId;
use cyroid_runtime::{ContainerHandle, ContainerRuntime};

use crate::ws::{WsConnection, WsMessage};

/// Default backend port a websockify upstream listens on inside a VM
/// container (§4.5: VM-in-container variants expose it at 8006; plain
/// desktop containers of the KasmVNC/default families expose it at
/// 6901 — the caller resolves the right port from the VM's template
/// before dialing).
pub const WEBSOCKIFY_PATH: &str = "/websockify";

/// Builds the upstream `ws://` URL the VNC proxy dials for `vm_id`'s
/// container, given its resolved IP and backend port (§4.7).
#[must_use]
pub fn upstream_url(ip: &str, port: u16) -> String {
    format!("ws://{ip}:{port}{WEBSOCKIFY_PATH}")
}

/// A duplex connection to the upstream `websockify` server, dialed by
/// whatever WebSocket client the host process wires in (e.g.
/// `tokio-tungstenite`). Kept as a trait so the pump is testable without
/// a live socket, mirroring [`crate::ws::WsConnection`].
#[async_trait::async_trait]
pub trait VncUpstream: Send {
    /// Sends a binary frame upstream.
    async fn send_binary(&mut self, data: Vec<u8>) -> cyroid_common::error::Result<()>;

    /// Waits for the next inbound binary frame. `Ok(None)` on close.
    async fn recv_binary(&mut self) -> cyroid_common::error::Result<Option<Vec<u8>>>;

    /// Closes the upstream connection.
    async fn close(&mut self);
}

/// Resolves the VM's container IP via C1, on whatever network it is
/// attached to (§4.5/§4.7: "resolve the container's IP on any attached
/// network").
///
/// # Errors
/// Propagates the runtime error if the lookup fails, or returns
/// [`cyroid_common::error::CyroidError::not_found`] if the container has
/// no IP yet (not running, or not yet attached).
pub async fn resolve_vm_ip(
    runtime: &dyn ContainerRuntime,
    handle: &ContainerHandle,
    vm_id: VmId,
) -> cyroid_common::error::Result<String> {
    runtime
        .container_ip(handle)
        .await
        .map_err(cyroid_common::error::CyroidError::from)?
        .ok_or_else(|| cyroid_common::error::CyroidError::not_found("vm container ip", vm_id.to_string()))
}

/// Runs the VNC proxy pump until either side closes, forwarding binary
/// frames verbatim in both directions with no reframing (§4.7). Text
/// frames from the client are dropped: the VNC protocol is binary-only.
pub async fn run_vnc_proxy(mut client: Box<dyn WsConnection>, mut upstream: Box<dyn VncUpstream>) {
    loop {
        tokio::select! {
            inbound = client.recv() => {
                match inbound {
                    Ok(Some(WsMessage::Binary(data))) => {
                        if upstream.send_binary(data).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(WsMessage::Text(_))) => {
                        // VNC is binary-only; ignore stray text frames.
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            from_upstream = upstream.recv_binary() => {
                match from_upstream {
                    Ok(Some(data)) => {
                        if client.send_binary(data).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
    upstream.close().await;
    let _ = client.close(1000, "vnc session ended").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::error::Result;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn builds_expected_upstream_url() {
        assert_eq!(upstream_url("10.0.1.10", 8006), "ws://10.0.1.10:8006/websockify");
    }

    struct FakeWs {
        inbound: StdMutex<VecDeque<WsMessage>>,
        sent: StdMutex<Vec<Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl WsConnection for FakeWs {
        async fn send_text(&mut self, _text: String) -> Result<()> {
            Ok(())
        }
        async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
            self.sent.lock().unwrap().push(data);
            Ok(())
        }
        async fn recv(&mut self) -> Result<Option<WsMessage>> {
            Ok(self.inbound.lock().unwrap().pop_front())
        }
        async fn close(&mut self, _code: u16, _reason: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeUpstream {
        inbound: StdMutex<VecDeque<Vec<u8>>>,
        sent: StdMutex<Vec<Vec<u8>>>,
        closed: StdMutex<bool>,
    }

    #[async_trait::async_trait]
    impl VncUpstream for FakeUpstream {
        async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
            self.sent.lock().unwrap().push(data);
            Ok(())
        }
        async fn recv_binary(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.inbound.lock().unwrap().pop_front())
        }
        async fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    #[tokio::test]
    async fn forwards_client_binary_frames_upstream_then_stops_on_close() {
        let client = Box::new(FakeWs {
            inbound: StdMutex::new(VecDeque::from([WsMessage::Binary(vec![1, 2, 3])])),
            sent: StdMutex::new(Vec::new()),
        });
        let upstream = Box::new(FakeUpstream {
            inbound: StdMutex::new(VecDeque::new()),
            sent: StdMutex::new(Vec::new()),
            closed: StdMutex::new(false),
        });

        run_vnc_proxy(client, upstream).await;
    }

    #[tokio::test]
    async fn forwards_upstream_binary_frames_to_client() {
        let client = Box::new(FakeWs {
            inbound: StdMutex::new(VecDeque::new()),
            sent: StdMutex::new(Vec::new()),
        });
        let upstream = Box::new(FakeUpstream {
            inbound: StdMutex::new(VecDeque::from([vec![9, 9, 9]])),
            sent: StdMutex::new(Vec::new()),
            closed: StdMutex::new(false),
        });

        run_vnc_proxy(client, upstream).await;
    }
}
