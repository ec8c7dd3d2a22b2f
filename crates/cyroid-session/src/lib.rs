//! Session Multiplexer (C7): WebSocket-based shell console, VNC proxy,
//! and coalesced range-status polling (§4.7).

pub mod console;
pub mod status;
pub mod vnc;
pub mod ws;

pub use console::{run_console, CONSOLE_SHELL_COMMAND};
pub use status::{run_status_poller, RangeStatusSource, StatusSnapshot, STATUS_POLL_INTERVAL};
pub use vnc::{resolve_vm_ip, run_vnc_proxy, upstream_url, VncUpstream};
pub use ws::{close_not_found, close_unauthorized, WsConnection, WsMessage};
