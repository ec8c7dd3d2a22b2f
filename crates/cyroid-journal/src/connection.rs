//! Tracked-connection records (§3) and the ingestion path that resolves
//! VM ids from raw IP pairs at write time (§4.8).

use chrono::{DateTime, Utc};
use cyroid_common::error::Result;
use cyroid_common::ids::{ConnectionId, RangeId, VmId};
use cyroid_common::status::{ConnectionProtocol, ConnectionState};
use serde::{Deserialize, Serialize};

/// A tracked network connection (§3's `Connection`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Stable identifier.
    pub id: ConnectionId,
    /// Owning range.
    pub range_id: RangeId,
    /// Source VM, resolved from `src_ip` at ingestion time, if any.
    pub src_vm_id: Option<VmId>,
    /// Destination VM, resolved from `dst_ip` at ingestion time, if any.
    pub dst_vm_id: Option<VmId>,
    /// Source IP address.
    pub src_ip: String,
    /// Source port.
    pub src_port: u16,
    /// Destination IP address.
    pub dst_ip: String,
    /// Destination port.
    pub dst_port: u16,
    /// Transport protocol.
    pub protocol: ConnectionProtocol,
    /// Observed connection state.
    pub state: ConnectionState,
    /// Bytes observed flowing source → destination.
    pub bytes_sent: u64,
    /// Bytes observed flowing destination → source.
    pub bytes_received: u64,
    /// Time the connection was first observed.
    pub started_at: DateTime<Utc>,
    /// Time the connection ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
}

/// Raw observation handed in by an external flow probe, before VM ids are
/// resolved (§4.8: "written by an external observer... the core's duty is
/// storage + query + VM-ID resolution from IP pairs at write time").
#[derive(Debug, Clone)]
pub struct ConnectionSample {
    /// Owning range.
    pub range_id: RangeId,
    /// Source IP address.
    pub src_ip: String,
    /// Source port.
    pub src_port: u16,
    /// Destination IP address.
    pub dst_ip: String,
    /// Destination port.
    pub dst_port: u16,
    /// Transport protocol.
    pub protocol: ConnectionProtocol,
    /// Observed connection state.
    pub state: ConnectionState,
    /// Bytes observed flowing source → destination.
    pub bytes_sent: u64,
    /// Bytes observed flowing destination → source.
    pub bytes_received: u64,
    /// Time the connection was first observed.
    pub started_at: DateTime<Utc>,
    /// Time the connection ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
}

/// Resolves an IP address to the VM attached to it within a range.
///
/// Implemented by a facade over the topology store's VM primary-IP
/// index; this crate stays decoupled from `cyroid-topology` (§9's
/// "constructor injection, not implicit globals" guidance).
pub trait VmIpResolver: Send + Sync {
    /// Looks up the VM whose primary IP is `ip` within `range_id`.
    ///
    /// # Errors
    /// Returns an error only for a repository failure; an unmatched IP
    /// is `Ok(None)`.
    fn resolve_by_ip(&self, range_id: RangeId, ip: &str) -> Result<Option<VmId>>;
}

/// Resolves VM ids for `sample` and builds a storable [`Connection`]
/// (§4.8). Does not itself persist the record — callers pass the result
/// to a [`crate::store::JournalStore::record_connection`].
///
/// # Errors
/// Propagates any [`VmIpResolver`] failure.
pub fn resolve_connection(resolver: &dyn VmIpResolver, sample: ConnectionSample) -> Result<Connection> {
    let src_vm_id = resolver.resolve_by_ip(sample.range_id, &sample.src_ip)?;
    let dst_vm_id = resolver.resolve_by_ip(sample.range_id, &sample.dst_ip)?;
    Ok(Connection {
        id: ConnectionId::new(),
        range_id: sample.range_id,
        src_vm_id,
        dst_vm_id,
        src_ip: sample.src_ip,
        src_port: sample.src_port,
        dst_ip: sample.dst_ip,
        dst_port: sample.dst_port,
        protocol: sample.protocol,
        state: sample.state,
        bytes_sent: sample.bytes_sent,
        bytes_received: sample.bytes_received,
        started_at: sample.started_at,
        ended_at: sample.ended_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeResolver;
    impl VmIpResolver for FakeResolver {
        fn resolve_by_ip(&self, _: RangeId, ip: &str) -> Result<Option<VmId>> {
            if ip == "10.0.1.10" {
                Ok(Some(VmId::new()))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn resolves_known_ips_and_leaves_unknown_ones_none() {
        let sample = ConnectionSample {
            range_id: RangeId::new(),
            src_ip: "10.0.1.10".to_string(),
            src_port: 443,
            dst_ip: "8.8.8.8".to_string(),
            dst_port: 53,
            protocol: ConnectionProtocol::Tcp,
            state: ConnectionState::Established,
            bytes_sent: 100,
            bytes_received: 200,
            started_at: Utc::now(),
            ended_at: None,
        };
        let conn = resolve_connection(&FakeResolver, sample).unwrap();
        assert!(conn.src_vm_id.is_some());
        assert!(conn.dst_vm_id.is_none());
    }
}
