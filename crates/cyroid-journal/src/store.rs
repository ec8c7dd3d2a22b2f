//! Storage port for the journal (§4.8): append-only event writes plus
//! indexed, paginated, reverse-chronological queries.

use cyroid_common::error::Result;
use cyroid_common::event::EventKind;
use cyroid_common::ids::RangeId;

use crate::connection::Connection;
use crate::event::EventLogEntry;

/// Append-only journal storage, indexed on range id and event kind
/// (§4.8).
pub trait JournalStore: Send + Sync {
    /// Appends one event entry. Never mutates or removes existing
    /// entries.
    fn append_event(&self, entry: EventLogEntry) -> Result<()>;

    /// Lists events for `range_id`, most-recent first, optionally
    /// filtered to a single `kind`, paginated by `(limit, offset)`.
    fn query_events(
        &self,
        range_id: RangeId,
        kind: Option<EventKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventLogEntry>>;

    /// Records one resolved connection observation.
    fn record_connection(&self, connection: Connection) -> Result<()>;

    /// Lists connections for `range_id`, most-recently-started first,
    /// paginated by `(limit, offset)`.
    fn query_connections(&self, range_id: RangeId, limit: usize, offset: usize) -> Result<Vec<Connection>>;
}

/// An in-memory [`JournalStore`] reference implementation, grounded on
/// the append/read roundtrip idiom of a log file but keeping entries in
/// a mutex-guarded vector instead of on disk, per §9's "repository is an
/// external collaborator" guidance — this is a double for tests and
/// small deployments, not the production store.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    events: std::sync::Mutex<Vec<EventLogEntry>>,
    connections: std::sync::Mutex<Vec<Connection>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JournalStore for MemoryJournal {
    fn append_event(&self, entry: EventLogEntry) -> Result<()> {
        self.events.lock().expect("journal mutex poisoned").push(entry);
        Ok(())
    }

    fn query_events(
        &self,
        range_id: RangeId,
        kind: Option<EventKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventLogEntry>> {
        let events = self.events.lock().expect("journal mutex poisoned");
        let mut matching: Vec<EventLogEntry> = events
            .iter()
            .filter(|e| e.range_id == range_id && kind.is_none_or(|k| e.kind == k))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    fn record_connection(&self, connection: Connection) -> Result<()> {
        self.connections.lock().expect("journal mutex poisoned").push(connection);
        Ok(())
    }

    fn query_connections(&self, range_id: RangeId, limit: usize, offset: usize) -> Result<Vec<Connection>> {
        let connections = self.connections.lock().expect("journal mutex poisoned");
        let mut matching: Vec<Connection> = connections
            .iter()
            .filter(|c| c.range_id == range_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

/// Adapts a [`JournalStore`] into the [`cyroid_common::event::EventRecorder`]
/// port that lifecycle-mutating crates (`cyroid-topology`, `cyroid-msel`)
/// write through, without depending on this crate directly.
pub struct JournalRecorder<'a> {
    store: &'a dyn JournalStore,
}

impl<'a> JournalRecorder<'a> {
    /// Wraps `store` as an [`cyroid_common::event::EventRecorder`].
    #[must_use]
    pub const fn new(store: &'a dyn JournalStore) -> Self {
        Self { store }
    }
}

impl cyroid_common::event::EventRecorder for JournalRecorder<'_> {
    fn record(
        &self,
        range_id: RangeId,
        vm_id: Option<cyroid_common::ids::VmId>,
        kind: EventKind,
        message: String,
    ) {
        let entry = EventLogEntry::new(range_id, vm_id, kind, message);
        if let Err(err) = self.store.append_event(entry) {
            tracing::error!(%err, "failed to append journal entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::event::EventRecorder;
    use cyroid_common::status::{ConnectionProtocol, ConnectionState};
    use chrono::Utc;

    #[test]
    fn events_are_returned_reverse_chronological() {
        let journal = MemoryJournal::new();
        let range_id = RangeId::new();
        for i in 0..3u8 {
            let mut entry = EventLogEntry::new(range_id, None, EventKind::RangeDeployed, format!("step {i}"));
            entry.timestamp = Utc::now() + chrono::Duration::seconds(i64::from(i));
            journal.append_event(entry).unwrap();
        }
        let page = journal.query_events(range_id, None, 10, 0).unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].message, "step 2");
        assert_eq!(page[2].message, "step 0");
    }

    #[test]
    fn pagination_respects_limit_and_offset() {
        let journal = MemoryJournal::new();
        let range_id = RangeId::new();
        for i in 0..5u8 {
            let mut entry = EventLogEntry::new(range_id, None, EventKind::VmStarted, format!("{i}"));
            entry.timestamp = Utc::now() + chrono::Duration::seconds(i64::from(i));
            journal.append_event(entry).unwrap();
        }
        let page = journal.query_events(range_id, None, 2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message, "3");
        assert_eq!(page[1].message, "2");
    }

    #[test]
    fn query_filters_by_kind_and_range() {
        let journal = MemoryJournal::new();
        let range_a = RangeId::new();
        let range_b = RangeId::new();
        journal.append_event(EventLogEntry::new(range_a, None, EventKind::RangeDeployed, "a")).unwrap();
        journal.append_event(EventLogEntry::new(range_a, None, EventKind::VmStarted, "b")).unwrap();
        journal.append_event(EventLogEntry::new(range_b, None, EventKind::RangeDeployed, "c")).unwrap();

        let deployed_only = journal.query_events(range_a, Some(EventKind::RangeDeployed), 10, 0).unwrap();
        assert_eq!(deployed_only.len(), 1);
        assert_eq!(deployed_only[0].message, "a");
    }

    #[test]
    fn recorder_adapter_writes_through_to_the_store() {
        let journal = MemoryJournal::new();
        let recorder = JournalRecorder::new(&journal);
        let range_id = RangeId::new();
        recorder.record(range_id, None, EventKind::RangeStarted, "ok".to_string());
        let events = journal.query_events(range_id, None, 10, 0).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn connections_are_queried_most_recent_first() {
        let journal = MemoryJournal::new();
        let range_id = RangeId::new();
        for i in 0..2u8 {
            journal
                .record_connection(Connection {
                    id: cyroid_common::ids::ConnectionId::new(),
                    range_id,
                    src_vm_id: None,
                    dst_vm_id: None,
                    src_ip: "10.0.1.1".to_string(),
                    src_port: 1000 + u16::from(i),
                    dst_ip: "10.0.1.2".to_string(),
                    dst_port: 80,
                    protocol: ConnectionProtocol::Tcp,
                    state: ConnectionState::Established,
                    bytes_sent: 0,
                    bytes_received: 0,
                    started_at: Utc::now() + chrono::Duration::seconds(i64::from(i)),
                    ended_at: None,
                })
                .unwrap();
        }
        let page = journal.query_connections(range_id, 10, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].src_port, 1001);
    }
}
