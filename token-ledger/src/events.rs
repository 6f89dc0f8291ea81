//! Ledger notifications and the sinks that receive them
//!
//! The ledger decides *what* to emit; an [`EventSink`] decides where it goes.
//! Sinks are invoked while the ledger's write lock is held, so the order a
//! sink observes is the commit order. Implementations must not block.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{Address, Amount};

/// Notification emitted by a successful mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TokenEvent {
    /// Units moved between balances (direct or delegated)
    Transfer {
        /// Debited account
        from: Address,
        /// Credited account
        to: Address,
        /// Units moved
        value: Amount,
    },

    /// Allowance set
    Approval {
        /// Account whose balance is delegated
        owner: Address,
        /// Account allowed to spend
        spender: Address,
        /// New allowance
        value: Amount,
    },
}

impl TokenEvent {
    /// Event name (`Transfer` or `Approval`)
    pub fn name(&self) -> &'static str {
        match self {
            TokenEvent::Transfer { .. } => "Transfer",
            TokenEvent::Approval { .. } => "Approval",
        }
    }
}

/// Event stamped with its position in the ledger's commit order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Gap-free commit sequence number, starting at 0
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,

    /// The notification itself
    pub event: TokenEvent,
}

impl EventRecord {
    /// Stamp an event
    pub fn new(sequence: u64, event: TokenEvent) -> Self {
        Self {
            sequence,
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Receiver of ledger notifications
pub trait EventSink: Send + Sync {
    /// Deliver one committed event
    fn emit(&self, record: &EventRecord);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _record: &EventRecord) {}
}

/// In-process event log
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record received so far
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Most recent record
    pub fn last(&self) -> Option<EventRecord> {
        self.records.lock().last().cloned()
    }

    /// Number of records received
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no record has been received
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return all records
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, record: &EventRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Fan-out to live subscribers over a tokio broadcast channel
///
/// Slow subscribers lag (and observe `RecvError::Lagged`) rather than
/// blocking the ledger.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<EventRecord>,
}

impl BroadcastSink {
    /// Create with the given per-subscriber buffer
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, record: &EventRecord) {
        // No subscribers is not an error
        let _ = self.sender.send(record.clone());
    }
}

/// Logs each event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, record: &EventRecord) {
        match &record.event {
            TokenEvent::Transfer { from, to, value } => tracing::info!(
                sequence = record.sequence,
                event_id = %record.event_id,
                %from,
                %to,
                %value,
                "Transfer"
            ),
            TokenEvent::Approval {
                owner,
                spender,
                value,
            } => tracing::info!(
                sequence = record.sequence,
                event_id = %record.event_id,
                %owner,
                %spender,
                %value,
                "Approval"
            ),
        }
    }
}

/// Delivers every event to each inner sink in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, record: &EventRecord) {
        for sink in &self.sinks {
            sink.emit(record);
        }
    }
}
