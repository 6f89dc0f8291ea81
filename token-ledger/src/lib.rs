//! Token Ledger
//!
//! Fixed-supply fungible token ledger: balances, allowances, direct and
//! delegated transfers.
//!
//! # Architecture
//!
//! - **State machine**: `LedgerState` validates every precondition before any write
//! - **Single lock**: one `RwLock` per ledger serializes all mutations
//! - **Actor front-end**: a Tokio task gives async callers a total order
//! - **Event sinks**: `Transfer`/`Approval` records handed off in commit order
//! - **Snapshots**: digest-checked persistence across restarts

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - Supply conservation: Σ(balances) == total supply for all time
//! - Atomicity: an operation applies all of its writes or none
//! - Allowances only shrink through `transfer_from` by that exact spender
//! - No wrapping arithmetic: overflow is an invariant violation

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod state;
pub mod events;
pub mod ledger;
pub mod storage;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{Address, Amount, Genesis, TokenMetadata};
pub use events::{EventRecord, EventSink, TokenEvent};
pub use ledger::Ledger;
pub use storage::{LedgerSnapshot, SnapshotStore};
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use config::Config;
pub use metrics::Metrics;
