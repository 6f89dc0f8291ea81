//! Main ledger interface
//!
//! Ties the balance/allowance state machine to locking, event delivery,
//! metrics and snapshots.
//!
//! # Example
//!
//! ```
//! use token_ledger::{Address, Amount, Genesis, Ledger, TokenMetadata};
//!
//! # fn main() -> token_ledger::Result<()> {
//! let deployer = Address::derive(b"deployer");
//! let receiver = Address::derive(b"receiver");
//!
//! let ledger = Ledger::new(Genesis {
//!     metadata: TokenMetadata {
//!         name: "Boost Token".to_string(),
//!         symbol: "BOOST".to_string(),
//!         decimals: 18,
//!         total_supply: Amount::new(1_000_000),
//!     },
//!     initial_holder: deployer,
//! })?;
//!
//! ledger.transfer(deployer, receiver, Amount::new(100))?;
//! assert_eq!(ledger.balance_of(&receiver), Amount::new(100));
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    events::{EventRecord, EventSink, NullSink, TokenEvent},
    metrics::Metrics,
    state::LedgerState,
    storage::LedgerSnapshot,
    types::{Address, Amount, Genesis, TokenMetadata},
    Error, Result,
};

/// Everything guarded by the ledger lock
#[derive(Debug)]
struct Inner {
    state: LedgerState,
    next_sequence: u64,
}

/// Fixed-supply fungible token ledger
///
/// Every mutating call runs its checks and writes under a single write lock,
/// so operations from concurrent callers are serialized into one total order
/// and no reader ever observes a half-applied update.
pub struct Ledger {
    /// Immutable metadata
    metadata: TokenMetadata,

    /// Balances, allowances and the event sequence counter
    inner: RwLock<Inner>,

    /// Notification sink
    sink: Arc<dyn EventSink>,

    /// Metrics (if enabled)
    metrics: Option<Metrics>,
}

impl Ledger {
    /// Create a ledger crediting the whole supply to the initial holder
    pub fn new(genesis: Genesis) -> Result<Self> {
        genesis.validate()?;

        tracing::info!(
            name = %genesis.metadata.name,
            symbol = %genesis.metadata.symbol,
            decimals = genesis.metadata.decimals,
            total_supply = %genesis.metadata.total_supply,
            initial_holder = %genesis.initial_holder,
            "Initialized token ledger"
        );

        let state = LedgerState::genesis(genesis.initial_holder, genesis.metadata.total_supply);
        Ok(Self::from_parts(genesis.metadata, state, 0))
    }

    /// Restore a ledger from a verified snapshot
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.verify()?;
        let state = snapshot.to_state();
        Ok(Self::from_parts(snapshot.metadata, state, snapshot.next_sequence))
    }

    fn from_parts(metadata: TokenMetadata, state: LedgerState, next_sequence: u64) -> Self {
        Self {
            metadata,
            inner: RwLock::new(Inner {
                state,
                next_sequence,
            }),
            sink: Arc::new(NullSink),
            metrics: None,
        }
    }

    /// Set notification sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Enable metrics
    pub fn with_metrics(self, metrics: Metrics) -> Self {
        metrics.set_holders(self.inner.read().state.balances().len());
        Self {
            metrics: Some(metrics),
            ..self
        }
    }

    /// Token name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    /// Decimal places
    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    /// Fixed total supply in base units
    pub fn total_supply(&self) -> Amount {
        self.metadata.total_supply
    }

    /// All metadata
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Current balance (zero if the account never held tokens)
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.inner.read().state.balance_of(account)
    }

    /// Remaining delegated amount (zero if never approved)
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.inner.read().state.allowance(owner, spender)
    }

    /// Move `amount` from `caller` to `to`
    pub fn transfer(&self, caller: Address, to: Address, amount: Amount) -> Result<EventRecord> {
        self.commit("transfer", |state| state.transfer(caller, to, amount))
    }

    /// Allow `spender` to move up to `amount` out of `caller`'s balance
    ///
    /// Replaces any existing allowance rather than adding to it.
    pub fn approve(&self, caller: Address, spender: Address, amount: Amount) -> Result<EventRecord> {
        self.commit("approve", |state| state.approve(caller, spender, amount))
    }

    /// Spend `caller`'s allowance over `from` to move `amount` to `to`
    pub fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<EventRecord> {
        self.commit("transfer_from", |state| {
            state.transfer_from(caller, from, to, amount)
        })
    }

    /// Accounts with a non-zero balance, ordered by address
    pub fn holders(&self) -> Vec<(Address, Amount)> {
        self.inner
            .read()
            .state
            .balances()
            .iter()
            .map(|(a, v)| (*a, *v))
            .collect()
    }

    /// Sequence number the next committed event will carry
    pub fn next_sequence(&self) -> u64 {
        self.inner.read().next_sequence
    }

    /// Check the conservation invariant
    ///
    /// Verify that the sum of all balances equals the total supply.
    pub fn check_conservation(&self) -> Result<bool> {
        let total = self.inner.read().state.total_balance()?;
        Ok(total == self.metadata.total_supply)
    }

    /// Consistent point-in-time snapshot
    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.read();
        LedgerSnapshot::capture(&self.metadata, &inner.state, inner.next_sequence)
    }

    /// Run one state transition under the write lock
    fn commit<F>(&self, operation: &'static str, apply: F) -> Result<EventRecord>
    where
        F: FnOnce(&mut LedgerState) -> Result<TokenEvent>,
    {
        let started = Instant::now();
        let mut inner = self.inner.write();

        let result = match inner.next_sequence.checked_add(1) {
            Some(_) => apply(&mut inner.state),
            None => Err(Error::InvariantViolation(
                "event sequence exhausted".to_string(),
            )),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_duration(operation, started.elapsed().as_secs_f64());
        }

        match result {
            Ok(event) => {
                let record = EventRecord::new(inner.next_sequence, event);
                inner.next_sequence = record.sequence + 1;

                match &record.event {
                    TokenEvent::Transfer { from, to, value } => tracing::debug!(
                        operation,
                        sequence = record.sequence,
                        from = %from,
                        to = %to,
                        value = %value,
                        "Committed"
                    ),
                    TokenEvent::Approval {
                        owner,
                        spender,
                        value,
                    } => tracing::debug!(
                        operation,
                        sequence = record.sequence,
                        owner = %owner,
                        spender = %spender,
                        value = %value,
                        "Committed"
                    ),
                }

                if let Some(metrics) = &self.metrics {
                    match record.event {
                        TokenEvent::Transfer { .. } => metrics.record_transfer(),
                        TokenEvent::Approval { .. } => metrics.record_approval(),
                    }
                    metrics.set_holders(inner.state.balances().len());
                }

                self.sink.emit(&record);
                Ok(record)
            }
            Err(err) => {
                if err.is_rejection() {
                    tracing::warn!(operation, error = %err, "Rejected");
                } else {
                    tracing::error!(operation, error = %err, "Operation failed");
                }

                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(err.reason());
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("metadata", &self.metadata)
            .field("inner", &*self.inner.read())
            .finish_non_exhaustive()
    }
}

impl TryFrom<Genesis> for Ledger {
    type Error = Error;

    fn try_from(genesis: Genesis) -> Result<Self> {
        Ledger::new(genesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    const SUPPLY: u128 = 1_000_000;

    fn create_test_ledger() -> (Ledger, Arc<MemorySink>, Address) {
        let deployer = Address::derive(b"deployer");
        let sink = Arc::new(MemorySink::new());
        let ledger = Ledger::new(Genesis {
            metadata: TokenMetadata {
                name: "Boost Token".to_string(),
                symbol: "BOOST".to_string(),
                decimals: 18,
                total_supply: Amount::new(SUPPLY),
            },
            initial_holder: deployer,
        })
        .unwrap()
        .with_sink(sink.clone());

        (ledger, sink, deployer)
    }

    #[test]
    fn test_metadata_accessors() {
        let (ledger, _, deployer) = create_test_ledger();
        assert_eq!(ledger.name(), "Boost Token");
        assert_eq!(ledger.symbol(), "BOOST");
        assert_eq!(ledger.decimals(), 18);
        assert_eq!(ledger.total_supply(), Amount::new(SUPPLY));
        assert_eq!(ledger.balance_of(&deployer), Amount::new(SUPPLY));
    }

    #[test]
    fn test_events_are_sequenced() {
        let (ledger, sink, deployer) = create_test_ledger();
        let receiver = Address::derive(b"receiver");
        let exchange = Address::derive(b"exchange");

        let first = ledger.transfer(deployer, receiver, Amount::new(1)).unwrap();
        let second = ledger.approve(deployer, exchange, Amount::new(1)).unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(ledger.next_sequence(), 2);
        assert_eq!(sink.records(), vec![first, second]);
    }

    #[test]
    fn test_rejection_emits_nothing() {
        let (ledger, sink, deployer) = create_test_ledger();

        let result = ledger.transfer(deployer, Address::ZERO, Amount::new(1));

        assert!(matches!(result, Err(Error::InvalidRecipient)));
        assert!(sink.is_empty());
        assert_eq!(ledger.next_sequence(), 0);
    }

    #[test]
    fn test_metrics_recorded() {
        let (ledger, _, deployer) = create_test_ledger();
        let metrics = Metrics::new().unwrap();
        let ledger = ledger.with_metrics(metrics.clone());
        let receiver = Address::derive(b"receiver");

        ledger.transfer(deployer, receiver, Amount::new(10)).unwrap();
        let _ = ledger.transfer(receiver, deployer, Amount::new(11));

        assert_eq!(metrics.transfers_total.get(), 1);
        assert_eq!(metrics.holders.get(), 2);
        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["insufficient_balance"])
                .get(),
            1
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let (ledger, _, deployer) = create_test_ledger();
        let receiver = Address::derive(b"receiver");
        let exchange = Address::derive(b"exchange");
        ledger.transfer(deployer, receiver, Amount::new(100)).unwrap();
        ledger.approve(receiver, exchange, Amount::new(30)).unwrap();

        let restored = Ledger::from_snapshot(ledger.snapshot()).unwrap();

        assert_eq!(restored.holders(), ledger.holders());
        assert_eq!(restored.allowance(&receiver, &exchange), Amount::new(30));
        assert_eq!(restored.next_sequence(), 2);
        assert!(restored.check_conservation().unwrap());
    }

    #[test]
    fn test_commit_logs_event_fields() {
        #[derive(Clone, Default)]
        struct Logs(Arc<parking_lot::Mutex<Vec<u8>>>);

        impl std::io::Write for Logs {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let (ledger, _, deployer) = create_test_ledger();
        let receiver = Address::derive(b"receiver");
        let logs = Logs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            ledger.transfer(deployer, receiver, Amount::new(42)).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("Committed"));
        assert!(output.contains(&format!("from={}", deployer)));
        assert!(output.contains(&format!("to={}", receiver)));
        assert!(output.contains("value=42"));
    }

    #[test]
    fn test_exhausted_sequence_rejects_without_mutation() {
        let (ledger, _, deployer) = create_test_ledger();
        let receiver = Address::derive(b"receiver");

        let inner = ledger.inner.read();
        let snapshot = LedgerSnapshot::capture(&ledger.metadata, &inner.state, u64::MAX);
        drop(inner);

        let restored = Ledger::from_snapshot(snapshot).unwrap();
        let result = restored.transfer(deployer, receiver, Amount::new(1));

        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        assert_eq!(restored.balance_of(&deployer), Amount::new(SUPPLY));
        assert_eq!(restored.balance_of(&receiver), Amount::ZERO);
        assert_eq!(restored.next_sequence(), u64::MAX);
    }

    #[test]
    fn test_genesis_rejects_null_holder() {
        let result = Ledger::try_from(Genesis {
            metadata: TokenMetadata {
                name: "Boost Token".to_string(),
                symbol: "BOOST".to_string(),
                decimals: 18,
                total_supply: Amount::new(SUPPLY),
            },
            initial_holder: Address::ZERO,
        });
        assert!(matches!(result, Err(Error::InvalidRecipient)));
    }
}
