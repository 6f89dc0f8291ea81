//! Snapshot persistence
//!
//! The ledger is held in memory; a [`SnapshotStore`] persists point-in-time
//! [`LedgerSnapshot`]s so a restarted process resumes where it stopped.
//!
//! # File format
//!
//! A single bincode-encoded `LedgerSnapshot`. Writes go to `<path>.tmp`,
//! are fsynced, then renamed over `<path>`, so a crash mid-write leaves the
//! previous snapshot intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    state::LedgerState,
    types::{Address, Amount, TokenMetadata},
};

/// One allowance entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    /// Account whose balance is delegated
    pub owner: Address,
    /// Account allowed to spend
    pub spender: Address,
    /// Remaining allowance
    pub amount: Amount,
}

/// Consistent point-in-time copy of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Token metadata
    pub metadata: TokenMetadata,

    /// Non-zero balances, ordered by address
    pub balances: Vec<(Address, Amount)>,

    /// Non-zero allowances, ordered by (owner, spender)
    pub allowances: Vec<AllowanceEntry>,

    /// Sequence number the next event will carry
    pub next_sequence: u64,

    /// SHA-256 over metadata, balances, allowances and next sequence
    pub state_root: [u8; 32],

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    /// Capture state
    pub fn capture(metadata: &TokenMetadata, state: &LedgerState, next_sequence: u64) -> Self {
        let balances: Vec<(Address, Amount)> =
            state.balances().iter().map(|(a, v)| (*a, *v)).collect();
        let allowances: Vec<AllowanceEntry> = state
            .allowances()
            .iter()
            .map(|((owner, spender), amount)| AllowanceEntry {
                owner: *owner,
                spender: *spender,
                amount: *amount,
            })
            .collect();
        let state_root = compute_state_root(metadata, &balances, &allowances, next_sequence);

        Self {
            metadata: metadata.clone(),
            balances,
            allowances,
            next_sequence,
            state_root,
            taken_at: Utc::now(),
        }
    }

    /// State root as hex
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Check the digest, the null-address rules and the conservation invariant
    pub fn verify(&self) -> Result<()> {
        let expected = compute_state_root(
            &self.metadata,
            &self.balances,
            &self.allowances,
            self.next_sequence,
        );
        if expected != self.state_root {
            return Err(Error::Storage(format!(
                "state root mismatch: stored {}, computed {}",
                self.state_root_hex(),
                hex::encode(expected)
            )));
        }

        self.metadata.validate()?;

        if self.balances.iter().any(|(account, _)| account.is_zero()) {
            return Err(Error::InvariantViolation(
                "snapshot credits the null address".to_string(),
            ));
        }

        if self
            .allowances
            .iter()
            .any(|e| e.owner.is_zero() || e.spender.is_zero())
        {
            return Err(Error::InvariantViolation(
                "snapshot holds an allowance for the null address".to_string(),
            ));
        }

        let total = self
            .balances
            .iter()
            .try_fold(Amount::ZERO, |acc, (_, v)| acc.checked_add(*v))
            .ok_or_else(|| Error::InvariantViolation("snapshot balances overflow".to_string()))?;
        if total != self.metadata.total_supply {
            return Err(Error::InvariantViolation(format!(
                "snapshot balances sum to {}, total supply is {}",
                total, self.metadata.total_supply
            )));
        }

        Ok(())
    }

    /// Rebuild the balance/allowance state
    pub fn to_state(&self) -> LedgerState {
        LedgerState::from_parts(
            self.balances.iter().copied(),
            self.allowances
                .iter()
                .map(|e| ((e.owner, e.spender), e.amount)),
        )
    }
}

/// Deterministic digest of ledger contents
fn compute_state_root(
    metadata: &TokenMetadata,
    balances: &[(Address, Amount)],
    allowances: &[AllowanceEntry],
    next_sequence: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();

    // Length-prefix variable-width fields
    hasher.update((metadata.name.len() as u64).to_be_bytes());
    hasher.update(metadata.name.as_bytes());
    hasher.update((metadata.symbol.len() as u64).to_be_bytes());
    hasher.update(metadata.symbol.as_bytes());
    hasher.update([metadata.decimals]);
    hasher.update(metadata.total_supply.as_u128().to_be_bytes());

    hasher.update((balances.len() as u64).to_be_bytes());
    for (account, amount) in balances {
        hasher.update(account.as_bytes());
        hasher.update(amount.as_u128().to_be_bytes());
    }

    hasher.update((allowances.len() as u64).to_be_bytes());
    for entry in allowances {
        hasher.update(entry.owner.as_bytes());
        hasher.update(entry.spender.as_bytes());
        hasher.update(entry.amount.as_u128().to_be_bytes());
    }

    hasher.update(next_sequence.to_be_bytes());
    hasher.finalize().into()
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Store writing to `path`; creates the parent directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Snapshot file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a snapshot atomically
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let bytes = bincode::serialize(snapshot)?;
        let tmp = self.path.with_extension("tmp");

        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::info!(
            path = ?self.path,
            bytes = bytes.len(),
            holders = snapshot.balances.len(),
            next_sequence = snapshot.next_sequence,
            state_root = %snapshot.state_root_hex(),
            "Saved ledger snapshot"
        );
        Ok(())
    }

    /// Load and verify the snapshot, if one exists
    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        let snapshot: LedgerSnapshot = bincode::deserialize(&bytes)?;
        snapshot.verify()?;

        tracing::info!(
            path = ?self.path,
            holders = snapshot.balances.len(),
            next_sequence = snapshot.next_sequence,
            "Loaded ledger snapshot"
        );
        Ok(Some(snapshot))
    }
}
