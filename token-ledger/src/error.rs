//! Error types for the token ledger

use thiserror::Error;

use crate::types::{Address, Amount};

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transfer names the null address as recipient
    #[error("Invalid recipient: cannot transfer to the null address")]
    InvalidRecipient,

    /// Approval names the null address as spender
    #[error("Invalid spender: cannot approve the null address")]
    InvalidSpender,

    /// Source balance is below the requested amount
    #[error("Insufficient balance: {account} holds {available}, {required} required")]
    InsufficientBalance {
        /// Account being debited
        account: Address,
        /// Current balance
        available: Amount,
        /// Requested amount
        required: Amount,
    },

    /// Remaining allowance is below the requested amount
    #[error("Insufficient allowance: {spender} may move {available} from {owner}, {required} required")]
    InsufficientAllowance {
        /// Account whose balance is delegated
        owner: Address,
        /// Account spending on the owner's behalf
        spender: Address,
        /// Remaining allowance
        available: Amount,
        /// Requested amount
        required: Amount,
    },

    /// Invariant violation (supply conservation, arithmetic overflow)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Malformed address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed or out-of-range amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is a caller-input rejection rather than a fault.
    ///
    /// Rejections never leave the ledger mutated and are not retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidRecipient
                | Error::InvalidSpender
                | Error::InsufficientBalance { .. }
                | Error::InsufficientAllowance { .. }
        )
    }

    /// Short machine-readable cause, used as a metrics label
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidRecipient => "invalid_recipient",
            Error::InvalidSpender => "invalid_spender",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::InsufficientAllowance { .. } => "insufficient_allowance",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::InvalidAddress(_) => "invalid_address",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}
