//! Actor-based front-end for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns the submission queue and applies operations in arrival order
//! - Callers on any task get a total order over what they submit
//! - Async message passing with backpressure (bounded mailbox)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            Transport / authentication layer           │
//! │       (supplies the authenticated caller Address)     │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │     Ledger::transfer / approve / transfer_from        │
//! │          reply over oneshot::Sender                   │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::events::EventRecord;
use crate::storage::LedgerSnapshot;
use crate::types::{Address, Amount};
use crate::{Error, Ledger, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Direct transfer
    Transfer {
        /// Account debited
        caller: Address,
        /// Account credited
        to: Address,
        /// Base units moved
        amount: Amount,
        /// Committed event or rejection
        response: oneshot::Sender<Result<EventRecord>>,
    },

    /// Set allowance
    Approve {
        /// Owner granting the allowance
        caller: Address,
        /// Account allowed to spend
        spender: Address,
        /// New allowance, replacing the old one
        amount: Amount,
        /// Committed event or rejection
        response: oneshot::Sender<Result<EventRecord>>,
    },

    /// Delegated transfer
    TransferFrom {
        /// Spender consuming the allowance
        caller: Address,
        /// Owner debited
        from: Address,
        /// Account credited
        to: Address,
        /// Base units moved
        amount: Amount,
        /// Committed event or rejection
        response: oneshot::Sender<Result<EventRecord>>,
    },

    /// Read a balance
    BalanceOf {
        /// Account queried
        account: Address,
        /// Current balance
        response: oneshot::Sender<Amount>,
    },

    /// Read an allowance
    Allowance {
        /// Owner of the balance
        owner: Address,
        /// Delegated spender
        spender: Address,
        /// Remaining allowance
        response: oneshot::Sender<Amount>,
    },

    /// Take a snapshot ordered after every earlier submission
    Snapshot {
        /// Captured snapshot
        response: oneshot::Sender<LedgerSnapshot>,
    },

    /// Shutdown actor once earlier messages are processed
    Shutdown {
        /// Acknowledged before the actor exits
        response: oneshot::Sender<()>,
    },
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Ledger being served
    ledger: Arc<Ledger>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: Arc<Ledger>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown { response } = msg {
                tracing::info!("Ledger actor shutting down");
                let _ = response.send(());
                break;
            }
            self.handle_message(msg);
        }
        tracing::debug!("Ledger actor stopped");
    }

    /// Handle a single message
    fn handle_message(&self, msg: LedgerMessage) {
        // A dropped receiver means the caller gave up; the operation still stands.
        match msg {
            LedgerMessage::Transfer {
                caller,
                to,
                amount,
                response,
            } => {
                let _ = response.send(self.ledger.transfer(caller, to, amount));
            }

            LedgerMessage::Approve {
                caller,
                spender,
                amount,
                response,
            } => {
                let _ = response.send(self.ledger.approve(caller, spender, amount));
            }

            LedgerMessage::TransferFrom {
                caller,
                from,
                to,
                amount,
                response,
            } => {
                let _ = response.send(self.ledger.transfer_from(caller, from, to, amount));
            }

            LedgerMessage::BalanceOf { account, response } => {
                let _ = response.send(self.ledger.balance_of(&account));
            }

            LedgerMessage::Allowance {
                owner,
                spender,
                response,
            } => {
                let _ = response.send(self.ledger.allowance(&owner, &spender));
            }

            LedgerMessage::Snapshot { response } => {
                let _ = response.send(self.ledger.snapshot());
            }

            LedgerMessage::Shutdown { .. } => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
    ledger: Arc<Ledger>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>, ledger: Arc<Ledger>) -> Self {
        Self { sender, ledger }
    }

    /// Underlying ledger (metadata and lock-based reads)
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Direct transfer
    pub async fn transfer(&self, caller: Address, to: Address, amount: Amount) -> Result<EventRecord> {
        self.request(|response| LedgerMessage::Transfer {
            caller,
            to,
            amount,
            response,
        })
        .await?
    }

    /// Set allowance
    pub async fn approve(
        &self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<EventRecord> {
        self.request(|response| LedgerMessage::Approve {
            caller,
            spender,
            amount,
            response,
        })
        .await?
    }

    /// Delegated transfer
    pub async fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<EventRecord> {
        self.request(|response| LedgerMessage::TransferFrom {
            caller,
            from,
            to,
            amount,
            response,
        })
        .await?
    }

    /// Balance, ordered after earlier submissions from this handle
    pub async fn balance_of(&self, account: Address) -> Result<Amount> {
        self.request(|response| LedgerMessage::BalanceOf { account, response })
            .await
    }

    /// Allowance, ordered after earlier submissions from this handle
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount> {
        self.request(|response| LedgerMessage::Allowance {
            owner,
            spender,
            response,
        })
        .await
    }

    /// Snapshot, ordered after earlier submissions
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|response| LedgerMessage::Snapshot { response })
            .await
    }

    /// Shutdown actor and wait for it to drain earlier messages
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| LedgerMessage::Shutdown { response })
            .await
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(ledger: Arc<Ledger>, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger.clone(), rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx, ledger)
}
