//! Behavioural tests for the token ledger
//!
//! Mirrors the deployment, transfer, approve and transferFrom scenarios a
//! token with 1,000,000 supply and 18 decimals goes through.

use std::sync::Arc;
use token_ledger::{
    events::MemorySink, Address, Amount, Error, Genesis, Ledger, TokenEvent, TokenMetadata,
};

const NAME: &str = "Boost Token";
const SYMBOL: &str = "BOOST";
const DECIMALS: u8 = 18;

/// Whole tokens to base units
fn tokens(n: u128) -> Amount {
    Amount::new(n * 10u128.pow(u32::from(DECIMALS)))
}

struct Fixture {
    ledger: Ledger,
    events: Arc<MemorySink>,
    deployer: Address,
    receiver: Address,
    exchange: Address,
}

fn deploy() -> Fixture {
    let deployer = Address::derive(b"deployer");
    let events = Arc::new(MemorySink::new());
    let ledger = Ledger::new(Genesis {
        metadata: TokenMetadata {
            name: NAME.to_string(),
            symbol: SYMBOL.to_string(),
            decimals: DECIMALS,
            total_supply: tokens(1_000_000),
        },
        initial_holder: deployer,
    })
    .unwrap()
    .with_sink(events.clone());

    Fixture {
        ledger,
        events,
        deployer,
        receiver: Address::derive(b"receiver"),
        exchange: Address::derive(b"exchange"),
    }
}

mod deployment {
    use super::*;

    #[test]
    fn tracks_the_metadata() {
        let f = deploy();
        assert_eq!(f.ledger.name(), NAME);
        assert_eq!(f.ledger.symbol(), SYMBOL);
        assert_eq!(f.ledger.decimals(), DECIMALS);
        assert_eq!(f.ledger.total_supply(), tokens(1_000_000));
        assert_eq!(
            f.ledger.total_supply().to_string(),
            "1000000000000000000000000"
        );
    }

    #[test]
    fn assigns_the_total_supply_to_the_deployer() {
        let f = deploy();
        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(1_000_000));
        assert_eq!(f.ledger.holders(), vec![(f.deployer, tokens(1_000_000))]);
    }

    #[test]
    fn unknown_accounts_read_zero() {
        let f = deploy();
        assert_eq!(f.ledger.balance_of(&f.receiver), Amount::ZERO);
        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), Amount::ZERO);
    }
}

mod transfer {
    use super::*;

    #[test]
    fn transfers_token_balances() {
        let f = deploy();
        f.ledger
            .transfer(f.deployer, f.receiver, tokens(100))
            .unwrap();

        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(999_900));
        assert_eq!(f.ledger.balance_of(&f.receiver), tokens(100));
    }

    #[test]
    fn emits_a_transfer_event() {
        let f = deploy();
        let record = f
            .ledger
            .transfer(f.deployer, f.receiver, tokens(100))
            .unwrap();

        assert_eq!(record.event.name(), "Transfer");
        assert_eq!(
            record.event,
            TokenEvent::Transfer {
                from: f.deployer,
                to: f.receiver,
                value: tokens(100),
            }
        );
        assert_eq!(f.events.records(), vec![record]);
    }

    #[test]
    fn rejects_invalid_recipients() {
        let f = deploy();
        let result = f.ledger.transfer(f.deployer, Address::ZERO, tokens(100));

        assert!(matches!(result, Err(Error::InvalidRecipient)));
        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(1_000_000));
        assert!(f.events.is_empty());
    }

    #[test]
    fn rejects_insufficient_balances() {
        let f = deploy();

        // Greater than total supply
        let result = f
            .ledger
            .transfer(f.deployer, f.receiver, tokens(100_000_000));
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance { account, .. }) if account == f.deployer
        ));

        // Sender holds nothing
        let result = f.ledger.transfer(f.receiver, f.deployer, tokens(10));
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance { available, .. }) if available == Amount::ZERO
        ));

        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(1_000_000));
        assert!(f.events.is_empty());
    }

    #[test]
    fn self_transfer_still_emits() {
        let f = deploy();
        f.ledger
            .transfer(f.deployer, f.deployer, tokens(5))
            .unwrap();

        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(1_000_000));
        assert_eq!(f.events.len(), 1);
    }
}

mod approve {
    use super::*;

    #[test]
    fn allocates_an_allowance() {
        let f = deploy();
        f.ledger
            .approve(f.deployer, f.exchange, tokens(100))
            .unwrap();

        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), tokens(100));
    }

    #[test]
    fn emits_an_approval_event() {
        let f = deploy();
        let record = f
            .ledger
            .approve(f.deployer, f.exchange, tokens(100))
            .unwrap();

        assert_eq!(
            record.event,
            TokenEvent::Approval {
                owner: f.deployer,
                spender: f.exchange,
                value: tokens(100),
            }
        );
    }

    #[test]
    fn overwrites_rather_than_accumulates() {
        let f = deploy();
        f.ledger
            .approve(f.deployer, f.exchange, tokens(40))
            .unwrap();
        f.ledger
            .approve(f.deployer, f.exchange, tokens(100))
            .unwrap();

        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), tokens(100));
    }

    #[test]
    fn rejects_invalid_spenders() {
        let f = deploy();
        let result = f.ledger.approve(f.deployer, Address::ZERO, tokens(100));

        assert!(matches!(result, Err(Error::InvalidSpender)));
        assert!(f.events.is_empty());
    }
}

mod transfer_from {
    use super::*;

    fn approved() -> Fixture {
        let f = deploy();
        f.ledger
            .approve(f.deployer, f.exchange, tokens(100))
            .unwrap();
        f
    }

    #[test]
    fn transfers_token_balances() {
        let f = approved();
        f.ledger
            .transfer_from(f.exchange, f.deployer, f.receiver, tokens(100))
            .unwrap();

        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(999_900));
        assert_eq!(f.ledger.balance_of(&f.receiver), tokens(100));
        assert_eq!(f.ledger.balance_of(&f.exchange), Amount::ZERO);
    }

    #[test]
    fn resets_the_allowance() {
        let f = approved();
        f.ledger
            .transfer_from(f.exchange, f.deployer, f.receiver, tokens(100))
            .unwrap();

        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), Amount::ZERO);
    }

    #[test]
    fn emits_a_single_transfer_event() {
        let f = approved();
        f.events.drain();

        f.ledger
            .transfer_from(f.exchange, f.deployer, f.receiver, tokens(100))
            .unwrap();

        let records = f.events.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].event,
            TokenEvent::Transfer {
                from: f.deployer,
                to: f.receiver,
                value: tokens(100),
            }
        );
    }

    #[test]
    fn rejects_insufficient_amounts() {
        let f = approved();
        let result =
            f.ledger
                .transfer_from(f.exchange, f.deployer, f.receiver, tokens(100_000_000));

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
    }

    #[test]
    fn rejects_amounts_above_allowance() {
        let f = approved();
        let result = f
            .ledger
            .transfer_from(f.exchange, f.deployer, f.receiver, tokens(101));

        assert!(matches!(result, Err(Error::InsufficientAllowance { .. })));
        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), tokens(100));
        assert_eq!(f.ledger.balance_of(&f.deployer), tokens(1_000_000));
    }

    #[test]
    fn rejects_invalid_recipients() {
        let f = approved();
        let result = f
            .ledger
            .transfer_from(f.exchange, f.deployer, Address::ZERO, tokens(100));

        assert!(matches!(result, Err(Error::InvalidRecipient)));
        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), tokens(100));
    }

    #[test]
    fn allowance_is_per_spender() {
        let f = approved();
        let result = f
            .ledger
            .transfer_from(f.receiver, f.deployer, f.receiver, tokens(1));

        assert!(matches!(result, Err(Error::InsufficientAllowance { .. })));
    }

    #[test]
    fn partial_spend_reduces_allowance_exactly() {
        let f = approved();
        f.ledger
            .transfer_from(f.exchange, f.deployer, f.receiver, tokens(30))
            .unwrap();

        assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), tokens(70));
    }
}

#[test]
fn full_scenario_is_cumulative() {
    let f = deploy();

    f.ledger
        .transfer(f.deployer, f.receiver, tokens(100))
        .unwrap();
    f.ledger
        .approve(f.deployer, f.exchange, tokens(100))
        .unwrap();
    f.ledger
        .transfer_from(f.exchange, f.deployer, f.receiver, tokens(100))
        .unwrap();

    assert_eq!(f.ledger.balance_of(&f.deployer), tokens(999_800));
    assert_eq!(f.ledger.balance_of(&f.receiver), tokens(200));
    assert_eq!(f.ledger.allowance(&f.deployer, &f.exchange), Amount::ZERO);
    assert!(f.ledger.check_conservation().unwrap());

    let names: Vec<&str> = f.events.records().iter().map(|r| r.event.name()).collect();
    assert_eq!(names, vec!["Transfer", "Approval", "Transfer"]);
}

#[test]
fn snapshot_survives_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = token_ledger::SnapshotStore::open(temp_dir.path().join("ledger.snapshot")).unwrap();

    let f = deploy();
    f.ledger
        .transfer(f.deployer, f.receiver, tokens(100))
        .unwrap();
    f.ledger
        .approve(f.receiver, f.exchange, tokens(60))
        .unwrap();
    store.save(&f.ledger.snapshot()).unwrap();

    let restored = Ledger::from_snapshot(store.load().unwrap().unwrap()).unwrap();
    assert_eq!(restored.balance_of(&f.receiver), tokens(100));
    assert_eq!(restored.allowance(&f.receiver, &f.exchange), tokens(60));

    let record = restored
        .transfer_from(f.exchange, f.receiver, f.exchange, tokens(60))
        .unwrap();
    assert_eq!(record.sequence, 2);
    assert!(restored.check_conservation().unwrap());
}
