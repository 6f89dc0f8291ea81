//! Balance and allowance state transitions
//!
//! `LedgerState` is the pure state machine behind [`crate::Ledger`]. It has no
//! locking of its own; every mutating method validates all preconditions and
//! computes every new value before touching a map, so a returned error always
//! means the state is unchanged.

use std::collections::BTreeMap;

use crate::{
    events::TokenEvent,
    types::{Address, Amount},
    Error, Result,
};

/// Balances and allowances
///
/// Zero entries are pruned: an absent key reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
}

/// Precomputed balances for a debit/credit pair
struct BalanceMove {
    from: Address,
    from_after: Amount,
    to: Address,
    to_after: Amount,
}

impl LedgerState {
    /// State with the whole supply credited to one holder
    pub fn genesis(holder: Address, supply: Amount) -> Self {
        let mut state = Self::default();
        state.set_balance(holder, supply);
        state
    }

    /// Rebuild state from stored entries
    pub fn from_parts(
        balances: impl IntoIterator<Item = (Address, Amount)>,
        allowances: impl IntoIterator<Item = ((Address, Address), Amount)>,
    ) -> Self {
        let mut state = Self::default();
        for (account, amount) in balances {
            state.set_balance(account, amount);
        }
        for ((owner, spender), amount) in allowances {
            state.set_allowance(owner, spender, amount);
        }
        state
    }

    /// Current balance of `account`
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Remaining amount `spender` may move out of `owner`'s balance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    /// Non-zero balances, ordered by address
    pub fn balances(&self) -> &BTreeMap<Address, Amount> {
        &self.balances
    }

    /// Non-zero allowances, ordered by (owner, spender)
    pub fn allowances(&self) -> &BTreeMap<(Address, Address), Amount> {
        &self.allowances
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> Result<Amount> {
        self.balances.values().try_fold(Amount::ZERO, |acc, v| {
            acc.checked_add(*v).ok_or_else(|| {
                Error::InvariantViolation("sum of balances overflows".to_string())
            })
        })
    }

    /// Move `amount` from `caller` to `to`
    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<TokenEvent> {
        if to.is_zero() {
            return Err(Error::InvalidRecipient);
        }

        let plan = self.plan_move(caller, to, amount)?;
        self.apply_move(plan);

        Ok(TokenEvent::Transfer {
            from: caller,
            to,
            value: amount,
        })
    }

    /// Set the allowance of `spender` over `caller`'s balance to `amount`.
    ///
    /// Overwrites any previous value. A spender that has not yet used the old
    /// allowance can spend old + new if it front-runs the update; callers that
    /// care should approve zero first and wait for it to land.
    pub fn approve(&mut self, caller: Address, spender: Address, amount: Amount) -> Result<TokenEvent> {
        if spender.is_zero() {
            return Err(Error::InvalidSpender);
        }

        self.set_allowance(caller, spender, amount);

        Ok(TokenEvent::Approval {
            owner: caller,
            spender,
            value: amount,
        })
    }

    /// Spend `caller`'s allowance to move `amount` from `from` to `to`
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<TokenEvent> {
        if to.is_zero() {
            return Err(Error::InvalidRecipient);
        }

        let plan = self.plan_move(from, to, amount)?;

        let available = self.allowance(&from, &caller);
        let allowance_after =
            available
                .checked_sub(amount)
                .ok_or(Error::InsufficientAllowance {
                    owner: from,
                    spender: caller,
                    available,
                    required: amount,
                })?;

        self.apply_move(plan);
        self.set_allowance(from, caller, allowance_after);

        Ok(TokenEvent::Transfer {
            from,
            to,
            value: amount,
        })
    }

    fn plan_move(&self, from: Address, to: Address, amount: Amount) -> Result<BalanceMove> {
        let available = self.balance_of(&from);
        let from_after = available
            .checked_sub(amount)
            .ok_or(Error::InsufficientBalance {
                account: from,
                available,
                required: amount,
            })?;

        // Self-transfer credits the already-debited balance
        let to_before = if from == to {
            from_after
        } else {
            self.balance_of(&to)
        };
        let to_after = to_before.checked_add(amount).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "balance of {} overflows crediting {}",
                to, amount
            ))
        })?;

        Ok(BalanceMove {
            from,
            from_after,
            to,
            to_after,
        })
    }

    fn apply_move(&mut self, plan: BalanceMove) {
        self.set_balance(plan.from, plan.from_after);
        self.set_balance(plan.to, plan.to_after);
    }

    fn set_balance(&mut self, account: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }
}
