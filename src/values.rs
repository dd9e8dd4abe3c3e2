//! Value objects — immutable records describing state transitions
//!
//! A [`BalanceRevision`] is produced optimistically against a read
//! snapshot of one balance and re-checked at apply time: its `old_*`
//! fields are the optimistic-concurrency witness. `build_next` chains a
//! follow-on revision whose `old_*` equal the previous `new_*`, which is
//! how one event stages several transitions of the same balance before
//! any commit.

use crate::core_types::{AccountId, CoinType, OrderId, Timestamp};
use crate::errors::{EngineError, Result};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// One (account, asset) balance cell.
///
/// # Invariants
/// - `active >= 0` and `frozen >= 0` at all times
/// - `revision` increases by one on every applied adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    /// Spendable portion.
    pub active: Money,
    /// Portion reserved by live orders.
    pub frozen: Money,
    /// Per-balance adjustment counter.
    pub revision: u64,
}

impl Balance {
    pub fn new(active: Money, frozen: Money, revision: u64) -> Self {
        Self {
            active,
            frozen,
            revision,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_zero() && self.frozen.is_zero()
    }
}

/// A proposed transition of one balance.
///
/// Value-equal iff all fields are equal. Fields are private so a revision
/// can only be produced by `build`/`build_next`, which enforce the
/// non-negativity of the target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRevision {
    account_id: AccountId,
    coin_type: CoinType,
    old_active: Money,
    old_frozen: Money,
    new_active: Money,
    new_frozen: Money,
}

impl BalanceRevision {
    /// Zero-origin revision: `old_active = old_frozen = 0`, `new_*` as
    /// given. Chain with [`build_next`](Self::build_next) to describe a
    /// transition away from the current state.
    pub fn build(
        account_id: impl Into<AccountId>,
        coin_type: impl Into<CoinType>,
        active: Money,
        frozen: Money,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            coin_type: coin_type.into(),
            old_active: Money::ZERO,
            old_frozen: Money::ZERO,
            new_active: active,
            new_frozen: frozen,
        }
    }

    /// Derive a follow-on revision with `old_* = self.new_*` and
    /// `new_* = self.new_* + diff`.
    ///
    /// # Errors
    /// `EngineError::Balance` if either target value would be negative.
    pub fn build_next(&self, active_diff: Money, frozen_diff: Money) -> Result<Self> {
        let new_active = self.new_active + active_diff;
        let new_frozen = self.new_frozen + frozen_diff;
        if new_active.is_negative() || new_frozen.is_negative() {
            return Err(EngineError::Balance(format!(
                "invalid new balance for {} active: {} frozen: {}",
                self.coin_type, new_active, new_frozen
            )));
        }
        Ok(Self {
            account_id: self.account_id.clone(),
            coin_type: self.coin_type.clone(),
            old_active: self.new_active,
            old_frozen: self.new_frozen,
            new_active,
            new_frozen,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn coin_type(&self) -> &str {
        &self.coin_type
    }

    pub fn old_active(&self) -> Money {
        self.old_active
    }

    pub fn old_frozen(&self) -> Money {
        self.old_frozen
    }

    pub fn new_active(&self) -> Money {
        self.new_active
    }

    pub fn new_frozen(&self) -> Money {
        self.new_frozen
    }

    pub fn active_diff(&self) -> Money {
        self.new_active - self.old_active
    }

    pub fn frozen_diff(&self) -> Money {
        self.new_frozen - self.old_frozen
    }
}

/// The per-side record produced when two orders match.
///
/// Two `Deal`s are computed per match, one from each order's perspective;
/// they share `price`, `amount` and `timestamp`. `rest_amount` and
/// `rest_freeze_amount` are the *post-deal* values of the owning order,
/// used at apply time to detect out-of-sequence application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub order_id: OrderId,
    /// The opposite side's order id.
    pub pair_id: OrderId,
    pub price: Money,
    pub amount: Money,
    pub rest_amount: Money,
    pub rest_freeze_amount: Money,
    /// Credited to the owner's income asset.
    pub income: Money,
    /// Consumed from the owner's frozen outcome asset (fee included for
    /// the bid side, fee withheld from `income` for the ask side).
    pub outcome: Money,
    pub fee: Money,
    pub timestamp: Timestamp,
}
