//! Account aggregate — multi-asset balances with guarded mutation
//!
//! ALL balance mutations go through [`Account::adjust`], which validates a
//! [`BalanceRevision`] against the live state before writing:
//! the revision's `old_*` fields must match the current balance exactly
//! (optimistic-concurrency check), and the `new_*` fields must be
//! non-negative. On success the per-balance revision counter advances.

use crate::core_types::{AccountId, CoinType};
use crate::errors::{EngineError, Result};
use crate::money::Money;
use crate::values::{Balance, BalanceRevision};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    balances: FxHashMap<CoinType, Balance>,
}

impl Account {
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            balances: FxHashMap::default(),
        }
    }

    /// Seed an account with `(active, frozen)` pairs per asset. Intended
    /// for tests and snapshot restore paths.
    pub fn build<I, C>(id: impl Into<AccountId>, seeds: I) -> Self
    where
        I: IntoIterator<Item = (C, (Money, Money))>,
        C: Into<CoinType>,
    {
        let balances = seeds
            .into_iter()
            .map(|(coin, (active, frozen))| (coin.into(), Balance::new(active, frozen, 0)))
            .collect();
        Self {
            id: id.into(),
            balances,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The stored balance, or a zero balance with `revision = 0` if the
    /// asset has never been touched.
    pub fn find_balance(&self, coin_type: &str) -> Balance {
        self.balances.get(coin_type).copied().unwrap_or_default()
    }

    /// Balances for several assets at once, in input order.
    pub fn find_balances<'a, I>(&self, coin_types: I) -> Vec<Balance>
    where
        I: IntoIterator<Item = &'a str>,
    {
        coin_types
            .into_iter()
            .map(|coin| self.find_balance(coin))
            .collect()
    }

    pub fn balances(&self) -> &FxHashMap<CoinType, Balance> {
        &self.balances
    }

    /// A zero-origin revision whose `new_*` equal the current balance.
    /// Chain `build_next` on it to describe an actual transition.
    pub fn balance_revision(&self, coin_type: &str) -> BalanceRevision {
        let balance = self.find_balance(coin_type);
        BalanceRevision::build(self.id.clone(), coin_type, balance.active, balance.frozen)
    }

    /// Convenience: one-step revision from the current balance.
    pub fn build_balance_revision(
        &self,
        coin_type: &str,
        active_diff: Money,
        frozen_diff: Money,
    ) -> Result<BalanceRevision> {
        self.balance_revision(coin_type)
            .build_next(active_diff, frozen_diff)
    }

    /// Validate and apply a revision.
    ///
    /// # Errors
    /// `EngineError::Balance` when the `old_*` witness does not match the
    /// live balance, or when a `new_*` value is negative. The account is
    /// untouched on error.
    pub fn adjust(&mut self, revision: &BalanceRevision) -> Result<()> {
        let current = self.find_balance(revision.coin_type());
        if revision.old_active() != current.active || revision.old_frozen() != current.frozen {
            return Err(EngineError::Balance(format!(
                "stale revision for {}.{}: expected ({}, {}), found ({}, {})",
                self.id,
                revision.coin_type(),
                revision.old_active(),
                revision.old_frozen(),
                current.active,
                current.frozen
            )));
        }
        if revision.new_active().is_negative() || revision.new_frozen().is_negative() {
            return Err(EngineError::Balance(format!(
                "negative target for {}.{}: active {} frozen {}",
                self.id,
                revision.coin_type(),
                revision.new_active(),
                revision.new_frozen()
            )));
        }
        self.balances.insert(
            revision.coin_type().to_string(),
            Balance::new(
                revision.new_active(),
                revision.new_frozen(),
                current.revision + 1,
            ),
        );
        Ok(())
    }

    /// True iff every held balance is `(0, 0)`.
    pub fn is_empty(&self) -> bool {
        self.balances.values().all(Balance::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: rust_decimal::Decimal) -> Money {
        Money::from(d)
    }

    #[test]
    fn test_find_balance_defaults_to_zero() {
        let account = Account::new("account1");
        let balance = account.find_balance("btc");
        assert_eq!(balance.active, Money::ZERO);
        assert_eq!(balance.frozen, Money::ZERO);
        assert_eq!(balance.revision, 0);
    }

    #[test]
    fn test_is_empty() {
        let account = Account::build(
            "account1",
            [
                ("btc", (money(dec!(10)), Money::ZERO)),
                ("ltc", (Money::ZERO, Money::ZERO)),
            ],
        );
        assert!(!account.is_empty());

        let account = Account::build(
            "account1",
            [
                ("btc", (Money::ZERO, Money::ZERO)),
                ("ltc", (Money::ZERO, Money::ZERO)),
            ],
        );
        assert!(account.is_empty());

        let account = Account::new("account2");
        assert!(account.is_empty());
    }

    #[test]
    fn test_adjust_applies_and_bumps_revision() {
        let mut account = Account::new("account1");
        let revision = account
            .build_balance_revision("btc", money(dec!(100)), Money::ZERO)
            .unwrap();
        account.adjust(&revision).unwrap();

        let balance = account.find_balance("btc");
        assert_eq!(balance.active, money(dec!(100)));
        assert_eq!(balance.revision, 1);

        let revision = account
            .build_balance_revision("btc", money(dec!(-40)), money(dec!(40)))
            .unwrap();
        account.adjust(&revision).unwrap();
        let balance = account.find_balance("btc");
        assert_eq!(balance.active, money(dec!(60)));
        assert_eq!(balance.frozen, money(dec!(40)));
        assert_eq!(balance.revision, 2);
    }

    #[test]
    fn test_adjust_rejects_stale_witness() {
        let mut account = Account::new("account1");
        let stale = account
            .build_balance_revision("btc", money(dec!(100)), Money::ZERO)
            .unwrap();
        account.adjust(&stale).unwrap();

        // Built before the first adjust, so its old_* no longer match
        let err = account.adjust(&stale).unwrap_err();
        assert!(matches!(err, EngineError::Balance(_)));
        assert_eq!(account.find_balance("btc").revision, 1);
    }

    #[test]
    fn test_find_balances_order() {
        let account = Account::build(
            "account1",
            [
                ("btc", (money(dec!(1)), Money::ZERO)),
                ("ltc", (money(dec!(2)), Money::ZERO)),
            ],
        );
        let balances = account.find_balances(["btc", "ltc"]);
        assert_eq!(balances[0].active, money(dec!(1)));
        assert_eq!(balances[1].active, money(dec!(2)));
    }
}
