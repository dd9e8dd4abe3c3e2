//! Events — command objects encoding every state transition
//!
//! A caller first *builds* an event against the current repository, which
//! resolves entities and precomputes the intended balance transitions
//! without mutating anything, then submits it through
//! [`Repository::commit`](crate::repository::Repository::commit). The
//! apply step re-validates every precondition against the live state and
//! either succeeds in full or leaves the repository untouched: checks run
//! first, and multi-entity writes are staged on clones that are swapped
//! in only after the last check has passed.
//!
//! The event set is closed, so it is a tagged sum with one constructor
//! per kind and a single `apply` dispatch — no dynamic dispatch.

use crate::account::Account;
use crate::core_types::{now_millis, AccountId, CoinType, OrderId, Revision, Timestamp};
use crate::errors::{EngineError, Result};
use crate::money::Money;
use crate::order::{Order, Side};
use crate::orderbook::Exchange;
use crate::repository::Repository;
use crate::values::{BalanceRevision, Deal};
use rust_decimal::Decimal;

/// Syntactic identifier check for credit/debit ids: non-empty, at most
/// 64 bytes, ASCII alphanumeric plus `-` and `_`. Deterministic.
pub fn validate_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// One committed state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AccountCreated(AccountCreated),
    AccountCanceled(AccountCanceled),
    AccountCredited(AccountCredited),
    AccountDebited(AccountDebited),
    ExchangeCreated(ExchangeCreated),
    OrderCreated(OrderCreated),
    OrderCanceled(OrderCanceled),
    OrderDealt(OrderDealt),
}

impl Event {
    /// The revision this event targets: `repo.revision + 1` at build time.
    pub fn revision(&self) -> Revision {
        match self {
            Event::AccountCreated(e) => e.revision,
            Event::AccountCanceled(e) => e.revision,
            Event::AccountCredited(e) => e.revision,
            Event::AccountDebited(e) => e.revision,
            Event::ExchangeCreated(e) => e.revision,
            Event::OrderCreated(e) => e.revision,
            Event::OrderCanceled(e) => e.revision,
            Event::OrderDealt(e) => e.revision,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::AccountCreated(_) => "account_created",
            Event::AccountCanceled(_) => "account_canceled",
            Event::AccountCredited(_) => "account_credited",
            Event::AccountDebited(_) => "account_debited",
            Event::ExchangeCreated(_) => "exchange_created",
            Event::OrderCreated(_) => "order_created",
            Event::OrderCanceled(_) => "order_canceled",
            Event::OrderDealt(_) => "order_dealt",
        }
    }

    pub(crate) fn apply(&self, repo: &mut Repository) -> Result<()> {
        match self {
            Event::AccountCreated(e) => e.apply(repo),
            Event::AccountCanceled(e) => e.apply(repo),
            Event::AccountCredited(e) => e.apply(repo),
            Event::AccountDebited(e) => e.apply(repo),
            Event::ExchangeCreated(e) => e.apply(repo),
            Event::OrderCreated(e) => e.apply(repo),
            Event::OrderCanceled(e) => e.apply(repo),
            Event::OrderDealt(e) => e.apply(repo),
        }
    }
}

// ============================================================
// Account lifecycle
// ============================================================

/// Create an account. Idempotent: re-creating an existing account is a
/// no-op that still advances the repository revision.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCreated {
    pub revision: Revision,
    pub account_id: AccountId,
}

impl AccountCreated {
    pub fn build(repo: &Repository, account_id: impl Into<AccountId>) -> Event {
        Event::AccountCreated(Self {
            revision: repo.revision() + 1,
            account_id: account_id.into(),
        })
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        if repo.accounts.get(&self.account_id).is_some() {
            return Ok(());
        }
        repo.accounts.add(Account::new(self.account_id.clone()));
        Ok(())
    }
}

/// Remove an account. Only empty accounts may be cancelled; removing a
/// missing account is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCanceled {
    pub revision: Revision,
    pub account_id: AccountId,
}

impl AccountCanceled {
    pub fn build(repo: &Repository, account_id: impl Into<AccountId>) -> Event {
        Event::AccountCanceled(Self {
            revision: repo.revision() + 1,
            account_id: account_id.into(),
        })
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        if let Some(account) = repo.accounts.get(&self.account_id) {
            if !account.is_empty() {
                return Err(EngineError::Cancel(format!(
                    "account #{} is not empty, can not cancel",
                    self.account_id
                )));
            }
        }
        repo.accounts.remove(&self.account_id);
        Ok(())
    }
}

// ============================================================
// Credits and debits
// ============================================================

/// Credit an account's active balance. The external id is the dedup key.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCredited {
    pub revision: Revision,
    pub id: String,
    pub account_id: AccountId,
    pub coin_type: CoinType,
    pub balance_revision: BalanceRevision,
}

impl AccountCredited {
    pub fn build(
        repo: &Repository,
        id: impl Into<String>,
        account_id: &str,
        coin_type: &str,
        amount: Money,
    ) -> Result<Event> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let account = repo.accounts.find(account_id)?;
        let balance_revision = account.build_balance_revision(coin_type, amount, Money::ZERO)?;
        Ok(Event::AccountCredited(Self {
            revision: repo.revision() + 1,
            id: id.into(),
            account_id: account_id.to_string(),
            coin_type: coin_type.to_string(),
            balance_revision,
        }))
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        if !validate_id(&self.id) {
            return Err(EngineError::Validation(format!(
                "invalid credit id format {}",
                self.id
            )));
        }
        if repo.credits_bloom.contains(&self.id) {
            return Err(EngineError::Conflicted(format!(
                "credit id {} is already occupied",
                self.id
            )));
        }
        let account = repo.accounts.find_mut(&self.account_id)?;
        account.adjust(&self.balance_revision)?;
        repo.credits_bloom.insert(&self.id);
        Ok(())
    }
}

/// Debit an account's active balance. Mirror of [`AccountCredited`] with
/// its own dedup filter; overdrafts fail with a balance error.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDebited {
    pub revision: Revision,
    pub id: String,
    pub account_id: AccountId,
    pub coin_type: CoinType,
    pub balance_revision: BalanceRevision,
}

impl AccountDebited {
    pub fn build(
        repo: &Repository,
        id: impl Into<String>,
        account_id: &str,
        coin_type: &str,
        amount: Money,
    ) -> Result<Event> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        let account = repo.accounts.find(account_id)?;
        let balance_revision = account.build_balance_revision(coin_type, -amount, Money::ZERO)?;
        Ok(Event::AccountDebited(Self {
            revision: repo.revision() + 1,
            id: id.into(),
            account_id: account_id.to_string(),
            coin_type: coin_type.to_string(),
            balance_revision,
        }))
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        if !validate_id(&self.id) {
            return Err(EngineError::Validation(format!(
                "invalid debit id format {}",
                self.id
            )));
        }
        if repo.debits_bloom.contains(&self.id) {
            return Err(EngineError::Conflicted(format!(
                "debit id {} is already occupied",
                self.id
            )));
        }
        let account = repo.accounts.find_mut(&self.account_id)?;
        account.adjust(&self.balance_revision)?;
        repo.debits_bloom.insert(&self.id);
        Ok(())
    }
}

// ============================================================
// Markets
// ============================================================

/// Create the order book for a market. Idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeCreated {
    pub revision: Revision,
    pub coin_type: CoinType,
    pub price_type: CoinType,
}

impl ExchangeCreated {
    pub fn build(
        repo: &Repository,
        coin_type: impl Into<CoinType>,
        price_type: impl Into<CoinType>,
    ) -> Event {
        Event::ExchangeCreated(Self {
            revision: repo.revision() + 1,
            coin_type: coin_type.into(),
            price_type: price_type.into(),
        })
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        let exchange = Exchange::new(self.coin_type.clone(), self.price_type.clone());
        if repo.exchanges.get(&exchange.id()).is_none() {
            repo.exchanges.add(exchange);
        }
        Ok(())
    }
}

// ============================================================
// Orders
// ============================================================

/// Place a limit order: reserve the freeze amount of the outcome asset
/// and enqueue the order on its book.
///
/// The event owns a snapshot of the new order, so mutations between build
/// and apply cannot leak into the committed state.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreated {
    pub revision: Revision,
    pub order: Order,
    pub balance_revision: BalanceRevision,
}

impl OrderCreated {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        repo: &Repository,
        id: impl Into<OrderId>,
        side: Side,
        account_id: &str,
        coin_type: &str,
        price_type: &str,
        price: Money,
        amount: Money,
        fee_rate: Decimal,
        timestamp: Option<Timestamp>,
    ) -> Result<Event> {
        let timestamp = timestamp.unwrap_or_else(now_millis);
        let order = Order::new(
            id, side, account_id, coin_type, price_type, price, amount, fee_rate, timestamp,
        )?;
        let account = repo.accounts.find(account_id)?;
        let balance_revision = Self::build_balance_revision(account, &order)?;
        Ok(Event::OrderCreated(Self {
            revision: repo.revision() + 1,
            order,
            balance_revision,
        }))
    }

    /// The placement transition: move `freeze_amount` of the outcome
    /// asset from active to frozen.
    pub fn build_balance_revision(account: &Account, order: &Order) -> Result<BalanceRevision> {
        let freeze = order.freeze_amount();
        account.build_balance_revision(order.outcome_type(), -freeze, freeze)
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        if repo.orders_bloom.contains(self.order.id()) {
            return Err(EngineError::Conflicted(format!(
                "order id {} is already occupied",
                self.order.id()
            )));
        }
        let exchange_id = self.order.exchange_id();
        repo.exchanges.find(&exchange_id)?;
        // Reserve the balance before touching any index; a failure here
        // must leave no trace of the order.
        let account = repo.accounts.find_mut(self.order.account_id())?;
        account.adjust(&self.balance_revision)?;
        repo.orders_bloom.insert(self.order.id());
        repo.orders.add(self.order.clone());
        repo.exchanges.find_mut(&exchange_id)?.enqueue(&self.order)?;
        Ok(())
    }
}

/// Cancel a live order: release the remaining reservation, drop the order
/// from the orders set and from its book.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCanceled {
    pub revision: Revision,
    pub order_id: OrderId,
    pub balance_revision: BalanceRevision,
}

impl OrderCanceled {
    pub fn build(repo: &Repository, order_id: &str) -> Result<Event> {
        let order = repo.orders.find(order_id)?;
        let account = repo.accounts.find(order.account_id())?;
        let balance_revision = Self::build_balance_revision(account, order)?;
        Ok(Event::OrderCanceled(Self {
            revision: repo.revision() + 1,
            order_id: order_id.to_string(),
            balance_revision,
        }))
    }

    /// The release transition: move `rest_freeze_amount` of the outcome
    /// asset back from frozen to active.
    pub fn build_balance_revision(account: &Account, order: &Order) -> Result<BalanceRevision> {
        let rest_freeze = order.rest_freeze_amount();
        account.build_balance_revision(order.outcome_type(), rest_freeze, -rest_freeze)
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        let order = repo.orders.find(&self.order_id)?.clone();
        let exchange_id = order.exchange_id();
        repo.exchanges.find(&exchange_id)?;
        let account = repo.accounts.find_mut(order.account_id())?;
        account.adjust(&self.balance_revision)?;
        repo.orders.remove(&self.order_id);
        repo.exchanges.find_mut(&exchange_id)?.dequeue(&order);
        Ok(())
    }
}

// ============================================================
// Deals
// ============================================================

/// Settle one match: append both deals, move balances on both sides, and
/// drop completed orders from the book (they stay queryable in the orders
/// set until cancelled).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDealt {
    pub revision: Revision,
    pub bid_deal: Deal,
    pub ask_deal: Deal,
    pub bid_income_revision: BalanceRevision,
    pub bid_outcome_revision: BalanceRevision,
    pub ask_income_revision: BalanceRevision,
    pub ask_outcome_revision: BalanceRevision,
}

impl OrderDealt {
    pub fn build(repo: &Repository, bid_deal: Deal, ask_deal: Deal) -> Result<Event> {
        if bid_deal.pair_id != ask_deal.order_id || ask_deal.pair_id != bid_deal.order_id {
            return Err(EngineError::Deal(format!(
                "deals are not a pair: {}/{} vs {}/{}",
                bid_deal.order_id, bid_deal.pair_id, ask_deal.order_id, ask_deal.pair_id
            )));
        }
        let bid_order = repo.orders.find(&bid_deal.order_id)?;
        let ask_order = repo.orders.find(&ask_deal.order_id)?;
        if bid_order.side() != Side::Bid || ask_order.side() != Side::Ask {
            return Err(EngineError::Deal(format!(
                "deal sides are swapped: {} is not a bid or {} is not an ask",
                bid_order.id(),
                ask_order.id()
            )));
        }
        let bid_account = repo.accounts.find(bid_order.account_id())?;
        let ask_account = repo.accounts.find(ask_order.account_id())?;

        let (bid_income_revision, bid_outcome_revision) = Self::build_balance_revisions(
            bid_account.balance_revision(bid_order.income_type()),
            bid_account.balance_revision(bid_order.outcome_type()),
            &bid_deal,
        )?;

        // Self-trade: the ask side's transitions start from the state the
        // bid side leaves behind (income from the bid's outcome asset and
        // vice versa), so the chained witnesses line up at apply time.
        let (ask_income_base, ask_outcome_base) = if bid_order.account_id()
            == ask_order.account_id()
        {
            (bid_outcome_revision.clone(), bid_income_revision.clone())
        } else {
            (
                ask_account.balance_revision(ask_order.income_type()),
                ask_account.balance_revision(ask_order.outcome_type()),
            )
        };
        let (ask_income_revision, ask_outcome_revision) =
            Self::build_balance_revisions(ask_income_base, ask_outcome_base, &ask_deal)?;

        Ok(Event::OrderDealt(Self {
            revision: repo.revision() + 1,
            bid_deal,
            ask_deal,
            bid_income_revision,
            bid_outcome_revision,
            ask_income_revision,
            ask_outcome_revision,
        }))
    }

    /// One side's two transitions: credit the income, then consume the
    /// outcome from the frozen reservation. When the deal completes the
    /// order, any rounding residue still frozen is returned to active so
    /// a closed order leaves zero frozen.
    fn build_balance_revisions(
        income_base: BalanceRevision,
        outcome_base: BalanceRevision,
        deal: &Deal,
    ) -> Result<(BalanceRevision, BalanceRevision)> {
        let income = income_base.build_next(deal.income, Money::ZERO)?;
        let unfreeze = if deal.rest_amount.is_zero() {
            deal.rest_freeze_amount
        } else {
            Money::ZERO
        };
        let outcome = outcome_base.build_next(unfreeze, -(deal.outcome + unfreeze))?;
        Ok((income, outcome))
    }

    fn apply(&self, repo: &mut Repository) -> Result<()> {
        // Stage everything on clones; the repository is only written once
        // every check has passed.
        let mut bid_order = repo.orders.find(&self.bid_deal.order_id)?.clone();
        let mut ask_order = repo.orders.find(&self.ask_deal.order_id)?.clone();
        let exchange_id = bid_order.exchange_id();
        repo.exchanges.find(&exchange_id)?;

        bid_order.append_deal(self.bid_deal.clone())?;
        ask_order.append_deal(self.ask_deal.clone())?;

        if bid_order.account_id() == ask_order.account_id() {
            let mut account = repo.accounts.find(bid_order.account_id())?.clone();
            // Bid side first: the ask revisions are chained onto it.
            account.adjust(&self.bid_income_revision)?;
            account.adjust(&self.bid_outcome_revision)?;
            account.adjust(&self.ask_income_revision)?;
            account.adjust(&self.ask_outcome_revision)?;
            repo.accounts.add(account);
        } else {
            let mut bid_account = repo.accounts.find(bid_order.account_id())?.clone();
            bid_account.adjust(&self.bid_income_revision)?;
            bid_account.adjust(&self.bid_outcome_revision)?;
            let mut ask_account = repo.accounts.find(ask_order.account_id())?.clone();
            ask_account.adjust(&self.ask_income_revision)?;
            ask_account.adjust(&self.ask_outcome_revision)?;
            repo.accounts.add(bid_account);
            repo.accounts.add(ask_account);
        }

        let exchange = repo.exchanges.find_mut(&exchange_id)?;
        exchange.dequeue_if_completed(&bid_order);
        exchange.dequeue_if_completed(&ask_order);
        repo.orders.add(bid_order);
        repo.orders.add(ask_order);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::from(d)
    }

    fn repo_with_account() -> Repository {
        let mut repo = Repository::new();
        repo.commit(&AccountCreated::build(&repo, "123")).unwrap();
        repo
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("credit-1"));
        assert!(validate_id("ORDER_42"));
        assert!(!validate_id(""));
        assert!(!validate_id("has space"));
        assert!(!validate_id("emoji✨"));
        assert!(!validate_id(&"x".repeat(65)));
    }

    #[test]
    fn test_create_and_cancel_account() {
        let mut repo = repo_with_account();
        assert!(repo.accounts.find("123").is_ok());
        repo.commit(&AccountCanceled::build(&repo, "123")).unwrap();
        assert!(repo.accounts.get("123").is_none());
        assert_eq!(repo.revision(), 2);
    }

    #[test]
    fn test_cancel_missing_account_is_noop() {
        let mut repo = Repository::new();
        repo.commit(&AccountCanceled::build(&repo, "ghost")).unwrap();
        assert_eq!(repo.revision(), 1);
    }

    #[test]
    fn test_create_credit_then_cancel_fails() {
        let mut repo = repo_with_account();
        repo.commit(
            &AccountCredited::build(&repo, "credit1", "123", "btc", money(dec!(100))).unwrap(),
        )
        .unwrap();
        repo.commit(
            &AccountCredited::build(&repo, "credit2", "123", "ltc", money(dec!(200))).unwrap(),
        )
        .unwrap();

        let event = AccountCanceled::build(&repo, "123");
        assert!(matches!(
            repo.commit(&event),
            Err(EngineError::Cancel(_))
        ));
        let account = repo.accounts.find("123").unwrap();
        assert_eq!(account.find_balance("btc").active, money(dec!(100)));
        assert_eq!(account.find_balance("ltc").active, money(dec!(200)));
    }

    #[test]
    fn test_recreate_is_noop_but_advances_revision() {
        let mut repo = repo_with_account();
        repo.commit(
            &AccountCredited::build(&repo, "credit1", "123", "btc", money(dec!(100))).unwrap(),
        )
        .unwrap();
        let before = repo.revision();
        repo.commit(&AccountCreated::build(&repo, "123")).unwrap();
        assert_eq!(repo.revision(), before + 1);
        let account = repo.accounts.find("123").unwrap();
        assert_eq!(account.find_balance("btc").active, money(dec!(100)));
    }

    #[test]
    fn test_credit_then_debit() {
        let mut repo = repo_with_account();
        repo.commit(
            &AccountCredited::build(&repo, "credit1", "123", "btc", money(dec!(100))).unwrap(),
        )
        .unwrap();
        repo.commit(
            &AccountDebited::build(&repo, "debit1", "123", "btc", money(dec!(90))).unwrap(),
        )
        .unwrap();
        assert_eq!(
            repo.accounts.find("123").unwrap().find_balance("btc").active,
            money(dec!(10))
        );

        // Overdraft is rejected at build time by the revision chain
        assert!(matches!(
            AccountDebited::build(&repo, "debit2", "123", "btc", money(dec!(20))),
            Err(EngineError::Balance(_))
        ));
        assert_eq!(
            repo.accounts.find("123").unwrap().find_balance("btc").active,
            money(dec!(10))
        );

        repo.commit(
            &AccountDebited::build(&repo, "debit3", "123", "btc", money(dec!(10))).unwrap(),
        )
        .unwrap();
        assert!(repo.accounts.find("123").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_credit_id_conflicts() {
        let mut repo = repo_with_account();
        repo.commit(&AccountCredited::build(&repo, "c1", "123", "btc", money(dec!(1))).unwrap())
            .unwrap();
        let dup = AccountCredited::build(&repo, "c1", "123", "btc", money(dec!(1))).unwrap();
        assert!(matches!(
            repo.commit(&dup),
            Err(EngineError::Conflicted(_))
        ));
        // Only the first credit landed, and the failed commit did not
        // advance the revision
        assert_eq!(
            repo.accounts.find("123").unwrap().find_balance("btc").active,
            money(dec!(1))
        );
        assert_eq!(repo.revision(), 2);
    }

    #[test]
    fn test_malformed_credit_id_rejected_at_apply() {
        let mut repo = repo_with_account();
        let event =
            AccountCredited::build(&repo, "not ok", "123", "btc", money(dec!(1))).unwrap();
        assert!(matches!(
            repo.commit(&event),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(repo.revision(), 1);
    }

    #[test]
    fn test_exchange_created_idempotent() {
        let mut repo = Repository::new();
        repo.commit(&ExchangeCreated::build(&repo, "ltc", "btc")).unwrap();
        repo.commit(&ExchangeCreated::build(&repo, "ltc", "btc")).unwrap();
        assert_eq!(repo.exchanges.len(), 1);
        assert!(repo.exchanges.find("ltc-btc").is_ok());
        assert_eq!(repo.revision(), 2);
    }

    fn trading_repo() -> Repository {
        let mut repo = Repository::new();
        repo.commit(&ExchangeCreated::build(&repo, "ltc", "btc")).unwrap();
        repo.commit(&AccountCreated::build(&repo, "account1")).unwrap();
        repo.commit(
            &AccountCredited::build(&repo, "credit1", "account1", "btc", money(dec!(100)))
                .unwrap(),
        )
        .unwrap();
        repo.commit(
            &AccountCredited::build(&repo, "credit2", "account1", "ltc", money(dec!(100)))
                .unwrap(),
        )
        .unwrap();
        repo
    }

    #[test]
    fn test_create_order_reserves_and_cancel_releases() {
        let mut repo = trading_repo();
        repo.commit(
            &OrderCreated::build(
                &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
                money(dec!(1)), money(dec!(10)), dec!(0.01), Some(1),
            )
            .unwrap(),
        )
        .unwrap();

        assert!(repo.orders.find("bid1").is_ok());
        let balance = repo.accounts.find("account1").unwrap().find_balance("btc");
        assert_eq!(balance.active, money(dec!(89.9)));
        assert_eq!(balance.frozen, money(dec!(10.1)));
        assert_eq!(
            repo.exchanges.find("ltc-btc").unwrap().best_bid(),
            Some(money(dec!(1)))
        );

        repo.commit(&OrderCanceled::build(&repo, "bid1").unwrap()).unwrap();
        let balance = repo.accounts.find("account1").unwrap().find_balance("btc");
        assert_eq!(balance.active, money(dec!(100)));
        assert_eq!(balance.frozen, Money::ZERO);
        assert!(repo.orders.get("bid1").is_none());
        assert!(repo.exchanges.find("ltc-btc").unwrap().is_empty());
    }

    #[test]
    fn test_order_exceeding_balance_fails_build() {
        let mut repo = trading_repo();
        repo.commit(
            &OrderCreated::build(
                &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
                money(dec!(1)), money(dec!(50)), dec!(0.01), Some(1),
            )
            .unwrap(),
        )
        .unwrap();
        // 49.5 active left; another 50.5 freeze cannot be built
        assert!(matches!(
            OrderCreated::build(
                &repo, "bid2", Side::Bid, "account1", "ltc", "btc",
                money(dec!(1)), money(dec!(50)), dec!(0.01), Some(2),
            ),
            Err(EngineError::Balance(_))
        ));
        assert_eq!(repo.orders.len(), 1);
    }

    #[test]
    fn test_duplicate_order_id_conflicts() {
        let mut repo = trading_repo();
        repo.commit(
            &OrderCreated::build(
                &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
                money(dec!(1)), money(dec!(10)), dec!(0.01), Some(1),
            )
            .unwrap(),
        )
        .unwrap();
        let dup = OrderCreated::build(
            &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
            money(dec!(1)), money(dec!(10)), dec!(0.01), Some(2),
        )
        .unwrap();
        let balance_before = repo.accounts.find("account1").unwrap().find_balance("btc");
        assert!(matches!(
            repo.commit(&dup),
            Err(EngineError::Conflicted(_))
        ));
        let balance_after = repo.accounts.find("account1").unwrap().find_balance("btc");
        assert_eq!(balance_before, balance_after);
    }

    #[test]
    fn test_order_on_missing_exchange_leaves_no_trace() {
        let mut repo = trading_repo();
        let event = OrderCreated::build(
            &repo, "bid1", Side::Bid, "account1", "doge", "btc",
            money(dec!(1)), money(dec!(10)), dec!(0.01), Some(1),
        )
        .unwrap();
        assert!(matches!(
            repo.commit(&event),
            Err(EngineError::NotFound { .. })
        ));
        let balance = repo.accounts.find("account1").unwrap().find_balance("btc");
        assert_eq!(balance.frozen, Money::ZERO);
        assert!(repo.orders.is_empty());
    }

    #[test]
    fn test_compute_balance_revision_for_create_and_cancel() {
        let mut account = Account::build(
            "account1",
            [
                ("btc", (money(dec!(10)), Money::ZERO)),
                ("ltc", (money(dec!(10)), Money::ZERO)),
            ],
        );
        let bid = Order::new(
            "bid1", Side::Bid, "account1", "ltc", "btc",
            money(dec!(0.3)), money(dec!(1)), dec!(0.001), 2,
        )
        .unwrap();

        let revision = OrderCreated::build_balance_revision(&account, &bid).unwrap();
        account.adjust(&revision).unwrap();
        assert_eq!(revision.old_active(), money(dec!(10)));
        assert_eq!(revision.new_active(), money(dec!(9.6997)));
        assert_eq!(revision.new_frozen(), money(dec!(0.3003)));
        assert_eq!(revision.active_diff(), -bid.freeze_amount());
        assert_eq!(revision.frozen_diff(), bid.freeze_amount());

        let revision = OrderCanceled::build_balance_revision(&account, &bid).unwrap();
        account.adjust(&revision).unwrap();
        assert_eq!(revision.old_active(), money(dec!(9.6997)));
        assert_eq!(revision.new_active(), money(dec!(10)));
        assert_eq!(revision.new_frozen(), Money::ZERO);
        assert_eq!(revision.active_diff(), bid.freeze_amount());
        assert_eq!(revision.frozen_diff(), -bid.freeze_amount());
    }

    #[test]
    fn test_out_of_order_commit_fails() {
        let mut repo = Repository::new();
        let first = AccountCreated::build(&repo, "a");
        let second = AccountCreated::build(&repo, "b");
        repo.commit(&first).unwrap();
        assert!(matches!(
            repo.commit(&second),
            Err(EngineError::Revision { target: 1, current: 1 })
        ));
        assert_eq!(repo.revision(), 1);
    }

    #[test]
    fn test_dealt_rejects_mismatched_pair() {
        let mut repo = trading_repo();
        repo.commit(&AccountCreated::build(&repo, "account2")).unwrap();
        repo.commit(
            &AccountCredited::build(&repo, "credit3", "account2", "ltc", money(dec!(100)))
                .unwrap(),
        )
        .unwrap();
        repo.commit(
            &OrderCreated::build(
                &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
                money(dec!(0.1)), money(dec!(1)), dec!(0.01), Some(1),
            )
            .unwrap(),
        )
        .unwrap();
        repo.commit(
            &OrderCreated::build(
                &repo, "ask1", Side::Ask, "account2", "ltc", "btc",
                money(dec!(0.1)), money(dec!(1)), dec!(0.01), Some(2),
            )
            .unwrap(),
        )
        .unwrap();

        let exchange = repo.exchanges.find("ltc-btc").unwrap();
        let (bid_deal, ask_deal) = exchange
            .match_and_compute_deals(&repo.orders)
            .unwrap()
            .unwrap();
        let mut wrong = ask_deal.clone();
        wrong.pair_id = "someone-else".to_string();
        assert!(matches!(
            OrderDealt::build(&repo, bid_deal, wrong),
            Err(EngineError::Deal(_))
        ));
    }

    #[test]
    fn test_dealt_apply_is_atomic_on_stale_revision() {
        let mut repo = trading_repo();
        repo.commit(&AccountCreated::build(&repo, "account2")).unwrap();
        repo.commit(
            &AccountCredited::build(&repo, "credit3", "account2", "ltc", money(dec!(100)))
                .unwrap(),
        )
        .unwrap();
        repo.commit(
            &OrderCreated::build(
                &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
                money(dec!(0.1)), money(dec!(1)), dec!(0.01), Some(1),
            )
            .unwrap(),
        )
        .unwrap();
        repo.commit(
            &OrderCreated::build(
                &repo, "ask1", Side::Ask, "account2", "ltc", "btc",
                money(dec!(0.1)), money(dec!(1)), dec!(0.01), Some(2),
            )
            .unwrap(),
        )
        .unwrap();

        let exchange = repo.exchanges.find("ltc-btc").unwrap();
        let (bid_deal, ask_deal) = exchange
            .match_and_compute_deals(&repo.orders)
            .unwrap()
            .unwrap();
        let event = OrderDealt::build(&repo, bid_deal, ask_deal).unwrap();

        // A credit slips in between build and commit: the event now
        // targets a stale revision and must be rejected wholesale.
        repo.commit(
            &AccountCredited::build(&repo, "credit4", "account1", "ltc", money(dec!(5)))
                .unwrap(),
        )
        .unwrap();
        let orders_before = repo.orders.find("bid1").unwrap().deals().len();
        assert!(matches!(
            repo.commit(&event),
            Err(EngineError::Revision { .. })
        ));
        assert_eq!(repo.orders.find("bid1").unwrap().deals().len(), orders_before);
    }
}
