//! Limit orders
//!
//! An order is a Bid (buying `coin_type`, paying `price_type`) or an Ask
//! (selling `coin_type` for `price_type`). Placing an order reserves its
//! `freeze_amount` of the outcome asset; deals consume the reservation and
//! cancellation releases whatever is left.
//!
//! # Invariants
//! - `price > 0`, `amount > 0`, `0 <= fee_rate < 1` (checked at construction)
//! - `rest_amount >= 0` and `rest_freeze_amount >= 0` (maintained by
//!   [`Order::append_deal`])

use crate::core_types::{AccountId, CoinType, ExchangeId, OrderId, Timestamp};
use crate::errors::{EngineError, Result};
use crate::money::{Money, Rounding};
use crate::values::Deal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side: Bid buys the coin asset, Ask sells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    account_id: AccountId,
    side: Side,
    /// Asset being bought/sold.
    coin_type: CoinType,
    /// Asset used to pay.
    price_type: CoinType,
    price: Money,
    amount: Money,
    fee_rate: Decimal,
    timestamp: Timestamp,
    deals: Vec<Deal>,
}

impl Order {
    /// Construct a validated order with no deals.
    ///
    /// # Errors
    /// `EngineError::Validation` on non-positive price or amount, or a fee
    /// rate outside `[0, 1)`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<OrderId>,
        side: Side,
        account_id: impl Into<AccountId>,
        coin_type: impl Into<CoinType>,
        price_type: impl Into<CoinType>,
        price: Money,
        amount: Money,
        fee_rate: Decimal,
        timestamp: Timestamp,
    ) -> Result<Self> {
        if !price.is_positive() {
            return Err(EngineError::Validation(format!(
                "order price must be positive, got {price}"
            )));
        }
        if !amount.is_positive() {
            return Err(EngineError::Validation(format!(
                "order amount must be positive, got {amount}"
            )));
        }
        if fee_rate.is_sign_negative() || fee_rate >= Decimal::ONE {
            return Err(EngineError::Validation(format!(
                "fee rate must be in [0, 1), got {fee_rate}"
            )));
        }
        Ok(Self {
            id: id.into(),
            account_id: account_id.into(),
            side,
            coin_type: coin_type.into(),
            price_type: price_type.into(),
            price,
            amount,
            fee_rate,
            timestamp,
            deals: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn coin_type(&self) -> &str {
        &self.coin_type
    }

    pub fn price_type(&self) -> &str {
        &self.price_type
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    /// The market this order trades on: `"{coin_type}-{price_type}"`.
    pub fn exchange_id(&self) -> ExchangeId {
        format!("{}-{}", self.coin_type, self.price_type)
    }

    /// Asset credited by a deal: the coin for a Bid, the pricing asset
    /// for an Ask.
    pub fn income_type(&self) -> &str {
        match self.side {
            Side::Bid => &self.coin_type,
            Side::Ask => &self.price_type,
        }
    }

    /// Asset reserved and consumed by this order.
    pub fn outcome_type(&self) -> &str {
        match self.side {
            Side::Bid => &self.price_type,
            Side::Ask => &self.coin_type,
        }
    }

    /// Outcome-asset quantity reserved at placement.
    ///
    /// Ask: the full `amount`. Bid: `amount * price * (1 + fee_rate)`
    /// rounded half-even so neither side is systematically favored.
    pub fn freeze_amount(&self) -> Money {
        match self.side {
            Side::Ask => self.amount,
            Side::Bid => {
                (self.amount * self.price * (Decimal::ONE + self.fee_rate))
                    .quantize(Rounding::HalfEven)
            }
        }
    }

    /// Amount already exchanged across all deals.
    pub fn filled_amount(&self) -> Money {
        self.deals.iter().map(|deal| deal.amount).sum()
    }

    pub fn rest_amount(&self) -> Money {
        self.amount - self.filled_amount()
    }

    /// Reservation still held: `freeze_amount` minus the outcomes of all
    /// deals. A completed bid can leave a small positive residue here
    /// (rounding), which the deal event returns to the active balance.
    pub fn rest_freeze_amount(&self) -> Money {
        let consumed: Money = self.deals.iter().map(|deal| deal.outcome).sum();
        self.freeze_amount() - consumed
    }

    pub fn is_completed(&self) -> bool {
        self.rest_amount().is_zero()
    }

    /// Record a deal against this order.
    ///
    /// The deal carries the post-deal `rest_amount`/`rest_freeze_amount`
    /// it was computed for; a mismatch means the deal is being applied
    /// against a different order state than it was built from.
    ///
    /// # Errors
    /// `EngineError::Deal` on id mismatch or out-of-sequence application.
    pub fn append_deal(&mut self, deal: Deal) -> Result<()> {
        if deal.order_id != self.id {
            return Err(EngineError::Deal(format!(
                "deal for order {} appended to order {}",
                deal.order_id, self.id
            )));
        }
        if self.rest_amount() - deal.amount != deal.rest_amount {
            return Err(EngineError::Deal(format!(
                "out-of-sequence deal on order {}: rest_amount {} - {} != {}",
                self.id,
                self.rest_amount(),
                deal.amount,
                deal.rest_amount
            )));
        }
        if self.rest_freeze_amount() - deal.outcome != deal.rest_freeze_amount {
            return Err(EngineError::Deal(format!(
                "out-of-sequence deal on order {}: rest_freeze_amount {} - {} != {}",
                self.id,
                self.rest_freeze_amount(),
                deal.outcome,
                deal.rest_freeze_amount
            )));
        }
        if deal.rest_amount.is_negative() || deal.rest_freeze_amount.is_negative() {
            return Err(EngineError::Deal(format!(
                "deal overfills order {}: rest_amount {} rest_freeze_amount {}",
                self.id, deal.rest_amount, deal.rest_freeze_amount
            )));
        }
        self.deals.push(deal);
        Ok(())
    }
}
