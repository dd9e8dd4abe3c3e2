//! Exchange — the per-market price-time priority order book
//!
//! Each side is an ordered mapping from price to a FIFO queue of order
//! ids: bids are read from the highest key, asks from the lowest. A queue
//! that becomes empty is removed from its tree immediately, so the best
//! prices always correspond to real enqueued orders.
//!
//! The matching primitive only peeks/pops head order ids; it never
//! consults or mutates the orders themselves. Deal arithmetic lives in
//! [`Exchange::compute_deals`].

use crate::core_types::{now_millis, CoinType, ExchangeId, OrderId};
use crate::errors::{EngineError, Result};
use crate::money::{Money, Rounding};
use crate::order::{Order, Side};
use crate::repository::EntitiesSet;
use crate::values::Deal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// FIFO queue of order ids resting at one price.
pub type PriceLevel = VecDeque<OrderId>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    coin_type: CoinType,
    price_type: CoinType,
    /// Buy side: best price is the greatest key.
    bids: BTreeMap<Money, PriceLevel>,
    /// Sell side: best price is the least key.
    asks: BTreeMap<Money, PriceLevel>,
}

impl Exchange {
    pub fn new(coin_type: impl Into<CoinType>, price_type: impl Into<CoinType>) -> Self {
        Self {
            coin_type: coin_type.into(),
            price_type: price_type.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ExchangeId {
        format!("{}-{}", self.coin_type, self.price_type)
    }

    pub fn coin_type(&self) -> &str {
        &self.coin_type
    }

    pub fn price_type(&self) -> &str {
        &self.price_type
    }

    pub fn bids(&self) -> &BTreeMap<Money, PriceLevel> {
        &self.bids
    }

    pub fn asks(&self) -> &BTreeMap<Money, PriceLevel> {
        &self.asks
    }

    /// Get the best bid price (highest buy price).
    #[inline]
    pub fn best_bid(&self) -> Option<Money> {
        self.bids.last_key_value().map(|(price, _)| *price)
    }

    /// Get the best ask price (lowest sell price).
    #[inline]
    pub fn best_ask(&self) -> Option<Money> {
        self.asks.first_key_value().map(|(price, _)| *price)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    fn side_tree(&mut self, side: Side) -> &mut BTreeMap<Money, PriceLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Append the order id to the FIFO queue at its price level.
    ///
    /// # Errors
    /// `EngineError::Validation` if the order trades on another market.
    pub fn enqueue(&mut self, order: &Order) -> Result<()> {
        if order.exchange_id() != self.id() {
            return Err(EngineError::Validation(format!(
                "order exchange id {} does not match exchange {}",
                order.exchange_id(),
                self.id()
            )));
        }
        self.side_tree(order.side())
            .entry(order.price())
            .or_default()
            .push_back(order.id().to_string());
        Ok(())
    }

    /// Remove the order id from its price level; prune the level if it
    /// becomes empty. Removing an absent order is a no-op, which makes
    /// cancellation idempotent.
    pub fn dequeue(&mut self, order: &Order) {
        let price = order.price();
        let tree = self.side_tree(order.side());
        if let Some(queue) = tree.get_mut(&price) {
            if let Some(pos) = queue.iter().position(|id| id == order.id()) {
                queue.remove(pos);
            }
            if queue.is_empty() {
                tree.remove(&price);
            }
        }
    }

    /// Dequeue only when the order has no rest amount left.
    pub fn dequeue_if_completed(&mut self, order: &Order) {
        if order.is_completed() {
            self.dequeue(order);
        }
    }

    /// The head order ids at the best crossing prices, without mutating
    /// anything. `None` when either side is empty or the book does not
    /// cross (`best_bid < best_ask`).
    pub fn peek_match(&self) -> Option<(OrderId, OrderId)> {
        let (bid_price, bid_queue) = self.bids.last_key_value()?;
        let (ask_price, ask_queue) = self.asks.first_key_value()?;
        if bid_price < ask_price {
            return None;
        }
        Some((bid_queue.front()?.clone(), ask_queue.front()?.clone()))
    }

    /// Like [`peek_match`](Self::peek_match), but removes both heads
    /// (pruning emptied price levels).
    pub fn pop_match(&mut self) -> Option<(OrderId, OrderId)> {
        let (bid_price, ask_price) = match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if bid >= ask => (bid, ask),
            _ => return None,
        };
        let bid_id = Self::pop_head(&mut self.bids, bid_price)?;
        let ask_id = Self::pop_head(&mut self.asks, ask_price)?;
        Some((bid_id, ask_id))
    }

    fn pop_head(tree: &mut BTreeMap<Money, PriceLevel>, price: Money) -> Option<OrderId> {
        let queue = tree.get_mut(&price)?;
        let id = queue.pop_front();
        if queue.is_empty() {
            tree.remove(&price);
        }
        id
    }

    /// Peek the current match and price it against the live orders.
    /// `Ok(None)` when the book does not cross.
    pub fn match_and_compute_deals(
        &self,
        orders: &EntitiesSet<Order>,
    ) -> Result<Option<(Deal, Deal)>> {
        let Some((bid_id, ask_id)) = self.peek_match() else {
            return Ok(None);
        };
        let bid = orders.find(&bid_id)?;
        let ask = orders.find(&ask_id)?;
        tracing::trace!(
            exchange = %self.id(),
            bid = %bid_id,
            ask = %ask_id,
            "matched head orders"
        );
        Self::compute_deals(bid, ask).map(Some)
    }

    /// Price one match between a crossing bid/ask pair and compute both
    /// per-side deal records.
    ///
    /// The resting (earlier) order's price is honored: the deal executes
    /// at the ask price iff the ask arrived first, else at the bid price.
    /// All quantities are quantized toward zero so no outcome can exceed
    /// the frozen reservation.
    pub fn compute_deals(bid: &Order, ask: &Order) -> Result<(Deal, Deal)> {
        if bid.side() != Side::Bid || ask.side() != Side::Ask {
            return Err(EngineError::Validation(
                "compute_deals expects a (bid, ask) pair".to_string(),
            ));
        }
        if bid.exchange_id() != ask.exchange_id() {
            return Err(EngineError::Validation(format!(
                "orders trade on different markets: {} vs {}",
                bid.exchange_id(),
                ask.exchange_id()
            )));
        }
        if bid.price() < ask.price() {
            return Err(EngineError::Deal(format!(
                "orders do not cross: bid {} < ask {}",
                bid.price(),
                ask.price()
            )));
        }
        if !bid.rest_amount().is_positive() || !ask.rest_amount().is_positive() {
            return Err(EngineError::Deal(format!(
                "completed order in match: bid rest {} ask rest {}",
                bid.rest_amount(),
                ask.rest_amount()
            )));
        }

        let deal_price = if bid.timestamp() > ask.timestamp() {
            ask.price()
        } else {
            bid.price()
        };
        let deal_amount = bid.rest_amount().min(ask.rest_amount());
        let ask_outcome = deal_amount;
        let bid_outcome_origin = (deal_amount * deal_price).quantize(Rounding::TowardZero);
        let bid_fee = (bid_outcome_origin * bid.fee_rate()).quantize(Rounding::TowardZero);
        let ask_fee = (bid_outcome_origin * ask.fee_rate()).quantize(Rounding::TowardZero);
        let bid_outcome = bid_outcome_origin + bid_fee;
        let bid_income = ask_outcome;
        let ask_income = bid_outcome_origin - ask_fee;
        let timestamp = now_millis();

        let bid_deal = Deal {
            order_id: bid.id().to_string(),
            pair_id: ask.id().to_string(),
            price: deal_price,
            amount: deal_amount,
            rest_amount: bid.rest_amount() - deal_amount,
            rest_freeze_amount: bid.rest_freeze_amount() - bid_outcome,
            income: bid_income,
            outcome: bid_outcome,
            fee: bid_fee,
            timestamp,
        };
        let ask_deal = Deal {
            order_id: ask.id().to_string(),
            pair_id: bid.id().to_string(),
            price: deal_price,
            amount: deal_amount,
            rest_amount: ask.rest_amount() - deal_amount,
            rest_freeze_amount: ask.rest_freeze_amount() - ask_outcome,
            income: ask_income,
            outcome: ask_outcome,
            fee: ask_fee,
            timestamp,
        };
        Ok((bid_deal, ask_deal))
    }
}
