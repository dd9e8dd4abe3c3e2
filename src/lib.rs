//! spotmatch - Deterministic spot matching engine core
//!
//! An in-memory matching engine for a two-asset spot exchange: accounts
//! with multi-asset balances, live limit orders, and per-market
//! price-time priority books. Every mutation is an event that is first
//! built (computing intended balance transitions against the current
//! state) and then committed (re-validated and applied atomically, or
//! rejected).
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, OrderId, etc.)
//! - [`config`] - Operational configuration (logging, dedup sizing)
//! - [`errors`] - The engine error taxonomy
//! - [`money`] - Exact decimal arithmetic with controlled rounding
//! - [`values`] - Balance, BalanceRevision and Deal records
//! - [`account`] - Account aggregate
//! - [`order`] - Limit orders
//! - [`orderbook`] - Per-market book and the matching primitive
//! - [`bloom`] - Duplicate-id filters
//! - [`repository`] - Root aggregate and the commit gate
//! - [`events`] - Command objects for every state transition
//! - [`snapshot`] - Repository snapshots
//! - [`logging`] - Tracing setup

// Core types - must be first!
pub mod core_types;

// Configuration
pub mod config;

// Engine components
pub mod account;
pub mod bloom;
pub mod errors;
pub mod events;
pub mod logging;
pub mod money;
pub mod order;
pub mod orderbook;
pub mod repository;
pub mod snapshot;
pub mod values;

// Convenient re-exports at crate root
pub use account::Account;
pub use config::{AppConfig, DedupConfig, LogConfig};
pub use core_types::{AccountId, CoinType, ExchangeId, OrderId, Revision, Timestamp};
pub use errors::{EngineError, Result};
pub use events::{
    AccountCanceled, AccountCreated, AccountCredited, AccountDebited, Event, ExchangeCreated,
    OrderCanceled, OrderCreated, OrderDealt,
};
pub use money::{Money, Rounding, PRECISION_EXP, SCALE};
pub use order::{Order, Side};
pub use orderbook::Exchange;
pub use repository::{EntitiesSet, Entity, Repository};
pub use values::{Balance, BalanceRevision, Deal};
