//! Core types used throughout the engine
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Account identifier — an opaque string chosen by the caller.
///
/// # Constraints:
/// - **Immutable**: once an account is created its id never changes
/// - **Unique**: primary key in the repository's account set
pub type AccountId = String;

/// Order identifier — an opaque string, unique across the lifetime of the
/// repository (enforced by the order dedup filter).
pub type OrderId = String;

/// Asset symbol, e.g. `"btc"` or `"ltc"`.
pub type CoinType = String;

/// Market identifier, always `"{coin_type}-{price_type}"`.
pub type ExchangeId = String;

/// Repository-wide commit counter. Strictly monotonic; each successful
/// commit advances it by exactly one.
pub type Revision = u64;

/// Wall-clock timestamp in milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall time, used when a caller does not supply a timestamp.
pub(crate) fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}
