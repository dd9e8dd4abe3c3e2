//! Repository snapshots
//!
//! A snapshot is a full serialization of the repository — revision,
//! entities, and the three dedup filters — from which a `Repository` is
//! reconstituted exactly: replaying events from revision *r* onto a
//! snapshot taken at *r* yields the same state as a direct apply from
//! revision 0.
//!
//! Format: one JSON document holding metadata plus the serialized state.
//! The state is embedded as a string so the CRC-64 checksum has an exact
//! byte domain; a mismatch fails the load and nothing is restored.
//! Decimal values serialize as strings, so scale survives the round trip.

use crate::account::Account;
use crate::bloom::BloomFilter;
use crate::core_types::Revision;
use crate::order::Order;
use crate::orderbook::Exchange;
use crate::repository::{EntitiesSet, Repository};
use chrono::{DateTime, Utc};
use crc::{Crc, CRC_64_ECMA_182};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Flattened repository state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotState {
    pub revision: Revision,
    pub accounts: Vec<Account>,
    pub orders: Vec<Order>,
    pub exchanges: Vec<Exchange>,
    pub credits_bloom: BloomFilter,
    pub debits_bloom: BloomFilter,
    pub orders_bloom: BloomFilter,
}

impl SnapshotState {
    pub fn from_repository(repo: &Repository) -> Self {
        // Entity maps iterate in arbitrary order; sort so identical
        // repositories produce identical snapshots.
        let mut accounts: Vec<Account> = repo.accounts.iter().cloned().collect();
        accounts.sort_by(|a, b| a.id().cmp(b.id()));
        let mut orders: Vec<Order> = repo.orders.iter().cloned().collect();
        orders.sort_by(|a, b| a.id().cmp(b.id()));
        let mut exchanges: Vec<Exchange> = repo.exchanges.iter().cloned().collect();
        exchanges.sort_by_key(|e| e.id());

        Self {
            revision: repo.revision(),
            accounts,
            orders,
            exchanges,
            credits_bloom: repo.credits_bloom.clone(),
            debits_bloom: repo.debits_bloom.clone(),
            orders_bloom: repo.orders_bloom.clone(),
        }
    }

    pub fn into_repository(self) -> Repository {
        let mut accounts = EntitiesSet::new("Account");
        for account in self.accounts {
            accounts.add(account);
        }
        let mut orders = EntitiesSet::new("Order");
        for order in self.orders {
            orders.add(order);
        }
        let mut exchanges = EntitiesSet::new("Exchange");
        for exchange in self.exchanges {
            exchanges.add(exchange);
        }
        Repository::from_parts(
            self.revision,
            accounts,
            orders,
            exchanges,
            self.credits_bloom,
            self.debits_bloom,
            self.orders_bloom,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub revision: Revision,
    pub account_count: usize,
    pub order_count: usize,
    pub exchange_count: usize,
    /// CRC-64/ECMA of the serialized state string, hex-encoded.
    pub state_checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    metadata: SnapshotMetadata,
    state: String,
}

fn checksum(state_json: &str) -> String {
    format!("{:016x}", CRC64.checksum(state_json.as_bytes()))
}

/// Serialize the repository to `path`.
///
/// The document is written to a temporary sibling first and renamed into
/// place, so a crash cannot leave a half-written snapshot under `path`.
pub fn write_snapshot(repo: &Repository, path: impl AsRef<Path>) -> io::Result<SnapshotMetadata> {
    let path = path.as_ref();
    let state = SnapshotState::from_repository(repo);
    let state_json =
        serde_json::to_string(&state).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let metadata = SnapshotMetadata {
        format_version: SNAPSHOT_FORMAT_VERSION,
        revision: state.revision,
        account_count: state.accounts.len(),
        order_count: state.orders.len(),
        exchange_count: state.exchanges.len(),
        state_checksum: checksum(&state_json),
        created_at: Utc::now(),
    };
    let document = SnapshotDocument {
        metadata: metadata.clone(),
        state: state_json,
    };

    let tmp_path = path.with_extension("tmp");
    fs::write(
        &tmp_path,
        serde_json::to_string_pretty(&document)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
    )?;
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        path = %path.display(),
        revision = metadata.revision,
        "snapshot written"
    );
    Ok(metadata)
}

/// Load a repository from a snapshot written by [`write_snapshot`].
///
/// Verifies the format version and checksum before deserializing the
/// state; any failure restores nothing.
pub fn load_snapshot(path: impl AsRef<Path>) -> io::Result<Repository> {
    let raw = fs::read_to_string(path.as_ref())?;
    let document: SnapshotDocument =
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if document.metadata.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "unsupported snapshot format version {}",
                document.metadata.format_version
            ),
        ));
    }
    let actual = checksum(&document.state);
    if actual != document.metadata.state_checksum {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "snapshot checksum mismatch: expected {}, got {}",
                document.metadata.state_checksum, actual
            ),
        ));
    }

    let state: SnapshotState = serde_json::from_str(&document.state)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(state.into_repository())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        AccountCreated, AccountCredited, ExchangeCreated, OrderCreated,
    };
    use crate::money::Money;
    use crate::order::Side;
    use rust_decimal_macros::dec;

    fn seeded_repo() -> Repository {
        let mut repo = Repository::new();
        repo.commit(&ExchangeCreated::build(&repo, "ltc", "btc")).unwrap();
        repo.commit(&AccountCreated::build(&repo, "account1")).unwrap();
        repo.commit(
            &AccountCredited::build(
                &repo,
                "credit1",
                "account1",
                "btc",
                Money::from(dec!(100)),
            )
            .unwrap(),
        )
        .unwrap();
        repo.commit(
            &OrderCreated::build(
                &repo, "bid1", Side::Bid, "account1", "ltc", "btc",
                Money::from(dec!(0.1)), Money::from(dec!(10)), dec!(0.01), Some(1),
            )
            .unwrap(),
        )
        .unwrap();
        repo
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("spotmatch_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_roundtrip_preserves_state() {
        let repo = seeded_repo();
        let path = temp_path("roundtrip.json");
        let metadata = write_snapshot(&repo, &path).unwrap();
        assert_eq!(metadata.revision, 4);
        assert_eq!(metadata.account_count, 1);
        assert_eq!(metadata.order_count, 1);

        let restored = load_snapshot(&path).unwrap();
        assert_eq!(restored.revision(), repo.revision());

        // Balance values, scale and per-balance revision counters survive
        let balance = restored.accounts.find("account1").unwrap().find_balance("btc");
        let original = repo.accounts.find("account1").unwrap().find_balance("btc");
        assert_eq!(balance, original);
        assert_eq!(balance.active, Money::from(dec!(98.99)));
        assert_eq!(balance.frozen, Money::from(dec!(1.01)));

        // Orders and books survive
        assert_eq!(
            restored.orders.find("bid1").unwrap(),
            repo.orders.find("bid1").unwrap()
        );
        assert_eq!(
            restored.exchanges.find("ltc-btc").unwrap().best_bid(),
            Some(Money::from(dec!(0.1)))
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_dedup_filters_survive_restore() {
        let repo = seeded_repo();
        let path = temp_path("dedup.json");
        write_snapshot(&repo, &path).unwrap();
        let mut restored = load_snapshot(&path).unwrap();

        // The credit id used before the snapshot is still occupied
        let dup = AccountCredited::build(
            &restored,
            "credit1",
            "account1",
            "btc",
            Money::from(dec!(1)),
        )
        .unwrap();
        assert!(matches!(
            restored.commit(&dup),
            Err(crate::errors::EngineError::Conflicted(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupted_snapshot_rejected() {
        let repo = seeded_repo();
        let path = temp_path("corrupt.json");
        write_snapshot(&repo, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let tampered = raw.replacen("bid1", "bidX", 1);
        assert_ne!(raw, tampered);
        std::fs::write(&path, tampered).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        std::fs::remove_file(&path).ok();
    }
}
