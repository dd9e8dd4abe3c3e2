//! Repository — the root aggregate and single write entry point
//!
//! The repository exclusively owns all entities. Mutations happen only
//! inside [`Repository::commit`]: the event's target revision must be
//! exactly `revision + 1`, the apply must succeed in full (or leave the
//! state untouched), and only then does the revision advance. Readers
//! query the entity sets directly.

use crate::account::Account;
use crate::bloom::BloomFilter;
use crate::config::DedupConfig;
use crate::core_types::Revision;
use crate::errors::{EngineError, Result};
use crate::events::Event;
use crate::order::Order;
use crate::orderbook::Exchange;
use rustc_hash::FxHashMap;

/// Anything stored in an [`EntitiesSet`].
pub trait Entity {
    /// The key this entity is stored under.
    fn key(&self) -> String;
}

impl Entity for Account {
    fn key(&self) -> String {
        self.id().to_string()
    }
}

impl Entity for Order {
    fn key(&self) -> String {
        self.id().to_string()
    }
}

impl Entity for Exchange {
    fn key(&self) -> String {
        self.id()
    }
}

/// Id-keyed collection of one entity kind.
///
/// `add` inserts or replaces (the replace path is how staged copies are
/// swapped in on apply), `remove` is idempotent, `find` is the erroring
/// lookup and `get` the optional one.
#[derive(Debug, Clone)]
pub struct EntitiesSet<T> {
    name: &'static str,
    entities: FxHashMap<String, T>,
}

impl<T: Entity> EntitiesSet<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entities: FxHashMap::default(),
        }
    }

    pub fn add(&mut self, entity: T) {
        self.entities.insert(entity.key(), entity);
    }

    pub fn remove(&mut self, id: &str) {
        self.entities.remove(id);
    }

    pub fn find(&self, id: &str) -> Result<&T> {
        self.entities
            .get(id)
            .ok_or_else(|| EngineError::not_found(self.name, id))
    }

    pub fn find_mut(&mut self, id: &str) -> Result<&mut T> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| EngineError::not_found(self.name, id))
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }
}

#[derive(Debug)]
pub struct Repository {
    revision: Revision,
    pub accounts: EntitiesSet<Account>,
    pub orders: EntitiesSet<Order>,
    pub exchanges: EntitiesSet<Exchange>,
    pub(crate) credits_bloom: BloomFilter,
    pub(crate) debits_bloom: BloomFilter,
    pub(crate) orders_bloom: BloomFilter,
}

impl Repository {
    pub fn new() -> Self {
        Self::with_config(&DedupConfig::default())
    }

    pub fn with_config(dedup: &DedupConfig) -> Self {
        let bloom = || BloomFilter::new(dedup.capacity, dedup.false_positive_rate);
        Self {
            revision: 0,
            accounts: EntitiesSet::new("Account"),
            orders: EntitiesSet::new("Order"),
            exchanges: EntitiesSet::new("Exchange"),
            credits_bloom: bloom(),
            debits_bloom: bloom(),
            orders_bloom: bloom(),
        }
    }

    /// Reassemble a repository from restored parts (snapshot load path).
    pub(crate) fn from_parts(
        revision: Revision,
        accounts: EntitiesSet<Account>,
        orders: EntitiesSet<Order>,
        exchanges: EntitiesSet<Exchange>,
        credits_bloom: BloomFilter,
        debits_bloom: BloomFilter,
        orders_bloom: BloomFilter,
    ) -> Self {
        Self {
            revision,
            accounts,
            orders,
            exchanges,
            credits_bloom,
            debits_bloom,
            orders_bloom,
        }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Apply a committed event.
    ///
    /// 1. Revision check: the event must target `revision + 1`.
    /// 2. Apply: all-or-nothing; a failing apply leaves the repository in
    ///    its pre-commit state and the error propagates.
    /// 3. Advance the revision.
    pub fn commit(&mut self, event: &Event) -> Result<()> {
        let target = event.revision();
        if target != self.revision + 1 {
            return Err(EngineError::Revision {
                target,
                current: self.revision,
            });
        }
        event.apply(self)?;
        self.revision += 1;
        tracing::debug!(revision = self.revision, kind = event.kind(), "committed");
        Ok(())
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}
