//! Chain name/id registry.
//!
//! Holds the bidirectional mapping between human-readable chain names
//! (`"ETH"`, `"BSC"`, ...) and the numeric chain ids used throughout the
//! canonical `Transaction` record, plus each provider's own chain
//! vocabulary (the Ankr JSON-RPC provider uses lowercase slugs like `eth`,
//! `polygon` rather than chain ids).
//!
//! The registry is immutable once built and is swapped atomically on
//! config reload: readers always see either the old or the new snapshot,
//! never a torn one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors raised while resolving chain names or ids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No chain is registered under this name.
    #[error("unknown chain name: {0}")]
    UnknownName(String),

    /// No chain is registered under this id.
    #[error("unknown chain id: {0}")]
    UnknownId(i64),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// One entry in the registry: a chain's canonical name, id, native token
/// symbol, and the name the Ankr JSON-RPC adapter expects for it.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub name: String,
    pub chain_id: i64,
    pub native_symbol: String,
    pub ankr_name: String,
}

/// An immutable point-in-time view of the registry's contents.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    name_to_id: HashMap<String, i64>,
    id_to_name: HashMap<i64, String>,
    id_to_native: HashMap<i64, String>,
    ankr_name_to_id: HashMap<String, i64>,
    all_ankr_names: Vec<String>,
}

impl Snapshot {
    fn from_entries(entries: &[ChainEntry]) -> Self {
        let mut snap = Snapshot::default();
        for e in entries {
            let name = e.name.to_uppercase();
            snap.name_to_id.insert(name.clone(), e.chain_id);
            snap.id_to_name.insert(e.chain_id, name);
            snap.id_to_native
                .insert(e.chain_id, e.native_symbol.to_uppercase());
            let ankr = e.ankr_name.to_lowercase();
            snap.ankr_name_to_id.insert(ankr.clone(), e.chain_id);
            snap.all_ankr_names.push(ankr);
        }
        snap.all_ankr_names.sort();
        snap.all_ankr_names.dedup();
        snap
    }
}

/// Bidirectional chain name/id registry with atomic-swap reload support.
#[derive(Debug)]
pub struct ChainRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl ChainRegistry {
    /// Build a registry from a list of chain entries.
    pub fn new(entries: Vec<ChainEntry>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::from_entries(&entries))),
        }
    }

    /// Replace the registry's contents atomically. Readers in flight keep
    /// using the snapshot they already acquired.
    pub fn reload(&self, entries: Vec<ChainEntry>) {
        let new_snapshot = Arc::new(Snapshot::from_entries(&entries));
        *self.snapshot.write() = new_snapshot;
    }

    fn snap(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Resolve a chain name (case-insensitive) to its numeric chain id.
    pub fn id_by_name(&self, name: &str) -> Result<i64> {
        let snap = self.snap();
        snap.name_to_id
            .get(&name.to_uppercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Resolve a chain id to its canonical uppercase name.
    pub fn name_by_id(&self, id: i64) -> Result<String> {
        let snap = self.snap();
        snap.id_to_name
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownId(id))
    }

    /// Resolve a chain id to its native token symbol.
    pub fn native_token(&self, id: i64) -> Result<String> {
        let snap = self.snap();
        snap.id_to_native
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownId(id))
    }

    /// Resolve one of Ankr's own chain slugs (e.g. `"eth"`, `"bsc"`) back to
    /// a chain id, for mapping returned `blockchain` fields in Ankr
    /// responses to the canonical record.
    pub fn id_by_ankr_name(&self, ankr_name: &str) -> Result<i64> {
        let snap = self.snap();
        snap.ankr_name_to_id
            .get(&ankr_name.to_lowercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownName(ankr_name.to_string()))
    }

    /// Translate a set of user-supplied chain names into the Ankr provider's
    /// own vocabulary.
    ///
    /// Empty input means "all supported chains". Unknown or unsupported
    /// names are silently dropped. Duplicates are removed and the result is
    /// sorted for determinism. If filtering empties the result (every
    /// requested name was unknown), the full supported set is returned —
    /// the same behavior as an empty request.
    pub fn resolve_ankr(&self, names: &[String]) -> Vec<String> {
        let snap = self.snap();
        if names.is_empty() {
            return snap.all_ankr_names.clone();
        }

        let mut out: Vec<String> = names
            .iter()
            .filter_map(|n| {
                let id = *snap.name_to_id.get(&n.to_uppercase())?;
                // chain_id -> ankr name: reverse lookup via ankr_name_to_id
                snap.ankr_name_to_id
                    .iter()
                    .find(|(_, v)| **v == id)
                    .map(|(k, _)| k.clone())
            })
            .collect();

        out.sort();
        out.dedup();

        if out.is_empty() {
            snap.all_ankr_names.clone()
        } else {
            out
        }
    }
}
