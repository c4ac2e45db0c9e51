//! Snapshot cache: per-contract ordered map of replayed heights.
//!
//! A replay to height H resumes from the nearest snapshot at or below H
//! instead of genesis. Entries carry the bound source id so a resumed
//! replay rebinds exactly the source version a from-genesis replay would
//! have bound at that height. Persistence is optional and best-effort:
//! cache I/O failures degrade to recomputation, never to a failed replay.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::core::{ReplayState, TxId, ValidityMap};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: ReplayState,
    pub validity: ValidityMap,
    pub src_tx_id: TxId,
}

pub struct SnapshotCache {
    enabled: bool,
    persist_dir: Option<PathBuf>,
    entries: Mutex<HashMap<TxId, BTreeMap<u64, Snapshot>>>,
}

impl SnapshotCache {
    pub fn in_memory() -> Self {
        Self {
            enabled: true,
            persist_dir: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn persistent(dir: PathBuf) -> Self {
        Self {
            enabled: true,
            persist_dir: Some(dir),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            persist_dir: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Nearest snapshot at or below `max_height` for `contract`.
    pub fn resolve(&self, contract: &TxId, max_height: u64) -> Option<(u64, Snapshot)> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        self.hydrate(&mut entries, contract);
        entries
            .get(contract)?
            .range(..=max_height)
            .next_back()
            .map(|(height, snapshot)| (*height, snapshot.clone()))
    }

    /// Record the replayed snapshot at `height`.
    pub fn store(&self, contract: &TxId, height: u64, snapshot: Snapshot) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        self.hydrate(&mut entries, contract);
        let per_contract = entries.entry(contract.clone()).or_default();
        per_contract.insert(height, snapshot);

        if let Some(dir) = &self.persist_dir {
            if let Err(e) = persist(dir, contract, per_contract) {
                tracing::warn!(contract = %contract, error = %e, "snapshot persistence failed");
            }
        }
    }

    /// Load persisted entries for `contract` on first touch.
    fn hydrate(&self, entries: &mut HashMap<TxId, BTreeMap<u64, Snapshot>>, contract: &TxId) {
        let Some(dir) = &self.persist_dir else {
            return;
        };
        if entries.contains_key(contract) {
            return;
        }
        let path = snapshot_path(dir, contract);
        if !path.exists() {
            return;
        }
        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(stored) => {
                entries.insert(contract.clone(), stored);
            }
            Err(e) => {
                tracing::warn!(
                    contract = %contract,
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable snapshot file"
                );
            }
        }
    }
}

fn snapshot_path(dir: &PathBuf, contract: &TxId) -> PathBuf {
    dir.join(format!("{}.json", contract))
}

fn persist(
    dir: &PathBuf,
    contract: &TxId,
    entries: &BTreeMap<u64, Snapshot>,
) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let text = serde_json::to_string(entries).map_err(|e| e.to_string())?;
    fs::write(snapshot_path(dir, contract), text).map_err(|e| e.to_string())
}
