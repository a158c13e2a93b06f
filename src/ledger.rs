//! Device-local record of which polls were voted on and which were created
//! here.
//!
//! Stored through plain get/set-by-key primitives:
//!
//! ```text
//! voted:{poll_id}   → "true"
//! createdPolls      → JSON array of poll ids
//! ```
//!
//! Both sets only ever grow. Nothing in the client clears them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use redb::{Database, TableDefinition};

use crate::model::PollId;

const LEDGER_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("ledger");
const CREATED_KEY: &str = "createdPolls";

/// Durable key/value storage the ledger sits on.
pub trait LedgerBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create ledger directory")?;
        }
        let db = Database::create(path)
            .with_context(|| format!("failed to open ledger at {}", path.display()))?;
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(LEDGER_TABLE)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }
}

impl LedgerBackend for RedbBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LEDGER_TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(LEDGER_TABLE)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl LedgerBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

pub struct VoteLedger {
    backend: Box<dyn LedgerBackend>,
}

impl VoteLedger {
    pub fn new(backend: Box<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Box::new(RedbBackend::open(path)?)))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::<MemoryBackend>::default())
    }

    /// Default location: `<data_dir>/livepoll/ledger.redb`.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .context("Failed to get data directory")?
            .join("livepoll");
        Ok(data_dir.join("ledger.redb"))
    }

    fn voted_key(id: &PollId) -> String {
        format!("voted:{id}")
    }

    /// Read failures count as "not voted"; the store stays authoritative
    /// for counts either way.
    pub fn has_voted(&self, id: &PollId) -> bool {
        match self.backend.get(&Self::voted_key(id)) {
            Ok(Some(value)) => value == b"true",
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Could not read vote record for {}: {:#}", id, e);
                false
            }
        }
    }

    pub fn record_vote(&self, id: &PollId) -> Result<()> {
        if self.has_voted(id) {
            return Ok(());
        }
        self.backend
            .set(&Self::voted_key(id), b"true")
            .with_context(|| format!("failed to record vote for {id}"))
    }

    pub fn created_polls(&self) -> Result<Vec<PollId>> {
        match self.backend.get(CREATED_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).context("corrupt createdPolls record"),
            None => Ok(Vec::new()),
        }
    }

    pub fn owns(&self, id: &PollId) -> bool {
        match self.created_polls() {
            Ok(ids) => ids.contains(id),
            Err(e) => {
                tracing::warn!("Could not read ownership records: {:#}", e);
                false
            }
        }
    }

    pub fn record_created(&self, id: &PollId) -> Result<()> {
        let mut ids = self.created_polls()?;
        if ids.contains(id) {
            return Ok(());
        }
        ids.push(id.clone());
        let bytes = serde_json::to_vec(&ids)?;
        self.backend
            .set(CREATED_KEY, &bytes)
            .context("failed to record created poll")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_record_in_memory() {
        let ledger = VoteLedger::in_memory();
        let id = PollId::from("poll-1");
        assert!(!ledger.has_voted(&id));
        ledger.record_vote(&id).unwrap();
        ledger.record_vote(&id).unwrap();
        assert!(ledger.has_voted(&id));
        assert!(!ledger.has_voted(&PollId::from("poll-2")));
    }

    #[test]
    fn test_ownership_is_a_set() {
        let ledger = VoteLedger::in_memory();
        let a = PollId::from("a");
        let b = PollId::from("b");
        ledger.record_created(&a).unwrap();
        ledger.record_created(&b).unwrap();
        ledger.record_created(&a).unwrap();
        assert_eq!(ledger.created_polls().unwrap(), vec![a.clone(), b.clone()]);
        assert!(ledger.owns(&a));
        assert!(!ledger.owns(&PollId::from("c")));
    }

    #[test]
    fn test_voted_and_owned_are_independent() {
        let ledger = VoteLedger::in_memory();
        let id = PollId::from("x");
        ledger.record_created(&id).unwrap();
        assert!(!ledger.has_voted(&id));
        ledger.record_vote(&id).unwrap();
        assert!(ledger.owns(&id));
    }

    #[test]
    fn test_redb_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.redb");
        let id = PollId::from("durable");
        {
            let ledger = VoteLedger::open(&path).unwrap();
            ledger.record_vote(&id).unwrap();
            ledger.record_created(&id).unwrap();
        }
        let reopened = VoteLedger::open(&path).unwrap();
        assert!(reopened.has_voted(&id));
        assert!(reopened.owns(&id));
    }

    #[test]
    fn test_corrupt_created_record_is_an_error() {
        let backend = MemoryBackend::default();
        backend.set(CREATED_KEY, b"not json").unwrap();
        let ledger = VoteLedger::new(Box::new(backend));
        assert!(ledger.created_polls().is_err());
        assert!(!ledger.owns(&PollId::from("a")));
    }
}
