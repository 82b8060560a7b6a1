//! Persistent index store backed by sled.
//!
//! Three trees make up the on-disk layout:
//!
//! - `files`: path → bincode-encoded [`FileRecord`]. The key is the path,
//!   so a path can only ever appear once.
//! - `names`: `name_lower \0 path` → empty. This is the lowercase-name
//!   index the substring pre-filter walks without decoding records.
//! - `metadata`: key → JSON value.
//!
//! Writes touching `files` and `names` go through one sled transaction,
//! so a batch is either fully visible or not at all.

use findex_core::{contains_all_terms, is_within, FileRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, Transactional,
};
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const FILES_TREE: &str = "files";
const NAMES_TREE: &str = "names";
const METADATA_TREE: &str = "metadata";
const NAME_KEY_SEPARATOR: u8 = 0;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(err: TransactionError<StoreError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<StoreError>>;

/// Durable table of file records plus a small metadata map.
pub struct IndexStore {
    db: Db,
    files: Tree,
    names: Tree,
    metadata: Tree,
}

impl IndexStore {
    /// Opens or creates a store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Opens a store that is deleted when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    fn with_db(db: Db) -> Result<Self> {
        Ok(Self {
            files: db.open_tree(FILES_TREE)?,
            names: db.open_tree(NAMES_TREE)?,
            metadata: db.open_tree(METADATA_TREE)?,
            db,
        })
    }

    /// Inserts a record, replacing any record with the same path.
    pub fn insert_or_replace(&self, record: &FileRecord) -> Result<()> {
        self.insert_or_replace_batch(std::slice::from_ref(record))
    }

    /// Inserts many records in a single transaction.
    ///
    /// Either every record in `records` becomes visible or none does.
    pub fn insert_or_replace_batch(&self, records: &[FileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Encode up front so the transaction body can't fail on serialization.
        let encoded = records
            .iter()
            .map(|r| -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
                Ok((r.path().as_bytes().to_vec(), bincode::serialize(r)?, name_key(r)))
            })
            .collect::<Result<Vec<_>>>()?;

        (&self.files, &self.names).transaction(|(files, names)| -> TxResult<()> {
            for (path, value, name) in &encoded {
                if let Some(old) = files.insert(path.as_slice(), value.as_slice())? {
                    remove_name_entry(names, &old)?;
                }
                names.insert(name.as_slice(), &[] as &[u8])?;
            }
            Ok(())
        })?;

        self.db.flush()?;
        Ok(())
    }

    /// Coarse pre-filter: records whose lowercase name contains every term.
    ///
    /// Walks the name index in name order and stops after `limit` hits.
    /// This is not a ranking; callers score the candidates themselves.
    pub fn query_by_terms_substring<S: AsRef<str>>(
        &self,
        terms: &[S],
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        let mut matches = Vec::new();
        if limit == 0 {
            return Ok(matches);
        }

        for item in self.names.iter() {
            let (key, _) = item?;
            let (name_lower, path) = split_name_key(&key)?;
            if !contains_all_terms(name_lower, terms) {
                continue;
            }

            match self.files.get(path)? {
                Some(bytes) => matches.push(bincode::deserialize(&bytes)?),
                None => {
                    warn!("Name index entry without record: {}", String::from_utf8_lossy(path));
                    continue;
                }
            }

            if matches.len() >= limit {
                break;
            }
        }

        Ok(matches)
    }

    /// Every record, in path order.
    pub fn get_all(&self) -> Result<Vec<FileRecord>> {
        self.files
            .iter()
            .values()
            .map(|value| -> Result<FileRecord> { Ok(bincode::deserialize(&value?)?) })
            .collect()
    }

    /// Looks up one record by exact path.
    pub fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        match self.files.get(path.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Deletes the record at exactly `path`. Returns whether one existed.
    pub fn delete_by_path(&self, path: &str) -> Result<bool> {
        let removed = (&self.files, &self.names).transaction(|(files, names)| -> TxResult<bool> {
            match files.remove(path.as_bytes())? {
                Some(old) => {
                    remove_name_entry(names, &old)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })?;

        if removed {
            self.db.flush()?;
        }
        Ok(removed)
    }

    /// Deletes `prefix` and every record nested under it.
    ///
    /// Membership is decided on the path, segment by segment, so deleting
    /// `/a` removes `/a/b/c` but leaves `/a2`.
    pub fn delete_by_subtree(&self, prefix: &str) -> Result<usize> {
        let mut doomed = Vec::new();
        for item in self.files.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            let path = std::str::from_utf8(&key)
                .map_err(|_| StoreError::Corrupted("non-UTF-8 path key".into()))?;
            if is_within(path, prefix) {
                doomed.push((key, value));
            }
        }

        if doomed.is_empty() {
            return Ok(0);
        }

        let names_to_drop = doomed
            .iter()
            .map(|(_, value)| -> Result<Vec<u8>> {
                let record: FileRecord = bincode::deserialize(value)?;
                Ok(name_key(&record))
            })
            .collect::<Result<Vec<_>>>()?;

        (&self.files, &self.names).transaction(|(files, names)| -> TxResult<()> {
            for (key, _) in &doomed {
                files.remove(key.clone())?;
            }
            for name in &names_to_drop {
                names.remove(name.as_slice())?;
            }
            Ok(())
        })?;

        self.db.flush()?;
        debug!("Removed {} records under {}", doomed.len(), prefix);
        Ok(doomed.len())
    }

    /// Removes every file record. Metadata is kept.
    pub fn clear_all(&self) -> Result<()> {
        self.files.clear()?;
        self.names.clear()?;
        self.db.flush()?;
        Ok(())
    }

    /// Reads a JSON-encoded metadata value.
    pub fn get_metadata<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.metadata.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a metadata value as JSON.
    pub fn set_metadata<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.metadata.insert(key.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Drops a metadata key.
    pub fn remove_metadata(&self, key: &str) -> Result<()> {
        self.metadata.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn name_key(record: &FileRecord) -> Vec<u8> {
    let mut key = Vec::with_capacity(record.name_lower().len() + record.path().len() + 1);
    key.extend_from_slice(record.name_lower().as_bytes());
    key.push(NAME_KEY_SEPARATOR);
    key.extend_from_slice(record.path().as_bytes());
    key
}

fn split_name_key(key: &[u8]) -> Result<(&str, &[u8])> {
    let idx = key
        .iter()
        .position(|b| *b == NAME_KEY_SEPARATOR)
        .ok_or_else(|| StoreError::Corrupted("name key without separator".into()))?;
    let name_lower = std::str::from_utf8(&key[..idx])
        .map_err(|_| StoreError::Corrupted("non-UTF-8 name key".into()))?;
    Ok((name_lower, &key[idx + 1..]))
}

fn remove_name_entry(names: &TransactionalTree, old_value: &[u8]) -> TxResult<()> {
    let old: FileRecord = bincode::deserialize(old_value)
        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
    names.remove(name_key(&old))?;
    Ok(())
}
