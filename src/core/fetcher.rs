//! Previous-transaction lookup
//!
//! Transactions are resolved through the [`TxFetcher`] trait so callers can
//! inject any source. [`TxCache`] is the file-backed implementation used by
//! the CLI: a JSON object mapping transaction id to raw transaction hex.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use thiserror::Error;

use super::transaction::Transaction;
use crate::params::Network;

/// Lookup errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Transaction not found: {0}")]
    RecordNotFound(String),
    #[error("Transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },
    #[error("Invalid cache entry {id}: {reason}")]
    InvalidEntry { id: String, reason: String },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Source of previous transactions
pub trait TxFetcher {
    /// Fetch the transaction with display-order hash `tx_id`
    fn fetch(&self, tx_id: &[u8; 32], network: Network) -> Result<Transaction, FetchError>;
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_file: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(".tx_cache.json"),
        }
    }
}

/// In-memory transaction cache with JSON persistence
#[derive(Debug, Default)]
pub struct TxCache {
    config: CacheConfig,
    txs: HashMap<String, Transaction>,
}

impl TxCache {
    /// Empty cache bound to `config.cache_file`
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            txs: HashMap::new(),
        }
    }

    /// Open the cache, loading the file if it exists
    pub fn open(config: CacheConfig) -> Result<Self, FetchError> {
        let mut cache = Self::new(config);
        if cache.config.cache_file.exists() {
            cache.load()?;
        }
        Ok(cache)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Merge the cache file into memory, returning the number of entries read.
    ///
    /// Every entry must parse and hash to its key.
    pub fn load(&mut self) -> Result<usize, FetchError> {
        let file = fs::File::open(&self.config.cache_file)?;
        let entries: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))?;

        for (id, raw) in &entries {
            let tx = Transaction::from_hex(raw, Network::Mainnet).map_err(|e| {
                FetchError::InvalidEntry {
                    id: id.clone(),
                    reason: e.to_string(),
                }
            })?;
            if tx.id() != *id {
                return Err(FetchError::IdMismatch {
                    expected: id.clone(),
                    actual: tx.id(),
                });
            }
            self.txs.insert(id.clone(), tx);
        }

        log::info!(
            "Loaded {} cached transactions from {}",
            entries.len(),
            self.config.cache_file.display()
        );
        Ok(entries.len())
    }

    /// Write the cache to disk
    pub fn save(&self) -> Result<(), FetchError> {
        let entries: BTreeMap<&str, String> = self
            .txs
            .iter()
            .map(|(id, tx)| (id.as_str(), hex::encode(tx.serialize())))
            .collect();

        let path = &self.config.cache_file;
        let temp_path = path.with_extension("tmp");
        let file = fs::File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &entries)?;
        fs::rename(&temp_path, path)?;

        log::debug!("Saved {} transactions to {}", entries.len(), path.display());
        Ok(())
    }

    /// Add a transaction keyed by its id, returning the id
    pub fn insert(&mut self, tx: Transaction) -> String {
        let id = tx.id();
        self.txs.insert(id.clone(), tx);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.txs.get(id)
    }

    /// Cached ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.txs.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

impl TxFetcher for TxCache {
    fn fetch(&self, tx_id: &[u8; 32], network: Network) -> Result<Transaction, FetchError> {
        let id = hex::encode(tx_id);
        let mut tx = self
            .txs
            .get(&id)
            .cloned()
            .ok_or_else(|| FetchError::RecordNotFound(id.clone()))?;
        if tx.hash() != *tx_id {
            return Err(FetchError::IdMismatch {
                expected: id,
                actual: tx.id(),
            });
        }
        tx.network = network;
        Ok(tx)
    }
}
