//! Deal storage primitives. The CRM core never touches storage directly; it
//! is handed snapshots from a [`DealStore`] and returns records to upsert.

mod file;
mod memory;

use std::path::PathBuf;

use entity::Deal;
use serde::Deserialize;
use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("deal has no dealId; normalize before storing")]
    MissingId,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid deal file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Outcome of an upsert.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Upserted {
    Inserted,
    Updated,
}

/// Mapping-store capabilities the CRM layer relies on. Identity comparison
/// is case-insensitive on `dealId`.
///
/// Implementations serialize writers against readers; callers may share a
/// store across threads.
pub trait DealStore: Send + Sync {
    fn all(&self) -> DbResult<Vec<Deal>>;

    fn get(&self, deal_id: &str) -> DbResult<Option<Deal>>;

    fn upsert(&self, deal: Deal) -> DbResult<Upserted>;

    /// Returns `false` when no deal carried that id.
    fn delete(&self, deal_id: &str) -> DbResult<bool>;

    fn query(&self, predicate: &dyn Fn(&Deal) -> bool) -> DbResult<Vec<Deal>> {
        Ok(self.all()?.into_iter().filter(|d| predicate(d)).collect())
    }
}

/// Environment-driven location of the deal file.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_path_key")]
    env_key: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            env_key: default_path_key(),
        }
    }
}

fn default_path_key() -> String {
    "DEALDESK_DATA".to_string()
}

pub const DEFAULT_DATA_FILE: &str = "deals.json";

impl StoreSettings {
    /// Deal file named by the settings' key in `env`, falling back to
    /// [`DEFAULT_DATA_FILE`] when the key is unset or blank.
    pub fn data_path<F>(&self, env: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        env(&self.env_key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE))
    }
}

/// In-memory table shared by both stores.
#[derive(Clone, Debug, Default)]
pub(crate) struct DealTable {
    deals: Vec<Deal>,
}

impl DealTable {
    pub(crate) fn new(deals: Vec<Deal>) -> Self {
        Self { deals }
    }

    pub(crate) fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub(crate) fn get(&self, deal_id: &str) -> Option<&Deal> {
        self.deals.iter().find(|d| d.has_id(deal_id))
    }

    pub(crate) fn upsert(&mut self, deal: Deal) -> DbResult<Upserted> {
        if deal.deal_id.trim().is_empty() {
            return Err(DbError::MissingId);
        }
        match self.deals.iter_mut().find(|d| d.has_id(&deal.deal_id)) {
            Some(existing) => {
                *existing = deal;
                Ok(Upserted::Updated)
            }
            None => {
                self.deals.push(deal);
                Ok(Upserted::Inserted)
            }
        }
    }

    pub(crate) fn delete(&mut self, deal_id: &str) -> bool {
        let before = self.deals.len();
        self.deals.retain(|d| !d.has_id(deal_id));
        self.deals.len() != before
    }
}
