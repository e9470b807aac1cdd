use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use entity::Deal;
use tracing::{debug, info};

use crate::{DbError, DbResult, DealStore, DealTable, Upserted};

/// Deal store persisted as a JSON array. Every mutation rewrites the file
/// through a temp file and rename; the previous file is kept as `<name>.bak`.
///
/// Mutations are staged on a copy of the table and only become visible once
/// the file write succeeds.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    table: RwLock<DealTable>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> DbResult<Self> {
        let path = path.into();
        let deals = if path.exists() {
            read_deals(&path)?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), deals = deals.len(), "deal store opened");
        Ok(Self {
            path,
            table: RwLock::new(DealTable::new(deals)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "bak")
    }

    /// Write the current contents to `dest` without touching the live file.
    pub fn backup_to(&self, dest: impl AsRef<Path>) -> DbResult<usize> {
        let table = self.table.read().map_err(|_| DbError::Poisoned)?;
        write_deals(dest.as_ref(), table.deals())?;
        Ok(table.deals().len())
    }

    /// Replace the contents with the deals stored in `src` and persist them.
    pub fn restore_from(&self, src: impl AsRef<Path>) -> DbResult<usize> {
        let deals = read_deals(src.as_ref())?;
        let mut table = self.table.write().map_err(|_| DbError::Poisoned)?;
        let staged = DealTable::new(deals);
        self.persist(&staged)?;
        *table = staged;
        info!(from = %src.as_ref().display(), deals = table.deals().len(), "deal store restored");
        Ok(table.deals().len())
    }

    fn persist(&self, table: &DealTable) -> DbResult<()> {
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path()).map_err(|source| DbError::Io {
                path: self.backup_path(),
                source,
            })?;
        }
        let tmp = sibling(&self.path, "tmp");
        write_deals(&tmp, table.deals())?;
        fs::rename(&tmp, &self.path).map_err(|source| DbError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), deals = table.deals().len(), "deal store saved");
        Ok(())
    }
}

impl DealStore for JsonFileStore {
    fn all(&self) -> DbResult<Vec<Deal>> {
        let table = self.table.read().map_err(|_| DbError::Poisoned)?;
        Ok(table.deals().to_vec())
    }

    fn get(&self, deal_id: &str) -> DbResult<Option<Deal>> {
        let table = self.table.read().map_err(|_| DbError::Poisoned)?;
        Ok(table.get(deal_id).cloned())
    }

    fn upsert(&self, deal: Deal) -> DbResult<Upserted> {
        let mut table = self.table.write().map_err(|_| DbError::Poisoned)?;
        let mut staged = table.clone();
        let outcome = staged.upsert(deal)?;
        self.persist(&staged)?;
        *table = staged;
        Ok(outcome)
    }

    fn delete(&self, deal_id: &str) -> DbResult<bool> {
        let mut table = self.table.write().map_err(|_| DbError::Poisoned)?;
        let mut staged = table.clone();
        if !staged.delete(deal_id) {
            return Ok(false);
        }
        self.persist(&staged)?;
        *table = staged;
        Ok(true)
    }

    fn query(&self, predicate: &dyn Fn(&Deal) -> bool) -> DbResult<Vec<Deal>> {
        let table = self.table.read().map_err(|_| DbError::Poisoned)?;
        Ok(table.deals().iter().filter(|d| predicate(d)).cloned().collect())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "deals.json".into());
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn read_deals(path: &Path) -> DbResult<Vec<Deal>> {
    let raw = fs::read_to_string(path).map_err(|source| DbError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| DbError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn write_deals(path: &Path, deals: &[Deal]) -> DbResult<()> {
    let body = serde_json::to_string_pretty(deals).map_err(|source| DbError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, body).map_err(|source| DbError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn deal(id: &str) -> Deal {
        let mut deal = Deal::new(format!("Deal {id}"), "Acme");
        deal.deal_id = id.to_string();
        deal
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.upsert(deal("D-1")).unwrap();
            store.upsert(deal("D-2")).unwrap();
            assert!(store.delete("D-1").unwrap());
        }
        let reopened = JsonFileStore::open(&path).unwrap();
        let all = reopened.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].deal_id, "D-2");
    }

    #[test]
    fn previous_file_is_kept_as_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.upsert(deal("D-1")).unwrap();
        store.upsert(deal("D-2")).unwrap();

        let backup: Vec<Deal> =
            serde_json::from_str(&fs::read_to_string(store.backup_path()).unwrap()).unwrap();
        assert_eq!(backup.len(), 1);
    }

    #[test]
    fn restore_replaces_contents() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("deals.json")).unwrap();
        store.upsert(deal("D-1")).unwrap();
        let snapshot = dir.path().join("snapshot.json");
        assert_eq!(store.backup_to(&snapshot).unwrap(), 1);

        store.upsert(deal("D-2")).unwrap();
        assert_eq!(store.restore_from(&snapshot).unwrap(), 1);
        assert!(store.get("D-2").unwrap().is_none());
        assert!(store.get("d-1").unwrap().is_some());
    }

    #[test]
    fn failed_writes_leave_contents_unchanged() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        let store = JsonFileStore::open(data_dir.join("deals.json")).unwrap();
        store.upsert(deal("D-1")).unwrap();
        let snapshot = dir.path().join("snapshot.json");
        store.backup_to(&snapshot).unwrap();
        fs::remove_dir_all(&data_dir).unwrap();

        assert!(matches!(store.upsert(deal("D-2")), Err(DbError::Io { .. })));
        assert!(store.get("D-2").unwrap().is_none());

        let mut renamed = deal("D-1");
        renamed.deal_name = "Renamed".into();
        assert!(store.upsert(renamed).is_err());
        assert_eq!(store.get("D-1").unwrap().unwrap().deal_name, "Deal D-1");

        assert!(store.delete("D-1").is_err());
        assert!(store.get("D-1").unwrap().is_some());

        assert!(store.restore_from(&snapshot).is_err());
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deals.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, DbError::Format { .. }));
    }
}
