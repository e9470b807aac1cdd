use std::sync::RwLock;

use entity::Deal;

use crate::{DbError, DbResult, DealStore, DealTable, Upserted};

/// Process-local store. Last write wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<DealTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deals(deals: Vec<Deal>) -> Self {
        Self {
            table: RwLock::new(DealTable::new(deals)),
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.deals().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DealStore for MemoryStore {
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
        table.upsert(deal)
    }

    fn delete(&self, deal_id: &str) -> DbResult<bool> {
        let mut table = self.table.write().map_err(|_| DbError::Poisoned)?;
        Ok(table.delete(deal_id))
    }

    fn query(&self, predicate: &dyn Fn(&Deal) -> bool) -> DbResult<Vec<Deal>> {
        let table = self.table.read().map_err(|_| DbError::Poisoned)?;
        Ok(table.deals().iter().filter(|d| predicate(d)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(id: &str, owner: &str) -> Deal {
        let mut deal = Deal::new(format!("Deal {id}"), "Acme");
        deal.deal_id = id.to_string();
        deal.owner = Some(owner.to_string());
        deal
    }

    #[test]
    fn upsert_replaces_by_case_insensitive_id() {
        let store = MemoryStore::new();
        assert_eq!(store.upsert(deal("D-1", "ana")).unwrap(), Upserted::Inserted);
        assert_eq!(store.upsert(deal("d-1", "ben")).unwrap(), Upserted::Updated);
        assert_eq!(store.len(), 1);
        let stored = store.get("D-1").unwrap().unwrap();
        assert_eq!(stored.owner.as_deref(), Some("ben"));
    }

    #[test]
    fn delete_reports_absence() {
        let store = MemoryStore::with_deals(vec![deal("D-1", "ana")]);
        assert!(!store.delete("D-2").unwrap());
        assert!(store.delete("D-1").unwrap());
        assert!(store.is_empty());
        assert!(store.get("D-1").unwrap().is_none());
    }

    #[test]
    fn query_applies_predicate() {
        let store = MemoryStore::with_deals(vec![deal("D-1", "ana"), deal("D-2", "ben")]);
        let hits = store
            .query(&|d: &Deal| d.owner.as_deref() == Some("ben"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].deal_id, "D-2");
    }
}
