//! In-memory store backend

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Store, StoreOp, StoredRecord};
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::EntityPrefix;

type Key = (EntityPrefix, String);

/// Process-local store guarded by a single mutex
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<Key, StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CapaResult<MutexGuard<'_, BTreeMap<Key, StoredRecord>>> {
        self.records
            .lock()
            .map_err(|e| CapaError::Storage(format!("store lock poisoned: {}", e)))
    }
}

fn duplicate(record: &StoredRecord) -> CapaError {
    CapaError::Storage(format!("{} {} already exists", record.kind, record.id))
}

impl Store for MemoryStore {
    fn insert(&self, record: &StoredRecord) -> CapaResult<()> {
        let mut records = self.lock()?;
        let key = (record.kind, record.id.clone());
        if records.contains_key(&key) {
            return Err(duplicate(record));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    fn commit(&self, ops: &[StoreOp]) -> CapaResult<Vec<u64>> {
        let mut records = self.lock()?;

        // Check every op against the stored state plus earlier ops in the batch
        let mut staged: BTreeMap<Key, StoredRecord> = BTreeMap::new();
        let mut versions = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                StoreOp::Insert(record) => {
                    let key = (record.kind, record.id.clone());
                    if records.contains_key(&key) || staged.contains_key(&key) {
                        return Err(duplicate(record));
                    }
                    versions.push(record.version);
                    staged.insert(key, record.clone());
                }
                StoreOp::Update {
                    record,
                    expected_version,
                } => {
                    let key = (record.kind, record.id.clone());
                    let current = staged
                        .get(&key)
                        .or_else(|| records.get(&key))
                        .ok_or_else(|| CapaError::not_found(record.kind.as_str(), &record.id))?;
                    if current.version != *expected_version {
                        return Err(CapaError::Conflict {
                            entity: record.id.clone(),
                            expected: *expected_version,
                            actual: current.version,
                        });
                    }
                    let mut next = record.clone();
                    next.version = expected_version + 1;
                    versions.push(next.version);
                    staged.insert(key, next);
                }
            }
        }

        records.extend(staged);
        Ok(versions)
    }

    fn fetch(&self, kind: EntityPrefix, id: &str) -> CapaResult<Option<StoredRecord>> {
        Ok(self.lock()?.get(&(kind, id.to_string())).cloned())
    }

    fn update(&self, record: &StoredRecord, expected_version: u64) -> CapaResult<u64> {
        let mut records = self.lock()?;
        let current = records
            .get_mut(&(record.kind, record.id.clone()))
            .ok_or_else(|| CapaError::not_found(record.kind.as_str(), &record.id))?;

        if current.version != expected_version {
            return Err(CapaError::Conflict {
                entity: record.id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }

        let mut next = record.clone();
        next.version = expected_version + 1;
        *current = next;
        Ok(expected_version + 1)
    }

    fn list(&self, kind: EntityPrefix, case_id: Option<&str>) -> CapaResult<Vec<StoredRecord>> {
        let records = self.lock()?;
        let mut matching: Vec<StoredRecord> = records
            .values()
            .filter(|r| r.kind == kind)
            .filter(|r| case_id.map_or(true, |c| r.case_id.as_deref() == Some(c)))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let due = match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            due.then(a.created.cmp(&b.created)).then(a.id.cmp(&b.id))
        });
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    #[test]
    fn test_insert_and_fetch() {
        contract::insert_and_fetch(&MemoryStore::new());
    }

    #[test]
    fn test_update_checks_version() {
        contract::update_checks_version(&MemoryStore::new());
    }

    #[test]
    fn test_list_orders_by_due_date() {
        contract::list_orders_by_due_date(&MemoryStore::new());
    }

    #[test]
    fn test_batch_is_atomic() {
        contract::batch_is_atomic(&MemoryStore::new());
    }

    #[test]
    fn test_commit_mixes_updates_and_inserts() {
        contract::commit_mixes_updates_and_inserts(&MemoryStore::new());
    }
}
