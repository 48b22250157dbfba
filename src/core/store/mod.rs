//! Persistent record store
//!
//! Records are stored as JSON bodies alongside a few indexed columns (kind,
//! owning case, due date, version). Every write is a compare-and-swap on the
//! version: a writer that read version `n` may only store `n + 1`, so two
//! concurrent transitions on the same record cannot both succeed.
//!
//! Two backends ship with the crate:
//! - [`SqliteStore`] - the project database (`.qct/qct.db`)
//! - [`MemoryStore`] - process-local, used by tests and embedders

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::entity::Entity;
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::{EntityId, EntityPrefix};

/// A record as the store sees it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: EntityPrefix,
    pub id: String,
    pub case_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created: DateTime<Utc>,
    pub version: u64,
    /// Serialized entity (JSON)
    pub body: String,
}

/// One write inside a [`Store::commit`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Insert(StoredRecord),
    /// Compare-and-swap against the stored version
    Update {
        record: StoredRecord,
        expected_version: u64,
    },
}

/// Create/read/update/list contract for record persistence
pub trait Store: Send + Sync {
    /// Insert a new record; fails if the id already exists
    fn insert(&self, record: &StoredRecord) -> CapaResult<()>;

    /// Insert several records atomically: all or none
    fn insert_batch(&self, records: &[StoredRecord]) -> CapaResult<()> {
        let ops: Vec<StoreOp> = records.iter().cloned().map(StoreOp::Insert).collect();
        self.commit(&ops).map(|_| ())
    }

    /// Apply inserts and version-checked updates atomically: all or none.
    /// Returns the resulting version of each record, in order.
    fn commit(&self, ops: &[StoreOp]) -> CapaResult<Vec<u64>>;

    /// Fetch a record by kind and id
    fn fetch(&self, kind: EntityPrefix, id: &str) -> CapaResult<Option<StoredRecord>>;

    /// Replace a record if its stored version equals `expected_version`.
    /// Returns the new version.
    fn update(&self, record: &StoredRecord, expected_version: u64) -> CapaResult<u64>;

    /// List records of a kind, optionally restricted to one case, ordered by
    /// due date ascending (undated last), then creation time.
    fn list(&self, kind: EntityPrefix, case_id: Option<&str>) -> CapaResult<Vec<StoredRecord>>;
}

/// Serialize an entity into its stored form
pub fn encode<E: Entity>(entity: &E) -> CapaResult<StoredRecord> {
    Ok(StoredRecord {
        kind: E::PREFIX,
        id: entity.id().to_string(),
        case_id: entity.case_id().map(|c| c.to_string()),
        due_date: entity.due_date(),
        created: entity.created(),
        version: entity.version(),
        body: serde_json::to_string(entity)?,
    })
}

/// Deserialize a stored record; the row's version is authoritative
pub fn decode<E: Entity>(record: &StoredRecord) -> CapaResult<E> {
    let mut entity: E = serde_json::from_str(&record.body)?;
    entity.set_version(record.version);
    Ok(entity)
}

/// Insert a new entity at version 1
pub fn insert<E: Entity>(store: &dyn Store, entity: &mut E) -> CapaResult<()> {
    entity.set_version(1);
    store.insert(&encode(entity)?)
}

/// Stage a new entity at version 1
pub fn stage_insert<E: Entity>(entity: &mut E) -> CapaResult<StoreOp> {
    entity.set_version(1);
    Ok(StoreOp::Insert(encode(entity)?))
}

/// Stage a version-checked write-back; apply the returned version with
/// `set_version` once the commit succeeds
pub fn stage_update<E: Entity>(entity: &E) -> CapaResult<StoreOp> {
    Ok(StoreOp::Update {
        record: encode(entity)?,
        expected_version: entity.version(),
    })
}

/// Load an entity by id
pub fn load<E: Entity>(store: &dyn Store, id: &EntityId) -> CapaResult<Option<E>> {
    store
        .fetch(E::PREFIX, &id.to_string())?
        .map(|r| decode(&r))
        .transpose()
}

/// Load an entity by id, failing with `NotFound`
pub fn require<E: Entity>(store: &dyn Store, id: &EntityId) -> CapaResult<E> {
    load(store, id)?.ok_or_else(|| CapaError::not_found(E::PREFIX.as_str(), id))
}

/// Write back a modified entity; bumps its version on success
pub fn save<E: Entity>(store: &dyn Store, entity: &mut E) -> CapaResult<()> {
    let record = encode(entity)?;
    let new_version = store.update(&record, entity.version())?;
    entity.set_version(new_version);
    Ok(())
}

/// List entities of one type
pub fn list<E: Entity>(store: &dyn Store, case_id: Option<&EntityId>) -> CapaResult<Vec<E>> {
    let case_key = case_id.map(|c| c.to_string());
    store
        .list(E::PREFIX, case_key.as_deref())?
        .iter()
        .map(decode)
        .collect()
}

/// Reject a caller-supplied version that no longer matches
pub fn check_expected<E: Entity>(entity: &E, expected: Option<u64>) -> CapaResult<()> {
    match expected {
        Some(v) if v != entity.version() => Err(CapaError::Conflict {
            entity: entity.id().to_string(),
            expected: v,
            actual: entity.version(),
        }),
        _ => Ok(()),
    }
}
