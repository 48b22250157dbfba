//! SQLite store backend

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Store, StoreOp, StoredRecord};
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::EntityPrefix;

/// Bump when the table layout changes
const SCHEMA_VERSION: i32 = 1;

/// Record store backed by a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> CapaResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CapaError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    /// Transient database, discarded when dropped
    pub fn open_in_memory() -> CapaResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CapaResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> CapaResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CapaError::Storage(format!("connection lock poisoned: {}", e)))
    }
}

fn init_schema(conn: &Connection) -> CapaResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS records (
            kind TEXT NOT NULL,
            id TEXT NOT NULL,
            case_id TEXT,
            due_date TEXT,
            created TEXT NOT NULL,
            version INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        );
        CREATE INDEX IF NOT EXISTS idx_records_case ON records(kind, case_id);
        CREATE INDEX IF NOT EXISTS idx_records_due ON records(kind, due_date);
        "#,
    )?;

    let existing: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(v) if v != SCHEMA_VERSION => {
            return Err(CapaError::Storage(format!(
                "database schema version {} is not supported (expected {})",
                v, SCHEMA_VERSION
            )));
        }
        Some(_) => {}
    }
    Ok(())
}

fn insert_row(conn: &Connection, record: &StoredRecord) -> CapaResult<()> {
    let result = conn.execute(
        "INSERT INTO records (kind, id, case_id, due_date, created, version, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.kind.as_str(),
            record.id,
            record.case_id,
            record.due_date.map(|d| d.to_string()),
            record.created.to_rfc3339(),
            record.version as i64,
            record.body,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(CapaError::Storage(format!(
                "{} {} already exists",
                record.kind, record.id
            )))
        }
        Err(e) => Err(e.into()),
    }
}

fn update_row(conn: &Connection, record: &StoredRecord, expected_version: u64) -> CapaResult<u64> {
    let next = expected_version + 1;
    let changed = conn.execute(
        "UPDATE records
         SET case_id = ?1, due_date = ?2, version = ?3, body = ?4
         WHERE kind = ?5 AND id = ?6 AND version = ?7",
        params![
            record.case_id,
            record.due_date.map(|d| d.to_string()),
            next as i64,
            record.body,
            record.kind.as_str(),
            record.id,
            expected_version as i64,
        ],
    )?;

    if changed == 1 {
        return Ok(next);
    }

    // Nothing matched: either the record is gone or someone else wrote first
    let actual: Option<i64> = conn
        .query_row(
            "SELECT version FROM records WHERE kind = ?1 AND id = ?2",
            params![record.kind.as_str(), record.id],
            |row| row.get(0),
        )
        .optional()?;

    match actual {
        None => Err(CapaError::not_found(record.kind.as_str(), &record.id)),
        Some(actual) => Err(CapaError::Conflict {
            entity: record.id.clone(),
            expected: expected_version,
            actual: actual as u64,
        }),
    }
}

fn parse_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        kind: row.get(0)?,
        id: row.get(1)?,
        case_id: row.get(2)?,
        due_date: row.get(3)?,
        created: row.get(4)?,
        version: row.get(5)?,
        body: row.get(6)?,
    })
}

/// Row exactly as stored, before text columns are parsed
struct RawRow {
    kind: String,
    id: String,
    case_id: Option<String>,
    due_date: Option<String>,
    created: String,
    version: i64,
    body: String,
}

impl RawRow {
    fn into_record(self) -> CapaResult<StoredRecord> {
        let kind = self
            .kind
            .parse::<EntityPrefix>()
            .map_err(|_| CapaError::Storage(format!("unknown record kind '{}'", self.kind)))?;
        let due_date = self
            .due_date
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .map_err(|e| CapaError::Storage(format!("bad due date '{}': {}", d, e)))
            })
            .transpose()?;
        let created = DateTime::parse_from_rfc3339(&self.created)
            .map_err(|e| CapaError::Storage(format!("bad timestamp '{}': {}", self.created, e)))?
            .with_timezone(&Utc);

        Ok(StoredRecord {
            kind,
            id: self.id,
            case_id: self.case_id,
            due_date,
            created,
            version: self.version as u64,
            body: self.body,
        })
    }
}

impl Store for SqliteStore {
    fn insert(&self, record: &StoredRecord) -> CapaResult<()> {
        let conn = self.lock()?;
        insert_row(&conn, record)
    }

    fn commit(&self, ops: &[StoreOp]) -> CapaResult<Vec<u64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut versions = Vec::with_capacity(ops.len());
        for op in ops {
            let version = match op {
                StoreOp::Insert(record) => {
                    insert_row(&tx, record)?;
                    record.version
                }
                StoreOp::Update {
                    record,
                    expected_version,
                } => update_row(&tx, record, *expected_version)?,
            };
            versions.push(version);
        }
        tx.commit()?;
        Ok(versions)
    }

    fn fetch(&self, kind: EntityPrefix, id: &str) -> CapaResult<Option<StoredRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT kind, id, case_id, due_date, created, version, body
                 FROM records WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                parse_row,
            )
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }

    fn update(&self, record: &StoredRecord, expected_version: u64) -> CapaResult<u64> {
        let conn = self.lock()?;
        update_row(&conn, record, expected_version)
    }

    fn list(&self, kind: EntityPrefix, case_id: Option<&str>) -> CapaResult<Vec<StoredRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT kind, id, case_id, due_date, created, version, body
             FROM records
             WHERE kind = ?1 AND (?2 IS NULL OR case_id = ?2)
             ORDER BY due_date IS NULL, due_date, created, id",
        )?;
        let rows = stmt.query_map(params![kind.as_str(), case_id], parse_row)?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(raw?.into_record()?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_and_fetch() {
        contract::insert_and_fetch(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_update_checks_version() {
        contract::update_checks_version(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_list_orders_by_due_date() {
        contract::list_orders_by_due_date(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_batch_is_atomic() {
        contract::batch_is_atomic(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_commit_mixes_updates_and_inserts() {
        contract::commit_mixes_updates_and_inserts(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_records_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(".qct").join("qct.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            contract::insert_and_fetch(&store);
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let record = reopened.fetch(EntityPrefix::Act, "ACT-A").unwrap().unwrap();
        assert_eq!(record.case_id.as_deref(), Some("CASE-1"));
        assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }
}
