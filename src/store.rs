use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
#[cfg(test)]
use std::collections::BTreeMap;
use thiserror::Error;

/// Collections known to the application shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Students,
    Departments,
    Staff,
    Subjects,
    Marks,
    Attendance,
    SubjectAllocations,
    StudentAllocations,
    StudentRecords,
    ChangeRequests,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Students,
        Collection::Departments,
        Collection::Staff,
        Collection::Subjects,
        Collection::Marks,
        Collection::Attendance,
        Collection::SubjectAllocations,
        Collection::StudentAllocations,
        Collection::StudentRecords,
        Collection::ChangeRequests,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Departments => "departments",
            Self::Staff => "staff",
            Self::Subjects => "subjects",
            Self::Marks => "marks",
            Self::Attendance => "attendance",
            Self::SubjectAllocations => "subjectAllocations",
            Self::StudentAllocations => "studentAllocations",
            Self::StudentRecords => "studentRecords",
            Self::ChangeRequests => "changeRequests",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == s)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed record in {collection}: {message}")]
    Decode { collection: String, message: String },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "db_query_failed",
            Self::Json(_) | Self::Decode { .. } => "db_corrupt_record",
        }
    }
}

/// Key -> ordered collection of JSON records.
///
/// Writes replace a whole collection. Reading a collection that was never
/// written yields an empty list.
pub trait RecordStore {
    fn get(&self, collection: &str) -> Result<Vec<Value>, StoreError>;
    fn put(&mut self, collection: &str, records: Vec<Value>) -> Result<(), StoreError>;
}

pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str())
}

pub fn find_by_id<S: RecordStore + ?Sized>(
    store: &S,
    collection: Collection,
    id: &str,
) -> Result<Option<Value>, StoreError> {
    Ok(store
        .get(collection.name())?
        .into_iter()
        .find(|r| record_id(r) == Some(id)))
}

/// Replaces the record with the same id in place, or appends it.
pub fn upsert_by_id<S: RecordStore + ?Sized>(
    store: &mut S,
    collection: Collection,
    record: Value,
) -> Result<(), StoreError> {
    let id = record_id(&record).map(str::to_string);
    let mut records = store.get(collection.name())?;
    match id.and_then(|id| records.iter().position(|r| record_id(r) == Some(id.as_str()))) {
        Some(idx) => records[idx] = record,
        None => records.push(record),
    }
    store.put(collection.name(), records)
}

/// Returns whether a record was removed.
pub fn delete_by_id<S: RecordStore + ?Sized>(
    store: &mut S,
    collection: Collection,
    id: &str,
) -> Result<bool, StoreError> {
    let records = store.get(collection.name())?;
    let before = records.len();
    let kept: Vec<Value> = records
        .into_iter()
        .filter(|r| record_id(r) != Some(id))
        .collect();
    if kept.len() == before {
        return Ok(false);
    }
    store.put(collection.name(), kept)?;
    Ok(true)
}

pub fn load<T, S>(store: &S, collection: Collection) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    S: RecordStore + ?Sized,
{
    store
        .get(collection.name())?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::from_value(v).map_err(|e| StoreError::Decode {
                collection: collection.name().to_string(),
                message: format!("record {}: {}", i, e),
            })
        })
        .collect()
}

pub fn save<T, S>(store: &mut S, collection: Collection, records: &[T]) -> Result<(), StoreError>
where
    T: Serialize,
    S: RecordStore + ?Sized,
{
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    store.put(collection.name(), values)
}

/// Empties every known collection.
pub fn reset_all<S: RecordStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    for c in Collection::ALL {
        store.put(c.name(), Vec::new())?;
    }
    Ok(())
}

/// In-process store for unit tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<Value>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl RecordStore for MemoryStore {
    fn get(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    fn put(&mut self, collection: &str, records: Vec<Value>) -> Result<(), StoreError> {
        self.collections.insert(collection.to_string(), records);
        Ok(())
    }
}

/// Workspace-backed store: one row per record, ordered by position.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn get(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM records WHERE collection = ? ORDER BY position")?;
        let bodies = stmt
            .query_map([collection], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(StoreError::from))
            .collect()
    }

    fn put(&mut self, collection: &str, records: Vec<Value>) -> Result<(), StoreError> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO collections(name, updated_at) VALUES(?, ?)
             ON CONFLICT(name) DO UPDATE SET updated_at = excluded.updated_at",
            (collection, &updated_at),
        )?;
        tx.execute("DELETE FROM records WHERE collection = ?", [collection])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO records(collection, position, record_id, body) VALUES(?, ?, ?, ?)",
            )?;
            for (i, record) in records.iter().enumerate() {
                let body = serde_json::to_string(record)?;
                insert.execute((collection, i as i64, record_id(record), body))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sqlite_store() -> SqliteStore {
        let conn = Connection::open_in_memory().expect("open");
        crate::db::init_schema(&conn).expect("schema");
        SqliteStore::new(conn)
    }

    #[test]
    fn absent_collection_reads_empty() {
        let store = sqlite_store();
        assert!(store.get("students").expect("get").is_empty());
        assert!(MemoryStore::new().get("students").expect("get").is_empty());
    }

    #[test]
    fn sqlite_put_replaces_and_keeps_order() {
        let mut store = sqlite_store();
        store
            .put(
                "departments",
                vec![json!({"id": "2", "code": "B"}), json!({"id": "1", "code": "A"})],
            )
            .expect("put");
        store
            .put("departments", vec![json!({"id": "3", "code": "C"}), json!({"id": "2", "code": "B"})])
            .expect("put");

        let ids: Vec<String> = store
            .get("departments")
            .expect("get")
            .iter()
            .filter_map(|r| record_id(r).map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["3".to_string(), "2".to_string()]);
    }

    #[test]
    fn upsert_replaces_in_place_and_delete_reports_presence() {
        let mut store = MemoryStore::new();
        upsert_by_id(&mut store, Collection::Staff, json!({"id": "a", "name": "x"})).expect("up");
        upsert_by_id(&mut store, Collection::Staff, json!({"id": "b", "name": "y"})).expect("up");
        upsert_by_id(&mut store, Collection::Staff, json!({"id": "a", "name": "z"})).expect("up");

        let all = store.get("staff").expect("get");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["name"], "z");

        assert!(delete_by_id(&mut store, Collection::Staff, "a").expect("del"));
        assert!(!delete_by_id(&mut store, Collection::Staff, "a").expect("del"));
        assert!(find_by_id(&store, Collection::Staff, "b").expect("find").is_some());
    }

    #[test]
    fn load_reports_malformed_records() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Dept {
            id: String,
            code: String,
        }
        let mut store = MemoryStore::new();
        store
            .put("departments", vec![json!({"id": "1"})])
            .expect("put");
        let err = load::<Dept, _>(&store, Collection::Departments).err().expect("decode error");
        assert_eq!(err.code(), "db_corrupt_record");
    }

    #[test]
    fn collection_names_roundtrip() {
        for c in Collection::ALL {
            assert_eq!(Collection::parse(c.name()), Some(c));
        }
        assert_eq!(Collection::parse("users"), None);
    }
}
