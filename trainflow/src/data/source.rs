//! Record sources: where ingestion pulls its raw table from.
//!
//! The production backend is a SQLite document store holding one JSON document
//! per row, grouped by collection. The store is opened once per process and
//! shared with the sources that read from it.

use super::table::{Cell, Table};
use crate::errors::{PipelineError, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashMap;
use std::sync::Arc;

/// Key column the document store adds to every exported record.
pub const DOCUMENT_ID_COLUMN: &str = "_id";

const URL_SCHEME: &str = "sqlite://";

/// Exports a named collection as a table.
#[cfg_attr(test, mockall::automock)]
pub trait RecordSource: Send + Sync {
    /// Fetches every record of `collection_name`.
    ///
    /// A collection that does not exist yields an empty table.
    fn fetch(&self, collection_name: &str) -> Result<Table>;
}

/// A SQLite-backed document store.
pub struct DocumentStore {
    conn: Mutex<Connection>,
    location: String,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Opens (or creates) the store at `url`.
    ///
    /// Accepts a plain file path or a `sqlite://` URL. The parent directory
    /// must exist.
    pub fn connect(url: &str) -> Result<Self> {
        let location = url.strip_prefix(URL_SCHEME).unwrap_or(url).trim();
        if location.is_empty() {
            return Err(PipelineError::Configuration(
                "database url is empty".to_string(),
            ));
        }
        let conn = Connection::open_with_flags(
            location,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| PipelineError::SourceUnavailable(format!("{location}: {e}")))?;
        Self::init(conn, location.to_string())
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn init(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 collection TEXT NOT NULL,
                 body TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS documents_collection ON documents (collection);",
        )?;
        tracing::info!(location = %location, "Connected to document store");
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Where the store lives.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Inserts JSON objects into a collection in one transaction.
    pub fn insert_documents(
        &self,
        collection: &str,
        documents: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO documents (collection, body) VALUES (?1, ?2)")?;
            for doc in documents {
                let body = serde_json::to_string(doc)?;
                stmt.execute(params![collection, body])?;
            }
        }
        tx.commit()?;
        tracing::debug!(collection, count = documents.len(), "Inserted documents");
        Ok(documents.len())
    }

    /// Inserts every row of a table as one document; missing cells are
    /// omitted from the document.
    pub fn insert_table(&self, collection: &str, table: &Table) -> Result<usize> {
        let documents: Vec<_> = table
            .rows()
            .iter()
            .map(|row| {
                table
                    .columns()
                    .iter()
                    .zip(row)
                    .filter(|(_, cell)| !cell.is_missing())
                    .map(|(col, cell)| (col.clone(), cell.to_json()))
                    .collect()
            })
            .collect();
        self.insert_documents(collection, &documents)
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Loads every document of a collection with its row id, in insertion
    /// order.
    pub fn find_all(
        &self,
        collection: &str,
    ) -> Result<Vec<(i64, serde_json::Map<String, serde_json::Value>)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let value: serde_json::Value = serde_json::from_str(&body)?;
            let serde_json::Value::Object(map) = value else {
                return Err(PipelineError::data(format!(
                    "document {id} in '{collection}' is not a JSON object"
                )));
            };
            documents.push((id, map));
        }
        Ok(documents)
    }
}

/// Reads collections from a shared [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct CollectionSource {
    store: Arc<DocumentStore>,
}

impl CollectionSource {
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

impl RecordSource for CollectionSource {
    fn fetch(&self, collection_name: &str) -> Result<Table> {
        let documents = self.store.find_all(collection_name)?;
        let ids: Vec<Cell> = documents
            .iter()
            .map(|(id, _)| Cell::Number(*id as f64))
            .collect();

        let mut table = Table::from_documents(documents.iter().map(|(_, doc)| doc));
        if !documents.is_empty() && !table.has_column(DOCUMENT_ID_COLUMN) {
            table.push_column(DOCUMENT_ID_COLUMN, ids)?;
        }

        tracing::info!(
            collection = collection_name,
            rows = table.n_rows(),
            cols = table.n_cols(),
            "Exported collection"
        );
        Ok(table)
    }
}

/// Serves fixed tables by collection name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    collections: HashMap<String, Table>,
}

impl InMemoryRecordSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under a collection name.
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>, table: Table) -> Self {
        self.collections.insert(name.into(), table);
        self
    }
}

impl RecordSource for InMemoryRecordSource {
    fn fetch(&self, collection_name: &str) -> Result<Table> {
        Ok(self
            .collections
            .get(collection_name)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn docs(values: &[serde_json::Value]) -> Vec<serde_json::Map<String, serde_json::Value>> {
        values
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_fetch_adds_document_id() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        store
            .insert_documents(
                "policies",
                &docs(&[
                    json!({"id": 1, "Gender": "Male", "Age": 44}),
                    json!({"id": 2, "Gender": "Female", "Age": "na"}),
                ]),
            )
            .unwrap();

        let table = CollectionSource::new(store.clone()).fetch("policies").unwrap();
        assert_eq!(table.columns(), ["id", "Gender", "Age", "_id"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.rows()[1][2], Cell::text("na"));
        assert_eq!(table.rows()[1][3], Cell::Number(2.0));
        assert_eq!(store.count("policies").unwrap(), 2);
    }

    #[test]
    fn test_imported_table_keeps_column_order() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let table = Table::from_rows(
            vec!["Vintage".into(), "Gender".into(), "Age".into()],
            vec![
                vec![Cell::Number(217.0), Cell::Missing, Cell::Number(44.0)],
                vec![Cell::Number(30.0), Cell::text("Male"), Cell::Number(23.0)],
            ],
        )
        .unwrap();
        store.insert_table("policies", &table).unwrap();

        let fetched = CollectionSource::new(store).fetch("policies").unwrap();
        // Gender is absent from the first document, so it is first seen last.
        assert_eq!(fetched.columns(), ["Vintage", "Age", "Gender", "_id"]);
        assert_eq!(fetched.rows()[0][2], Cell::Missing);
        assert_eq!(fetched.rows()[1][2], Cell::text("Male"));
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let table = CollectionSource::new(store).fetch("nothing").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.n_cols(), 0);
    }

    #[test]
    fn test_connect_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("store.db").display());

        {
            let store = DocumentStore::connect(&url).unwrap();
            let table = Table::from_rows(
                vec!["a".into(), "b".into()],
                vec![vec![Cell::Number(1.0), Cell::Missing]],
            )
            .unwrap();
            store.insert_table("c", &table).unwrap();
        }

        let store = DocumentStore::connect(&url).unwrap();
        let found = store.find_all("c").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.get("a"), Some(&json!(1.0)));
        assert!(found[0].1.get("b").is_none());
    }

    #[test]
    fn test_connect_unreachable_location() {
        let err = DocumentStore::connect("/definitely/missing/dir/store.db").unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[test]
    fn test_in_memory_source() {
        let table = Table::new(["x"]);
        let source = InMemoryRecordSource::new().with_collection("c", table.clone());
        assert_eq!(source.fetch("c").unwrap(), table);
        assert!(source.fetch("other").unwrap().is_empty());
    }

    #[test]
    fn test_mock_source() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Err(PipelineError::SourceUnavailable("down".into())));

        assert!(source.fetch("policies").is_err());
    }
}
