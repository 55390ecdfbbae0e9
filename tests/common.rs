#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use bulkline::{ChunkOutcome, Error, Operation, Result, Sink, SinkFactory};

/// The record shape the integration tests write.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRecord {
    pub id: i64,
    pub body: String,
}

pub fn make_records(n: usize) -> Vec<TestRecord> {
    (0..n)
        .map(|i| TestRecord {
            id: i as i64,
            body: format!("record-{}", i),
        })
        .collect()
}

pub fn create_temp_db_file(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    // Initialize the schema once so read-back helpers work immediately.
    let sink = SqliteSink::open(&path).expect("initialize database");
    drop(sink);
    (dir, path)
}

pub fn open_connection(path: &Path) -> Connection {
    Connection::open(path).expect("open connection")
}

pub fn count_rows(path: &Path) -> i64 {
    open_connection(path)
        .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
        .expect("count rows")
}

pub fn row_ids(path: &Path) -> Vec<i64> {
    let conn = open_connection(path);
    let mut stmt = conn
        .prepare("SELECT id FROM records ORDER BY id")
        .expect("prepare");
    let ids = stmt
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<std::result::Result<Vec<i64>, _>>()
        .expect("collect");
    ids
}

pub fn insert_row(path: &Path, id: i64, body: &str) {
    open_connection(path)
        .execute(
            "INSERT INTO records (id, body) VALUES (?1, ?2)",
            rusqlite::params![id, body],
        )
        .expect("insert row");
}

fn backend_error(err: rusqlite::Error) -> Error {
    let code = match &err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code.to_string()),
        _ => None,
    };
    Error::Backend {
        code,
        message: err.to_string(),
    }
}

/// A sink bound to one exclusive SQLite connection.
///
/// `write` stages a chunk inside an open transaction; the engine closes the
/// boundary through `commit`/`rollback`. WAL mode plus a busy timeout lets
/// parallel workers share one database file.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(backend_error)?;
        conn.busy_timeout(Duration::from_secs(10))
            .map_err(backend_error)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(backend_error)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
            [],
        )
        .map_err(backend_error)?;
        Ok(Self { conn })
    }
}

impl Sink<TestRecord> for SqliteSink {
    fn write(&mut self, records: &[TestRecord], op: Operation) -> Result<ChunkOutcome> {
        let start = Instant::now();
        // IMMEDIATE takes the write lock up front, so concurrent workers
        // queue on the busy handler instead of failing mid-chunk.
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(backend_error)?;

        let sql = match op {
            Operation::Insert => "INSERT INTO records (id, body) VALUES (?1, ?2)",
            Operation::Update => "UPDATE records SET body = ?2 WHERE id = ?1",
            Operation::Delete => "DELETE FROM records WHERE id = ?1",
            Operation::Upsert => {
                "INSERT INTO records (id, body) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body"
            }
        };

        {
            let mut stmt = self.conn.prepare_cached(sql).map_err(backend_error)?;
            for record in records {
                let result = match op {
                    Operation::Delete => stmt.execute(rusqlite::params![record.id]),
                    _ => stmt.execute(rusqlite::params![record.id, record.body]),
                };
                // Leave the transaction open on failure; the engine rolls it
                // back through the commit boundary.
                result.map_err(backend_error)?;
            }
        }

        let n = records.len() as u64;
        Ok(ChunkOutcome::new(n, n, start.elapsed()))
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(backend_error)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(backend_error)
    }
}

/// Opens one exclusive connection per acquisition.
pub struct SqliteFactory {
    pub path: PathBuf,
}

impl SinkFactory<TestRecord> for SqliteFactory {
    type Sink = SqliteSink;

    fn acquire(&self) -> Result<SqliteSink> {
        SqliteSink::open(&self.path)
    }
}
