//! Bulkline Stress Test Binary
//!
//! A standalone binary for exercising the engine against a real SQLite
//! backend. Run with: `cargo run --release --bin stress -- [OPTIONS]`
//!
//! This is separate from the regular test suite because:
//! 1. It can take a long time to run
//! 2. It's configurable via command-line arguments
//! 3. It reports detailed metrics
//!
//! # Examples
//!
//! ```bash
//! # Default: 100k records through the adaptive mode
//! cargo run --release --bin stress
//!
//! # Parallel fan-out over four workers
//! cargo run --release --bin stress -- --mode parallel --parallelism 4
//!
//! # Resilient mode with a duplicate-heavy input
//! cargo run --release --bin stress -- --mode resilient --records 10000 --duplicates
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::Connection;

use bulkline::optimizer::BatchOptimizer;
use bulkline::{
    AdaptiveConfig, ChunkOutcome, Error, Operation, ParallelConfig, Result, Sink, SinkFactory,
};

// =============================================================================
// Configuration
// =============================================================================

/// Stress test configuration.
struct Config {
    /// Total number of records to write.
    records: usize,
    /// Execution mode: chunked, adaptive, parallel, or resilient.
    mode: String,
    /// Chunk size for chunked/parallel modes.
    chunk_size: usize,
    /// Worker count for parallel mode.
    parallelism: usize,
    /// Seed duplicate ids so the backend rejects some records.
    duplicates: bool,
    /// Path to database file (or temp if None).
    db_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            records: 100_000,
            mode: "adaptive".to_string(),
            chunk_size: 500,
            parallelism: 4,
            duplicates: false,
            db_path: None,
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--records" | "-r" => {
                i += 1;
                config.records = args[i].parse().expect("Invalid --records value");
            }
            "--mode" | "-m" => {
                i += 1;
                config.mode = args[i].clone();
            }
            "--chunk-size" | "-c" => {
                i += 1;
                config.chunk_size = args[i].parse().expect("Invalid --chunk-size value");
            }
            "--parallelism" | "-p" => {
                i += 1;
                config.parallelism = args[i].parse().expect("Invalid --parallelism value");
            }
            "--duplicates" => {
                config.duplicates = true;
            }
            "--db" | "-d" => {
                i += 1;
                config.db_path = Some(args[i].clone());
            }
            "--help" | "-h" => {
                println!(
                    r#"Bulkline Stress Test

Usage: stress [OPTIONS]

Options:
  -r, --records <N>       Records to write (default: 100000)
  -m, --mode <MODE>       chunked | adaptive | parallel | resilient (default: adaptive)
  -c, --chunk-size <N>    Chunk size for chunked/parallel modes (default: 500)
  -p, --parallelism <N>   Workers for parallel mode (default: 4)
  --duplicates            Seed duplicate ids to force rejections
  -d, --db <PATH>         Database path (default: temp file)
  -h, --help              Show this help
"#
                );
                std::process::exit(0);
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

// =============================================================================
// SQLite Sink Adapter
// =============================================================================

/// The record shape this binary writes.
#[derive(Debug, Clone)]
struct Record {
    id: i64,
    body: String,
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
/// `write` stages a chunk inside an open transaction; `commit`/`rollback`
/// close the boundary. WAL mode plus a busy timeout lets parallel workers
/// share one database file without tripping over the write lock.
struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(backend_error)?;
        conn.busy_timeout(std::time::Duration::from_secs(10))
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

impl Sink<Record> for SqliteSink {
    fn write(&mut self, records: &[Record], op: Operation) -> Result<ChunkOutcome> {
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
                // Leave the transaction open on failure; the engine rolls
                // it back through the commit boundary.
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
struct SqliteFactory {
    path: PathBuf,
}

impl SinkFactory<Record> for SqliteFactory {
    type Sink = SqliteSink;

    fn acquire(&self) -> Result<SqliteSink> {
        SqliteSink::open(&self.path)
    }
}

// =============================================================================
// Main
// =============================================================================

fn make_records(config: &Config) -> Vec<Record> {
    (0..config.records)
        .map(|i| {
            // With --duplicates every tenth record reuses the previous id,
            // so insert runs hit UNIQUE violations.
            let id = if config.duplicates && i % 10 == 9 {
                (i - 1) as i64
            } else {
                i as i64
            };
            Record {
                id,
                body: format!("record-{}", i),
            }
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = parse_args();

    let db_path = config.db_path.clone().map(PathBuf::from).unwrap_or_else(|| {
        std::env::temp_dir().join(format!("bulkline-stress-{}.db", std::process::id()))
    });

    println!("Bulkline Stress Test");
    println!("====================");
    println!("Records:     {}", config.records);
    println!("Mode:        {}", config.mode);
    println!("Database:    {}", db_path.display());

    let records = make_records(&config);
    let factory = SqliteFactory {
        path: db_path.clone(),
    };
    let engine = bulkline::spawn_engine(factory).expect("spawn engine");

    let wall = Instant::now();
    let summary = match config.mode.as_str() {
        "chunked" => engine
            .run_chunked(records, Operation::Insert, config.chunk_size)
            .await
            .expect("chunked run"),
        "adaptive" => {
            let result = engine
                .run_adaptive(records, Operation::Insert, AdaptiveConfig::default())
                .await
                .expect("adaptive run");

            let metrics = engine.adaptive_metrics().await.expect("metrics");
            println!("Chunks:      {}", metrics.len());
            if let Some(peak) = metrics.iter().map(|m| m.chunk_size).max() {
                println!("Peak size:   {}", peak);
            }

            let report = BatchOptimizer::default().analyze(&metrics);
            println!("Next run:    chunk size {}", report.recommended_chunk_size);
            for note in &report.recommendations {
                println!("             {}", note);
            }

            result
        }
        "parallel" => engine
            .run_parallel(
                records,
                Operation::Insert,
                ParallelConfig {
                    parallelism: config.parallelism,
                    chunk_size: config.chunk_size,
                },
            )
            .await
            .expect("parallel run"),
        "resilient" => {
            let result = engine
                .run_resilient(records, Operation::Insert)
                .await
                .expect("resilient run");

            println!("Rejected:    {}", result.failures.len());
            for failure in result.failures.iter().take(5) {
                println!(
                    "             #{} [{}] {}",
                    failure.index, failure.code, failure.message
                );
            }

            result.summary
        }
        other => {
            eprintln!("Unknown mode: {}", other);
            std::process::exit(1);
        }
    };
    let wall = wall.elapsed();

    engine.shutdown().await;

    println!();
    println!("Results");
    println!("-------");
    println!("Successful:  {}", summary.successful_records);
    println!("Failed:      {}", summary.failed_records);
    println!("Backend ms:  {}", summary.elapsed.as_millis());
    println!("Wall ms:     {}", wall.as_millis());
    println!("Throughput:  {:.0} records/sec", summary.throughput);

    if config.db_path.is_none() {
        let _ = std::fs::remove_file(&db_path);
    }
}
