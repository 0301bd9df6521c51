//! Report output sinks
//!
//! A sink receives rows that are already aligned to the report schema. It is
//! never shared: either the writer thread owns it, or a direct reporter holds
//! it behind a lock.

use crate::error::{ReportError, ReportResult};
use crate::report::Schema;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for report rows
pub trait RecordSink: Send {
    /// Called once with the established schema before the first row
    fn begin(&mut self, schema: &Schema) -> ReportResult<()>;

    /// Write rows aligned to `schema`
    fn write_batch(&mut self, schema: &Schema, rows: &[Vec<Value>]) -> ReportResult<()>;

    /// Push buffered output to durable storage
    fn flush(&mut self) -> ReportResult<()> {
        Ok(())
    }

    /// Finalize the artifact; no rows follow
    fn finish(&mut self) -> ReportResult<()>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Output format, chosen from the report path's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One JSON object per line
    JsonLines,
    /// SQLite database with a `records` table
    Sqlite,
    /// Comma-separated values with a header row
    Csv,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("db") | Some("sqlite") | Some("sqlite3") => ReportFormat::Sqlite,
            Some("csv") => ReportFormat::Csv,
            _ => ReportFormat::JsonLines,
        }
    }
}

/// Create the sink matching `path`'s format
pub fn open(path: &Path) -> ReportResult<Box<dyn RecordSink>> {
    Ok(match ReportFormat::from_path(path) {
        ReportFormat::JsonLines => Box::new(JsonLinesSink::create(path)?),
        ReportFormat::Sqlite => Box::new(SqliteSink::create(path)?),
        ReportFormat::Csv => Box::new(CsvSink::create(path)?),
    })
}

fn create_failed(path: &Path, e: impl std::fmt::Display) -> ReportError {
    ReportError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Writes one JSON object per row, keys in schema order
pub struct JsonLinesSink {
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> ReportResult<Self> {
        let file = File::create(path).map_err(|e| create_failed(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn begin(&mut self, _schema: &Schema) -> ReportResult<()> {
        Ok(())
    }

    fn write_batch(&mut self, schema: &Schema, rows: &[Vec<Value>]) -> ReportResult<()> {
        for row in rows {
            let object: serde_json::Map<String, Value> = schema
                .fields()
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect();
            serde_json::to_writer(&mut self.out, &object)?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> ReportResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> ReportResult<()> {
        self.flush()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Writes a header row from the schema, then one record per row
///
/// Strings are written bare, nulls as empty cells, and everything else as
/// its JSON text.
pub struct CsvSink {
    path: PathBuf,
    out: csv::Writer<File>,
}

impl CsvSink {
    pub fn create(path: &Path) -> ReportResult<Self> {
        let out = csv::Writer::from_path(path).map_err(|e| create_failed(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
        })
    }
}

fn to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RecordSink for CsvSink {
    fn begin(&mut self, schema: &Schema) -> ReportResult<()> {
        self.out.write_record(schema.fields())?;
        Ok(())
    }

    fn write_batch(&mut self, _schema: &Schema, rows: &[Vec<Value>]) -> ReportResult<()> {
        for row in rows {
            self.out.write_record(row.iter().map(to_cell))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> ReportResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> ReportResult<()> {
        self.flush()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Report metadata table
pub const CREATE_REPORT_INFO: &str = r#"
CREATE TABLE IF NOT EXISTS report_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Keys stored in `report_info`
pub mod keys {
    pub const CREATED_AT: &str = "created_at";
    pub const FINISHED_AT: &str = "finished_at";
    pub const FIELDS: &str = "fields";
    pub const RECORDS: &str = "records";
    pub const STATUS: &str = "status";
    pub const VERSION: &str = "curator_version";
}

/// Writes rows into a `records` table with one column per schema field
pub struct SqliteSink {
    conn: Connection,
    path: PathBuf,
    insert_sql: Option<String>,
    written: u64,
}

impl SqliteSink {
    pub fn create(path: &Path) -> ReportResult<Self> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| create_failed(path, e))?;
        }
        let conn = Connection::open(path).map_err(|e| create_failed(path, e))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch(CREATE_REPORT_INFO)?;

        let sink = Self {
            conn,
            path: path.to_path_buf(),
            insert_sql: None,
            written: 0,
        };
        sink.set_info(keys::CREATED_AT, &Utc::now().to_rfc3339())?;
        sink.set_info(keys::VERSION, env!("CARGO_PKG_VERSION"))?;
        sink.set_info(keys::STATUS, "running")?;
        Ok(sink)
    }

    fn set_info(&self, key: &str, value: &str) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO report_info (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Quote an identifier for use as a column name
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map a JSON value onto SQLite's storage classes
fn to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Sql::Integer(i),
            None => n.as_f64().map(Sql::Real).unwrap_or(Sql::Null),
        },
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

impl RecordSink for SqliteSink {
    fn begin(&mut self, schema: &Schema) -> ReportResult<()> {
        let columns: Vec<String> = schema.fields().iter().map(|f| quote_ident(f)).collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS records ({});",
            columns.join(", ")
        ))?;

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        self.insert_sql = Some(format!(
            "INSERT INTO records ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ));
        self.set_info(keys::FIELDS, &serde_json::to_string(schema.fields())?)
    }

    fn write_batch(&mut self, _schema: &Schema, rows: &[Vec<Value>]) -> ReportResult<()> {
        let Some(sql) = self.insert_sql.as_deref() else {
            return Err(create_failed(&self.path, "records table not created"));
        };

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }
        tx.commit()?;
        self.written += rows.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> ReportResult<()> {
        self.set_info(keys::RECORDS, &self.written.to_string())?;
        self.set_info(keys::FINISHED_AT, &Utc::now().to_rfc3339())?;
        self.set_info(keys::STATUS, "completed")?;
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ReportFormat::from_path(Path::new("r.db")), ReportFormat::Sqlite);
        assert_eq!(ReportFormat::from_path(Path::new("r.SQLITE")), ReportFormat::Sqlite);
        assert_eq!(ReportFormat::from_path(Path::new("r.jsonl")), ReportFormat::JsonLines);
        assert_eq!(ReportFormat::from_path(Path::new("r.CSV")), ReportFormat::Csv);
        assert_eq!(ReportFormat::from_path(Path::new("report")), ReportFormat::JsonLines);
    }

    #[test]
    fn test_jsonl_keeps_schema_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.jsonl");
        let schema = Schema::new(["zeta", "alpha"]);

        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.begin(&schema).unwrap();
        sink.write_batch(&schema, &[vec![json!(1), json!("a")]]).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\"zeta\":1,\"alpha\":\"a\"}\n");
    }

    #[test]
    fn test_sqlite_sink_rows_and_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.db");
        let schema = Schema::new(["id", "label \"quoted\"", "ok", "extra"]);

        let mut sink = SqliteSink::create(&path).unwrap();
        sink.begin(&schema).unwrap();
        sink.write_batch(
            &schema,
            &[
                vec![json!("a"), json!("x"), json!(true), json!({"k": 1})],
                vec![json!("b"), json!(null), json!(false), json!(2.5)],
            ],
        )
        .unwrap();
        sink.finish().unwrap();
        drop(sink);

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let extra: String = conn
            .query_row("SELECT extra FROM records WHERE id = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(extra, r#"{"k":1}"#);

        let status: String = conn
            .query_row("SELECT value FROM report_info WHERE key = 'status'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "completed");
    }

    #[test]
    fn test_sqlite_accepts_row_id_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.db");
        let schema = Schema::new(["row_id", "label"]);

        let mut sink = SqliteSink::create(&path).unwrap();
        sink.begin(&schema).unwrap();
        sink.write_batch(&schema, &[vec![json!(7), json!("x")], vec![json!(7), json!("y")]])
            .unwrap();
        sink.finish().unwrap();
        drop(sink);

        let conn = Connection::open(&path).unwrap();
        let labels: Vec<String> = conn
            .prepare("SELECT label FROM records WHERE row_id = 7 ORDER BY rowid")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(labels, vec!["x", "y"]);
    }

    #[test]
    fn test_csv_header_and_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.csv");
        let schema = Schema::new(["id", "label", "size", "note"]);

        let mut sink = CsvSink::create(&path).unwrap();
        sink.begin(&schema).unwrap();
        sink.write_batch(
            &schema,
            &[
                vec![json!("a"), json!("scan, final"), json!(12), json!(null)],
                vec![json!("b"), json!("plain"), json!(true), json!({"k": 1})],
            ],
        )
        .unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "id,label,size,note\na,\"scan, final\",12,\nb,plain,true,\"{\"\"k\"\":1}\"\n"
        );
    }

    #[test]
    fn test_sqlite_write_before_begin_fails() {
        let dir = tempdir().unwrap();
        let mut sink = SqliteSink::create(&dir.path().join("r.db")).unwrap();
        let schema = Schema::new(["id"]);
        assert!(sink.write_batch(&schema, &[vec![json!("a")]]).is_err());
    }
}
