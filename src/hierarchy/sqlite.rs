//! SQLite-backed hierarchy store
//!
//! Each worker opens its own [`SqliteStore`] through a shared
//! [`SqliteConnector`]; connections are never passed between threads.
//! WAL mode and a busy timeout let concurrent workers read the tree and
//! write info updates at the same time.

use crate::error::{StoreError, StoreResult};
use crate::hierarchy::{Connect, Container, HierarchyStore, Level, NodeId};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Current schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// SQL to create the nodes table
const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    level INTEGER NOT NULL,       -- 0=root .. 5=output
    label TEXT NOT NULL,
    parent_id TEXT,
    parent_level INTEGER,
    position INTEGER NOT NULL DEFAULT 0,
    info TEXT NOT NULL DEFAULT '{}'
)
"#;

/// SQL to create store metadata table
const CREATE_STORE_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS store_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id, level, position)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_level ON nodes(level)",
];

/// Pragmas for a store shared by several worker connections
const CONNECTION_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = OFF;
"#;

const SELECT_NODE: &str =
    "SELECT id, level, label, parent_id, parent_level, info FROM nodes WHERE id = ?1 AND level = ?2";

const SELECT_CHILDREN: &str = "SELECT id, level, label, parent_id, parent_level, info FROM nodes
     WHERE parent_id = ?1 AND level = ?2 ORDER BY position, rowid";

/// Create the store schema
pub fn create_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    conn.execute(CREATE_NODES_TABLE, [])?;
    conn.execute(CREATE_STORE_INFO_TABLE, [])?;
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    set_store_info(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
    Ok(())
}

/// Set a metadata value
pub fn set_store_info(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO store_info (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// Get a metadata value
pub fn get_store_info(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM store_info WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Raw `nodes` row: id, level, label, parent_id, parent_level, info
type NodeRow = (String, i64, String, Option<String>, Option<i64>, String);

fn row_to_container(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_container((id, level, label, parent_id, parent_level, info): NodeRow) -> StoreResult<Container> {
    let decode_level = |value: i64| {
        u8::try_from(value)
            .ok()
            .and_then(Level::from_u8)
            .ok_or_else(|| StoreError::Corrupt {
                id: id.clone(),
                reason: format!("unknown level {}", value),
            })
    };

    let level = decode_level(level)?;
    let parent = match (parent_id, parent_level) {
        (Some(pid), Some(plevel)) => Some((decode_level(plevel)?, NodeId::from(pid))),
        _ => None,
    };
    let info = match serde_json::from_str(&info)? {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(StoreError::Corrupt {
                id,
                reason: "info is not a JSON object".into(),
            })
        }
    };

    Ok(Container::from_parts(NodeId::from(id), level, label, parent, info))
}

/// One connection to a SQLite hierarchy
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Open an existing store
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::Connect(format!(
                "store '{}' does not exist",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Create a store (or open it if it exists) and ensure the schema
    pub fn create(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        create_schema(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Access the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a container at the end of its parent's enumeration order
    pub fn insert(&self, container: &Container) -> StoreResult<()> {
        let parent_id = container.parent().map(|(_, id)| id.as_str());
        let position: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE parent_id IS ?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        self.insert_at(container, position)
    }

    fn insert_at(&self, container: &Container, position: i64) -> StoreResult<()> {
        let (parent_level, parent_id) = match container.parent() {
            Some((level, id)) => (Some(level.as_db_int()), Some(id.as_str())),
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO nodes (id, level, label, parent_id, parent_level, position, info)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                container.id().as_str(),
                container.level().as_db_int(),
                container.label(),
                parent_id,
                parent_level,
                position,
                serde_json::to_string(container.info())?,
            ],
        )?;
        Ok(())
    }

    /// Import a nested JSON fixture; returns the number of containers written
    pub fn import(&self, fixture: &FixtureNode) -> StoreResult<usize> {
        if fixture.level != Level::Root {
            return Err(StoreError::InvalidAccessor {
                parent: Level::Root,
                child: fixture.level,
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        let root = Container::root(fixture.id.as_str(), fixture.label.as_str())
            .with_info(fixture.info.clone());
        self.insert_at(&root, 0)?;
        let mut count = 1;

        // Sibling position is the index within the fixture's children
        let mut pending: Vec<(&FixtureNode, Container, i64)> = fixture
            .children
            .iter()
            .enumerate()
            .map(|(position, child)| (child, root.clone(), position as i64))
            .collect();
        pending.reverse();

        while let Some((node, parent, position)) = pending.pop() {
            if !parent.level().accepts_child(node.level) {
                return Err(StoreError::InvalidAccessor {
                    parent: parent.level(),
                    child: node.level,
                });
            }
            let container = Container::child(
                node.id.as_str(),
                node.level,
                node.label.as_str(),
                &parent,
            )
            .with_info(node.info.clone());
            self.insert_at(&container, position)?;
            count += 1;

            for (position, child) in node.children.iter().enumerate().rev() {
                pending.push((child, container.clone(), position as i64));
            }
        }

        tx.commit()?;
        debug!(containers = count, path = %self.path.display(), "Fixture imported");
        Ok(count)
    }
}

impl HierarchyStore for SqliteStore {
    fn fetch(&self, level: Level, id: &NodeId) -> StoreResult<Container> {
        let row = self
            .conn
            .prepare_cached(SELECT_NODE)?
            .query_row(params![id.as_str(), level.as_db_int()], row_to_container)
            .optional()?;

        match row {
            Some(row) => decode_container(row),
            None => Err(StoreError::NotFound {
                level,
                id: id.clone(),
            }),
        }
    }

    fn children(&self, parent: &Container, level: Level) -> StoreResult<Vec<Container>> {
        if !parent.level().accepts_child(level) {
            return Err(StoreError::InvalidAccessor {
                parent: parent.level(),
                child: level,
            });
        }

        let mut stmt = self.conn.prepare_cached(SELECT_CHILDREN)?;
        let rows = stmt
            .query_map(params![parent.id().as_str(), level.as_db_int()], row_to_container)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(decode_container).collect()
    }

    fn update_info(
        &self,
        level: Level,
        id: &NodeId,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        // Take the write lock before reading so concurrent workers queue on busy_timeout
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let container = self.fetch(level, id)?;
        let mut info = container.info().clone();
        info.insert(key.to_string(), value);
        tx.execute(
            "UPDATE nodes SET info = ?1 WHERE id = ?2",
            params![serde_json::to_string(&info)?, id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite store {}", self.path.display())
    }
}

/// Opens one [`SqliteStore`] per worker
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connect for SqliteConnector {
    type Store = SqliteStore;

    fn connect(&self) -> StoreResult<SqliteStore> {
        SqliteStore::open(&self.path)
    }
}

/// Nested JSON description of a hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureNode {
    pub id: String,
    pub level: Level,
    pub label: String,
    #[serde(default)]
    pub info: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

impl FixtureNode {
    /// Read a fixture from a JSON file
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let file = std::fs::File::open(path)?;
        let fixture = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(fixture)
    }
}
