//! SQLite implementation of the response store.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{CacheError, Result};
use crate::network::Response;

use super::traits::{CacheStorage, CachedResponse, RequestKey};

const CURRENT_GENERATION: &str = "current_generation";

/// SQLite-based cache storage implementation.
#[derive(Debug)]
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the database at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path(),
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let conn = Connection::open(&path)?;
    Self::from_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> PathBuf {
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .unwrap_or_else(|| PathBuf::from("."))
      .join("shellcache")
      .join("cache.db")
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self.conn()?.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| CacheError::LockPoisoned(e.to_string()))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per named cache (generation)
CREATE TABLE IF NOT EXISTS caches (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots keyed by request hash
CREATE TABLE IF NOT EXISTS entries (
    cache_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, request_key)
);

CREATE INDEX IF NOT EXISTS idx_entries_cache ON entries(cache_name);

-- Single-valued settings such as the current generation
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn insert_entry(
  conn: &Connection,
  name: &str,
  key: &RequestKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)?;

  conn.execute(
    "INSERT OR REPLACE INTO entries
       (cache_name, request_key, method, url, status, status_text, headers, body, cached_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
    params![
      name,
      key.cache_hash(),
      key.method,
      key.url,
      response.status,
      response.status_text,
      headers,
      response.body,
    ],
  )?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, name: &str) -> Result<bool> {
    let created = self
      .conn()?
      .execute("INSERT OR IGNORE INTO caches (name) VALUES (?)", params![name])?;
    Ok(created > 0)
  }

  fn exists(&self, name: &str) -> Result<bool> {
    let found: Option<i64> = self
      .conn()?
      .query_row("SELECT 1 FROM caches WHERE name = ?", params![name], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(found.is_some())
  }

  fn names(&self) -> Result<Vec<String>> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at, rowid")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut conn = self.conn()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM entries WHERE cache_name = ?", params![name])?;
    let removed = tx.execute("DELETE FROM caches WHERE name = ?", params![name])?;
    tx.commit()?;
    Ok(removed > 0)
  }

  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<bool> {
    let mut conn = self.conn()?;
    let tx = conn.transaction()?;
    let live: Option<i64> = tx
      .query_row("SELECT 1 FROM caches WHERE name = ?", params![name], |row| {
        row.get(0)
      })
      .optional()?;
    if live.is_none() {
      return Ok(false);
    }
    insert_entry(&tx, name, key, response)?;
    tx.commit()?;
    Ok(true)
  }

  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut conn = self.conn()?;
    let tx = conn.transaction()?;
    tx.execute("INSERT OR IGNORE INTO caches (name) VALUES (?)", params![name])?;
    for (key, response) in entries {
      insert_entry(&tx, name, key, response)?;
    }
    tx.commit()?;
    Ok(())
  }

  fn lookup(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.conn()?;

    let row: Option<(String, u16, String, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT url, status, status_text, headers, body, cached_at FROM entries
         WHERE cache_name = ? AND request_key = ?",
        params![name, key.cache_hash()],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        },
      )
      .optional()?;

    match row {
      Some((url, status, status_text, headers, body, cached_at)) => Ok(Some(CachedResponse {
        response: Response {
          url,
          status,
          status_text,
          headers: serde_json::from_str(&headers)?,
          body,
        },
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn entry_count(&self, name: &str) -> Result<usize> {
    let count: i64 = self.conn()?.query_row(
      "SELECT COUNT(*) FROM entries WHERE cache_name = ?",
      params![name],
      |row| row.get(0),
    )?;
    Ok(count as usize)
  }

  fn current_generation(&self) -> Result<Option<String>> {
    let value = self
      .conn()?
      .query_row(
        "SELECT value FROM meta WHERE key = ?",
        params![CURRENT_GENERATION],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  fn set_current_generation(&self, name: &str) -> Result<()> {
    self.conn()?.execute(
      "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
      params![CURRENT_GENERATION, name],
    )?;
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  let parsed = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")?;
  Ok(parsed.and_utc())
}
