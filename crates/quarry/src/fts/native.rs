//! Native FTS5 engine backed by SQLite.
//!
//! Layout: a content table `chunks` plus an external-content FTS5 table
//! `chunks_fts` kept in sync by triggers. Batch inserts run inside one
//! transaction. Queries go through FTS5 MATCH first (phrases, `*` prefix,
//! AND/OR all work); a MATCH syntax error silently degrades to per-term
//! `LIKE` matching so user queries never surface SQL errors.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FtsEngine, FtsEngineType, FtsError, FtsHit, FtsStats};
use crate::domain::Chunk;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
  rowid INTEGER PRIMARY KEY,
  chunk_id TEXT NOT NULL,
  path TEXT NOT NULL,
  text TEXT NOT NULL,
  start_line INTEGER NOT NULL,
  end_line INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS chunks_path_idx ON chunks(path);
CREATE INDEX IF NOT EXISTS chunks_chunk_id_idx ON chunks(chunk_id);
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
  text, path, content='chunks', content_rowid='rowid'
);
CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
  INSERT INTO chunks_fts(rowid, text, path) VALUES (new.rowid, new.text, new.path);
END;
CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
  INSERT INTO chunks_fts(chunks_fts, rowid, text, path) VALUES ('delete', old.rowid, old.text, old.path);
END;
";

/// Can SQLite with FTS5 be used in this build/environment?
pub fn native_available() -> bool {
  let Ok(conn) = Connection::open_in_memory() else {
    return false;
  };
  conn
    .execute_batch("CREATE VIRTUAL TABLE probe USING fts5(x);")
    .is_ok()
}

pub struct NativeFtsEngine {
  conn: Option<Connection>,
}

impl NativeFtsEngine {
  /// Open (or create) the FTS database at `db_path`.
  pub fn open(db_path: &Path) -> Result<Self, FtsError> {
    if let Some(parent) = db_path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| FtsError::Backend(e.to_string()))?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch(SCHEMA)?;
    debug!(path = %db_path.display(), "Native FTS engine opened");
    Ok(Self { conn: Some(conn) })
  }

  fn conn(&self) -> Result<&Connection, FtsError> {
    self.conn.as_ref().ok_or(FtsError::NotInitialized)
  }

  fn conn_mut(&mut self) -> Result<&mut Connection, FtsError> {
    self.conn.as_mut().ok_or(FtsError::NotInitialized)
  }

  fn search_match(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>, rusqlite::Error> {
    let conn = self.conn.as_ref().expect("checked by caller");
    let mut stmt = conn.prepare(
      "SELECT c.chunk_id, c.path, c.text, c.start_line, c.end_line, bm25(chunks_fts) AS score
       FROM chunks_fts
       JOIN chunks c ON c.rowid = chunks_fts.rowid
       WHERE chunks_fts MATCH ?1
       ORDER BY score
       LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![query, top_k as i64], row_to_hit)?;
    rows.collect()
  }

  /// Per-term LIKE fallback for queries FTS5 rejects.
  fn search_like(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>, FtsError> {
    let conn = self.conn()?;
    let terms: Vec<String> = query
      .split_whitespace()
      .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
      .filter(|t| !t.is_empty())
      .collect();

    if terms.is_empty() {
      return Ok(Vec::new());
    }

    let clause = (0..terms.len())
      .map(|i| format!("(lower(text) LIKE ?{})", i + 1))
      .collect::<Vec<_>>()
      .join(" OR ");
    let sql = format!(
      "SELECT chunk_id, path, text, start_line, end_line, 0.0 AS score FROM chunks WHERE {clause} LIMIT {top_k}"
    );

    let params: Vec<String> = terms.iter().map(|t| format!("%{t}%")).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), row_to_hit)?;

    let mut hits: Vec<FtsHit> = rows.collect::<Result<_, _>>()?;
    // Score by how many terms actually appear; LIKE has no bm25().
    for hit in &mut hits {
      let lower = hit.text.to_lowercase();
      let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
      hit.score = -(matched as f32);
    }
    hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(hits)
  }
}

fn row_to_hit(row: &rusqlite::Row<'_>) -> Result<FtsHit, rusqlite::Error> {
  let id_str: String = row.get(0)?;
  Ok(FtsHit {
    id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
    path: row.get(1)?,
    text: row.get(2)?,
    start_line: row.get::<_, i64>(3)? as u32,
    end_line: row.get::<_, i64>(4)? as u32,
    score: row.get::<_, f64>(5)? as f32,
  })
}

impl FtsEngine for NativeFtsEngine {
  fn engine_type(&self) -> FtsEngineType {
    FtsEngineType::Native
  }

  fn add_chunk(&mut self, chunk: &Chunk) -> Result<(), FtsError> {
    self.add_chunks(std::slice::from_ref(chunk))
  }

  fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<(), FtsError> {
    let conn = self.conn_mut()?;
    let tx = conn.transaction()?;
    {
      let mut delete = tx.prepare("DELETE FROM chunks WHERE chunk_id = ?1")?;
      let mut insert = tx.prepare(
        "INSERT INTO chunks (chunk_id, path, text, start_line, end_line) VALUES (?1, ?2, ?3, ?4, ?5)",
      )?;
      for chunk in chunks {
        let id = chunk.id.to_string();
        delete.execute(rusqlite::params![id])?;
        insert.execute(rusqlite::params![
          id,
          chunk.path,
          chunk.text,
          chunk.start_line as i64,
          chunk.end_line as i64,
        ])?;
      }
    }
    tx.commit()?;
    Ok(())
  }

  fn search(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>, FtsError> {
    self.conn()?;
    match self.search_match(query, top_k) {
      Ok(hits) => Ok(hits),
      Err(e) => {
        // FTS5 rejects queries with unbalanced quotes, bare operators and
        // similar; degrade to LIKE rather than surfacing the error.
        warn!(query = query, error = %e, "FTS5 MATCH failed, falling back to LIKE");
        self.search_like(query, top_k)
      }
    }
  }

  fn remove_by_path(&mut self, path: &str) -> Result<(), FtsError> {
    let conn = self.conn()?;
    conn.execute("DELETE FROM chunks WHERE path = ?1", rusqlite::params![path])?;
    Ok(())
  }

  fn normalize_scores(&self, hits: &mut [FtsHit]) {
    // bm25() is negative, more negative = better. Map the best hit to 1.0.
    let best = hits.iter().map(|h| h.score).fold(0.0f32, f32::min);
    if best < 0.0 {
      for hit in hits {
        hit.score = (hit.score / best).clamp(0.0, 1.0);
      }
    }
  }

  fn has_data(&self) -> bool {
    self
      .conn
      .as_ref()
      .and_then(|c| c.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get::<_, i64>(0)).ok())
      .unwrap_or(0)
      > 0
  }

  fn stats(&self) -> FtsStats {
    let documents = self
      .conn
      .as_ref()
      .and_then(|c| c.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get::<_, i64>(0)).ok())
      .unwrap_or(0);
    FtsStats {
      documents: documents as usize,
      terms: 0,
    }
  }

  fn serialize(&self) -> Result<Vec<u8>, FtsError> {
    // State lives in the SQLite file; nothing to export.
    Ok(Vec::new())
  }

  fn deserialize(&mut self, _bytes: &[u8]) -> Result<(), FtsError> {
    Ok(())
  }

  fn close(&mut self) -> Result<(), FtsError> {
    self.conn = None;
    Ok(())
  }
}
