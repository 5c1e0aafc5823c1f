//! LanceDB-backed vector store.
//!
//! One `chunks` table per store directory. Vectors live in a fixed-size
//! float list column; records without an embedding are written with a
//! zero vector and `has_vector = false` so partial writes survive a crash
//! without poisoning similarity search.

use std::{path::PathBuf, sync::Arc};

use arrow_array::{
  Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
  Connection, connect,
  query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ChunkRecord, Result, SpanUpdate, StoreError, StoredChunk, VectorStore};
use crate::domain::{ChunkKind, ExistingChunk};

const CHUNKS_TABLE: &str = "chunks";

/// Arrow schema for the chunks table.
fn chunks_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("path", DataType::Utf8, false),
    Field::new("text", DataType::Utf8, false),
    Field::new("start_line", DataType::UInt32, false),
    Field::new("end_line", DataType::UInt32, false),
    Field::new("content_hash", DataType::Utf8, false),
    Field::new("chunk_hash", DataType::Utf8, false),
    Field::new("kind", DataType::Utf8, true),
    Field::new("name", DataType::Utf8, true),
    Field::new("language", DataType::Utf8, true),
    Field::new("docstring", DataType::Utf8, true),
    Field::new("header_path", DataType::Utf8, true),
    Field::new("has_vector", DataType::Boolean, false),
    Field::new(
      "vector",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      false,
    ),
  ]))
}

/// LanceDB store rooted at a directory.
pub struct LanceStore {
  db_path: PathBuf,
  connection: Connection,
  vector_dim: usize,
}

impl LanceStore {
  /// Open or create the store at `db_path`.
  pub async fn open(db_path: PathBuf, vector_dim: usize) -> Result<Self> {
    if let Some(parent) = db_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    info!(path = %db_path.display(), vector_dim, "Opening vector store");
    let connection = connect(db_path.to_string_lossy().as_ref()).execute().await?;

    let store = Self {
      db_path,
      connection,
      vector_dim,
    };
    store.ensure_table().await?;
    Ok(store)
  }

  async fn ensure_table(&self) -> Result<()> {
    let names = self.connection.table_names().execute().await?;
    if !names.contains(&CHUNKS_TABLE.to_string()) {
      debug!("Creating chunks table");
      self
        .connection
        .create_empty_table(CHUNKS_TABLE, chunks_schema(self.vector_dim))
        .execute()
        .await?;
    }
    Ok(())
  }

  async fn table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(CHUNKS_TABLE).execute().await?)
  }

  fn records_to_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
    let n = records.len();

    let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
    let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    let start_lines: Vec<u32> = records.iter().map(|r| r.start_line).collect();
    let end_lines: Vec<u32> = records.iter().map(|r| r.end_line).collect();
    let content_hashes: Vec<&str> = records.iter().map(|r| r.content_hash.as_str()).collect();
    let chunk_hashes: Vec<&str> = records.iter().map(|r| r.chunk_hash.as_str()).collect();

    let kinds: Vec<Option<&'static str>> = records
      .iter()
      .map(|r| r.metadata.as_ref().and_then(|m| m.kind).map(|k| k.as_str()))
      .collect();
    let names: Vec<Option<String>> = records
      .iter()
      .map(|r| r.metadata.as_ref().and_then(|m| m.name.clone()))
      .collect();
    let languages: Vec<Option<&'static str>> = records
      .iter()
      .map(|r| r.metadata.as_ref().and_then(|m| m.language).map(|l| l.as_str()))
      .collect();
    let docstrings: Vec<Option<String>> = records
      .iter()
      .map(|r| r.metadata.as_ref().and_then(|m| m.docstring.clone()))
      .collect();
    let header_paths: Vec<Option<String>> = records
      .iter()
      .map(|r| r.metadata.as_ref().and_then(|m| m.header_path.clone()))
      .collect();

    let has_vectors: Vec<bool> = records.iter().map(|r| !r.vector.is_empty()).collect();

    let mut all_vectors: Vec<f32> = Vec::with_capacity(n * self.vector_dim);
    for record in records {
      let mut v = record.vector.clone();
      v.resize(self.vector_dim, 0.0);
      all_vectors.extend(v);
    }
    let vector_values = Float32Array::from(all_vectors);
    let item_field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_list = FixedSizeListArray::try_new(item_field, self.vector_dim as i32, Arc::new(vector_values), None)?;

    let batch = RecordBatch::try_new(
      chunks_schema(self.vector_dim),
      vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(paths)),
        Arc::new(StringArray::from(texts)),
        Arc::new(UInt32Array::from(start_lines)),
        Arc::new(UInt32Array::from(end_lines)),
        Arc::new(StringArray::from(content_hashes)),
        Arc::new(StringArray::from(chunk_hashes)),
        Arc::new(StringArray::from(kinds)),
        Arc::new(StringArray::from(names)),
        Arc::new(StringArray::from(languages)),
        Arc::new(StringArray::from(docstrings)),
        Arc::new(StringArray::from(header_paths)),
        Arc::new(BooleanArray::from(has_vectors)),
        Arc::new(vector_list),
      ],
    )?;

    Ok(batch)
  }
}

fn escape_sql(s: &str) -> String {
  s.replace('\'', "''")
}

fn get_string(batch: &RecordBatch, name: &str, row: usize) -> Result<String> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .map(|a| a.value(row).to_string())
    .ok_or_else(|| StoreError::Backend(format!("column {name} missing")))
}

fn get_string_opt(batch: &RecordBatch, name: &str, row: usize) -> Option<String> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .filter(|a| !a.is_null(row))
    .map(|a| a.value(row).to_string())
    .filter(|s| !s.is_empty())
}

fn get_u32(batch: &RecordBatch, name: &str, row: usize) -> Result<u32> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| StoreError::Backend(format!("column {name} missing")))
}

fn get_bool(batch: &RecordBatch, name: &str, row: usize) -> bool {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
    .map(|a| a.value(row))
    .unwrap_or(false)
}

fn get_vector(batch: &RecordBatch, row: usize, dim: usize) -> Vec<f32> {
  if !get_bool(batch, "has_vector", row) {
    return Vec::new();
  }
  batch
    .column_by_name("vector")
    .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
    .and_then(|arr| {
      if arr.is_null(row) {
        return None;
      }
      let values = arr.value(row);
      let floats = values.as_any().downcast_ref::<Float32Array>()?;
      Some((0..dim).map(|i| floats.value(i)).collect())
    })
    .unwrap_or_default()
}

fn batch_to_existing(batch: &RecordBatch, row: usize, dim: usize) -> Result<ExistingChunk> {
  let id_str = get_string(batch, "id", row)?;
  Ok(ExistingChunk {
    id: Uuid::parse_str(&id_str).map_err(|_| StoreError::Backend("invalid chunk id".to_string()))?,
    text: get_string(batch, "text", row)?,
    start_line: get_u32(batch, "start_line", row)?,
    end_line: get_u32(batch, "end_line", row)?,
    chunk_hash: get_string(batch, "chunk_hash", row)?,
    vector: get_vector(batch, row, dim),
  })
}

fn batch_to_stored(batch: &RecordBatch, row: usize) -> Result<StoredChunk> {
  let id_str = get_string(batch, "id", row)?;
  Ok(StoredChunk {
    id: Uuid::parse_str(&id_str).map_err(|_| StoreError::Backend("invalid chunk id".to_string()))?,
    path: get_string(batch, "path", row)?,
    text: get_string(batch, "text", row)?,
    start_line: get_u32(batch, "start_line", row)?,
    end_line: get_u32(batch, "end_line", row)?,
    content_hash: get_string(batch, "content_hash", row)?,
    chunk_hash: get_string(batch, "chunk_hash", row)?,
    kind: get_string_opt(batch, "kind", row).map(|k| ChunkKind::parse(&k)),
    name: get_string_opt(batch, "name", row),
    language: get_string_opt(batch, "language", row),
    docstring: get_string_opt(batch, "docstring", row),
    header_path: get_string_opt(batch, "header_path", row),
  })
}

#[async_trait]
impl VectorStore for LanceStore {
  #[tracing::instrument(level = "trace", skip(self, records), fields(count = records.len()))]
  async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
    if records.is_empty() {
      return Ok(());
    }

    let table = self.table().await?;

    // Upsert = delete existing ids, then batched insert.
    let id_list = records
      .iter()
      .map(|r| format!("'{}'", r.id))
      .collect::<Vec<_>>()
      .join(", ");
    table.delete(&format!("id IN ({id_list})")).await?;

    let batch = self.records_to_batch(records)?;
    let iter = RecordBatchIterator::new(vec![Ok(batch)], chunks_schema(self.vector_dim));
    table.add(Box::new(iter)).execute().await?;
    Ok(())
  }

  async fn delete_by_path(&self, path: &str) -> Result<()> {
    debug!(path, "Deleting chunks for path");
    let table = self.table().await?;
    table.delete(&format!("path = '{}'", escape_sql(path))).await?;
    Ok(())
  }

  async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<()> {
    if ids.is_empty() {
      return Ok(());
    }
    let table = self.table().await?;
    let id_list = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
    table.delete(&format!("id IN ({id_list})")).await?;
    Ok(())
  }

  async fn update_spans(&self, updates: &[SpanUpdate]) -> Result<()> {
    let table = self.table().await?;
    for update in updates {
      table
        .update()
        .only_if(format!("id = '{}'", update.id))
        .column("path", format!("'{}'", escape_sql(&update.path)))
        .column("start_line", update.start_line.to_string())
        .column("end_line", update.end_line.to_string())
        .column("content_hash", format!("'{}'", update.content_hash))
        .execute()
        .await?;
    }
    Ok(())
  }

  async fn get_by_path(&self, path: &str) -> Result<Vec<ExistingChunk>> {
    let table = self.table().await?;
    let batches: Vec<RecordBatch> = table
      .query()
      .only_if(format!("path = '{}'", escape_sql(path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut chunks = Vec::new();
    for batch in &batches {
      for row in 0..batch.num_rows() {
        chunks.push(batch_to_existing(batch, row, self.vector_dim)?);
      }
    }
    chunks.sort_by_key(|c| c.start_line);
    Ok(chunks)
  }

  async fn indexed_paths(&self) -> Result<Vec<String>> {
    let table = self.table().await?;
    let batches: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut paths = Vec::new();
    for batch in &batches {
      for row in 0..batch.num_rows() {
        paths.push(get_string(batch, "path", row)?);
      }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
  }

  async fn search_by_vector(&self, vector: &[f32], top_k: usize, filter: Option<&str>) -> Result<Vec<(StoredChunk, f32)>> {
    let table = self.table().await?;

    // Partial records carry a zero vector; keep them out of similarity
    // results.
    let base_filter = match filter {
      Some(f) => format!("has_vector AND ({f})"),
      None => "has_vector".to_string(),
    };

    let query = table
      .vector_search(vector.to_vec())?
      .limit(top_k)
      .only_if(base_filter);
    let batches: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut results = Vec::new();
    for batch in &batches {
      for row in 0..batch.num_rows() {
        let chunk = batch_to_stored(batch, row)?;
        let distance = batch
          .column_by_name("_distance")
          .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
          .map(|a| a.value(row))
          .unwrap_or(0.0);
        results.push((chunk, distance));
      }
    }
    Ok(results)
  }

  async fn count_chunks(&self) -> Result<usize> {
    let table = self.table().await?;
    Ok(table.count_rows(None).await?)
  }

  async fn storage_size(&self) -> Result<u64> {
    let mut total = 0u64;
    for entry in walkdir::WalkDir::new(&self.db_path).into_iter().filter_map(|e| e.ok()) {
      if entry.file_type().is_file() {
        total += entry.metadata().map(|m| m.len()).unwrap_or(0);
      }
    }
    Ok(total)
  }

  async fn close(&self) -> Result<()> {
    // The connection closes on drop; nothing held open beyond it.
    Ok(())
  }
}
