// file: src/index/schema.rs
// description: arrow schema and record batch conversion for the LanceDB chunk table
// reference: https://docs.rs/arrow

use crate::error::{RagError, Result};
use crate::models::Chunk;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub fn chunk_schema(embedding_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document_hash", DataType::Utf8, false),
        Field::new("source_url", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("word_count", DataType::UInt64, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                embedding_dim as i32,
            ),
            false,
        ),
    ]))
}

pub fn build_record_batch(
    schema: Arc<Schema>,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    embedding_dim: usize,
) -> Result<RecordBatch> {
    if chunks.len() != embeddings.len() {
        return Err(RagError::Index(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }

    if let Some((row, bad)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != embedding_dim)
    {
        return Err(RagError::Index(format!(
            "Embedding {} has dimension {}, table expects {}",
            row,
            bad.len(),
            embedding_dim
        )));
    }

    let ids: StringArray = chunks.iter().map(|c| Some(c.id.as_str())).collect();
    let hashes: StringArray = chunks
        .iter()
        .map(|c| Some(c.document_hash.as_str()))
        .collect();
    let urls: StringArray = chunks.iter().map(|c| Some(c.source_url.as_str())).collect();
    let indexes: UInt64Array = chunks.iter().map(|c| Some(c.index as u64)).collect();
    let texts: StringArray = chunks.iter().map(|c| Some(c.text.as_str())).collect();
    let word_counts: UInt64Array = chunks.iter().map(|c| Some(c.word_count as u64)).collect();

    let values: Float32Array = embeddings
        .iter()
        .flat_map(|e| e.iter().copied())
        .collect();
    let embedding_list = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        embedding_dim as i32,
        Arc::new(values),
        None,
    )
    .map_err(|e| RagError::Index(format!("Failed to create embedding array: {}", e)))?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(hashes),
            Arc::new(urls),
            Arc::new(indexes),
            Arc::new(texts),
            Arc::new(word_counts),
            Arc::new(embedding_list),
        ],
    )
    .map_err(|e| RagError::Index(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Index(format!("Missing '{}' column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Index(format!("Invalid '{}' column type", name)))
}

fn u64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Index(format!("Missing '{}' column", name)))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| RagError::Index(format!("Invalid '{}' column type", name)))
}

/// Rows of a result batch as chunks, paired with `_distance` when the batch
/// came from a vector search.
pub fn chunks_from_batch(batch: &RecordBatch) -> Result<Vec<(Chunk, Option<f32>)>> {
    let ids = string_column(batch, "id")?;
    let hashes = string_column(batch, "document_hash")?;
    let urls = string_column(batch, "source_url")?;
    let indexes = u64_column(batch, "chunk_index")?;
    let texts = string_column(batch, "text")?;
    let word_counts = u64_column(batch, "word_count")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let chunk = Chunk {
            id: ids.value(i).to_string(),
            document_hash: hashes.value(i).to_string(),
            source_url: urls.value(i).to_string(),
            index: indexes.value(i) as usize,
            text: texts.value(i).to_string(),
            word_count: word_counts.value(i) as usize,
        };
        let distance = distances.filter(|d| !d.is_null(i)).map(|d| d.value(i));
        rows.push((chunk, distance));
    }

    Ok(rows)
}
