// file: src/index/lance.rs
// description: persistent chunk index backed by a LanceDB table
// reference: https://docs.rs/lancedb

use crate::error::{RagError, Result};
use crate::index::schema::{build_record_batch, chunk_schema, chunks_from_batch};
use crate::models::{Chunk, SearchResult};
use arrow_array::RecordBatchIterator;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table, connect};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LanceDbIndex {
    connection: Connection,
    uri: String,
    table_name: String,
    dimension: usize,
}

impl LanceDbIndex {
    pub async fn connect(uri: &str, table_name: &str, dimension: usize) -> Result<Self> {
        info!("Connecting to LanceDB at {}", uri);

        let connection = connect(uri)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            uri: uri.to_string(),
            table_name: table_name.to_string(),
            dimension,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == &self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| {
                RagError::Index(format!("Failed to open table {}: {}", self.table_name, e))
            })
    }

    pub async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let schema = chunk_schema(self.dimension);
        let batch = build_record_batch(schema.clone(), chunks, embeddings, self.dimension)?;
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if !self.table_exists().await? {
            self.connection
                .create_table(&self.table_name, reader)
                .execute()
                .await
                .map_err(|e| RagError::Index(format!("Failed to create table: {}", e)))?;
            info!("Created table: {}", self.table_name);
        } else {
            let table = self.open_table().await?;
            table
                .add(reader)
                .execute()
                .await
                .map_err(|e| RagError::Index(format!("Failed to insert chunks: {}", e)))?;
        }

        debug!("Inserted {} chunks into {}", chunks.len(), self.table_name);
        Ok(chunks.len())
    }

    pub async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Index(format!("Failed to count rows: {}", e)))
    }

    pub async fn contains_document(&self, document_hash: &str) -> Result<bool> {
        if !self.table_exists().await? {
            return Ok(false);
        }

        let table = self.open_table().await?;
        let matching = table
            .count_rows(Some(format!("document_hash = '{}'", document_hash)))
            .await
            .map_err(|e| RagError::Index(format!("Failed to count rows: {}", e)))?;

        Ok(matching > 0)
    }

    pub async fn remove_document(&self, document_hash: &str) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }

        let table = self.open_table().await?;
        let predicate = format!("document_hash = '{}'", document_hash);
        info!("Deleting chunks with predicate: {}", predicate);

        table.delete(&predicate).await.map_err(|e| {
            RagError::Index(format!(
                "Failed to delete chunks of document {}: {}",
                document_hash, e
            ))
        })?;
        Ok(())
    }

    /// Distance is converted to a similarity with `1 / (1 + distance)`.
    pub async fn search(&self, query_embedding: Vec<f32>, limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await? {
            warn!("Table does not exist, returning empty results");
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;

        let mut stream = table
            .vector_search(query_embedding)
            .map_err(|e| RagError::Index(format!("Failed to create vector search: {}", e)))?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Vector search failed: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch
                .map_err(|e| RagError::Index(format!("Failed to read result batch: {}", e)))?;

            for (chunk, distance) in chunks_from_batch(&batch)? {
                let score = distance.map(|d| 1.0 / (1.0 + d)).unwrap_or(1.0);
                results.push(SearchResult::new(chunk, score, distance));
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!("Vector search returned {} results", results.len());
        Ok(results)
    }

    pub async fn chunks(&self) -> Result<Vec<Chunk>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let mut stream = table
            .query()
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Table scan failed: {}", e)))?;

        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch
                .map_err(|e| RagError::Index(format!("Failed to read result batch: {}", e)))?;
            chunks.extend(chunks_from_batch(&batch)?.into_iter().map(|(chunk, _)| chunk));
        }

        chunks.sort_by(|a, b| {
            a.document_hash
                .cmp(&b.document_hash)
                .then(a.index.cmp(&b.index))
        });
        Ok(chunks)
    }

    pub async fn clear(&self) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }

        warn!("Dropping table {}", self.table_name);
        self.connection
            .drop_table(&self.table_name)
            .await
            .map_err(|e| {
                RagError::Index(format!("Failed to drop table {}: {}", self.table_name, e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk::new("doc-hash", "https://example.com/a.pdf", index, text.to_string())
    }

    #[tokio::test]
    async fn test_round_trip_through_lancedb() {
        let dir = TempDir::new().unwrap();
        let uri = dir.path().join("lancedb");
        let index = LanceDbIndex::connect(uri.to_str().unwrap(), "chunks", 2)
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 0);
        assert!(!index.contains_document("doc-hash").await.unwrap());
        assert!(index.search(vec![1.0, 0.0], 1).await.unwrap().is_empty());

        index
            .add(
                &[chunk(0, "x axis"), chunk(1, "y axis")],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();
        index
            .add(&[chunk(2, "diagonal")], &[vec![0.7, 0.7]])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 3);
        assert!(index.contains_document("doc-hash").await.unwrap());

        let results = index.search(vec![0.0, 1.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "y axis");
        assert!(results[0].distance.is_some());

        let ranked = index.search(vec![1.0, 0.0], 3).await.unwrap();
        assert_eq!(ranked[0].chunk.text, "x axis");
        assert!(ranked[0].distance.unwrap().abs() < 1e-6);
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
        for result in &ranked {
            let distance = result.distance.unwrap();
            assert!((result.score - 1.0 / (1.0 + distance)).abs() < 1e-6);
        }
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

        let chunks = index.chunks().await.unwrap();
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        index.remove_document("doc-hash").await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);

        index.add(&[chunk(0, "again")], &[vec![1.0, 0.0]]).await.unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
