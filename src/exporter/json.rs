// file: src/exporter/json.rs
// description: json export of indexed chunks and an export manifest

use crate::error::{RagError, Result};
use crate::index::VectorStore;
use crate::models::Chunk;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CHUNKS_FILE: &str = "chunks.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

/// Chunk record as written to disk; vectors are left out.
#[derive(Debug, Serialize)]
pub struct ExportedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub char_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_chunks: usize,
    pub total_documents: usize,
    pub store: String,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| RagError::FileOperation {
            path: output_dir.clone(),
            source: e,
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn export_chunks(&self, store: &VectorStore, pretty: bool) -> Result<ExportManifest> {
        info!("Starting JSON export to {:?}", self.output_dir);

        let chunks = store.chunks().await?;
        let mut document_hashes: Vec<&str> =
            chunks.iter().map(|c| c.document_hash.as_str()).collect();
        document_hashes.sort_unstable();
        document_hashes.dedup();
        let total_documents = document_hashes.len();

        let records: Vec<ExportedChunk> = chunks
            .into_iter()
            .map(|chunk| ExportedChunk {
                char_count: chunk.text.chars().count(),
                chunk,
            })
            .collect();

        self.write_json(CHUNKS_FILE, &records, pretty)?;

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_chunks: records.len(),
            total_documents,
            store: store.describe(),
            files: vec![CHUNKS_FILE.to_string()],
        };
        self.write_json(MANIFEST_FILE, &manifest, true)?;

        info!(
            "Export complete: {} chunks from {} documents",
            manifest.total_chunks, manifest.total_documents
        );
        Ok(manifest)
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
        pretty: bool,
    ) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let body = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        fs::write(&path, body)
            .map_err(|e| RagError::Export(format!("Failed to write {}: {}", path.display(), e)))
    }
}
