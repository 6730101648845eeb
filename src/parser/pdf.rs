// file: src/parser/pdf.rs
// description: pdf page text extraction with pdf-extract and a lopdf fallback
// reference: https://docs.rs/pdf-extract, https://docs.rs/lopdf

use crate::error::{RagError, Result};
use lopdf::{Document, Object};
use tracing::{debug, info, warn};

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Runs extraction on the blocking pool; pdf parsing is CPU bound.
    pub async fn extract_pages_blocking(&self, bytes: Vec<u8>) -> Result<Vec<String>> {
        tokio::task::spawn_blocking(move || PdfExtractor::new().extract_pages(&bytes))
            .await
            .map_err(|e| RagError::Pdf(format!("Extraction task failed: {}", e)))?
    }

    /// One string per page. pdf-extract handles font encodings better, lopdf
    /// tolerates more malformed files, so the latter is only tried when the
    /// former errors, panics or yields no text.
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let primary = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }));

        let reason = match primary {
            Ok(Ok(pages)) if pages.iter().any(|p| !p.trim().is_empty()) => {
                info!("Extracted {} pages with pdf-extract", pages.len());
                return Ok(pages);
            }
            Ok(Ok(_)) => "no text found".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => {
                if let Some(s) = payload.downcast_ref::<&str>() {
                    format!("panic: {}", s)
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    format!("panic: {}", s)
                } else {
                    "panic: unknown".to_string()
                }
            }
        };

        warn!("pdf-extract failed ({}), trying lopdf fallback", reason);

        let pages = self.extract_with_lopdf(bytes).map_err(|e| {
            RagError::Pdf(format!(
                "pdf-extract failed ({}) and lopdf fallback failed ({})",
                reason, e
            ))
        })?;

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(RagError::Pdf(
                "Document contains no extractable text".to_string(),
            ));
        }

        info!("Extracted {} pages with lopdf", pages.len());
        Ok(pages)
    }

    /// Walks page content streams for text-showing operators.
    pub fn extract_with_lopdf(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| RagError::Pdf(format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();

        for (page_num, page_id) in doc.get_pages() {
            let mut text = String::new();

            let content = match doc.get_page_content(page_id) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping page {}: {}", page_num, e);
                    pages.push(text);
                    continue;
                }
            };

            let operations = lopdf::content::Content::decode(&content)
                .map(|c| c.operations)
                .unwrap_or_default();

            for op in operations {
                match op.operator.as_str() {
                    "Tj" | "'" | "\"" => {
                        if let Some(Object::String(bytes, _)) = op.operands.last() {
                            text.push_str(&decode_pdf_string(bytes));
                        }
                    }
                    "TJ" => {
                        if let Some(Object::Array(items)) = op.operands.first() {
                            for item in items {
                                if let Object::String(bytes, _) = item {
                                    text.push_str(&decode_pdf_string(bytes));
                                }
                            }
                        }
                    }
                    "Td" | "TD" | "T*" => {
                        if !text.is_empty() && !text.ends_with([' ', '\n']) {
                            text.push(' ');
                        }
                    }
                    "ET" => {
                        if !text.is_empty() && !text.ends_with('\n') {
                            text.push('\n');
                        }
                    }
                    _ => {}
                }
            }

            pages.push(text);
        }

        Ok(pages)
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// UTF-8 first, Latin-1 otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Minimal PDF with one Courier text line per entry on each page.
    pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
            ];
            for line in lines.iter() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}
