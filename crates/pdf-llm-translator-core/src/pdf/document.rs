use std::path::Path;
use std::sync::Arc;

use mupdf::{Document as MuDocument, MetadataName};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Thread-safe wrapper around a PDF document.
///
/// Cloning shares the underlying bytes.
pub struct PdfDocument {
    /// The raw PDF bytes, kept for re-opening and reconstruction
    bytes: Arc<Vec<u8>>,
    metadata: DocumentMetadata,
    page_count: usize,
    /// Content-based id (MD5 hex), computed once on load
    source_id: String,
}

/// Document metadata carried into the translated output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
}

/// Page dimensions in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        // mupdf returns an empty string for absent entries
        let get_meta = |name| -> Option<String> {
            doc.metadata(name).ok().filter(|s| !s.trim().is_empty())
        };

        let metadata = DocumentMetadata {
            title: get_meta(MetadataName::Title),
            author: get_meta(MetadataName::Author),
            subject: get_meta(MetadataName::Subject),
            creator: get_meta(MetadataName::Creator),
            producer: get_meta(MetadataName::Producer),
        };

        let source_id = format!("{:x}", md5::compute(&bytes));

        Ok(Self {
            bytes: Arc::new(bytes),
            metadata,
            page_count: usize::try_from(page_count).unwrap_or(0),
            source_id,
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Raw PDF bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MD5 of the PDF bytes; stable across runs, used for cache keys
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Bounds-checked mupdf page index for a 0-based page number
    pub fn page_index(&self, page_num: usize) -> Result<i32> {
        page_index(page_num, self.page_count)
    }

    /// Open the document for an operation (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }

    /// Load a page through a fresh handle; the handle is returned to keep it alive
    pub(crate) fn load_page(&self, page_num: usize) -> Result<(MuDocument, mupdf::Page)> {
        let index = self.page_index(page_num)?;
        let doc = self.open_document()?;
        let page = doc.load_page(index).map_err(|e| Error::PdfTextExtraction {
            page: page_num,
            reason: format!("Failed to load page: {e}"),
        })?;
        Ok((doc, page))
    }

    /// Page dimensions in points
    pub fn page_size(&self, page_num: usize) -> Result<PageSize> {
        let (_doc, page) = self.load_page(page_num)?;
        let bounds = page.bounds().map_err(|e| Error::PdfRender {
            page: page_num,
            reason: format!("Failed to get bounds: {e}"),
        })?;

        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }
}

/// Validate a 0-based page number against `total` and convert it for mupdf
pub fn page_index(page_num: usize, total: usize) -> Result<i32> {
    if page_num >= total {
        return Err(Error::PdfInvalidPage {
            page: page_num,
            total,
        });
    }
    i32::try_from(page_num).map_err(|_| Error::PdfInvalidPage {
        page: page_num,
        total,
    })
}

impl Clone for PdfDocument {
    /// O(1): only the `Arc` around the bytes is cloned.
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            metadata: self.metadata.clone(),
            page_count: self.page_count,
            source_id: self.source_id.clone(),
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("source_id", &self.source_id)
            .field("bytes_len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
