//! Sanity checks for PDF files produced by external tools.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";
const EOF_MARKER: &[u8] = b"%%EOF";

/// How far from the end of the file the `%%EOF` marker may sit.
const TRAILER_WINDOW: u64 = 2048;

#[derive(Error, Debug)]
pub enum PdfCheckError {
    #[error("{0} does not exist")]
    Missing(String),

    #[error("{0} is empty")]
    Empty(String),

    #[error("{0} does not start with a PDF header")]
    NotPdf(String),

    #[error("{0} has no %%EOF trailer (truncated render?)")]
    Truncated(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Basic facts about a PDF on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSummary {
    pub size: u64,
    pub has_trailer: bool,
}

/// Check that `path` holds a non-empty file beginning with `%PDF-`.
pub fn inspect(path: &Path) -> Result<PdfSummary, PdfCheckError> {
    let shown = path.display().to_string();
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PdfCheckError::Missing(shown))
        }
        Err(e) => return Err(e.into()),
    };

    let size = file.metadata()?.len();
    if size == 0 {
        return Err(PdfCheckError::Empty(shown));
    }

    let mut head = [0u8; 5];
    let n = file.read(&mut head)?;
    if &head[..n] != PDF_MAGIC {
        return Err(PdfCheckError::NotPdf(shown));
    }

    let window = size.min(TRAILER_WINDOW);
    file.seek(SeekFrom::Start(size - window))?;
    let mut tail = Vec::with_capacity(window as usize);
    file.read_to_end(&mut tail)?;
    let has_trailer = tail.windows(EOF_MARKER.len()).any(|w| w == EOF_MARKER);

    Ok(PdfSummary { size, has_trailer })
}

/// Like [`inspect`], but also require the `%%EOF` trailer.
pub fn inspect_complete(path: &Path) -> Result<PdfSummary, PdfCheckError> {
    let summary = inspect(path)?;
    if !summary.has_trailer {
        return Err(PdfCheckError::Truncated(path.display().to_string()));
    }
    Ok(summary)
}

/// Count pages with lopdf. Returns `None` when the document cannot be parsed.
pub fn page_count(path: &Path) -> Option<usize> {
    match lopdf::Document::load(path) {
        Ok(doc) => Some(doc.get_pages().len()),
        Err(e) => {
            log::debug!("lopdf could not read {}: {}", path.display(), e);
            None
        }
    }
}
