//! Traits at the seams between the orchestrator, converters and collaborators.

use std::path::{Path, PathBuf};

use crate::error::{NormalizeError, Result};
use crate::request::{ConversionRequest, ConversionResult, SourceFormat};

/// Converts a source document into a PDF inside the request's working directory.
pub trait PdfConverter: Send + Sync {
    /// Human-readable name of this converter.
    fn name(&self) -> &str;

    /// Source formats this converter handles.
    fn supported_formats(&self) -> &[SourceFormat];

    /// Run one conversion attempt. The returned output path always exists
    /// and is non-empty; on error no output path is left behind.
    fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult>;
}

/// Rewrites a legacy office document (`.doc`) as an equivalent `.docx`.
pub trait LegacyNormalizer: Send + Sync {
    fn name(&self) -> &str;

    /// Write `<stem>.docx` into `out_dir` and return its path.
    fn normalize(&self, doc_path: &Path, out_dir: &Path) -> std::result::Result<PathBuf, NormalizeError>;
}
