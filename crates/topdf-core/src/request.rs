//! Request and result types passed between the orchestrator and converters.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Source formats the pipeline knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Txt,
    Md,
    Html,
    Doc,
    Docx,
    Pdf,
}

impl SourceFormat {
    /// Parse from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Md),
            "html" | "htm" => Some(Self::Html),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Derive the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| {
            ConvertError::UnsupportedFormat(format!(
                "cannot derive format of {} from extension '{}'",
                path.display(),
                ext
            ))
        })
    }

    /// Get the canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Html => "html",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Processing mode declared by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Structured partitioning; the downstream parser needs a PDF.
    Partition,
    /// Return the produced PDF itself.
    Topdf,
    /// Minimal text extraction, no PDF required.
    Text,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Partition => "partition",
            Mode::Topdf => "topdf",
            Mode::Text => "text",
        }
    }
}

impl FromStr for Mode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "partition" => Ok(Mode::Partition),
            "topdf" => Ok(Mode::Topdf),
            "text" => Ok(Mode::Text),
            other => Err(ConvertError::UnsupportedMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversion job handed to a [`crate::plugin::PdfConverter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub source_format: SourceFormat,
    pub work_dir: PathBuf,
    pub mode: Mode,
    /// Replaces the per-tool timeouts from configuration when set.
    pub timeout_override: Option<Duration>,
}

impl ConversionRequest {
    /// Build a request, deriving the format from the file extension.
    pub fn new(source_path: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, mode: Mode) -> Result<Self> {
        let source_path = source_path.into();
        let source_format = SourceFormat::from_path(&source_path)?;
        Ok(Self {
            source_path,
            source_format,
            work_dir: work_dir.into(),
            mode,
            timeout_override: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// File stem used to name intermediate and output files.
    pub fn stem(&self) -> String {
        self.source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string()
    }

    /// Default output location: `<work_dir>/<stem>.pdf`.
    pub fn default_output_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.pdf", self.stem()))
    }
}

/// A successfully produced PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub output_path: PathBuf,
    pub output_format: SourceFormat,
    pub tool_used: String,
    pub warnings: Vec<String>,
    pub page_count: Option<usize>,
}

impl ConversionResult {
    pub fn new(output_path: PathBuf, tool_used: impl Into<String>) -> Self {
        Self {
            output_path,
            output_format: SourceFormat::Pdf,
            tool_used: tool_used.into(),
            warnings: Vec::new(),
            page_count: None,
        }
    }
}
