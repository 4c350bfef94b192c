//! Request orchestrator: decides whether a document must be converted to PDF
//! before it is handed to the downstream parser.
//!
//! The request moves through an explicit set of stages. Each stage owns an
//! immutable snapshot of the request; a transition builds a new snapshot
//! instead of rewriting the old one.
//!
//!   Received -> TopdfOnly                      (mode = topdf)
//!   Received -> Direct                         (format = pdf, or mode = text)
//!   Received -> NeedsConversionForPartition -> Direct
//!
//! The conversion performed for `partition` is a single `topdf` sub-request;
//! its result is never routed back through the orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use log::info;

use crate::error::{ConvertError, Result};
use crate::plugin::PdfConverter;
use crate::request::{ConversionRequest, ConversionResult, Mode, SourceFormat};
use crate::workdir::WorkDir;

/// Immutable view of a request at one point in the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub mode: Mode,
}

#[derive(Debug)]
enum Stage {
    Received(RequestSnapshot),
    Direct {
        snapshot: RequestSnapshot,
        conversion: Option<ConversionResult>,
    },
    NeedsConversionForPartition(RequestSnapshot),
    TopdfOnly(RequestSnapshot),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Received(_) => "received",
            Stage::Direct { .. } => "direct",
            Stage::NeedsConversionForPartition(_) => "needs-conversion-for-partition",
            Stage::TopdfOnly(_) => "topdf-only",
        }
    }
}

/// What the orchestrator hands back to the service layer.
#[derive(Debug)]
pub enum Outcome {
    /// A file ready for the downstream parser. When a conversion was needed
    /// to get there, its result is attached.
    Handoff {
        snapshot: RequestSnapshot,
        conversion: Option<ConversionResult>,
    },
    /// `topdf` mode: the PDF itself is the response payload.
    Pdf {
        bytes: Vec<u8>,
        conversion: ConversionResult,
    },
}

impl Outcome {
    /// Base64 encoding of the PDF payload, if this is a `topdf` outcome.
    pub fn base64_payload(&self) -> Option<String> {
        match self {
            Outcome::Pdf { bytes, .. } => {
                Some(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Outcome::Handoff { .. } => None,
        }
    }

    pub fn conversion(&self) -> Option<&ConversionResult> {
        match self {
            Outcome::Handoff { conversion, .. } => conversion.as_ref(),
            Outcome::Pdf { conversion, .. } => Some(conversion),
        }
    }
}

/// The conversion orchestrator.
pub struct Pipeline {
    converter: Box<dyn PdfConverter>,
    local_mode: bool,
    timeout_override: Option<Duration>,
}

impl Pipeline {
    pub fn new(converter: Box<dyn PdfConverter>) -> Self {
        Self {
            converter,
            local_mode: false,
            timeout_override: None,
        }
    }

    /// Force every request into `text` mode (no remote model access).
    pub fn local_mode(mut self, enabled: bool) -> Self {
        self.local_mode = enabled;
        self
    }

    pub fn timeout_override(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_override = timeout;
        self
    }

    /// Run one request to completion.
    ///
    /// `path` must live inside `work_dir`; any file the pipeline produces is
    /// written there and disappears with it.
    pub fn run(&self, path: &Path, mode: Mode, work_dir: &WorkDir) -> Result<Outcome> {
        if !path.is_file() {
            return Err(ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input {} does not exist", path.display()),
            )));
        }

        let mut stage = Stage::Received(RequestSnapshot {
            path: path.to_path_buf(),
            format: SourceFormat::from_path(path)?,
            mode,
        });

        loop {
            info!("[{}] stage: {}", work_dir.id(), stage.name());
            stage = match stage {
                Stage::Received(snapshot) => self.route(snapshot),
                Stage::Direct {
                    snapshot,
                    conversion,
                } => {
                    return Ok(Outcome::Handoff {
                        snapshot,
                        conversion,
                    })
                }
                Stage::NeedsConversionForPartition(snapshot) => {
                    let conversion = self.convert(&snapshot, work_dir)?;
                    let pdf_path = work_dir.path().join(format!("{}.pdf", stem(&snapshot.path)));
                    if conversion.output_path != pdf_path {
                        std::fs::copy(&conversion.output_path, &pdf_path)?;
                    }
                    Stage::Direct {
                        snapshot: RequestSnapshot {
                            path: pdf_path,
                            format: SourceFormat::Pdf,
                            mode: Mode::Partition,
                        },
                        conversion: Some(conversion),
                    }
                }
                Stage::TopdfOnly(snapshot) => {
                    let conversion = self.convert(&snapshot, work_dir)?;
                    let bytes = std::fs::read(&conversion.output_path)?;
                    return Ok(Outcome::Pdf { bytes, conversion });
                }
            };
        }
    }

    fn route(&self, snapshot: RequestSnapshot) -> Stage {
        let snapshot = if self.local_mode && snapshot.mode != Mode::Text {
            info!("local mode: forcing '{}' to text", snapshot.mode);
            RequestSnapshot {
                mode: Mode::Text,
                ..snapshot
            }
        } else {
            snapshot
        };

        match (snapshot.mode, snapshot.format) {
            (Mode::Topdf, _) => Stage::TopdfOnly(snapshot),
            (_, SourceFormat::Pdf) | (Mode::Text, _) => Stage::Direct {
                snapshot,
                conversion: None,
            },
            (Mode::Partition, _) => Stage::NeedsConversionForPartition(snapshot),
        }
    }

    /// Issue the single `topdf` sub-request for `snapshot`.
    fn convert(&self, snapshot: &RequestSnapshot, work_dir: &WorkDir) -> Result<ConversionResult> {
        if !self.converter.supported_formats().contains(&snapshot.format) {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} cannot convert {}",
                self.converter.name(),
                snapshot.format
            )));
        }
        let request = ConversionRequest {
            source_path: snapshot.path.clone(),
            source_format: snapshot.format,
            work_dir: work_dir.path().to_path_buf(),
            mode: Mode::Topdf,
            timeout_override: self.timeout_override,
        };
        info!(
            "[{}] {} converting {} ({})",
            work_dir.id(),
            self.converter.name(),
            snapshot.path.display(),
            snapshot.format
        );
        self.converter.convert(&request)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}
