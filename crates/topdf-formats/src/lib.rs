//! Source format to PDF conversion through external tools.
//!
//! | Format | Tool | Success |
//! |--------|------|---------|
//! | docx   | pandoc + xelatex | exit 0 |
//! | doc    | soffice -> docx, then as docx | exit 0 |
//! | md     | pandoc + xelatex + table-flattening filter | exit 0 |
//! | txt    | soffice | exit 0 |
//! | html   | sanitizer, then wkhtmltopdf | complete output file |
//! | pdf    | copy | - |

pub mod command;
pub mod normalizer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use topdf_core::error::{ConvertError, NormalizeError, Result, ToolError};
use topdf_core::options::ConversionOptions;
use topdf_core::plugin::{LegacyNormalizer, PdfConverter};
use topdf_core::request::{ConversionRequest, ConversionResult, Mode, SourceFormat};
use topdf_process::ToolInvoker;
use topdf_utils::pdf::{self, PdfCheckError};
use topdf_utils::shell::TemplateArgs;

use crate::command::{CommandSpec, SuccessPolicy};
use crate::normalizer::SofficeNormalizer;

const SUPPORTED: &[SourceFormat] = &[
    SourceFormat::Txt,
    SourceFormat::Md,
    SourceFormat::Html,
    SourceFormat::Doc,
    SourceFormat::Docx,
    SourceFormat::Pdf,
];

/// Converts any supported source format into a PDF.
pub struct FormatConverter {
    commands: HashMap<SourceFormat, CommandSpec>,
    invoker: ToolInvoker,
    normalizer: Box<dyn LegacyNormalizer>,
}

impl FormatConverter {
    pub fn new(options: ConversionOptions) -> Self {
        let invoker = ToolInvoker::new().kill_grace(options.timeouts.kill_grace());
        let normalizer = Box::new(SofficeNormalizer::new(invoker.clone(), &options));
        let commands = SUPPORTED
            .iter()
            .filter_map(|&format| CommandSpec::for_format(format, &options).map(|spec| (format, spec)))
            .collect();
        Self {
            commands,
            invoker,
            normalizer,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn LegacyNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    fn spec(&self, format: SourceFormat) -> Result<&CommandSpec> {
        self.commands
            .get(&format)
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("no converter command for {}", format)))
    }

    fn convert_docx(&self, input: &Path, output: &Path, request: &ConversionRequest) -> Result<ConversionResult> {
        let spec = self.spec(SourceFormat::Docx)?;
        let command = spec.render(&TemplateArgs {
            input: Some(input),
            output: Some(output),
            outdir: Some(&request.work_dir),
        });
        self.run_to_output(spec, &command, output, request)
    }

    fn convert_doc(&self, request: &ConversionRequest, output: &Path) -> Result<ConversionResult> {
        let docx = self
            .normalizer
            .normalize(&request.source_path, &request.work_dir)
            .map_err(|err| match err {
                NormalizeError::Tool(ToolError::Unavailable { program }) => {
                    ConvertError::ToolUnavailable(program)
                }
                other => other.into(),
            })?;
        log::info!(
            "{} produced {}",
            self.normalizer.name(),
            docx.display()
        );
        let mut result = self.convert_docx(&docx, output, request)?;
        result.tool_used = format!("soffice+{}", result.tool_used);
        Ok(result)
    }

    fn convert_markdown(&self, request: &ConversionRequest, output: &Path) -> Result<ConversionResult> {
        let spec = self.spec(SourceFormat::Md)?;
        let command = spec.render(&TemplateArgs {
            input: Some(&request.source_path),
            output: Some(output),
            outdir: Some(&request.work_dir),
        });
        self.run_to_output(spec, &command, output, request)
    }

    /// soffice picks the output name itself (`<stem>.pdf` in `--outdir`), so
    /// it writes into a scratch directory and the file is moved afterwards.
    fn convert_txt(&self, request: &ConversionRequest, output: &Path) -> Result<ConversionResult> {
        let spec = self.spec(SourceFormat::Txt)?;
        let outdir = request.work_dir.join("soffice-out");
        std::fs::create_dir_all(&outdir)?;
        let command = spec.render(&TemplateArgs {
            input: Some(&request.source_path),
            output: Some(output),
            outdir: Some(&outdir),
        });

        let produced = outdir.join(format!("{}.pdf", request.stem()));
        remove_stale(&produced)?;
        remove_stale(output)?;
        let mut guard = OutputGuard::new(output);
        let tolerated = self.invoke(spec, &command, &produced, request)?;
        if !produced.is_file() {
            return Err(ConvertError::OutputMissing(format!(
                "{} did not write {}",
                spec.tool(),
                produced.display()
            )));
        }
        move_file(&produced, output)?;

        let result = self.finish(spec, output, tolerated)?;
        guard.disarm();
        Ok(result)
    }

    fn convert_html(&self, request: &ConversionRequest, output: &Path) -> Result<ConversionResult> {
        let cleaned = request
            .work_dir
            .join(format!("{}.clean.html", request.stem()));
        topdf_html::sanitize(&request.source_path, &cleaned)?;

        let spec = self.spec(SourceFormat::Html)?;
        let command = spec.render(&TemplateArgs {
            input: Some(&cleaned),
            output: Some(output),
            outdir: Some(&request.work_dir),
        });
        self.run_to_output(spec, &command, output, request)
    }

    fn copy_pdf(&self, request: &ConversionRequest, output: &Path) -> Result<ConversionResult> {
        if request.source_path.as_path() != output {
            std::fs::copy(&request.source_path, output)?;
        }
        let mut result = ConversionResult::new(output.to_path_buf(), "copy");
        pdf::inspect(output).map_err(check_error)?;
        result.page_count = pdf::page_count(output);
        Ok(result)
    }

    /// Run a command that writes `output` itself, then validate the file.
    fn run_to_output(
        &self,
        spec: &CommandSpec,
        command: &str,
        output: &Path,
        request: &ConversionRequest,
    ) -> Result<ConversionResult> {
        remove_stale(output)?;
        let mut guard = OutputGuard::new(output);
        let tolerated = self.invoke(spec, command, output, request)?;
        let result = self.finish(spec, output, tolerated)?;
        guard.disarm();
        Ok(result)
    }

    /// Run the tool under its success policy. Returns the tolerated error
    /// message when a soft failure was accepted.
    fn invoke(
        &self,
        spec: &CommandSpec,
        command: &str,
        output: &Path,
        request: &ConversionRequest,
    ) -> Result<Option<String>> {
        let timeout = effective_timeout(spec, request);
        match self.invoker.run(command, timeout) {
            Ok(out) => {
                log::debug!("{} finished in {:?}", spec.tool(), out.elapsed);
                Ok(None)
            }
            Err(err @ ToolError::NonZeroExit { .. })
                if spec.policy == SuccessPolicy::FileExistsOverride && output.is_file() =>
            {
                log::warn!(
                    "{} failed but left {}; accepting it: {}",
                    spec.tool(),
                    output.display(),
                    err
                );
                Ok(Some(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn finish(&self, spec: &CommandSpec, output: &Path, tolerated: Option<String>) -> Result<ConversionResult> {
        let check = if tolerated.is_some() {
            pdf::inspect_complete(output)
        } else {
            pdf::inspect(output)
        };
        let summary = check.map_err(check_error)?;

        let mut result = ConversionResult::new(output.to_path_buf(), spec.tool());
        if let Some(message) = tolerated {
            result
                .warnings
                .push(format!("{} exited non-zero, output kept: {}", spec.tool(), message));
        }
        result.page_count = pdf::page_count(output);
        if result.page_count.is_none() {
            result
                .warnings
                .push(format!("could not count pages of {}", output.display()));
        }
        log::info!(
            "{} wrote {} ({} bytes, {} page(s))",
            spec.tool(),
            output.display(),
            summary.size,
            result
                .page_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        Ok(result)
    }
}

impl PdfConverter for FormatConverter {
    fn name(&self) -> &str {
        "format converter"
    }

    fn supported_formats(&self) -> &[SourceFormat] {
        SUPPORTED
    }

    fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        if !request.source_path.is_file() {
            return Err(ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input {} does not exist", request.source_path.display()),
            )));
        }
        let output = request.default_output_path();
        log::info!(
            "Converting {} ({}) -> {}",
            request.source_path.display(),
            request.source_format,
            output.display()
        );

        match request.source_format {
            SourceFormat::Pdf => self.copy_pdf(request, &output),
            SourceFormat::Docx => self.convert_docx(&request.source_path, &output, request),
            SourceFormat::Doc => self.convert_doc(request, &output),
            SourceFormat::Md => self.convert_markdown(request, &output),
            SourceFormat::Txt => self.convert_txt(request, &output),
            SourceFormat::Html => self.convert_html(request, &output),
        }
    }
}

/// Convert `path` to a PDF inside `work_dir` with default options and the
/// environment applied. Returns the PDF's path.
pub fn convert_to_pdf(
    path: &Path,
    format: SourceFormat,
    work_dir: &Path,
    timeout_override: Option<Duration>,
) -> Result<PathBuf> {
    let mut options = ConversionOptions::default();
    options.apply_env();
    let converter = FormatConverter::new(options);
    let request = ConversionRequest {
        source_path: path.to_path_buf(),
        source_format: format,
        work_dir: work_dir.to_path_buf(),
        mode: Mode::Topdf,
        timeout_override,
    };
    Ok(converter.convert(&request)?.output_path)
}

fn effective_timeout(spec: &CommandSpec, request: &ConversionRequest) -> Duration {
    request.timeout_override.unwrap_or(spec.timeout)
}

fn check_error(err: PdfCheckError) -> ConvertError {
    match err {
        PdfCheckError::Io(e) => ConvertError::Io(e),
        other => ConvertError::OutputMissing(other.to_string()),
    }
}

/// Drop a file left by an earlier run, so that only this run's tool can be
/// the author of the output the success policy looks at.
fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if from == to {
        return Ok(());
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

/// Deletes a partially written output unless disarmed.
struct OutputGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> OutputGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            log::debug!("removing partial output {}", self.path.display());
            let _ = std::fs::remove_file(self.path);
        }
    }
}
