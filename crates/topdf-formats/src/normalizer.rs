//! Legacy `.doc` to `.docx` rewrite through LibreOffice.

use std::path::{Path, PathBuf};
use std::time::Duration;

use topdf_core::error::NormalizeError;
use topdf_core::options::ConversionOptions;
use topdf_core::plugin::LegacyNormalizer;
use topdf_process::ToolInvoker;
use topdf_utils::shell::TemplateArgs;

use crate::command::{doc_normalize_command, render_command};

pub struct SofficeNormalizer {
    invoker: ToolInvoker,
    template: String,
    timeout: Duration,
}

impl SofficeNormalizer {
    pub fn new(invoker: ToolInvoker, options: &ConversionOptions) -> Self {
        Self {
            invoker,
            template: options
                .commands
                .doc_normalize
                .clone()
                .unwrap_or_else(doc_normalize_command),
            timeout: options.timeouts.normalize(),
        }
    }
}

impl LegacyNormalizer for SofficeNormalizer {
    fn name(&self) -> &str {
        "soffice doc->docx"
    }

    fn normalize(&self, doc_path: &Path, out_dir: &Path) -> Result<PathBuf, NormalizeError> {
        let stem = doc_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let expected = out_dir.join(format!("{}.docx", stem));

        let command = render_command(
            &self.template,
            &TemplateArgs {
                input: Some(doc_path),
                output: Some(&expected),
                outdir: Some(out_dir),
            },
        );
        log::info!("Normalizing legacy document {}", doc_path.display());
        self.invoker.run(&command, self.timeout)?;

        if !expected.is_file() {
            return Err(NormalizeError::NoOutput(expected));
        }
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(command: &str) -> SofficeNormalizer {
        let mut options = ConversionOptions::default();
        options.commands.doc_normalize = Some(command.to_string());
        SofficeNormalizer::new(ToolInvoker::new(), &options)
    }

    #[test]
    fn test_normalize_writes_docx() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("memo.doc");
        std::fs::write(&doc, b"legacy").unwrap();

        let docx = normalizer("cp {input} {outdir}/memo.docx")
            .normalize(&doc, dir.path())
            .unwrap();
        assert_eq!(docx, dir.path().join("memo.docx"));
        assert!(docx.is_file());
    }

    #[test]
    fn test_normalize_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("memo.doc");
        std::fs::write(&doc, b"legacy").unwrap();

        let err = normalizer("true").normalize(&doc, dir.path()).unwrap_err();
        assert!(matches!(err, NormalizeError::NoOutput(_)));
    }

    #[test]
    fn test_normalize_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("memo.doc");
        std::fs::write(&doc, b"legacy").unwrap();

        let err = normalizer("exit 1").normalize(&doc, dir.path()).unwrap_err();
        assert!(matches!(err, NormalizeError::Tool(_)));
    }
}
