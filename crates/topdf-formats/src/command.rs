//! Command templates for the external converters.

use std::path::Path;
use std::time::Duration;

use topdf_core::options::ConversionOptions;
use topdf_core::request::SourceFormat;
use topdf_utils::shell::{self, TemplateArgs};

/// Placeholder for the LibreOffice user profile URL. soffice refuses to run
/// two instances on one profile, so every call gets a private one.
pub const PROFILE_PLACEHOLDER: &str = "{profile}";

/// How a tool's exit status decides success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// Any non-zero exit is a failure.
    ExitCodeZero,
    /// A non-zero exit is tolerated when a complete output file exists.
    FileExistsOverride,
}

/// A converter command for one source format.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub template: String,
    pub timeout: Duration,
    pub policy: SuccessPolicy,
}

impl CommandSpec {
    /// The command for `format`, or `None` for formats that need no tool.
    pub fn for_format(format: SourceFormat, options: &ConversionOptions) -> Option<Self> {
        let overrides = &options.commands;
        let timeouts = &options.timeouts;
        let spec = match format {
            SourceFormat::Docx | SourceFormat::Doc => CommandSpec {
                template: overrides
                    .docx
                    .clone()
                    .unwrap_or_else(|| docx_command(options)),
                timeout: timeouts.pandoc(),
                policy: SuccessPolicy::ExitCodeZero,
            },
            SourceFormat::Md => CommandSpec {
                template: overrides
                    .markdown
                    .clone()
                    .unwrap_or_else(|| markdown_command(options)),
                timeout: timeouts.pandoc(),
                policy: SuccessPolicy::ExitCodeZero,
            },
            SourceFormat::Txt => CommandSpec {
                template: overrides.txt.clone().unwrap_or_else(txt_command),
                timeout: timeouts.soffice(),
                policy: SuccessPolicy::ExitCodeZero,
            },
            SourceFormat::Html => CommandSpec {
                template: overrides
                    .html
                    .clone()
                    .unwrap_or_else(|| html_command(options.html_load_images)),
                timeout: timeouts.wkhtmltopdf(),
                policy: SuccessPolicy::FileExistsOverride,
            },
            SourceFormat::Pdf => return None,
        };
        Some(spec)
    }

    /// The program this command runs, for reporting.
    pub fn tool(&self) -> &str {
        shell::program_name(&self.template).unwrap_or("unknown")
    }

    pub fn render(&self, args: &TemplateArgs<'_>) -> String {
        render_command(&self.template, args)
    }
}

/// Render a template, filling `{profile}` from `{outdir}`.
pub fn render_command(template: &str, args: &TemplateArgs<'_>) -> String {
    let template = match args.outdir {
        Some(outdir) if template.contains(PROFILE_PLACEHOLDER) => {
            template.replace(PROFILE_PLACEHOLDER, &shell::quote(&profile_url(outdir)))
        }
        _ => template.to_string(),
    };
    shell::render(&template, args)
}

/// `file://` URL of a scratch LibreOffice profile under `outdir`.
pub fn profile_url(outdir: &Path) -> String {
    let profile = outdir.join(".soffice-profile");
    match url::Url::from_directory_path(&profile) {
        Ok(url) => url.to_string(),
        // Relative paths cannot be URLs; soffice resolves them itself.
        Err(()) => format!("file://{}", profile.display()),
    }
}

fn docx_command(options: &ConversionOptions) -> String {
    let mut parts = vec![
        "pandoc -o {output}".to_string(),
        format!("--pdf-engine={}", shell::quote(&options.pdf_engine)),
        "{input}".to_string(),
    ];
    parts.extend(options.docx_fonts.pandoc_variables());
    parts.join(" ")
}

fn markdown_command(options: &ConversionOptions) -> String {
    let mut parts = vec![
        "pandoc -o {output}".to_string(),
        format!("--pdf-engine={}", shell::quote(&options.pdf_engine)),
    ];
    if let Some(filter) = &options.markdown_lua_filter {
        parts.push(format!("--lua-filter={}", shell::quote(&filter.to_string_lossy())));
    }
    if let Some(template) = &options.markdown_template {
        parts.push(format!("--template {}", shell::quote(&template.to_string_lossy())));
    }
    parts.push("{input}".to_string());
    parts.extend(options.markdown_fonts.pandoc_variables());
    parts.join(" ")
}

fn txt_command() -> String {
    shell::normalize(
        r#"soffice --headless -env:SingleAppInstance="false"
           -env:UserInstallation={profile}
           --convert-to pdf --outdir {outdir} {input}"#,
    )
}

fn html_command(load_images: bool) -> String {
    let images = if load_images { "" } else { " --no-images" };
    format!(
        "wkhtmltopdf --disable-javascript --disable-local-file-access \
         --disable-external-links{} {{input}} {{output}}",
        images
    )
}

/// Default legacy-office normalizer command.
pub fn doc_normalize_command() -> String {
    shell::normalize(
        r#"soffice --headless -env:SingleAppInstance="false"
           -env:UserInstallation={profile}
           --convert-to docx --outdir {outdir} {input}"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_docx_command() {
        let spec = CommandSpec::for_format(SourceFormat::Docx, &ConversionOptions::default()).unwrap();
        assert_eq!(spec.policy, SuccessPolicy::ExitCodeZero);
        assert_eq!(spec.timeout, Duration::from_secs(60));
        assert_eq!(spec.tool(), "pandoc");
        assert!(spec.template.starts_with("pandoc -o {output} --pdf-engine=xelatex {input}"));
        assert!(spec.template.contains("-V monofont=\"Cascadia Mono\""));
        assert!(!spec.template.contains("lua-filter"));
    }

    #[test]
    fn test_markdown_command() {
        let spec = CommandSpec::for_format(SourceFormat::Md, &ConversionOptions::default()).unwrap();
        assert!(spec.template.contains("--lua-filter=/opt/pandoc/unnested-table.lua"));
        assert!(spec.template.contains("--template /opt/pandoc/pandoc-3.1.9/share/templates/default.latex"));
        assert!(spec.template.contains("-V CJKmonofont=\"Adobe Heiti Std\""));

        let mut options = ConversionOptions::default();
        options.markdown_lua_filter = None;
        options.markdown_template = None;
        let spec = CommandSpec::for_format(SourceFormat::Md, &options).unwrap();
        assert!(!spec.template.contains("--lua-filter"));
        assert!(!spec.template.contains("--template"));
    }

    #[test]
    fn test_html_command_images() {
        let mut options = ConversionOptions::default();
        let spec = CommandSpec::for_format(SourceFormat::Html, &options).unwrap();
        assert_eq!(spec.policy, SuccessPolicy::FileExistsOverride);
        assert_eq!(spec.timeout, Duration::from_secs(30));
        assert!(spec.template.contains("--disable-javascript"));
        assert!(spec.template.contains("--no-images"));

        options.html_load_images = true;
        let spec = CommandSpec::for_format(SourceFormat::Html, &options).unwrap();
        assert!(!spec.template.contains("--no-images"));
        assert!(spec.template.ends_with("{input} {output}"));
    }

    #[test]
    fn test_override_keeps_policy() {
        let mut options = ConversionOptions::default();
        options.commands.html = Some("my-renderer {input} {output}".to_string());
        let spec = CommandSpec::for_format(SourceFormat::Html, &options).unwrap();
        assert_eq!(spec.template, "my-renderer {input} {output}");
        assert_eq!(spec.policy, SuccessPolicy::FileExistsOverride);
        assert_eq!(spec.tool(), "my-renderer");
    }

    #[test]
    fn test_pdf_needs_no_command() {
        assert!(CommandSpec::for_format(SourceFormat::Pdf, &ConversionOptions::default()).is_none());
    }

    #[test]
    fn test_render_txt_command() {
        let spec = CommandSpec::for_format(SourceFormat::Txt, &ConversionOptions::default()).unwrap();
        let input = PathBuf::from("/work/notes.txt");
        let outdir = PathBuf::from("/work/out");
        let cmd = spec.render(&TemplateArgs {
            input: Some(&input),
            output: None,
            outdir: Some(&outdir),
        });
        assert_eq!(
            cmd,
            "soffice --headless -env:SingleAppInstance=\"false\" \
             -env:UserInstallation=file:///work/out/.soffice-profile/ \
             --convert-to pdf --outdir /work/out /work/notes.txt"
        );
    }

    #[test]
    fn test_profile_url_escapes_spaces() {
        let url = profile_url(Path::new("/tmp/my work"));
        assert_eq!(url, "file:///tmp/my%20work/.soffice-profile/");
    }
}
