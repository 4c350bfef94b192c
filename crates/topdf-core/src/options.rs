//! Conversion options shared across the pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment switch that enables image loading for HTML rendering.
pub const LOAD_IMAGES_ENV: &str = "TOPDF_LOAD_IMAGES";

/// Older name of [`LOAD_IMAGES_ENV`]; read only when the new one is unset.
pub const LEGACY_LOAD_IMAGES_ENV: &str = "WK_LOAD_IMG";

/// All options controlling the conversion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    // -- General --
    /// Run without remote model access: every mode is forced to `text`.
    pub local_mode: bool,

    // -- HTML --
    pub html_load_images: bool,

    // -- Typesetting --
    pub pdf_engine: String,
    /// Lua filter that flattens nested tables while pandoc renders Markdown.
    pub markdown_lua_filter: Option<PathBuf>,
    pub markdown_template: Option<PathBuf>,
    pub docx_fonts: FontSet,
    pub markdown_fonts: FontSet,

    // -- Tools --
    pub timeouts: ToolTimeouts,
    pub commands: CommandOverrides,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            local_mode: false,
            html_load_images: false,
            pdf_engine: "xelatex".to_string(),
            markdown_lua_filter: Some(PathBuf::from("/opt/pandoc/unnested-table.lua")),
            markdown_template: Some(PathBuf::from(
                "/opt/pandoc/pandoc-3.1.9/share/templates/default.latex",
            )),
            docx_fonts: FontSet::with_mono("Cascadia Mono"),
            markdown_fonts: FontSet::with_mono("Adobe Heiti Std"),
            timeouts: ToolTimeouts::default(),
            commands: CommandOverrides::default(),
        }
    }
}

impl ConversionOptions {
    /// Parse options from TOML; missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Apply environment switches on top of file configuration.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(LOAD_IMAGES_ENV).or_else(|| lookup(LEGACY_LOAD_IMAGES_ENV)) {
            self.html_load_images = env_flag(&value);
        }
    }
}

/// Interpret an environment variable value as a boolean switch.
/// Any non-empty value other than `0`/`false`/`no`/`off` enables it.
pub fn env_flag(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    !v.is_empty() && !matches!(v.as_str(), "0" | "false" | "no" | "off")
}

/// Fonts passed to pandoc as `-V` variables, chosen to cover CJK and Latin text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSet {
    pub main: String,
    pub sans: String,
    pub mono: String,
    pub cjk_main: String,
    pub cjk_sans: String,
    pub cjk_mono: String,
}

impl FontSet {
    fn with_mono(mono: &str) -> Self {
        Self {
            mono: mono.to_string(),
            cjk_mono: mono.to_string(),
            ..Self::default()
        }
    }

    /// Render as pandoc `-V name="font"` arguments.
    pub fn pandoc_variables(&self) -> Vec<String> {
        [
            ("mainfont", &self.main),
            ("sansfont", &self.sans),
            ("monofont", &self.mono),
            ("CJKmainfont", &self.cjk_main),
            ("CJKsansfont", &self.cjk_sans),
            ("CJKmonofont", &self.cjk_mono),
        ]
        .iter()
        .filter(|(_, font)| !font.is_empty())
        .map(|(name, font)| format!("-V {}=\"{}\"", name, font))
        .collect()
    }
}

impl Default for FontSet {
    fn default() -> Self {
        Self {
            main: "Alibaba PuHuiTi".to_string(),
            sans: "Alibaba PuHuiTi".to_string(),
            mono: "Alibaba PuHuiTi".to_string(),
            cjk_main: "Alibaba PuHuiTi".to_string(),
            cjk_sans: "Alibaba PuHuiTi".to_string(),
            cjk_mono: "Alibaba PuHuiTi".to_string(),
        }
    }
}

/// Per-tool time budgets in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolTimeouts {
    pub pandoc_secs: u64,
    pub soffice_secs: u64,
    pub wkhtmltopdf_secs: u64,
    pub normalize_secs: u64,
    /// Wait between SIGTERM and SIGKILL when a tool times out.
    pub kill_grace_ms: u64,
}

impl ToolTimeouts {
    pub fn pandoc(&self) -> Duration {
        Duration::from_secs(self.pandoc_secs)
    }

    pub fn soffice(&self) -> Duration {
        Duration::from_secs(self.soffice_secs)
    }

    pub fn wkhtmltopdf(&self) -> Duration {
        Duration::from_secs(self.wkhtmltopdf_secs)
    }

    pub fn normalize(&self) -> Duration {
        Duration::from_secs(self.normalize_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            pandoc_secs: 60,
            soffice_secs: 120,
            wkhtmltopdf_secs: 30,
            normalize_secs: 120,
            kill_grace_ms: 500,
        }
    }
}

/// Replacement command templates.
///
/// Each template may use `{input}`, `{output}` and `{outdir}`; placeholders
/// are substituted with shell-quoted paths. `None` keeps the built-in command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOverrides {
    pub docx: Option<String>,
    pub markdown: Option<String>,
    pub txt: Option<String>,
    pub html: Option<String>,
    pub doc_normalize: Option<String>,
}
