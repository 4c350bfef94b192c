//! Configuration discovery and merging.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use topdf_core::options::ConversionOptions;

/// Name of the per-project config file looked up in the current directory.
pub const LOCAL_CONFIG: &str = ".topdf.toml";

/// `~/.config/topdf/config.toml` (or the platform equivalent).
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("topdf").join("config.toml"))
}

/// Load options from the global file, then the local one, then `explicit`.
///
/// Files are merged table by table, so a local file that only sets
/// `[timeouts]` keeps the global `[commands]`. Missing files are skipped;
/// unparsable ones are reported and skipped, except an explicit `--config`
/// file, which must load.
pub fn load(explicit: Option<&Path>) -> Result<ConversionOptions> {
    let mut merged = toml::Table::new();

    let mut candidates: Vec<PathBuf> = global_config_path().into_iter().collect();
    candidates.push(PathBuf::from(LOCAL_CONFIG));
    for path in candidates {
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        match contents.parse::<toml::Table>() {
            Ok(table) => {
                log::debug!("loaded config {}", path.display());
                merge_tables(&mut merged, table);
            }
            Err(e) => log::warn!("Failed to parse {}: {}", path.display(), e),
        }
    }

    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let table = contents
            .parse::<toml::Table>()
            .with_context(|| format!("cannot parse config {}", path.display()))?;
        merge_tables(&mut merged, table);
    }

    let mut options: ConversionOptions = toml::Value::Table(merged)
        .try_into()
        .context("invalid configuration")?;
    options.apply_env();
    Ok(options)
}

/// Overlay `top` onto `base`, recursing into nested tables.
pub fn merge_tables(base: &mut toml::Table, top: toml::Table) {
    for (key, value) in top {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
