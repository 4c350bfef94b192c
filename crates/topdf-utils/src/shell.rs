//! Command template rendering and program lookup.
//!
//! Conversion commands are kept as shell templates with `{input}`, `{output}`
//! and `{outdir}` placeholders, the way operators write them in config files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(input|output|outdir)\}").expect("valid placeholder regex"));

static LOOKUP_CACHE: Lazy<Mutex<HashMap<String, Option<PathBuf>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Quote a string for `sh`. Plain words are left alone.
pub fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Collapse a multi-line template into a single line.
pub fn normalize(template: &str) -> String {
    template.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Paths substituted into a command template.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateArgs<'a> {
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub outdir: Option<&'a Path>,
}

/// Substitute placeholders with shell-quoted paths.
///
/// Placeholders without a value are left untouched, which makes the command
/// fail loudly instead of silently writing somewhere unexpected.
pub fn render(template: &str, args: &TemplateArgs<'_>) -> String {
    let template = normalize(template);
    PLACEHOLDER
        .replace_all(&template, |caps: &regex::Captures<'_>| {
            let value = match &caps[1] {
                "input" => args.input,
                "output" => args.output,
                _ => args.outdir,
            };
            match value {
                Some(p) => quote(&p.to_string_lossy()),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// The program a command line starts with, skipping `VAR=value` prefixes.
pub fn program_name(command: &str) -> Option<&str> {
    command
        .split_whitespace()
        .map(|word| word.trim_start_matches('('))
        .find(|word| !word.is_empty() && !is_env_assignment(word))
        .map(|word| word.trim_matches(|c| c == '"' || c == '\''))
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Locate `program` on `PATH` (or check it directly if it contains a `/`).
///
/// Results are cached for the process lifetime so only the first use of a
/// tool pays for the lookup.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if let Ok(cache) = LOOKUP_CACHE.lock() {
        if let Some(hit) = cache.get(program) {
            return hit.clone();
        }
    }

    let found = search_path(program);
    if found.is_none() {
        log::warn!("'{}' not found on PATH", program);
    }

    if let Ok(mut cache) = LOOKUP_CACHE.lock() {
        cache.insert(program.to_string(), found.clone());
    }
    found
}

fn search_path(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Shell builtins and keywords that never live on `PATH`.
pub fn is_shell_builtin(program: &str) -> bool {
    matches!(
        program,
        "cd" | "exit" | "exec" | "printf" | "echo" | "test" | "[" | "true" | "false" | "set"
            | "export" | "trap" | "wait" | "if" | "for" | "while" | "(" | "{"
    )
}
