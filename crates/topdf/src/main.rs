//! topdf: normalize documents (txt, md, html, doc, docx) into PDF.
//!
//! - `topdf convert a.md b.html -o out/` converts files side by side.
//! - `topdf run --mode partition a.md` drives one request through the
//!   orchestrator and prints a JSON summary, as the service would.

mod config;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde_json::json;

use topdf_core::options::ConversionOptions;
use topdf_core::pipeline::{Outcome, Pipeline};
use topdf_core::plugin::PdfConverter;
use topdf_core::request::{ConversionRequest, Mode, SourceFormat};
use topdf_core::workdir::WorkDir;
use topdf_formats::FormatConverter;

#[derive(Parser)]
#[command(name = "topdf", version, about = "Normalize documents to PDF")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Extra config file, applied after the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Force every request into text mode
    #[arg(long, global = true)]
    local_mode: bool,

    /// Let wkhtmltopdf load images
    #[arg(long, global = true)]
    load_images: bool,

    /// LaTeX engine for pandoc (default: xelatex)
    #[arg(long, global = true)]
    pdf_engine: Option<String>,

    /// Timeout in seconds for every tool, replacing the configured ones
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Dump effective merged config as TOML and exit
    #[arg(long, global = true)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files to PDF
    Convert {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Source format (detected from the extension if omitted)
        #[arg(long)]
        from: Option<String>,
    },
    /// Run one request through the orchestrator
    Run {
        input: PathBuf,

        /// partition, topdf or text
        #[arg(long, default_value = "partition")]
        mode: String,

        /// Keep the resulting file here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn effective_options(cli: &Cli) -> Result<ConversionOptions> {
    let mut opts = config::load(cli.config.as_deref())?;
    if cli.local_mode {
        opts.local_mode = true;
    }
    if cli.load_images {
        opts.html_load_images = true;
    }
    if let Some(engine) = &cli.pdf_engine {
        opts.pdf_engine = engine.clone();
    }
    Ok(opts)
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let options = match effective_options(&cli) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if cli.dump_config {
        match toml::to_string_pretty(&options) {
            Ok(s) => {
                println!("{}", s);
                process::exit(0);
            }
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                process::exit(1);
            }
        }
    }

    let timeout = cli.timeout.map(Duration::from_secs);
    let result = match &cli.command {
        Some(Commands::Convert {
            inputs,
            output,
            from,
        }) => run_convert(inputs, output, from.as_deref(), options, timeout),
        Some(Commands::Run {
            input,
            mode,
            output,
        }) => run_request(input, mode, output.as_deref(), options, timeout),
        None => {
            eprintln!("Usage: topdf convert <inputs>... -o <dir>");
            eprintln!("   or: topdf run --mode <partition|topdf|text> <input>");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run_convert(
    inputs: &[PathBuf],
    out_dir: &Path,
    from: Option<&str>,
    options: ConversionOptions,
    timeout: Option<Duration>,
) -> Result<()> {
    let forced = match from {
        Some(name) => Some(
            SourceFormat::from_extension(name)
                .with_context(|| format!("unknown source format '{}'", name))?,
        ),
        None => None,
    };
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let converter = FormatConverter::new(options);
    let failures: Vec<String> = inputs
        .par_iter()
        .filter_map(|input| {
            convert_one(&converter, input, out_dir, forced, timeout)
                .map_err(|e| format!("{}: {:#}", input.display(), e))
                .err()
        })
        .collect();

    for failure in &failures {
        log::error!("{}", failure);
    }
    if !failures.is_empty() {
        anyhow::bail!("{} of {} conversion(s) failed", failures.len(), inputs.len());
    }
    Ok(())
}

fn convert_one(
    converter: &FormatConverter,
    input: &Path,
    out_dir: &Path,
    forced: Option<SourceFormat>,
    timeout: Option<Duration>,
) -> Result<()> {
    let work = WorkDir::new()?;
    let source = work
        .import(input)
        .with_context(|| format!("cannot read {}", input.display()))?;

    // --from stands in for the extension, which may be missing altogether
    let mut request = match forced {
        Some(format) => ConversionRequest {
            source_path: source,
            source_format: format,
            work_dir: work.path().to_path_buf(),
            mode: Mode::Topdf,
            timeout_override: None,
        },
        None => ConversionRequest::new(&source, work.path(), Mode::Topdf)?,
    };
    request.timeout_override = timeout;

    let result = converter.convert(&request)?;
    let target = out_dir.join(format!("{}.pdf", request.stem()));
    std::fs::copy(&result.output_path, &target)
        .with_context(|| format!("cannot write {}", target.display()))?;

    for warning in &result.warnings {
        log::warn!("{}: {}", input.display(), warning);
    }
    log::info!("{} -> {} ({})", input.display(), target.display(), result.tool_used);
    Ok(())
}

fn run_request(
    input: &Path,
    mode: &str,
    output: Option<&Path>,
    options: ConversionOptions,
    timeout: Option<Duration>,
) -> Result<()> {
    let mode: Mode = mode.parse()?;
    let local_mode = options.local_mode;
    let pipeline = Pipeline::new(Box::new(FormatConverter::new(options)))
        .local_mode(local_mode)
        .timeout_override(timeout);

    let work = WorkDir::new()?;
    let source = work
        .import(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let outcome = pipeline.run(&source, mode, &work)?;

    let summary = match &outcome {
        Outcome::Handoff {
            snapshot,
            conversion,
        } => {
            if let Some(dest) = output {
                std::fs::copy(&snapshot.path, dest)
                    .with_context(|| format!("cannot write {}", dest.display()))?;
            }
            json!({
                "request_id": work.id().to_string(),
                "outcome": "handoff",
                "mode": snapshot.mode,
                "format": snapshot.format,
                // the work dir is gone once we return; only a kept copy has a path
                "path": output,
                "conversion": conversion,
            })
        }
        Outcome::Pdf { bytes, conversion } => {
            if let Some(dest) = output {
                std::fs::write(dest, bytes)
                    .with_context(|| format!("cannot write {}", dest.display()))?;
            }
            json!({
                "request_id": work.id().to_string(),
                "outcome": "pdf",
                "mode": Mode::Topdf,
                "conversion": conversion,
                "pdf_base64": outcome.base64_payload(),
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
