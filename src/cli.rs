use crate::codec::split_data_uri;
use crate::config::load_config;
use crate::ir::AnnotationRequest;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::service::Annotator;
use crate::store::JsonLinesStore;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "spann",
    version,
    about = "Burn species labels onto images and record the annotations"
)]
pub struct Args {
    /// Request JSON file ({image, boxes, latitude?, longitude?}) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON output.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON file (themeVariables, layout, render, store)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// JSON-lines file receiving one record per box
    #[arg(long = "store")]
    pub store: Option<PathBuf>,

    /// Image reference stored with each record. Defaults to the input file name.
    #[arg(long = "image-ref")]
    pub image_ref: Option<String>,

    /// Use approximate character widths instead of system font metrics
    #[arg(long = "fast-text")]
    pub fast_text: bool,

    /// Write the computed label placements as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if args.fast_text {
        config.layout.fast_text_metrics = true;
    }
    if args.store.is_some() {
        config.store.path = args.store.clone();
    }

    let raw = read_input(args.input.as_deref())?;
    let request: AnnotationRequest =
        serde_json::from_str(&raw).context("request is not a valid annotation request")?;
    let image_reference = args
        .image_ref
        .clone()
        .unwrap_or_else(|| default_image_reference(args.input.as_deref()));

    let mut annotator = Annotator::new(&config)
        .context("text metrics unavailable; pass --fast-text to use approximate widths")?;
    if let Some(path) = config.store.path.as_deref() {
        let store = JsonLinesStore::open(path)?;
        log::info!("recording annotations to {}", store.path().display());
        annotator = annotator.with_writer(Box::new(store));
    }

    let outcome = annotator.annotate(&request, &image_reference)?;
    if let Some(message) = outcome.response.message.as_deref() {
        log::info!("{message}");
    }

    if let Some(path) = args.dump_layout.as_deref() {
        let (width, height) = outcome.image.dimensions();
        write_layout_dump(path, &LayoutDump::from_layouts(&outcome.layouts, width, height))?;
    }

    match args.output_format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome.response)?;
            write_output(json.as_bytes(), args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let (_, bytes) = split_data_uri(&outcome.response.annotated_image)?;
            std::fs::write(&output, bytes)?;
        }
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn default_image_reference(input: Option<&Path>) -> String {
    input
        .filter(|path| *path != Path::new("-"))
        .and_then(|path| path.file_stem())
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "stdin".to_string())
}

fn write_output(bytes: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, bytes)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
