//! CLI tool for extracting PowerPoint content and filling Word templates.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use slidefill_core::{DocumentKind, Error, FieldMapping};
use slidefill_docx::{placeholder, FsTemplateStore, TemplateLibrary, TemplateRenderer};
use slidefill_pptx::PptxExtractor;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extract presentation content and fill `{field}` document templates.
#[derive(Parser, Debug)]
#[command(name = "slidefill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding stored templates
    #[arg(long, global = true, default_value = ".templates")]
    store: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract slide text, notes, images and metadata from a .pptx file as JSON
    Extract(ExtractArgs),

    /// List the placeholders of a .docx template
    Scan {
        /// Template file (.docx)
        input: PathBuf,
    },

    /// Fill a .docx template with values from a JSON object
    Fill {
        /// Template file (.docx)
        input: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Manage stored templates
    #[command(subcommand)]
    Template(TemplateCommand),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input PowerPoint file (.pptx)
    input: PathBuf,

    /// Skip image extraction
    #[arg(long)]
    no_images: bool,

    /// Skip speaker notes
    #[arg(long)]
    no_notes: bool,

    /// Include untrimmed paragraph texts
    #[arg(long)]
    raw: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Write JSON to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON file with field values
    #[arg(short, long)]
    data: PathBuf,

    /// Keep newlines in values as-is instead of converting them to line breaks
    #[arg(long)]
    no_linebreaks: bool,
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// Store a .docx template and print its descriptor
    Upload {
        input: PathBuf,
    },

    /// List stored templates, newest first
    List,

    /// Delete a stored template
    Delete {
        id: String,
    },

    /// Generate a document from a stored template
    Generate {
        id: String,

        #[command(flatten)]
        render: RenderArgs,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Command::Extract(args) => extract(&args),
        Command::Scan { input } => scan(&input),
        Command::Fill {
            input,
            render,
            output,
        } => fill(&input, &render, &output),
        Command::Template(command) => template(&cli.store, command),
    }
}

fn extract(args: &ExtractArgs) -> Result<()> {
    let bytes = read_input(&args.input, DocumentKind::Presentation)?;

    let extractor = PptxExtractor::new()
        .with_images(!args.no_images)
        .with_notes(!args.no_notes)
        .with_raw_texts(args.raw);
    let content = extractor
        .extract(&bytes)
        .with_context(|| format!("Failed to extract {}", args.input.display()))?;

    log::debug!("Extracted {} slides", content.total_slides);

    let json = if args.pretty {
        serde_json::to_string_pretty(&content)?
    } else {
        serde_json::to_string(&content)?
    };

    match &args.output {
        Some(path) => write_output(path, json.as_bytes()),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

fn scan(input: &Path) -> Result<()> {
    let bytes = read_input(input, DocumentKind::WordDocument)?;
    let mut package = slidefill_core::Package::open(bytes)?;
    let fields = placeholder::scan_package(&mut package)
        .with_context(|| format!("Failed to scan {}", input.display()))?;

    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

fn fill(input: &Path, args: &RenderArgs, output: &Path) -> Result<()> {
    let template = read_input(input, DocumentKind::WordDocument)?;
    let mapping = read_mapping(&args.data)?;

    let rendered = renderer(args)
        .render(&template, &mapping)
        .with_context(|| format!("Failed to fill {}", input.display()))?;

    write_output(output, &rendered)?;
    eprintln!("Written to: {}", output.display());
    Ok(())
}

fn template(store_dir: &Path, command: TemplateCommand) -> Result<()> {
    let library = TemplateLibrary::new(FsTemplateStore::new(store_dir));
    log::debug!("Using template store {}", library.store().dir().display());

    match command {
        TemplateCommand::Upload { input } => {
            let bytes = read_input(&input, DocumentKind::WordDocument)?;
            let file_name = input
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("template.docx");
            let descriptor = library
                .upload(&bytes, file_name)
                .with_context(|| format!("Failed to upload {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        TemplateCommand::List => {
            let templates = library.list()?;
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
        TemplateCommand::Delete { id } => {
            library.delete(&id)?;
            eprintln!("Deleted template {}", id);
        }
        TemplateCommand::Generate { id, render, output } => {
            let mapping = read_mapping(&render.data)?;
            let library = library.with_renderer(renderer(&render));
            let generated = library
                .fill(&id, &mapping)
                .with_context(|| format!("Failed to generate from template {}", id))?;

            let dir = output.unwrap_or_else(|| PathBuf::from("."));
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            let path = dir.join(&generated.file_name);
            write_output(&path, &generated.bytes)?;
            eprintln!("Written to: {}", path.display());
        }
    }

    Ok(())
}

fn renderer(args: &RenderArgs) -> TemplateRenderer {
    TemplateRenderer::new().with_linebreaks(!args.no_linebreaks)
}

/// Read an input file, rejecting anything that is not a zip package of the
/// expected kind.
fn read_input(path: &Path, expected: DocumentKind) -> Result<Vec<u8>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if DocumentKind::from_file_name(name) != Some(expected) {
        return Err(Error::UnsupportedFormat(format!(
            "{} (expected a .{} file)",
            path.display(),
            expected.extension()
        ))
        .into());
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if !DocumentKind::is_zip(&bytes) {
        return Err(Error::UnsupportedFormat(format!(
            "{} is not an Office Open XML package",
            path.display()
        ))
        .into());
    }
    Ok(bytes)
}

fn read_mapping(path: &Path) -> Result<FieldMapping> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&json)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    FieldMapping::from_json(&value)
        .with_context(|| format!("{} must contain a JSON object", path.display()))
}

/// Write output to a file.
fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
