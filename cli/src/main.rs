//! pdfblocks CLI - PDF to typed content blocks

mod ocr;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfblocks::render::to_json;
use pdfblocks::{
    is_pdf_bytes, sniff_path, transform_with_options, Document, EntityType, ExtractOptions,
    Extractor, JsonFormat, OcrProvider, PageSelection, Payload, RawDocument, TransformOptions,
    Warning,
};

use crate::ocr::CommandOcr;

#[derive(Parser)]
#[command(name = "pdfblocks")]
#[command(version)]
#[command(about = "Turn PDFs into ordered, typed content blocks", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output JSON file
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline and write structured JSON
    Convert {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        extract: ExtractArgs,

        #[command(flatten)]
        transform: TransformArgs,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Extract raw page primitives as JSON
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        extract: ExtractArgs,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Turn raw primitives JSON into structured JSON
    Transform {
        /// Raw primitives JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        transform: TransformArgs,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// List blocks of a PDF or structured JSON file
    #[command(alias = "ls")]
    Blocks {
        /// PDF or structured JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only list blocks of this type
        #[arg(long, value_name = "TYPE")]
        kind: Option<String>,
    },

    /// Print one block's payload
    Get {
        /// PDF or structured JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Block id
        #[arg(value_name = "ID")]
        id: u32,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args, Clone, Default)]
struct ExtractArgs {
    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// Abort on the first page that fails to extract
    #[arg(long)]
    strict: bool,

    /// Skip table detection
    #[arg(long)]
    no_tables: bool,

    /// OCR command reading an image on stdin (e.g., "tesseract stdin stdout")
    #[arg(long, value_name = "CMD", env = "PDFBLOCKS_OCR_CMD")]
    ocr_cmd: Option<String>,

    /// Number of OCR workers
    #[arg(long, default_value = "4")]
    ocr_workers: usize,

    /// OCR deadline for the whole document, in seconds
    #[arg(long, value_name = "SECS")]
    ocr_timeout: Option<u64>,
}

impl ExtractArgs {
    fn options(&self) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
        let pages = if let Some(p) = self.pages.as_deref() {
            PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?
        } else {
            PageSelection::All
        };

        let mut options = ExtractOptions::new()
            .with_pages(pages)
            .with_tables(!self.no_tables)
            .with_ocr_workers(self.ocr_workers);
        if self.strict {
            options = options.strict();
        }
        if let Some(secs) = self.ocr_timeout {
            options = options.with_ocr_timeout(Duration::from_secs(secs));
        }
        Ok(options)
    }

    fn ocr(&self) -> Result<Option<OcrProvider>, Box<dyn std::error::Error>> {
        match self.ocr_cmd.as_deref() {
            Some(cmd) => {
                let engine = CommandOcr::parse(cmd).ok_or("Empty OCR command")?;
                Ok(Some(OcrProvider::shared(engine)))
            }
            None => Ok(None),
        }
    }
}

#[derive(clap::Args, Clone, Default)]
struct TransformArgs {
    /// Font size ratio over body text that marks a heading
    #[arg(long, value_name = "RATIO")]
    heading_ratio: Option<f32>,

    /// Keep blocks that cross a page break separate
    #[arg(long)]
    no_page_merge: bool,
}

impl TransformArgs {
    fn options(&self) -> TransformOptions {
        let mut options = TransformOptions::new().with_page_merging(!self.no_page_merge);
        if let Some(ratio) = self.heading_ratio {
            options = options.with_heading_ratio(ratio);
        }
        options
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            extract,
            transform,
            compact,
        }) => cmd_convert(&input, output.as_deref(), &extract, &transform, compact),
        Some(Commands::Extract {
            input,
            output,
            extract,
            compact,
        }) => cmd_extract(&input, output.as_deref(), &extract, compact),
        Some(Commands::Transform {
            input,
            output,
            transform,
            compact,
        }) => cmd_transform(&input, output.as_deref(), &transform, compact),
        Some(Commands::Blocks { input, kind }) => cmd_blocks(&input, kind.as_deref()),
        Some(Commands::Get { input, id, compact }) => cmd_get(&input, id, compact),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(
                    &input,
                    cli.output.as_deref(),
                    &ExtractArgs::default(),
                    &TransformArgs::default(),
                    false,
                )
            } else {
                println!("{}", "Usage: pdfblocks <FILE> [OUTPUT]".yellow());
                println!("       pdfblocks --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn json_format(compact: bool) -> JsonFormat {
    if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    }
}

fn write_output(output: Option<&Path>, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }
    Ok(())
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{}: {}", "Warning".yellow().bold(), warning);
    }
}

fn extract(input: &Path, args: &ExtractArgs) -> Result<RawDocument, Box<dyn std::error::Error>> {
    let mut extractor = Extractor::open_with_options(input, args.options()?)?;
    if let Some(provider) = args.ocr()? {
        extractor = extractor.with_ocr(provider);
    }
    Ok(extractor.extract()?)
}

/// Open a PDF through the pipeline, or load an already structured JSON file.
fn open_document(input: &Path) -> Result<Document, Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    if is_pdf_bytes(&data) {
        let raw = Extractor::from_bytes(&data)?
            .with_filename(input.file_name().unwrap_or_default().to_string_lossy())
            .extract()?;
        print_warnings(&raw.warnings);
        Ok(Document::new(pdfblocks::transform(&raw))?)
    } else {
        let json = std::str::from_utf8(&data).map_err(|_| "Input is neither PDF nor JSON")?;
        Ok(Document::from_json(json)?)
    }
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    extract_args: &ExtractArgs,
    transform_args: &TransformArgs,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    pb.set_message("Extracting primitives...");
    let raw = extract(input, extract_args)?;
    pb.inc(1);

    pb.set_message("Assembling blocks...");
    let doc = Document::new(transform_with_options(&raw, &transform_args.options()))?;
    pb.inc(1);

    pb.set_message("Rendering JSON...");
    let json = to_json(doc.structured(), json_format(compact))?;
    pb.inc(1);

    pb.finish_with_message(format!("{} blocks from {} pages", doc.len(), doc.total_pages()));
    print_warnings(&raw.warnings);

    write_output(output, &json)
}

fn cmd_extract(
    input: &Path,
    output: Option<&Path>,
    args: &ExtractArgs,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = extract(input, args)?;
    print_warnings(&raw.warnings);

    let json = to_json(&raw, json_format(compact))?;
    write_output(output, &json)
}

fn cmd_transform(
    input: &Path,
    output: Option<&Path>,
    args: &TransformArgs,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::open(input)?;
    let raw: RawDocument = serde_json::from_reader(std::io::BufReader::new(file))?;

    let doc = Document::new(transform_with_options(&raw, &args.options()))?;
    let json = to_json(doc.structured(), json_format(compact))?;
    write_output(output, &json)
}

fn cmd_blocks(input: &Path, kind: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let doc = open_document(input)?;

    let filter = match kind {
        Some(k) => Some(parse_entity_type(k)?),
        None => None,
    };

    for (id, title, entity_type) in doc.blocks() {
        if filter.is_some_and(|f| f != entity_type) {
            continue;
        }
        let padded = format!("{:<9}", entity_type.as_str());
        let label = match entity_type {
            EntityType::Heading => padded.as_str().cyan().bold(),
            EntityType::Table => padded.as_str().magenta(),
            EntityType::Image => padded.as_str().yellow(),
            EntityType::Caption => padded.as_str().dimmed(),
            EntityType::Paragraph => padded.as_str().normal(),
        };
        println!("{:>5}  {}  {}", id.to_string().dimmed(), label, title);
    }

    Ok(())
}

fn parse_entity_type(s: &str) -> Result<EntityType, Box<dyn std::error::Error>> {
    let kind = match s.to_ascii_lowercase().as_str() {
        "heading" => EntityType::Heading,
        "paragraph" => EntityType::Paragraph,
        "table" => EntityType::Table,
        "image" => EntityType::Image,
        "caption" => EntityType::Caption,
        _ => return Err(format!("Unknown block type: {}", s).into()),
    };
    Ok(kind)
}

fn cmd_get(input: &Path, id: u32, compact: bool) -> Result<(), Box<dyn std::error::Error>> {
    let doc = open_document(input)?;
    let payload = doc.get_data(id)?;

    match payload {
        Payload::Text(text) if !compact => println!("{}", text.text),
        _ => println!("{}", to_json(payload, json_format(compact))?),
    }

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let header = sniff_path(input)?;
    let extractor = Extractor::open(input)?;
    let raw = extractor.extract()?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), header.version);
    println!("{}: {}", "Pages".bold(), extractor.page_count());

    if let Some(ref title) = raw.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = raw.metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref created) = raw.metadata.created {
        println!("{}: {}", "Created".bold(), created.format("%Y-%m-%d %H:%M:%S"));
    }

    println!();
    println!("{}", "Content".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let runs: usize = raw.pages.iter().map(|p| p.text_runs().count()).sum();
    let cells: usize = raw.pages.iter().map(|p| p.table_cells().count()).sum();
    let images: usize = raw.pages.iter().map(|p| p.images().count()).sum();
    println!("{}: {}", "Text runs".bold(), runs);
    println!("{}: {}", "Table cells".bold(), cells);
    println!("{}: {}", "Images".bold(), images);

    if !raw.warnings.is_empty() {
        println!("{}: {}", "Warnings".bold(), raw.warnings.len().to_string().yellow());
    }

    Ok(())
}

fn cmd_version() {
    println!("pdfblocks {}", env!("CARGO_PKG_VERSION"));
}
