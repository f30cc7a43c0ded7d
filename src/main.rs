//! Field masking CLI application.
//!
//! Builds text -> bbox mappings from OCR layout output, looks fields up in
//! them, and masks the matched boxes in the source PDF.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fieldmask::{
    BboxMapping, Config, FieldLocator, Granularity, MappingPipeline, MaskColor,
    OverlayRedactionStrategy, RedactionService, RedactionStrategy, SecureRedactionStrategy,
};

/// Field masking tool
///
/// Locate OCR'd fields in pixel space and mask them in the source PDF.
#[derive(Parser)]
#[command(name = "fieldmask")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file overriding default settings
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a bbox mapping from a layout JSON and its rendered markdown
    Build {
        /// Layout JSON (middle.json) file path
        #[arg(short, long, value_name = "FILE")]
        layout: PathBuf,

        /// Rendered markdown file path
        #[arg(short, long, value_name = "FILE")]
        markdown: PathBuf,

        /// Mapping JSON output path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Key the mapping by character or by whole text run
        #[arg(short, long, value_enum, default_value_t = GranularityArg::Char)]
        granularity: GranularityArg,

        /// Skip discarded blocks (headers, footers, page numbers)
        #[arg(long)]
        no_discarded: bool,
    },

    /// Resolve fields to boxes
    Locate {
        /// Mapping JSON file path
        #[arg(short, long, value_name = "FILE")]
        mapping: PathBuf,

        /// Field text to look up (can be specified multiple times)
        #[arg(short, long = "field", value_name = "TEXT", required = true)]
        fields: Vec<String>,

        /// Run every matching tier and accumulate results
        #[arg(long)]
        fuzzy: bool,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the keys of a mapping
    List {
        /// Mapping JSON file path
        #[arg(short, long, value_name = "FILE")]
        mapping: PathBuf,

        /// Only keys containing this text (case-insensitive)
        #[arg(short, long, value_name = "TEXT")]
        search: Option<String>,
    },

    /// Mask fields in a PDF
    Redact {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Mapping JSON file path
        #[arg(short, long, value_name = "FILE")]
        mapping: PathBuf,

        /// Output PDF file path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Field text to mask (can be specified multiple times)
        #[arg(short, long = "field", value_name = "TEXT", required = true)]
        fields: Vec<String>,

        /// Preset name or "r,g,b" (0-255); defaults to the configured color
        #[arg(long, value_name = "COLOR")]
        color: Option<String>,

        /// Run every matching tier and accumulate results
        #[arg(long)]
        fuzzy: bool,

        /// Remove the covered content with MuPDF instead of drawing over it
        #[arg(long)]
        secure: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    Char,
    Run,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Char => Granularity::Char,
            GranularityArg::Run => Granularity::Run,
        }
    }
}

/// Command handler holding the loaded configuration.
struct MaskHandler {
    config: Config,
    verbose: bool,
}

impl MaskHandler {
    fn new(config: Config, verbose: bool) -> Self {
        Self { config, verbose }
    }

    fn build(
        &self,
        layout: &Path,
        markdown: &Path,
        output: &Path,
        granularity: Granularity,
        include_discarded: bool,
    ) -> Result<()> {
        let mut config = self.config.clone();
        config.layout.include_discarded &= include_discarded;

        let build = MappingPipeline::new(&config)
            .with_granularity(granularity)
            .build_from_files(layout, markdown)
            .with_context(|| "Mapping build failed")?;

        build
            .mapping
            .save(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        let summary = &build.summary;
        if self.verbose {
            println!("Alignment Summary:");
            println!("  Runs:       {}", summary.total);
            println!("  Resolved:   {}", summary.resolved);
            println!("  Unresolved: {}", summary.unresolved);
            println!("  Retried:    {}", summary.retried);
            for (strategy, count) in &summary.by_strategy {
                println!("  {:<22}{}", format!("{strategy}:"), count);
            }
        }

        println!(
            "✓ Mapped {} entries ({} of {} runs aligned) → {}",
            build.mapping.len(),
            summary.resolved,
            summary.total,
            output.display()
        );
        Ok(())
    }

    fn locate(&self, mapping: &Path, fields: &[String], fuzzy: bool, json: bool) -> Result<()> {
        let mapping = BboxMapping::load(mapping)
            .with_context(|| format!("Failed to load mapping {}", mapping.display()))?;
        let reports = FieldLocator::default().locate_report(&mapping, fields, fuzzy);

        if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
            return Ok(());
        }

        for report in &reports {
            if !report.is_found() {
                println!("⚠ {}: not found", report.field);
                continue;
            }
            println!("{}:", report.field);
            for m in &report.matches {
                let [x0, y0, x1, y1] = m.bbox.to_array();
                println!(
                    "  page {} [{:.1}, {:.1}, {:.1}, {:.1}] {}",
                    m.page_index,
                    x0,
                    y0,
                    x1,
                    y1,
                    m.match_info()
                );
            }
            if self.verbose && report.matches.len() > 1 {
                if let Some(merged) = report.merged_bbox() {
                    println!("  merged {:?}", merged.to_array());
                }
            }
        }
        Ok(())
    }

    fn list(&self, mapping: &Path, search: Option<&str>) -> Result<()> {
        let mapping = BboxMapping::load(mapping)
            .with_context(|| format!("Failed to load mapping {}", mapping.display()))?;
        let fields = mapping.list_fields(search);

        for field in &fields {
            println!("{}\tpage {}\t{:?}", field.key, field.page_index, field.bbox.to_array());
        }
        if self.verbose {
            println!("{} of {} keys", fields.len(), mapping.len());
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn redact(
        &self,
        input: &Path,
        mapping: &Path,
        output: &Path,
        fields: &[String],
        color: Option<&str>,
        fuzzy: bool,
        secure: bool,
    ) -> Result<()> {
        let color = resolve_color(color, &self.config)?;
        let strategy: Box<dyn RedactionStrategy> = if secure {
            Box::new(SecureRedactionStrategy::new())
        } else {
            Box::new(OverlayRedactionStrategy::new())
        };
        let service =
            RedactionService::new(strategy).with_margin(self.config.redaction.horizontal_margin);

        if self.verbose {
            println!("Input:    {}", input.display());
            println!("Mapping:  {}", mapping.display());
            println!("Output:   {}", output.display());
            println!("Fields:   {} field(s)", fields.len());
            println!("Strategy: {}", service.strategy_name());
        }

        let result = service
            .redact(input, fields, mapping, output, color, fuzzy)
            .with_context(|| "Redaction failed")?;

        for field in &result.fields_missing {
            println!("⚠ Field not found: {}", field);
        }

        if self.verbose {
            println!("\nRedaction Summary:");
            println!("  Pages processed: {}", result.pages_processed);
            println!("  Pages modified:  {}", result.pages_modified);
            println!("  Boxes masked:    {}", result.instances_redacted);
            println!("  Out of range:    {}", result.skipped_out_of_range);
            println!(
                "  Secure: {}",
                if result.secure {
                    "Yes"
                } else {
                    "No (visual only)"
                }
            );
        }

        if result.has_redactions() {
            println!(
                "✓ Masked {} box(es) → {}",
                result.instances_redacted,
                output.display()
            );
        } else {
            println!("⚠ Nothing to mask, no output written");
        }
        Ok(())
    }
}

/// CLI color first, then the configured default.
fn resolve_color(cli: Option<&str>, config: &Config) -> Result<MaskColor> {
    let color = cli.unwrap_or(&config.redaction.color);
    color.parse::<MaskColor>()
        .with_context(|| format!("Invalid color '{}'", color))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let handler = MaskHandler::new(config, cli.verbose);

    match &cli.command {
        Commands::Build {
            layout,
            markdown,
            output,
            granularity,
            no_discarded,
        } => handler.build(layout, markdown, output, (*granularity).into(), !no_discarded)?,
        Commands::Locate {
            mapping,
            fields,
            fuzzy,
            json,
        } => handler.locate(mapping, fields, *fuzzy, *json)?,
        Commands::List { mapping, search } => handler.list(mapping, search.as_deref())?,
        Commands::Redact {
            input,
            mapping,
            output,
            fields,
            color,
            fuzzy,
            secure,
        } => handler.redact(
            input,
            mapping,
            output,
            fields,
            color.as_deref(),
            *fuzzy,
            *secure,
        )?,
    }

    Ok(())
}
