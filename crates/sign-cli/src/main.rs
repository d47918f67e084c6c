use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sign_document::{DocumentKind, DocumentOptions};
use sign_render::{
    ArtifactRenderer, BatchRunner, ExportOptions, FontResolver, GraphicPosition, LayoutKind,
    Rasterizer, SizeMm, SystemFontProvider, TextMode, estimate_duration, format_duration,
};
use sign_runtime::{ExportCommand, ExportUpdate, worker_task};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "tzg", about = "Tactical sign generator", version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render signs into print-ready PNG files
    Images {
        #[command(flatten)]
        render: RenderArgs,
    },

    /// Render signs into PDF documents
    Document {
        #[command(flatten)]
        render: RenderArgs,

        /// Document layout
        #[arg(long, default_value = "per-page", value_enum)]
        kind: KindArg,

        /// Left/right page margin of cut-sheets in mm
        #[arg(long, default_value = "10.0")]
        margin_h: f32,

        /// Top/bottom page margin of cut-sheets in mm
        #[arg(long, default_value = "10.0")]
        margin_v: f32,
    },

    /// Check that all texts fit without rendering
    Check {
        #[command(flatten)]
        render: RenderArgs,
    },

    /// Estimate the duration of an image export
    Estimate {
        #[command(flatten)]
        render: RenderArgs,

        /// Measured seconds per sign on one thread
        #[arg(long, default_value = "0.5")]
        avg_seconds: f64,
    },

    /// Write the effective options as JSON
    Config {
        #[command(flatten)]
        render: RenderArgs,

        /// JSON file to write
        #[arg(long)]
        json: PathBuf,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Template files (SVG) or blank identifiers such as BLANKO_ruf
    templates: Vec<PathBuf>,

    /// Options file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Text mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Text for the chosen mode (unit, place, call name, free text, file name override)
    #[arg(long)]
    text: Option<String>,

    /// Graphic position in graphic-only mode
    #[arg(long, value_enum)]
    position: Option<PositionArg>,

    /// Finished height in mm
    #[arg(long)]
    height: Option<f32>,

    /// Finished width in mm
    #[arg(long)]
    width: Option<f32>,

    /// Resolution (300, 600 or 1200)
    #[arg(long)]
    dpi: Option<u32>,

    /// Font size in pt
    #[arg(long)]
    font_size: Option<f32>,

    /// Preferred font family
    #[arg(long)]
    font: Option<String>,

    /// Maximum graphic size in mm (height and width)
    #[arg(long)]
    graphic_size: Option<f32>,

    /// Use the dual-panel layout (width = 2 x height)
    #[arg(long)]
    dual_panel: bool,

    /// Signs per template
    #[arg(long)]
    copies: Option<usize>,

    /// Worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Draw advisory cut guides
    #[arg(long)]
    guides: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Unit,
    Place,
    Rule,
    FreeText,
    CallName,
    FileName,
    GraphicOnly,
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionArg {
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    PerPage,
    CutSheet,
}

impl ModeArg {
    /// Flag value selecting the same mode as `mode`
    fn from_mode(mode: &TextMode) -> Self {
        match mode {
            TextMode::UnitStrength { .. } => Self::Unit,
            TextMode::PlaceStrength { .. } => Self::Place,
            TextMode::RuleStrength => Self::Rule,
            TextMode::FreeText { .. } => Self::FreeText,
            TextMode::CallName { .. } => Self::CallName,
            TextMode::FileName { .. } => Self::FileName,
            TextMode::GraphicOnly { .. } => Self::GraphicOnly,
        }
    }
}

impl From<PositionArg> for GraphicPosition {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Top => Self::Top,
            PositionArg::Center => Self::Center,
            PositionArg::Bottom => Self::Bottom,
        }
    }
}

impl From<KindArg> for DocumentKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::PerPage => Self::PerPage,
            KindArg::CutSheet => Self::CutSheet,
        }
    }
}

fn text_mode(mode: ModeArg, text: Option<String>, position: Option<PositionArg>) -> TextMode {
    match mode {
        ModeArg::Unit => TextMode::UnitStrength { unit_name: text },
        ModeArg::Place => TextMode::PlaceStrength { place_name: text },
        ModeArg::Rule => TextMode::RuleStrength,
        ModeArg::FreeText => TextMode::FreeText { text },
        ModeArg::CallName => TextMode::CallName { name: text },
        ModeArg::FileName => TextMode::FileName {
            override_text: text,
        },
        ModeArg::GraphicOnly => TextMode::GraphicOnly {
            position: position.map(Into::into).unwrap_or_default(),
        },
    }
}

impl RenderArgs {
    /// Options from the config file (or defaults) with flags applied
    async fn options(&self) -> Result<ExportOptions> {
        let mut options = match &self.config {
            Some(path) => ExportOptions::load(path).await?,
            None => ExportOptions::default(),
        };

        if !self.templates.is_empty() {
            options.templates = self
                .templates
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
        }
        if let Some(dir) = &self.output_dir {
            options.output_dir = dir.clone();
        }
        if let Some(mode) = self.mode {
            options.mode = text_mode(mode, self.text.clone(), self.position);
        } else if self.text.is_some() || self.position.is_some() {
            let mode = ModeArg::from_mode(&options.mode);
            options.mode = text_mode(mode, self.text.clone(), self.position);
        }
        if let Some(height) = self.height {
            options.finished_height_mm = height;
        }
        if let Some(width) = self.width {
            options.finished_width_mm = width;
        }
        if self.dual_panel {
            options.layout = LayoutKind::DualPanel;
            if self.width.is_none() {
                options.finished_width_mm = 2.0 * options.finished_height_mm;
            }
        }
        if let Some(dpi) = self.dpi {
            options.dpi = dpi;
        }
        if let Some(size) = self.font_size {
            options.font_size_pt = size;
        }
        if let Some(font) = &self.font {
            options.font_family = font.clone();
        }
        if let Some(size) = self.graphic_size {
            options.custom_graphic_mm = Some(SizeMm::new(size, size));
        }
        if let Some(copies) = self.copies {
            options.copies = copies;
        }
        if let Some(threads) = self.threads {
            options.threads = threads;
        }
        if self.guides {
            options.draw_guides = true;
        }

        options.validate()?;
        Ok(options)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Send `command` to a worker and print its updates until the final one
async fn run_command(command: ExportCommand) -> Result<()> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(worker_task(command_rx, update_tx));
    command_tx.send(command)?;
    drop(command_tx);

    let mut failed_count = 0;
    while let Some(update) = update_rx.recv().await {
        match update {
            ExportUpdate::Progress {
                operation,
                current,
                total,
                id,
                ok,
            } => {
                let mark = if ok { "ok" } else { "FAILED" };
                println!("[{current}/{total}] {operation} {id}: {mark}");
            }
            ExportUpdate::ImagesComplete {
                files,
                failed,
                stats,
            } => {
                println!(
                    "Wrote {} images ({} templates) in {:.1}s",
                    files.len(),
                    stats.unique_templates,
                    stats.elapsed
                );
                println!(
                    "  render avg {:.3}s, compose avg {:.3}s, export avg {:.3}s",
                    stats.render.avg, stats.compose.avg, stats.export.avg
                );
                for (id, message) in &failed {
                    eprintln!("  {id}: {message}");
                }
                failed_count = failed.len();
            }
            ExportUpdate::DocumentsComplete {
                files,
                failed,
                pages,
            } => {
                println!("Wrote {} documents with {} pages", files.len(), pages);
                for file in &files {
                    println!("  {}", file.display());
                }
                for (id, message) in &failed {
                    eprintln!("  {id}: {message}");
                }
                failed_count = failed.len();
            }
            ExportUpdate::Estimated { duration, .. } => {
                println!("Estimated duration: {}", format_duration(duration));
            }
            ExportUpdate::Error { message } => bail!(message),
        }
    }
    worker.await?;

    if failed_count > 0 {
        bail!("{failed_count} signs failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Images { render } => {
            let options = render.options().await?;
            if options.templates.is_empty() {
                bail!("No templates given");
            }
            run_command(ExportCommand::RenderImages { options }).await?;
        }

        Commands::Document {
            render,
            kind,
            margin_h,
            margin_v,
        } => {
            let options = render.options().await?;
            if options.templates.is_empty() {
                bail!("No templates given");
            }
            let document = DocumentOptions {
                kind: kind.into(),
                margin_horizontal_mm: margin_h,
                margin_vertical_mm: margin_v,
                ..DocumentOptions::default()
            };
            document.validate()?;
            run_command(ExportCommand::BuildDocument { options, document }).await?;
        }

        Commands::Check { render } => {
            let options = render.options().await?;
            let fonts = Arc::new(FontResolver::new(Arc::new(SystemFontProvider::new())));
            let runner = BatchRunner::new(ArtifactRenderer::new(fonts, Rasterizer::new()));
            let report = runner.check(&options.job());
            for (id, warning) in &report.warnings {
                println!("{id}: {warning}");
            }
            for (id, error) in &report.errors {
                eprintln!("{id}: {error}");
            }
            if !report.is_ok() {
                bail!("{} of {} signs do not fit", report.errors.len(), options.tasks().len());
            }
            println!("All {} signs fit", options.tasks().len());
        }

        Commands::Estimate {
            render,
            avg_seconds,
        } => {
            let options = render.options().await?;
            let tasks = options.tasks().len();
            let duration = estimate_duration(tasks, avg_seconds, options.threads);
            println!(
                "{} signs on {} threads: about {}",
                tasks,
                options.threads,
                format_duration(duration)
            );
        }

        Commands::Config { render, json } => {
            let options = render.options().await?;
            options.save(&json).await?;
            println!("Options written to {}", json.display());
        }
    }

    Ok(())
}
