use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;

// Re-export types from library crates
pub use sign_document::{DocumentOptions, DocumentReport};
pub use sign_render::{BatchReport, BatchStatistics, ExportOptions};

use sign_document::{DocumentAssembler, DocumentJob};
use sign_render::{
    ArtifactRenderer, BatchRunner, FontResolver, Rasterizer, SystemFontProvider, estimate_duration,
};

/// Commands sent from a front-end to the worker
#[derive(Debug)]
pub enum ExportCommand {
    /// Render every template of `options` into PNG files
    RenderImages { options: ExportOptions },
    /// Render every template of `options` into paginated documents
    BuildDocument {
        options: ExportOptions,
        document: DocumentOptions,
    },
    /// Predict the duration of an image export
    Estimate {
        options: ExportOptions,
        avg_seconds_per_task: f64,
    },
}

/// Updates sent from the worker to the front-end
#[derive(Debug, Clone)]
pub enum ExportUpdate {
    Progress {
        operation: String,
        current: usize,
        total: usize,
        id: String,
        ok: bool,
    },
    ImagesComplete {
        files: Vec<PathBuf>,
        failed: Vec<(String, String)>,
        stats: BatchStatistics,
    },
    DocumentsComplete {
        files: Vec<PathBuf>,
        failed: Vec<(String, String)>,
        pages: usize,
    },
    Estimated {
        tasks: usize,
        threads: usize,
        duration: Duration,
    },
    Error {
        message: String,
    },
}

/// Fonts the worker renders with
#[derive(Clone)]
pub struct WorkerContext {
    fonts: Arc<FontResolver>,
    template_fonts: bool,
}

impl WorkerContext {
    /// Installed fonts for text bands and template text
    pub fn system() -> Self {
        Self {
            fonts: Arc::new(FontResolver::new(Arc::new(SystemFontProvider::new()))),
            template_fonts: true,
        }
    }

    /// Built-in typeface only, independent of the host
    pub fn builtin() -> Self {
        Self {
            fonts: Arc::new(FontResolver::builtin()),
            template_fonts: false,
        }
    }

    fn runner(&self, draw_guides: bool) -> BatchRunner {
        let rasterizer = if self.template_fonts {
            Rasterizer::with_system_fonts()
        } else {
            Rasterizer::new()
        };
        BatchRunner::new(ArtifactRenderer::new(self.fonts.clone(), rasterizer).with_guides(draw_guides))
    }
}

/// Worker task with the installed system fonts
pub async fn worker_task(
    command_rx: mpsc::UnboundedReceiver<ExportCommand>,
    update_tx: mpsc::UnboundedSender<ExportUpdate>,
) {
    run_worker(WorkerContext::system(), command_rx, update_tx).await
}

/// Process commands one after another until the sender side is dropped
pub async fn run_worker(
    context: WorkerContext,
    mut command_rx: mpsc::UnboundedReceiver<ExportCommand>,
    update_tx: mpsc::UnboundedSender<ExportUpdate>,
) {
    while let Some(cmd) = command_rx.recv().await {
        process_command(&context, cmd, &update_tx).await;
    }
    debug!("Command channel closed, worker stops");
}

fn send_error(update_tx: &mpsc::UnboundedSender<ExportUpdate>, message: impl ToString) {
    let _ = update_tx.send(ExportUpdate::Error {
        message: message.to_string(),
    });
}

async fn process_command(
    context: &WorkerContext,
    cmd: ExportCommand,
    update_tx: &mpsc::UnboundedSender<ExportUpdate>,
) {
    match cmd {
        ExportCommand::RenderImages { options } => {
            handle_render_images(context, options, update_tx).await;
        }
        ExportCommand::BuildDocument { options, document } => {
            handle_build_document(context, options, document, update_tx).await;
        }
        ExportCommand::Estimate {
            options,
            avg_seconds_per_task,
        } => {
            let tasks = options.tasks().len();
            let _ = update_tx.send(ExportUpdate::Estimated {
                tasks,
                threads: options.threads,
                duration: estimate_duration(tasks, avg_seconds_per_task, options.threads),
            });
        }
    }
}

async fn handle_render_images(
    context: &WorkerContext,
    options: ExportOptions,
    update_tx: &mpsc::UnboundedSender<ExportUpdate>,
) {
    if let Err(e) = options.validate() {
        send_error(update_tx, e);
        return;
    }
    info!("Image export of {} templates", options.templates.len());

    let runner = context.runner(options.draw_guides);
    let tx = update_tx.clone();
    let result = runner
        .run_async(options.job(), move |p| {
            let _ = tx.send(ExportUpdate::Progress {
                operation: "Rendering".to_string(),
                current: p.completed,
                total: p.total,
                id: p.id.to_string(),
                ok: p.ok,
            });
        })
        .await;

    match result {
        Ok(report) => {
            let _ = update_tx.send(ExportUpdate::ImagesComplete {
                files: report.successes,
                failed: report.errors,
                stats: report.stats,
            });
        }
        Err(e) => send_error(update_tx, e),
    }
}

async fn handle_build_document(
    context: &WorkerContext,
    options: ExportOptions,
    document: DocumentOptions,
    update_tx: &mpsc::UnboundedSender<ExportUpdate>,
) {
    if let Err(e) = options.validate() {
        send_error(update_tx, e);
        return;
    }

    let assembler = DocumentAssembler::new(context.runner(options.draw_guides));
    let job = DocumentJob::new(options.tasks(), options.output_dir.clone(), document);
    let tx = update_tx.clone();
    let result = assembler
        .assemble_async(job, move |p| {
            let _ = tx.send(ExportUpdate::Progress {
                operation: "Building document".to_string(),
                current: p.completed,
                total: p.total,
                id: p.id.to_string(),
                ok: p.ok,
            });
        })
        .await;

    match result {
        Ok(report) => {
            let _ = update_tx.send(ExportUpdate::DocumentsComplete {
                files: report.files,
                failed: report.errors,
                pages: report.pages,
            });
        }
        Err(e) => send_error(update_tx, e),
    }
}
