//! Streaming document assembly
//!
//! Artifacts are rendered strictly in submission order on the calling
//! thread, each from scratch. Each raster is compressed into the document
//! right away and dropped before the next one is rendered, so only one
//! full-resolution buffer is resident at a time. No templates are kept
//! across artifacts.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use lopdf::content::Operation;
use sign_render::render::normalize;
use sign_render::{BatchRunner, PrintReadyArtifact, RenderTask, SizeMm};

use crate::constants::{
    CUT_LINE_WIDTH_PT, PRINT_HINT, PRINT_HINT_EDGE_MM, PRINT_HINT_FONT_SIZE_PT, PRINT_HINT_GRAY,
    SAFETY_LINE_RGB, TRIM_LINE_RGB, mm_to_pt,
};
use crate::grid::GridLayout;
use crate::options::DocumentOptions;
use crate::pdf::{DocumentInfo, PdfBuilder, centered_text, draw_image, stroke_rect, write_pdf};
use crate::split::{document_file_name, export_timestamp, plan_files};
use crate::types::{DocumentError, DocumentKind, Result};

/// Artifacts to place and where the documents go
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub tasks: Vec<RenderTask>,
    pub output_dir: PathBuf,
    pub options: DocumentOptions,
    /// Shared file name prefix; the current local time when `None`
    pub timestamp: Option<String>,
}

impl DocumentJob {
    pub fn new(tasks: Vec<RenderTask>, output_dir: impl Into<PathBuf>, options: DocumentOptions) -> Self {
        Self {
            tasks,
            output_dir: output_dir.into(),
            options,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Progress of a document job after one artifact
#[derive(Debug, Clone, Copy)]
pub struct DocumentProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub id: &'a str,
    pub ok: bool,
}

/// Outcome of a document job
#[derive(Debug, Default)]
pub struct DocumentReport {
    pub files: Vec<PathBuf>,
    /// `(artifact id, message)` of every artifact that was not placed
    pub errors: Vec<(String, String)>,
    pub pages: usize,
    pub placed: usize,
    /// Bytes of the largest decoded raster held while placing an artifact
    pub peak_raster_bytes: usize,
}

impl DocumentReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Cut-sheet page under construction
struct SheetPage {
    operations: Vec<Operation>,
    images: Vec<(String, lopdf::ObjectId)>,
}

impl SheetPage {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            images: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Builds paginated documents from render tasks
#[derive(Clone)]
pub struct DocumentAssembler {
    runner: BatchRunner,
}

impl DocumentAssembler {
    pub fn new(runner: BatchRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &BatchRunner {
        &self.runner
    }

    /// Assemble `job` into one or more PDF files.
    ///
    /// Artifacts that fail pre-flight or rendering are reported and skipped;
    /// cut-sheet cells are filled by the artifacts that succeed.
    pub fn assemble(
        &self,
        job: &DocumentJob,
        progress: &mut dyn FnMut(DocumentProgress<'_>),
    ) -> Result<DocumentReport> {
        job.options.validate()?;
        if job.tasks.is_empty() {
            return Err(DocumentError::NoArtifacts);
        }

        let total = job.tasks.len();
        let mut report = DocumentReport::default();
        let mut completed = 0;

        let renderer = self.runner.renderer();
        let mut scheduled = Vec::with_capacity(total);
        for task in &job.tasks {
            match renderer.preflight(task) {
                Ok(warnings) => {
                    for warning in warnings {
                        warn!("{}: {}", task.id, warning);
                    }
                    scheduled.push(normalize(task).into_owned());
                }
                Err(e) => {
                    warn!("{}: {}", task.id, e);
                    report.errors.push((task.id.clone(), e.to_string()));
                    completed += 1;
                    progress(DocumentProgress {
                        completed,
                        total,
                        id: &task.id,
                        ok: false,
                    });
                }
            }
        }
        let Some(first) = scheduled.first() else {
            return Ok(report);
        };

        let options = &job.options;
        let grid = match options.kind {
            DocumentKind::PerPage => None,
            DocumentKind::CutSheet => {
                let dims = first.spec.dimensions()?;
                Some(GridLayout::fit(
                    options.paper,
                    dims.finished_mm,
                    options.margin_horizontal_mm,
                    options.margin_vertical_mm,
                )?)
            }
        };
        let (per_file, per_page) = match &grid {
            None => (options.artifacts_per_file, 1),
            Some(grid) => (options.pages_per_file * grid.per_page(), grid.per_page()),
        };
        let files = plan_files(scheduled.len(), per_file, per_page, options.min_last_file_pages);

        let timestamp = job.timestamp.clone().unwrap_or_else(export_timestamp);
        std::fs::create_dir_all(&job.output_dir)?;
        info!(
            "Writing {} artifacts into {} {} document(s)",
            scheduled.len(),
            files.len(),
            options.kind.name()
        );

        let mut peak = 0;
        for (index, range) in files.iter().enumerate() {
            let name = document_file_name(
                &timestamp,
                options.kind,
                range.start + 1,
                range.end,
                index + 1,
                files.len(),
            );
            let path = job.output_dir.join(name);
            info!(
                "Document {}/{}: artifacts {} to {}",
                index + 1,
                files.len(),
                range.start + 1,
                range.end
            );

            let mut tick = |id: &str, outcome: std::result::Result<(), String>| {
                completed += 1;
                let ok = outcome.is_ok();
                if let Err(message) = outcome {
                    warn!("{} not placed: {}", id, message);
                    report.errors.push((id.to_string(), message));
                }
                progress(DocumentProgress {
                    completed,
                    total,
                    id,
                    ok,
                });
            };

            let tasks = &scheduled[range.clone()];
            let (pages, placed) = match &grid {
                None => self.write_per_page(tasks, &path, &mut peak, &mut tick)?,
                Some(grid) => self.write_cut_sheet(tasks, grid, &path, &mut peak, &mut tick)?,
            };
            if pages > 0 {
                report.files.push(path);
            }
            report.pages += pages;
            report.placed += placed;
        }

        report.peak_raster_bytes = peak;
        info!(
            "Documents finished: {} artifacts on {} pages, {} failed",
            report.placed,
            report.pages,
            report.errors.len()
        );
        Ok(report)
    }

    /// Run [`Self::assemble`] on a blocking thread
    pub async fn assemble_async<F>(&self, job: DocumentJob, mut progress: F) -> Result<DocumentReport>
    where
        F: FnMut(DocumentProgress<'_>) + Send + 'static,
    {
        let assembler = self.clone();
        tokio::task::spawn_blocking(move || assembler.assemble(&job, &mut progress)).await?
    }

    fn render(
        &self,
        task: &RenderTask,
        peak: &mut usize,
    ) -> sign_render::Result<PrintReadyArtifact> {
        let (artifact, _) = self.runner.renderer().render(task, None)?;
        *peak = (*peak).max(artifact.pixmap.data().len());
        Ok(artifact)
    }

    /// One page per artifact, page size = file size, image at the origin
    fn write_per_page(
        &self,
        tasks: &[RenderTask],
        path: &Path,
        peak: &mut usize,
        tick: &mut dyn FnMut(&str, std::result::Result<(), String>),
    ) -> Result<(usize, usize)> {
        let mut builder = PdfBuilder::new();

        for task in tasks {
            let artifact = match self.render(task, peak) {
                Ok(artifact) => artifact,
                Err(e) => {
                    tick(&task.id, Err(e.to_string()));
                    continue;
                }
            };
            let image = builder.add_image(&artifact.pixmap)?;
            let page = artifact.file_mm;
            drop(artifact);

            let operations = draw_image(
                "Im0",
                0.0,
                0.0,
                mm_to_pt(page.width),
                mm_to_pt(page.height),
            );
            builder.add_page(page, operations, &[("Im0".to_string(), image)], false)?;
            debug!("{} placed on page {}", task.id, builder.page_count());
            tick(&task.id, Ok(()));
        }

        let pages = builder.page_count();
        self.save(builder, DocumentKind::PerPage, pages, path)?;
        Ok((pages, pages))
    }

    /// Finished-size artifacts on a grid, with trim outlines and print hints
    fn write_cut_sheet(
        &self,
        tasks: &[RenderTask],
        grid: &GridLayout,
        path: &Path,
        peak: &mut usize,
        tick: &mut dyn FnMut(&str, std::result::Result<(), String>),
    ) -> Result<(usize, usize)> {
        let draw_guides = self.runner.renderer().draw_guides();
        let mut builder = PdfBuilder::new();
        let mut page = SheetPage::new();
        let mut placed = 0;

        for task in tasks {
            let artifact = match self.render(task, peak) {
                Ok(artifact) => artifact,
                Err(e) => {
                    tick(&task.id, Err(e.to_string()));
                    continue;
                }
            };
            let Some(finished) = artifact.finished_rect() else {
                tick(&task.id, Err("artifact has no finished area".to_string()));
                continue;
            };

            let slot = placed % grid.per_page();
            if slot == 0 && !page.is_empty() {
                add_sheet(&mut builder, grid, std::mem::replace(&mut page, SheetPage::new()))?;
            }

            // Bleed is cut away while streaming the rows
            let image = builder.add_image_region(&artifact.pixmap, finished)?;
            drop(artifact);

            let (x_mm, y_mm) = grid.cell_origin_pdf(slot);
            let (x, y) = (mm_to_pt(x_mm), mm_to_pt(y_mm));
            let (w, h) = (mm_to_pt(grid.cell.width), mm_to_pt(grid.cell.height));
            let name = format!("Im{slot}");
            page.operations.extend(draw_image(&name, x, y, w, h));
            page.operations
                .extend(stroke_rect(x, y, w, h, TRIM_LINE_RGB, CUT_LINE_WIDTH_PT));
            if draw_guides {
                let safety = mm_to_pt(task.spec.safety_mm);
                page.operations.extend(stroke_rect(
                    x + safety,
                    y + safety,
                    w - 2.0 * safety,
                    h - 2.0 * safety,
                    SAFETY_LINE_RGB,
                    CUT_LINE_WIDTH_PT,
                ));
            }
            page.images.push((name, image));
            placed += 1;
            tick(&task.id, Ok(()));
        }
        if !page.is_empty() {
            add_sheet(&mut builder, grid, page)?;
        }

        let pages = builder.page_count();
        self.save(builder, DocumentKind::CutSheet, placed, path)?;
        Ok((pages, placed))
    }

    fn save(&self, builder: PdfBuilder, kind: DocumentKind, count: usize, path: &Path) -> Result<()> {
        if builder.page_count() == 0 {
            warn!("Nothing placed, {} not written", path.display());
            return Ok(());
        }
        let mut doc = builder.finish(&DocumentInfo::for_export(kind, count));
        write_pdf(&mut doc, path)?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Close a cut-sheet page, adding the print hint at the top and bottom edge
fn add_sheet(builder: &mut PdfBuilder, grid: &GridLayout, mut page: SheetPage) -> Result<()> {
    let SizeMm { width, height } = grid.page;
    let (page_w, page_h) = (mm_to_pt(width), mm_to_pt(height));
    let edge = mm_to_pt(PRINT_HINT_EDGE_MM);
    for y in [page_h - edge, edge] {
        page.operations.extend(centered_text(
            PRINT_HINT,
            PRINT_HINT_FONT_SIZE_PT,
            page_w,
            y,
            PRINT_HINT_GRAY,
        ));
    }
    builder.add_page(grid.page, page.operations, &page.images, true)?;
    Ok(())
}
