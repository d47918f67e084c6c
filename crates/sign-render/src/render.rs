//! Per-artifact pipeline: rasterize, compose, prepare for print, export
//!
//! [`ArtifactRenderer`] is shared by all workers of a batch and holds no
//! per-task state. Templates are taken from a chunk's [`TemplateArena`]
//! when present and rendered fresh otherwise.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use tiny_skia::Pixmap;

use crate::artifact::{ArtifactSpec, BlankKind, RenderTask, TemplateRef};
use crate::cache::TemplateArena;
use crate::compose::Compositor;
use crate::constants::{DUAL_PANEL_MODE_TAG, SUFFIX_PRINT_READY, SUFFIX_WITH_GUIDES};
use crate::fonts::FontResolver;
use crate::pixels::write_png;
use crate::print_prep::{PrintPreparer, PrintReadyArtifact};
use crate::rasterizer::{Rasterizer, validate_graphic_size};
use crate::text::TextEngine;
use crate::text::layout::{PLACE_PREFIX, UNIT_PREFIX, stem_to_text};
use crate::types::{LayoutKind, RenderError, Result, StageTimings, TextMode};

/// Task as it is actually rendered.
///
/// Single-panel blanks carry their own text mode; the task's mode is kept
/// when it is the same mode so its text survives. Dual-panel blanks force
/// the dual-panel layout.
pub fn normalize(task: &RenderTask) -> Cow<'_, RenderTask> {
    let spec = match &task.template {
        TemplateRef::Blank(BlankKind::Single(mode)) if mode.tag() != task.spec.mode.tag() => {
            task.spec.with_mode(mode.clone())
        }
        TemplateRef::Blank(kind) if kind.is_dual_panel() && !task.spec.is_dual_panel() => {
            ArtifactSpec {
                layout: LayoutKind::DualPanel,
                ..task.spec.clone()
            }
        }
        _ => return Cow::Borrowed(task),
    };
    Cow::Owned(RenderTask {
        id: task.id.clone(),
        template: task.template.clone(),
        spec,
    })
}

/// File name of an exported artifact: `{id}_{mode}{suffix}.png`
pub fn output_file_name(task: &RenderTask, with_guides: bool) -> String {
    let mode = if task.spec.is_dual_panel() {
        DUAL_PANEL_MODE_TAG
    } else {
        task.spec.mode.tag()
    };
    let suffix = if with_guides {
        SUFFIX_WITH_GUIDES
    } else {
        SUFFIX_PRINT_READY
    };
    format!("{}_{}{}.png", task.id, mode, suffix)
}

fn stem_of(task: &RenderTask) -> Option<String> {
    match task.template {
        TemplateRef::Vector(_) => Some(task.template.id()),
        TemplateRef::Blank(_) => None,
    }
}

/// Text that has to fit the band, with the number of lines it may use
fn text_to_fit(task: &RenderTask, reserved: usize) -> Option<(String, usize)> {
    let mode = &task.spec.mode;
    match mode {
        TextMode::UnitStrength { .. } => mode.user_text().map(|n| (format!("{UNIT_PREFIX}{n}"), 1)),
        TextMode::PlaceStrength { .. } => {
            mode.user_text().map(|n| (format!("{PLACE_PREFIX}{n}"), 1))
        }
        TextMode::FreeText { .. } | TextMode::CallName { .. } => {
            mode.user_text().map(|t| (t.trim().to_string(), reserved))
        }
        TextMode::FileName { .. } => mode
            .user_text()
            .map(|t| t.trim().to_string())
            .or_else(|| stem_of(task).map(|s| stem_to_text(&s)))
            .filter(|t| !t.is_empty())
            .map(|t| (t, reserved)),
        TextMode::RuleStrength | TextMode::GraphicOnly { .. } => None,
    }
}

/// Renders single artifacts
pub struct ArtifactRenderer {
    text: Arc<TextEngine>,
    rasterizer: Rasterizer,
    preparer: PrintPreparer,
    draw_guides: bool,
}

impl ArtifactRenderer {
    pub fn new(fonts: Arc<FontResolver>, rasterizer: Rasterizer) -> Self {
        Self {
            text: Arc::new(TextEngine::new(fonts.clone())),
            rasterizer,
            preparer: PrintPreparer::new(fonts),
            draw_guides: false,
        }
    }

    /// Overlay advisory cut guides on every artifact
    pub fn with_guides(mut self, draw_guides: bool) -> Self {
        self.draw_guides = draw_guides;
        self
    }

    pub fn draw_guides(&self) -> bool {
        self.draw_guides
    }

    pub fn text_engine(&self) -> &TextEngine {
        &self.text
    }

    /// Check a task before it is scheduled.
    ///
    /// Returns warnings that do not block rendering. Text that does not fit
    /// its band fails with [`RenderError::TextOverflow`].
    pub fn preflight(&self, task: &RenderTask) -> Result<Vec<String>> {
        let task = normalize(task);
        let spec = &task.spec;
        let dims = spec.dimensions()?;
        let mut warnings = Vec::new();

        if let Some(custom) = spec.custom_graphic_mm {
            for side in [custom.height, custom.width] {
                if let Some(warning) = validate_graphic_size(side, spec)? {
                    warnings.push(warning);
                }
            }
        }

        let reserved = TextEngine::reserved_lines(spec);
        if let Some((text, max_lines)) = text_to_fit(&task, reserved) {
            let panel = Compositor::panel_size(spec, &dims);
            let fit = self.text.validate_fits(spec, &text, panel.width, max_lines);
            if !fit.fits {
                return Err(RenderError::TextOverflow {
                    artifact_id: task.id.clone(),
                    message: fit
                        .warning
                        .unwrap_or_else(|| format!("needs {} lines", fit.estimated_lines)),
                });
            }
        }
        Ok(warnings)
    }

    /// Rasterize the graphic of `task` into its graphic box
    pub fn render_graphic(&self, task: &RenderTask) -> Result<Option<Pixmap>> {
        let TemplateRef::Vector(path) = &task.template else {
            return Ok(None);
        };
        let task = normalize(task);
        let spec = &task.spec;
        let dims = spec.dimensions()?;
        let target = Compositor::new(&self.text).graphic_box(spec, &dims);
        self.rasterizer
            .rasterize_px(path, target, spec.render_scale)
            .map(Some)
    }

    /// Render the panel-sized text layer of `task`
    pub fn render_text_layer(&self, task: &RenderTask) -> Result<Option<Pixmap>> {
        let task = normalize(task);
        let spec = &task.spec;
        if !spec.mode.has_text() {
            return Ok(None);
        }
        if matches!(
            task.template,
            TemplateRef::Blank(BlankKind::DualEmpty | BlankKind::DualRuled { .. })
        ) {
            return Ok(None);
        }
        let dims = spec.dimensions()?;
        Compositor::new(&self.text)
            .text_layer(spec, &dims, stem_of(&task).as_deref())
            .map(Some)
    }

    /// Render one artifact up to its print-ready raster
    pub fn render(
        &self,
        task: &RenderTask,
        arena: Option<&TemplateArena>,
    ) -> Result<(PrintReadyArtifact, StageTimings)> {
        let task = normalize(task);
        let mut timings = StageTimings::default();

        let started = Instant::now();
        let fresh;
        let graphic = match arena.and_then(|a| a.graphic_for(&task)) {
            Some(cached) => Some(cached),
            None => {
                fresh = self.render_graphic(&task)?;
                fresh.as_ref()
            }
        };
        timings.render = started.elapsed().as_secs_f64();

        let started = Instant::now();
        let text_layer = arena.and_then(|a| a.text_for(&task));
        let canvas = Compositor::new(&self.text).compose(
            &task.spec,
            &task.template,
            graphic,
            text_layer,
        )?;
        timings.compose = started.elapsed().as_secs_f64();

        let started = Instant::now();
        let artifact = self.preparer.prepare(&canvas, &task.spec, self.draw_guides)?;
        drop(canvas);
        timings.export = started.elapsed().as_secs_f64();

        debug!(
            "{}: render {:.3}s, compose {:.3}s, prepare {:.3}s",
            task.id, timings.render, timings.compose, timings.export
        );
        Ok((artifact, timings))
    }

    /// Render one artifact and write it as PNG into `output_dir`
    pub fn render_to_file(
        &self,
        task: &RenderTask,
        arena: Option<&TemplateArena>,
        output_dir: &Path,
    ) -> Result<(PathBuf, StageTimings)> {
        let (artifact, mut timings) = self.render(task, arena)?;
        let started = Instant::now();
        let path = self.export_png(&artifact, &normalize(task), output_dir)?;
        timings.export += started.elapsed().as_secs_f64();
        Ok((path, timings))
    }

    /// Write `artifact` into `output_dir`, creating the directory if needed
    pub fn export_png(
        &self,
        artifact: &PrintReadyArtifact,
        task: &RenderTask,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }
        let path = output_dir.join(output_file_name(task, artifact.has_guides));
        if path.exists() {
            warn!("Overwriting {}", path.display());
        }
        write_png(&artifact.pixmap, &path, artifact.dpi)?;
        Ok(path)
    }
}
