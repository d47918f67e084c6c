//! Print-calibrated rendering of tactical signs
//!
//! A [`RenderTask`] pairs a vector template (or a virtual blank) with an
//! [`ArtifactSpec`]. The [`ArtifactRenderer`] turns one task into a
//! [`PrintReadyArtifact`]; the [`BatchRunner`] runs many tasks in
//! memory-bounded chunks and writes them as PNG files.

pub mod artifact;
pub mod batch;
pub mod cache;
pub mod compose;
pub mod constants;
pub mod dimensions;
pub mod fonts;
mod options;
pub mod pixels;
pub mod print_prep;
pub mod rasterizer;
pub mod render;
mod stats;
pub mod text;
mod types;

pub use artifact::{ArtifactSpec, BlankKind, DualPanelOptions, RenderTask, TemplateRef};
pub use batch::{
    BatchJob, BatchProgress, BatchReport, BatchRunner, ChunkSummary, PreflightReport,
    estimate_duration, format_duration,
};
pub use cache::{TemplateArena, TemplateHandle};
pub use dimensions::{Dimensions, SizeMm, SizePx, is_dual_panel, mm_to_px, px_to_mm};
pub use fonts::{FontProvider, FontResolver, StaticFontProvider, SystemFontProvider};
pub use options::*;
pub use print_prep::{PrintPreparer, PrintReadyArtifact};
pub use rasterizer::Rasterizer;
pub use render::{ArtifactRenderer, output_file_name};
pub use stats::{calculate_statistics, template_base};
pub use text::TextEngine;
pub use types::*;
