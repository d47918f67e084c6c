use crate::artifact::{ArtifactSpec, DualPanelOptions, RenderTask, TemplateRef};
use crate::batch::{BatchJob, default_threads};
use crate::constants::*;
use crate::dimensions::SizeMm;
use crate::types::*;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete export configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ExportOptions {
    // Input: template paths or blank identifiers
    pub templates: Vec<String>,
    /// Artifacts per template; copies get `_1`, `_2`, ... appended to their id
    pub copies: usize,

    // Output
    pub output_dir: PathBuf,
    pub draw_guides: bool,

    // Geometry
    pub finished_height_mm: f32,
    pub finished_width_mm: f32,
    pub safety_mm: f32,
    pub bleed_mm: f32,
    pub dpi: u32,
    pub layout: LayoutKind,

    // Text
    pub mode: TextMode,
    pub font_family: String,
    pub font_size_pt: f32,
    pub unit_placeholder_len: usize,
    pub call_placeholder_len: usize,
    pub strength_digits: Vec<u8>,
    pub graphic_text_gap_mm: f32,
    pub text_bottom_offset_mm: f32,

    // Graphic
    pub custom_graphic_mm: Option<SizeMm>,
    pub render_scale: Option<f32>,

    // Dual panel
    pub dual_panel: DualPanelOptions,

    // Scheduling
    pub threads: usize,
    pub chunk_size: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            copies: 1,
            output_dir: PathBuf::from("export"),
            draw_guides: false,
            finished_height_mm: DEFAULT_FINISHED_HEIGHT_MM,
            finished_width_mm: DEFAULT_FINISHED_WIDTH_MM,
            safety_mm: DEFAULT_SAFETY_MM,
            bleed_mm: DEFAULT_BLEED_MM,
            dpi: DEFAULT_DPI,
            layout: LayoutKind::SinglePanel,
            mode: TextMode::default(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size_pt: DEFAULT_FONT_SIZE_PT,
            unit_placeholder_len: DEFAULT_UNIT_PLACEHOLDER_LEN,
            call_placeholder_len: DEFAULT_CALL_PLACEHOLDER_LEN,
            strength_digits: DEFAULT_STRENGTH_DIGITS.to_vec(),
            graphic_text_gap_mm: DEFAULT_GRAPHIC_TEXT_GAP_MM,
            text_bottom_offset_mm: DEFAULT_TEXT_BOTTOM_OFFSET_MM,
            custom_graphic_mm: None,
            render_scale: None,
            dual_panel: DualPanelOptions::default(),
            threads: default_threads(),
            chunk_size: None,
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(name: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        return Err(RenderError::Config(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

impl ExportOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options = serde_json::from_slice(&bytes)
            .map_err(|e| RenderError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RenderError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        check_range("Font size (pt)", self.font_size_pt, 6.0, 200.0)?;
        if !SUPPORTED_DPIS.contains(&self.dpi) {
            return Err(RenderError::Config(format!(
                "DPI must be one of {:?}, got {}",
                SUPPORTED_DPIS, self.dpi
            )));
        }

        check_range("Height (mm)", self.finished_height_mm, 10.0, 500.0)?;
        check_range("Width (mm)", self.finished_width_mm, 10.0, 500.0)?;
        check_range("Bleed (mm)", self.bleed_mm, 0.0, 20.0)?;
        check_range("Safety margin (mm)", self.safety_mm, 0.0, 20.0)?;
        check_range("Graphic/text gap (mm)", self.graphic_text_gap_mm, 0.0, 20.0)?;
        check_range("Text bottom offset (mm)", self.text_bottom_offset_mm, 0.0, 10.0)?;
        check_range("Unit placeholder length", self.unit_placeholder_len, 8, 64)?;
        check_range("Call placeholder length", self.call_placeholder_len, 8, 64)?;

        if self.strength_digits.len() != 4 {
            return Err(RenderError::Config(format!(
                "Strength needs exactly 4 groups, got {}",
                self.strength_digits.len()
            )));
        }
        for digits in &self.strength_digits {
            check_range("Strength digits", *digits, 1, 20)?;
        }

        check_range("Left panel share (%)", self.dual_panel.left_percent, 20, 80)?;
        check_range("Rule lines", self.dual_panel.rule_count, 3, 10)?;

        let min_side = self.finished_height_mm.min(self.finished_width_mm);
        if min_side - 2.0 * self.safety_mm <= 0.0 {
            return Err(RenderError::Config(format!(
                "Safety margin of {}mm leaves no canvas on {}x{}mm",
                self.safety_mm, self.finished_width_mm, self.finished_height_mm
            )));
        }

        if let Some(scale) = self.render_scale {
            check_range("Render scale", scale, 1.0, 4.0)?;
        }
        if self.threads == 0 {
            return Err(RenderError::Config("Thread count must be at least 1".to_string()));
        }
        if self.copies == 0 {
            return Err(RenderError::Config("Copies must be at least 1".to_string()));
        }

        Ok(())
    }

    /// The artifact spec shared by every task of this export
    pub fn spec(&self) -> ArtifactSpec {
        let mut strength_digits = DEFAULT_STRENGTH_DIGITS;
        for (slot, value) in strength_digits.iter_mut().zip(&self.strength_digits) {
            *slot = *value;
        }
        ArtifactSpec {
            finished_height_mm: self.finished_height_mm,
            finished_width_mm: self.finished_width_mm,
            safety_mm: self.safety_mm,
            bleed_mm: self.bleed_mm,
            dpi: self.dpi,
            layout: self.layout,
            mode: self.mode.clone(),
            font_family: self.font_family.clone(),
            font_size_pt: self.font_size_pt,
            unit_placeholder_len: self.unit_placeholder_len,
            call_placeholder_len: self.call_placeholder_len,
            strength_digits,
            graphic_text_gap_mm: self.graphic_text_gap_mm,
            text_bottom_offset_mm: self.text_bottom_offset_mm,
            custom_graphic_mm: self.custom_graphic_mm,
            dual_panel: self.dual_panel,
            render_scale: self.render_scale,
        }
    }

    /// One task per template and copy, in template order
    pub fn tasks(&self) -> Vec<RenderTask> {
        let spec = self.spec();
        let mut tasks = Vec::with_capacity(self.templates.len() * self.copies.max(1));
        for template in &self.templates {
            let template = TemplateRef::parse(template);
            if self.copies <= 1 {
                tasks.push(RenderTask::new(template, spec.clone()));
                continue;
            }
            for copy in 1..=self.copies {
                let id = format!("{}_{}", template.id(), copy);
                tasks.push(RenderTask::with_id(id, template.clone(), spec.clone()));
            }
        }
        tasks
    }

    /// Batch job for these options
    pub fn job(&self) -> BatchJob {
        let mut job = BatchJob::new(self.tasks(), self.output_dir.clone()).with_threads(self.threads);
        job.chunk_size = self.chunk_size;
        job
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;

    impl Serialize for LayoutKind {
        fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            let s = match self {
                LayoutKind::SinglePanel => "single_panel",
                LayoutKind::DualPanel => "dual_panel",
            };
            serializer.serialize_str(s)
        }
    }

    impl<'de> Deserialize<'de> for LayoutKind {
        fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            match s.as_str() {
                "single_panel" | "s2" => Ok(LayoutKind::SinglePanel),
                "dual_panel" | "s1" => Ok(LayoutKind::DualPanel),
                _ => Err(serde::de::Error::custom("Unknown layout kind")),
            }
        }
    }
} // end of serde_impls module
