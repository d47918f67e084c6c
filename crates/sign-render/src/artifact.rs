use std::path::{Path, PathBuf};

use crate::constants::{
    BLANK_DUAL_EMPTY, BLANK_DUAL_RULED, BLANK_DUAL_RULED_STRENGTH, BLANK_PREFIX,
    DEFAULT_BLEED_MM, DEFAULT_CALL_PLACEHOLDER_LEN, DEFAULT_DPI, DEFAULT_FINISHED_HEIGHT_MM,
    DEFAULT_FINISHED_WIDTH_MM, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE_PT,
    DEFAULT_GRAPHIC_TEXT_GAP_MM, DEFAULT_LEFT_PERCENT, DEFAULT_RULE_COUNT, DEFAULT_SAFETY_MM,
    DEFAULT_STRENGTH_DIGITS, DEFAULT_TEXT_BOTTOM_OFFSET_MM, DEFAULT_UNIT_PLACEHOLDER_LEN,
};
use crate::dimensions::{Dimensions, SizeMm};
use crate::types::{LayoutKind, Result, TextMode};

/// Options of the right-hand ruled panel of a dual-panel artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DualPanelOptions {
    /// Share of the canvas width given to the left panel (20-80)
    pub left_percent: u8,
    /// Number of rule lines on the right panel (3-10)
    pub rule_count: u8,
    /// Replace the topmost rule with the strength indicator
    pub show_strength: bool,
}

impl Default for DualPanelOptions {
    fn default() -> Self {
        Self {
            left_percent: DEFAULT_LEFT_PERCENT,
            rule_count: DEFAULT_RULE_COUNT,
            show_strength: true,
        }
    }
}

/// Everything needed to render one artifact.
///
/// Created by the caller per task and never mutated afterwards; all pixel
/// sizes are derived on demand through [`ArtifactSpec::dimensions`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSpec {
    pub finished_height_mm: f32,
    pub finished_width_mm: f32,
    pub safety_mm: f32,
    pub bleed_mm: f32,
    pub dpi: u32,
    pub layout: LayoutKind,
    pub mode: TextMode,
    pub font_family: String,
    pub font_size_pt: f32,
    /// Underscores used for empty unit / free-text placeholders
    pub unit_placeholder_len: usize,
    /// Underscores used for the empty call-name placeholder
    pub call_placeholder_len: usize,
    /// Digits per strength group
    pub strength_digits: [u8; 4],
    pub graphic_text_gap_mm: f32,
    pub text_bottom_offset_mm: f32,
    /// Optional cap on the graphic box (height, width)
    pub custom_graphic_mm: Option<SizeMm>,
    pub dual_panel: DualPanelOptions,
    /// Fixed supersampling factor; chosen from the target size when `None`
    pub render_scale: Option<f32>,
}

impl Default for ArtifactSpec {
    fn default() -> Self {
        Self {
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
            strength_digits: DEFAULT_STRENGTH_DIGITS,
            graphic_text_gap_mm: DEFAULT_GRAPHIC_TEXT_GAP_MM,
            text_bottom_offset_mm: DEFAULT_TEXT_BOTTOM_OFFSET_MM,
            custom_graphic_mm: None,
            dual_panel: DualPanelOptions::default(),
            render_scale: None,
        }
    }
}

impl ArtifactSpec {
    pub fn dimensions(&self) -> Result<Dimensions> {
        Dimensions::derive(
            self.finished_width_mm,
            self.finished_height_mm,
            self.safety_mm,
            self.bleed_mm,
            self.dpi,
        )
    }

    pub fn is_dual_panel(&self) -> bool {
        self.layout == LayoutKind::DualPanel
    }

    /// Largest finished side, used for chunk sizing
    pub fn max_finished_mm(&self) -> f32 {
        self.finished_height_mm.max(self.finished_width_mm)
    }

    /// Copy of this spec with a different text mode
    pub fn with_mode(&self, mode: TextMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

/// Built-in artifacts that need no template file
#[derive(Debug, Clone, PartialEq)]
pub enum BlankKind {
    /// Single-panel blank rendering only the text of the given mode
    Single(TextMode),
    /// Dual-panel blank without any content
    DualEmpty,
    /// Dual-panel blank with rule lines on both panels
    DualRuled { strength: bool },
}

impl BlankKind {
    /// Parse a virtual blank identifier such as `BLANKO_ruf` or `BLANKO_S1_LEER`
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            BLANK_DUAL_EMPTY => return Some(BlankKind::DualEmpty),
            BLANK_DUAL_RULED => return Some(BlankKind::DualRuled { strength: false }),
            BLANK_DUAL_RULED_STRENGTH => return Some(BlankKind::DualRuled { strength: true }),
            _ => {}
        }
        let tag = id.strip_prefix(BLANK_PREFIX)?;
        TextMode::from_tag(tag).map(BlankKind::Single)
    }

    pub fn id(&self) -> String {
        match self {
            BlankKind::Single(mode) => format!("{BLANK_PREFIX}{}", mode.tag()),
            BlankKind::DualEmpty => BLANK_DUAL_EMPTY.to_string(),
            BlankKind::DualRuled { strength: false } => BLANK_DUAL_RULED.to_string(),
            BlankKind::DualRuled { strength: true } => BLANK_DUAL_RULED_STRENGTH.to_string(),
        }
    }

    pub fn is_dual_panel(&self) -> bool {
        !matches!(self, BlankKind::Single(_))
    }

    /// Strength indicator flag forced by a dual-panel blank
    pub fn forced_strength(&self) -> Option<bool> {
        match self {
            BlankKind::Single(_) => None,
            BlankKind::DualEmpty => Some(false),
            BlankKind::DualRuled { strength } => Some(*strength),
        }
    }
}

/// Source of an artifact's graphic
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateRef {
    /// Vector template on disk
    Vector(PathBuf),
    /// Virtual blank, never touches the filesystem
    Blank(BlankKind),
}

impl TemplateRef {
    /// Interpret a user-supplied identifier: blanks by name, everything else as a path
    pub fn parse(value: &str) -> Self {
        match BlankKind::parse(value) {
            Some(kind) => TemplateRef::Blank(kind),
            None => TemplateRef::Vector(PathBuf::from(value)),
        }
    }

    /// Identifier used in output names and template keys
    pub fn id(&self) -> String {
        match self {
            TemplateRef::Vector(path) => file_stem(path),
            TemplateRef::Blank(kind) => kind.id(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, TemplateRef::Blank(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            TemplateRef::Vector(path) => Some(path),
            TemplateRef::Blank(_) => None,
        }
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One unit of batch work
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTask {
    /// Identifier of this artifact, unique within a batch
    pub id: String,
    pub template: TemplateRef,
    pub spec: ArtifactSpec,
}

impl RenderTask {
    pub fn new(template: TemplateRef, spec: ArtifactSpec) -> Self {
        Self {
            id: template.id(),
            template,
            spec,
        }
    }

    /// Task with an explicit id, e.g. for repeated copies of one template
    pub fn with_id(id: impl Into<String>, template: TemplateRef, spec: ArtifactSpec) -> Self {
        Self {
            id: id.into(),
            template,
            spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GraphicPosition;

    #[test]
    fn test_parse_single_blank() {
        assert_eq!(
            BlankKind::parse("BLANKO_ruf"),
            Some(BlankKind::Single(TextMode::CallName { name: None }))
        );
        assert_eq!(
            BlankKind::parse("BLANKO_ohne_text"),
            Some(BlankKind::Single(TextMode::GraphicOnly {
                position: GraphicPosition::Center
            }))
        );
        assert_eq!(BlankKind::parse("BLANKO_unknown"), None);
        assert_eq!(BlankKind::parse("truck"), None);
    }

    #[test]
    fn test_parse_dual_blanks() {
        assert_eq!(BlankKind::parse("BLANKO_S1_LEER"), Some(BlankKind::DualEmpty));
        assert_eq!(
            BlankKind::parse("BLANKO_S1_LINIEN"),
            Some(BlankKind::DualRuled { strength: false })
        );
        assert_eq!(
            BlankKind::parse("BLANKO_S1_LINIEN_STAERKE"),
            Some(BlankKind::DualRuled { strength: true })
        );
    }

    #[test]
    fn test_forced_strength() {
        assert_eq!(BlankKind::DualEmpty.forced_strength(), Some(false));
        assert_eq!(
            BlankKind::DualRuled { strength: false }.forced_strength(),
            Some(false)
        );
        assert_eq!(
            BlankKind::DualRuled { strength: true }.forced_strength(),
            Some(true)
        );
        assert_eq!(
            BlankKind::Single(TextMode::RuleStrength).forced_strength(),
            None
        );
    }

    #[test]
    fn test_template_ref_ids() {
        let vector = TemplateRef::parse("/signs/Zugtrupp_TEL.svg");
        assert_eq!(vector.id(), "Zugtrupp_TEL");
        assert!(!vector.is_blank());

        let blank = TemplateRef::parse("BLANKO_S1_LINIEN");
        assert_eq!(blank.id(), "BLANKO_S1_LINIEN");
        assert!(blank.is_blank());
        assert!(blank.path().is_none());
    }

    #[test]
    fn test_spec_dimensions_use_fields() {
        let spec = ArtifactSpec {
            finished_width_mm: 90.0,
            layout: LayoutKind::DualPanel,
            ..ArtifactSpec::default()
        };
        let dims = spec.dimensions().unwrap();
        assert!(dims.is_dual_panel());
        assert_eq!(spec.max_finished_mm(), 90.0);
    }
}
