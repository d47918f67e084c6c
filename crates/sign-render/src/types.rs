use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PNG encoding error: {0}")]
    PngEncoding(#[from] png::EncodingError),
    #[error("Template '{}' could not be rendered: {message}", path.display())]
    Template { path: PathBuf, message: String },
    #[error("Text does not fit on '{artifact_id}': {message}")]
    TextOverflow {
        artifact_id: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Pixel buffer of {width}x{height}px could not be allocated")]
    Allocation { width: u32, height: u32 },
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    pub(crate) fn template(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RenderError::Template {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// RGBA color with straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub(crate) fn to_skia(self) -> tiny_skia::Color {
        let [r, g, b, a] = self.0;
        tiny_skia::Color::from_rgba8(r, g, b, a)
    }
}

impl From<[u8; 4]> for Rgba {
    fn from(value: [u8; 4]) -> Self {
        Rgba(value)
    }
}

/// Where a graphic-only artifact anchors its graphic vertically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphicPosition {
    #[cfg_attr(feature = "serde", serde(rename = "oben"))]
    Top,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "mittig"))]
    Center,
    #[cfg_attr(feature = "serde", serde(rename = "unten"))]
    Bottom,
}

impl GraphicPosition {
    pub fn tag(self) -> &'static str {
        match self {
            GraphicPosition::Top => "oben",
            GraphicPosition::Center => "mittig",
            GraphicPosition::Bottom => "unten",
        }
    }

    /// Vertical offset of a graphic of `graphic_h` inside a canvas of `canvas_h`
    pub fn offset(self, canvas_h: u32, graphic_h: u32) -> u32 {
        let free = canvas_h.saturating_sub(graphic_h);
        match self {
            GraphicPosition::Top => 0,
            GraphicPosition::Center => free / 2,
            GraphicPosition::Bottom => free,
        }
    }
}

/// Panel structure of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutKind {
    /// One artwork area: graphic on top, text band below
    #[default]
    SinglePanel,
    /// 2:1 artifact: artwork panel on the left, ruled panel on the right
    DualPanel,
}

/// Text content of an artifact.
///
/// Every variant carries its own payload; the persisted tag doubles as the
/// mode component of exported file names.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "mode")
)]
pub enum TextMode {
    /// "OV: <name>" over a strength placeholder
    #[cfg_attr(feature = "serde", serde(rename = "ov_staerke"))]
    UnitStrength { unit_name: Option<String> },
    /// "Ort: <name>" over a strength placeholder
    #[cfg_attr(feature = "serde", serde(rename = "ort_staerke"))]
    PlaceStrength { place_name: Option<String> },
    /// Drawn writing rule over a strength placeholder
    #[cfg_attr(feature = "serde", serde(rename = "schreiblinie_staerke"))]
    RuleStrength,
    /// User text, or a fill placeholder
    #[cfg_attr(feature = "serde", serde(rename = "freitext"))]
    FreeText { text: Option<String> },
    /// Call name, or "Ruf: " with a fill placeholder
    #[cfg_attr(feature = "serde", serde(rename = "ruf"))]
    CallName { name: Option<String> },
    /// Text derived from the template file name
    #[cfg_attr(feature = "serde", serde(rename = "dateiname"))]
    FileName { override_text: Option<String> },
    /// No text; the graphic fills the canvas
    #[cfg_attr(feature = "serde", serde(rename = "ohne_text"))]
    GraphicOnly { position: GraphicPosition },
}

impl Default for TextMode {
    fn default() -> Self {
        TextMode::UnitStrength { unit_name: None }
    }
}

impl TextMode {
    /// Persisted tag, also used in output file names
    pub fn tag(&self) -> &'static str {
        match self {
            TextMode::UnitStrength { .. } => "ov_staerke",
            TextMode::PlaceStrength { .. } => "ort_staerke",
            TextMode::RuleStrength => "schreiblinie_staerke",
            TextMode::FreeText { .. } => "freitext",
            TextMode::CallName { .. } => "ruf",
            TextMode::FileName { .. } => "dateiname",
            TextMode::GraphicOnly { .. } => "ohne_text",
        }
    }

    /// Build a mode without payload from its tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        let mode = match tag {
            "ov_staerke" => TextMode::UnitStrength { unit_name: None },
            "ort_staerke" => TextMode::PlaceStrength { place_name: None },
            "schreiblinie_staerke" => TextMode::RuleStrength,
            "freitext" => TextMode::FreeText { text: None },
            "ruf" => TextMode::CallName { name: None },
            "dateiname" => TextMode::FileName {
                override_text: None,
            },
            "ohne_text" => TextMode::GraphicOnly {
                position: GraphicPosition::default(),
            },
            _ => return None,
        };
        Some(mode)
    }

    pub fn has_text(&self) -> bool {
        !matches!(self, TextMode::GraphicOnly { .. })
    }

    /// User-supplied text, if any
    pub fn user_text(&self) -> Option<&str> {
        match self {
            TextMode::UnitStrength { unit_name } => unit_name.as_deref(),
            TextMode::PlaceStrength { place_name } => place_name.as_deref(),
            TextMode::FreeText { text } => text.as_deref(),
            TextMode::CallName { name } => name.as_deref(),
            TextMode::FileName { override_text } => override_text.as_deref(),
            TextMode::RuleStrength | TextMode::GraphicOnly { .. } => None,
        }
        .filter(|text| !text.trim().is_empty())
    }
}

/// Timing of one rendered artifact, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageTimings {
    /// Template rasterization (zero when served from cache)
    pub render: f64,
    /// Composition of graphic, text and rules
    pub compose: f64,
    /// Margins, bleed and file output
    pub export: f64,
}

/// Min / max / average of one timing series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Statistics about a finished batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchStatistics {
    /// Number of submitted tasks
    pub total: usize,
    /// Tasks that produced an artifact
    pub succeeded: usize,
    /// Tasks recorded in the error list
    pub failed: usize,
    /// Distinct templates, ignoring per-copy suffixes on artifact ids
    pub unique_templates: usize,
    /// Number of chunks processed
    pub chunks: usize,
    pub render: TimingSummary,
    pub compose: TimingSummary,
    pub export: TimingSummary,
    /// Wall-clock duration of the whole batch in seconds
    pub elapsed: f64,
}
