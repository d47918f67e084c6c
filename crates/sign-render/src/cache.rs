//! Chunk-scoped template storage
//!
//! Text bands and fitted graphics shared by several tasks of a chunk are
//! rendered once and stored in a [`TemplateArena`]. Tasks look templates up
//! by key and only ever read them; the arena is dropped at the end of the
//! chunk, which releases every buffer at once.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use tiny_skia::Pixmap;

use crate::artifact::{ArtifactSpec, RenderTask, TemplateRef};
use crate::constants::TEXT_KEY_PREFIX_CHARS;
use crate::types::{LayoutKind, TextMode};

/// Index of a buffer inside a [`TemplateArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateHandle(usize);

/// Readable part of a key; the digest keeps texts apart that collapse here
fn key_text(value: &str) -> String {
    value.trim().replace(' ', "_")
}

fn free_text_key(text: &str) -> String {
    let prefix: String = key_text(text).chars().take(TEXT_KEY_PREFIX_CHARS).collect();
    format!("txt_{prefix}")
}

fn layout_tag(layout: LayoutKind) -> &'static str {
    match layout {
        LayoutKind::SinglePanel => "s2",
        LayoutKind::DualPanel => "s1",
    }
}

/// Digest over exactly what a template buffer is rendered from
struct KeyDigest(DefaultHasher);

impl KeyDigest {
    fn new() -> Self {
        Self(DefaultHasher::new())
    }

    fn value(&mut self, value: impl Hash) -> &mut Self {
        value.hash(&mut self.0);
        self
    }

    fn mm(&mut self, value: f32) -> &mut Self {
        self.value(value.to_bits())
    }

    /// Fields that decide the panel size and the text band inside it
    fn band_geometry(&mut self, spec: &ArtifactSpec) -> &mut Self {
        self.mm(spec.finished_width_mm)
            .mm(spec.finished_height_mm)
            .mm(spec.safety_mm)
            .value(spec.dpi)
            .value(spec.layout)
            .value(&spec.font_family)
            .mm(spec.font_size_pt)
            .mm(spec.text_bottom_offset_mm)
            .value(spec.dual_panel)
    }

    fn finish(&self) -> u64 {
        self.0.finish()
    }
}

/// Key of the text band of `task`, or `None` when it has no text.
///
/// Two tasks share a key only when their bands are rendered from the same
/// text, font and geometry.
pub fn text_key(task: &RenderTask) -> Option<String> {
    let spec = &task.spec;
    let mut digest = KeyDigest::new();
    digest
        .band_geometry(spec)
        .value(spec.unit_placeholder_len)
        .value(spec.call_placeholder_len)
        .value(spec.strength_digits);

    let (specific, raw) = match &spec.mode {
        TextMode::UnitStrength { unit_name } => match unit_name {
            Some(name) => (format!("ov_{}", key_text(name)), Some(name.as_str())),
            None => ("platzhalter".to_string(), None),
        },
        TextMode::PlaceStrength { place_name } => match place_name {
            Some(name) => (format!("ort_{}", key_text(name)), Some(name.as_str())),
            None => ("platzhalter".to_string(), None),
        },
        TextMode::RuleStrength => ("linie".to_string(), None),
        TextMode::FreeText { text } => match text {
            Some(text) => (free_text_key(text), Some(text.as_str())),
            None => ("platzhalter".to_string(), None),
        },
        TextMode::CallName { name } => match name {
            Some(name) => (format!("ruf_{}", key_text(name)), Some(name.as_str())),
            None => ("platzhalter".to_string(), None),
        },
        TextMode::FileName { override_text } => {
            // The band shows the stem, so equal stems share one band
            let stem = task.template.id();
            let source = match (override_text, &task.template) {
                (Some(text), _) => Some(text.as_str()),
                (None, TemplateRef::Vector(_)) => Some(stem.as_str()),
                (None, TemplateRef::Blank(_)) => None,
            }
            .filter(|s| !s.trim().is_empty());
            digest.value(source);
            match source {
                Some(source) => (format!("fname_{}", key_text(source)), None),
                None => ("platzhalter".to_string(), None),
            }
        }
        TextMode::GraphicOnly { .. } => return None,
    };
    digest.value(spec.mode.tag()).value(raw);

    Some(format!(
        "{}_{}pt_{}dpi_{}_{}_{:016x}",
        spec.mode.tag(),
        spec.font_size_pt,
        spec.dpi,
        layout_tag(spec.layout),
        specific,
        digest.finish()
    ))
}

/// Key of the fitted graphic of `task`, or `None` for blanks.
///
/// The template path is part of the key as given, so equal file names in
/// different directories never share a graphic.
pub fn graphic_key(task: &RenderTask) -> Option<String> {
    let TemplateRef::Vector(path) = &task.template else {
        return None;
    };
    let spec = &task.spec;
    let mut digest = KeyDigest::new();
    digest
        .value(path)
        .band_geometry(spec)
        .value(spec.mode.has_text())
        .mm(spec.graphic_text_gap_mm)
        .value(spec.render_scale.map(f32::to_bits))
        .value(spec.custom_graphic_mm.map(|c| (c.width.to_bits(), c.height.to_bits())));
    if let TextMode::GraphicOnly { position } = spec.mode {
        digest.value(position);
    }

    let mut key = format!("{}_{}dpi_{}", task.template.id(), spec.dpi, spec.mode.tag());
    if let TextMode::GraphicOnly { position } = spec.mode {
        key.push_str(&format!("_pos_{}", position.tag()));
    }
    if let Some(custom) = spec.custom_graphic_mm {
        key.push_str(&format!("_{}x{}mm", custom.width, custom.height));
    }
    if spec.layout == LayoutKind::DualPanel {
        key.push_str(&format!("_s1_{}", spec.dual_panel.left_percent));
    }
    key.push_str(&format!("_{:016x}", digest.finish()));
    Some(key)
}

/// Read-only template buffers of one chunk
#[derive(Default)]
pub struct TemplateArena {
    buffers: Vec<Pixmap>,
    text: HashMap<String, TemplateHandle>,
    graphic: HashMap<String, TemplateHandle>,
}

impl std::fmt::Debug for TemplateArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateArena")
            .field("text", &self.text.len())
            .field("graphic", &self.graphic.len())
            .finish()
    }
}

impl TemplateArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, pixmap: Pixmap) -> TemplateHandle {
        self.buffers.push(pixmap);
        TemplateHandle(self.buffers.len() - 1)
    }

    pub fn insert_text(&mut self, key: String, pixmap: Pixmap) -> TemplateHandle {
        let handle = self.push(pixmap);
        self.text.insert(key, handle);
        handle
    }

    pub fn insert_graphic(&mut self, key: String, pixmap: Pixmap) -> TemplateHandle {
        let handle = self.push(pixmap);
        self.graphic.insert(key, handle);
        handle
    }

    pub fn get(&self, handle: TemplateHandle) -> Option<&Pixmap> {
        self.buffers.get(handle.0)
    }

    pub fn text_handle(&self, key: &str) -> Option<TemplateHandle> {
        self.text.get(key).copied()
    }

    pub fn graphic_handle(&self, key: &str) -> Option<TemplateHandle> {
        self.graphic.get(key).copied()
    }

    /// Text band template for `task`
    pub fn text_for(&self, task: &RenderTask) -> Option<&Pixmap> {
        let key = text_key(task)?;
        self.text_handle(&key).and_then(|h| self.get(h))
    }

    /// Fitted graphic template for `task`
    pub fn graphic_for(&self, task: &RenderTask) -> Option<&Pixmap> {
        let key = graphic_key(task)?;
        self.graphic_handle(&key).and_then(|h| self.get(h))
    }

    pub fn text_count(&self) -> usize {
        self.text.len()
    }

    pub fn graphic_count(&self) -> usize {
        self.graphic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Bytes held by all buffers
    pub fn byte_size(&self) -> usize {
        self.buffers.iter().map(|p| p.data().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactSpec, BlankKind};
    use crate::dimensions::SizeMm;
    use crate::types::GraphicPosition;

    fn task(template: &str, mode: TextMode) -> RenderTask {
        RenderTask::new(
            TemplateRef::parse(template),
            ArtifactSpec::default().with_mode(mode),
        )
    }

    fn free_text(text: &str) -> TextMode {
        TextMode::FreeText {
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn test_text_key_shared_across_templates() {
        let a = task("a/Zugtrupp.svg", TextMode::UnitStrength { unit_name: None });
        let b = task("b/Bergung.svg", TextMode::UnitStrength { unit_name: None });
        assert_eq!(text_key(&a), text_key(&b));
        let key = text_key(&a).unwrap();
        assert!(key.starts_with("ov_staerke_8pt_600dpi_s2_platzhalter_"));
    }

    #[test]
    fn test_text_key_truncates_free_text() {
        let t = task("x.svg", free_text("Technische Einsatzleitung Nord"));
        let key = text_key(&t).unwrap();
        assert!(key.contains("txt_Technische_Einsatzle_"));

        let other = task("x.svg", free_text("Technische Einsatzleitung Sued"));
        assert_ne!(text_key(&other), Some(key));
    }

    #[test]
    fn test_text_key_keeps_spaces_apart_from_underscores() {
        let spaced = task("x.svg", free_text("Zug 1"));
        let underscored = task("x.svg", free_text("Zug_1"));
        assert_ne!(text_key(&spaced), text_key(&underscored));
    }

    #[test]
    fn test_text_key_follows_band_geometry() {
        let base = task("x.svg", free_text("Zug 1"));
        let key = text_key(&base);

        let mut safety = base.clone();
        safety.spec.safety_mm = 8.0;
        assert_ne!(text_key(&safety), key);

        let mut offset = base.clone();
        offset.spec.text_bottom_offset_mm += 1.0;
        assert_ne!(text_key(&offset), key);

        let mut digits = task("x.svg", TextMode::UnitStrength { unit_name: None });
        let digits_key = text_key(&digits);
        digits.spec.strength_digits = [2, 2, 2, 2];
        assert_ne!(text_key(&digits), digits_key);

        let mut call = task("x.svg", TextMode::CallName { name: None });
        let call_key = text_key(&call);
        call.spec.call_placeholder_len += 4;
        assert_ne!(text_key(&call), call_key);

        let mut dual = base.clone();
        dual.spec.layout = LayoutKind::DualPanel;
        dual.spec.finished_width_mm = 2.0 * dual.spec.finished_height_mm;
        let dual_key = text_key(&dual);
        dual.spec.dual_panel.left_percent = 60;
        assert_ne!(text_key(&dual), dual_key);

        // Bleed only pads the finished artifact
        let mut bleed = base.clone();
        bleed.spec.bleed_mm = 5.0;
        assert_eq!(text_key(&bleed), key);
    }

    #[test]
    fn test_file_name_key_uses_stem() {
        let file_name = TextMode::FileName {
            override_text: None,
        };
        let a = task("a/Kran_30t.svg", file_name.clone());
        let b = task("b/Kran_30t.svg", file_name);
        assert!(text_key(&a).unwrap().contains("fname_Kran_30t_"));
        assert_eq!(text_key(&a), text_key(&b));
    }

    #[test]
    fn test_graphic_only_has_no_text_key() {
        let t = task(
            "x.svg",
            TextMode::GraphicOnly {
                position: GraphicPosition::Top,
            },
        );
        assert_eq!(text_key(&t), None);
        assert!(graphic_key(&t).unwrap().contains("_pos_oben"));
    }

    #[test]
    fn test_graphic_key_components() {
        let mut t = task("signs/Pumpe.svg", TextMode::RuleStrength);
        t.spec.custom_graphic_mm = Some(SizeMm::new(20.0, 15.0));
        let key = graphic_key(&t).unwrap();
        assert!(key.starts_with("Pumpe_600dpi_schreiblinie_staerke_20x15mm_"));

        let blank = RenderTask::new(
            TemplateRef::Blank(BlankKind::DualEmpty),
            ArtifactSpec::default(),
        );
        assert_eq!(graphic_key(&blank), None);
    }

    #[test]
    fn test_graphic_key_separates_equal_stems() {
        let a = task("a/Pumpe.svg", TextMode::RuleStrength);
        let b = task("b/Pumpe.svg", TextMode::RuleStrength);
        assert_ne!(graphic_key(&a), graphic_key(&b));
    }

    #[test]
    fn test_graphic_key_shared_across_texts() {
        let a = task("Pumpe.svg", free_text("Zug 1"));
        let b = task("Pumpe.svg", free_text("Zug 2"));
        assert_eq!(graphic_key(&a), graphic_key(&b));

        let mut gap = b.clone();
        gap.spec.graphic_text_gap_mm += 1.0;
        assert_ne!(graphic_key(&gap), graphic_key(&a));

        let mut safety = b.clone();
        safety.spec.safety_mm = 8.0;
        assert_ne!(graphic_key(&safety), graphic_key(&a));
    }

    #[test]
    fn test_arena_lookup() {
        let t = task("Pumpe.svg", TextMode::RuleStrength);
        let mut arena = TemplateArena::new();
        assert!(arena.is_empty());
        let handle = arena.insert_graphic(graphic_key(&t).unwrap(), Pixmap::new(3, 2).unwrap());
        assert_eq!(arena.graphic_handle(&graphic_key(&t).unwrap()), Some(handle));
        assert_eq!(arena.graphic_for(&t).map(|p| p.width()), Some(3));
        assert!(arena.text_for(&t).is_none());
        assert_eq!(arena.byte_size(), 24);
    }
}
