//! Font discovery and glyph rendering
//!
//! Font availability is an injected capability: a [`FontProvider`] answers
//! whether a family exists and hands out its bytes. The system provider
//! scans the platform font directories once when it is constructed; nothing
//! in this module keeps global state.
//!
//! When no listed family can be loaded, text falls back to the built-in
//! stroke typeface. It only knows the characters that placeholders are made
//! of and draws a box for everything else, which keeps rendering working
//! (and deterministic in tests) on machines without any fonts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};
use ttf_parser::{Face, OutlineBuilder};

use crate::constants::FONT_PRIORITY_LIST;
use crate::pixels::stroke_line;
use crate::types::Rgba;

/// Environment variable naming an extra font directory
pub const FONT_DIR_ENV: &str = "TZG_FONT_DIR";

const GENERIC_SANS: &str = "sans-serif";
const GENERIC_SANS_CANDIDATES: [&str; 4] = ["dejavu sans", "liberation sans", "arial", "helvetica"];
const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

/// Raw font file contents plus the face index inside collections
#[derive(Clone)]
pub struct FontData {
    pub bytes: Arc<Vec<u8>>,
    pub index: u32,
}

impl std::fmt::Debug for FontData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontData")
            .field("len", &self.bytes.len())
            .field("index", &self.index)
            .finish()
    }
}

/// Answers font availability queries
pub trait FontProvider: Send + Sync {
    fn is_available(&self, family: &str) -> bool;
    fn load(&self, family: &str) -> Option<FontData>;
}

/// Provider backed by in-memory fonts
#[derive(Debug, Default, Clone)]
pub struct StaticFontProvider {
    fonts: HashMap<String, FontData>,
}

impl StaticFontProvider {
    /// Provider without any fonts; everything resolves to the built-in typeface
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, family: &str, bytes: Vec<u8>) -> Self {
        self.fonts.insert(
            family.to_lowercase(),
            FontData {
                bytes: Arc::new(bytes),
                index: 0,
            },
        );
        self
    }
}

impl FontProvider for StaticFontProvider {
    fn is_available(&self, family: &str) -> bool {
        self.fonts.contains_key(&family.to_lowercase())
    }

    fn load(&self, family: &str) -> Option<FontData> {
        self.fonts.get(&family.to_lowercase()).cloned()
    }
}

#[derive(Debug, Clone)]
struct FaceLocation {
    path: PathBuf,
    index: u32,
    regular: bool,
}

/// Provider backed by the fonts installed on this machine
#[derive(Debug, Default)]
pub struct SystemFontProvider {
    families: HashMap<String, FaceLocation>,
}

impl SystemFontProvider {
    /// Scan the platform font directories and `TZG_FONT_DIR`
    pub fn new() -> Self {
        let mut dirs = platform_font_dirs();
        if let Some(extra) = std::env::var_os(FONT_DIR_ENV) {
            dirs.insert(0, PathBuf::from(extra));
        }
        Self::scan(&dirs)
    }

    /// Build an index from the given directories only
    pub fn scan(dirs: &[PathBuf]) -> Self {
        let mut provider = Self::default();
        let mut files = Vec::new();
        for dir in dirs {
            collect_font_files(dir, &mut files);
        }
        for file in &files {
            provider.index_file(file);
        }
        info!(
            "Indexed {} font families from {} files",
            provider.families.len(),
            files.len()
        );
        provider
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    fn index_file(&mut self, path: &Path) {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping font {}: {}", path.display(), e);
                return;
            }
        };
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        for index in 0..count {
            let Ok(face) = Face::parse(&data, index) else {
                continue;
            };
            let regular = face.is_regular();
            for name in face.names() {
                if name.name_id != ttf_parser::name_id::FAMILY {
                    continue;
                }
                let Some(family) = name.to_string() else {
                    continue;
                };
                let key = family.to_lowercase();
                let replace = match self.families.get(&key) {
                    Some(existing) => regular && !existing.regular,
                    None => true,
                };
                if replace {
                    self.families.insert(
                        key,
                        FaceLocation {
                            path: path.to_path_buf(),
                            index,
                            regular,
                        },
                    );
                }
            }
        }
    }

    fn locate(&self, family: &str) -> Option<&FaceLocation> {
        let key = family.to_lowercase();
        if key == GENERIC_SANS {
            return GENERIC_SANS_CANDIDATES
                .iter()
                .find_map(|candidate| self.families.get(*candidate))
                .or_else(|| self.families.values().find(|loc| loc.regular))
                .or_else(|| self.families.values().next());
        }
        self.families.get(&key)
    }
}

impl FontProvider for SystemFontProvider {
    fn is_available(&self, family: &str) -> bool {
        self.locate(family).is_some()
    }

    fn load(&self, family: &str) -> Option<FontData> {
        let location = self.locate(family)?;
        match std::fs::read(&location.path) {
            Ok(bytes) => Some(FontData {
                bytes: Arc::new(bytes),
                index: location.index,
            }),
            Err(e) => {
                warn!("Font file {} vanished: {}", location.path.display(), e);
                None
            }
        }
    }
}

fn platform_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    if let Some(windir) = std::env::var_os("WINDIR") {
        dirs.push(PathBuf::from(windir).join("Fonts"));
    }
    dirs
}

fn collect_font_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, out);
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        {
            out.push(path);
        }
    }
}

/// Vertical extents of a string in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InkExtents {
    /// Distance from baseline to the highest ink
    pub ascent: f32,
    /// Distance from baseline to the lowest ink
    pub descent: f32,
}

/// A resolved face able to measure and draw text
#[derive(Debug, Clone)]
pub enum Typeface {
    Outline {
        family: String,
        data: FontData,
    },
    /// Stroke glyphs for placeholder characters, boxes for the rest
    Builtin,
}

const BUILTIN_ADVANCE_EM: f32 = 0.6;
const BUILTIN_ASCENT_EM: f32 = 0.8;
const BUILTIN_DESCENT_EM: f32 = 0.2;
const BUILTIN_STROKE_EM: f32 = 0.08;

impl Typeface {
    pub fn name(&self) -> &str {
        match self {
            Typeface::Outline { family, .. } => family,
            Typeface::Builtin => "builtin",
        }
    }

    fn with_face<T>(&self, f: impl FnOnce(&Face<'_>) -> T) -> Option<T> {
        match self {
            Typeface::Outline { data, .. } => {
                Face::parse(&data.bytes, data.index).ok().map(|face| f(&face))
            }
            Typeface::Builtin => None,
        }
    }

    /// Horizontal advance of `text` at `px` pixels per em
    pub fn advance(&self, text: &str, px: f32) -> f32 {
        let outline = self.with_face(|face| {
            let scale = px / face.units_per_em() as f32;
            text.chars()
                .map(|c| {
                    face.glyph_index(c)
                        .and_then(|gid| face.glyph_hor_advance(gid))
                        .map(|adv| adv as f32 * scale)
                        .unwrap_or(px * BUILTIN_ADVANCE_EM)
                })
                .sum()
        });
        outline.unwrap_or_else(|| text.chars().count() as f32 * px * BUILTIN_ADVANCE_EM)
    }

    /// Maximum ink extents over all glyphs of `text`
    pub fn ink_extents(&self, text: &str, px: f32) -> InkExtents {
        let outline = self.with_face(|face| {
            let scale = px / face.units_per_em() as f32;
            let mut extents = InkExtents::default();
            for c in text.chars() {
                let Some(bbox) = face.glyph_index(c).and_then(|gid| face.glyph_bounding_box(gid))
                else {
                    continue;
                };
                extents.ascent = extents.ascent.max(bbox.y_max as f32 * scale);
                extents.descent = extents.descent.max(-(bbox.y_min as f32) * scale);
            }
            extents
        });
        outline.unwrap_or(InkExtents {
            ascent: px * BUILTIN_ASCENT_EM,
            descent: px * BUILTIN_DESCENT_EM,
        })
    }

    /// Draw `text` with its baseline starting at (`x`, `baseline`)
    pub fn draw(&self, pixmap: &mut Pixmap, text: &str, x: f32, baseline: f32, px: f32, color: Rgba) {
        match self {
            Typeface::Outline { .. } => {
                let path = self.with_face(|face| {
                    let mut builder = GlyphPathBuilder {
                        pb: PathBuilder::new(),
                        origin_x: x,
                        baseline,
                        scale: px / face.units_per_em() as f32,
                    };
                    for c in text.chars() {
                        let advance = match face.glyph_index(c) {
                            Some(gid) => {
                                face.outline_glyph(gid, &mut builder);
                                face.glyph_hor_advance(gid).unwrap_or(0) as f32 * builder.scale
                            }
                            None => px * BUILTIN_ADVANCE_EM,
                        };
                        builder.origin_x += advance;
                    }
                    builder.pb.finish()
                });
                if let Some(Some(path)) = path {
                    let mut paint = Paint::default();
                    paint.set_color(color.to_skia());
                    paint.anti_alias = true;
                    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
            Typeface::Builtin => draw_builtin(pixmap, text, x, baseline, px, color),
        }
    }
}

struct GlyphPathBuilder {
    pb: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.pb.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.pb.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.pb.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.pb.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.pb.close();
    }
}

fn draw_builtin(pixmap: &mut Pixmap, text: &str, x: f32, baseline: f32, px: f32, color: Rgba) {
    let advance = px * BUILTIN_ADVANCE_EM;
    let width = (px * BUILTIN_STROKE_EM).max(1.0);
    let cap = px * 0.7;
    let mut pen = x;
    for c in text.chars() {
        let l = pen + advance * 0.1;
        let r = pen + advance * 0.9;
        let mid = pen + advance * 0.5;
        match c {
            ' ' => {}
            '_' => {
                let y = baseline + px * 0.1;
                stroke_line(pixmap, (pen, y), (pen + advance, y), width, color);
            }
            '/' => stroke_line(pixmap, (l, baseline), (r, baseline - cap), width, color),
            '-' => {
                let y = baseline - cap * 0.45;
                stroke_line(pixmap, (l, y), (r, y), width, color);
            }
            '=' => {
                for y in [baseline - cap * 0.3, baseline - cap * 0.6] {
                    stroke_line(pixmap, (l, y), (r, y), width, color);
                }
            }
            ':' => {
                for y in [baseline - width, baseline - cap * 0.6] {
                    stroke_line(pixmap, (mid, y), (mid, y + width), width, color);
                }
            }
            '.' => stroke_line(pixmap, (mid, baseline - width), (mid, baseline), width, color),
            _ => {
                crate::pixels::stroke_rect(pixmap, l, baseline - cap, r, baseline, width, color);
            }
        }
        pen += advance;
    }
}

/// Resolves preferred families to typefaces, caching each family once
pub struct FontResolver {
    provider: Arc<dyn FontProvider>,
    cache: Mutex<HashMap<String, Arc<Typeface>>>,
}

impl std::fmt::Debug for FontResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResolver").finish_non_exhaustive()
    }
}

impl FontResolver {
    pub fn new(provider: Arc<dyn FontProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver that always uses the built-in typeface
    pub fn builtin() -> Self {
        Self::new(Arc::new(StaticFontProvider::empty()))
    }

    /// First loadable family among `preferred` and the priority list.
    ///
    /// Never fails: the last resort is the built-in typeface.
    pub fn resolve(&self, preferred: &str) -> Arc<Typeface> {
        let key = preferred.to_lowercase();
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(face) = cache.get(&key) {
                return face.clone();
            }
        }

        let candidates = std::iter::once(preferred).chain(FONT_PRIORITY_LIST);
        let mut resolved = None;
        for family in candidates {
            if !self.provider.is_available(family) {
                continue;
            }
            let Some(data) = self.provider.load(family) else {
                continue;
            };
            if Face::parse(&data.bytes, data.index).is_err() {
                warn!("Font '{}' could not be parsed, trying next", family);
                continue;
            }
            if !family.eq_ignore_ascii_case(preferred) {
                warn!("Font '{}' unavailable, using '{}'", preferred, family);
            }
            resolved = Some(Typeface::Outline {
                family: family.to_string(),
                data,
            });
            break;
        }
        let face = Arc::new(resolved.unwrap_or_else(|| {
            warn!(
                "No font of '{}' or the fallback list is available, using built-in glyphs",
                preferred
            );
            Typeface::Builtin
        }));

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.entry(key).or_insert(face).clone()
    }
}
