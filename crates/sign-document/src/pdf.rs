//! PDF writing on top of lopdf
//!
//! Pages are added one at a time. Every raster is compressed into its
//! image XObject as soon as it is added, so the caller can drop the pixel
//! buffer before rendering the next artifact.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use sign_render::SizeMm;
use tiny_skia::{IntRect, Pixmap};

use crate::constants::{
    DOCUMENT_TITLE_PREFIX, HELVETICA_CHAR_WIDTH_RATIO, PROGRAM_NAME, mm_to_pt,
};
use crate::types::{DocumentError, DocumentKind, Result};

/// Resource name of the hint font
pub const FONT_NAME: &str = "F1";

/// Document information dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creator: String,
}

impl DocumentInfo {
    pub fn for_export(kind: DocumentKind, count: usize) -> Self {
        Self {
            title: format!("{} - {}", DOCUMENT_TITLE_PREFIX, kind.name()),
            author: PROGRAM_NAME.to_string(),
            subject: format!("{count} taktische Zeichen"),
            creator: format!("{} {}", PROGRAM_NAME, env!("CARGO_PKG_VERSION")),
        }
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Incrementally built PDF document
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    font_id: Option<ObjectId>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            font_id: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Add `pixmap` as an RGB image with a soft mask for its alpha channel.
    ///
    /// Fully opaque rasters get no mask.
    pub fn add_image(&mut self, pixmap: &Pixmap) -> Result<ObjectId> {
        let full = IntRect::from_xywh(0, 0, pixmap.width(), pixmap.height())
            .ok_or_else(|| DocumentError::Config("Empty image".to_string()))?;
        self.add_image_region(pixmap, full)
    }

    /// Add the `rect` part of `pixmap` as an image.
    ///
    /// Rows are read straight from `pixmap`, so no cropped copy is made.
    pub fn add_image_region(&mut self, pixmap: &Pixmap, rect: IntRect) -> Result<ObjectId> {
        if rect.right() as u32 > pixmap.width() || rect.bottom() as u32 > pixmap.height() {
            return Err(DocumentError::Config(format!(
                "Image region {}x{}+{}+{} exceeds a {}x{} raster",
                rect.width(),
                rect.height(),
                rect.x(),
                rect.y(),
                pixmap.width(),
                pixmap.height()
            )));
        }
        let stride = pixmap.width() as usize;
        let (x, y) = (rect.x() as usize, rect.y() as usize);
        let (width, height) = (rect.width() as usize, rect.height() as usize);

        let mut rgb = ZlibEncoder::new(Vec::new(), Compression::default());
        let mut alpha = ZlibEncoder::new(Vec::new(), Compression::default());
        let mut row_rgb = Vec::with_capacity(width * 3);
        let mut row_alpha = Vec::with_capacity(width);
        let mut opaque = true;

        for row in pixmap.pixels().chunks(stride).skip(y).take(height) {
            row_rgb.clear();
            row_alpha.clear();
            for px in &row[x..x + width] {
                let c = px.demultiply();
                row_rgb.extend_from_slice(&[c.red(), c.green(), c.blue()]);
                row_alpha.push(c.alpha());
                opaque &= c.alpha() == u8::MAX;
            }
            rgb.write_all(&row_rgb)?;
            alpha.write_all(&row_alpha)?;
        }

        let mut image = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "FlateDecode",
        };
        if !opaque {
            let mask = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
                "Filter" => "FlateDecode",
            };
            let mask_id = self.doc.add_object(Stream::new(mask, alpha.finish()?));
            image.set("SMask", Object::Reference(mask_id));
        }
        Ok(self.doc.add_object(Stream::new(image, rgb.finish()?)))
    }

    /// Helvetica with WinAnsi encoding, created on first use
    pub fn helvetica(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font_id = Some(id);
        id
    }

    /// Append a page of `size` drawing `operations`.
    ///
    /// `images` maps resource names used by the operations to image objects.
    pub fn add_page(
        &mut self,
        size: SizeMm,
        operations: Vec<Operation>,
        images: &[(String, ObjectId)],
        with_font: bool,
    ) -> Result<ObjectId> {
        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            compress(&content)?,
        ));

        let mut xobjects = Dictionary::new();
        for (name, id) in images {
            xobjects.set(name.as_bytes(), Object::Reference(*id));
        }
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));
        if with_font {
            let font_id = self.helvetica();
            resources.set(
                "Font",
                Object::Dictionary(dictionary! { FONT_NAME => font_id }),
            );
        }

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(mm_to_pt(size.width)),
                Object::Real(mm_to_pt(size.height)),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));

        let page_id = self.doc.add_object(page);
        self.page_ids.push(page_id);
        Ok(page_id)
    }

    /// Close the page tree and attach catalog and metadata.
    ///
    /// Viewers are asked not to scale on print.
    pub fn finish(mut self, info: &DocumentInfo) -> Document {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(self.page_ids.len() as i64)),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
            "ViewerPreferences" => dictionary! { "PrintScaling" => "None" },
        });
        self.doc.trailer.set("Root", catalog_id);

        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal(info.title.as_str()),
            "Author" => Object::string_literal(info.author.as_str()),
            "Subject" => Object::string_literal(info.subject.as_str()),
            "Creator" => Object::string_literal(info.creator.as_str()),
        });
        self.doc.trailer.set("Info", info_id);
        self.doc
    }
}

/// Write `doc` to `path`
pub fn write_pdf(doc: &mut Document, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Save `doc` to `path` without blocking the async runtime
pub async fn save_pdf(mut doc: Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref().to_owned();
    let bytes = tokio::task::spawn_blocking(move || {
        let mut writer = Vec::new();
        doc.save_to(&mut writer)?;
        Ok::<_, crate::types::DocumentError>(writer)
    })
    .await??;
    tokio::fs::write(&path, bytes).await?;
    Ok(())
}

// =============================================================================
// Content operators
// =============================================================================

/// Draw image resource `name` into the rectangle at (`x`, `y`) with size `w`x`h` (pt)
pub fn draw_image(name: &str, x: f32, y: f32, w: f32, h: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                w.into(),
                Object::Integer(0),
                Object::Integer(0),
                h.into(),
                x.into(),
                y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Stroke a rectangle outline (pt)
pub fn stroke_rect(x: f32, y: f32, w: f32, h: f32, rgb: [f32; 3], line_width: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("RG", vec![rgb[0].into(), rgb[1].into(), rgb[2].into()]),
        Operation::new("w", vec![line_width.into()]),
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Estimated Helvetica width of `text` at `size` (pt)
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * HELVETICA_CHAR_WIDTH_RATIO
}

/// Encode `text` for a WinAnsi font; characters outside Latin-1 become `?`
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Gray text centered horizontally on a page of `page_width` with its baseline at `y` (pt)
pub fn centered_text(text: &str, size: f32, page_width: f32, y: f32, gray: f32) -> Vec<Operation> {
    let x = (page_width - text_width(text, size)) / 2.0;
    vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![gray.into()]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_NAME.as_bytes().to_vec()), size.into()],
        ),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}
