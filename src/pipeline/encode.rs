//! PDF encoding: a group of decoded images → one multi-page intermediate PDF.
//!
//! ## Why JPEG inside the PDF?
//!
//! PDF viewers decode `DCTDecode` (JPEG) streams natively, so pages embed as
//! compact pre-compressed blobs instead of megabytes of flate-compressed raw
//! RGB. Scanned comic pages are photographic content where JPEG at quality
//! 85 is visually transparent; pipeline transforms (grayscale, resize)
//! happen before encoding, so each page is compressed exactly once.
//!
//! Pages are scaled at a fixed 100 dpi: a pixel of source image becomes
//! 72/100 of a PDF point, matching the page size the original tooling
//! produced.

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Fixed page-scale resolution, pixels per inch.
const RENDER_DPI: f32 = 100.0;

/// Failure while encoding a group into an intermediate PDF.
///
/// Wrapped into [`crate::error::GroupError::EncodeFailed`] by the renderer;
/// never fatal to the run by itself.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("PDF assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot write a PDF with zero pages")]
    Empty,
}

/// Incremental writer assembling one multi-page PDF from decoded images.
///
/// Single-image groups go through [`write_single_page`]; multi-image groups
/// append sequentially and [`GroupPdfWriter::save`] at the end.
pub struct GroupPdfWriter {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    jpeg_quality: u8,
}

impl GroupPdfWriter {
    pub fn new(jpeg_quality: u8) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            jpeg_quality,
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append one image as a full-bleed page.
    pub fn append_page(&mut self, image: &DynamicImage) -> Result<(), EncodeError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut jpeg = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality);
        encoder.encode(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)?;
        debug!("Encoded page {}×{} → {} bytes JPEG", width, height, jpeg.len());

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let page_width = width as f32 * 72.0 / RENDER_DPI;
        let page_height = height as f32 * 72.0 / RENDER_DPI;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(page_width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(page_height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self.doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(EncodeError::Pdf)?,
        ));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_width),
                Object::Real(page_height),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Finish the document and write it to `path`.
    ///
    /// Returns the page count.
    pub fn save(mut self, path: &Path) -> Result<usize, EncodeError> {
        if self.page_ids.is_empty() {
            return Err(EncodeError::Empty);
        }

        let count = self.page_ids.len();
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.save(path)?;

        debug!("Wrote {} page(s) to {}", count, path.display());
        Ok(count)
    }
}

/// Direct path for single-image groups: one page, one write.
pub fn write_single_page(
    image: &DynamicImage,
    jpeg_quality: u8,
    path: &Path,
) -> Result<usize, EncodeError> {
    let mut writer = GroupPdfWriter::new(jpeg_quality);
    writer.append_page(image)?;
    writer.save(path)
}
