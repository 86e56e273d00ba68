use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageEncoder, RgbaImage};
use mupdf::{Colorspace, Matrix};
use webp::Encoder as WebpEncoder;

use super::document::PdfDocument;
use crate::config::ImageFormat;
use crate::error::{Error, Result};

/// WebP quality used for page images sent to the model
const WEBP_QUALITY: f32 = 85.0;

/// Rasterises pages so vision-capable models can see the layout
pub struct PageRenderer<'a> {
    pub doc: &'a PdfDocument,
    /// 1.0 = 72 DPI
    pub scale: f32,
}

impl<'a> PageRenderer<'a> {
    pub const fn new(doc: &'a PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    fn render_error(page: usize, reason: impl Into<String>) -> Error {
        Error::PdfRender {
            page,
            reason: reason.into(),
        }
    }

    /// Render a page to an RGBA image buffer
    pub fn render_page(&self, page_num: usize) -> Result<RgbaImage> {
        let (_doc, page) = self.doc.load_page(page_num)?;

        let matrix = Matrix::new_scale(self.scale, self.scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| Self::render_error(page_num, format!("Failed to render: {e}")))?;

        let width = pixmap.width();
        let height = pixmap.height();
        let n = pixmap.n() as usize;
        let mut rgba = Vec::with_capacity((width as usize) * (height as usize) * 4);

        for px in pixmap.samples().chunks(n) {
            match px {
                [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
                [_, _, _, _] => rgba.extend_from_slice(px),
                [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
                _ => {
                    return Err(Self::render_error(
                        page_num,
                        format!("Unexpected pixel format with {n} components"),
                    ));
                }
            }
        }

        RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| Self::render_error(page_num, "Failed to create image buffer"))
    }

    /// Render a page to PNG bytes
    pub fn render_png(&self, page_num: usize) -> Result<Vec<u8>> {
        let img = self.render_page(page_num)?;

        let mut png = Vec::new();
        image::codecs::png::PngEncoder::new_with_quality(
            &mut png,
            image::codecs::png::CompressionType::Fast,
            image::codecs::png::FilterType::Adaptive,
        )
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| Self::render_error(page_num, format!("Failed to encode PNG: {e}")))?;

        Ok(png)
    }

    /// Render a page to lossy WebP bytes
    pub fn render_webp(&self, page_num: usize) -> Result<Vec<u8>> {
        let img = self.render_page(page_num)?;
        let encoded = WebpEncoder::from_rgba(img.as_raw(), img.width(), img.height()).encode(WEBP_QUALITY);
        Ok(encoded.to_vec())
    }

    /// Render a page as a `data:` URL for chat image parts
    pub fn render_data_url(&self, page_num: usize, format: ImageFormat) -> Result<String> {
        let bytes = match format {
            ImageFormat::Png => self.render_png(page_num)?,
            ImageFormat::Webp => self.render_webp(page_num)?,
        };
        Ok(data_url(format, &bytes))
    }
}

/// Encode image bytes as a base64 `data:` URL
pub fn data_url(format: ImageFormat, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64.encode(bytes))
}
