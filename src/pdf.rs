//! PDFium bootstrap, page rasterization and token extraction.

use image::RgbaImage;
use pdfium_render::prelude::*;

use crate::error::ScanError;

/// Fixed magnification for page rasterization. 2x keeps the fine print and
/// the payment code legible for the crop without ballooning memory.
pub const RENDER_SCALE: f32 = 2.0;

/// Bind PDFium, preferring a library shipped next to the binary over the
/// system-wide install.
pub fn bind_pdfium() -> Result<Pdfium, ScanError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ScanError::PdfiumUnavailable(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

/// Open a document from an in-memory buffer, telling a password-protected
/// file apart from plain corruption.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
) -> Result<PdfDocument<'a>, ScanError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                ScanError::PasswordProtected
            }
            other => ScanError::DocumentUnreadable(other.to_string()),
        })
}

/// Render one page into an RGBA bitmap at [`RENDER_SCALE`].
pub fn rasterize_page(page: &PdfPage, page_number: u32) -> Result<RgbaImage, ScanError> {
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(RENDER_SCALE)
        .render_form_data(false)
        .render_annotations(false)
        .set_format(PdfBitmapFormat::BGRA);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| page_error(page_number, e))?;

    let width = bitmap.width().max(0) as usize;
    let height = bitmap.height().max(0) as usize;
    let src_pixels = bitmap.as_raw_bytes();
    // PDFium hands back BGRA rows with their own stride; rebuild tight RGBA.
    let src_stride = if height == 0 { 0 } else { src_pixels.len() / height };

    let mut pixels = Vec::with_capacity(width.saturating_mul(height).saturating_mul(4));
    for y in 0..height {
        let base = y.saturating_mul(src_stride);
        for x in 0..width {
            let idx = base.saturating_add(x.saturating_mul(4));
            let b = src_pixels.get(idx).copied().unwrap_or(255);
            let g = src_pixels.get(idx + 1).copied().unwrap_or(255);
            let r = src_pixels.get(idx + 2).copied().unwrap_or(255);
            let a = src_pixels.get(idx + 3).copied().unwrap_or(255);
            pixels.extend_from_slice(&[r, g, b, a]);
        }
    }

    RgbaImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| ScanError::PageRender {
        page: page_number,
        detail: "rendered bitmap has inconsistent dimensions".to_string(),
    })
}

/// Ordered, trimmed, non-empty text tokens of a page, in the order the
/// content stream emits them. The extraction heuristics rely on sequence
/// adjacency only, so no geometry is kept.
pub fn page_tokens(page: &PdfPage, page_number: u32) -> Result<Vec<String>, ScanError> {
    let text = page.text().map_err(|e| page_error(page_number, e))?;
    let mut tokens = Vec::new();
    for segment in text.segments().iter() {
        let content = segment.text();
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            tokens.push(trimmed.to_string());
        }
    }
    Ok(tokens)
}

fn page_error(page_number: u32, err: PdfiumError) -> ScanError {
    ScanError::PageRender {
        page: page_number,
        detail: err.to_string(),
    }
}
