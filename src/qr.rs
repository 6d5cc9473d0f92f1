//! Payment-code detection and artifact cropping.
//!
//! The locator never fails: when no code is detected it falls back to a
//! fixed rectangle in the bottom-right quadrant, where this guide template
//! conventionally prints the code. A best-effort crop beats no crop, since
//! the artifact is only shown to a human for manual payment and is never
//! decoded here.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, RgbaImage};

use crate::error::ScanError;

/// Pixel coordinates on the rendered page bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePoint {
    pub x: i32,
    pub y: i32,
}

/// Corner points of the code region plus whether a code was actually detected.
#[derive(Debug, Clone)]
pub struct LocatedCode {
    pub corners: [CodePoint; 4],
    pub detected: bool,
}

// Fallback region for the standard guide template rendered at 2x.
// TODO: turn into a per-template table if a second guide layout ever ships.
const FALLBACK_SIZE: i32 = 360;
const FALLBACK_RIGHT_INSET: i32 = 420;
const FALLBACK_BOTTOM_INSET: i32 = 470;

// Crop padding: the top margin is larger than the other three sides because
// a dashed separator rule sits just above the code on these guides.
const PAD_TOP: i32 = 40;
const PAD_SIDE: i32 = 12;

/// Detect a scannable code in the bitmap and return its four corners.
/// `None` is a valid outcome, not an error.
pub fn locate_payment_code(gray: &GrayImage) -> Option<[CodePoint; 4]> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    let grid = grids.first()?;
    Some([
        CodePoint {
            x: grid.bounds[0].x as i32,
            y: grid.bounds[0].y as i32,
        },
        CodePoint {
            x: grid.bounds[1].x as i32,
            y: grid.bounds[1].y as i32,
        },
        CodePoint {
            x: grid.bounds[2].x as i32,
            y: grid.bounds[2].y as i32,
        },
        CodePoint {
            x: grid.bounds[3].x as i32,
            y: grid.bounds[3].y as i32,
        },
    ])
}

/// Deterministic bottom-right fallback rectangle, clamped into the bitmap.
pub fn fallback_region(width: u32, height: u32) -> [CodePoint; 4] {
    let width = width as i32;
    let height = height as i32;
    let size = FALLBACK_SIZE.min(width).min(height).max(1);
    let left = (width - FALLBACK_RIGHT_INSET).clamp(0, width - size);
    let top = (height - FALLBACK_BOTTOM_INSET).clamp(0, height - size);
    [
        CodePoint { x: left, y: top },
        CodePoint {
            x: left + size,
            y: top,
        },
        CodePoint {
            x: left,
            y: top + size,
        },
        CodePoint {
            x: left + size,
            y: top + size,
        },
    ]
}

/// Detected corners when a code is present, fallback corners otherwise.
pub fn locate_or_fallback(gray: &GrayImage) -> LocatedCode {
    match locate_payment_code(gray) {
        Some(corners) => LocatedCode {
            corners,
            detected: true,
        },
        None => {
            let (width, height) = gray.dimensions();
            LocatedCode {
                corners: fallback_region(width, height),
                detected: false,
            }
        }
    }
}

/// Crop the code region with asymmetric padding and encode it as PNG.
/// Always yields a non-empty buffer for a non-empty bitmap.
pub fn crop_code_artifact(
    bitmap: &RgbaImage,
    corners: &[CodePoint; 4],
    page_number: u32,
) -> Result<Vec<u8>, ScanError> {
    let (width, height) = bitmap.dimensions();
    if width == 0 || height == 0 {
        return Err(ScanError::PageRender {
            page: page_number,
            detail: "empty bitmap".to_string(),
        });
    }
    let width = width as i32;
    let height = height as i32;

    let min_x = corners.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = corners.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = corners.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = corners.iter().map(|p| p.y).max().unwrap_or(0);

    let left = (min_x - PAD_SIDE).clamp(0, width - 1);
    let top = (min_y - PAD_TOP).clamp(0, height - 1);
    let right = (max_x + PAD_SIDE).clamp(left + 1, width);
    let bottom = (max_y + PAD_SIDE).clamp(top + 1, height);

    let cropped = image::imageops::crop_imm(
        bitmap,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(cropped)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| ScanError::PageRender {
            page: page_number,
            detail: format!("failed to encode code artifact: {e}"),
        })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_page_falls_back_to_bottom_right_region() {
        let gray = GrayImage::from_pixel(1200, 1700, image::Luma([255u8]));
        let located = locate_or_fallback(&gray);
        assert!(!located.detected);
        assert_eq!(located.corners, fallback_region(1200, 1700));
    }

    #[test]
    fn fallback_region_stays_inside_small_bitmaps() {
        for (w, h) in [(100u32, 80u32), (360, 360), (1200, 1700), (10, 10)] {
            for corner in fallback_region(w, h) {
                assert!(corner.x >= 0 && corner.x <= w as i32, "{w}x{h}: {corner:?}");
                assert!(corner.y >= 0 && corner.y <= h as i32, "{w}x{h}: {corner:?}");
            }
        }
    }

    #[test]
    fn fallback_crop_is_never_empty() {
        let bitmap = RgbaImage::from_pixel(1200, 1700, image::Rgba([255, 255, 255, 255]));
        let corners = fallback_region(1200, 1700);
        let artifact = crop_code_artifact(&bitmap, &corners, 1).unwrap();
        assert!(!artifact.is_empty());
        assert_eq!(&artifact[1..4], b"PNG");
    }

    #[test]
    fn crop_clamps_corners_outside_the_bitmap() {
        let bitmap = RgbaImage::from_pixel(200, 200, image::Rgba([0, 0, 0, 255]));
        let corners = [
            CodePoint { x: -50, y: -50 },
            CodePoint { x: 500, y: -50 },
            CodePoint { x: -50, y: 500 },
            CodePoint { x: 500, y: 500 },
        ];
        let artifact = crop_code_artifact(&bitmap, &corners, 1).unwrap();
        assert!(!artifact.is_empty());
    }

    #[test]
    fn crop_pads_more_above_than_below() {
        let bitmap = RgbaImage::from_pixel(400, 400, image::Rgba([255, 255, 255, 255]));
        let corners = [
            CodePoint { x: 100, y: 100 },
            CodePoint { x: 200, y: 100 },
            CodePoint { x: 100, y: 200 },
            CodePoint { x: 200, y: 200 },
        ];
        let artifact = crop_code_artifact(&bitmap, &corners, 1).unwrap();
        let decoded = image::load_from_memory(&artifact).unwrap();
        assert_eq!(decoded.width() as i32, 100 + 2 * PAD_SIDE);
        assert_eq!(decoded.height() as i32, 100 + PAD_TOP + PAD_SIDE);
    }
}
