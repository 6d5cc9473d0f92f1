//! Sequential scan of a guide document.
//!
//! Pages are processed strictly one at a time (render, locate code, crop,
//! tokenize, extract), which bounds memory to a single page bitmap and gives
//! a monotonic `(current, total)` progress signal. A page that fails is
//! skipped and logged; only document-level problems abort the scan.

use std::sync::atomic::{AtomicBool, Ordering};

use image::imageops;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::extract;
use crate::models::{ExtractedGuide, IDENTIFIER_NOT_FOUND};
use crate::normalize;
use crate::pdf;
use crate::qr;

/// Result of the extraction pass, before ledger reconciliation.
#[derive(Debug)]
pub struct ScanOutcome {
    pub guides: Vec<ExtractedGuide>,
    /// Pages that failed to rasterize or tokenize.
    pub skipped_pages: Vec<u32>,
    pub page_count: u32,
}

pub struct GuideScanner {
    pdfium: Pdfium,
}

impl GuideScanner {
    pub fn new() -> Result<Self, ScanError> {
        Ok(GuideScanner {
            pdfium: pdf::bind_pdfium()?,
        })
    }

    /// Scan a whole document from an in-memory buffer.
    ///
    /// `cancel` is checked at page boundaries; a cancelled scan discards the
    /// partial batch and returns [`ScanError::Cancelled`] before anything
    /// external is touched. `on_progress` fires once per page, dropped pages
    /// included.
    pub fn scan_document(
        &self,
        bytes: &[u8],
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(u32, u32),
    ) -> Result<ScanOutcome, ScanError> {
        let document = pdf::open_document(&self.pdfium, bytes)?;
        let page_count = document.pages().len() as u32;

        let mut guides = Vec::new();
        let mut skipped_pages = Vec::new();

        for (index, page) in document.pages().iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Err(ScanError::Cancelled);
            }
            let page_number = index as u32 + 1;
            match scan_page(&page, page_number) {
                Ok(Some(guide)) => guides.push(guide),
                Ok(None) => {
                    debug!(page = page_number, "page has no complete guide; dropped");
                }
                Err(err) => {
                    warn!(page = page_number, error = %err, "page skipped");
                    skipped_pages.push(page_number);
                }
            }
            on_progress(page_number, page_count);
        }

        if guides.is_empty() {
            return Err(ScanError::EmptyBatch);
        }

        Ok(ScanOutcome {
            guides,
            skipped_pages,
            page_count,
        })
    }
}

fn scan_page(page: &PdfPage, page_number: u32) -> Result<Option<ExtractedGuide>, ScanError> {
    let bitmap = pdf::rasterize_page(page, page_number)?;
    let gray = imageops::grayscale(&bitmap);
    let located = qr::locate_or_fallback(&gray);
    if !located.detected {
        debug!(page = page_number, "no payment code detected; using fallback region");
    }
    let code_artifact = qr::crop_code_artifact(&bitmap, &located.corners, page_number)?;

    let tokens = pdf::page_tokens(page, page_number)?;
    let Some(fields) = extract::extract_fields(&tokens) else {
        return Ok(None);
    };

    let raw_period = fields.raw_period;
    Ok(Some(ExtractedGuide {
        page_number,
        raw_identifier: fields
            .identifier
            .unwrap_or_else(|| IDENTIFIER_NOT_FOUND.to_string()),
        period_key: normalize::period_key(&raw_period),
        raw_period,
        amount: fields.amount,
        code_artifact,
    }))
}
