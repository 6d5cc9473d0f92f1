use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::info;

use crate::cli::{HistoryArgs, ImportArgs, MarkPaidArgs, ScanArgs};
use crate::db::Db;
use crate::models::ReconciledGuide;
use crate::reconcile::{self, PaymentLedger};
use crate::services::scanner::GuideScanner;
use crate::types::{GuideReportRow, ImportPayload, ScanReport};

const MAX_PDF_BYTES: u64 = 50 * 1024 * 1024;

/// Database path resolution: flag, then env, then the user data dir.
fn resolve_db_path(flag: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path.clone();
    }
    if let Ok(path) = std::env::var("GUIDE_SCANNER_DB") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("guide-scanner")
        .join("guides.db")
}

fn open_db(flag: Option<&PathBuf>) -> Result<Db> {
    let path = resolve_db_path(flag);
    Db::new(path.clone()).with_context(|| format!("could not open database at {}", path.display()))
}

/// Cheap sanity checks before handing the file to PDFium.
fn validate_pdf_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("file not found: {}", path.display());
    }
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_PDF_BYTES {
        bail!("file too large (max 50MB): {}", path.display());
    }
    let mut file = fs::File::open(path)?;
    let mut header = [0u8; 8];
    let read = file.read(&mut header).unwrap_or(0);
    if read < 5 || !header.starts_with(b"%PDF-") {
        bail!("not a valid PDF file: {}", path.display());
    }
    Ok(())
}

pub fn scan(db_flag: Option<&PathBuf>, args: ScanArgs) -> Result<()> {
    validate_pdf_file(&args.pdf)?;
    let bytes = fs::read(&args.pdf)
        .with_context(|| format!("could not read {}", args.pdf.display()))?;
    let file_name = args
        .pdf
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf")
        .to_string();

    let db = open_db(db_flag)?;
    let scanner = GuideScanner::new()?;

    let cancel = AtomicBool::new(false);
    let outcome = scanner.scan_document(&bytes, &cancel, |current, total| {
        info!(current, total, "page processed");
    })?;

    // Without a target the run is not filtered, but the first guide's
    // competence is offered so the next run can pin it down.
    let suggested_period = match args.period {
        None => outcome.guides.first().map(|g| g.period_key.clone()),
        Some(_) => None,
    };

    let (guides, stats) =
        reconcile::resolve_batch(&db, &db, outcome.guides, args.period.as_deref());

    let rows = build_rows(&guides, args.artifacts_dir.as_deref(), args.json)?;
    let report = ScanReport {
        file_name: file_name.clone(),
        page_count: outcome.page_count,
        skipped_pages: outcome.skipped_pages,
        target_period: args.period.clone(),
        suggested_period,
        guides: rows,
        stats,
    };

    db.add_scan_record(&file_name, args.period.as_deref(), &stats)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn build_rows(
    guides: &[ReconciledGuide],
    artifacts_dir: Option<&Path>,
    embed_base64: bool,
) -> Result<Vec<GuideReportRow>> {
    if let Some(dir) = artifacts_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create {}", dir.display()))?;
    }

    let mut rows = Vec::with_capacity(guides.len());
    for reconciled in guides {
        let guide = &reconciled.guide;
        let mut artifact_path = None;
        let mut artifact_base64 = None;
        if let Some(dir) = artifacts_dir {
            let path = dir.join(format!("page-{:03}-code.png", guide.page_number));
            fs::write(&path, &guide.code_artifact)
                .with_context(|| format!("could not write {}", path.display()))?;
            artifact_path = Some(path.display().to_string());
        } else if embed_base64 {
            artifact_base64 = Some(BASE64.encode(&guide.code_artifact));
        }
        rows.push(GuideReportRow {
            page_number: guide.page_number,
            raw_identifier: guide.raw_identifier.clone(),
            normalized_identifier: reconciled.normalized_identifier.clone(),
            raw_period: guide.raw_period.clone(),
            period_key: guide.period_key.clone(),
            amount: guide.amount,
            matched_client_id: reconciled.matched_client_id,
            matched_client_name: reconciled.matched_client_name.clone(),
            status: reconciled.status,
            artifact_path,
            artifact_base64,
        });
    }
    Ok(rows)
}

fn print_report(report: &ScanReport) {
    println!(
        "{} — {} page(s), {} guide(s)",
        report.file_name, report.page_count, report.stats.count
    );
    if let Some(period) = &report.target_period {
        println!("target period: {period}");
    } else if let Some(period) = &report.suggested_period {
        println!("suggested period: {period}");
    }
    if !report.skipped_pages.is_empty() {
        println!("skipped pages: {:?}", report.skipped_pages);
    }
    println!();
    println!(
        "{:>4}  {:<24} {:<16} {:<10} {:>12}  {}",
        "page", "client", "identifier", "period", "amount", "status"
    );
    for row in &report.guides {
        println!(
            "{:>4}  {:<24} {:<16} {:<10} {:>12.2}  {}",
            row.page_number,
            row.matched_client_name.as_deref().unwrap_or("-"),
            row.raw_identifier,
            row.period_key,
            row.amount,
            row.status.label()
        );
    }
    println!();
    println!(
        "total payable: {:.2} | errors: {} | warnings: {}",
        report.stats.total_value, report.stats.error_count, report.stats.warning_count
    );
}

pub fn mark_paid(db_flag: Option<&PathBuf>, args: MarkPaidArgs) -> Result<()> {
    let db = open_db(db_flag)?;
    db.mark_paid(args.client_id, &args.period, args.amount)
        .with_context(|| {
            format!(
                "could not mark client {} period {} as paid",
                args.client_id, args.period
            )
        })?;
    println!(
        "marked client {} period {} as paid ({:.2})",
        args.client_id, args.period, args.amount
    );
    Ok(())
}

pub fn import(db_flag: Option<&PathBuf>, args: ImportArgs) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("could not read {}", args.file.display()))?;
    let payload: ImportPayload =
        serde_json::from_str(&content).context("invalid import file")?;
    let db = open_db(db_flag)?;
    let (clients, entries) = db.import(&payload)?;
    println!("imported {clients} client(s) and {entries} ledger entr(ies)");
    Ok(())
}

pub fn history(db_flag: Option<&PathBuf>, args: HistoryArgs) -> Result<()> {
    let db = open_db(db_flag)?;
    let records = db.get_scan_history()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no scans recorded yet");
        return Ok(());
    }
    for record in records {
        println!(
            "#{} {} {} — {} guide(s), total {:.2}, errors {}, warnings {}{}",
            record.id,
            record.created_at,
            record.file_name,
            record.guide_count,
            record.total_value,
            record.error_count,
            record.warning_count,
            record
                .target_period
                .map(|p| format!(", period {p}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
