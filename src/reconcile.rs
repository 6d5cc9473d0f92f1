//! Batch reconciliation against the client directory and the payment ledger.
//!
//! The directory and the ledger are injected behind traits so the engine can
//! run against in-memory fixtures; the SQLite binding in `db` implements both
//! for production use.

use std::collections::HashMap;

use tracing::warn;

use crate::error::StoreError;
use crate::models::{ClientMatch, ExtractedGuide, GuideStatus, LedgerEntry, PaymentStatus, ReconciledGuide};
use crate::normalize;
use crate::types::ScanStats;

/// Resolves identifier strings to known clients.
pub trait ClientDirectory {
    /// One query per batch over the distinct raw and normalized identifiers.
    fn lookup_identifiers(&self, identifiers: &[String]) -> Result<Vec<ClientMatch>, StoreError>;
}

/// Read side of the expected-payments ledger, plus its single mutation.
pub trait PaymentLedger {
    /// One query per batch, grouped by client id.
    fn entries_for_clients(
        &self,
        client_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<LedgerEntry>>, StoreError>;

    /// Flip the matching `(client, period)` entry to paid. Must fail without
    /// touching anything when no entry matches.
    fn mark_paid(&self, client_id: i64, raw_period: &str, amount: f64) -> Result<(), StoreError>;
}

/// Reconcile a scanned batch. Recomputes every derived field from scratch;
/// duplicate detection and the ledger override depend on the whole batch, so
/// there is no incremental path.
pub fn resolve_batch(
    directory: &dyn ClientDirectory,
    ledger: &dyn PaymentLedger,
    batch: Vec<ExtractedGuide>,
    target_period: Option<&str>,
) -> (Vec<ReconciledGuide>, ScanStats) {
    let duplicate_counts = count_identifiers(&batch);
    let clients = resolve_clients(directory, &batch);
    let entries = resolve_entries(ledger, &clients);

    let guides: Vec<ReconciledGuide> = batch
        .into_iter()
        .map(|guide| classify(guide, target_period, &duplicate_counts, &clients, &entries))
        .collect();
    let stats = compute_stats(&guides);
    (guides, stats)
}

/// Occurrences of each `(normalized identifier, period key)` pair in the
/// batch. The same contributor may legitimately appear once per competence in
/// one document, so only a repeated identifier within the same competence is
/// a duplicate. Guides whose identifier was never found are left out so two
/// unidentified guides are not reported as duplicates of each other.
fn count_identifiers(batch: &[ExtractedGuide]) -> HashMap<(String, String), usize> {
    let mut counts = HashMap::new();
    for guide in batch.iter().filter(|g| g.has_identifier()) {
        *counts
            .entry((
                normalize::normalize_identifier(&guide.raw_identifier),
                guide.period_key.clone(),
            ))
            .or_insert(0) += 1;
    }
    counts
}

/// Single directory query for the batch; a failed lookup degrades to
/// "no client matched" instead of aborting the scan.
fn resolve_clients(
    directory: &dyn ClientDirectory,
    batch: &[ExtractedGuide],
) -> HashMap<String, ClientMatch> {
    let mut identifiers: Vec<String> = Vec::new();
    for guide in batch.iter().filter(|g| g.has_identifier()) {
        let raw = guide.raw_identifier.clone();
        let normalized = normalize::normalize_identifier(&raw);
        if !identifiers.contains(&raw) {
            identifiers.push(raw);
        }
        if !identifiers.contains(&normalized) {
            identifiers.push(normalized);
        }
    }
    if identifiers.is_empty() {
        return HashMap::new();
    }
    match directory.lookup_identifiers(&identifiers) {
        Ok(matches) => matches
            .into_iter()
            .map(|m| (m.normalized_identifier.clone(), m))
            .collect(),
        Err(err) => {
            warn!(error = %err, "client directory unavailable; guides stay unmatched");
            HashMap::new()
        }
    }
}

/// Single ledger query for every matched client; degrades like the directory.
fn resolve_entries(
    ledger: &dyn PaymentLedger,
    clients: &HashMap<String, ClientMatch>,
) -> HashMap<i64, Vec<LedgerEntry>> {
    let mut client_ids: Vec<i64> = clients.values().map(|c| c.client_id).collect();
    client_ids.sort_unstable();
    client_ids.dedup();
    if client_ids.is_empty() {
        return HashMap::new();
    }
    match ledger.entries_for_clients(&client_ids) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, "payment ledger unavailable; guides keep their batch status");
            HashMap::new()
        }
    }
}

fn classify(
    guide: ExtractedGuide,
    target_period: Option<&str>,
    duplicate_counts: &HashMap<(String, String), usize>,
    clients: &HashMap<String, ClientMatch>,
    entries: &HashMap<i64, Vec<LedgerEntry>>,
) -> ReconciledGuide {
    let normalized_identifier = normalize::normalize_identifier(&guide.raw_identifier);

    let mut status = match target_period {
        Some(target) if guide.period_key != target => GuideStatus::PeriodMismatch,
        _ => {
            let occurrences = duplicate_counts
                .get(&(normalized_identifier.clone(), guide.period_key.clone()))
                .copied()
                .unwrap_or(0);
            if occurrences > 1 {
                GuideStatus::DuplicateInBatch
            } else {
                GuideStatus::Ok
            }
        }
    };

    let matched = guide
        .has_identifier()
        .then(|| clients.get(&normalized_identifier))
        .flatten();

    // The ledger is the source of truth: a paid or pulled entry for this
    // period overrides whatever the batch inferred, mismatches included.
    if let Some(client) = matched {
        for entry in entries.get(&client.client_id).into_iter().flatten() {
            if normalize::period_key(&entry.period) != guide.period_key {
                continue;
            }
            match entry.status {
                PaymentStatus::Paid => {
                    status = GuideStatus::AlreadyPaid;
                    break;
                }
                PaymentStatus::Pulled => {
                    status = GuideStatus::AlreadyPulled;
                }
                PaymentStatus::Pending => {}
            }
        }
    }

    ReconciledGuide {
        normalized_identifier,
        matched_client_id: matched.map(|c| c.client_id),
        matched_client_name: matched.map(|c| c.display_name.clone()),
        status,
        guide,
    }
}

/// Aggregate totals over the reconciled set. Pure derivation, recomputed
/// whenever the set changes.
pub fn compute_stats(guides: &[ReconciledGuide]) -> ScanStats {
    let mut stats = ScanStats {
        total_value: 0.0,
        error_count: 0,
        warning_count: 0,
        count: guides.len(),
    };
    for reconciled in guides {
        match reconciled.status {
            GuideStatus::PeriodMismatch => stats.error_count += 1,
            GuideStatus::DuplicateInBatch => stats.warning_count += 1,
            _ => {}
        }
        // Mismatched guides do not belong to this run, so they are excluded
        // from the payable total even when otherwise valid.
        if reconciled.status != GuideStatus::PeriodMismatch {
            stats.total_value += reconciled.guide.amount;
        }
    }
    stats
}
