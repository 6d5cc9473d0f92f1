//! Batch reconciliation against the real SQLite binding.

use guide_scanner_lib::{
    compute_stats, normalize, resolve_batch, Db, ExtractedGuide, GuideStatus, PaymentLedger,
    PaymentStatus,
};

fn guide(page: u32, identifier: &str, period: &str, amount: f64) -> ExtractedGuide {
    ExtractedGuide {
        page_number: page,
        raw_identifier: identifier.to_string(),
        raw_period: period.to_string(),
        period_key: normalize::period_key(period),
        amount,
        code_artifact: vec![0u8; 8],
    }
}

#[test]
fn three_page_batch_with_target_period() {
    let db = Db::open_in_memory().unwrap();
    db.upsert_client("Maria Silva", "123.456.789-00").unwrap();

    let batch = vec![
        guide(1, "123.456.789-00", "Novembro/2024", 100.50),
        guide(2, "123.456.789-00", "Outubro/2024", 50.00),
        guide(3, "987.654.321-00", "Novembro/2024", 75.25),
    ];

    let (guides, stats) = resolve_batch(&db, &db, batch, Some("2024-11"));

    assert_eq!(guides[0].status, GuideStatus::Ok);
    assert_eq!(guides[0].matched_client_name.as_deref(), Some("Maria Silva"));
    assert_eq!(guides[1].status, GuideStatus::PeriodMismatch);
    assert_eq!(guides[2].status, GuideStatus::Ok);
    assert!(guides[2].matched_client_id.is_none());

    assert_eq!(stats.total_value, 175.75);
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.warning_count, 0);
    assert_eq!(stats.count, 3);
}

#[test]
fn ledger_status_beats_the_batch_classification() {
    let db = Db::open_in_memory().unwrap();
    let maria = db.upsert_client("Maria Silva", "123.456.789-00").unwrap();
    db.add_ledger_entry(maria, "Outubro/2024", 50.0, PaymentStatus::Paid)
        .unwrap();

    // Period mismatch locally, but the ledger already shows it paid.
    let batch = vec![guide(1, "123.456.789-00", "Outubro/2024", 50.0)];
    let (guides, stats) = resolve_batch(&db, &db, batch, Some("2024-11"));

    assert_eq!(guides[0].status, GuideStatus::AlreadyPaid);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.total_value, 50.0);
}

#[test]
fn pulled_entry_flags_the_guide_but_keeps_it_payable() {
    let db = Db::open_in_memory().unwrap();
    let maria = db.upsert_client("Maria Silva", "123.456.789-00").unwrap();
    db.add_ledger_entry(maria, "11/2024", 100.0, PaymentStatus::Pulled)
        .unwrap();

    let batch = vec![guide(1, "123.456.789-00", "Novembro/2024", 100.0)];
    let (guides, stats) = resolve_batch(&db, &db, batch, None);

    assert_eq!(guides[0].status, GuideStatus::AlreadyPulled);
    assert_eq!(stats.total_value, 100.0);
}

#[test]
fn reconciliation_is_a_pure_recomputation() {
    let db = Db::open_in_memory().unwrap();
    let maria = db.upsert_client("Maria Silva", "123.456.789-00").unwrap();
    db.add_ledger_entry(maria, "11/2024", 100.0, PaymentStatus::Pending)
        .unwrap();

    let batch = vec![guide(1, "123.456.789-00", "Novembro/2024", 100.0)];
    let (before, _) = resolve_batch(&db, &db, batch.clone(), None);
    assert_eq!(before[0].status, GuideStatus::Ok);

    // The external mutation flips the ledger; re-running the same batch
    // must pick the change up because nothing is cached between runs.
    db.mark_paid(maria, "Novembro/2024", 100.0).unwrap();
    let (after, _) = resolve_batch(&db, &db, batch, None);
    assert_eq!(after[0].status, GuideStatus::AlreadyPaid);
}

#[test]
fn stats_recompute_matches_resolve_output() {
    let db = Db::open_in_memory().unwrap();
    let batch = vec![
        guide(1, "111.111.111-11", "11/2024", 10.0),
        guide(2, "222.222.222-22", "10/2024", 20.0),
    ];
    let (guides, stats) = resolve_batch(&db, &db, batch, Some("2024-11"));
    assert_eq!(compute_stats(&guides), stats);
}
