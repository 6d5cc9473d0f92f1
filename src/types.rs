use serde::{Deserialize, Serialize};

use crate::models::{GuideStatus, PaymentStatus};

/// Aggregate numbers derived from one reconciled batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Sum of amounts excluding period-mismatched guides.
    pub total_value: f64,
    pub error_count: usize,
    pub warning_count: usize,
    pub count: usize,
}

/// One guide row as presented to the consumer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideReportRow {
    pub page_number: u32,
    pub raw_identifier: String,
    pub normalized_identifier: String,
    pub raw_period: String,
    pub period_key: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_client_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_client_name: Option<String>,
    pub status: GuideStatus,
    /// Path of the cropped payment-code PNG, when written to disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    /// Base64 PNG bytes, when no artifact directory was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_base64: Option<String>,
}

/// Full result of one scan run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub file_name: String,
    pub page_count: u32,
    /// Pages skipped because they failed to rasterize or tokenize.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_pages: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_period: Option<String>,
    /// Period key of the first extracted guide, offered when no target was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_period: Option<String>,
    pub guides: Vec<GuideReportRow>,
    pub stats: ScanStats,
}

/// One past scan run as recorded in the history table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHistoryRecord {
    pub id: i64,
    pub created_at: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_period: Option<String>,
    pub guide_count: i64,
    pub total_value: f64,
    pub error_count: i64,
    pub warning_count: i64,
}

/// Seed file format for the `import` command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub clients: Vec<ImportClient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportClient {
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub ledger: Vec<ImportLedgerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLedgerEntry {
    pub period: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub status: PaymentStatus,
}
