use serde::{Deserialize, Serialize};

/// Placeholder stored in `raw_identifier` when no CPF/CNPJ was found on the page.
pub const IDENTIFIER_NOT_FOUND: &str = "não encontrado";

/// One payment guide extracted from a single PDF page. Immutable after the scan pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedGuide {
    /// 1-based page position within the source document.
    pub page_number: u32,
    /// Identifier exactly as printed, or [`IDENTIFIER_NOT_FOUND`].
    pub raw_identifier: String,
    /// Competence exactly as printed, e.g. "Novembro/2024".
    pub raw_period: String,
    /// Canonical `YYYY-MM` form of `raw_period`.
    pub period_key: String,
    pub amount: f64,
    /// PNG crop of the payment code region (fallback region when no code was found).
    #[serde(skip)]
    pub code_artifact: Vec<u8>,
}

impl ExtractedGuide {
    pub fn has_identifier(&self) -> bool {
        self.raw_identifier != IDENTIFIER_NOT_FOUND
    }
}

/// Final classification of a guide against the batch and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideStatus {
    Ok,
    PeriodMismatch,
    DuplicateInBatch,
    AlreadyPaid,
    AlreadyPulled,
}

impl GuideStatus {
    pub fn label(&self) -> &'static str {
        match self {
            GuideStatus::Ok => "ok",
            GuideStatus::PeriodMismatch => "period mismatch",
            GuideStatus::DuplicateInBatch => "duplicate in batch",
            GuideStatus::AlreadyPaid => "already paid",
            GuideStatus::AlreadyPulled => "already pulled",
        }
    }
}

/// A guide after batch resolution. Recomputed as a whole whenever the batch,
/// the target period or the ledger changes; never patched in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledGuide {
    #[serde(flatten)]
    pub guide: ExtractedGuide,
    /// Digit-only canonical key derived from `raw_identifier`.
    pub normalized_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_client_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_client_name: Option<String>,
    pub status: GuideStatus,
}

/// Payment state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Pulled,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Pulled => "pulled",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<PaymentStatus> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "pulled" => Some(PaymentStatus::Pulled),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// An expected payment stored externally; read-only to the scan pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub client_id: i64,
    /// Period in its own raw form; compared via the period key.
    pub period: String,
    pub amount: f64,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
}

/// One client directory hit for an identifier query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMatch {
    pub client_id: i64,
    pub display_name: String,
    pub normalized_identifier: String,
}
