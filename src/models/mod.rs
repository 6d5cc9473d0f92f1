mod guide;

pub use guide::{
    ClientMatch, ExtractedGuide, GuideStatus, LedgerEntry, PaymentStatus, ReconciledGuide,
    IDENTIFIER_NOT_FOUND,
};
