use thiserror::Error;

#[derive(Error, Debug)]
pub enum PennyError {
    #[error("Database write failed: {0}")]
    PersistenceWriteFailed(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Item {item_id} still refreshing after {waited_secs}s")]
    AggregatorTimeout { item_id: String, waited_secs: u64 },

    #[error("Aggregator request failed for item {item_id}: {reason}")]
    AggregatorRequestFailed { item_id: String, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("Payment method '{0}' cannot be used here; credit payments go through installments")]
    UnsupportedMethod(String),

    #[error("Bill {0} was changed by another writer; reload and retry")]
    StaleBill(i64),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown bill: {0}")]
    UnknownBill(i64),

    #[error("Unknown installment: {0}")]
    UnknownInstallment(i64),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl PennyError {
    /// Soft failures leave the item usable; the sync carries on.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::AggregatorTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, PennyError>;
