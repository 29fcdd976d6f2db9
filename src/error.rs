use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Batch name '{0}' is already used by this partner")]
    DuplicateBatchName(String),
    #[error("A seat already exists for batch {0}")]
    SeatAlreadyExists(String),
    #[error("Candidates in batch {0} were already paid by another transaction")]
    CandidatesAlreadyPaid(String),
    #[error("No payment profile found for account {0}")]
    NoPaymentProfile(String),
    #[error("Account {0} not found")]
    AccountNotFound(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Gateway error: {0}")]
    GatewayError(String),
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PaymentError {
    /// HTTP-style severity code surfaced to callers alongside the message.
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError(_) | PaymentError::CsvError(_) => 400,
            PaymentError::PaymentDeclined(_) => 402,
            PaymentError::NoPaymentProfile(_)
            | PaymentError::AccountNotFound(_)
            | PaymentError::NotFound(_) => 404,
            PaymentError::DuplicateBatchName(_)
            | PaymentError::SeatAlreadyExists(_)
            | PaymentError::CandidatesAlreadyPaid(_) => 409,
            PaymentError::GatewayError(_) => 502,
            PaymentError::StoreError(_) | PaymentError::IoError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::StoreError(format!("Serialization error: {}", err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::StoreError(err.to_string())
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::GatewayError(err.to_string())
    }
}
