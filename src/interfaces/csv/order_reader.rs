use crate::application::payments::{BatchTarget, SeatPurchase};
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

/// One seat order as it appears in an orders CSV.
///
/// `batch_id` is optional; when present the order targets that existing batch and
/// `batch_name` is informational only. `request_id` is optional too; a new value lets a
/// declined order be charged again.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRecord {
    pub partner_id: String,
    pub email: String,
    pub name: String,
    pub batch_name: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    pub seat_count: u32,
    pub sessions_per_day: String,
    pub months: u32,
    pub payment_method: String,
    #[serde(default)]
    pub auto_renew: Option<bool>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl OrderRecord {
    pub fn to_purchase(&self) -> SeatPurchase {
        let batch = match self.batch_id.as_deref().filter(|id| !id.is_empty()) {
            Some(batch_id) => BatchTarget::Existing(batch_id.to_string()),
            None => BatchTarget::New(self.batch_name.clone()),
        };
        SeatPurchase {
            partner_id: self.partner_id.clone(),
            batch,
            seat_count: self.seat_count,
            sessions_per_day: self.sessions_per_day.clone(),
            months: self.months,
            payment_method: self.payment_method.clone(),
            auto_renew: self.auto_renew,
            request_id: self.request_id.clone().filter(|id| !id.is_empty()),
        }
    }
}

/// Reads seat orders from a CSV source, trimming whitespace around fields.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes orders; a malformed row yields an error without ending the stream.
    pub fn orders(self) -> impl Iterator<Item = Result<OrderRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
