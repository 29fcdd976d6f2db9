use crate::application::payments::SeatPurchaseReceipt;
use crate::domain::money::Amount;
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::io::Write;

/// Outcome of one order line in a batch purchase run.
#[derive(Debug, Serialize, PartialEq)]
pub struct ReceiptRow {
    pub line: usize,
    pub partner_id: String,
    pub batch_name: String,
    pub batch_id: Option<String>,
    pub seat_id: Option<String>,
    pub transaction_id: Option<String>,
    pub total_price: Option<Amount>,
    pub status: u16,
    pub error: Option<String>,
}

impl ReceiptRow {
    pub fn success(line: usize, receipt: &SeatPurchaseReceipt) -> Self {
        Self {
            line,
            partner_id: receipt.batch.partner_id.clone(),
            batch_name: receipt.batch.name.as_str().to_string(),
            batch_id: Some(receipt.batch.id.clone()),
            seat_id: Some(receipt.seat.id.clone()),
            transaction_id: Some(receipt.transaction.id.clone()),
            total_price: Some(receipt.transaction.amount),
            status: 200,
            error: None,
        }
    }

    /// `batch_id` is the batch the order left behind, if any, so the order can be retried
    /// against it.
    pub fn failure(
        line: usize,
        partner_id: &str,
        batch_name: &str,
        batch_id: Option<&str>,
        error: &PaymentError,
    ) -> Self {
        Self {
            line,
            partner_id: partner_id.to_string(),
            batch_name: batch_name.to_string(),
            batch_id: batch_id.map(str::to_string),
            seat_id: None,
            transaction_id: None,
            total_price: None,
            status: error.status_code(),
            error: Some(error.to_string()),
        }
    }
}

pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_row(&mut self, row: &ReceiptRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
