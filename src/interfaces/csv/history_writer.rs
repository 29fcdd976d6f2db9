use crate::domain::money::Amount;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    id: &'a str,
    created_at: DateTime<Utc>,
    amount: Amount,
    currency: &'a str,
    status: TransactionStatus,
    reference: Option<&'a str>,
    processor_payment_id: Option<&'a str>,
    description: &'a str,
}

impl<'a> From<&'a Transaction> for HistoryRow<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            id: &tx.id,
            created_at: tx.created_at,
            amount: tx.amount,
            currency: &tx.currency,
            status: tx.status,
            reference: tx.reference.as_deref(),
            processor_payment_id: tx.processor_payment_id.as_deref(),
            description: &tx.description,
        }
    }
}

/// Writes ledger entries as CSV, one row per transaction in the order given.
pub struct HistoryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> HistoryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_history(&mut self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            self.writer.write_record([
                "id",
                "created_at",
                "amount",
                "currency",
                "status",
                "reference",
                "processor_payment_id",
                "description",
            ])?;
        }
        for tx in transactions {
            self.writer.serialize(HistoryRow::from(tx))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
