//! CSV input of seat orders and CSV reports of receipts and payment history.

pub mod history_writer;
pub mod order_reader;
pub mod receipt_writer;
