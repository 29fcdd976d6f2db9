//! Application layer orchestrating pricing, charging and provisioning.
//!
//! `PaymentsService` is the entry point. It depends only on the ports in `domain::ports`, so
//! the same flow runs against in-memory stores, RocksDB or a live processor.

pub mod charge;
pub mod hooks;
pub mod payments;
