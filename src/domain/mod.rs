//! Entities, pure pricing/entitlement logic and the ports the application layer depends on.

pub mod entitlement;
pub mod gateway;
pub mod money;
pub mod ports;
pub mod pricing;
pub mod profile;
pub mod seat;
pub mod subscription;
pub mod transaction;
