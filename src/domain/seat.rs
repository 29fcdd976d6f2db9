use crate::domain::pricing::{DurationMonths, SessionsPerDay};
use crate::error::PaymentError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trimmed, non-empty batch name. Comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchName(String);

impl BatchName {
    pub fn new(raw: &str) -> Result<Self, PaymentError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PaymentError::ValidationError(
                "batch name must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Named grouping of candidates owned by a partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub partner_id: String,
    pub name: BatchName,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(partner_id: &str, name: BatchName) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            partner_id: partner_id.to_string(),
            name,
            created_at: Utc::now(),
        }
    }
}

/// Capacity purchased for a batch. At most one exists per (partner, batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    pub partner_id: String,
    pub batch_id: String,
    pub seat_count: u32,
    pub seats_assigned: u32,
    pub sessions_per_day: SessionsPerDay,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub renewal_interval_days: u32,
    pub is_active: bool,
    /// Ledger entry that paid for this seat.
    pub transaction_id: String,
}

/// Parameters for a seat allocation that has already been paid for.
#[derive(Debug, Clone)]
pub struct SeatGrant {
    pub partner_id: String,
    pub batch_id: String,
    pub seat_count: u32,
    pub sessions_per_day: SessionsPerDay,
    pub months: DurationMonths,
    pub transaction_id: String,
}

impl Seat {
    pub fn provision(
        grant: SeatGrant,
        start_date: DateTime<Utc>,
        days_per_month: i64,
        renewal_interval_days: u32,
    ) -> Result<Self, PaymentError> {
        let end_date = i64::from(grant.months.months())
            .checked_mul(days_per_month)
            .filter(|days| *days > 0)
            .and_then(Duration::try_days)
            .and_then(|span| start_date.checked_add_signed(span))
            .ok_or_else(|| {
                PaymentError::ValidationError(format!(
                    "{} month(s) of {} days is not a valid seat term",
                    grant.months.months(),
                    days_per_month
                ))
            })?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            partner_id: grant.partner_id,
            batch_id: grant.batch_id,
            seat_count: grant.seat_count,
            seats_assigned: 0,
            sessions_per_day: grant.sessions_per_day,
            start_date,
            end_date,
            renewal_interval_days,
            is_active: true,
            transaction_id: grant.transaction_id,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }

    pub fn available_seats(&self) -> u32 {
        self.seat_count.saturating_sub(self.seats_assigned)
    }
}
