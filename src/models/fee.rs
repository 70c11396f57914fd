// src/models/fee.rs

use serde::Serialize;
use sqlx::prelude::FromRow;

/// Represents the 'fee_receipts' table. Amounts are integer cents; the
/// client formats currency.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeeReceipt {
    pub id: i64,
    pub receipt_no: String,
    pub term: String,
    pub amount_cents: i64,
    pub paid_at: chrono::DateTime<chrono::Utc>,
}
