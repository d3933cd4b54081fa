//! Bills persisted from recognition results.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BillId, BillType, CategoryId, RecognitionResult, UserId};

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,

    /// Externally visible identifier.
    pub uuid: Uuid,

    pub user_id: UserId,

    /// Amount in minor units (cents).
    pub amount_cents: i64,

    pub bill_type: BillType,

    pub platform: String,

    pub merchant: String,

    /// Resolved category, if the recognized names matched one.
    pub category_id: Option<CategoryId>,

    pub pay_time: DateTime<FixedOffset>,

    pub pay_method: String,

    pub order_no: String,

    pub remark: String,

    pub image_path: String,

    pub confidence: f64,

    /// Recognized bills stay unconfirmed until the user reviews them.
    pub is_confirmed: bool,

    pub items: Vec<BillItem>,

    pub created_at: DateTime<Utc>,
}

/// A line item of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub name: String,
    pub price_cents: i64,
    pub quantity: u32,
}

impl Bill {
    /// Build an unconfirmed bill from a recognition result.
    ///
    /// A missing or unparseable pay time falls back to `now`.
    pub fn from_recognition(
        id: BillId,
        user_id: UserId,
        result: &RecognitionResult,
        category_id: Option<CategoryId>,
        image_path: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let pay_time = DateTime::parse_from_rfc3339(result.pay_time.trim())
            .unwrap_or_else(|_| now.fixed_offset());

        Self {
            id,
            uuid: Uuid::new_v4(),
            user_id,
            amount_cents: to_cents(result.amount),
            bill_type: result.bill_type,
            platform: result.platform.clone(),
            merchant: result.merchant.clone(),
            category_id,
            pay_time,
            pay_method: result.pay_method.clone(),
            order_no: result.order_no.clone(),
            remark: String::new(),
            image_path: image_path.into(),
            confidence: result.confidence,
            is_confirmed: false,
            items: result
                .items
                .iter()
                .map(|item| BillItem {
                    name: item.name.clone(),
                    price_cents: to_cents(item.price),
                    quantity: item.quantity,
                })
                .collect(),
            created_at: now,
        }
    }
}

/// Convert a decimal amount to cents, rounding half away from zero.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
