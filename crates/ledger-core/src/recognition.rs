//! Structured fields extracted from a receipt or payment screenshot.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Direction of a bill. Also used to tag category trees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "BillTypeRepr")]
pub enum BillType {
    /// Money going out.
    #[default]
    Expense,
    /// Money coming in.
    Income,
}

impl BillType {
    /// Numeric code used by the storage layer (1 = expense, 2 = income).
    pub fn code(self) -> u8 {
        match self {
            Self::Expense => 1,
            Self::Income => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expense" | "1" => Ok(Self::Expense),
            "income" | "2" => Ok(Self::Income),
            other => Err(CoreError::UnknownBillType(other.to_string())),
        }
    }
}

impl TryFrom<u8> for BillType {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Expense),
            2 => Ok(Self::Income),
            other => Err(CoreError::UnknownBillType(other.to_string())),
        }
    }
}

/// Wire forms accepted for a bill type: a name or a numeric code.
#[derive(Deserialize)]
#[serde(untagged)]
enum BillTypeRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<BillTypeRepr> for BillType {
    type Error = CoreError;

    fn try_from(repr: BillTypeRepr) -> Result<Self, Self::Error> {
        match repr {
            BillTypeRepr::Code(code) => Self::try_from(code),
            // An unrecognized type comes back blank, same as null.
            BillTypeRepr::Name(name) if name.trim().is_empty() => Ok(Self::default()),
            BillTypeRepr::Name(name) => name.parse(),
        }
    }
}

/// A line item listed on the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default = "one", deserialize_with = "null_as_one")]
    pub quantity: u32,
}

/// Result of recognizing one payment image.
///
/// The recognizer is instructed to use an empty string or `null` for any
/// field it cannot determine, so every field tolerates both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Payment platform (WeChat Pay, Alipay, bank app, ...).
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform: String,

    /// Amount without currency symbol.
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount: f64,

    /// Merchant or counterparty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub merchant: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub bill_type: BillType,

    /// Top-level category name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,

    /// Second-level category name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_category: String,

    /// Payment time in RFC 3339, empty when it could not be read.
    #[serde(default, deserialize_with = "null_as_default")]
    pub pay_time: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub pay_method: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub order_no: String,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<RecognizedItem>,

    /// Recognition confidence in [0, 1].
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_one<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(1))
}

fn one() -> u32 {
    1
}
