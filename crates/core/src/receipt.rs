use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::money::Money;

/// Format of every extracted purchase time, regardless of how the receipt printed it.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Purchase date and time, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PurchaseTime(NaiveDateTime);

impl PurchaseTime {
    pub fn new(at: NaiveDateTime) -> Self {
        PurchaseTime(at)
    }

    pub fn datetime(self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for PurchaseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for PurchaseTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, CANONICAL_FORMAT).map(PurchaseTime)
    }
}

impl From<PurchaseTime> for String {
    fn from(t: PurchaseTime) -> Self {
        t.to_string()
    }
}

impl TryFrom<String> for PurchaseTime {
    type Error = chrono::ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// How the total amount was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSource {
    /// Amount following a `TOTAL` label.
    Labeled,
    /// Largest dollar-shaped amount anywhere in the text.
    LargestAmount,
}

impl fmt::Display for TotalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalSource::Labeled => write!(f, "labeled"),
            TotalSource::LargestAmount => write!(f, "largest_amount"),
        }
    }
}

/// Best-effort structured fields read from a receipt's OCR text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// Never empty; the configured sentinel when nothing qualified.
    pub merchant_name: String,
    pub purchased_at: Option<PurchaseTime>,
    pub total_amount: Option<Money>,
    pub total_source: Option<TotalSource>,
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Extracted fields that carry everything persistence requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub merchant_name: String,
    pub purchased_at: Option<PurchaseTime>,
    pub total_amount: Money,
    pub source_path: Option<PathBuf>,
}

impl ReceiptRecord {
    pub fn validate(fields: ExtractedFields) -> Result<ReceiptRecord, RecordError> {
        let mut missing = Vec::new();
        if fields.merchant_name.trim().is_empty() {
            missing.push("merchant_name");
        }
        if fields.total_amount.is_none() {
            missing.push("total_amount");
        }

        match fields.total_amount {
            Some(total_amount) if missing.is_empty() => Ok(ReceiptRecord {
                merchant_name: fields.merchant_name,
                purchased_at: fields.purchased_at,
                total_amount,
                source_path: fields.source_path,
            }),
            _ => Err(RecordError::MissingFields(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> PurchaseTime {
        PurchaseTime::new(NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, 0).unwrap())
    }

    fn fields(merchant: &str, total: Option<Money>) -> ExtractedFields {
        ExtractedFields {
            merchant_name: merchant.to_string(),
            purchased_at: Some(at(2024, 5, 20, 17, 52)),
            total_amount: total,
            total_source: total.map(|_| TotalSource::Labeled),
            source_path: Some(PathBuf::from("uploads/r.pdf")),
        }
    }

    #[test]
    fn purchase_time_canonical_display() {
        assert_eq!(at(2024, 5, 25, 9, 0).to_string(), "2024-05-25 09:00");
    }

    #[test]
    fn purchase_time_serde_uses_canonical_string() {
        let t = at(2024, 5, 20, 17, 52);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2024-05-20 17:52\"");
        let back: PurchaseTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<PurchaseTime>("\"yesterday\"").is_err());
    }

    #[test]
    fn record_accepts_complete_fields() {
        let record = ReceiptRecord::validate(fields("7-Eleven", Some(Money::from_cents(542)))).unwrap();
        assert_eq!(record.total_amount, Money::from_cents(542));
        assert_eq!(record.source_path, Some(PathBuf::from("uploads/r.pdf")));
    }

    #[test]
    fn record_rejects_missing_total() {
        let err = ReceiptRecord::validate(fields("Unknown", None)).unwrap_err();
        assert_eq!(err, RecordError::MissingFields(vec!["total_amount"]));
        assert_eq!(err.to_string(), "missing required fields: total_amount");
    }

    #[test]
    fn record_names_every_missing_field() {
        let err = ReceiptRecord::validate(fields("  ", None)).unwrap_err();
        assert_eq!(err.to_string(), "missing required fields: merchant_name, total_amount");
    }
}
