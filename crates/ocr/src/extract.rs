use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use slipscan_core::{
    DocumentText, ExtractedFields, ExtractionConfig, Money, PurchaseTime, TotalSource,
};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Unanchored: OCR output often drops the space before a date ("Date05/20/24").
// The year group takes every following digit; `capture_date` decides its width.

// 17:52 05/20/24
re!(re_time_then_date,
    r"(\d{1,2}):(\d{2})\s+(\d{1,2})[/-](\d{1,2})[/-](\d{2,})");
// 5/25/24 11:31 AM, 05/25/24 9:00pm
re!(re_date_then_meridiem,
    r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,})\s+(\d{1,2}):(\d{2})\s?([AaPp][Mm])");
// 05/24/24
re!(re_date_only,
    r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,})");

// SUBTOTAL also carries the label.
re!(re_labeled_total,
    r"(?i)TOTAL[:\s]*\$?(\d+\.\d{2})");
re!(re_dollar_amount,
    r"\$?(\d+\.\d{2})");

// ── Public extraction API ─────────────────────────────────────────────────────

/// Derives merchant, purchase time and total from recognized receipt text.
///
/// Extraction never fails: fields that cannot be found come back as the
/// configured merchant sentinel or `None`.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    config: ExtractionConfig,
}

impl FieldExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extract(&self, doc: &DocumentText) -> ExtractedFields {
        let text = doc.full_text.as_str();
        let merchant_name = extract_merchant(text, &self.config);
        let purchased_at = extract_purchased_at(text);
        let total = extract_total(text);

        tracing::debug!(
            merchant = %merchant_name,
            purchased_at = ?purchased_at.map(|t| t.to_string()),
            total = ?total.map(|(amount, _)| amount.to_string()),
            "Extracted receipt fields"
        );

        ExtractedFields {
            merchant_name,
            purchased_at,
            total_amount: total.map(|(amount, _)| amount),
            total_source: total.map(|(_, source)| source),
            source_path: doc.source_path.clone(),
        }
    }

    /// Shorthand for text that did not come from page aggregation.
    pub fn extract_text(&self, text: &str) -> ExtractedFields {
        self.extract(&DocumentText::from_text(text))
    }
}

// ── Merchant ──────────────────────────────────────────────────────────────────

/// First non-numeric line among the leading non-blank lines, title-cased.
pub fn extract_merchant(text: &str, config: &ExtractionConfig) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(config.merchant_scan_lines)
        .find(|l| !is_mostly_numeric(l, config.numeric_line_ratio))
        .map(title_case)
        .unwrap_or_else(|| config.unknown_merchant.clone())
}

/// Barcodes, store numbers and timestamps at the top of a receipt are mostly digits.
fn is_mostly_numeric(line: &str, ratio: f64) -> bool {
    let total = line.chars().count();
    let digits = line.chars().filter(char::is_ascii_digit).count();
    digits as f64 >= total as f64 * ratio
}

/// Upper-cases a letter unless it continues a word; lower-cases the rest.
/// `7-ELEVEN` becomes `7-Eleven`, `MCDONALD'S` becomes `Mcdonald's`.
fn title_case(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_word = false;
    for c in line.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            in_word = in_word && c == '\'';
            out.push(c);
        }
    }
    out
}

// ── Purchase date/time ────────────────────────────────────────────────────────

struct DateRule {
    name: &'static str,
    pattern: fn() -> &'static Regex,
    parse: fn(&Captures<'_>) -> Option<NaiveDateTime>,
}

/// Tried in order; the first rule whose first match parses wins.
const DATE_RULES: [DateRule; 3] = [
    DateRule { name: "time_then_date", pattern: re_time_then_date, parse: parse_time_then_date },
    DateRule {
        name: "date_then_meridiem",
        pattern: re_date_then_meridiem,
        parse: parse_date_then_meridiem,
    },
    DateRule { name: "date_only", pattern: re_date_only, parse: parse_date_only },
];

pub fn extract_purchased_at(text: &str) -> Option<PurchaseTime> {
    DATE_RULES
        .iter()
        .find_map(|rule| {
            let caps = (rule.pattern)().captures(text)?;
            let parsed = (rule.parse)(&caps);
            if parsed.is_none() {
                tracing::debug!(
                    rule = rule.name,
                    matched = caps.get(0).map_or("", |m| m.as_str()),
                    "Date pattern matched but is not a valid date; trying next rule"
                );
            }
            parsed
        })
        .map(PurchaseTime::new)
}

fn parse_time_then_date(c: &Captures<'_>) -> Option<NaiveDateTime> {
    let hour: u32 = capture(c, 1)?;
    let minute: u32 = capture(c, 2)?;
    let date = capture_date(c, 3)?;
    date.and_hms_opt(hour, minute, 0)
}

fn parse_date_then_meridiem(c: &Captures<'_>) -> Option<NaiveDateTime> {
    let date = capture_date(c, 1)?;
    let hour12: u32 = capture(c, 4)?;
    let minute: u32 = capture(c, 5)?;
    let pm = c.get(6)?.as_str().eq_ignore_ascii_case("pm");
    date.and_hms_opt(to_24_hour(hour12, pm)?, minute, 0)
}

fn parse_date_only(c: &Captures<'_>) -> Option<NaiveDateTime> {
    capture_date(c, 1)?.and_hms_opt(0, 0, 0)
}

fn capture<T: FromStr>(c: &Captures<'_>, group: usize) -> Option<T> {
    c.get(group)?.as_str().parse().ok()
}

/// Month, day and year in three consecutive groups starting at `first` (US order).
/// A year run of exactly four digits is a full year; otherwise its first two
/// digits are a `%y` year and the rest is trailing noise.
fn capture_date(c: &Captures<'_>, first: usize) -> Option<NaiveDate> {
    let month: u32 = capture(c, first)?;
    let day: u32 = capture(c, first + 1)?;
    let year_digits = c.get(first + 2)?.as_str();
    let year = match year_digits.len() {
        4 => year_digits.parse().ok()?,
        _ => expand_year(year_digits.get(..2)?.parse().ok()?),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// POSIX `%y` pivot: 69–99 are 19xx, 00–68 are 20xx.
fn expand_year(yy: i32) -> i32 {
    if yy >= 69 { 1900 + yy } else { 2000 + yy }
}

fn to_24_hour(hour12: u32, pm: bool) -> Option<u32> {
    if !(1..=12).contains(&hour12) {
        return None;
    }
    Some(hour12 % 12 + if pm { 12 } else { 0 })
}

// ── Total ─────────────────────────────────────────────────────────────────────

/// A `TOTAL`-labeled amount wins outright; otherwise the largest dollar amount.
pub fn extract_total(text: &str) -> Option<(Money, TotalSource)> {
    if let Some(caps) = re_labeled_total().captures(text) {
        return amount_from(caps.get(1)?.as_str()).map(|amount| (amount, TotalSource::Labeled));
    }
    re_dollar_amount()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .max_by(|a, b| compare_amounts(a, b))
        .and_then(amount_from)
        .map(|amount| (amount, TotalSource::LargestAmount))
}

/// Orders `d+.dd` strings by value without converting them.
fn compare_amounts(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Amounts beyond what `Money` can hold saturate at `Money::max()`.
fn amount_from(digits: &str) -> Option<Money> {
    Money::parse(digits).or_else(|| {
        tracing::warn!(amount = digits, "Amount out of range, clamping");
        Some(Money::max())
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
