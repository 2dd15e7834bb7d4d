use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-negative currency amount with two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    /// Parse a dollar-shaped token such as `45.00` or `$5.42`.
    pub fn parse(s: &str) -> Option<Self> {
        let clean = s.trim().trim_start_matches('$');
        let dec = Decimal::from_str(clean).ok()?;
        if dec.is_sign_negative() {
            return None;
        }
        Some(Money::from_decimal(dec))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// The largest representable amount.
    pub fn max() -> Self {
        Money(Decimal::from_parts(u32::MAX, u32::MAX, u32::MAX, false, 2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
