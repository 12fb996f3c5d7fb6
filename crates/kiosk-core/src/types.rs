use crate::{
    Result,
    constants::{MAX_DISCOUNT_CENTS, MAX_DISCOUNT_DECIMALS},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Discount amount carried by a QR code, stored in cents.
///
/// Discount codes are written as a negative decimal (`-1`, `-0.90`, `-5.50`);
/// the amount is the absolute value and must lie in `(0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiscountAmount(u32);

impl DiscountAmount {
    /// Parse and validate a completed scan buffer.
    ///
    /// The accepted grammar is `-DIGITS[.D[D]]`, i.e. `^-(\d+(\.\d{1,2})?)$`,
    /// with digits restricted to ASCII.
    ///
    /// # Errors
    /// Returns `Error::InvalidCodeFormat` for anything that does not match the
    /// grammar or whose value falls outside `(0, 100]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiosk_core::DiscountAmount;
    ///
    /// let amount = DiscountAmount::parse_code("-1.50").unwrap();
    /// assert_eq!(amount.cents(), 150);
    /// assert_eq!(amount.as_f64(), 1.5);
    ///
    /// assert!(DiscountAmount::parse_code("99").is_err());
    /// assert!(DiscountAmount::parse_code("-500").is_err());
    /// ```
    pub fn parse_code(code: &str) -> Result<Self> {
        let body = code
            .strip_prefix('-')
            .ok_or_else(|| Error::invalid_code(code, "missing leading minus sign"))?;

        let (integer, fraction) = match body.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (body, None),
        };

        if integer.is_empty() || !integer.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_code(code, "integer part must be digits"));
        }

        let mut cents: u64 = 0;
        for digit in integer.bytes() {
            cents = cents
                .checked_mul(10)
                .and_then(|c| c.checked_add(u64::from(digit - b'0')))
                .ok_or_else(|| Error::invalid_code(code, "amount out of range"))?;
        }
        cents = cents
            .checked_mul(100)
            .ok_or_else(|| Error::invalid_code(code, "amount out of range"))?;

        if let Some(fraction) = fraction {
            if fraction.is_empty()
                || fraction.len() > MAX_DISCOUNT_DECIMALS
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(Error::invalid_code(
                    code,
                    format!("fraction must be 1-{MAX_DISCOUNT_DECIMALS} digits"),
                ));
            }
            let mut value: u64 = fraction.bytes().fold(0, |acc, b| acc * 10 + u64::from(b - b'0'));
            if fraction.len() == 1 {
                value *= 10;
            }
            cents += value;
        }

        if cents == 0 || cents > MAX_DISCOUNT_CENTS {
            return Err(Error::invalid_code(code, "amount out of range (0, 100]"));
        }

        Ok(Self(cents as u32))
    }

    /// Amount in cents.
    #[must_use]
    pub fn cents(&self) -> u32 {
        self.0
    }

    /// Amount as a floating value (e.g. `1.5`).
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for DiscountAmount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for DiscountAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// A completed, validated discount code.
///
/// Only ever built from a buffer that passed [`DiscountAmount::parse_code`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    /// Unique id of this scan.
    pub id: Uuid,

    /// Raw code as typed by the scanner (e.g. `-1.50`).
    pub code: String,

    /// Validated discount amount.
    pub amount: DiscountAmount,

    /// When the terminator key was received.
    pub scanned_at: DateTime<Utc>,
}

impl ScanResult {
    /// Validate a completed buffer and stamp it with the current time.
    ///
    /// # Errors
    /// Returns `Error::InvalidCodeFormat` when the buffer is not a valid
    /// discount code.
    pub fn from_code(code: &str) -> Result<Self> {
        Self::from_code_at(code, Utc::now())
    }

    /// Same as [`ScanResult::from_code`] with an explicit timestamp.
    pub fn from_code_at(code: &str, scanned_at: DateTime<Utc>) -> Result<Self> {
        let amount = DiscountAmount::parse_code(code)?;
        Ok(Self {
            id: Uuid::new_v4(),
            code: code.to_string(),
            amount,
            scanned_at,
        })
    }
}

/// Liveness answer of an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub ok: bool,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl Health {
    #[must_use]
    pub fn ok(service: &'static str) -> Self {
        Self {
            ok: true,
            service,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("-1", 100)]
    #[case("-0.90", 90)]
    #[case("-5.50", 550)]
    #[case("-1.5", 150)]
    #[case("-0.05", 5)]
    #[case("-100", 10_000)]
    #[case("-100.00", 10_000)]
    #[case("-007", 700)]
    fn test_parse_code_valid(#[case] code: &str, #[case] cents: u32) {
        let amount = DiscountAmount::parse_code(code).unwrap();
        assert_eq!(amount.cents(), cents);
    }

    #[rstest]
    #[case("")] // empty
    #[case("99")] // no sign
    #[case("+5")] // wrong sign
    #[case("-")] // sign only
    #[case("--5")] // double sign
    #[case("-5.")] // empty fraction
    #[case("-.5")] // empty integer
    #[case("-5.123")] // too many decimals
    #[case("-5,50")] // comma is not a decimal point
    #[case("-1.2.3")] // two points
    #[case("-0")] // zero
    #[case("-0.00")] // zero
    #[case("-500")] // above range
    #[case("-100.01")] // just above range
    #[case("-99999999999999999999999")] // overflow
    #[case("-5a")] // not numeric
    fn test_parse_code_invalid(#[case] code: &str) {
        let result = DiscountAmount::parse_code(code);
        assert!(
            matches!(result, Err(Error::InvalidCodeFormat { .. })),
            "{code:?} should be rejected"
        );
    }

    #[test]
    fn test_amount_display_and_float() {
        let amount = DiscountAmount::parse_code("-1.5").unwrap();
        assert_eq!(amount.to_string(), "1.50");
        assert_eq!(amount.as_f64(), 1.5);
    }

    #[test]
    fn test_scan_result_serializes_amount_as_number() {
        let at = Utc.with_ymd_and_hms(2025, 10, 16, 9, 30, 0).unwrap();
        let result = ScanResult::from_code_at("-2.25", at).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["code"], "-2.25");
        assert_eq!(json["amount"], 2.25);
        assert_eq!(result.scanned_at, at);
    }

    #[test]
    fn test_scan_result_ids_are_unique() {
        let a = ScanResult::from_code("-1").unwrap();
        let b = ScanResult::from_code("-1").unwrap();
        assert_ne!(a.id, b.id);
    }

    proptest! {
        #[test]
        fn prop_in_range_codes_accepted(cents in 1u32..=10_000) {
            let code = format!("-{}.{:02}", cents / 100, cents % 100);
            let amount = DiscountAmount::parse_code(&code).unwrap();
            prop_assert_eq!(amount.cents(), cents);
        }

        #[test]
        fn prop_unsigned_codes_rejected(value in "[0-9]{1,6}(\\.[0-9]{1,2})?") {
            prop_assert!(DiscountAmount::parse_code(&value).is_err());
        }
    }
}
