use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::fmt;
use uuid::Uuid;

pub mod ledger;
mod spend;

pub use ledger::{Ledger, LedgerError};

/// Wire format for transaction timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Entity responsible for a subset of point grants and clawbacks
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payer(String);

impl Payer {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidType {
                field: "payer",
                reason: "must be a non-empty string".into(),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Instant of a transaction, with second precision
///
/// Timestamps are unique across the whole ledger and double as transaction identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Parse a `YYYY-MM-DDThh:mm:ssZ` string
    ///
    /// Every field must have its full width, so `2020-1-2T3:4:5Z` is rejected, and a
    /// leap second is not accepted.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTimestampFormat(input.to_string());
        if !has_timestamp_shape(input) {
            return Err(invalid());
        }

        let naive = NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT)
            .map_err(|_| invalid())?;
        // chrono reads `:60` as a leap second carried in the nanoseconds
        if naive.nanosecond() != 0 {
            return Err(invalid());
        }

        Ok(Self(naive.and_utc()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

fn has_timestamp_shape(input: &str) -> bool {
    if input.len() != 20 {
        return false;
    }

    input.bytes().enumerate().all(|(i, byte)| match i {
        4 | 7 => byte == b'-',
        10 => byte == b'T',
        13 | 16 => byte == b':',
        19 => byte == b'Z',
        _ => byte.is_ascii_digit(),
    })
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// A single timestamped point delta attributed to one payer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub payer: Payer,
    /// Difference in points
    ///
    /// A negative number is a clawback of points previously granted by the payer.
    pub points: i64,
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn new(payer: Payer, points: i64, timestamp: Timestamp) -> Self {
        Self {
            payer,
            points,
            timestamp,
        }
    }
}

/// Points withdrawn from one payer during a spend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptLine {
    pub payer: Payer,
    /// Always negative
    pub points: i64,
}

/// Per-payer breakdown of a spend
///
/// Lines are kept in the order each payer was first drawn from.
#[derive(Clone, Debug)]
pub struct Receipt {
    pub receipt_id: Uuid,
    lines: Vec<ReceiptLine>,
}

impl Receipt {
    pub(crate) fn new() -> Self {
        Self {
            receipt_id: Uuid::new_v4(),
            lines: Vec::new(),
        }
    }

    /// Record `points` withdrawn from `payer`
    pub(crate) fn withdraw(&mut self, payer: &Payer, points: i64) {
        if points == 0 {
            return;
        }
        match self.lines.iter_mut().find(|line| &line.payer == payer) {
            Some(line) => line.points -= points,
            None => self.lines.push(ReceiptLine {
                payer: payer.clone(),
                points: -points,
            }),
        }
    }

    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }

    /// Points withdrawn from `payer`, as a negative number
    pub fn get(&self, payer: &Payer) -> Option<i64> {
        self.lines
            .iter()
            .find(|line| &line.payer == payer)
            .map(|line| line.points)
    }

    /// Sum of every line, i.e. minus the spent total
    pub fn total(&self) -> i64 {
        self.lines.iter().map(|line| line.points).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Receipts compare by content; the identifier is unique per spend.
impl PartialEq for Receipt {
    fn eq(&self, other: &Self) -> bool {
        self.lines == other.lines
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field}: {reason}")]
    InvalidType {
        field: &'static str,
        reason: std::borrow::Cow<'static, str>,
    },

    #[error("invalid timestamp {0:?}, expected YYYY-MM-DDThh:mm:ssZ")]
    InvalidTimestampFormat(String),

    /// Spend amounts must be strictly positive
    #[error("invalid amount {0}, expected a positive integer")]
    InvalidAmount(i64),
}

/// Check a requested spend amount
pub fn validate_amount(points: i64) -> Result<i64, ValidationError> {
    if points <= 0 {
        return Err(ValidationError::InvalidAmount(points));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;

    #[rstest]
    #[case("2020-11-02T14:00:00Z")]
    #[case("1999-01-01T00:00:00Z")]
    fn test_timestamp_parse_display(#[case] input: &str) {
        let res = Timestamp::parse(input);
        assert_that!(res)
            .is_ok()
            .matches(|ts| ts.to_string() == input);
    }

    #[rstest]
    #[case("2020-11-02 14:00:00")]
    #[case("2020-11-02T14:00:00")]
    #[case("2020-11-02T14:00:00.000Z")]
    #[case("2020-13-02T14:00:00Z")]
    #[case("2020-1-2T3:4:5Z")]
    #[case("+12020-01-01T00:00:00Z")]
    #[case(" 2020-11-02T14:00:00Z")]
    #[case("2020-11-02T14:00:00Z ")]
    #[case("2020-11-02T14:00:60Z")]
    #[case("2020-11-02T14:00:00z")]
    #[case("")]
    fn test_timestamp_parse_invalid(#[case] input: &str) {
        assert_that!(Timestamp::parse(input))
            .is_err()
            .is_equal_to(ValidationError::InvalidTimestampFormat(input.to_string()));
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::parse("2020-10-31T10:00:00Z").unwrap();
        let later = Timestamp::parse("2020-10-31T11:00:00Z").unwrap();
        assert_that!(earlier).is_less_than(later);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_payer_empty(#[case] input: &str) {
        assert_that!(Payer::new(input))
            .is_err()
            .matches(|err| matches!(err, ValidationError::InvalidType { field: "payer", .. }));
    }

    #[rstest]
    #[case(0)]
    #[case(-10)]
    fn test_validate_amount_invalid(#[case] points: i64) {
        assert_that!(validate_amount(points))
            .is_err()
            .is_equal_to(ValidationError::InvalidAmount(points));
    }

    #[test]
    fn test_receipt_accumulates_per_payer() {
        let a = Payer::new("A").unwrap();
        let b = Payer::new("B").unwrap();
        let mut receipt = Receipt::new();

        receipt.withdraw(&b, 200);
        receipt.withdraw(&a, 0);
        receipt.withdraw(&a, 100);
        receipt.withdraw(&b, 50);

        assert_that!(receipt.lines().to_vec()).is_equal_to(vec![
            ReceiptLine {
                payer: b,
                points: -250,
            },
            ReceiptLine {
                payer: a,
                points: -100,
            },
        ]);
        assert_that!(receipt.total()).is_equal_to(-350);
    }
}
