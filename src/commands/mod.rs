use std::sync::Arc;

use crate::domain::{LedgerError, ValidationError};

pub mod add_transaction;
pub mod balances;
pub mod spend_points;

pub struct DomainLogic<L> {
    ledger: Arc<L>,
}

impl<L> DomainLogic<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

impl<L> Clone for DomainLogic<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("ledger port error: {0:?}")]
    Ledger(#[from] crate::ports::ledger::Error),

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
}

/// Failure classes a calling layer maps to its own responses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidType,
    InvalidTimestampFormat,
    InvalidAmount,
    InsufficientFunds,
    DuplicateTimestamp,
    EmptyLedger,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use crate::ports::ledger::Error as PortError;

        match self {
            Error::Validation(err) => validation_kind(err),
            Error::Ledger(PortError::Ledger(err)) => ledger_kind(err),
            Error::Ledger(PortError::Adapter(_)) => ErrorKind::Internal,
        }
    }
}

fn validation_kind(err: &ValidationError) -> ErrorKind {
    match err {
        ValidationError::InvalidType { .. } => ErrorKind::InvalidType,
        ValidationError::InvalidTimestampFormat(_) => ErrorKind::InvalidTimestampFormat,
        ValidationError::InvalidAmount(_) => ErrorKind::InvalidAmount,
    }
}

fn ledger_kind(err: &LedgerError) -> ErrorKind {
    match err {
        LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
        LedgerError::InsufficientPayerFunds { .. } => ErrorKind::InsufficientFunds,
        LedgerError::DuplicateTimestamp(_) => ErrorKind::DuplicateTimestamp,
        LedgerError::EmptyLedger => ErrorKind::EmptyLedger,
        LedgerError::Validation(err) => validation_kind(err),
        LedgerError::Overflow | LedgerError::Internal(_) => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::Timestamp, ports::ledger::Error as PortError};
    use rstest::*;
    use speculoos::prelude::*;

    fn from_ledger(err: LedgerError) -> Error {
        Error::Ledger(PortError::Ledger(err))
    }

    fn invalid_payer() -> Error {
        Error::Validation(ValidationError::InvalidType {
            field: "payer",
            reason: "empty".into(),
        })
    }

    fn bad_timestamp() -> Error {
        Error::Validation(ValidationError::InvalidTimestampFormat("yesterday".into()))
    }

    fn insufficient() -> LedgerError {
        LedgerError::InsufficientFunds {
            available: 1,
            requested: 2,
        }
    }

    fn duplicate() -> LedgerError {
        let timestamp = Timestamp::parse("2020-10-31T10:00:00Z").unwrap();
        LedgerError::DuplicateTimestamp(timestamp)
    }

    #[rstest]
    #[case(invalid_payer(), ErrorKind::InvalidType)]
    #[case(bad_timestamp(), ErrorKind::InvalidTimestampFormat)]
    #[case(from_ledger(ValidationError::InvalidAmount(0).into()), ErrorKind::InvalidAmount)]
    #[case(from_ledger(insufficient()), ErrorKind::InsufficientFunds)]
    #[case(from_ledger(duplicate()), ErrorKind::DuplicateTimestamp)]
    #[case(from_ledger(LedgerError::EmptyLedger), ErrorKind::EmptyLedger)]
    #[case(from_ledger(LedgerError::Overflow), ErrorKind::Internal)]
    #[case(PortError::Adapter("lock poisoned".into()).into(), ErrorKind::Internal)]
    fn test_error_kind(#[case] err: Error, #[case] expected: ErrorKind) {
        assert_that!(err.kind()).is_equal_to(expected);
    }
}
