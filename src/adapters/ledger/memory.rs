use crate::{
    config::LedgerConfig,
    domain::{Ledger, Payer, Receipt, Transaction},
    ports::ledger::{Error, LedgerPort},
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

/// In-process ledger
///
/// Every operation holds the lock for its whole duration, so mutations never interleave
/// and a spend cannot draw twice from the same entry. Contents are lost when the process
/// exits.
#[derive(Clone, Debug)]
pub struct MemoryLedger {
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(config.duplicate_timestamps))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, Error> {
        Ok(self.ledger.lock()?)
    }
}

#[async_trait::async_trait]
impl LedgerPort for MemoryLedger {
    async fn add_transaction(&self, transaction: Transaction) -> Result<(), Error> {
        let mut ledger = self.lock()?;
        let (payer, points, timestamp) = (
            transaction.payer.clone(),
            transaction.points,
            transaction.timestamp,
        );

        match ledger.add_transaction(transaction) {
            Ok(()) => {
                info!(%payer, points, %timestamp, "transaction added");
                Ok(())
            }
            Err(err) => {
                warn!(%payer, points, %timestamp, error = %err, "transaction rejected");
                Err(err.into())
            }
        }
    }

    async fn get_balance(&self, payer: Payer) -> Result<i64, Error> {
        Ok(self.lock()?.balance(&payer))
    }

    async fn get_balances(&self) -> Result<BTreeMap<Payer, i64>, Error> {
        Ok(self.lock()?.balances()?)
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, Error> {
        Ok(self.lock()?.transactions())
    }

    async fn spend_points(&self, total: i64, payer: Option<Payer>) -> Result<Receipt, Error> {
        let mut ledger = self.lock()?;
        let res = match &payer {
            Some(payer) => ledger.spend_from(payer, total),
            None => ledger.spend(total),
        };

        match res {
            Ok(receipt) => {
                info!(
                    receipt_id = %receipt.receipt_id,
                    total,
                    payers = receipt.lines().len(),
                    "points spent"
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(total, error = %err, "spend rejected");
                Err(err.into())
            }
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
