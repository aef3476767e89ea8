use std::collections::BTreeMap;

use crate::domain::{LedgerError, Payer, Receipt, Transaction};

#[mockall::automock]
#[async_trait::async_trait]
pub trait LedgerPort {
    async fn add_transaction(&self, transaction: Transaction) -> Result<(), Error>;
    async fn get_balance(&self, payer: Payer) -> Result<i64, Error>;
    async fn get_balances(&self) -> Result<BTreeMap<Payer, i64>, Error>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>, Error>;
    /// Spend points oldest-first, optionally restricted to a single payer
    async fn spend_points(&self, total: i64, payer: Option<Payer>) -> Result<Receipt, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level ledger errors
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as a poisoned lock.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
