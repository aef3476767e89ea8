use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{Payer, Timestamp, Transaction},
    ports::ledger::LedgerPort,
};
use tower::Service;
use tracing::{info_span, Instrument};

use super::{DomainLogic, Error};

/// Raw transaction fields, as received by the calling layer
pub struct AddTransactionRequest {
    pub payer: String,
    pub points: i64,
    /// `YYYY-MM-DDThh:mm:ssZ`
    pub timestamp: String,
}

impl AddTransactionRequest {
    fn parse(self) -> Result<Transaction, Error> {
        let payer = Payer::new(self.payer)?;
        let timestamp = Timestamp::parse(&self.timestamp)?;
        Ok(Transaction::new(payer, self.points, timestamp))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct AddTransactionResponse {
    pub transaction: Transaction,
    /// Balance of the payer once the transaction is recorded
    pub payer_balance: i64,
}

impl<L> Service<AddTransactionRequest> for DomainLogic<L>
where
    L: LedgerPort + 'static,
{
    type Response = AddTransactionResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: AddTransactionRequest) -> Self::Future {
        let ledger = self.ledger.clone();
        let span = info_span!(
            "add_transaction",
            payer = %req.payer,
            points = req.points,
            timestamp = %req.timestamp
        );
        Box::pin(
            async move {
                // Reject malformed fields before touching the ledger
                let transaction = req.parse()?;

                ledger.add_transaction(transaction.clone()).await?;
                let payer_balance = ledger.get_balance(transaction.payer.clone()).await?;

                Ok(AddTransactionResponse {
                    transaction,
                    payer_balance,
                })
            }
            .instrument(span),
        )
    }
}
