use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{Payer, Transaction},
    ports::ledger::LedgerPort,
};
use tower::Service;

use super::{DomainLogic, Error};

/// Balance of every payer
pub struct GetBalancesRequest;

/// Balance of a single payer
pub struct GetBalanceRequest {
    pub payer: String,
}

/// Every stored transaction, oldest first
pub struct ListTransactionsRequest;

impl<L> Service<GetBalancesRequest> for DomainLogic<L>
where
    L: LedgerPort + 'static,
{
    type Response = BTreeMap<Payer, i64>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: GetBalancesRequest) -> Self::Future {
        let ledger = self.ledger.clone();
        Box::pin(async move { Ok(ledger.get_balances().await?) })
    }
}

impl<L> Service<GetBalanceRequest> for DomainLogic<L>
where
    L: LedgerPort + 'static,
{
    type Response = i64;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetBalanceRequest) -> Self::Future {
        let ledger = self.ledger.clone();
        Box::pin(async move {
            let payer = Payer::new(req.payer)?;
            Ok(ledger.get_balance(payer).await?)
        })
    }
}

impl<L> Service<ListTransactionsRequest> for DomainLogic<L>
where
    L: LedgerPort + 'static,
{
    type Response = Vec<Transaction>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ListTransactionsRequest) -> Self::Future {
        let ledger = self.ledger.clone();
        Box::pin(async move { Ok(ledger.list_transactions().await?) })
    }
}
