use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{validate_amount, Payer, Receipt},
    ports::ledger::LedgerPort,
};
use tower::Service;
use tracing::{info_span, Instrument};

use super::{DomainLogic, Error};

pub struct SpendPointsRequest {
    /// Points to spend, must be positive
    pub points: i64,
    /// Only spend from this payer when set
    pub payer: Option<String>,
}

impl<L> Service<SpendPointsRequest> for DomainLogic<L>
where
    L: LedgerPort + 'static,
{
    type Response = Receipt;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SpendPointsRequest) -> Self::Future {
        let ledger = self.ledger.clone();
        let span = info_span!("spend_points", points = req.points, payer = ?req.payer);
        Box::pin(
            async move {
                let points = validate_amount(req.points)?;
                let payer = req.payer.map(Payer::new).transpose()?;

                Ok(ledger.spend_points(points, payer).await?)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::ledger::memory::MemoryLedger,
        commands::{add_transaction::AddTransactionRequest, ErrorKind},
        ports::ledger::MockLedgerPort,
    };
    use mockall::predicate::*;
    use rstest::*;
    use speculoos::prelude::*;
    use std::sync::Arc;
    use tower::{BoxError, ServiceExt};

    /// Ledger loaded with grants and a clawback across three payers
    #[fixture]
    async fn domain() -> DomainLogic<MemoryLedger> {
        let domain = DomainLogic::new(Arc::new(MemoryLedger::default()));
        for (payer, points, timestamp) in [
            ("A", 1000, "2020-11-02T14:00:00Z"),
            ("B", 200, "2020-10-31T11:00:00Z"),
            ("A", -200, "2020-10-31T15:00:00Z"),
            ("C", 10000, "2020-11-01T14:00:00Z"),
            ("A", 300, "2020-10-31T10:00:00Z"),
        ] {
            domain
                .clone()
                .oneshot(AddTransactionRequest {
                    payer: payer.to_string(),
                    points,
                    timestamp: timestamp.to_string(),
                })
                .await
                .unwrap();
        }
        domain
    }

    fn lines(receipt: &Receipt) -> Vec<(String, i64)> {
        receipt
            .lines()
            .iter()
            .map(|line| (line.payer.to_string(), line.points))
            .collect()
    }

    #[rstest]
    #[tokio::test]
    async fn test_call(#[future] domain: DomainLogic<MemoryLedger>) -> Result<(), BoxError> {
        // GIVEN a ledger with balances A: 1100, B: 200, C: 10000
        let domain = domain.await;

        // WHEN spending 5000 points
        let receipt = domain
            .clone()
            .oneshot(SpendPointsRequest {
                points: 5000,
                payer: None,
            })
            .await?;

        // THEN the oldest points are spent first, after A's clawback is settled
        let expected = vec![
            ("A".to_string(), -100),
            ("B".to_string(), -200),
            ("C".to_string(), -4700),
        ];
        assert_that!(lines(&receipt)).is_equal_to(expected);
        assert_that!(receipt.total()).is_equal_to(-5000);

        Ok(())
    }

    #[rstest]
    #[case(0)]
    #[case(-100)]
    #[tokio::test]
    async fn test_call_invalid_amount(#[case] points: i64) {
        let domain = DomainLogic::new(Arc::new(MockLedgerPort::new()));

        let res = domain
            .oneshot(SpendPointsRequest { points, payer: None })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::InvalidAmount);
    }

    #[tokio::test]
    async fn test_call_invalid_payer() {
        let domain = DomainLogic::new(Arc::new(MockLedgerPort::new()));

        let res = domain
            .oneshot(SpendPointsRequest {
                points: 10,
                payer: Some(" ".to_string()),
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::InvalidType);
    }

    #[rstest]
    #[tokio::test]
    async fn test_call_insufficient(#[future] domain: DomainLogic<MemoryLedger>) {
        let domain = domain.await;

        let res = domain
            .clone()
            .oneshot(SpendPointsRequest {
                points: 11301,
                payer: None,
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_call_single_payer() -> Result<(), BoxError> {
        // GIVEN a ledger port expecting a spend restricted to one payer
        let mut ledger = MockLedgerPort::new();
        ledger
            .expect_spend_points()
            .times(1)
            .with(eq(25), eq(Some(Payer::new("C")?)))
            .returning(|_, _| Ok(Receipt::new()));
        let ledger = Arc::new(ledger);
        let domain = DomainLogic::new(ledger.clone());

        // WHEN calling the service with a payer
        let res = domain
            .oneshot(SpendPointsRequest {
                points: 25,
                payer: Some("C".to_string()),
            })
            .await;

        // THEN the payer is passed through to the port
        assert_that!(res).is_ok();
        Arc::into_inner(ledger).unwrap().checkpoint();

        Ok(())
    }
}
