//! Oldest-first depletion of the ledger
//!
//! Points are always taken from the oldest entry in the ledger, whichever payer it
//! belongs to. Before a payer's entry is drawn from, any clawback that payer holds is
//! netted against its earliest positive entries, so an outstanding negative entry is
//! never spent around.
//!
//! Every write a spend makes is journaled and undone if the spend fails part way.

use std::collections::BTreeSet;

use tracing::debug;

use super::{
    ledger::{to_points, Ledger, LedgerError},
    validate_amount, Payer, Receipt, Timestamp,
};

fn ran_out() -> LedgerError {
    LedgerError::Internal("ran out of entries before the spend completed".into())
}

fn missing_entry() -> LedgerError {
    LedgerError::Internal("timeline entry missing from its payer".into())
}

fn uncovered() -> LedgerError {
    LedgerError::Internal("clawback exceeds every positive entry".into())
}

impl Ledger {
    /// Spend `total` points across all payers, oldest entries first
    pub fn spend(&mut self, total: i64) -> Result<Receipt, LedgerError> {
        let total = validate_amount(total)?;
        let available = self.total_balance();
        if available < i128::from(total) {
            return Err(LedgerError::InsufficientFunds {
                available: to_points(available),
                requested: total,
            });
        }

        self.atomically(|ledger| {
            let mut receipt = Receipt::new();
            let mut remaining = total;
            while remaining > 0 {
                let (timestamp, payer, points) = ledger.oldest_spendable()?;
                let withdrawn = remaining.min(points);
                ledger.reduce_entry(&payer, timestamp, withdrawn);
                receipt.withdraw(&payer, withdrawn);
                remaining -= withdrawn;
                debug!(%payer, %timestamp, withdrawn, remaining, "withdrew points");
            }
            ledger.settle_if_drained()?;

            Ok(receipt)
        })
    }

    /// Spend `total` points from a single payer, oldest entries first
    pub fn spend_from(&mut self, payer: &Payer, total: i64) -> Result<Receipt, LedgerError> {
        let total = validate_amount(total)?;
        let available = self.balance(payer);
        if available < total {
            return Err(LedgerError::InsufficientPayerFunds {
                payer: payer.clone(),
                available,
                requested: total,
            });
        }

        self.atomically(|ledger| {
            ledger.reconcile(payer)?;
            let mut receipt = Receipt::new();
            let mut remaining = total;
            while remaining > 0 {
                let (timestamp, points) = ledger.first_entry(payer).ok_or_else(ran_out)?;
                let withdrawn = remaining.min(points);
                ledger.reduce_entry(payer, timestamp, withdrawn);
                receipt.withdraw(payer, withdrawn);
                remaining -= withdrawn;
                debug!(%payer, %timestamp, withdrawn, remaining, "withdrew points");
            }
            ledger.settle_if_drained()?;

            Ok(receipt)
        })
    }

    /// Oldest entry whose payer holds no clawback
    ///
    /// Clawbacks of the payer owning the oldest entry are reconciled first, which may
    /// change which entry is the oldest.
    fn oldest_spendable(&mut self) -> Result<(Timestamp, Payer, i64), LedgerError> {
        loop {
            let (timestamp, payer) = self.oldest().ok_or_else(ran_out)?;
            if self.has_clawbacks(&payer) {
                self.reconcile(&payer)?;
                continue;
            }
            let points = self.points_at(&payer, timestamp);
            return Ok((timestamp, payer, points.ok_or_else(missing_entry)?));
        }
    }

    fn first_entry(&self, payer: &Payer) -> Option<(Timestamp, i64)> {
        let (timestamp, points) = self.accounts.get(payer)?.entries.first_key_value()?;
        Some((*timestamp, *points))
    }

    fn has_clawbacks(&self, payer: &Payer) -> bool {
        self.accounts
            .get(payer)
            .is_some_and(|account| !account.clawbacks.is_empty())
    }

    /// Net every negative entry of `payer` against positive entries
    ///
    /// Each clawback, oldest first, is absorbed by the payer's own positive entries in
    /// chronological order. Once those run out, the rest is absorbed by the oldest
    /// positive entries of the other payers. Absorbed entries are reduced in place or
    /// removed, then the clawback itself is removed.
    pub(super) fn reconcile(&mut self, payer: &Payer) -> Result<(), LedgerError> {
        let clawbacks: Vec<Timestamp> = match self.accounts.get(payer) {
            Some(account) => account.clawbacks.iter().copied().collect(),
            None => return Ok(()),
        };

        for clawback in clawbacks {
            let points = self.points_at(payer, clawback).unwrap_or(0);
            let mut owed = -i128::from(points);
            while owed > 0 {
                let (grant, owner, available) = self.next_positive(payer).ok_or_else(uncovered)?;
                let absorbed = to_points(owed.min(i128::from(available)));
                self.reduce_entry(&owner, grant, absorbed);
                owed -= i128::from(absorbed);
                debug!(%payer, %owner, %clawback, %grant, absorbed, "netted clawback");
            }
            self.remove_entry(clawback);
        }

        Ok(())
    }

    /// Earliest positive entry of `payer`, or else the oldest positive entry of anyone else
    fn next_positive(&self, payer: &Payer) -> Option<(Timestamp, Payer, i64)> {
        let own = self
            .accounts
            .get(payer)
            .and_then(|account| account.grants.first());
        let (timestamp, owner) = match own {
            Some(timestamp) => (*timestamp, payer.clone()),
            None => {
                // The payer has no grant left, so every remaining one belongs to someone else
                let timestamp = *self.grants.first()?;
                (timestamp, self.timeline.get(&timestamp)?.clone())
            }
        };
        let points = self.points_at(&owner, timestamp)?;

        Some((timestamp, owner, points))
    }

    /// Clear what is left once the ledger holds no points at all
    ///
    /// At a zero total the only entries left are clawbacks matched by positive entries,
    /// or empty entries. Nothing is settled while any points remain, so a partial spend
    /// never touches payers it did not draw from.
    fn settle_if_drained(&mut self) -> Result<(), LedgerError> {
        if self.total_balance() != 0 || self.is_empty() {
            return Ok(());
        }

        let payers: BTreeSet<Payer> = self.timeline.values().cloned().collect();
        for payer in &payers {
            self.reconcile(payer)?;
        }
        let leftovers: Vec<Timestamp> = self.timeline.keys().copied().collect();
        for timestamp in leftovers {
            self.remove_entry(timestamp);
        }
        debug!(payers = payers.len(), "settled drained ledger");

        Ok(())
    }
}
