use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

use super::{Payer, Timestamp, Transaction, ValidationError};
use crate::config::DuplicateTimestampPolicy;

/// Entries of a single payer, with running aggregates
#[derive(Clone, Debug, Default)]
pub(super) struct Account {
    pub(super) entries: BTreeMap<Timestamp, i64>,
    /// Sum of `entries`
    pub(super) total: i128,
    /// Timestamps of the negative entries
    pub(super) clawbacks: BTreeSet<Timestamp>,
    /// Timestamps of the positive entries
    pub(super) grants: BTreeSet<Timestamp>,
}

impl Account {
    fn track(&mut self, timestamp: Timestamp, points: i64) {
        self.total += i128::from(points);
        if points < 0 {
            self.clawbacks.insert(timestamp);
        } else if points > 0 {
            self.grants.insert(timestamp);
        }
    }

    fn forget(&mut self, timestamp: Timestamp, points: i64) {
        self.total -= i128::from(points);
        self.clawbacks.remove(&timestamp);
        self.grants.remove(&timestamp);
    }
}

/// Value an entry held before a journaled write
type JournalEntry = (Payer, Timestamp, Option<i64>);

/// Point entries for every payer, with a global chronological index
///
/// Each payer maps timestamps to signed point deltas. The `timeline` maps every
/// stored timestamp back to its owning payer, which gives both the ascending order of
/// all entries across payers and the reverse lookup the spend needs.
///
/// Totals and the sets of positive and negative entries are kept alongside the entries,
/// so balances and the lookups a spend repeats never rescan a payer's history.
///
/// # Invariants
///
/// - A timestamp is in `timeline` if and only if it is stored under the payer it maps to
/// - Every cached total and timestamp set matches the stored entries
/// - Every payer's balance fits in an `i64` and is never negative
/// - Payers are never forgotten, even once all their entries are gone
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    duplicate_timestamps: DuplicateTimestampPolicy,
    pub(super) accounts: BTreeMap<Payer, Account>,
    pub(super) timeline: BTreeMap<Timestamp, Payer>,
    /// Timestamps of the positive entries of every payer
    pub(super) grants: BTreeSet<Timestamp>,
    total: i128,
    journal: Option<Vec<JournalEntry>>,
}

impl Ledger {
    pub fn new(duplicate_timestamps: DuplicateTimestampPolicy) -> Self {
        Self {
            duplicate_timestamps,
            ..Default::default()
        }
    }

    /// Record a transaction
    ///
    /// Nothing is modified if this returns an error.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        let Transaction {
            payer,
            points,
            timestamp,
        } = transaction;

        let displaced = self.timeline.get(&timestamp).cloned();
        if displaced.is_some() && self.duplicate_timestamps == DuplicateTimestampPolicy::Reject {
            return Err(LedgerError::DuplicateTimestamp(timestamp));
        }

        // Balance of the payer once the entry is in place, without the entry it replaces
        let current = self.payer_total(&payer);
        let replaced = match &displaced {
            Some(owner) if owner == &payer => self.points_at(owner, timestamp).unwrap_or(0),
            _ => 0,
        };
        let resulting = current - i128::from(replaced) + i128::from(points);
        if resulting > i128::from(i64::MAX) {
            return Err(LedgerError::Overflow);
        }
        if resulting < 0 {
            return Err(LedgerError::InsufficientPayerFunds {
                payer,
                available: to_points(current - i128::from(replaced)),
                requested: points.saturating_neg(),
            });
        }

        // The previous owner loses the overwritten entry
        if let Some(owner) = displaced.as_ref().filter(|owner| *owner != &payer) {
            let lost = self.points_at(owner, timestamp).unwrap_or(0);
            let owner_total = self.payer_total(owner);
            if owner_total - i128::from(lost) < 0 {
                return Err(LedgerError::InsufficientPayerFunds {
                    payer: owner.clone(),
                    available: to_points(owner_total),
                    requested: lost,
                });
            }
        }

        if let Some(owner) = displaced {
            self.set_entry(&owner, timestamp, None);
        }
        self.set_entry(&payer, timestamp, Some(points));

        Ok(())
    }

    /// Sum of the payer's entries, 0 for unknown payers
    pub fn balance(&self, payer: &Payer) -> i64 {
        to_points(self.payer_total(payer))
    }

    /// Balance of every payer ever added
    pub fn balances(&self) -> Result<BTreeMap<Payer, i64>, LedgerError> {
        if self.accounts.is_empty() {
            return Err(LedgerError::EmptyLedger);
        }

        Ok(self
            .accounts
            .iter()
            .map(|(payer, account)| (payer.clone(), to_points(account.total)))
            .collect())
    }

    /// Every stored entry, oldest first
    pub fn transactions(&self) -> Vec<Transaction> {
        self.timeline
            .iter()
            .filter_map(|(timestamp, payer)| {
                self.points_at(payer, *timestamp)
                    .map(|points| Transaction::new(payer.clone(), points, *timestamp))
            })
            .collect()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub(super) fn payer_total(&self, payer: &Payer) -> i128 {
        self.accounts
            .get(payer)
            .map(|account| account.total)
            .unwrap_or(0)
    }

    pub(super) fn total_balance(&self) -> i128 {
        self.total
    }

    pub(super) fn points_at(&self, payer: &Payer, timestamp: Timestamp) -> Option<i64> {
        self.accounts.get(payer)?.entries.get(&timestamp).copied()
    }

    /// Oldest entry across all payers
    pub(super) fn oldest(&self) -> Option<(Timestamp, Payer)> {
        self.timeline
            .first_key_value()
            .map(|(timestamp, payer)| (*timestamp, payer.clone()))
    }

    /// Take `amount` from an entry, dropping it once it reaches zero
    pub(super) fn reduce_entry(&mut self, payer: &Payer, timestamp: Timestamp, amount: i64) {
        if let Some(points) = self.points_at(payer, timestamp) {
            let left = Some(points - amount).filter(|left| *left != 0);
            self.set_entry(payer, timestamp, left);
        }
    }

    /// Drop an entry from both the payer and the timeline
    pub(super) fn remove_entry(&mut self, timestamp: Timestamp) -> Option<(Payer, i64)> {
        let payer = self.timeline.get(&timestamp)?.clone();
        let points = self.set_entry(&payer, timestamp, None)?;
        Some((payer, points))
    }

    /// Write or clear one entry, returning its previous value
    ///
    /// Every mutation of the entries goes through here, so the timeline, the totals and
    /// the timestamp sets move together.
    pub(super) fn set_entry(
        &mut self,
        payer: &Payer,
        timestamp: Timestamp,
        points: Option<i64>,
    ) -> Option<i64> {
        if points.is_none() && !self.accounts.contains_key(payer) {
            return None;
        }
        let account = self.accounts.entry(payer.clone()).or_default();

        let previous = match points {
            Some(points) => account.entries.insert(timestamp, points),
            None => account.entries.remove(&timestamp),
        };
        if let Some(previous) = previous {
            account.forget(timestamp, previous);
            self.total -= i128::from(previous);
            self.grants.remove(&timestamp);
        }
        match points {
            Some(points) => {
                account.track(timestamp, points);
                self.total += i128::from(points);
                if points > 0 {
                    self.grants.insert(timestamp);
                }
                self.timeline.insert(timestamp, payer.clone());
            }
            None => {
                if previous.is_some() {
                    self.timeline.remove(&timestamp);
                }
            }
        }

        if let Some(journal) = self.journal.as_mut() {
            journal.push((payer.clone(), timestamp, previous));
        }
        previous
    }

    /// Run `op`, restoring every entry it wrote if it fails
    pub(super) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        self.journal = Some(Vec::new());
        let res = op(self);
        let journal = self.journal.take().unwrap_or_default();

        if res.is_err() {
            for (payer, timestamp, previous) in journal.into_iter().rev() {
                self.set_entry(&payer, timestamp, previous);
            }
        }
        res
    }

    /// Store an entry without any balance check
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, payer: &Payer, points: i64, timestamp: Timestamp) {
        self.set_entry(payer, timestamp, Some(points));
    }

    /// Rebuild every cached aggregate from the entries and compare
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use speculoos::prelude::*;

        let mut total = 0;
        let mut grants = BTreeSet::new();
        let mut timeline = BTreeMap::new();
        for (payer, account) in &self.accounts {
            let sum: i128 = account.entries.values().map(|p| i128::from(*p)).sum();
            let clawbacks: BTreeSet<Timestamp> = account
                .entries
                .iter()
                .filter(|(_, points)| **points < 0)
                .map(|(timestamp, _)| *timestamp)
                .collect();
            let own_grants: BTreeSet<Timestamp> = account
                .entries
                .iter()
                .filter(|(_, points)| **points > 0)
                .map(|(timestamp, _)| *timestamp)
                .collect();

            assert_that!(account.total).is_equal_to(sum);
            assert_that!(account.clawbacks).is_equal_to(&clawbacks);
            assert_that!(account.grants).is_equal_to(&own_grants);

            total += sum;
            grants.extend(own_grants);
            for timestamp in account.entries.keys() {
                timeline.insert(*timestamp, payer.clone());
            }
        }

        assert_that!(self.total).is_equal_to(total);
        assert_that!(self.grants).is_equal_to(&grants);
        assert_that!(self.timeline).is_equal_to(&timeline);
        assert_that!(self.journal.is_none()).is_true();
    }
}

/// Narrow a payer total back to points
///
/// Stored balances always fit since every insertion is checked against `i64::MAX`.
pub(super) fn to_points(total: i128) -> i64 {
    match i64::try_from(total) {
        Ok(points) => points,
        Err(_) if total < 0 => i64::MIN,
        Err(_) => i64::MAX,
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The whole ledger does not hold enough points
    #[error("not enough points: {available} available, {requested} requested")]
    InsufficientFunds { available: i64, requested: i64 },

    /// A payer does not hold enough points
    ///
    /// Returned when a clawback exceeds the payer's balance, or when spending from a
    /// single payer.
    #[error("not enough points for {payer}: {available} available, {requested} requested")]
    InsufficientPayerFunds {
        payer: Payer,
        available: i64,
        requested: i64,
    },

    #[error("a transaction already exists at {0}")]
    DuplicateTimestamp(Timestamp),

    /// No payer was ever added
    #[error("the ledger is empty")]
    EmptyLedger,

    #[error("balance would overflow")]
    Overflow,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The ledger reached a state its invariants should rule out
    #[error("internal ledger error: {0}")]
    Internal(Cow<'static, str>),
}
