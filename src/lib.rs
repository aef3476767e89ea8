//! Points ledger
//!
//! Keeps timestamped point grants and clawbacks per payer, and spends points
//! oldest-first across every payer. The pure ledger lives in [`domain`], the
//! commands in [`commands`] talk to it through [`ports::ledger::LedgerPort`],
//! and [`adapters::ledger::memory::MemoryLedger`] is the in-process store.

pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod ports;
