//! Continuous-time simulation of money flowing through a graph of accounts.
//!
//! Accounts receive discrete injections and leak continuously through
//! rate-limited drain edges; balance above an account's capacity forwards
//! through its single overflow edge. [`compute_financial_history`] consumes
//! timestamped action batches and emits a snapshot of the whole graph at
//! every moment the piecewise-linear dynamics change.
//!
//! The engine assumes an acyclic overflow/drain graph; validating that (and
//! rejecting cycles or self-loops) is the caller's responsibility.

pub mod account;
pub mod action;
pub mod engine;
pub mod history;

pub use account::{Account, AccountId, Accounts, FinancialHistory, HistorySnapshot};
pub use action::{ActionBatch, ActionRecord, UserAction};
pub use engine::EngineError;
pub use history::compute_financial_history;
