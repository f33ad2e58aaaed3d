use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An amount of money.
pub type Money = f64;
/// Money per unit of time.
pub type MoneyRate = f64;
/// A point on the simulation timeline. `f64::NEG_INFINITY` is the state
/// before the first action, `f64::INFINITY` the final resting state.
pub type Timestamp = f64;

/// Opaque account key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One node in the flow graph.
///
/// Static fields change only when an action is applied; transient fields are
/// recomputed exclusively by rate relaxation. The all-zero `Default` is the
/// state an account starts in when first referenced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Fill ceiling. Only a hard bound when an overflow target is set;
    /// otherwise the balance may exceed it freely.
    pub capacity: Money,
    /// Where balance above `capacity` is forwarded. At most one per account.
    pub overflow_target: Option<AccountId>,
    /// Configured maximum outflow rate per drain target.
    pub drain_sizes: BTreeMap<AccountId, MoneyRate>,

    /// Current balance. Never negative.
    pub fill_level: Money,
    /// Net rate of change of `fill_level` while not overflowing.
    pub fill_rate: MoneyRate,
    /// Rate leaving through the overflow edge. Nonzero only while saturated.
    pub overflow_rate: MoneyRate,
    /// Actual current outflow per drain target, each bounded by the
    /// corresponding `drain_sizes` entry.
    pub drain_effective_rates: BTreeMap<AccountId, MoneyRate>,
    /// Rate received per source account's drain into this one.
    pub drain_inflows: BTreeMap<AccountId, MoneyRate>,
    /// Rate received per source account's overflow into this one.
    pub overflow_inflows: BTreeMap<AccountId, MoneyRate>,
}

impl Account {
    /// Sum of all drain and overflow inflow rates.
    pub fn effective_inflow_rate(&self) -> MoneyRate {
        self.drain_inflows.values().sum::<MoneyRate>()
            + self.overflow_inflows.values().sum::<MoneyRate>()
    }

    /// Sum of configured drain rates.
    pub fn total_potential_drain_rate(&self) -> MoneyRate {
        self.drain_sizes.values().sum()
    }
}

/// The whole graph. Cloning the map clones `Arc`s, so consecutive snapshots
/// share every account record that did not change; mutation goes through
/// `Arc::make_mut`.
pub type Accounts = BTreeMap<AccountId, Arc<Account>>;

/// Immutable point-in-time state of the whole graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub timestamp: Timestamp,
    pub accounts: Accounts,
}

impl HistorySnapshot {
    /// The empty graph before any action, at `-inf`.
    pub fn initial() -> Self {
        Self {
            timestamp: Timestamp::NEG_INFINITY,
            accounts: Accounts::new(),
        }
    }
}

/// Ordered sequence of snapshots: one per action batch plus one per
/// nonlinearity event in between, ascending in timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialHistory {
    pub snapshots: Vec<HistorySnapshot>,
}

impl FinancialHistory {
    pub fn iter(&self) -> std::slice::Iter<'_, HistorySnapshot> {
        self.snapshots.iter()
    }
}

/// Flat per-account view of one snapshot, the shape the CLI writes as CSV.
#[derive(Debug, Clone, Serialize)]
pub struct AccountRow {
    pub time: Timestamp,
    pub account: String,
    pub fill_level: Money,
    pub fill_rate: MoneyRate,
    pub capacity: Money,
    pub overflow_rate: MoneyRate,
}

impl AccountRow {
    pub fn new(time: Timestamp, id: &AccountId, account: &Account) -> Self {
        Self {
            time,
            account: id.0.clone(),
            fill_level: account.fill_level,
            fill_rate: account.fill_rate,
            capacity: account.capacity,
            overflow_rate: account.overflow_rate,
        }
    }
}
