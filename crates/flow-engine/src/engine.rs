use crate::account::{Account, AccountId, Accounts, Money, MoneyRate, Timestamp};
use crate::action::UserAction;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Fatal conditions while processing an action batch. The engine performs no
/// recovery; the whole history computation aborts.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// `DeleteAccount` has no defined semantics yet. Inputs using it must be
    /// rejected up front, never silently dropped.
    #[error("account deletion is not implemented (account '{account}')")]
    DeleteAccountUnsupported { account: AccountId },
}

/// Accounts whose transient fields need recomputing.
pub type DirtySet = BTreeSet<AccountId>;

fn make_mut_entry<'a>(accounts: &'a mut Accounts, id: &AccountId) -> &'a mut Account {
    Arc::make_mut(accounts.entry(id.clone()).or_default())
}

/// Apply a batch's actions in list order. Accounts are created lazily with
/// all-zero defaults on first reference. Returns the set of accounts whose
/// inputs changed; the caller must pass it to [`relax`] before reading any
/// transient field.
pub fn apply_batch(accounts: &mut Accounts, actions: &[UserAction]) -> Result<DirtySet, EngineError> {
    let mut dirty = DirtySet::new();
    for action in actions {
        match action {
            UserAction::CreateOrUpdateAccount {
                account,
                capacity,
                overflow_target,
            } => {
                let previous = accounts.get(account).and_then(|a| a.overflow_target.clone());
                let retargeted = overflow_target.is_some() && *overflow_target != previous;
                {
                    let record = make_mut_entry(accounts, account);
                    if let Some(capacity) = capacity {
                        record.capacity = *capacity;
                    }
                    if retargeted {
                        record.overflow_target = overflow_target.clone();
                    }
                }
                if retargeted {
                    // Disconnect the old edge; the old target's inflow just
                    // vanished, so it needs relaxing as well.
                    if let Some(previous) = previous {
                        if let Some(old) = accounts.get_mut(&previous) {
                            Arc::make_mut(old).overflow_inflows.remove(account);
                            dirty.insert(previous);
                        }
                    }
                }
                dirty.insert(account.clone());
            }
            UserAction::InjectMoney { account, amount } => {
                make_mut_entry(accounts, account).fill_level += amount;
                dirty.insert(account.clone());
            }
            UserAction::UpdateDrain {
                source,
                target,
                max_rate,
            } => {
                make_mut_entry(accounts, source)
                    .drain_sizes
                    .insert(target.clone(), *max_rate);
                dirty.insert(source.clone());
            }
            UserAction::DeleteDrain { source, target } => {
                // The edge stays, dormant, with zero configured rate.
                make_mut_entry(accounts, source)
                    .drain_sizes
                    .insert(target.clone(), 0.0);
                dirty.insert(source.clone());
            }
            UserAction::DeleteAccount { account } => {
                return Err(EngineError::DeleteAccountUnsupported {
                    account: account.clone(),
                });
            }
        }
    }
    Ok(dirty)
}

/// Propagate rate changes to a fixed point.
///
/// FIFO worklist seeded with the dirty set. Each pop recomputes one account's
/// transient fields from its static fields and current inflows, then
/// re-enqueues exactly the neighbors whose inflow entries actually changed.
/// Terminates on any acyclic overflow/drain graph; cycles are a precondition
/// violation the caller's validator must reject.
pub fn relax(accounts: &mut Accounts, dirty: DirtySet) {
    let mut queue: VecDeque<AccountId> = dirty.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        settle(accounts, &id, &mut queue);
    }
}

/// Recompute one account and push affected neighbors.
fn settle(accounts: &mut Accounts, id: &AccountId, queue: &mut VecDeque<AccountId>) {
    let Some(current) = accounts.get(id) else {
        return;
    };
    let current = Arc::clone(current);

    // Once-off spill: a discrete jump past capacity moves the excess to the
    // overflow target instantaneously, distinct from the continuous
    // overflow_rate below.
    let mut fill_level = current.fill_level;
    let mut spill: Option<(AccountId, Money)> = None;
    if let Some(target) = &current.overflow_target {
        if fill_level > current.capacity {
            spill = Some((target.clone(), fill_level - current.capacity));
            fill_level = current.capacity;
        }
    }

    let inflow = current.effective_inflow_rate();
    let total_potential = current.total_potential_drain_rate();

    // Drains run at configured size while there is stored balance or enough
    // inflow; an empty account splits its inflow across drains in proportion
    // to their configured sizes, so balance never accumulates below demand.
    let unconstrained = fill_level > 0.0 || inflow >= total_potential;
    let drain_effective_rates: BTreeMap<AccountId, MoneyRate> = current
        .drain_sizes
        .iter()
        .map(|(target, &size)| {
            let rate = if unconstrained {
                size
            } else {
                inflow * size / total_potential
            };
            (target.clone(), rate)
        })
        .collect();

    let effective_drain: MoneyRate = drain_effective_rates.values().sum();
    let potential_fill = inflow - effective_drain;
    let filling = potential_fill > 0.0
        && (fill_level < current.capacity || current.overflow_target.is_none());
    let (fill_rate, overflow_rate) = if filling || potential_fill < 0.0 {
        (potential_fill, 0.0)
    } else {
        // Saturated at capacity with an overflow target: the surplus runs
        // straight through.
        (0.0, potential_fill.max(0.0))
    };

    for (target, &rate) in &drain_effective_rates {
        let known = accounts
            .get(target)
            .and_then(|a| a.drain_inflows.get(id))
            .copied()
            .unwrap_or(0.0);
        if known != rate {
            make_mut_entry(accounts, target)
                .drain_inflows
                .insert(id.clone(), rate);
            queue.push_back(target.clone());
        }
    }
    if let Some(target) = &current.overflow_target {
        let known = accounts
            .get(target)
            .and_then(|a| a.overflow_inflows.get(id))
            .copied()
            .unwrap_or(0.0);
        if known != overflow_rate {
            make_mut_entry(accounts, target)
                .overflow_inflows
                .insert(id.clone(), overflow_rate);
            queue.push_back(target.clone());
        }
    }
    if let Some((target, excess)) = spill {
        make_mut_entry(accounts, &target).fill_level += excess;
        queue.push_back(target);
    }

    let changed = fill_level != current.fill_level
        || fill_rate != current.fill_rate
        || overflow_rate != current.overflow_rate
        || drain_effective_rates != current.drain_effective_rates;
    if changed {
        let record = make_mut_entry(accounts, id);
        record.fill_level = fill_level;
        record.fill_rate = fill_rate;
        record.overflow_rate = overflow_rate;
        record.drain_effective_rates = drain_effective_rates;
    }
}

/// Advance every balance by `fill_rate * (to - from)`, rates and static
/// fields untouched. Valid only when no nonlinearity lies strictly between
/// the two timestamps; the scanner guarantees that by projecting in
/// boundary-sized steps.
pub fn project(accounts: &Accounts, from: Timestamp, to: Timestamp) -> Accounts {
    let mut projected = accounts.clone();
    let dt = to - from;
    for account in projected.values_mut() {
        let rate = account.fill_rate;
        // Skipping idle accounts also avoids 0 * inf against the -inf
        // initial snapshot.
        if rate != 0.0 {
            Arc::make_mut(account).fill_level += rate * dt;
        }
    }
    projected
}
