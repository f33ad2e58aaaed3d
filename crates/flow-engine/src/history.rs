use crate::account::{AccountId, FinancialHistory, HistorySnapshot, Timestamp};
use crate::action::ActionBatch;
use crate::engine::{apply_batch, project, relax, DirtySet, EngineError};
use std::sync::Arc;

/// Which piecewise-linear boundary an account's trajectory is about to cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Boundary {
    /// Rising balance reaches capacity.
    Full,
    /// Falling balance reaches zero.
    Empty,
}

/// Earliest moment at which some account's linear trajectory crosses a
/// boundary, with every account that crosses at exactly that instant.
fn next_boundary(snapshot: &HistorySnapshot) -> Option<(Timestamp, Vec<(AccountId, Boundary)>)> {
    let mut earliest: Option<Timestamp> = None;
    let mut crossing: Vec<(AccountId, Boundary)> = Vec::new();
    for (id, account) in &snapshot.accounts {
        let candidate = if account.fill_rate > 0.0 && account.fill_level < account.capacity {
            Some((
                snapshot.timestamp + (account.capacity - account.fill_level) / account.fill_rate,
                Boundary::Full,
            ))
        } else if account.fill_rate < 0.0 && account.fill_level > 0.0 {
            Some((
                snapshot.timestamp + account.fill_level / -account.fill_rate,
                Boundary::Empty,
            ))
        } else {
            None
        };
        let Some((at, boundary)) = candidate else {
            continue;
        };
        match earliest {
            Some(t) if at > t => {}
            Some(t) if at == t => crossing.push((id.clone(), boundary)),
            _ => {
                earliest = Some(at);
                crossing.clear();
                crossing.push((id.clone(), boundary));
            }
        }
    }
    earliest.map(|t| (t, crossing))
}

/// Advance `current` up to `target`, materializing a corrective snapshot at
/// every nonlinearity on the way (including one at exactly `target`). Each
/// event projects linearly to the boundary instant, pins the crossing
/// accounts to exactly `capacity` or `0` to cancel accumulated float drift,
/// re-relaxes, and appends the result.
fn drain_nonlinearities(
    current: &mut HistorySnapshot,
    target: Timestamp,
    history: &mut Vec<HistorySnapshot>,
) {
    while let Some((at, crossing)) = next_boundary(current) {
        if at > target {
            break;
        }
        let mut accounts = project(&current.accounts, current.timestamp, at);
        let mut dirty = DirtySet::new();
        for (id, boundary) in crossing {
            if let Some(account) = accounts.get_mut(&id) {
                let account = Arc::make_mut(account);
                account.fill_level = match boundary {
                    Boundary::Full => account.capacity,
                    Boundary::Empty => 0.0,
                };
            }
            dirty.insert(id);
        }
        relax(&mut accounts, dirty);
        *current = HistorySnapshot {
            timestamp: at,
            accounts,
        };
        history.push(current.clone());
    }
}

/// Compute the full snapshot sequence for a set of action batches.
///
/// Batches are stably sorted by timestamp (equal-timestamp batches keep
/// input order and stay separate entries). Starting from the empty graph at
/// `-inf`, each batch first drains any nonlinearities up to and including
/// its timestamp, then projects, applies, relaxes, and appends. A final scan
/// to `+inf` runs the system to its resting state.
pub fn compute_financial_history(
    mut batches: Vec<ActionBatch>,
) -> Result<FinancialHistory, EngineError> {
    batches.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut history = Vec::new();
    let mut current = HistorySnapshot::initial();
    for batch in batches {
        drain_nonlinearities(&mut current, batch.timestamp, &mut history);
        let mut accounts = project(&current.accounts, current.timestamp, batch.timestamp);
        let dirty = apply_batch(&mut accounts, &batch.actions)?;
        relax(&mut accounts, dirty);
        current = HistorySnapshot {
            timestamp: batch.timestamp,
            accounts,
        };
        history.push(current.clone());
    }
    drain_nonlinearities(&mut current, Timestamp::INFINITY, &mut history);

    Ok(FinancialHistory { snapshots: history })
}
