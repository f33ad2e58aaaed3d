use crate::account::{AccountId, Money, MoneyRate, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single user action against the graph.
///
/// The set is closed: `DeleteAccount` exists so that inputs naming it are
/// rejected explicitly rather than silently dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum UserAction {
    /// Create the account if absent, then overwrite whichever of the two
    /// optional fields are present.
    CreateOrUpdateAccount {
        account: AccountId,
        capacity: Option<Money>,
        overflow_target: Option<AccountId>,
    },
    /// Add `amount` (possibly negative) to the account's balance. The caller
    /// is responsible for never driving a balance negative.
    InjectMoney { account: AccountId, amount: Money },
    /// Create or replace the drain edge `source -> target` with the given
    /// maximum rate.
    UpdateDrain {
        source: AccountId,
        target: AccountId,
        max_rate: MoneyRate,
    },
    /// Zero the drain edge's configured rate. The edge stays in place as a
    /// dormant entry.
    DeleteDrain { source: AccountId, target: AccountId },
    /// Not implemented; processing a batch containing this fails.
    DeleteAccount { account: AccountId },
}

/// A timestamped group of actions applied atomically and in list order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionBatch {
    pub timestamp: Timestamp,
    pub actions: Vec<UserAction>,
}

/// Action kind column of the CSV input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Account,
    Inject,
    Drain,
    DeleteDrain,
    DeleteAccount,
}

/// One row of the CSV input: `time,action,account,target,value`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRecord {
    pub time: Timestamp,
    pub action: ActionKind,
    pub account: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Errors turning a CSV row into a [`UserAction`].
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("'{0:?}' action requires a value")]
    MissingValue(ActionKind),
    #[error("'{0:?}' action requires a target account")]
    MissingTarget(ActionKind),
    #[error("non-finite timestamp {0}")]
    NonFiniteTime(f64),
}

impl ActionRecord {
    pub fn into_action(self) -> Result<UserAction, RecordError> {
        if !self.time.is_finite() {
            return Err(RecordError::NonFiniteTime(self.time));
        }
        let account = AccountId(self.account);
        let target = self.target.filter(|t| !t.is_empty()).map(AccountId);
        match self.action {
            ActionKind::Account => Ok(UserAction::CreateOrUpdateAccount {
                account,
                capacity: self.value,
                overflow_target: target,
            }),
            ActionKind::Inject => Ok(UserAction::InjectMoney {
                account,
                amount: self
                    .value
                    .ok_or(RecordError::MissingValue(ActionKind::Inject))?,
            }),
            ActionKind::Drain => Ok(UserAction::UpdateDrain {
                source: account,
                target: target.ok_or(RecordError::MissingTarget(ActionKind::Drain))?,
                max_rate: self
                    .value
                    .ok_or(RecordError::MissingValue(ActionKind::Drain))?,
            }),
            ActionKind::DeleteDrain => Ok(UserAction::DeleteDrain {
                source: account,
                target: target.ok_or(RecordError::MissingTarget(ActionKind::DeleteDrain))?,
            }),
            ActionKind::DeleteAccount => Ok(UserAction::DeleteAccount { account }),
        }
    }
}

/// Group timestamped actions into batches, one per run of equal consecutive
/// timestamps. The input's own grouping is preserved; sorting happens later
/// in the history builder.
pub fn group_into_batches(actions: impl IntoIterator<Item = (Timestamp, UserAction)>) -> Vec<ActionBatch> {
    let mut batches: Vec<ActionBatch> = Vec::new();
    for (timestamp, action) in actions {
        match batches.last_mut() {
            Some(batch) if batch.timestamp == timestamp => batch.actions.push(action),
            _ => batches.push(ActionBatch {
                timestamp,
                actions: vec![action],
            }),
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        time: f64,
        action: ActionKind,
        account: &str,
        target: Option<&str>,
        value: Option<f64>,
    ) -> ActionRecord {
        ActionRecord {
            time,
            action,
            account: account.to_string(),
            target: target.map(str::to_string),
            value,
        }
    }

    #[test]
    fn account_record_maps_optionals() {
        let action = record(10.0, ActionKind::Account, "a", None, Some(12.0))
            .into_action()
            .unwrap();
        assert_eq!(
            action,
            UserAction::CreateOrUpdateAccount {
                account: "a".into(),
                capacity: Some(12.0),
                overflow_target: None,
            }
        );

        // Empty target column means "not set", not an account named "".
        let action = record(10.0, ActionKind::Account, "a", Some(""), None)
            .into_action()
            .unwrap();
        assert_eq!(
            action,
            UserAction::CreateOrUpdateAccount {
                account: "a".into(),
                capacity: None,
                overflow_target: None,
            }
        );
    }

    #[test]
    fn inject_requires_value() {
        let err = record(1.0, ActionKind::Inject, "a", None, None)
            .into_action()
            .unwrap_err();
        assert_eq!(err, RecordError::MissingValue(ActionKind::Inject));
    }

    #[test]
    fn drain_requires_target_and_value() {
        let err = record(1.0, ActionKind::Drain, "a", None, Some(3.0))
            .into_action()
            .unwrap_err();
        assert_eq!(err, RecordError::MissingTarget(ActionKind::Drain));

        let action = record(1.0, ActionKind::Drain, "a", Some("c"), Some(3.0))
            .into_action()
            .unwrap();
        assert_eq!(
            action,
            UserAction::UpdateDrain {
                source: "a".into(),
                target: "c".into(),
                max_rate: 3.0,
            }
        );
    }

    #[test]
    fn grouping_preserves_runs_of_equal_timestamps() {
        let inject = |account: &str| UserAction::InjectMoney {
            account: account.into(),
            amount: 1.0,
        };
        let batches = group_into_batches(vec![
            (5.0, inject("a")),
            (5.0, inject("b")),
            (7.0, inject("a")),
            (5.0, inject("c")),
        ]);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].actions.len(), 2);
        assert_eq!(batches[1].timestamp, 7.0);
        // A later run at an earlier timestamp stays a separate batch.
        assert_eq!(batches[2].timestamp, 5.0);
    }
}
