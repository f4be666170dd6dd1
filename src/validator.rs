//! Functions that check the validity of a request before it reaches the
//! store.
//!
//! These checks run first so that shape, ownership and reference errors
//! are surfaced to the caller with no partial effect. The store re-checks
//! what it can when the actual writes run; if a row vanished in between,
//! a generic concurrency error is enough.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::InputError;
use crate::migration::{parse_snapshot_date, Snapshot};
use crate::store::Store;
use crate::types::{Event, RoundOutcome};

/// Check the shape of a submitted round: at least one outcome, no
/// negative paid amount.
pub fn validate_outcomes(outcomes: &[RoundOutcome]) -> Result<(), InputError> {
    if outcomes.is_empty() {
        return Err(InputError::empty_outcomes());
    }

    for outcome in outcomes {
        if outcome.paid_amount < 0 {
            return Err(InputError::negative_amount(
                outcome.paid_amount,
                outcome.participant_id,
            ));
        }
    }

    Ok(())
}

/// Check that a participant name is usable.
pub fn validate_participant_name(name: &str) -> Result<(), InputError> {
    if name.trim().is_empty() {
        Err(InputError::empty_participant_name())
    } else {
        Ok(())
    }
}

/// Check that the event exists and belongs to the caller, and return it.
pub async fn validate_owned_event<S: Store>(
    owner_id: i64,
    event_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Event> {
    let event = store.lock().await.get_event(event_id)?;

    let event = event.ok_or_else(|| InputError::unknown_event(event_id))?;
    if event.owner_id != owner_id {
        return Err(InputError::foreign_event(event_id).into());
    }

    Ok(event)
}

/// Check that every participant referenced by the outcomes is registered
/// under the caller.
pub async fn validate_participants_exist<S: Store>(
    outcomes: &[RoundOutcome],
    owner_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<()> {
    if !outcomes.is_empty() {
        let registered = store.lock().await.get_participants(owner_id)?;

        let registered: HashSet<_> = registered.into_iter().map(|p| p.id).collect();

        for outcome in outcomes {
            if !registered.contains(&outcome.participant_id) {
                return Err(InputError::unknown_participant(outcome.participant_id).into());
            }
        }
    }
    Ok(())
}

/// Check that every event date in a snapshot is parseable, so that a
/// malformed snapshot is rejected before the transactional import starts.
pub fn validate_snapshot_dates(snapshot: &Snapshot) -> Result<(), InputError> {
    for event in &snapshot.events {
        if parse_snapshot_date(&event.date).is_none() {
            return Err(InputError::invalid_snapshot_date(event.date.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_outcomes_are_rejected() {
        assert!(matches!(
            validate_outcomes(&[]),
            Err(InputError::EmptyOutcomes)
        ));
    }

    #[test]
    fn test_negative_amounts_are_rejected() {
        let outcomes = vec![
            RoundOutcome::new_payer(1, 3000),
            RoundOutcome::new(2, false, -1),
        ];
        assert!(matches!(
            validate_outcomes(&outcomes),
            Err(InputError::NegativeAmount(-1, 2))
        ));
    }

    #[test]
    fn test_valid_outcomes_pass() {
        let outcomes = vec![
            RoundOutcome::new_payer(1, 3000),
            RoundOutcome::new_spared(2),
        ];
        assert!(validate_outcomes(&outcomes).is_ok());
    }

    #[test]
    fn test_participant_names_must_not_be_blank() {
        assert!(validate_participant_name("alice").is_ok());
        assert!(validate_participant_name("").is_err());
        assert!(validate_participant_name("   ").is_err());
    }

    #[test]
    fn test_snapshot_dates_are_checked() {
        let events = r#"[{"id": "e1", "name": "bbq", "date": "not a date"}]"#;
        let snapshot = Snapshot::from_json(Some(events), None, None).expect("test");

        assert!(matches!(
            validate_snapshot_dates(&snapshot),
            Err(InputError::InvalidSnapshotDate(_))
        ));

        assert!(validate_snapshot_dates(&Snapshot::default()).is_ok());
    }
}
