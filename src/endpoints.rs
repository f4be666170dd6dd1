//! The operations exposed to the request layer.
//!
//! Transport, authentication and rendering live outside this crate: every
//! function here receives an already-authenticated owner identity plus
//! structured input, and returns plain data or a typed failure. This is
//! also the largest subset of logic that can be tested without mocking a
//! web framework.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{
    migration::Snapshot,
    recorder::build_round_batch,
    stats::{
        collect_round_results, compute_event_stats, compute_participant_stats, has_round_result,
    },
    store::Store,
    types::{
        Event, EventStats, MigrationStats, NewEvent, Participant, ParticipantStat, Participation,
        RoundOutcome, RoundResult,
    },
    validator::{
        validate_outcomes, validate_owned_event, validate_participant_name,
        validate_participants_exist, validate_snapshot_dates,
    },
};

pub async fn handle_create_event<S: Store>(
    owner_id: i64,
    event: NewEvent,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Event> {
    let event = store.lock().await.create_event(owner_id, event)?;
    Ok(event)
}

pub async fn handle_delete_event<S: Store>(
    owner_id: i64,
    event_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<()> {
    validate_owned_event(owner_id, event_id, store).await?;

    store.lock().await.delete_event(owner_id, event_id)?;
    Ok(())
}

pub async fn handle_create_participant<S: Store>(
    owner_id: i64,
    name: &str,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Participant> {
    validate_participant_name(name)?;

    let participant = store.lock().await.create_participant(owner_id, name)?;
    Ok(participant)
}

pub async fn handle_delete_participant<S: Store>(
    owner_id: i64,
    participant_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<()> {
    store
        .lock()
        .await
        .delete_participant(owner_id, participant_id)?;
    Ok(())
}

/// Record the outcome of a round for an event the caller owns.
///
/// Existing rows of the submitted participants are overwritten, rows of
/// participants absent from *outcomes* stay untouched, and the event
/// total is recomputed from the full row set in the same transaction.
pub async fn handle_record_round<S: Store>(
    owner_id: i64,
    event_id: i64,
    outcomes: Vec<RoundOutcome>,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Vec<Participation>> {
    validate_outcomes(&outcomes)?;
    validate_owned_event(owner_id, event_id, store).await?;
    validate_participants_exist(&outcomes, owner_id, store).await?;

    let rows = store.lock().await.upsert_round(event_id, &outcomes)?;
    Ok(rows)
}

/// Replace the whole participant roster of an event's round.
///
/// Unlike [`handle_record_round`] this discards every prior row of the
/// event, recomputes the fair-share expected amount per participant and
/// bumps the running counters of everyone in the batch.
pub async fn handle_replace_round<S: Store>(
    owner_id: i64,
    event_id: i64,
    outcomes: Vec<RoundOutcome>,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Vec<Participation>> {
    validate_outcomes(&outcomes)?;
    let event = validate_owned_event(owner_id, event_id, store).await?;
    validate_participants_exist(&outcomes, owner_id, store).await?;

    // The fair share is computed against the event total as stored when
    // the round is submitted.
    let batch = build_round_batch(event_id, event.total_amount, &outcomes);

    let rows = store.lock().await.replace_round(event_id, &batch)?;
    Ok(rows)
}

/// Per-participant statistics, recomputed from the participation rows and
/// sorted by balance, descending.
pub async fn handle_participant_stats<S: Store>(
    owner_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Vec<ParticipantStat>> {
    let (participants, participations) = {
        let store = store.lock().await;
        (
            store.get_participants(owner_id)?,
            store.get_participations(owner_id)?,
        )
    };

    Ok(compute_participant_stats(&participants, &participations))
}

pub async fn handle_event_stats<S: Store>(
    owner_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<EventStats> {
    let events = store.lock().await.get_events(owner_id)?;
    Ok(compute_event_stats(&events))
}

/// Whether the event's round has been decided.
///
/// The answer is always recomputed from the participation rows; the flag
/// cached on the event is reconciled against it on the way.
pub async fn handle_has_result<S: Store>(
    owner_id: i64,
    event_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<bool> {
    let event = validate_owned_event(owner_id, event_id, store).await?;

    let rows = store.lock().await.get_event_participations(event_id)?;
    let has_result = has_round_result(&rows);

    reconcile_has_result_flag(&event, has_result, store).await?;

    Ok(has_result)
}

/// The summaries of all decided rounds of the caller, newest first.
pub async fn handle_all_round_results<S: Store>(
    owner_id: i64,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<Vec<RoundResult>> {
    let (events, participations) = {
        let store = store.lock().await;
        (
            store.get_events(owner_id)?,
            store.get_participations(owner_id)?,
        )
    };

    // Reads are the only place where drift between the cached flag and
    // the rows becomes visible, so stale flags are reconciled here.
    for event in &events {
        let recomputed = has_round_result(
            &participations
                .iter()
                .filter(|r| r.event_id == event.id)
                .cloned()
                .collect::<Vec<_>>(),
        );
        reconcile_has_result_flag(event, recomputed, store).await?;
    }

    Ok(collect_round_results(&events, &participations))
}

/// Import a legacy client-local snapshot under the caller's account.
///
/// The import is all-or-nothing; only rows with dangling references
/// inside the snapshot itself are skipped, and they are excluded from the
/// returned counts.
pub async fn handle_migrate<S: Store>(
    owner_id: i64,
    snapshot: Snapshot,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<MigrationStats> {
    validate_snapshot_dates(&snapshot)?;

    debug!(
        "Importing snapshot. Events: {}. Participants: {}. Participations: {}",
        snapshot.events.len(),
        snapshot.participants.len(),
        snapshot.participations.len()
    );

    let stats = store.lock().await.import_snapshot(owner_id, &snapshot)?;
    Ok(stats)
}

async fn reconcile_has_result_flag<S: Store>(
    event: &Event,
    recomputed: bool,
    store: &Arc<Mutex<S>>,
) -> anyhow::Result<()> {
    if event.has_result != recomputed {
        warn!(
            "has_result flag of event {} is {} but its rows say {}, correcting the flag",
            event.id, event.has_result, recomputed
        );
        store.lock().await.set_has_result(event.id, recomputed)?;
    }
    Ok(())
}
