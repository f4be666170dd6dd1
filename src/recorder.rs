//! The core of the round recorder. It turns the submitted outcomes of a
//! round into the full replacement batch that is written to the store.

use log::warn;

use crate::types::{Amount, NewParticipation, RoundBatch, RoundOutcome};

/// Build the replacement batch for one round.
///
/// The expected amount of every row is the even per-head share of the
/// event total, floored to an integer currency unit. Paid amounts are
/// taken from the outcomes as submitted. A round without a designated
/// payer is accepted, but `has_winner` stays false so the event is not
/// flagged as decided, and a warning is logged.
pub fn build_round_batch(
    event_id: i64,
    total_amount: Amount,
    outcomes: &[RoundOutcome],
) -> RoundBatch {
    let expected_amount = if outcomes.is_empty() {
        0
    } else {
        total_amount / outcomes.len() as Amount
    };

    let has_winner = outcomes.iter().any(|o| o.won);
    if !has_winner {
        warn!("round for event {event_id} has no payer, the event will not count as decided");
    }

    let rows = outcomes
        .iter()
        .map(|outcome| NewParticipation {
            participant_id: outcome.participant_id,
            attended: true,
            won: outcome.won,
            paid_amount: outcome.paid_amount,
            expected_amount,
        })
        .collect();

    RoundBatch { rows, has_winner }
}
