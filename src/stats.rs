//! The core of the statistics engine.
//!
//! Every aggregate here is recomputed from the participation rows on each
//! call. The counters cached on the participant records and the "has
//! result" flag cached on the event records are never trusted: they exist
//! to keep writes cheap, and reads reconcile them against the recomputed
//! truth (see the endpoints module for the reconciliation itself).

use std::collections::HashMap;

use crate::types::{
    Amount, Event, EventStats, Participant, ParticipantStat, Participation, RoundResult,
};

/// Recompute the statistics of every participant from scratch.
///
/// Win and loss counts consider attended rows only; paid and expected
/// totals run over all rows. The result is sorted by balance, descending,
/// so the participant who got away with paying the least comes first.
/// Rows referencing a participant that no longer exists are ignored.
pub fn compute_participant_stats(
    participants: &[Participant],
    participations: &[Participation],
) -> Vec<ParticipantStat> {
    let mut rows_by_participant: HashMap<i64, Vec<&Participation>> = HashMap::new();
    for row in participations {
        rows_by_participant
            .entry(row.participant_id)
            .or_default()
            .push(row);
    }

    let mut stats: Vec<_> = participants
        .iter()
        .map(|participant| {
            let rows = rows_by_participant
                .get(&participant.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let win_count = rows.iter().filter(|r| r.attended && r.won).count() as i64;
            let loss_count = rows.iter().filter(|r| r.attended && !r.won).count() as i64;
            let total_games = win_count + loss_count;
            let win_rate = if total_games > 0 {
                win_count as f64 / total_games as f64
            } else {
                0.0
            };

            let total_paid: Amount = rows.iter().map(|r| r.paid_amount).sum();
            let total_expected: Amount = rows.iter().map(|r| r.expected_amount).sum();

            ParticipantStat {
                id: participant.id,
                name: participant.name.clone(),
                total_games,
                win_count,
                loss_count,
                win_rate,
                total_paid,
                total_expected,
                balance: total_expected - total_paid,
            }
        })
        .collect();

    stats.sort_by(|s1, s2| s2.balance.cmp(&s1.balance));
    stats
}

/// Event-level summary: count, sum of event totals and rounded average.
pub fn compute_event_stats(events: &[Event]) -> EventStats {
    let total_events = events.len() as i64;
    let total_amount: Amount = events.iter().map(|e| e.total_amount).sum();
    let average_amount = if total_events > 0 {
        (total_amount as f64 / total_events as f64).round() as Amount
    } else {
        0
    };

    EventStats {
        total_events,
        total_amount,
        average_amount,
    }
}

/// Canonical definition of "this event's round has been decided": at
/// least one participation row exists with a designated payer.
pub fn has_round_result(rows: &[Participation]) -> bool {
    !rows.is_empty() && rows.iter().any(|r| r.won)
}

/// Build the summary of every decided round. Events without a decided
/// round are left out. The input order of *events* is preserved.
pub fn collect_round_results(
    events: &[Event],
    participations: &[Participation],
) -> Vec<RoundResult> {
    let mut rows_by_event: HashMap<i64, Vec<Participation>> = HashMap::new();
    for row in participations {
        rows_by_event
            .entry(row.event_id)
            .or_default()
            .push(row.clone());
    }

    events
        .iter()
        .filter_map(|event| {
            let rows = rows_by_event.remove(&event.id).unwrap_or_default();
            if !has_round_result(&rows) {
                return None;
            }

            let winner = rows.iter().find(|r| r.won).map(|r| r.participant_id);
            Some(RoundResult {
                event_id: event.id,
                event_name: event.name.clone(),
                date: event.date,
                amount: event.total_amount,
                participants: rows,
                winner,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    use super::*;

    fn make_participant(id: i64, name: &str) -> Participant {
        Participant {
            id,
            owner_id: 1,
            name: name.to_string(),
            total_participation: 0,
            win_count: 0,
            loss_count: 0,
            total_paid: 0,
            total_expected: 0,
        }
    }

    fn make_row(id: i64, event_id: i64, participant_id: i64, won: bool, paid: Amount, expected: Amount) -> Participation {
        Participation {
            id,
            event_id,
            participant_id,
            attended: true,
            won,
            paid_amount: paid,
            expected_amount: expected,
        }
    }

    fn make_event(id: i64, name: &str, total_amount: Amount) -> Event {
        Event {
            id,
            owner_id: 1,
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("test"),
            location: None,
            description: None,
            total_amount,
            has_result: false,
        }
    }

    #[test]
    fn test_participant_stats_from_one_round() {
        let participants = vec![
            make_participant(1, "alice"),
            make_participant(2, "bob"),
            make_participant(3, "carol"),
        ];
        let rows = vec![
            make_row(1, 1, 1, true, 3000, 1000),
            make_row(2, 1, 2, false, 0, 1000),
            make_row(3, 1, 3, false, 0, 1000),
        ];

        let stats = compute_participant_stats(&participants, &rows);

        // bob and carol underpaid by 1000 each, alice overpaid by 2000.
        assert_eq!(stats[0].balance, 1000);
        assert_eq!(stats[1].balance, 1000);
        assert_eq!(stats[2].id, 1);
        assert_eq!(stats[2].balance, -2000);
        assert_eq!(stats[2].total_paid, 3000);
        assert_eq!(stats[2].total_expected, 1000);
        assert_eq!(stats[2].win_count, 1);
        assert_eq!(stats[2].loss_count, 0);
        assert_abs_diff_eq!(stats[2].win_rate, 1.0);
        assert_abs_diff_eq!(stats[0].win_rate, 0.0);
    }

    #[test]
    fn test_win_rate_is_zero_without_games() {
        let participants = vec![make_participant(1, "alice")];

        let stats = compute_participant_stats(&participants, &[]);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_games, 0);
        assert_abs_diff_eq!(stats[0].win_rate, 0.0);
        assert_eq!(stats[0].balance, 0);
    }

    #[test]
    fn test_unattended_rows_do_not_count_as_games() {
        let participants = vec![make_participant(1, "alice")];
        let mut row = make_row(1, 1, 1, false, 0, 500);
        row.attended = false;

        let stats = compute_participant_stats(&participants, &[row]);

        assert_eq!(stats[0].total_games, 0);
        // Amount totals still run over all rows.
        assert_eq!(stats[0].total_expected, 500);
    }

    #[test]
    fn test_orphan_rows_are_ignored() {
        let participants = vec![make_participant(1, "alice")];
        let rows = vec![
            make_row(1, 1, 1, false, 0, 1000),
            // Participant 99 was deleted, its row is still around.
            make_row(2, 1, 99, true, 2000, 1000),
        ];

        let stats = compute_participant_stats(&participants, &rows);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].id, 1);
        assert_eq!(stats[0].total_games, 1);
    }

    #[test]
    fn test_event_stats() {
        let events = vec![
            make_event(1, "bbq", 3000),
            make_event(2, "izakaya", 4000),
            make_event(3, "karaoke", 2001),
        ];

        let stats = compute_event_stats(&events);

        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.total_amount, 9001);
        assert_eq!(stats.average_amount, 3000);
    }

    #[test]
    fn test_event_stats_without_events() {
        let stats = compute_event_stats(&[]);

        assert_eq!(
            stats,
            EventStats {
                total_events: 0,
                total_amount: 0,
                average_amount: 0
            }
        );
    }

    #[test]
    fn test_has_round_result() {
        assert!(!has_round_result(&[]));

        let undecided = vec![make_row(1, 1, 1, false, 0, 500)];
        assert!(!has_round_result(&undecided));

        let decided = vec![
            make_row(1, 1, 1, false, 0, 500),
            make_row(2, 1, 2, true, 1000, 500),
        ];
        assert!(has_round_result(&decided));
    }

    #[test]
    fn test_collect_round_results_skips_undecided_events() {
        let events = vec![make_event(1, "bbq", 3000), make_event(2, "izakaya", 0)];
        let rows = vec![
            make_row(1, 1, 1, true, 3000, 1500),
            make_row(2, 1, 2, false, 0, 1500),
            make_row(3, 2, 1, false, 0, 0),
        ];

        let results = collect_round_results(&events, &rows);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_id, 1);
        assert_eq!(results[0].winner, Some(1));
        assert_eq!(results[0].participants.len(), 2);
        assert_eq!(results[0].amount, 3000);
    }
}
