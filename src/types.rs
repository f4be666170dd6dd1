use chrono::NaiveDate;

/// Monetary amount in minor currency units.
pub type Amount = i64;

#[derive(Clone, Debug)]
pub struct Event {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub location: Option<String>,
    pub description: Option<String>,
    pub total_amount: Amount,
    pub has_result: bool,
}

/// The fields needed to create an event. The ID is assigned by the store.
#[derive(Clone, Debug)]
pub struct NewEvent {
    pub name: String,
    pub date: NaiveDate,
    pub location: Option<String>,
    pub description: Option<String>,
    pub total_amount: Amount,
}

/// A registered participant.
///
/// The five counters are a write-through cache maintained by the round
/// recorder. They are never read back when computing statistics: the
/// participation rows are the source of truth.
#[derive(Clone, Debug)]
pub struct Participant {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub total_participation: i64,
    pub win_count: i64,
    pub loss_count: i64,
    pub total_paid: Amount,
    pub total_expected: Amount,
}

/// One participant's record in one event's round.
///
/// `won` marks the designated payer: in this domain the "winner" of the
/// round is the one who loses the game and pays the whole bill.
#[derive(Clone, Debug)]
pub struct Participation {
    pub id: i64,
    pub event_id: i64,
    pub participant_id: i64,
    pub attended: bool,
    pub won: bool,
    pub paid_amount: Amount,
    pub expected_amount: Amount,
}

/// One entry of a submitted round outcome.
#[derive(Clone, Debug)]
pub struct RoundOutcome {
    pub participant_id: i64,
    pub won: bool,
    pub paid_amount: Amount,
}

/// A participation row ready to be inserted, without a store-assigned ID.
#[derive(Clone, Debug)]
pub struct NewParticipation {
    pub participant_id: i64,
    pub attended: bool,
    pub won: bool,
    pub paid_amount: Amount,
    pub expected_amount: Amount,
}

/// The fully computed replacement set of rows for one event's round.
#[derive(Clone, Debug)]
pub struct RoundBatch {
    pub rows: Vec<NewParticipation>,
    pub has_winner: bool,
}

/// Per-participant statistics recomputed from the participation rows.
///
/// `balance` is expected minus paid: positive means the participant has
/// historically paid less than their fair share.
#[derive(Clone, Debug)]
pub struct ParticipantStat {
    pub id: i64,
    pub name: String,
    pub total_games: i64,
    pub win_count: i64,
    pub loss_count: i64,
    pub win_rate: f64,
    pub total_paid: Amount,
    pub total_expected: Amount,
    pub balance: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventStats {
    pub total_events: i64,
    pub total_amount: Amount,
    pub average_amount: Amount,
}

/// The summary of one decided round, for the statistics views.
#[derive(Clone, Debug)]
pub struct RoundResult {
    pub event_id: i64,
    pub event_name: String,
    pub date: NaiveDate,
    pub amount: Amount,
    pub participants: Vec<Participation>,
    pub winner: Option<i64>,
}

/// How many rows a snapshot import created per collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationStats {
    pub participants_count: usize,
    pub events_count: usize,
    pub participations_count: usize,
}

impl NewEvent {
    pub fn new(name: &str, date: NaiveDate, total_amount: Amount) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            date,
            location: None,
            description: None,
            total_amount,
        }
    }
}

impl RoundOutcome {
    pub fn new(participant_id: i64, won: bool, paid_amount: Amount) -> RoundOutcome {
        RoundOutcome {
            participant_id,
            won,
            paid_amount,
        }
    }

    pub fn new_payer(participant_id: i64, paid_amount: Amount) -> RoundOutcome {
        RoundOutcome::new(participant_id, true, paid_amount)
    }

    pub fn new_spared(participant_id: i64) -> RoundOutcome {
        RoundOutcome::new(participant_id, false, 0)
    }
}
