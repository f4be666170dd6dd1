//! The entity store owning the durable records.

use crate::error::StoreError;
use crate::migration::Snapshot;
use crate::types::{
    Event, MigrationStats, NewEvent, Participant, Participation, RoundBatch, RoundOutcome,
};

type StoreResult<T> = Result<T, StoreError>;

pub mod sqlite;

/// This trait abstracts over the type of store.

/// The implementation could keep the records in any transactional
/// relational database. Multi-statement operations must be atomic: either
/// every statement of one call is applied, or none is.
pub trait Store {
    /// Create a new event owned by *owner_id* and return it with its
    /// store-assigned ID.
    fn create_event(&mut self, owner_id: i64, event: NewEvent) -> StoreResult<Event>;

    /// Get a single event by ID, regardless of its owner.
    ///
    /// Callers must check ownership before mutating anything that belongs
    /// to the returned event.
    fn get_event(&self, event_id: i64) -> StoreResult<Option<Event>>;

    /// Get all events owned by *owner_id*, newest first.
    fn get_events(&self, owner_id: i64) -> StoreResult<Vec<Event>>;

    /// Delete an event together with all its participation rows.
    fn delete_event(&mut self, owner_id: i64, event_id: i64) -> StoreResult<()>;

    /// Overwrite the cached "has result" flag of an event.
    fn set_has_result(&mut self, event_id: i64, has_result: bool) -> StoreResult<()>;

    /// Create a new participant owned by *owner_id*, with zeroed counters.
    ///
    /// Participant names are unique per owner; a duplicate name is an error.
    fn create_participant(&mut self, owner_id: i64, name: &str) -> StoreResult<Participant>;

    /// Get all participants owned by *owner_id*.
    fn get_participants(&self, owner_id: i64) -> StoreResult<Vec<Participant>>;

    /// Delete a participant.
    ///
    /// Participation rows referencing the participant are left in place;
    /// readers must tolerate the dangling reference.
    fn delete_participant(&mut self, owner_id: i64, participant_id: i64) -> StoreResult<()>;

    /// Get all participation rows of one event.
    fn get_event_participations(&self, event_id: i64) -> StoreResult<Vec<Participation>>;

    /// Get all participation rows belonging to events owned by *owner_id*.
    fn get_participations(&self, owner_id: i64) -> StoreResult<Vec<Participation>>;

    /// Write one participation row per outcome, updating the payer flag
    /// and paid amount in place when a row for (event, participant)
    /// already exists, then recompute the event total as the sum of paid
    /// amounts over all rows of the event. One transaction.
    ///
    /// Returns the written rows. Rows of participants not present in
    /// *outcomes* are not touched.
    fn upsert_round(
        &mut self,
        event_id: i64,
        outcomes: &[RoundOutcome],
    ) -> StoreResult<Vec<Participation>>;

    /// Replace the full participation set of an event with *batch*:
    /// delete all prior rows, insert the new ones, bump the counters of
    /// every participant in the batch, set the "has result" flag to
    /// whether the batch has a payer, and recompute the event total from
    /// the fresh rows. One transaction.
    fn replace_round(
        &mut self,
        event_id: i64,
        batch: &RoundBatch,
    ) -> StoreResult<Vec<Participation>>;

    /// Import a foreign snapshot under *owner_id*: participants first,
    /// then events, then the participations linked through the freshly
    /// assigned IDs. Rows with dangling references inside the snapshot
    /// are skipped; any store failure rolls the whole import back.
    fn import_snapshot(
        &mut self,
        owner_id: i64,
        snapshot: &Snapshot,
    ) -> StoreResult<MigrationStats>;
}
