//! The implementation of the entity store using Sqlite.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task::block_in_place;

use crate::{
    error::{InputError, StoreError},
    migration::{parse_snapshot_date, Snapshot},
    types::{
        Amount, Event, MigrationStats, NewEvent, Participant, Participation, RoundBatch,
        RoundOutcome,
    },
};

use super::{Store, StoreResult};

mod schema;

pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<SqliteStore> {
        block_in_place(|| {
            let connection = Connection::open(path)
                .map_err(|e| StoreError::new("cannot open database", e.into()))?;
            schema::create_all_tables(&connection)
                .map_err(|e| StoreError::new("cannot create tables", e))?;
            Ok(SqliteStore { connection })
        })
    }
}

impl Store for SqliteStore {
    fn create_event(&mut self, owner_id: i64, event: NewEvent) -> StoreResult<Event> {
        let fn_impl = || {
            let event_id: i64 = {
                let mut insert_event_stmt = self.connection.prepare_cached(
                    "INSERT INTO event (owner_id, name, date, location, description, total_amount)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
                )?;

                insert_event_stmt.query_row(
                    params![
                        &owner_id,
                        &event.name,
                        &event.date,
                        &event.location,
                        &event.description,
                        &event.total_amount
                    ],
                    |row| row.get(0),
                )?
            };

            debug!("event_id is {event_id}");

            Ok(Event {
                id: event_id,
                owner_id,
                name: event.name.clone(),
                date: event.date,
                location: event.location.clone(),
                description: event.description.clone(),
                total_amount: event.total_amount,
                has_result: false,
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot create event", e)))
    }

    fn get_event(&self, event_id: i64) -> StoreResult<Option<Event>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT id, owner_id, name, date, location, description, total_amount, has_result
                 FROM event WHERE id = :event_id",
            )?;

            let event = stmt
                .query_row(&[(":event_id", &event_id)], event_from_row)
                .optional()?;
            Ok(event)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get event", e)))
    }

    fn get_events(&self, owner_id: i64) -> StoreResult<Vec<Event>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT id, owner_id, name, date, location, description, total_amount, has_result
                 FROM event WHERE owner_id = :owner_id ORDER BY id DESC",
            )?;

            let event_iter = stmt.query_map(&[(":owner_id", &owner_id)], event_from_row)?;

            let events = event_iter.collect::<Result<_, _>>()?;
            Ok(events)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get events", e)))
    }

    fn delete_event(&mut self, owner_id: i64, event_id: i64) -> StoreResult<()> {
        debug!("Deleting event. Owner ID: {owner_id}. Event ID: {event_id}");
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            let num_deleted = tx.execute(
                "DELETE FROM event WHERE id = ?1 AND owner_id = ?2",
                params![&event_id, &owner_id],
            )?;
            if num_deleted > 0 {
                tx.execute(
                    "DELETE FROM participation WHERE event_id = ?1",
                    params![&event_id],
                )?;
            }

            tx.commit()?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot delete event", e)))
    }

    fn set_has_result(&mut self, event_id: i64, has_result: bool) -> StoreResult<()> {
        let fn_impl = || {
            self.connection.execute(
                "UPDATE event SET has_result = ?2 WHERE id = ?1",
                params![&event_id, &has_result],
            )?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot set the has_result flag", e)))
    }

    fn create_participant(&mut self, owner_id: i64, name: &str) -> StoreResult<Participant> {
        let fn_impl = || {
            let participant_id: i64 = {
                let mut insert_participant_stmt = self.connection.prepare_cached(
                    "INSERT INTO participant (owner_id, name) VALUES (?1, ?2) RETURNING id",
                )?;

                insert_participant_stmt.query_row(params![&owner_id, &name], |row| row.get(0))?
            };

            Ok(Participant {
                id: participant_id,
                owner_id,
                name: name.to_string(),
                total_participation: 0,
                win_count: 0,
                loss_count: 0,
                total_paid: 0,
                total_expected: 0,
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot create participant", e)))
    }

    fn get_participants(&self, owner_id: i64) -> StoreResult<Vec<Participant>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT id, owner_id, name, total_participation, win_count, loss_count,
                        total_paid, total_expected
                 FROM participant WHERE owner_id = :owner_id ORDER BY id",
            )?;

            let participant_iter =
                stmt.query_map(&[(":owner_id", &owner_id)], participant_from_row)?;

            let participants = participant_iter.collect::<Result<_, _>>()?;
            Ok(participants)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get participants", e)))
    }

    fn delete_participant(&mut self, owner_id: i64, participant_id: i64) -> StoreResult<()> {
        debug!("Deleting participant. Owner ID: {owner_id}. Participant ID: {participant_id}");
        let fn_impl = || {
            // Participation rows referencing the participant are left in
            // place; readers tolerate the dangling reference.
            self.connection.execute(
                "DELETE FROM participant WHERE id = ?1 AND owner_id = ?2",
                params![&participant_id, &owner_id],
            )?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot delete participant", e)))
    }

    fn get_event_participations(&self, event_id: i64) -> StoreResult<Vec<Participation>> {
        let fn_impl = || select_event_rows(&self.connection, event_id);

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get participations", e)))
    }

    fn get_participations(&self, owner_id: i64) -> StoreResult<Vec<Participation>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT p.id, p.event_id, p.participant_id, p.attended, p.won,
                        p.paid_amount, p.expected_amount
                 FROM participation p
                 INNER JOIN event e ON p.event_id = e.id
                 WHERE e.owner_id = :owner_id",
            )?;

            let row_iter = stmt.query_map(&[(":owner_id", &owner_id)], participation_from_row)?;

            let rows = row_iter.collect::<Result<_, _>>()?;
            Ok(rows)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get participations", e)))
    }

    fn upsert_round(
        &mut self,
        event_id: i64,
        outcomes: &[RoundOutcome],
    ) -> StoreResult<Vec<Participation>> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            {
                let mut upsert_participation_stmt = tx.prepare_cached(
                    "INSERT INTO participation (event_id, participant_id, won, paid_amount)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(event_id, participant_id)
                     DO UPDATE SET won = excluded.won, paid_amount = excluded.paid_amount",
                )?;

                for outcome in outcomes {
                    upsert_participation_stmt.execute(params![
                        &event_id,
                        &outcome.participant_id,
                        &outcome.won,
                        &outcome.paid_amount,
                    ])?;
                }
            }

            // Any subset of rows may have changed, so the total is always
            // recomputed from the full row set.
            recompute_event_total(&tx, event_id)?;

            let rows = select_event_rows(&tx, event_id)?;

            tx.commit()?;

            let written: HashSet<_> = outcomes.iter().map(|o| o.participant_id).collect();
            Ok(rows
                .into_iter()
                .filter(|r| written.contains(&r.participant_id))
                .collect())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot record round", e)))
    }

    fn replace_round(
        &mut self,
        event_id: i64,
        batch: &RoundBatch,
    ) -> StoreResult<Vec<Participation>> {
        debug!(
            "Replacing round. Event ID: {event_id}. Rows: {}",
            batch.rows.len()
        );
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            tx.execute(
                "DELETE FROM participation WHERE event_id = ?1",
                params![&event_id],
            )?;

            {
                let mut insert_participation_stmt = tx.prepare_cached(
                    "INSERT INTO participation
                     (event_id, participant_id, attended, won, paid_amount, expected_amount)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                let mut bump_counters_stmt = tx.prepare_cached(
                    "UPDATE participant SET
                       total_participation = total_participation + 1,
                       win_count = win_count + ?2,
                       loss_count = loss_count + ?3,
                       total_paid = total_paid + ?4,
                       total_expected = total_expected + ?5
                     WHERE id = ?1",
                )?;

                for row in &batch.rows {
                    insert_participation_stmt.execute(params![
                        &event_id,
                        &row.participant_id,
                        &row.attended,
                        &row.won,
                        &row.paid_amount,
                        &row.expected_amount,
                    ])?;

                    let (win_bump, loss_bump): (i64, i64) = if row.won { (1, 0) } else { (0, 1) };
                    let num_updated = bump_counters_stmt.execute(params![
                        &row.participant_id,
                        &win_bump,
                        &loss_bump,
                        &row.paid_amount,
                        &row.expected_amount,
                    ])?;
                    if num_updated == 0 {
                        return Err(
                            StoreError::concurrency("the participant was not found").into()
                        );
                    }
                }
            }

            tx.execute(
                "UPDATE event SET has_result = ?2 WHERE id = ?1",
                params![&event_id, &batch.has_winner],
            )?;
            recompute_event_total(&tx, event_id)?;

            let rows = select_event_rows(&tx, event_id)?;

            tx.commit()?;

            Ok(rows)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot replace round", e)))
    }

    fn import_snapshot(
        &mut self,
        owner_id: i64,
        snapshot: &Snapshot,
    ) -> StoreResult<MigrationStats> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            // Both ID maps must be complete before any participation is
            // linked through them.
            let mut participant_id_map = HashMap::new();
            {
                let mut insert_participant_stmt = tx.prepare_cached(
                    "INSERT INTO participant (owner_id, name) VALUES (?1, ?2) RETURNING id",
                )?;

                for local in &snapshot.participants {
                    let new_id: i64 = insert_participant_stmt
                        .query_row(params![&owner_id, &local.name], |row| row.get(0))?;
                    participant_id_map.insert(local.id.as_str(), new_id);
                }
            }

            let mut event_id_map = HashMap::new();
            {
                let mut insert_event_stmt = tx.prepare_cached(
                    "INSERT INTO event (owner_id, name, date, location, description, total_amount)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
                )?;

                for local in &snapshot.events {
                    let date = parse_snapshot_date(&local.date)
                        .ok_or_else(|| InputError::invalid_snapshot_date(local.date.clone()))?;
                    let total_amount = local.total_amount.unwrap_or(0);
                    let new_id: i64 = insert_event_stmt.query_row(
                        params![
                            &owner_id,
                            &local.name,
                            &date,
                            &local.location,
                            &local.description,
                            &total_amount,
                        ],
                        |row| row.get(0),
                    )?;
                    event_id_map.insert(local.id.as_str(), new_id);
                }
            }

            let mut participations_count = 0;
            {
                let mut insert_participation_stmt = tx.prepare_cached(
                    "INSERT INTO participation (event_id, participant_id, won, paid_amount)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;

                for local in &snapshot.participations {
                    let event_id = event_id_map.get(local.event_id.as_str());
                    let participant_id = participant_id_map.get(local.participant_id.as_str());

                    // A dangling reference inside the snapshot skips the
                    // row instead of aborting the import.
                    let (event_id, participant_id) = match (event_id, participant_id) {
                        (Some(&event_id), Some(&participant_id)) => (event_id, participant_id),
                        _ => {
                            debug!(
                                "skipping participation {} with dangling references",
                                local.id
                            );
                            continue;
                        }
                    };

                    insert_participation_stmt.execute(params![
                        &event_id,
                        &participant_id,
                        &local.is_winner,
                        &local.paid_amount,
                    ])?;
                    participations_count += 1;
                }
            }

            tx.commit()?;

            Ok(MigrationStats {
                participants_count: snapshot.participants.len(),
                events_count: snapshot.events.len(),
                participations_count,
            })
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot import snapshot", e)))
    }
}

fn recompute_event_total(connection: &Connection, event_id: i64) -> anyhow::Result<()> {
    let total: Amount = connection.query_row(
        "SELECT COALESCE(SUM(paid_amount), 0) FROM participation WHERE event_id = ?1",
        params![&event_id],
        |row| row.get(0),
    )?;

    let num_updated = connection.execute(
        "UPDATE event SET total_amount = ?2 WHERE id = ?1",
        params![&event_id, &total],
    )?;
    if num_updated == 0 {
        return Err(StoreError::concurrency("the event was not found").into());
    }

    Ok(())
}

fn select_event_rows(connection: &Connection, event_id: i64) -> anyhow::Result<Vec<Participation>> {
    let mut stmt = connection.prepare_cached(
        "SELECT id, event_id, participant_id, attended, won, paid_amount, expected_amount
         FROM participation WHERE event_id = :event_id",
    )?;

    let row_iter = stmt.query_map(&[(":event_id", &event_id)], participation_from_row)?;

    let rows = row_iter.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn event_from_row(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        date: row.get(3)?,
        location: row.get(4)?,
        description: row.get(5)?,
        total_amount: row.get(6)?,
        has_result: row.get(7)?,
    })
}

fn participant_from_row(row: &rusqlite::Row) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        total_participation: row.get(3)?,
        win_count: row.get(4)?,
        loss_count: row.get(5)?,
        total_paid: row.get(6)?,
        total_expected: row.get(7)?,
    })
}

fn participation_from_row(row: &rusqlite::Row) -> rusqlite::Result<Participation> {
    Ok(Participation {
        id: row.get(0)?,
        event_id: row.get(1)?,
        participant_id: row.get(2)?,
        attended: row.get(3)?,
        won: row.get(4)?,
        paid_amount: row.get(5)?,
        expected_amount: row.get(6)?,
    })
}

fn map_error<T: AsRef<str>>(message: T, e: anyhow::Error) -> StoreError {
    match e.downcast::<StoreError>() {
        Ok(e) => e,
        Err(e) => StoreError::new(message, e),
    }
}
