//! SQLite persistence for events and bot subscribers.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::reconcile::{EventRepository, ReconcileReport, reconcile};
use crate::types::{EventRecord, StoredEvent, SubscriberProfile, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT,
        name TEXT NOT NULL,
        site TEXT NOT NULL,
        UNIQUE (name, site, date)
    );
    CREATE INDEX IF NOT EXISTS events_name ON events (name);

    CREATE TABLE IF NOT EXISTS profiles (
        external_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        profile_id INTEGER NOT NULL UNIQUE REFERENCES profiles (external_id),
        subscribed INTEGER NOT NULL DEFAULT 0,
        changed_at TEXT NOT NULL
    );
";

fn map_event(row: &Row<'_>) -> rusqlite::Result<StoredEvent> {
    Ok(StoredEvent {
        id: row.get(0)?,
        record: EventRecord {
            date: row.get(1)?,
            name: row.get(2)?,
            site: row.get(3)?,
        },
    })
}

fn map_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        profile: SubscriberProfile {
            external_id: row.get(0)?,
            name: row.get(1)?,
        },
        subscribed: row.get(2)?,
        changed_at: row.get(3)?,
    })
}

fn conflict_or(err: rusqlite::Error, what: impl FnOnce() -> String) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Conflict(what()),
        _ => StoreError::Sqlite(err),
    }
}

/// The `events` table seen through a borrowed connection, so the same code
/// runs inside or outside a transaction.
pub struct EventTable<'c> {
    conn: &'c Connection,
}

impl<'c> EventTable<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn insert(&self, record: &EventRecord) -> Result<i64, StoreError> {
        self.conn
            .execute(
                "INSERT INTO events (date, name, site) VALUES (?1, ?2, ?3)",
                params![record.date, record.name, record.site],
            )
            .map_err(|e| conflict_or(e, || format!("event '{}' already exists", record.name)))?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl EventRepository for EventTable<'_> {
    type Error = StoreError;

    fn list_all(&self) -> Result<Vec<StoredEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, date, name, site FROM events ORDER BY id")?;
        let rows = stmt.query_map([], map_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn upsert(&mut self, record: &EventRecord) -> Result<(), StoreError> {
        let keep: Option<i64> = self.conn.query_row(
            "SELECT MIN(id) FROM events WHERE name = ?1",
            params![record.name],
            |row| row.get(0),
        )?;

        match keep {
            Some(id) => {
                self.conn.execute(
                    "DELETE FROM events WHERE name = ?1 AND id <> ?2",
                    params![record.name, id],
                )?;
                self.conn.execute(
                    "UPDATE events SET site = ?1, date = ?2 WHERE id = ?3",
                    params![record.site, record.date, id],
                )?;
            }
            None => {
                self.insert(record)?;
            }
        }
        Ok(())
    }

    fn delete_by_name(&mut self, name: &str) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .execute("DELETE FROM events WHERE name = ?1", params![name])?)
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::bootstrap(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn list_events(&self) -> Result<Vec<StoredEvent>, StoreError> {
        EventTable::new(&self.conn).list_all()
    }

    pub fn get_event(&self, id: i64) -> Result<StoredEvent, StoreError> {
        self.conn
            .query_row(
                "SELECT id, date, name, site FROM events WHERE id = ?1",
                params![id],
                map_event,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))
    }

    pub fn insert_event(&mut self, record: &EventRecord) -> Result<StoredEvent, StoreError> {
        let id = EventTable::new(&self.conn).insert(record)?;
        Ok(StoredEvent {
            id,
            record: record.clone(),
        })
    }

    pub fn update_event(
        &mut self,
        id: i64,
        record: &EventRecord,
    ) -> Result<StoredEvent, StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE events SET date = ?1, name = ?2, site = ?3 WHERE id = ?4",
                params![record.date, record.name, record.site, id],
            )
            .map_err(|e| conflict_or(e, || format!("event '{}' already exists", record.name)))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("event {}", id)));
        }
        Ok(StoredEvent {
            id,
            record: record.clone(),
        })
    }

    pub fn delete_event(&mut self, id: i64) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("event {}", id)));
        }
        Ok(())
    }

    /// Reconciles the stored events with `fresh` in a single transaction.
    pub fn sync_events(&mut self, fresh: &[EventRecord]) -> Result<ReconcileReport, StoreError> {
        let tx = self.conn.transaction()?;
        let report = reconcile(&mut EventTable::new(&tx), fresh)?;
        tx.commit()?;
        log::info!("Reconciled events: {}", report);
        Ok(report)
    }

    pub fn subscription(&self, external_id: i64) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT p.external_id, p.name, s.subscribed, s.changed_at
                 FROM subscriptions s JOIN profiles p ON p.external_id = s.profile_id
                 WHERE p.external_id = ?1",
                params![external_id],
                map_subscription,
            )
            .optional()?)
    }

    /// Registers a chat on first contact. Existing rows are left untouched.
    pub fn touch_subscriber(
        &mut self,
        external_id: i64,
        name: &str,
    ) -> Result<Subscription, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO profiles (external_id, name) VALUES (?1, ?2)",
            params![external_id, name],
        )?;
        let created = tx.execute(
            "INSERT OR IGNORE INTO subscriptions (profile_id, subscribed, changed_at)
             VALUES (?1, 0, ?2)",
            params![external_id, Utc::now()],
        )?;
        tx.commit()?;

        if created > 0 {
            log::info!("New subscriber profile {} ({})", external_id, name);
        }
        self.subscription(external_id)?
            .ok_or_else(|| StoreError::NotFound(format!("subscription of {}", external_id)))
    }

    /// Returns `false` when the flag already had the requested value.
    pub fn set_subscribed(
        &mut self,
        external_id: i64,
        name: &str,
        subscribed: bool,
    ) -> Result<bool, StoreError> {
        let current = self.touch_subscriber(external_id, name)?;
        if current.subscribed == subscribed {
            return Ok(false);
        }

        self.conn.execute(
            "UPDATE subscriptions SET subscribed = ?1, changed_at = ?2 WHERE profile_id = ?3",
            params![subscribed, Utc::now(), external_id],
        )?;
        Ok(true)
    }

    pub fn active_subscribers(&self) -> Result<Vec<SubscriberProfile>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.external_id, p.name
             FROM subscriptions s JOIN profiles p ON p.external_id = s.profile_id
             WHERE s.subscribed = 1
             ORDER BY p.external_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubscriberProfile {
                external_id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(name: &str, day: u32) -> EventRecord {
        EventRecord::new(
            NaiveDate::from_ymd_opt(2026, 10, day),
            name,
            format!("https://events.yandex.ru/e/{}", day),
        )
    }

    fn names(db: &Database) -> Vec<String> {
        db.list_events()
            .unwrap()
            .into_iter()
            .map(|e| e.record.name)
            .collect()
    }

    #[test]
    fn test_sync_inserts_then_is_idempotent() {
        let mut db = Database::in_memory().unwrap();
        let fresh = [event("A", 1), event("B", 2)];

        let first = db.sync_events(&fresh).unwrap();
        assert_eq!(first.inserted, 2);
        let stored = db.list_events().unwrap();

        let second = db.sync_events(&fresh).unwrap();
        assert!(second.is_noop());
        assert_eq!(db.list_events().unwrap(), stored);
    }

    #[test]
    fn test_sync_replaces_vanished_event() {
        let mut db = Database::in_memory().unwrap();
        db.insert_event(&event("Old Event", 1)).unwrap();

        let report = db.sync_events(&[event("New Event", 2)]).unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(names(&db), ["New Event"]);
    }

    #[test]
    fn test_sync_updates_in_place() {
        let mut db = Database::in_memory().unwrap();
        let original = db.insert_event(&event("A", 1)).unwrap();
        let moved = EventRecord::new(None, "A", "https://events.yandex.ru/e/moved");

        db.sync_events(std::slice::from_ref(&moved)).unwrap();

        let stored = db.get_event(original.id).unwrap();
        assert_eq!(stored.record, moved);
    }

    #[test]
    fn test_unknown_date_round_trips() {
        let mut db = Database::in_memory().unwrap();
        let pending = EventRecord::new(None, "Pending", "https://events.yandex.ru/e/p");
        let stored = db.insert_event(&pending).unwrap();
        assert_eq!(db.get_event(stored.id).unwrap().record.date, None);
    }

    #[test]
    fn test_duplicate_tuple_is_a_conflict() {
        let mut db = Database::in_memory().unwrap();
        db.insert_event(&event("A", 1)).unwrap();
        assert!(matches!(
            db.insert_event(&event("A", 1)),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_update_and_delete_by_id() {
        let mut db = Database::in_memory().unwrap();
        let stored = db.insert_event(&event("A", 1)).unwrap();

        let updated = db.update_event(stored.id, &event("A2", 5)).unwrap();
        assert_eq!(db.get_event(stored.id).unwrap(), updated);

        db.delete_event(stored.id).unwrap();
        assert!(matches!(
            db.get_event(stored.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_event(stored.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.update_event(999, &event("X", 1)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_touch_subscriber_creates_once() {
        let mut db = Database::in_memory().unwrap();

        let first = db.touch_subscriber(42, "alice").unwrap();
        assert!(!first.subscribed);
        assert_eq!(first.profile.name, "alice");

        let again = db.touch_subscriber(42, "renamed").unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let mut db = Database::in_memory().unwrap();

        assert!(db.set_subscribed(1, "alice", true).unwrap());
        assert!(!db.set_subscribed(1, "alice", true).unwrap());
        assert!(db.set_subscribed(2, "bob", true).unwrap());
        db.touch_subscriber(3, "carol").unwrap();

        let active: Vec<i64> = db
            .active_subscribers()
            .unwrap()
            .into_iter()
            .map(|p| p.external_id)
            .collect();
        assert_eq!(active, [1, 2]);

        assert!(db.set_subscribed(1, "alice", false).unwrap());
        assert!(!db.set_subscribed(3, "carol", false).unwrap());
        assert_eq!(db.active_subscribers().unwrap().len(), 1);
        assert!(!db.subscription(1).unwrap().unwrap().subscribed);
    }
}
