//! Keeps the stored event set in step with the latest scrape.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use serde::Serialize;

use crate::types::{EventRecord, StoredEvent};

/// Storage the reconciler writes through. Event names are the identity.
pub trait EventRepository {
    type Error;

    fn list_all(&self) -> Result<Vec<StoredEvent>, Self::Error>;

    /// Leaves exactly one stored event called `record.name`, carrying the
    /// record's site and date.
    fn upsert(&mut self, record: &EventRecord) -> Result<(), Self::Error>;

    /// Returns how many rows were removed.
    fn delete_by_name(&mut self, name: &str) -> Result<usize, Self::Error>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} unchanged, {} deleted",
            self.inserted, self.updated, self.unchanged, self.deleted
        )
    }
}

/// Applies `fresh` to `repo`: new names are inserted, known names get their
/// site and date refreshed, names missing from `fresh` are deleted.
///
/// Only the first record of a repeated name is used.
pub fn reconcile<R: EventRepository>(
    repo: &mut R,
    fresh: &[EventRecord],
) -> Result<ReconcileReport, R::Error> {
    let stored = repo.list_all()?;
    let mut stored_by_name: HashMap<&str, Vec<&EventRecord>> = HashMap::new();
    for event in &stored {
        stored_by_name
            .entry(event.record.name.as_str())
            .or_default()
            .push(&event.record);
    }

    let mut report = ReconcileReport::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for record in fresh {
        if !seen.insert(record.name.as_str()) {
            log::debug!("Ignoring repeated event name '{}'", record.name);
            continue;
        }

        match stored_by_name.get(record.name.as_str()) {
            None => {
                repo.upsert(record)?;
                report.inserted += 1;
            }
            Some(rows) if rows.len() == 1 && rows[0] == record => {
                report.unchanged += 1;
            }
            Some(_) => {
                repo.upsert(record)?;
                report.updated += 1;
            }
        }
    }

    let vanished: Vec<&str> = stored_by_name
        .keys()
        .copied()
        .filter(|name| !seen.contains(name))
        .collect();

    if fresh.is_empty() && !vanished.is_empty() {
        log::warn!(
            "Latest scrape returned no events, removing all {} stored",
            vanished.len()
        );
    }

    for name in vanished {
        log::info!("Removing vanished event '{}'", name);
        report.deleted += repo.delete_by_name(name)?;
    }

    Ok(report)
}
