use chrono::Duration;
use dashmap::DashMap;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::live_flights::{IdentityKey, LiveFlight};

/// Result of an upsert. Only `Superseded` and `Unchanged` leave the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// First record for the key
    Inserted,
    /// Existing record replaced by a newer report
    Updated,
    /// Existing record replaced by an explicit termination
    Terminated,
    /// A report newer than an explicit termination brought the flight back
    Restarted,
    /// Older than the stored record (or not newer than a termination); ignored
    Superseded,
    /// Same reported time and content as the stored record; ignored
    Unchanged,
}

impl UpsertOutcome {
    pub fn mutated(&self) -> bool {
        !matches!(self, UpsertOutcome::Superseded | UpsertOutcome::Unchanged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Terminated => "terminated",
            UpsertOutcome::Restarted => "restarted",
            UpsertOutcome::Superseded => "superseded",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

/// Apply the ordering rule: newest reported time wins, and a termination at T
/// beats anything reported at or before T.
pub fn classify(existing: Option<&LiveFlight>, incoming: &LiveFlight) -> UpsertOutcome {
    let Some(stored) = existing else {
        return UpsertOutcome::Inserted;
    };

    if incoming.last_updated_at < stored.last_updated_at {
        return UpsertOutcome::Superseded;
    }
    if stored.ended && incoming.last_updated_at <= stored.last_updated_at {
        return UpsertOutcome::Superseded;
    }
    if same_content(stored, incoming) {
        return UpsertOutcome::Unchanged;
    }
    if stored.ended && !incoming.ended {
        return UpsertOutcome::Restarted;
    }
    if incoming.ended {
        return UpsertOutcome::Terminated;
    }
    UpsertOutcome::Updated
}

/// Equal apart from when it was received. A stale flag flipped by maintenance
/// counts as a difference, so a repeated report still reactivates.
fn same_content(stored: &LiveFlight, incoming: &LiveFlight) -> bool {
    let mut masked = incoming.clone();
    masked.received_at = stored.received_at;
    masked == *stored
}

/// Holds the single current record per identity key.
///
/// Writes to one key are serialized through a per-key async mutex; writes to
/// different keys never share a lock. Readers see whole records because every
/// write replaces the record in one DashMap insert.
pub struct LiveStateStore {
    records: DashMap<IdentityKey, LiveFlight>,
    key_locks: DashMap<IdentityKey, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
}

impl LiveStateStore {
    pub fn new(clock: Arc<dyn Clock>, stale_after: Duration) -> Self {
        Self {
            records: DashMap::new(),
            key_locks: DashMap::new(),
            clock,
            stale_after,
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    async fn lock_key(&self, key: &IdentityKey) -> OwnedMutexGuard<()> {
        let lock = self
            .key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry of a key that never got a record, unless another
    /// writer is holding or waiting on it. Keeps `key_locks` bounded by `records`.
    fn release_unused_lock(&self, key: &IdentityKey) {
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Insert or replace the record for `key` under the ordering rule
    pub async fn upsert(&self, key: &IdentityKey, incoming: LiveFlight) -> UpsertOutcome {
        match self
            .upsert_with(key, |_| Ok::<_, Infallible>(incoming))
            .await
        {
            Ok((outcome, _)) => outcome,
            Err(never) => match never {},
        }
    }

    /// Like [`upsert`](Self::upsert), but the candidate record is built from the
    /// stored one while the key is locked.
    ///
    /// Returns the outcome and the record as stored afterwards. If `build` fails
    /// the store is left untouched.
    pub async fn upsert_with<F, E>(
        &self,
        key: &IdentityKey,
        build: F,
    ) -> Result<(UpsertOutcome, LiveFlight), E>
    where
        F: FnOnce(Option<&LiveFlight>) -> Result<LiveFlight, E>,
    {
        let guard = self.lock_key(key).await;

        // Clone out so no shard lock is held across the insert below
        let existing = self.records.get(key).map(|entry| entry.value().clone());
        let incoming = match build(existing.as_ref()) {
            Ok(incoming) => incoming,
            Err(e) => {
                if existing.is_none() {
                    drop(guard);
                    self.release_unused_lock(key);
                }
                return Err(e);
            }
        };
        debug_assert_eq!(&incoming.key(), key);

        let outcome = classify(existing.as_ref(), &incoming);
        if !outcome.mutated() {
            trace!("{} for {}: store unchanged", outcome.as_str(), key);
            // Unchanged and Superseded both imply a stored record
            let stored = existing.unwrap_or(incoming);
            return Ok((outcome, stored));
        }

        self.records.insert(key.clone(), incoming.clone());
        Ok((outcome, incoming))
    }

    pub fn get(&self, key: &IdentityKey) -> Option<LiveFlight> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Records that are flagged active and not stale as of now, ordered by key
    pub fn list_active(&self) -> Vec<LiveFlight> {
        let now = self.clock.now();
        let mut active: Vec<LiveFlight> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_live_at(now, self.stale_after))
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by(|a, b| {
            (a.operator_id.as_str(), a.callsign.as_str())
                .cmp(&(b.operator_id.as_str(), b.callsign.as_str()))
        });
        active
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flip `is_active` off for records that went stale. Returns how many flipped.
    ///
    /// Freshness is checked again while holding the record's shard write lock,
    /// so an upsert that lands between the scan and the write keeps the flight active.
    pub fn deactivate_stale(&self) -> usize {
        let scan_time = self.clock.now();
        let candidates: Vec<IdentityKey> = self
            .records
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.is_active && record.is_stale_at(scan_time, self.stale_after)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut deactivated = 0;
        for key in candidates {
            if let Some(mut record) = self.records.get_mut(&key) {
                let now = self.clock.now();
                if record.is_active && record.is_stale_at(now, self.stale_after) {
                    record.is_active = false;
                    deactivated += 1;
                    debug!(
                        "Deactivated stale flight {} (last update {} seconds ago)",
                        key,
                        now.signed_duration_since(record.last_updated_at).num_seconds()
                    );
                }
            }
        }
        deactivated
    }
}
