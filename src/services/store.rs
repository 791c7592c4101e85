use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{PlanHeader, RoomView, SchoolClass, TeacherView};
use crate::services::snapshot::PlanSnapshot;
use crate::upstream::PlanSource;

/// The two aging policies plus the optional negative cache.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    /// How old data may get before a query re-pulls it.
    pub freshness: TimeDelta,
    /// How long a snapshot may go unqueried before it is evicted.
    pub retention: TimeDelta,
    /// How long a failed first pull is remembered. Zero disables it.
    pub negative_ttl: TimeDelta,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            freshness: TimeDelta::minutes(10),
            retention: TimeDelta::hours(1),
            negative_ttl: TimeDelta::zero(),
        }
    }
}

/// Result of a query against the store.
#[derive(Debug, Clone)]
pub enum Lookup<T> {
    Found(T),
    /// The plan exists but has no such class, teacher or room.
    NotFound,
    /// No plan could be obtained for the date.
    DateUnavailable,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_date_unavailable(&self) -> bool {
        matches!(self, Lookup::DateUnavailable)
    }

    /// Maps the negative outcomes onto errors for the HTTP layer.
    pub fn into_result(self, date: NaiveDate, not_found: impl FnOnce() -> AppError) -> Result<T> {
        match self {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(not_found()),
            Lookup::DateUnavailable => Err(AppError::PlanNotFound(date)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub date: NaiveDate,
    pub last_updated: Option<DateTime<Utc>>,
    pub data_expires: Option<DateTime<Utc>>,
    pub last_access: DateTime<Utc>,
    /// `None` when the retention TTL reaches past the representable range.
    pub retention_expires: Option<DateTime<Utc>>,
}

struct StoreEntry {
    snapshot: Arc<PlanSnapshot>,
    last_access: DateTime<Utc>,
}

/// Parses a reference date as given by callers (`yyyy-MM-dd`).
pub fn parse_reference_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| AppError::InvalidDate(input.to_string()))
}

/// Date-keyed cache of plan snapshots.
///
/// The map lock is only held for lookups and inserts, never across a pull,
/// so work on different dates does not serialize.
pub struct SnapshotStore {
    source: Arc<dyn PlanSource>,
    settings: StoreSettings,
    entries: Mutex<HashMap<NaiveDate, StoreEntry>>,
    failures: Mutex<HashMap<NaiveDate, DateTime<Utc>>>,
}

impl SnapshotStore {
    pub fn new(source: Arc<dyn PlanSource>, settings: StoreSettings) -> Self {
        if settings.retention < settings.freshness {
            warn!(
                "retention ({}s) is shorter than freshness ({}s); snapshots will be evicted before they go stale",
                settings.retention.num_seconds(),
                settings.freshness.num_seconds()
            );
        }
        Self {
            source,
            settings,
            entries: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the snapshot for `date`, creating and pulling it first if
    /// needed. A snapshot whose first pull fails is not kept.
    pub async fn get_or_create(&self, date: NaiveDate) -> Option<Arc<PlanSnapshot>> {
        if let Some(entry) = self.entries.lock().await.get_mut(&date) {
            entry.last_access = Utc::now();
            return Some(Arc::clone(&entry.snapshot));
        }

        if self.recently_failed(date).await {
            debug!("plan for {} failed recently, not retrying yet", date);
            return None;
        }

        info!("creating snapshot for {}", date);
        let snapshot = Arc::new(PlanSnapshot::new(date, self.settings.freshness, Arc::clone(&self.source)));
        if !snapshot.pull_and_merge().await {
            warn!("first pull for {} failed, snapshot not created", date);
            if self.settings.negative_ttl > TimeDelta::zero() {
                self.failures.lock().await.insert(date, Utc::now());
            }
            return None;
        }

        let mut entries = self.entries.lock().await;
        let entry = entries.entry(date).or_insert_with(|| StoreEntry {
            snapshot,
            last_access: Utc::now(),
        });
        entry.last_access = Utc::now();
        Some(Arc::clone(&entry.snapshot))
    }

    async fn recently_failed(&self, date: NaiveDate) -> bool {
        let mut failures = self.failures.lock().await;
        match failures.get(&date) {
            Some(failed_at) if Utc::now() - *failed_at < self.settings.negative_ttl => true,
            Some(_) => {
                failures.remove(&date);
                false
            }
            None => false,
        }
    }

    /// Drops every snapshot that has not been accessed within the retention
    /// TTL. Returns how many were evicted.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = self.settings.retention;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|date, entry| {
            let keep = entry
                .last_access
                .checked_add_signed(retention)
                .is_none_or(|expires| expires >= now);
            if !keep {
                debug!("evicting snapshot for {}", date);
            }
            keep
        });
        let evicted = before - entries.len();
        drop(entries);

        self.failures
            .lock()
            .await
            .retain(|_, failed_at| now - *failed_at < self.settings.negative_ttl);

        evicted
    }

    pub async fn contains(&self, date: NaiveDate) -> bool {
        self.entries.lock().await.contains_key(&date)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn class_for(&self, date: NaiveDate, name: &str) -> Lookup<Arc<SchoolClass>> {
        let Some(snapshot) = self.get_or_create(date).await else {
            return Lookup::DateUnavailable;
        };
        match snapshot.get_class(name, true).await {
            Some(class) => Lookup::Found(class),
            None => Lookup::NotFound,
        }
    }

    pub async fn teacher_for(&self, date: NaiveDate, shorthand: &str) -> Lookup<TeacherView> {
        let Some(snapshot) = self.get_or_create(date).await else {
            return Lookup::DateUnavailable;
        };
        match snapshot.get_teacher_view(shorthand).await {
            Some(view) => Lookup::Found(view),
            None => Lookup::NotFound,
        }
    }

    pub async fn room_for(&self, date: NaiveDate, name: &str) -> Lookup<RoomView> {
        let Some(snapshot) = self.get_or_create(date).await else {
            return Lookup::DateUnavailable;
        };
        match snapshot.get_room_view(name).await {
            Some(view) => Lookup::Found(view),
            None => Lookup::NotFound,
        }
    }

    pub async fn header_for(&self, date: NaiveDate) -> Lookup<PlanHeader> {
        let Some(snapshot) = self.get_or_create(date).await else {
            return Lookup::DateUnavailable;
        };
        match snapshot.header().await {
            Some(header) => Lookup::Found(header),
            None => Lookup::NotFound,
        }
    }

    /// Per-date cache statistics, oldest date first. Read-only.
    pub async fn stats(&self) -> Vec<CacheStats> {
        let entries: Vec<(Arc<PlanSnapshot>, DateTime<Utc>)> = self
            .entries
            .lock()
            .await
            .values()
            .map(|e| (Arc::clone(&e.snapshot), e.last_access))
            .collect();

        let mut stats = Vec::with_capacity(entries.len());
        for (snapshot, last_access) in entries {
            stats.push(CacheStats {
                date: snapshot.date(),
                last_updated: snapshot.last_pulled().await,
                data_expires: snapshot.data_expires().await,
                last_access,
                retention_expires: last_access.checked_add_signed(self.settings.retention),
            });
        }
        stats.sort_by_key(|s| s.date);
        stats
    }
}
