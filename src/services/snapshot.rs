use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::hash::ContentHash;
use crate::models::{Lesson, LessonSubscriber, PlanHeader, RoomView, SchoolClass, TeacherView};
use crate::upstream::{Element, PlanSource};

/// Counts from one merge, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Upstream timestamp matched the last merge; nothing was looked at.
    pub unchanged_timestamp: bool,
    pub classes_added: usize,
    pub classes_patched: usize,
    pub classes_skipped: usize,
    pub lessons_patched: usize,
}

#[derive(Default)]
struct PlanState {
    last_pulled: Option<DateTime<Utc>>,
    last_merge: Option<MergeStats>,
    header: Option<PlanHeader>,
    classes: HashMap<String, Arc<SchoolClass>>,
    teachers: HashMap<String, TeacherView>,
    rooms: HashMap<String, RoomView>,
}

impl PlanState {
    /// Merges a freshly pulled document. Everything is staged first, so a
    /// malformed document leaves the state untouched.
    fn merge(&mut self, root: &Element) -> Result<MergeStats> {
        let header = PlanHeader::from_root(root)?;
        if self.header.as_ref().is_some_and(|h| h.timestamp == header.timestamp) {
            return Ok(MergeStats {
                unchanged_timestamp: true,
                ..MergeStats::default()
            });
        }

        let mut stats = MergeStats::default();
        let mut staged: Vec<(Arc<SchoolClass>, Vec<Arc<Lesson>>)> = Vec::new();

        if let Some(classes) = root.child("Klassen") {
            for class_el in &classes.children {
                let name = SchoolClass::name_of(class_el)?;
                match self.classes.get(name) {
                    Some(existing) if existing.hash == ContentHash::of(class_el) => {
                        stats.classes_skipped += 1;
                    }
                    Some(existing) => {
                        let (class, patched) = existing.patched(class_el)?;
                        stats.classes_patched += 1;
                        stats.lessons_patched += patched.len();
                        staged.push((Arc::new(class), patched));
                    }
                    None => {
                        let class = Arc::new(SchoolClass::from_element(class_el)?);
                        let lessons = class.lessons.clone();
                        stats.classes_added += 1;
                        staged.push((class, lessons));
                    }
                }
            }
        }

        for (class, lessons) in staged {
            debug!("installing class {} ({} lessons changed)", class.name, lessons.len());
            self.classes.insert(class.name.clone(), class);
            for lesson in &lessons {
                self.notify(lesson);
            }
        }
        self.header = Some(header);

        Ok(stats)
    }

    fn notify(&mut self, lesson: &Arc<Lesson>) {
        for view in self.teachers.values_mut() {
            view.on_lesson_patched(lesson);
        }
        for view in self.rooms.values_mut() {
            view.on_lesson_patched(lesson);
        }
    }

    fn all_lessons(&self) -> impl Iterator<Item = &Arc<Lesson>> {
        self.classes.values().flat_map(|c| c.lessons.iter())
    }
}

/// Timetable state for one reference date.
///
/// Reads go through a shared lock; a merge takes the exclusive lock only
/// after the document has been fetched, so stale data keeps being served
/// while a pull is in flight. Pulls for the same date are serialized.
pub struct PlanSnapshot {
    date: NaiveDate,
    freshness: TimeDelta,
    source: Arc<dyn PlanSource>,
    pull_lock: Mutex<()>,
    state: RwLock<PlanState>,
}

impl PlanSnapshot {
    pub fn new(date: NaiveDate, freshness: TimeDelta, source: Arc<dyn PlanSource>) -> Self {
        Self {
            date,
            freshness,
            source,
            pull_lock: Mutex::new(()),
            state: RwLock::new(PlanState::default()),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub async fn last_pulled(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_pulled
    }

    /// Outcome of the most recent successful merge.
    pub async fn last_merge(&self) -> Option<MergeStats> {
        self.state.read().await.last_merge
    }

    /// When the current data stops being fresh. `None` before the first
    /// pull, or when the freshness TTL reaches past the representable range.
    pub async fn data_expires(&self) -> Option<DateTime<Utc>> {
        self.last_pulled()
            .await
            .and_then(|t| t.checked_add_signed(self.freshness))
    }

    async fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.state.read().await.last_pulled {
            Some(pulled) => now - pulled > self.freshness,
            None => true,
        }
    }

    /// Re-pulls if the data is older than the freshness TTL.
    ///
    /// Returns whether the snapshot can answer queries: a failed refresh
    /// keeps the previous data, so this is only false when nothing was ever
    /// pulled successfully.
    pub async fn ensure_fresh(&self) -> bool {
        if !self.is_stale(Utc::now()).await {
            return true;
        }

        let _pull = self.pull_lock.lock().await;
        if !self.is_stale(Utc::now()).await {
            return true;
        }
        if self.pull_and_merge_locked().await {
            return true;
        }
        self.state.read().await.last_pulled.is_some()
    }

    /// Fetches the document for this date and merges it into the current
    /// state. On failure nothing is changed and false is returned.
    pub async fn pull_and_merge(&self) -> bool {
        let _pull = self.pull_lock.lock().await;
        self.pull_and_merge_locked().await
    }

    async fn pull_and_merge_locked(&self) -> bool {
        debug!("pulling plan for {}", self.date);
        let root = match self.source.fetch(self.date).await {
            Ok(root) => root,
            Err(e) => {
                warn!("pull for {} failed: {}", self.date, e);
                return false;
            }
        };

        let mut state = self.state.write().await;
        match state.merge(&root) {
            Ok(stats) => {
                state.last_pulled = Some(Utc::now());
                state.last_merge = Some(stats);
                if stats.unchanged_timestamp {
                    debug!("plan for {} unchanged upstream", self.date);
                } else {
                    info!(
                        "merged plan for {} - classes: {} added, {} patched, {} skipped | lessons patched: {}",
                        self.date,
                        stats.classes_added,
                        stats.classes_patched,
                        stats.classes_skipped,
                        stats.lessons_patched
                    );
                }
                true
            }
            Err(e) => {
                warn!("discarding malformed plan for {}: {}", self.date, e);
                false
            }
        }
    }

    /// Looks a class up, refreshing first. With `allow_create_on_miss` a miss
    /// triggers one forced pull and a single retry.
    pub async fn get_class(&self, name: &str, allow_create_on_miss: bool) -> Option<Arc<SchoolClass>> {
        if !self.ensure_fresh().await {
            return None;
        }
        if let Some(class) = self.state.read().await.classes.get(name) {
            return Some(Arc::clone(class));
        }
        if !allow_create_on_miss {
            return None;
        }

        debug!("class {} not in plan for {}, forcing a pull", name, self.date);
        self.pull_and_merge().await;
        self.state.read().await.classes.get(name).cloned()
    }

    /// Lessons of one teacher, matched on actual or default attribution.
    /// The view is built on first use and kept current by later merges.
    pub async fn get_teacher_view(&self, shorthand: &str) -> Option<TeacherView> {
        if !self.ensure_fresh().await {
            return None;
        }
        if let Some(view) = self.state.read().await.teachers.get(shorthand) {
            return (!view.is_empty()).then(|| view.clone());
        }

        let mut state = self.state.write().await;
        if let Some(view) = state.teachers.get(shorthand) {
            return (!view.is_empty()).then(|| view.clone());
        }
        let view = TeacherView::build(shorthand, state.all_lessons());
        if view.is_empty() {
            return None;
        }
        debug!("built teacher view {} for {} ({} lessons)", shorthand, self.date, view.lessons().len());
        state.teachers.insert(shorthand.to_string(), view.clone());
        Some(view)
    }

    pub async fn get_room_view(&self, name: &str) -> Option<RoomView> {
        if !self.ensure_fresh().await {
            return None;
        }
        if let Some(view) = self.state.read().await.rooms.get(name) {
            return (!view.is_empty()).then(|| view.clone());
        }

        let mut state = self.state.write().await;
        if let Some(view) = state.rooms.get(name) {
            return (!view.is_empty()).then(|| view.clone());
        }
        let view = RoomView::build(name, state.all_lessons());
        if view.is_empty() {
            return None;
        }
        debug!("built room view {} for {} ({} lessons)", name, self.date, view.lessons().len());
        state.rooms.insert(name.to_string(), view.clone());
        Some(view)
    }

    pub async fn header(&self) -> Option<PlanHeader> {
        if !self.ensure_fresh().await {
            return None;
        }
        self.state.read().await.header.clone()
    }

    pub async fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().await.classes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered view keys, teachers then rooms.
    pub async fn cached_views(&self) -> (Vec<String>, Vec<String>) {
        let state = self.state.read().await;
        let mut teachers: Vec<String> = state.teachers.keys().cloned().collect();
        let mut rooms: Vec<String> = state.rooms.keys().cloned().collect();
        teachers.sort();
        rooms.sort();
        (teachers, rooms)
    }
}
