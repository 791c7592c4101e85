//! Typed timetable entities for one reference date.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::hash::ContentHash;
use crate::upstream::Element;

/// Subject text upstream writes into a lesson that no longer takes place.
pub const CANCELLED_SUBJECT: &str = "---";

/// Plan-level metadata from the document header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanHeader {
    /// Raw header timestamp. Upstream bumps it whenever anything changes.
    pub timestamp: String,
    pub published_at: Option<NaiveDateTime>,
    pub off_days: Vec<NaiveDate>,
    pub infos: Vec<String>,
}

impl PlanHeader {
    pub fn from_root(root: &Element) -> Result<Self> {
        let timestamp = root
            .child("Kopf")
            .ok_or_else(|| AppError::parse("document has no <Kopf>"))?
            .child_text("Zeitstempel")?
            .to_string();
        let published_at = NaiveDateTime::parse_from_str(&timestamp, "%d.%m.%Y, %H:%M").ok();

        let off_days = match root.child("FreieTage") {
            Some(days) => days
                .children
                .iter()
                .map(|d| {
                    NaiveDate::parse_from_str(&d.text, "%y%m%d")
                        .map_err(|e| AppError::parse(format!("invalid off day {:?}: {}", d.text, e)))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let infos = root
            .child("ZusatzInfo")
            .map(|info| info.children.iter().map(|line| line.text.clone()).collect())
            .unwrap_or_default();

        Ok(Self {
            timestamp,
            published_at,
            off_days,
            infos,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodTime {
    pub id: u32,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PeriodTime {
    pub fn from_element(element: &Element) -> Result<Self> {
        Ok(Self {
            id: parse_number(&element.text, "period id")?,
            start: parse_clock(element.required_attribute("ZeitVon")?)?,
            end: parse_clock(element.required_attribute("ZeitBis")?)?,
        })
    }
}

/// Teacher and subject attribution, optionally narrowed to a course.
///
/// Equality only looks at teacher and subject; course and id are ignored.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectRecord {
    pub teacher: Option<String>,
    pub subject: Option<String>,
    pub course: Option<String>,
    /// Catalog id, negative when the record was synthesized from a lesson.
    pub id: i64,
}

impl SubjectRecord {
    pub const SYNTHESIZED_ID: i64 = -1;

    pub fn from_catalog(element: &Element) -> Result<Self> {
        Ok(Self {
            teacher: element.attribute("UeLe").map(str::to_owned),
            subject: element.attribute("UeFa").map(str::to_owned),
            course: element.attribute("UeGr").map(str::to_owned),
            id: parse_number(&element.text, "subject id")?,
        })
    }

    pub fn synthesized(teacher: Option<String>, subject: Option<String>, course: Option<String>) -> Self {
        Self {
            teacher,
            subject,
            course,
            id: Self::SYNTHESIZED_ID,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.id < 0
    }
}

impl PartialEq for SubjectRecord {
    fn eq(&self, other: &Self) -> bool {
        self.teacher == other.teacher && self.subject == other.subject
    }
}

impl Eq for SubjectRecord {}

/// What upstream marked as changed on a lesson.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChangeKind(u8);

impl ChangeKind {
    pub const NONE: Self = Self(0);
    pub const TEACHER: Self = Self(1 << 0);
    pub const SUBJECT: Self = Self(1 << 1);
    pub const ROOM: Self = Self(1 << 2);
    pub const CANCELLED: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ChangeKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Identifies a lesson slot inside its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LessonKey {
    pub period: u32,
    pub subject_id: Option<i64>,
}

impl LessonKey {
    pub fn from_element(element: &Element) -> Result<Self> {
        let period = parse_number(element.child_text("St")?, "lesson period")?;
        let subject_id = element
            .child("Nr")
            .map(|nr| parse_number(&nr.text, "lesson subject id"))
            .transpose()?;
        Ok(Self { period, subject_id })
    }
}

#[derive(Debug, Clone)]
pub struct Lesson {
    pub class_name: String,
    pub key: LessonKey,
    /// Period slot, when the class period table knows the period.
    pub period: Option<PeriodTime>,
    /// Attribution in effect, substitutions included.
    pub subject: SubjectRecord,
    /// Attribution from the class catalog, if the lesson references one.
    pub default_subject: Option<SubjectRecord>,
    pub room: Option<String>,
    pub info: Option<String>,
    pub changes: ChangeKind,
    pub hash: ContentHash,
}

impl Lesson {
    pub fn from_element(
        element: &Element,
        class_name: &str,
        periods: &[PeriodTime],
        subjects: &BTreeMap<i64, SubjectRecord>,
        hash: ContentHash,
    ) -> Result<Self> {
        let key = LessonKey::from_element(element)?;
        let period = periods.iter().find(|p| p.id == key.period).copied();
        let default_subject = key.subject_id.and_then(|id| subjects.get(&id)).cloned();

        let subject_el = element.child("Fa");
        let teacher_el = element.child("Le");
        let room_el = element.child("Ra");

        let teacher = teacher_el.map(|e| e.text.clone());
        let subject = match element.child("Ku2") {
            Some(course) => SubjectRecord::synthesized(
                teacher,
                default_subject.as_ref().and_then(|d| d.subject.clone()),
                Some(course.text.clone()),
            ),
            None => SubjectRecord::synthesized(teacher, subject_el.map(|e| e.text.clone()), None),
        };
        let room = room_el.map(|e| e.text.clone());
        let info = element
            .child("If")
            .map(|e| e.text.clone())
            .filter(|text| !text.trim().is_empty());

        let mut changes = ChangeKind::NONE;
        if subject_el.is_some_and(|e| e.has_attribute("FaAe")) {
            changes.insert(ChangeKind::SUBJECT);
        }
        if teacher_el.is_some_and(|e| e.has_attribute("LeAe")) {
            changes.insert(ChangeKind::TEACHER);
        }
        if room_el.is_some_and(|e| e.has_attribute("RaAe")) {
            changes.insert(ChangeKind::ROOM);
        }
        if changes.contains(ChangeKind::SUBJECT | ChangeKind::TEACHER | ChangeKind::ROOM)
            && subject_el.is_some_and(|e| e.text == CANCELLED_SUBJECT)
            && teacher_el.is_some_and(|e| e.text.is_empty())
            && room_el.is_some_and(|e| e.text.is_empty())
        {
            changes.insert(ChangeKind::CANCELLED);
        }

        Ok(Self {
            class_name: class_name.to_string(),
            key,
            period,
            subject,
            default_subject,
            room,
            info,
            changes,
            hash,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.changes.contains(ChangeKind::CANCELLED)
    }

    /// Whether the attribution in effect differs from the catalog one.
    pub fn is_substituted(&self) -> bool {
        self.default_subject.as_ref() != Some(&self.subject)
    }

    pub fn teacher(&self) -> Option<&str> {
        self.subject.teacher.as_deref()
    }

    pub fn default_teacher(&self) -> Option<&str> {
        self.default_subject.as_ref().and_then(|s| s.teacher.as_deref())
    }

    /// Period id used for ordering; unresolved periods sort last.
    pub fn sort_period(&self) -> Option<u32> {
        self.period.map(|p| p.id)
    }

    pub fn is_same_slot(&self, other: &Lesson) -> bool {
        self.key == other.key && self.class_name == other.class_name
    }
}

#[derive(Debug, Clone)]
pub struct SchoolClass {
    pub name: String,
    pub periods: Vec<PeriodTime>,
    pub subjects: BTreeMap<i64, SubjectRecord>,
    pub lessons: Vec<Arc<Lesson>>,
    pub hash: ContentHash,
}

impl SchoolClass {
    pub fn name_of(element: &Element) -> Result<&str> {
        element.child_text("Kurz")
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let name = Self::name_of(element)?.to_string();

        let periods = match element.child("KlStunden") {
            Some(table) => table
                .children
                .iter()
                .map(PeriodTime::from_element)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let mut subjects = BTreeMap::new();
        if let Some(catalog) = element.child("Unterricht") {
            for entry in &catalog.children {
                let record_el = entry
                    .child("UeNr")
                    .ok_or_else(|| AppError::parse(format!("catalog entry of {} has no <UeNr>", name)))?;
                let record = SubjectRecord::from_catalog(record_el)?;
                subjects.insert(record.id, record);
            }
        }

        let mut lessons = Vec::new();
        if let Some(plan) = element.child("Pl") {
            let mut seen = HashSet::new();
            for lesson_el in &plan.children {
                let lesson = Lesson::from_element(lesson_el, &name, &periods, &subjects, ContentHash::of(lesson_el))?;
                claim_slot(&mut seen, lesson.key, &name)?;
                lessons.push(Arc::new(lesson));
            }
        }

        Ok(Self {
            name,
            periods,
            subjects,
            lessons,
            hash: ContentHash::of(element),
        })
    }

    /// Builds the next version of this class from a changed subtree.
    ///
    /// Only lessons are diffed: the period table and subject catalog stay as
    /// first parsed. Lessons whose subtree hash is unchanged keep their
    /// object; the rest are rebuilt and returned as patched. Lessons that
    /// vanished upstream are kept. Two lessons claiming the same slot make
    /// the subtree malformed.
    pub fn patched(&self, element: &Element) -> Result<(SchoolClass, Vec<Arc<Lesson>>)> {
        let mut previous: HashMap<LessonKey, &Arc<Lesson>> =
            self.lessons.iter().map(|l| (l.key, l)).collect();

        let mut lessons = Vec::with_capacity(self.lessons.len());
        let mut patched = Vec::new();

        if let Some(plan) = element.child("Pl") {
            let mut seen = HashSet::new();
            for lesson_el in &plan.children {
                let key = LessonKey::from_element(lesson_el)?;
                claim_slot(&mut seen, key, &self.name)?;
                let hash = ContentHash::of(lesson_el);
                match previous.remove(&key) {
                    Some(old) if old.hash == hash => lessons.push(Arc::clone(old)),
                    _ => {
                        let lesson = Arc::new(Lesson::from_element(
                            lesson_el,
                            &self.name,
                            &self.periods,
                            &self.subjects,
                            hash,
                        )?);
                        patched.push(Arc::clone(&lesson));
                        lessons.push(lesson);
                    }
                }
            }
        }

        lessons.extend(
            self.lessons
                .iter()
                .filter(|l| previous.contains_key(&l.key))
                .cloned(),
        );

        let class = SchoolClass {
            name: self.name.clone(),
            periods: self.periods.clone(),
            subjects: self.subjects.clone(),
            lessons,
            hash: ContentHash::of(element),
        };
        Ok((class, patched))
    }

    pub fn lesson(&self, key: LessonKey) -> Option<&Arc<Lesson>> {
        self.lessons.iter().find(|l| l.key == key)
    }
}

fn claim_slot(seen: &mut HashSet<LessonKey>, key: LessonKey, class_name: &str) -> Result<()> {
    if !seen.insert(key) {
        return Err(AppError::parse(format!(
            "class {} has more than one lesson in period {} with subject id {:?}",
            class_name, key.period, key.subject_id
        )));
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| AppError::parse(format!("invalid {}: {:?}", what, text)))
}

fn parse_clock(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|e| AppError::parse(format!("invalid clock time {:?}: {}", text, e)))
}
