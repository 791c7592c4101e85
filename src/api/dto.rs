//! JSON shapes returned by the query routes.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::{ChangeKind, Lesson, PlanHeader, RoomView, SchoolClass, TeacherView};
use crate::services::CacheStats;

#[derive(Debug, Serialize)]
pub struct PeriodResponse {
    pub id: u32,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct ChangesResponse {
    pub teacher: bool,
    pub subject: bool,
    pub room: bool,
    pub cancelled: bool,
}

impl From<ChangeKind> for ChangesResponse {
    fn from(changes: ChangeKind) -> Self {
        Self {
            teacher: changes.contains(ChangeKind::TEACHER),
            subject: changes.contains(ChangeKind::SUBJECT),
            room: changes.contains(ChangeKind::ROOM),
            cancelled: changes.contains(ChangeKind::CANCELLED),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonResponse {
    pub class_name: String,
    pub period: u32,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub teacher: Option<String>,
    pub default_teacher: Option<String>,
    pub subject: Option<String>,
    pub default_subject: Option<String>,
    pub course: Option<String>,
    pub default_course: Option<String>,
    pub room: Option<String>,
    pub info: Option<String>,
    pub changes: ChangesResponse,
}

impl From<&Lesson> for LessonResponse {
    fn from(lesson: &Lesson) -> Self {
        let default = lesson.default_subject.as_ref();
        Self {
            class_name: lesson.class_name.clone(),
            period: lesson.key.period,
            start: lesson.period.map(|p| p.start),
            end: lesson.period.map(|p| p.end),
            teacher: lesson.subject.teacher.clone(),
            default_teacher: default.and_then(|d| d.teacher.clone()),
            subject: lesson.subject.subject.clone(),
            default_subject: default.and_then(|d| d.subject.clone()),
            course: lesson.subject.course.clone(),
            default_course: default.and_then(|d| d.course.clone()),
            room: lesson.room.clone(),
            info: lesson.info.clone(),
            changes: lesson.changes.into(),
        }
    }
}

fn lessons(lessons: &[Arc<Lesson>]) -> Vec<LessonResponse> {
    lessons.iter().map(|l| LessonResponse::from(l.as_ref())).collect()
}

#[derive(Debug, Serialize)]
pub struct ClassResponse {
    pub name: String,
    pub periods: Vec<PeriodResponse>,
    pub lessons: Vec<LessonResponse>,
}

impl From<&SchoolClass> for ClassResponse {
    fn from(class: &SchoolClass) -> Self {
        Self {
            name: class.name.clone(),
            periods: class
                .periods
                .iter()
                .map(|p| PeriodResponse { id: p.id, start: p.start, end: p.end })
                .collect(),
            lessons: lessons(&class.lessons),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeacherResponse {
    pub shorthand: String,
    pub lessons: Vec<LessonResponse>,
}

impl From<&TeacherView> for TeacherResponse {
    fn from(view: &TeacherView) -> Self {
        Self {
            shorthand: view.shorthand.clone(),
            lessons: lessons(&view.sorted_lessons()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub name: String,
    pub lessons: Vec<LessonResponse>,
}

impl From<&RoomView> for RoomResponse {
    fn from(view: &RoomView) -> Self {
        Self {
            name: view.name.clone(),
            lessons: lessons(&view.sorted_lessons()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanInfoResponse {
    pub timestamp: String,
    pub published_at: Option<NaiveDateTime>,
    pub off_days: Vec<NaiveDate>,
    pub infos: Vec<String>,
}

impl From<PlanHeader> for PlanInfoResponse {
    fn from(header: PlanHeader) -> Self {
        Self {
            timestamp: header.timestamp,
            published_at: header.published_at,
            off_days: header.off_days,
            infos: header.infos,
        }
    }
}

/// Cache stats wrapped for XML, one `<CacheStats>` element per date.
#[derive(Debug, Serialize)]
pub struct CacheStatsList<'a> {
    #[serde(rename = "CacheStats")]
    pub entries: &'a [CacheStats],
}
