//! Teacher and room projections over the lessons of one snapshot.
//!
//! Views are built once by scanning every class and then kept current by
//! the snapshot, which hands each patched lesson to every registered view.
//! They never hold anything the class map does not, so dropping one only
//! costs a rescan.

use std::sync::Arc;

use super::plan::Lesson;

/// Receives lessons the snapshot has just replaced or added.
pub trait LessonSubscriber {
    /// Whether a lesson belongs in this view.
    fn matches(&self, lesson: &Lesson) -> bool;

    fn lessons_mut(&mut self) -> &mut Vec<Arc<Lesson>>;

    /// Brings membership in line with the lesson's current attribution.
    fn on_lesson_patched(&mut self, lesson: &Arc<Lesson>) {
        let qualifies = self.matches(lesson);
        let lessons = self.lessons_mut();
        let position = lessons.iter().position(|l| l.is_same_slot(lesson));
        match (position, qualifies) {
            (Some(i), true) => lessons[i] = Arc::clone(lesson),
            (Some(i), false) => {
                lessons.remove(i);
            }
            (None, true) => lessons.push(Arc::clone(lesson)),
            (None, false) => {}
        }
    }
}

/// Lessons ordered by period id; lessons without a resolved period go last.
/// The sort is stable, so ties keep their insertion order.
pub fn sorted_lessons(lessons: &[Arc<Lesson>]) -> Vec<Arc<Lesson>> {
    let mut sorted = lessons.to_vec();
    sorted.sort_by_key(|l| (l.sort_period().is_none(), l.sort_period()));
    sorted
}

/// Every lesson given or originally scheduled to be given by one teacher.
#[derive(Debug, Clone)]
pub struct TeacherView {
    pub shorthand: String,
    lessons: Vec<Arc<Lesson>>,
}

impl TeacherView {
    pub fn build<'a>(shorthand: &str, lessons: impl IntoIterator<Item = &'a Arc<Lesson>>) -> Self {
        let mut view = Self {
            shorthand: shorthand.to_string(),
            lessons: Vec::new(),
        };
        view.lessons = lessons.into_iter().filter(|l| view.matches(l)).cloned().collect();
        view
    }

    pub fn lessons(&self) -> &[Arc<Lesson>] {
        &self.lessons
    }

    pub fn sorted_lessons(&self) -> Vec<Arc<Lesson>> {
        sorted_lessons(&self.lessons)
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

impl LessonSubscriber for TeacherView {
    fn matches(&self, lesson: &Lesson) -> bool {
        let key = Some(self.shorthand.as_str());
        lesson.teacher() == key || lesson.default_teacher() == key
    }

    fn lessons_mut(&mut self) -> &mut Vec<Arc<Lesson>> {
        &mut self.lessons
    }
}

/// Every lesson currently held in one room.
#[derive(Debug, Clone)]
pub struct RoomView {
    pub name: String,
    lessons: Vec<Arc<Lesson>>,
}

impl RoomView {
    pub fn build<'a>(name: &str, lessons: impl IntoIterator<Item = &'a Arc<Lesson>>) -> Self {
        let mut view = Self {
            name: name.to_string(),
            lessons: Vec::new(),
        };
        view.lessons = lessons.into_iter().filter(|l| view.matches(l)).cloned().collect();
        view
    }

    pub fn lessons(&self) -> &[Arc<Lesson>] {
        &self.lessons
    }

    pub fn sorted_lessons(&self) -> Vec<Arc<Lesson>> {
        sorted_lessons(&self.lessons)
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

impl LessonSubscriber for RoomView {
    fn matches(&self, lesson: &Lesson) -> bool {
        lesson.room.as_deref() == Some(self.name.as_str())
    }

    fn lessons_mut(&mut self) -> &mut Vec<Arc<Lesson>> {
        &mut self.lessons
    }
}
