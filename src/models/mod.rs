pub mod plan;
pub mod views;

pub use plan::{ChangeKind, Lesson, LessonKey, PeriodTime, PlanHeader, SchoolClass, SubjectRecord};
pub use views::{LessonSubscriber, RoomView, TeacherView};
