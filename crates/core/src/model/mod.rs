mod course;
mod ids;
mod progress;

pub use course::{CourseOutline, CourseRollup, DashboardSummary, Milestone, RECOMMENDATION_LIMIT};
pub use ids::{CourseId, CourseKey, IdError, ModuleId, PROJECT_SUFFIX, UserId, course_slug};
pub use progress::{CourseProgress, ProgressError, ProgressStats, ProgressStatus, ProgressTable};
