pub mod category;
pub mod profile;
pub mod summary;
pub mod window;

pub use category::SkillCategory;
pub use profile::LearnerProfile;
pub use summary::{
    completion_percent, CategoryCount, CategoryProgress, EnrollmentRecord, Metric,
    StudentSummary, ThirtyDayStats,
};
pub use window::ThirtyDayWindow;
