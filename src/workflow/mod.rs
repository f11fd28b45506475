pub mod attendance_ctx;
pub mod submission_flow;

pub use attendance_ctx::AttendanceCtx;
pub use submission_flow::{FailedStage, ItemOutcome, ItemState, SubmissionFlow, Verification};
