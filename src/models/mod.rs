pub mod attendance;
pub mod course;
pub mod event;

pub use attendance::{AttendanceItem, FormInfo, ViewInfo};
pub use course::Course;
pub use event::{CompletionEvent, GroupMessage};
