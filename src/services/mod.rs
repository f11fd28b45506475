pub mod notifier;
pub mod portal_service;

pub use notifier::{NoopSink, NotificationSink, WebhookNotifier};
pub use portal_service::{Endpoints, MoodlePortal, Portal};
