mod desktop;
mod dry_run;
mod r#trait;

pub use self::r#trait::{create_notification_sink, Notification, NotificationSink};
