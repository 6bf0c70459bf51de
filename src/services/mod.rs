pub mod capture_settings;
pub mod cooldown;
pub mod detection;
pub mod dispatcher;
pub mod monitor_worker;
pub mod notifier;
pub mod supervisor;
pub mod window_source;

#[cfg(test)]
pub(crate) mod test_support;

pub use notifier::create_notification_sink;
pub use supervisor::MonitorSupervisor;
pub use window_source::create_window_source;
