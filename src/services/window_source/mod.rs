//! WindowSource service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for enumerating visible
//! windows and capturing a window's pixels into an RGB image. It MUST NOT know
//! about icon regions, color ranges, thresholds or cooldowns: all detection
//! decisions belong to MonitorWorker.

mod dry_run;
#[cfg(windows)]
mod gdi;
mod r#trait;
#[cfg(not(windows))]
mod x11;

pub use self::r#trait::{create_window_source, WindowSource};
