pub mod alert;
pub mod window;

pub use alert::AlertEvent;
pub use window::{WindowGeometry, WindowInfo};
