//! Utility modules for device placement and output formatting.

mod device;
mod format;

pub use device::{device_label, get_device};
pub use format::{format_bytes, format_shape};
