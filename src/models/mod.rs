mod license;
mod scan_event;

pub use license::*;
pub use scan_event::*;
