//! Transport backends.
//!
//! ```text
//! Hardware:
//!   SysfsTransport — BAR0 mmap via /sys/bus/pci/.../resource0
//!
//! Development / tests:
//!   SimTransport   — software model of the card, no hardware needed
//! ```

pub mod sim;
pub mod sysfs;

pub use sim::SimTransport;
pub use sysfs::SysfsTransport;
