//! Host-side protocol engine for NeuroMem PCIe pattern-matching cards.
//!
//! The card is a hardware RBF/KNN classifier: the host teaches it byte
//! vectors under a context and category, then asks it to recognize new
//! vectors. All traffic goes through one 4 KiB BAR0 window — a request
//! frame is written to the data area, the status register is polled, and
//! the response frame is read back from the same address.
//!
//! # Backends
//!
//! ```text
//! Hardware:
//!   SysfsTransport — BAR0 mmap via /sys/bus/pci/.../resource0
//!
//! Development / tests:
//!   SimTransport   — software model of the card, no hardware needed
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use neuromem_driver::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let mgr = DeviceManager::discover()?;
//! let mut dev = mgr.open_first()?;
//!
//! dev.learn(1, 10, &[12, 34, 56])?;
//! dev.learn(1, 20, &[200, 180, 160])?;
//!
//! let outcome = dev.classify(1, Classifier::Rbf, 4, &[13, 35, 57])?;
//! println!("category: {:?}", outcome.best_category());
//!
//! dev.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod device;
mod discovery;
mod error;
mod poll;
mod session;
mod transport;

/// Hardware identification and wire-level constants (re-exported from
/// neuromem-chip).
pub mod chip {
    pub use neuromem_chip::pcie::{lspci_filter, ALL_DEVICE_IDS, NEUROTECH_VENDOR_ID};
    pub use neuromem_chip::pcie::device_id;
    pub use neuromem_chip::regs::{NeuronRegister, ADDR_STATUS};
    pub use neuromem_chip::status::StatusWord;
    pub use neuromem_chip::wire::{
        Classifier, ClassifyMatch, DistEval, NeuronRecord, MAX_COMPONENTS, MAX_RESPONSES,
    };
}

pub use backends::{SimTransport, SysfsTransport};
pub use device::{ClassifyOutcome, NeuroMemDevice};
pub use discovery::{DeviceInfo, DeviceManager};
pub use error::{NeuroMemError, Result};
pub use poll::{wait_for, WaitCondition, WaitOutcome};
pub use session::{InfluenceFields, SessionState};
pub use transport::Transport;

/// Commonly used types.
pub mod prelude {
    pub use crate::chip::{Classifier, DistEval, NeuronRecord, NeuronRegister};
    pub use crate::{
        ClassifyOutcome, DeviceManager, InfluenceFields, NeuroMemDevice, NeuroMemError, Result,
        SimTransport, Transport,
    };
}
