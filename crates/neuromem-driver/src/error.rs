//! Error types for NeuroMem driver operations

use thiserror::Error;

/// Result type alias for NeuroMem operations
pub type Result<T> = std::result::Result<T, NeuroMemError>;

/// Errors that can occur during NeuroMem operations
#[derive(Debug, Error)]
pub enum NeuroMemError {
    /// No NeuroMem cards detected on the system
    #[error("No NeuroMem cards detected")]
    NoDevicesFound,

    /// Device index out of range
    #[error("Device index {index} out of range (have {count} devices)")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of available devices
        count: usize,
    },

    /// Session handle failed its integrity check
    #[error("Invalid or closed device handle")]
    InvalidHandle,

    /// Status polling exhausted its cycle budget
    #[error("Card not ready after {cycles} poll cycles (status {status:#010x})")]
    WaitTimeout {
        /// Poll cycles consumed before giving up
        cycles: usize,
        /// Last status word observed
        status: u32,
    },

    /// Card raised its fault flag during an exchange
    #[error("Card fault (status {status:#010x})")]
    CardFault {
        /// Status word carrying the fault bit
        status: u32,
    },

    /// Opening the card failed
    #[error("Cannot open card: {reason}")]
    CardOpen {
        /// Reason for failure
        reason: String,
    },

    /// Hard reset did not complete
    #[error("Card reset failed")]
    CardReset,

    /// Service register read failed
    #[error("Service register read failed")]
    ServRead,

    /// Service register write failed
    #[error("Service register write failed")]
    ServWrite,

    /// Reading the data area failed
    #[error("Data area read failed")]
    DataRead,

    /// Writing the data area failed
    #[error("Data area write failed")]
    DataWrite,

    /// Neuron register read was not acknowledged
    #[error("Neuron register read not acknowledged")]
    RegRead,

    /// Neuron register write was not acknowledged
    #[error("Neuron register write not acknowledged")]
    RegWrite,

    /// Card advertised results-ready with a zero-length response
    #[error("Card produced no response data")]
    NoData,

    /// Response size disagrees with the operation's frame layout
    #[error("Response size mismatch: expected {expected} bytes, card advertised {got}")]
    SizeMismatch {
        /// Bytes the frame layout requires
        expected: usize,
        /// Bytes the status word advertised
        got: usize,
    },

    /// Block transfer length is not a multiple of the 4-byte DMA unit
    #[error("Transfer length {len} is not a multiple of 4 bytes")]
    DatasizeMismatch {
        /// Offending length
        len: usize,
    },

    /// Component count outside 1..=256
    #[error("Component count {count} outside 1..=256")]
    ArgsCompsCount {
        /// Rejected count
        count: usize,
    },

    /// Context outside 1..=127
    #[error("Context {context} outside 1..=127")]
    ArgsContext {
        /// Rejected context
        context: u16,
    },

    /// Category above the hardware maximum
    #[error("Category {category} above maximum 32766")]
    ArgsCategory {
        /// Rejected category
        category: u16,
    },

    /// Influence fields empty or inverted
    #[error("Influence fields invalid: minif {minif} / maxif {maxif}")]
    ArgsInfluenceFields {
        /// Minimum influence field
        minif: u16,
        /// Maximum influence field
        maxif: u16,
    },

    /// Requested answer count outside 1..=85
    #[error("Requested answer count {count} outside 1..=85")]
    ArgsRespCount {
        /// Rejected count
        count: usize,
    },

    /// Neuron index beyond the committed range
    #[error("Neuron index {index} beyond capacity {capacity}")]
    ArgsNeuronIndex {
        /// Rejected index
        index: u32,
        /// Card neuron capacity
        capacity: u32,
    },

    /// Knowledge-base store walked past the last committed neuron
    #[error("No further committed neurons to store")]
    KbaseEof,

    /// I/O error during device communication
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl NeuroMemError {
    /// Create a card-open error
    pub fn card_open(reason: impl Into<String>) -> Self {
        Self::CardOpen {
            reason: reason.into(),
        }
    }
}
