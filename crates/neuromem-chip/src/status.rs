//! The 32-bit card status word.
//!
//! Bit layout (LSB first):
//!
//! ```text
//! bit  0      ready            card accepts a new request
//! bit  1      fault            card/network fault, sticky until reset
//! bit  2      waiting-comps    card expects more vector components
//! bit  3      results-ready    a response frame is available
//! bits 4..8   reserved
//! bits 8..15  result-size      response length in 4-byte units (7 bits)
//! bit  15     reserved
//! bits 16..23 read-count       units already read by the host (7 bits)
//! bit  23     reserved
//! bits 24..31 required-count   units the card still requires (7 bits)
//! bit  31     reserved
//! ```
//!
//! Decoded with shift-and-mask only; the raw word is kept for diagnostics.

/// Size of one transfer unit: the card moves data in 32-bit blocks.
pub const DATA_BLOCK_SIZE: usize = 4;

const READY_BIT: u32 = 1;
const FAULT_BIT: u32 = 1 << 1;
const WAITING_COMPS_BIT: u32 = 1 << 2;
const RESULTS_READY_BIT: u32 = 1 << 3;

const RESULT_SIZE_SHIFT: u32 = 8;
const READ_COUNT_SHIFT: u32 = 16;
const REQUIRED_COUNT_SHIFT: u32 = 24;
const FIELD_MASK: u32 = 0x7F;

/// One sampled value of the card status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusWord(u32);

impl StatusWord {
    /// Wrap a raw register value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw register value, for diagnostics.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Card accepts a new request.
    #[must_use]
    pub const fn ready(self) -> bool {
        self.0 & READY_BIT != 0
    }

    /// Card or network fault.
    #[must_use]
    pub const fn fault(self) -> bool {
        self.0 & FAULT_BIT != 0
    }

    /// Card expects further vector components.
    #[must_use]
    pub const fn waiting_components(self) -> bool {
        self.0 & WAITING_COMPS_BIT != 0
    }

    /// A response frame is available in the data area.
    #[must_use]
    pub const fn results_ready(self) -> bool {
        self.0 & RESULTS_READY_BIT != 0
    }

    /// Advertised response size in 4-byte units.
    #[must_use]
    pub const fn result_size_units(self) -> u32 {
        (self.0 >> RESULT_SIZE_SHIFT) & FIELD_MASK
    }

    /// Advertised response size in bytes.
    #[must_use]
    pub const fn result_bytes(self) -> usize {
        self.result_size_units() as usize * DATA_BLOCK_SIZE
    }

    /// Units already read by the host.
    #[must_use]
    pub const fn read_count(self) -> u32 {
        (self.0 >> READ_COUNT_SHIFT) & FIELD_MASK
    }

    /// Units the card still requires.
    #[must_use]
    pub const fn required_count(self) -> u32 {
        (self.0 >> REQUIRED_COUNT_SHIFT) & FIELD_MASK
    }

    /// Compose a status word — used by the card simulator and by tests.
    #[must_use]
    pub const fn compose(ready: bool, fault: bool, results_ready: bool, result_units: u32) -> Self {
        let mut bits = (result_units & FIELD_MASK) << RESULT_SIZE_SHIFT;
        if ready {
            bits |= READY_BIT;
        }
        if fault {
            bits |= FAULT_BIT;
        }
        if results_ready {
            bits |= RESULTS_READY_BIT;
        }
        Self(bits)
    }
}
