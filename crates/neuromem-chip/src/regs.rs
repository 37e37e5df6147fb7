//! BAR0 exchange-window layout and neuron-register addresses.
//!
//! The card exposes one small memory window. The data/exchange area sits
//! at the base; three service registers sit above it. All transfers are
//! 32-bit: the DMA unit of the card is 4 bytes, so every block transfer
//! length must be a multiple of 4.

// ── Window addresses ─────────────────────────────────────────────────────────

/// Data/exchange area. Request frames are written here; response frames
/// are read back from the same address once the status word advertises
/// results-ready.
pub const ADDR_DATA: u32 = 0x0000;

/// Network info register (read-only). The low 16 bits hold the neuron
/// capacity of the card. Valid only after a hard reset has settled.
pub const ADDR_NET_INFO: u32 = 0x0110;

/// Status register (read-only). Refreshed by the card after each host
/// write; see [`crate::status::StatusWord`] for the bit layout.
pub const ADDR_STATUS: u32 = 0x0114;

/// Reset control register (write-only). Writing [`RESET_MAGIC`] performs
/// a hard reset of card and network.
pub const ADDR_RESET: u32 = 0x0118;

/// Magic value that triggers a hard reset when written to [`ADDR_RESET`].
pub const RESET_MAGIC: u32 = 0xDEAD_BEEF;

// ── Polling ceilings ─────────────────────────────────────────────────────────

/// Standard status-poll ceiling, in raw read cycles (no sleep between).
pub const POLL_CYCLES_STD: usize = 2_500;

/// Extended ceiling for operations that need hardware settling time,
/// e.g. the two ready pulses after a hard reset.
pub const POLL_CYCLES_EXT: usize = 5_000;

// ── Neuron-network internal registers ────────────────────────────────────────

/// Internal registers of the neuron network, addressed through the
/// register read/write opcodes (8-bit address, 16-bit value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NeuronRegister {
    /// Neuron context register.
    Ncr = 0x00,
    /// Component.
    Comp = 0x01,
    /// Last component.
    LastComp = 0x02,
    /// Component index; reads back the distance in recognition mode.
    IndexComp = 0x03,
    /// Category register.
    Cat = 0x04,
    /// Active influence field.
    Aif = 0x05,
    /// Minimum influence field.
    MinIf = 0x06,
    /// Maximum influence field.
    MaxIf = 0x07,
    /// Test component.
    TestComp = 0x08,
    /// Test category.
    TestCat = 0x09,
    /// Neuron identifier.
    Nid = 0x0A,
    /// Global control register.
    Gcr = 0x0B,
    /// Points the chain back at the first neuron.
    ResetChain = 0x0C,
    /// Network status register.
    Nsr = 0x0D,
    /// Dummy power-save register.
    PowerSave = 0x0E,
    /// Write: clear all neuron category registers (soft reset / forget).
    Forget = 0x0F,
}

impl NeuronRegister {
    /// Distance register — shares address `0x03` with [`Self::IndexComp`].
    pub const DIST: Self = Self::IndexComp;

    /// Committed-neuron count in normal mode; neuron-chain index in save/
    /// restore mode. Shares address `0x0F` with [`Self::Forget`]: reads hit
    /// NCOUNT, writes hit FORGET.
    ///
    /// Reading this register also switches the card into save/restore
    /// cursor mode — the required precondition before a knowledge-base
    /// store or load sequence.
    pub const NCOUNT: Self = Self::Forget;

    /// Raw 8-bit register address.
    #[must_use]
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_addresses_non_overlapping() {
        assert_ne!(ADDR_DATA, ADDR_NET_INFO);
        assert_ne!(ADDR_NET_INFO, ADDR_STATUS);
        assert_ne!(ADDR_STATUS, ADDR_RESET);
    }

    #[test]
    fn shared_register_addresses() {
        // The hardware multiplexes two pairs on one address each.
        assert_eq!(NeuronRegister::DIST.addr(), NeuronRegister::IndexComp.addr());
        assert_eq!(NeuronRegister::NCOUNT.addr(), 0x0F);
        assert_eq!(NeuronRegister::Forget.addr(), 0x0F);
    }
}
