//! Session bookkeeping and handle signatures.
//!
//! Every open device carries a CRC-32 signature derived from the
//! transport identity at open time. Each public operation revalidates
//! the signature with zero hardware traffic, so a stale or explicitly
//! invalidated handle fails fast instead of touching a card that may
//! belong to someone else by now.

use neuromem_chip::wire::{DEFAULT_MAXIF, DEFAULT_MINIF};

/// Signature value of an invalidated handle. CRC-32 of a fixed 8-byte
/// input never produces it by construction of [`signature_for`].
pub const SIGNATURE_INVALID: u32 = 0xFFFF_FFFF;

/// Derive the handle signature bound to a transport identity.
#[must_use]
pub fn signature_for(identity: u64) -> u32 {
    let crc = crc32fast::hash(&identity.to_le_bytes());
    // Reserve the all-ones value for invalidated handles.
    if crc == SIGNATURE_INVALID {
        !crc
    } else {
        crc
    }
}

/// Host-side mirror of the network state plus per-session telemetry.
///
/// The committed count and knowledge-base id are authoritative on the
/// card; this mirror tracks what the engine last observed and is reset
/// by hard reset and forget.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Neuron capacity reported by the card after reset.
    pub neurons_capacity: u32,
    /// Committed-neuron count after the last learn/load/forget.
    pub neurons_committed: u32,
    /// Caller-assigned id of the loaded knowledge base. Never assigned
    /// by the engine; zeroed by hard reset and forget.
    pub kbase_id: u64,
    /// Poll cycles the last exchange consumed.
    pub last_wait_loops: usize,
    /// Wall-clock duration of the last operation, nanoseconds.
    pub last_op_nanos: u64,
    /// Cumulative learn time, nanoseconds.
    pub total_learn_nanos: u64,
    /// Cumulative classify time, nanoseconds.
    pub total_classify_nanos: u64,
    /// Vectors learned this session.
    pub vectors_learned: u64,
    /// Vectors classified this session.
    pub vectors_classified: u64,
}

impl SessionState {
    /// Clear everything except the capacity, which survives soft resets.
    pub fn reset_network(&mut self) {
        self.neurons_committed = 0;
        self.kbase_id = 0;
    }

    /// Clear the whole session, capacity included.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Network-wide learning parameters applied to subsequent learn calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfluenceFields {
    /// Largest influence field a new neuron may take.
    pub maxif: u16,
    /// Smallest influence field a shrinking neuron may reach.
    pub minif: u16,
}

impl Default for InfluenceFields {
    fn default() -> Self {
        Self {
            maxif: DEFAULT_MAXIF,
            minif: DEFAULT_MINIF,
        }
    }
}
