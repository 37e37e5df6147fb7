//! Wire frames exchanged through the BAR0 data window.
//!
//! All frames are little-endian and laid out by explicit byte offset.
//! The request header is always 16 bytes; learn, classify and
//! knowledge-base load append up to 256 one-byte vector components.
//! Total transmitted length is rounded up to the next multiple of 4
//! bytes because the card DMA unit is 32 bits wide; padding content is
//! unspecified and ignored by the card.
//!
//! Request header layout:
//!
//! ```text
//! off 0   u8   opcode
//! off 1   u8   register address        (register opcodes only)
//! off 2   u16  register value          (doubles as neuron index for neuron-read)
//! off 4   u8   config: bit0 classifier, bits1..8 reserved
//! off 5   u8   component count − 1
//! off 6   u8   requested answer count
//! off 7   u8   reserved
//! off 8   u8   reserved
//! off 9   u8   ncr: bits0..7 context, bit7 distance-eval
//! off 10  u16  category
//! off 12  u16  max influence field
//! off 14  u16  min influence field
//! ```

use std::fmt;

/// Vector component width is fixed: one byte per component.
pub const MAX_COMPONENTS: usize = 256;

/// Upper bound on classify answer records per response.
pub const MAX_RESPONSES: usize = 85;

/// Request header size in bytes.
pub const HEADER_BYTES: usize = 16;

/// Largest request frame: header plus a full component vector.
pub const FRAME_CAPACITY: usize = HEADER_BYTES + MAX_COMPONENTS;

/// Register read/write response size.
pub const REG_ECHO_BYTES: usize = 4;

/// Learn response size.
pub const LEARN_RESPONSE_BYTES: usize = 8;

/// Knowledge-base load response size.
pub const LOAD_RESPONSE_BYTES: usize = 4;

/// Largest classify response: 2-byte header + 85 six-byte records.
pub const CLASSIFY_RESPONSE_MAX_BYTES: usize = 2 + MAX_RESPONSES * CLASSIFY_RECORD_BYTES;

/// One classify answer record.
pub const CLASSIFY_RECORD_BYTES: usize = 6;

/// Neuron record size: 8-byte header + 256 components.
pub const NEURON_RECORD_BYTES: usize = 8 + MAX_COMPONENTS;

/// Committed/restored count meaning "all capacity committed".
pub const COUNT_ALL_CAPACITY: u16 = 0xFFFF;

/// A record distance of this value terminates a classify answer list
/// early, regardless of the advertised record count.
pub const DISTANCE_LIST_END: u16 = 0xFFFF;

/// Hardware default maximum influence field.
pub const DEFAULT_MAXIF: u16 = 0x4000;

/// Hardware default minimum influence field.
pub const DEFAULT_MINIF: u16 = 0x0002;

/// Largest category value the network accepts.
pub const MAX_CATEGORY: u16 = 32_766;

/// Largest context value (7-bit field, zero reserved).
pub const MAX_CONTEXT: u16 = 127;

/// Round a frame length up to the next multiple of 4 bytes.
#[must_use]
pub const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

// ── Opcodes ──────────────────────────────────────────────────────────────────

/// Exchange-window operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Write a 16-bit value to an internal neuron register.
    RegWrite = 0x11,
    /// Read the current value of an internal neuron register.
    RegRead = 0x12,
    /// Learn one component vector.
    VectorLearn = 0x13,
    /// Classify one component vector.
    VectorClassify = 0x14,
    /// Transfer one committed neuron from the card to the host.
    KbStore = 0x16,
    /// Transfer one neuron record from the host to the card.
    KbLoad = 0x17,
    /// Soft network reset. Defined by the card but unused by the engine:
    /// the forget operation goes through the FORGET register instead.
    NetReset = 0x1A,
    /// Read the internal state of one neuron by index.
    NeuronRead = 0x1B,
    /// Card/network fault marker in a response body.
    Fault = 0xFE,
}

impl Opcode {
    /// Decode a raw opcode byte.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x11 => Some(Self::RegWrite),
            0x12 => Some(Self::RegRead),
            0x13 => Some(Self::VectorLearn),
            0x14 => Some(Self::VectorClassify),
            0x16 => Some(Self::KbStore),
            0x17 => Some(Self::KbLoad),
            0x1A => Some(Self::NetReset),
            0x1B => Some(Self::NeuronRead),
            0xFE => Some(Self::Fault),
            _ => None,
        }
    }
}

/// Distance metric the network applies when scoring vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DistEval {
    /// Manhattan distance (sum of component differences).
    #[default]
    L1 = 0,
    /// Chebyshev distance (largest component difference).
    Lsup = 1,
}

impl DistEval {
    /// Decode from the ncr bit.
    #[must_use]
    pub const fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Self::L1
        } else {
            Self::Lsup
        }
    }
}

/// Classifier the network applies during recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Classifier {
    /// Radial basis function — only neurons whose influence field covers
    /// the input fire. Learning always runs in this mode.
    #[default]
    Rbf = 0,
    /// K nearest neighbours — all neurons in context report a distance.
    Knn = 1,
}

impl Classifier {
    /// Decode from the config bit.
    #[must_use]
    pub const fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Self::Rbf
        } else {
            Self::Knn
        }
    }
}

// ── Codec errors ─────────────────────────────────────────────────────────────

/// Decode failure at the wire level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The buffer is shorter than the frame demands.
    Truncated {
        /// Bytes the frame layout requires.
        needed: usize,
        /// Bytes actually present.
        got: usize,
    },
    /// The opcode byte is not a known operation.
    BadOpcode(u8),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, got } => {
                write!(f, "frame truncated: need {needed} bytes, got {got}")
            }
            Self::BadOpcode(raw) => write!(f, "unknown opcode {raw:#04x}"),
        }
    }
}

impl std::error::Error for WireError {}

fn u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

// ── Request frames ───────────────────────────────────────────────────────────

/// The fixed 16-byte request header.
///
/// Built through the per-opcode constructors; `encode`/`decode` are exact
/// inverses over the 16 header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestHeader {
    /// Operation code.
    pub opcode: u8,
    /// Register address (register opcodes only).
    pub reg_address: u8,
    /// Register value; carries the neuron index for neuron-read.
    pub reg_value: u16,
    /// Config byte: bit0 selects the classifier.
    pub config: u8,
    /// Component count minus one.
    pub length: u8,
    /// Requested answer count (classify only).
    pub answers: u8,
    /// Context (bits 0..7) packed with the distance-eval selector (bit 7).
    pub ncr: u8,
    /// Category value.
    pub category: u16,
    /// Maximum influence field.
    pub maxif: u16,
    /// Minimum influence field.
    pub minif: u16,
}

/// Pack context and distance metric into the ncr byte.
#[must_use]
pub const fn pack_ncr(context: u16, dist_eval: DistEval) -> u8 {
    ((context as u8) & 0x7F) | ((dist_eval as u8) << 7)
}

impl RequestHeader {
    /// Register read request.
    #[must_use]
    pub fn register_read(reg_address: u8) -> Self {
        Self {
            opcode: Opcode::RegRead as u8,
            reg_address,
            ..Self::default()
        }
    }

    /// Register write request.
    #[must_use]
    pub fn register_write(reg_address: u8, value: u16) -> Self {
        Self {
            opcode: Opcode::RegWrite as u8,
            reg_address,
            reg_value: value,
            ..Self::default()
        }
    }

    /// Learn request header. Learning always runs the RBF classifier;
    /// `comps_count` must already be validated to 1..=256.
    #[must_use]
    pub fn learn(
        dist_eval: DistEval,
        context: u16,
        category: u16,
        maxif: u16,
        minif: u16,
        comps_count: usize,
    ) -> Self {
        Self {
            opcode: Opcode::VectorLearn as u8,
            config: Classifier::Rbf as u8,
            length: (comps_count - 1) as u8,
            ncr: pack_ncr(context, dist_eval),
            category,
            maxif,
            minif,
            ..Self::default()
        }
    }

    /// Classify request header. Category and influence fields are unused
    /// in this mode and stay zero.
    #[must_use]
    pub fn classify(
        dist_eval: DistEval,
        context: u16,
        classifier: Classifier,
        answers: usize,
        comps_count: usize,
    ) -> Self {
        Self {
            opcode: Opcode::VectorClassify as u8,
            config: classifier as u8,
            length: (comps_count - 1) as u8,
            answers: answers as u8,
            ncr: pack_ncr(context, dist_eval),
            ..Self::default()
        }
    }

    /// Neuron read request; the register-value field carries the index.
    #[must_use]
    pub fn neuron_read(index: u16) -> Self {
        Self {
            opcode: Opcode::NeuronRead as u8,
            reg_value: index,
            ..Self::default()
        }
    }

    /// Knowledge-base store step: header only, no payload.
    #[must_use]
    pub fn kb_store() -> Self {
        Self {
            opcode: Opcode::KbStore as u8,
            ..Self::default()
        }
    }

    /// Knowledge-base load step header, filled from a neuron record.
    #[must_use]
    pub fn kb_load(record: &NeuronRecord, comps_count: usize) -> Self {
        Self {
            opcode: Opcode::KbLoad as u8,
            length: (comps_count - 1) as u8,
            ncr: record.ncr,
            category: record.category,
            maxif: record.aif,
            minif: record.minif,
            ..Self::default()
        }
    }

    /// Component count carried in the length field.
    #[must_use]
    pub const fn comps_count(&self) -> usize {
        self.length as usize + 1
    }

    /// Context portion of the ncr byte.
    #[must_use]
    pub const fn context(&self) -> u16 {
        (self.ncr & 0x7F) as u16
    }

    /// Distance metric portion of the ncr byte.
    #[must_use]
    pub const fn dist_eval(&self) -> DistEval {
        DistEval::from_bit(self.ncr >> 7)
    }

    /// Classifier selected by the config byte.
    #[must_use]
    pub const fn classifier(&self) -> Classifier {
        Classifier::from_bit(self.config)
    }

    /// Serialize the 16 header bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut b = [0u8; HEADER_BYTES];
        b[0] = self.opcode;
        b[1] = self.reg_address;
        b[2..4].copy_from_slice(&self.reg_value.to_le_bytes());
        b[4] = self.config;
        b[5] = self.length;
        b[6] = self.answers;
        // bytes 7 and 8 reserved
        b[9] = self.ncr;
        b[10..12].copy_from_slice(&self.category.to_le_bytes());
        b[12..14].copy_from_slice(&self.maxif.to_le_bytes());
        b[14..16].copy_from_slice(&self.minif.to_le_bytes());
        b
    }

    /// Deserialize a header from the front of a frame.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] when fewer than 16 bytes are present.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_BYTES {
            return Err(WireError::Truncated {
                needed: HEADER_BYTES,
                got: buf.len(),
            });
        }
        Ok(Self {
            opcode: buf[0],
            reg_address: buf[1],
            reg_value: u16_at(buf, 2),
            config: buf[4],
            length: buf[5],
            answers: buf[6],
            ncr: buf[9],
            category: u16_at(buf, 10),
            maxif: u16_at(buf, 12),
            minif: u16_at(buf, 14),
        })
    }
}

/// Serialize a complete request frame: header, components, then zero
/// padding up to the next 4-byte boundary.
///
/// The returned length is always a multiple of 4 and never exceeds
/// [`FRAME_CAPACITY`] for a validated component count. Padding bytes are
/// written as zero here; the card ignores their content.
#[must_use]
pub fn encode_frame(header: &RequestHeader, comps: &[u8]) -> Vec<u8> {
    let raw_len = HEADER_BYTES + comps.len();
    let mut frame = Vec::with_capacity(padded_len(raw_len));
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(comps);
    frame.resize(padded_len(raw_len), 0);
    frame
}

// ── Response frames ──────────────────────────────────────────────────────────

/// Register read/write response: one 32-bit echo word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegEcho {
    /// Echoed opcode.
    pub opcode: u8,
    /// Echoed register address.
    pub address: u8,
    /// Register value read or written.
    pub value: u16,
}

impl RegEcho {
    /// Decode from the raw 32-bit data word.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self {
            opcode: (word & 0xFF) as u8,
            address: ((word >> 8) & 0xFF) as u8,
            value: (word >> 16) as u16,
        }
    }

    /// Encode into a raw 32-bit data word.
    #[must_use]
    pub const fn to_word(self) -> u32 {
        (self.opcode as u32) | ((self.address as u32) << 8) | ((self.value as u32) << 16)
    }

    /// True when opcode and address match the request that was sent.
    #[must_use]
    pub fn echoes(&self, sent: &RequestHeader) -> bool {
        self.opcode == sent.opcode && self.address == sent.reg_address
    }
}

/// Learn response frame (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnResponse {
    /// Echoed opcode.
    pub opcode: u8,
    /// Echoed category of the learned vector.
    pub category: u16,
    /// Committed-neuron count, or [`COUNT_ALL_CAPACITY`].
    pub ncount: u16,
}

impl LearnResponse {
    /// Decode from the response bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] when fewer than 8 bytes are present.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < LEARN_RESPONSE_BYTES {
            return Err(WireError::Truncated {
                needed: LEARN_RESPONSE_BYTES,
                got: buf.len(),
            });
        }
        Ok(Self {
            opcode: buf[0],
            category: u16_at(buf, 2),
            ncount: u16_at(buf, 4),
        })
    }

    /// Serialize — used by the card simulator.
    #[must_use]
    pub fn encode(&self) -> [u8; LEARN_RESPONSE_BYTES] {
        let mut b = [0u8; LEARN_RESPONSE_BYTES];
        b[0] = self.opcode;
        b[2..4].copy_from_slice(&self.category.to_le_bytes());
        b[4..6].copy_from_slice(&self.ncount.to_le_bytes());
        b
    }
}

/// Knowledge-base load response frame (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadResponse {
    /// Echoed opcode.
    pub opcode: u8,
    /// Restored-neuron count, or [`COUNT_ALL_CAPACITY`].
    pub restored: u16,
}

impl LoadResponse {
    /// Decode from the response bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] when fewer than 4 bytes are present.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < LOAD_RESPONSE_BYTES {
            return Err(WireError::Truncated {
                needed: LOAD_RESPONSE_BYTES,
                got: buf.len(),
            });
        }
        Ok(Self {
            opcode: buf[0],
            restored: u16_at(buf, 2),
        })
    }

    /// Serialize — used by the card simulator.
    #[must_use]
    pub fn encode(&self) -> [u8; LOAD_RESPONSE_BYTES] {
        let mut b = [0u8; LOAD_RESPONSE_BYTES];
        b[0] = self.opcode;
        b[2..4].copy_from_slice(&self.restored.to_le_bytes());
        b
    }
}

/// One neuron-match record inside a classify response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyMatch {
    /// Distance between the input and the neuron's stored pattern.
    pub distance: u16,
    /// Category of the matching neuron (15 bits).
    pub category: u16,
    /// The neuron's influence field has shrunk to its minimum.
    pub degenerated: bool,
    /// Hardware neuron identifier.
    pub id: u16,
}

impl ClassifyMatch {
    fn decode(buf: &[u8]) -> Self {
        let word1 = u16_at(buf, 2);
        Self {
            distance: u16_at(buf, 0),
            category: word1 & 0x7FFF,
            degenerated: word1 & 0x8000 != 0,
            id: u16_at(buf, 4),
        }
    }

    /// Serialize one record — used by the card simulator.
    #[must_use]
    pub fn encode(&self) -> [u8; CLASSIFY_RECORD_BYTES] {
        let mut b = [0u8; CLASSIFY_RECORD_BYTES];
        b[0..2].copy_from_slice(&self.distance.to_le_bytes());
        let word1 = (self.category & 0x7FFF) | (u16::from(self.degenerated) << 15);
        b[2..4].copy_from_slice(&word1.to_le_bytes());
        b[4..6].copy_from_slice(&self.id.to_le_bytes());
        b
    }
}

/// Classify response: 2-byte header plus match records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyResponse {
    /// Echoed opcode; [`Opcode::Fault`] marks a card fault.
    pub opcode: u8,
    /// Record count advertised by the card (6-bit field).
    pub reported: u8,
    /// Uncertain flag: firing neurons disagree on the category.
    pub uncertain: bool,
    /// Identified flag: exactly one category fired.
    pub identified: bool,
    /// Decoded records, bounded by the advertised count and the bytes
    /// actually present. The end-of-list sentinel is **not** applied
    /// here; see [`ClassifyResponse::effective_matches`].
    pub records: Vec<ClassifyMatch>,
}

impl ClassifyResponse {
    /// Decode a classify response from the bytes advertised by the
    /// status word.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] when even the 2-byte header is missing.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < 2 {
            return Err(WireError::Truncated {
                needed: 2,
                got: buf.len(),
            });
        }
        let reported = buf[1] & 0x3F;
        let available = (buf.len() - 2) / CLASSIFY_RECORD_BYTES;
        let count = (reported as usize).min(available).min(MAX_RESPONSES);
        let records = (0..count)
            .map(|ix| ClassifyMatch::decode(&buf[2 + ix * CLASSIFY_RECORD_BYTES..]))
            .collect();
        Ok(Self {
            opcode: buf[0],
            reported,
            uncertain: buf[1] & 0x40 != 0,
            identified: buf[1] & 0x80 != 0,
            records,
        })
    }

    /// Apply the result-list rules: cap at `requested`, and cut the list
    /// before the first record whose distance is [`DISTANCE_LIST_END`].
    #[must_use]
    pub fn effective_matches(&self, requested: usize) -> &[ClassifyMatch] {
        let capped = &self.records[..self.records.len().min(requested)];
        let end = capped
            .iter()
            .position(|m| m.distance == DISTANCE_LIST_END)
            .unwrap_or(capped.len());
        &capped[..end]
    }

    /// Serialize header and records — used by the card simulator.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(padded_len(2 + self.records.len() * CLASSIFY_RECORD_BYTES));
        buf.push(self.opcode);
        buf.push(
            (self.reported & 0x3F)
                | (u8::from(self.uncertain) << 6)
                | (u8::from(self.identified) << 7),
        );
        for record in &self.records {
            buf.extend_from_slice(&record.encode());
        }
        buf.resize(padded_len(buf.len()), 0);
        buf
    }
}

// ── Neuron record ────────────────────────────────────────────────────────────

/// The full state of one committed neuron, as moved by neuron-read and
/// the knowledge-base store/load steps. Fixed 264-byte wire size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronRecord {
    /// Opcode tag stamped by the operation that produced the record.
    pub opcode: u8,
    /// Context (bits 0..7) packed with the distance-eval selector (bit 7).
    pub ncr: u8,
    /// Category of the stored pattern.
    pub category: u16,
    /// Active influence field at store time.
    pub aif: u16,
    /// Minimum influence field.
    pub minif: u16,
    /// The stored component vector, always carried at full width.
    pub comps: [u8; MAX_COMPONENTS],
}

impl NeuronRecord {
    /// Build a record from host-side values. Unused component slots
    /// should be left zero by the caller.
    #[must_use]
    pub fn new(
        context: u16,
        dist_eval: DistEval,
        category: u16,
        aif: u16,
        minif: u16,
        comps: [u8; MAX_COMPONENTS],
    ) -> Self {
        Self {
            opcode: 0,
            ncr: pack_ncr(context, dist_eval),
            category,
            aif,
            minif,
            comps,
        }
    }

    /// Context portion of the ncr byte.
    #[must_use]
    pub const fn context(&self) -> u16 {
        (self.ncr & 0x7F) as u16
    }

    /// Distance metric portion of the ncr byte.
    #[must_use]
    pub const fn dist_eval(&self) -> DistEval {
        DistEval::from_bit(self.ncr >> 7)
    }

    /// Serialize the 264 wire bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; NEURON_RECORD_BYTES] {
        let mut b = [0u8; NEURON_RECORD_BYTES];
        b[0] = self.opcode;
        b[1] = self.ncr;
        b[2..4].copy_from_slice(&self.category.to_le_bytes());
        b[4..6].copy_from_slice(&self.aif.to_le_bytes());
        b[6..8].copy_from_slice(&self.minif.to_le_bytes());
        b[8..].copy_from_slice(&self.comps);
        b
    }

    /// Deserialize from the 264 wire bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] when fewer than 264 bytes are present.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < NEURON_RECORD_BYTES {
            return Err(WireError::Truncated {
                needed: NEURON_RECORD_BYTES,
                got: buf.len(),
            });
        }
        let mut comps = [0u8; MAX_COMPONENTS];
        comps.copy_from_slice(&buf[8..NEURON_RECORD_BYTES]);
        Ok(Self {
            opcode: buf[0],
            ncr: buf[1],
            category: u16_at(buf, 2),
            aif: u16_at(buf, 4),
            minif: u16_at(buf, 6),
            comps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_encode_decode_round_trip() {
        let header = RequestHeader::learn(DistEval::Lsup, 5, 1234, 0x4000, 2, 37);
        let decoded = RequestHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.comps_count(), 37);
        assert_eq!(decoded.context(), 5);
        assert_eq!(decoded.dist_eval(), DistEval::Lsup);
    }

    #[test]
    fn frame_round_trip_recovers_components() {
        for count in [1usize, 5, 64, 255, 256] {
            let comps: Vec<u8> = (0..count).map(|i| (i % 251) as u8).collect();
            let header = RequestHeader::classify(DistEval::L1, 3, Classifier::Knn, 4, count);
            let frame = encode_frame(&header, &comps);
            assert_eq!(frame.len() % 4, 0, "frame must pad to 4 bytes");
            assert!(frame.len() <= FRAME_CAPACITY);

            let decoded = RequestHeader::decode(&frame).unwrap();
            assert_eq!(decoded.comps_count(), count);
            assert_eq!(&frame[HEADER_BYTES..HEADER_BYTES + count], &comps[..]);
        }
    }

    #[test]
    fn five_component_frame_pads_to_24_bytes() {
        let header = RequestHeader::learn(DistEval::L1, 1, 1, DEFAULT_MAXIF, DEFAULT_MINIF, 5);
        let frame = encode_frame(&header, &[1, 2, 3, 4, 5]);
        // 16 header + 5 components = 21 logical bytes, transmitted as 24.
        assert_eq!(frame.len(), 24);
    }

    #[test]
    fn full_vector_frame_needs_no_padding() {
        let header = RequestHeader::learn(DistEval::L1, 1, 1, DEFAULT_MAXIF, DEFAULT_MINIF, 256);
        let frame = encode_frame(&header, &[0u8; 256]);
        assert_eq!(frame.len(), FRAME_CAPACITY);
    }

    #[test]
    fn ncr_packs_context_and_metric() {
        assert_eq!(pack_ncr(127, DistEval::L1), 0x7F);
        assert_eq!(pack_ncr(1, DistEval::Lsup), 0x81);
        let header = RequestHeader::decode(&RequestHeader::learn(
            DistEval::Lsup,
            127,
            0,
            1,
            1,
            1,
        )
        .encode())
        .unwrap();
        assert_eq!(header.context(), 127);
        assert_eq!(header.dist_eval(), DistEval::Lsup);
    }

    #[test]
    fn reg_echo_word_round_trip() {
        let echo = RegEcho {
            opcode: Opcode::RegRead as u8,
            address: 0x0F,
            value: 0xBEEF,
        };
        assert_eq!(RegEcho::from_word(echo.to_word()), echo);
        let sent = RequestHeader::register_read(0x0F);
        assert!(echo.echoes(&sent));
        assert!(!echo.echoes(&RequestHeader::register_read(0x04)));
    }

    #[test]
    fn learn_response_round_trip_and_sentinel() {
        let resp = LearnResponse {
            opcode: Opcode::VectorLearn as u8,
            category: 7,
            ncount: COUNT_ALL_CAPACITY,
        };
        let decoded = LearnResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(decoded.ncount, COUNT_ALL_CAPACITY);
    }

    #[test]
    fn classify_sentinel_truncates_before_third_record() {
        let mk = |distance| ClassifyMatch {
            distance,
            category: 9,
            degenerated: false,
            id: 1,
        };
        let resp = ClassifyResponse {
            opcode: Opcode::VectorClassify as u8,
            reported: 5,
            uncertain: false,
            identified: true,
            records: vec![mk(10), mk(20), mk(DISTANCE_LIST_END), mk(30), mk(40)],
        };
        let decoded = ClassifyResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded.records.len(), 5);
        // Requested more than available: the sentinel still cuts at 2.
        assert_eq!(decoded.effective_matches(85).len(), 2);
        // Requested less than the sentinel position: the cap wins.
        assert_eq!(decoded.effective_matches(1).len(), 1);
    }

    #[test]
    fn classify_decode_is_bounded_by_buffer() {
        // Advertise 10 records but carry only 2.
        let mut buf = vec![Opcode::VectorClassify as u8, 10];
        for _ in 0..2 {
            buf.extend_from_slice(
                &ClassifyMatch {
                    distance: 1,
                    category: 2,
                    degenerated: true,
                    id: 3,
                }
                .encode(),
            );
        }
        let decoded = ClassifyResponse::decode(&buf).unwrap();
        assert_eq!(decoded.reported, 10);
        assert_eq!(decoded.records.len(), 2);
        assert!(decoded.records[0].degenerated);
    }

    #[test]
    fn neuron_record_round_trip() {
        let mut comps = [0u8; MAX_COMPONENTS];
        for (i, c) in comps.iter_mut().enumerate() {
            *c = (i % 256) as u8;
        }
        let record = NeuronRecord::new(42, DistEval::Lsup, 300, 0x1234, 2, comps);
        let decoded = NeuronRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.context(), 42);
        assert_eq!(decoded.dist_eval(), DistEval::Lsup);
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        assert!(matches!(
            RequestHeader::decode(&[0u8; 15]),
            Err(WireError::Truncated { needed: 16, got: 15 })
        ));
        assert!(LearnResponse::decode(&[0u8; 7]).is_err());
        assert!(LoadResponse::decode(&[0u8; 3]).is_err());
        assert!(NeuronRecord::decode(&[0u8; 263]).is_err());
        assert!(ClassifyResponse::decode(&[0u8; 1]).is_err());
    }

    #[test]
    fn opcode_from_u8_rejects_unknown() {
        assert_eq!(Opcode::from_u8(0x13), Some(Opcode::VectorLearn));
        assert_eq!(Opcode::from_u8(0xFE), Some(Opcode::Fault));
        assert_eq!(Opcode::from_u8(0x15), None);
    }

    #[test]
    fn frame_sizes_match_hardware() {
        assert_eq!(HEADER_BYTES, 16);
        assert_eq!(FRAME_CAPACITY, 272);
        assert_eq!(NEURON_RECORD_BYTES, 264);
        assert_eq!(CLASSIFY_RESPONSE_MAX_BYTES, 512);
    }
}
