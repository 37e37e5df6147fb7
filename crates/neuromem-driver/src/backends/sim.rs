//! Software model of the NeuroMem card.
//!
//! Implements the full exchange-window contract in host memory: status
//! word, request dispatch, RBF/KNN pattern matching, and the committed
//! neuron array. The protocol engine runs against this backend exactly
//! as it runs against hardware, which is what makes the whole driver
//! testable without a card.
//!
//! Learning follows the RBF commit rules of the silicon:
//!
//! * a vector that fires an existing neuron of the same category at
//!   distance zero is a duplicate and commits nothing;
//! * firing neurons of a *different* category shrink their influence
//!   field to the measured distance, marked degenerated once they hit
//!   their minimum;
//! * a committed neuron takes the distance to its nearest different-
//!   category neighbour as its influence field, clamped into
//!   `[minif, maxif]`;
//! * learning category zero only corrects (shrinks) and never commits.

use crate::error::{NeuroMemError, Result};
use crate::transport::{check_block_len, Transport};
use neuromem_chip::regs::{
    ADDR_DATA, ADDR_NET_INFO, ADDR_RESET, ADDR_STATUS, NeuronRegister, RESET_MAGIC,
};
use neuromem_chip::status::StatusWord;
use neuromem_chip::wire::{
    padded_len, ClassifyMatch, ClassifyResponse, DistEval, LearnResponse, LoadResponse,
    NeuronRecord, Opcode, RegEcho, RequestHeader, COUNT_ALL_CAPACITY, DEFAULT_MAXIF,
    DEFAULT_MINIF, HEADER_BYTES, MAX_COMPONENTS,
};

/// Default neuron capacity of the simulated card, matching the smallest
/// shipping part.
pub const DEFAULT_CAPACITY: usize = 576;

/// Status reads a command stays busy for before its result appears.
/// Non-zero so the polling loop is actually exercised.
const SETTLE_READS: u32 = 3;

/// One committed neuron of the simulated network.
#[derive(Debug, Clone)]
struct SimNeuron {
    ncr: u8,
    category: u16,
    aif: u16,
    minif: u16,
    degenerated: bool,
    comps: [u8; MAX_COMPONENTS],
    comps_len: usize,
}

impl SimNeuron {
    fn context(&self) -> u8 {
        self.ncr & 0x7F
    }

    fn dist_eval(&self) -> DistEval {
        DistEval::from_bit(self.ncr >> 7)
    }

    /// Distance between the stored pattern and an input vector. Shorter
    /// vectors are zero-extended, as the silicon does.
    fn distance(&self, input: &[u8]) -> u16 {
        let span = self.comps_len.max(input.len());
        let mut l1: u32 = 0;
        let mut lsup: u16 = 0;
        for ix in 0..span {
            let a = self.comps.get(ix).copied().unwrap_or(0);
            let b = input.get(ix).copied().unwrap_or(0);
            let d = u16::from(a.abs_diff(b));
            l1 += u32::from(d);
            lsup = lsup.max(d);
        }
        match self.dist_eval() {
            DistEval::L1 => u16::try_from(l1).unwrap_or(u16::MAX),
            DistEval::Lsup => lsup,
        }
    }
}

/// In-memory card: exchange window, status machine, neuron array.
#[derive(Debug)]
pub struct SimTransport {
    capacity: usize,
    neurons: Vec<SimNeuron>,
    /// Neuron-register file, addressed 0x00..=0x0F.
    regs: [u16; 16],
    /// Save/restore cursor. Armed only by an NCOUNT register read,
    /// consumed one neuron per store step, disarmed by any other request.
    kb_cursor: Option<usize>,
    /// Pending response frame, consumed by the next data-area read.
    response: Option<Vec<u8>>,
    /// Busy reads remaining before the status word settles.
    settle: u32,
    fault: bool,
    closed: bool,
    identity: u64,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTransport {
    /// Simulated card with the default neuron capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Simulated card with an explicit neuron capacity. Tiny capacities
    /// make network-full behaviour cheap to test.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut sim = Self {
            capacity,
            neurons: Vec::new(),
            regs: [0; 16],
            kb_cursor: None,
            response: None,
            settle: 0,
            fault: false,
            closed: false,
            // Distinct per instance so handle signatures differ between cards.
            identity: 0x5153_0000_0000_0000 | capacity as u64,
        };
        sim.power_on_defaults();
        sim
    }

    /// Raise the fault flag, as a wedged card would. Cleared only by a
    /// hard reset.
    pub fn inject_fault(&mut self) {
        self.fault = true;
    }

    /// Committed-neuron count, for test assertions.
    #[must_use]
    pub fn committed(&self) -> usize {
        self.neurons.len()
    }

    fn power_on_defaults(&mut self) {
        self.regs = [0; 16];
        self.regs[NeuronRegister::MinIf.addr() as usize] = DEFAULT_MINIF;
        self.regs[NeuronRegister::MaxIf.addr() as usize] = DEFAULT_MAXIF;
    }

    fn hard_reset(&mut self) {
        self.neurons.clear();
        self.kb_cursor = None;
        self.response = None;
        self.fault = false;
        self.settle = SETTLE_READS;
        self.power_on_defaults();
        tracing::debug!(capacity = self.capacity, "simulated card reset");
    }

    fn committed_u16(&self) -> u16 {
        if self.neurons.len() >= self.capacity {
            COUNT_ALL_CAPACITY
        } else {
            u16::try_from(self.neurons.len()).unwrap_or(COUNT_ALL_CAPACITY)
        }
    }

    fn respond(&mut self, mut bytes: Vec<u8>) {
        bytes.resize(padded_len(bytes.len()), 0);
        self.response = Some(bytes);
        self.settle = SETTLE_READS;
    }

    /// Zero-length result: results-ready with a zero size field. Used to
    /// end a knowledge-base store walk.
    fn respond_empty(&mut self) {
        self.response = Some(Vec::new());
        self.settle = SETTLE_READS;
    }

    fn dispatch(&mut self, frame: &[u8]) {
        let Ok(header) = RequestHeader::decode(frame) else {
            self.fault = true;
            return;
        };
        let Some(opcode) = Opcode::from_u8(header.opcode) else {
            self.fault = true;
            return;
        };

        // Any request other than the store step leaves save/restore mode.
        if opcode != Opcode::KbStore {
            let arming_read = opcode == Opcode::RegRead
                && header.reg_address == NeuronRegister::NCOUNT.addr();
            if !arming_read {
                self.kb_cursor = None;
            }
        }

        match opcode {
            Opcode::RegWrite => self.op_reg_write(&header),
            Opcode::RegRead => self.op_reg_read(&header),
            Opcode::VectorLearn => self.op_learn(&header, &frame[HEADER_BYTES..]),
            Opcode::VectorClassify => self.op_classify(&header, &frame[HEADER_BYTES..]),
            Opcode::KbStore => self.op_kb_store(),
            Opcode::KbLoad => self.op_kb_load(&header, &frame[HEADER_BYTES..]),
            Opcode::NeuronRead => self.op_neuron_read(&header),
            Opcode::NetReset | Opcode::Fault => self.fault = true,
        }
    }

    fn op_reg_write(&mut self, header: &RequestHeader) {
        let addr = header.reg_address;
        if addr == NeuronRegister::Forget.addr() {
            // FORGET: clear every category register, emptying the network.
            self.neurons.clear();
            self.kb_cursor = None;
        } else if let Some(slot) = self.regs.get_mut(addr as usize) {
            *slot = header.reg_value;
        } else {
            self.fault = true;
            return;
        }
        let echo = RegEcho {
            opcode: header.opcode,
            address: addr,
            value: header.reg_value,
        };
        self.respond(echo.to_word().to_le_bytes().to_vec());
    }

    fn op_reg_read(&mut self, header: &RequestHeader) {
        let addr = header.reg_address;
        let value = if addr == NeuronRegister::NCOUNT.addr() {
            // Reading NCOUNT arms the save/restore cursor at position 0.
            self.kb_cursor = Some(0);
            self.committed_u16()
        } else if let Some(slot) = self.regs.get(addr as usize) {
            *slot
        } else {
            self.fault = true;
            return;
        };
        let echo = RegEcho {
            opcode: header.opcode,
            address: addr,
            value,
        };
        self.respond(echo.to_word().to_le_bytes().to_vec());
    }

    fn op_learn(&mut self, header: &RequestHeader, payload: &[u8]) {
        let count = header.comps_count();
        if payload.len() < count {
            self.fault = true;
            return;
        }
        let input = &payload[..count];
        let context = header.ncr & 0x7F;
        let category = header.category;
        let maxif = header.maxif;
        let minif = header.minif;

        let mut duplicate = false;
        let mut nearest_other: u16 = u16::MAX;
        for neuron in &mut self.neurons {
            if neuron.context() != context {
                continue;
            }
            let dist = neuron.distance(input);
            if neuron.category == category {
                if dist == 0 {
                    duplicate = true;
                }
            } else {
                nearest_other = nearest_other.min(dist);
                if dist < neuron.aif {
                    // Wrong-category neuron fired: shrink it.
                    neuron.aif = dist.max(neuron.minif);
                    if neuron.aif <= neuron.minif {
                        neuron.aif = neuron.minif;
                        neuron.degenerated = true;
                    }
                }
            }
        }

        // Category zero is correction-only; a duplicate or a full network
        // also commits nothing.
        let full = self.neurons.len() >= self.capacity;
        if category != 0 && !duplicate && !full {
            let aif = nearest_other.clamp(minif, maxif);
            let mut comps = [0u8; MAX_COMPONENTS];
            comps[..count].copy_from_slice(input);
            self.neurons.push(SimNeuron {
                ncr: header.ncr,
                category,
                aif,
                minif,
                degenerated: false,
                comps,
                comps_len: count,
            });
        }

        let ncount = if full && category != 0 && !duplicate {
            COUNT_ALL_CAPACITY
        } else {
            self.committed_u16()
        };
        let resp = LearnResponse {
            opcode: header.opcode,
            category,
            ncount,
        };
        self.respond(resp.encode().to_vec());
    }

    fn op_classify(&mut self, header: &RequestHeader, payload: &[u8]) {
        let count = header.comps_count();
        if payload.len() < count {
            self.fault = true;
            return;
        }
        let input = &payload[..count];
        let context = header.ncr & 0x7F;
        let knn = header.config & 1 != 0;

        let mut fired: Vec<ClassifyMatch> = Vec::new();
        for (ix, neuron) in self.neurons.iter().enumerate() {
            if neuron.context() != context {
                continue;
            }
            let dist = neuron.distance(input);
            if knn || dist < neuron.aif {
                fired.push(ClassifyMatch {
                    distance: dist,
                    category: neuron.category,
                    degenerated: neuron.degenerated,
                    id: u16::try_from(ix + 1).unwrap_or(u16::MAX),
                });
            }
        }
        fired.sort_by_key(|m| m.distance);

        let identified = !fired.is_empty()
            && fired.iter().all(|m| m.category == fired[0].category);
        let uncertain = fired.len() > 1 && !identified;

        // The response count field is 6 bits wide.
        fired.truncate(usize::from(header.answers).min(0x3F));
        let reported = u8::try_from(fired.len()).unwrap_or(0x3F);
        let resp = ClassifyResponse {
            opcode: header.opcode,
            reported,
            uncertain,
            identified,
            records: fired,
        };
        self.respond(resp.encode());
    }

    fn op_kb_store(&mut self) {
        let Some(cursor) = self.kb_cursor else {
            // Store without arming via NCOUNT is a protocol violation.
            self.fault = true;
            return;
        };
        match self.neurons.get(cursor) {
            Some(neuron) => {
                self.kb_cursor = Some(cursor + 1);
                let record = NeuronRecord {
                    opcode: Opcode::KbStore as u8,
                    ncr: neuron.ncr,
                    category: neuron.category,
                    aif: neuron.aif,
                    minif: neuron.minif,
                    comps: neuron.comps,
                };
                self.respond(record.encode().to_vec());
            }
            None => self.respond_empty(),
        }
    }

    fn op_kb_load(&mut self, header: &RequestHeader, payload: &[u8]) {
        let count = header.comps_count();
        if payload.len() < count {
            self.fault = true;
            return;
        }
        let restored = if self.neurons.len() >= self.capacity {
            COUNT_ALL_CAPACITY
        } else {
            let mut comps = [0u8; MAX_COMPONENTS];
            comps[..count].copy_from_slice(&payload[..count]);
            self.neurons.push(SimNeuron {
                ncr: header.ncr,
                category: header.category,
                aif: header.maxif,
                minif: header.minif,
                degenerated: false,
                comps,
                comps_len: count,
            });
            self.committed_u16()
        };
        let resp = LoadResponse {
            opcode: header.opcode,
            restored,
        };
        self.respond(resp.encode().to_vec());
    }

    fn op_neuron_read(&mut self, header: &RequestHeader) {
        let index = usize::from(header.reg_value);
        match self.neurons.get(index) {
            Some(neuron) => {
                let record = NeuronRecord {
                    opcode: Opcode::NeuronRead as u8,
                    ncr: neuron.ncr,
                    category: neuron.category,
                    aif: neuron.aif,
                    minif: neuron.minif,
                    comps: neuron.comps,
                };
                self.respond(record.encode().to_vec());
            }
            None => self.fault = true,
        }
    }

    fn status(&mut self) -> StatusWord {
        if self.settle > 0 {
            self.settle -= 1;
            return StatusWord::compose(false, self.fault, false, 0);
        }
        match &self.response {
            Some(bytes) => {
                let units = u32::try_from(bytes.len() / 4).unwrap_or(0);
                StatusWord::compose(false, self.fault, true, units)
            }
            None => StatusWord::compose(true, self.fault, false, 0),
        }
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            return Err(NeuroMemError::card_open("transport already closed".to_string()));
        }
        Ok(())
    }
}

impl Transport for SimTransport {
    fn identity(&self) -> u64 {
        self.identity
    }

    fn read32(&mut self, offset: u32) -> Result<u32> {
        self.check_closed()?;
        match offset {
            ADDR_STATUS => Ok(self.status().bits()),
            ADDR_NET_INFO => Ok(u32::try_from(self.capacity).unwrap_or(0) & 0xFFFF),
            _ => Err(NeuroMemError::ServRead),
        }
    }

    fn write32(&mut self, offset: u32, value: u32) -> Result<()> {
        self.check_closed()?;
        match offset {
            ADDR_RESET if value == RESET_MAGIC => {
                self.hard_reset();
                Ok(())
            }
            ADDR_RESET => Err(NeuroMemError::ServWrite),
            _ => Err(NeuroMemError::ServWrite),
        }
    }

    fn block_read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.check_closed()?;
        check_block_len(buf.len())?;
        if offset != ADDR_DATA {
            return Err(NeuroMemError::DataRead);
        }
        let Some(bytes) = self.response.take() else {
            return Err(NeuroMemError::DataRead);
        };
        if buf.len() > bytes.len() {
            return Err(NeuroMemError::DataRead);
        }
        buf.copy_from_slice(&bytes[..buf.len()]);
        Ok(())
    }

    fn block_write(&mut self, offset: u32, buf: &[u8]) -> Result<()> {
        self.check_closed()?;
        check_block_len(buf.len())?;
        if offset != ADDR_DATA {
            return Err(NeuroMemError::DataWrite);
        }
        // A new request supersedes any unread response.
        self.response = None;
        self.dispatch(buf);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuromem_chip::wire::{encode_frame, Classifier};

    fn drain_settle(sim: &mut SimTransport) {
        for _ in 0..=SETTLE_READS {
            let _ = sim.read32(ADDR_STATUS);
        }
    }

    fn learn(sim: &mut SimTransport, context: u16, category: u16, comps: &[u8]) -> LearnResponse {
        let header = RequestHeader::learn(
            DistEval::L1,
            context,
            category,
            DEFAULT_MAXIF,
            DEFAULT_MINIF,
            comps.len(),
        );
        sim.block_write(ADDR_DATA, &encode_frame(&header, comps)).unwrap();
        drain_settle(sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert!(status.results_ready());
        let mut buf = vec![0u8; status.result_bytes()];
        sim.block_read(ADDR_DATA, &mut buf).unwrap();
        LearnResponse::decode(&buf).unwrap()
    }

    fn classify(
        sim: &mut SimTransport,
        context: u16,
        classifier: Classifier,
        answers: usize,
        comps: &[u8],
    ) -> ClassifyResponse {
        let header = RequestHeader::classify(DistEval::L1, context, classifier, answers, comps.len());
        sim.block_write(ADDR_DATA, &encode_frame(&header, comps)).unwrap();
        drain_settle(sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert!(status.results_ready());
        let mut buf = vec![0u8; status.result_bytes()];
        sim.block_read(ADDR_DATA, &mut buf).unwrap();
        ClassifyResponse::decode(&buf).unwrap()
    }

    #[test]
    fn learn_commits_and_counts() {
        let mut sim = SimTransport::new();
        let r = learn(&mut sim, 1, 10, &[10, 20, 30]);
        assert_eq!(r.ncount, 1);
        let r = learn(&mut sim, 1, 20, &[200, 200, 200]);
        assert_eq!(r.ncount, 2);
        assert_eq!(sim.committed(), 2);
    }

    #[test]
    fn duplicate_vector_same_category_commits_nothing() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[10, 20, 30]);
        let r = learn(&mut sim, 1, 10, &[10, 20, 30]);
        assert_eq!(r.ncount, 1);
        assert_eq!(sim.committed(), 1);
    }

    #[test]
    fn wrong_category_firing_neuron_shrinks() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[100, 100, 100]);
        // Nearby vector, different category: the first neuron must shrink
        // below the distance between them (L1 distance = 6).
        learn(&mut sim, 1, 20, &[102, 102, 102]);
        let resp = classify(&mut sim, 1, Classifier::Knn, 4, &[100, 100, 100]);
        let first = resp
            .records
            .iter()
            .find(|m| m.category == 10)
            .expect("first neuron present");
        assert_eq!(first.distance, 0);
        // Exact recall still fires it under RBF (aif > 0 after shrink to minif floor).
        let rbf = classify(&mut sim, 1, Classifier::Rbf, 4, &[100, 100, 100]);
        assert!(rbf.records.iter().any(|m| m.category == 10));
    }

    #[test]
    fn full_network_reports_sentinel() {
        let mut sim = SimTransport::with_capacity(2);
        learn(&mut sim, 1, 1, &[10]);
        learn(&mut sim, 1, 2, &[200]);
        let r = learn(&mut sim, 1, 3, &[100]);
        assert_eq!(r.ncount, COUNT_ALL_CAPACITY);
        assert_eq!(sim.committed(), 2);
    }

    #[test]
    fn category_zero_corrects_without_commit() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[100, 100]);
        let r = learn(&mut sim, 1, 0, &[101, 101]);
        assert_eq!(r.ncount, 1);
        assert_eq!(sim.committed(), 1);
    }

    #[test]
    fn classify_respects_context_partition() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[50, 50]);
        learn(&mut sim, 2, 20, &[50, 50]);
        let resp = classify(&mut sim, 2, Classifier::Knn, 8, &[50, 50]);
        assert_eq!(resp.records.len(), 1);
        assert_eq!(resp.records[0].category, 20);
    }

    #[test]
    fn classify_sorts_by_distance_and_flags_identified() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[100]);
        learn(&mut sim, 1, 10, &[110]);
        let resp = classify(&mut sim, 1, Classifier::Knn, 8, &[101]);
        assert!(resp.identified);
        assert!(!resp.uncertain);
        assert_eq!(resp.records[0].distance, 1);
        assert_eq!(resp.records[1].distance, 9);
    }

    #[test]
    fn store_without_ncount_arming_faults() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[1, 2, 3]);
        let header = RequestHeader::kb_store();
        sim.block_write(ADDR_DATA, &encode_frame(&header, &[])).unwrap();
        drain_settle(&mut sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert!(status.fault());
    }

    #[test]
    fn ncount_read_arms_store_walk_to_empty_end() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[1, 2, 3]);

        // Arm via NCOUNT read.
        let header = RequestHeader::register_read(NeuronRegister::NCOUNT.addr());
        sim.block_write(ADDR_DATA, &encode_frame(&header, &[])).unwrap();
        drain_settle(&mut sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        let mut buf = vec![0u8; status.result_bytes()];
        sim.block_read(ADDR_DATA, &mut buf).unwrap();

        // First store step returns the record.
        let header = RequestHeader::kb_store();
        sim.block_write(ADDR_DATA, &encode_frame(&header, &[])).unwrap();
        drain_settle(&mut sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert_eq!(status.result_bytes(), 264);
        let mut buf = vec![0u8; 264];
        sim.block_read(ADDR_DATA, &mut buf).unwrap();
        let record = NeuronRecord::decode(&buf).unwrap();
        assert_eq!(record.category, 10);
        assert_eq!(&record.comps[..3], &[1, 2, 3]);

        // Second store step ends the walk with a zero-size result.
        sim.block_write(ADDR_DATA, &encode_frame(&RequestHeader::kb_store(), &[]))
            .unwrap();
        drain_settle(&mut sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert!(status.results_ready());
        assert_eq!(status.result_bytes(), 0);
    }

    #[test]
    fn reset_clears_fault_and_network() {
        let mut sim = SimTransport::new();
        learn(&mut sim, 1, 10, &[5]);
        sim.inject_fault();
        sim.write32(ADDR_RESET, RESET_MAGIC).unwrap();
        drain_settle(&mut sim);
        let status = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert!(status.ready());
        assert!(!status.fault());
        assert_eq!(sim.committed(), 0);
        assert_eq!(sim.read32(ADDR_NET_INFO).unwrap(), DEFAULT_CAPACITY as u32);
    }

    #[test]
    fn status_stays_busy_while_settling() {
        let mut sim = SimTransport::new();
        let header = RequestHeader::register_read(NeuronRegister::MaxIf.addr());
        sim.block_write(ADDR_DATA, &encode_frame(&header, &[])).unwrap();
        let first = StatusWord::from_bits(sim.read32(ADDR_STATUS).unwrap());
        assert!(!first.ready());
        assert!(!first.results_ready());
    }
}
