//! NeuroMem device handle and protocol operations.
//!
//! Every public operation follows the same five-phase exchange: validate
//! arguments host-side, wait for ready, write the request frame, wait
//! for results-ready, then read and decode the response. Argument
//! validation happens before any hardware traffic, so a bad call costs
//! zero PCIe round trips.

use std::time::Instant;

use neuromem_chip::regs::{
    ADDR_DATA, ADDR_NET_INFO, ADDR_RESET, NeuronRegister, POLL_CYCLES_EXT, POLL_CYCLES_STD,
    RESET_MAGIC,
};
use neuromem_chip::wire::{
    encode_frame, ClassifyMatch, ClassifyResponse, Classifier, DistEval, LearnResponse,
    LoadResponse, NeuronRecord, Opcode, RegEcho, RequestHeader, CLASSIFY_RESPONSE_MAX_BYTES,
    COUNT_ALL_CAPACITY, FRAME_CAPACITY, LEARN_RESPONSE_BYTES, LOAD_RESPONSE_BYTES, MAX_CATEGORY,
    MAX_COMPONENTS, MAX_CONTEXT, MAX_RESPONSES, NEURON_RECORD_BYTES, REG_ECHO_BYTES,
};

use crate::error::{NeuroMemError, Result};
use crate::poll::{wait_for, WaitCondition};
use crate::session::{signature_for, InfluenceFields, SessionState, SIGNATURE_INVALID};
use crate::transport::Transport;

/// Result of one classify call.
#[derive(Debug, Clone)]
pub struct ClassifyOutcome {
    /// Exactly one category fired.
    pub identified: bool,
    /// Firing neurons disagree on the category.
    pub uncertain: bool,
    /// Matches in ascending distance order, capped at the requested
    /// count and cut at the end-of-list sentinel.
    pub matches: Vec<ClassifyMatch>,
}

impl ClassifyOutcome {
    /// Category of the best match, if any neuron fired.
    #[must_use]
    pub fn best_category(&self) -> Option<u16> {
        self.matches.first().map(|m| m.category)
    }
}

/// How the advertised response size is checked against the frame layout.
#[derive(Debug, Clone, Copy)]
enum SizeRule {
    /// The operation has exactly one legal response size.
    Exact(usize),
    /// Variable-size response; zero is still an error at this layer.
    NonZeroAtMost(usize),
}

/// Open session with one NeuroMem card.
///
/// The handle carries a CRC-32 signature bound to the transport identity
/// at open time; every operation revalidates it without touching the
/// card. `close` invalidates the signature, after which all operations
/// fail with [`NeuroMemError::InvalidHandle`].
#[derive(Debug)]
pub struct NeuroMemDevice {
    transport: Box<dyn Transport>,
    signature: u32,
    bound_identity: u64,
    state: SessionState,
    influence: InfluenceFields,
    dist_eval: DistEval,
    /// Status word of the last results-ready poll, for fault diagnostics.
    last_status: u32,
}

impl NeuroMemDevice {
    /// Open a session over the given transport and hard-reset the card.
    ///
    /// # Errors
    ///
    /// Propagates reset or capacity-read failures; the transport is
    /// dropped in that case.
    pub fn open(transport: Box<dyn Transport>) -> Result<Self> {
        let bound_identity = transport.identity();
        let mut device = Self {
            transport,
            signature: signature_for(bound_identity),
            bound_identity,
            state: SessionState::default(),
            influence: InfluenceFields::default(),
            dist_eval: DistEval::L1,
            last_status: 0,
        };
        device.reset()?;
        tracing::info!(
            capacity = device.state.neurons_capacity,
            "opened NeuroMem session"
        );
        Ok(device)
    }

    /// True while the handle signature checks out.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.signature != SIGNATURE_INVALID && self.signature == signature_for(self.bound_identity)
    }

    fn check_handle(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(NeuroMemError::InvalidHandle)
        }
    }

    /// Neuron capacity reported by the card at the last reset.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.state.neurons_capacity
    }

    /// Committed-neuron count after the last mutating operation.
    #[must_use]
    pub const fn committed(&self) -> u32 {
        self.state.neurons_committed
    }

    /// Session bookkeeping and telemetry.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Tag the currently loaded knowledge base. The engine never assigns
    /// this id itself; it only zeroes it on hard reset and forget.
    pub fn set_kbase_id(&mut self, id: u64) {
        self.state.kbase_id = id;
    }

    /// Influence fields applied to subsequent learn calls.
    #[must_use]
    pub const fn influence_fields(&self) -> InfluenceFields {
        self.influence
    }

    /// Set the influence fields for subsequent learn calls.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::ArgsInfluenceFields`] when `maxif` is zero or
    /// smaller than `minif`.
    pub fn set_influence_fields(&mut self, fields: InfluenceFields) -> Result<()> {
        if fields.maxif == 0 || fields.minif > fields.maxif {
            return Err(NeuroMemError::ArgsInfluenceFields {
                minif: fields.minif,
                maxif: fields.maxif,
            });
        }
        self.influence = fields;
        Ok(())
    }

    /// Distance metric applied to subsequent learn and classify calls.
    pub fn set_dist_eval(&mut self, dist_eval: DistEval) {
        self.dist_eval = dist_eval;
    }

    /// Close the session and invalidate the handle.
    ///
    /// # Errors
    ///
    /// Propagates transport release failures; the handle is invalidated
    /// either way.
    pub fn close(&mut self) -> Result<()> {
        let result = self.transport.close();
        self.state.reset();
        self.signature = SIGNATURE_INVALID;
        tracing::debug!("closed NeuroMem session");
        result
    }

    // ── Core exchange ────────────────────────────────────────────────────────

    /// Run one request/response exchange against the data area.
    fn exchange(&mut self, frame: &[u8], rule: SizeRule) -> Result<Vec<u8>> {
        if frame.len() > FRAME_CAPACITY {
            return Err(NeuroMemError::DatasizeMismatch { len: frame.len() });
        }
        wait_for(self.transport.as_mut(), WaitCondition::Ready, POLL_CYCLES_STD)?;

        self.transport
            .block_write(ADDR_DATA, frame)
            .map_err(|e| match e {
                NeuroMemError::DatasizeMismatch { .. } => e,
                _ => NeuroMemError::DataWrite,
            })?;

        let outcome = wait_for(
            self.transport.as_mut(),
            WaitCondition::ResultsReady,
            POLL_CYCLES_STD,
        )?;
        self.state.last_wait_loops = outcome.cycles_used;
        self.last_status = outcome.status.bits();

        let advertised = outcome.status.result_bytes();
        match rule {
            SizeRule::Exact(expected) => {
                if advertised == 0 {
                    return Err(NeuroMemError::NoData);
                }
                if advertised != expected {
                    return Err(NeuroMemError::SizeMismatch {
                        expected,
                        got: advertised,
                    });
                }
            }
            SizeRule::NonZeroAtMost(max) => {
                if advertised == 0 {
                    return Err(NeuroMemError::NoData);
                }
                if advertised > max {
                    return Err(NeuroMemError::SizeMismatch {
                        expected: max,
                        got: advertised,
                    });
                }
            }
        }

        let mut response = vec![0u8; advertised];
        self.transport
            .block_read(ADDR_DATA, &mut response)
            .map_err(|e| match e {
                NeuroMemError::DatasizeMismatch { .. } => e,
                _ => NeuroMemError::DataRead,
            })?;
        Ok(response)
    }

    fn absorb_count(&mut self, raw: u16) -> u32 {
        let committed = if raw == COUNT_ALL_CAPACITY {
            self.state.neurons_capacity
        } else {
            u32::from(raw)
        };
        self.state.neurons_committed = committed;
        committed
    }

    // ── Register access ──────────────────────────────────────────────────────

    /// Read an internal neuron register.
    ///
    /// Reading [`NeuronRegister::NCOUNT`] also switches the card into
    /// save/restore cursor mode; the knowledge-base helpers below do
    /// this for you.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::RegRead`] when the card does not echo the
    /// request, plus the usual exchange failures.
    pub fn register_read(&mut self, register: NeuronRegister) -> Result<u16> {
        self.check_handle()?;
        let header = RequestHeader::register_read(register.addr());
        let bytes = self.exchange(&encode_frame(&header, &[]), SizeRule::Exact(REG_ECHO_BYTES))?;
        let echo = RegEcho::from_word(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        if !echo.echoes(&header) {
            return Err(NeuroMemError::RegRead);
        }
        Ok(echo.value)
    }

    /// Write an internal neuron register.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::RegWrite`] when the card does not echo the
    /// request, plus the usual exchange failures.
    pub fn register_write(&mut self, register: NeuronRegister, value: u16) -> Result<()> {
        self.check_handle()?;
        let header = RequestHeader::register_write(register.addr(), value);
        let bytes = self.exchange(&encode_frame(&header, &[]), SizeRule::Exact(REG_ECHO_BYTES))?;
        let echo = RegEcho::from_word(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        if !echo.echoes(&header) {
            return Err(NeuroMemError::RegWrite);
        }
        Ok(())
    }

    // ── Learning and recognition ─────────────────────────────────────────────

    /// Teach the network one vector under the given context and category.
    ///
    /// Returns the committed-neuron count after the call. A duplicate
    /// vector leaves the count unchanged; a full network returns the
    /// capacity.
    ///
    /// # Errors
    ///
    /// Argument validation errors before any hardware traffic, then the
    /// usual exchange failures.
    pub fn learn(&mut self, context: u16, category: u16, comps: &[u8]) -> Result<u32> {
        self.check_handle()?;
        validate_comps(comps)?;
        validate_context(context)?;
        if category > MAX_CATEGORY {
            return Err(NeuroMemError::ArgsCategory { category });
        }
        let fields = self.influence;
        if fields.maxif == 0 || fields.minif > fields.maxif {
            return Err(NeuroMemError::ArgsInfluenceFields {
                minif: fields.minif,
                maxif: fields.maxif,
            });
        }

        let started = Instant::now();
        let header = RequestHeader::learn(
            self.dist_eval,
            context,
            category,
            fields.maxif,
            fields.minif,
            comps.len(),
        );
        let bytes = self.exchange(
            &encode_frame(&header, comps),
            SizeRule::Exact(LEARN_RESPONSE_BYTES),
        )?;
        let resp = LearnResponse::decode(&bytes).map_err(|_| NeuroMemError::NoData)?;
        if resp.opcode == Opcode::Fault as u8 {
            return Err(NeuroMemError::CardFault { status: self.last_status });
        }

        let committed = self.absorb_count(resp.ncount);
        let nanos = elapsed_nanos(started);
        self.state.last_op_nanos = nanos;
        self.state.total_learn_nanos += nanos;
        self.state.vectors_learned += 1;
        tracing::debug!(context, category, committed, "learned vector");
        Ok(committed)
    }

    /// Recognize one vector, returning up to `answers` matches.
    ///
    /// # Errors
    ///
    /// Argument validation errors before any hardware traffic, then the
    /// usual exchange failures.
    pub fn classify(
        &mut self,
        context: u16,
        classifier: Classifier,
        answers: usize,
        comps: &[u8],
    ) -> Result<ClassifyOutcome> {
        self.check_handle()?;
        validate_comps(comps)?;
        validate_context(context)?;
        if answers == 0 || answers > MAX_RESPONSES {
            return Err(NeuroMemError::ArgsRespCount { count: answers });
        }

        let started = Instant::now();
        let header = RequestHeader::classify(self.dist_eval, context, classifier, answers, comps.len());
        let bytes = self.exchange(
            &encode_frame(&header, comps),
            SizeRule::NonZeroAtMost(CLASSIFY_RESPONSE_MAX_BYTES),
        )?;
        let resp = ClassifyResponse::decode(&bytes).map_err(|_| NeuroMemError::NoData)?;
        if resp.opcode == Opcode::Fault as u8 {
            return Err(NeuroMemError::CardFault { status: self.last_status });
        }

        let matches = resp.effective_matches(answers).to_vec();
        let nanos = elapsed_nanos(started);
        self.state.last_op_nanos = nanos;
        self.state.total_classify_nanos += nanos;
        self.state.vectors_classified += 1;
        tracing::debug!(
            context,
            matches = matches.len(),
            identified = resp.identified,
            "classified vector"
        );
        Ok(ClassifyOutcome {
            identified: resp.identified,
            uncertain: resp.uncertain,
            matches,
        })
    }

    /// Read the full state of one committed neuron.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::ArgsNeuronIndex`] when `index` is beyond the
    /// committed range, plus the usual exchange failures.
    pub fn neuron_read(&mut self, index: u32) -> Result<NeuronRecord> {
        self.check_handle()?;
        if index >= self.state.neurons_committed {
            return Err(NeuroMemError::ArgsNeuronIndex {
                index,
                capacity: self.state.neurons_committed,
            });
        }
        let header = RequestHeader::neuron_read(u16::try_from(index).unwrap_or(u16::MAX));
        let bytes = self.exchange(
            &encode_frame(&header, &[]),
            SizeRule::NonZeroAtMost(NEURON_RECORD_BYTES),
        )?;
        // Short records are zero-extended; the wire layout is fixed-width.
        let mut record = [0u8; NEURON_RECORD_BYTES];
        record[..bytes.len()].copy_from_slice(&bytes);
        NeuronRecord::decode(&record).map_err(|_| NeuroMemError::NoData)
    }

    // ── Knowledge-base streaming ─────────────────────────────────────────────

    /// Arm the save/restore cursor and return the committed count.
    ///
    /// Must precede a run of [`Self::kb_store_next`] or
    /// [`Self::kb_load_next`] calls; any other operation in between
    /// disarms the cursor.
    ///
    /// # Errors
    ///
    /// The usual exchange failures.
    pub fn kb_arm(&mut self) -> Result<u32> {
        let raw = self.register_read(NeuronRegister::NCOUNT)?;
        Ok(self.absorb_count(raw))
    }

    /// Transfer the next committed neuron from the card.
    ///
    /// Requires a preceding [`Self::kb_arm`] call: only an NCOUNT
    /// register read puts the card into save/restore cursor mode, and
    /// any other operation in between drops it again.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::KbaseEof`] once the walk is past the last
    /// committed neuron, plus the usual exchange failures.
    pub fn kb_store_next(&mut self) -> Result<NeuronRecord> {
        self.check_handle()?;
        let header = RequestHeader::kb_store();
        let bytes = match self.exchange(
            &encode_frame(&header, &[]),
            SizeRule::NonZeroAtMost(NEURON_RECORD_BYTES),
        ) {
            Err(NeuroMemError::NoData) => return Err(NeuroMemError::KbaseEof),
            other => other?,
        };
        // Short records are zero-extended; the wire layout is fixed-width.
        let mut record = [0u8; NEURON_RECORD_BYTES];
        record[..bytes.len()].copy_from_slice(&bytes);
        NeuronRecord::decode(&record).map_err(|_| NeuroMemError::NoData)
    }

    /// Stream the whole committed knowledge base off the card.
    ///
    /// # Errors
    ///
    /// The usual exchange failures; an empty network yields an empty vec.
    pub fn kb_store_all(&mut self) -> Result<Vec<NeuronRecord>> {
        let expected = self.kb_arm()? as usize;
        let mut records = Vec::with_capacity(expected);
        loop {
            match self.kb_store_next() {
                Ok(record) => records.push(record),
                Err(NeuroMemError::KbaseEof) => break,
                Err(e) => return Err(e),
            }
        }
        tracing::info!(neurons = records.len(), "knowledge base stored");
        Ok(records)
    }

    /// Transfer one neuron record onto the card, using the first
    /// `comps_count` components of the record.
    ///
    /// A restore sequence starts with [`Self::kb_arm`] (an NCOUNT
    /// register read), exactly like a store walk.
    ///
    /// Returns the restored-neuron count after the call.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::ArgsCompsCount`] for an invalid component count,
    /// plus the usual exchange failures.
    pub fn kb_load_next(&mut self, record: &NeuronRecord, comps_count: usize) -> Result<u32> {
        self.check_handle()?;
        if comps_count == 0 || comps_count > MAX_COMPONENTS {
            return Err(NeuroMemError::ArgsCompsCount { count: comps_count });
        }
        let header = RequestHeader::kb_load(record, comps_count);
        let bytes = self.exchange(
            &encode_frame(&header, &record.comps[..comps_count]),
            SizeRule::Exact(LOAD_RESPONSE_BYTES),
        )?;
        let resp = LoadResponse::decode(&bytes).map_err(|_| NeuroMemError::NoData)?;
        if resp.opcode == Opcode::Fault as u8 {
            return Err(NeuroMemError::CardFault { status: self.last_status });
        }
        let committed = self.absorb_count(resp.restored);
        Ok(committed)
    }

    /// Restore a previously stored knowledge base onto the card.
    ///
    /// # Errors
    ///
    /// The usual exchange failures.
    pub fn kb_load_all(&mut self, records: &[NeuronRecord]) -> Result<u32> {
        self.kb_arm()?;
        let mut committed = self.state.neurons_committed;
        for record in records {
            committed = self.kb_load_next(record, MAX_COMPONENTS)?;
        }
        tracing::info!(neurons = records.len(), committed, "knowledge base loaded");
        Ok(committed)
    }

    // ── Network lifecycle ────────────────────────────────────────────────────

    /// Empty the network without a hard reset: clears every neuron's
    /// category register. Idempotent.
    ///
    /// # Errors
    ///
    /// The usual exchange failures; local state is cleared first so the
    /// host never believes in neurons the card may have dropped.
    pub fn forget(&mut self) -> Result<()> {
        self.check_handle()?;
        self.state.reset_network();
        self.register_write(NeuronRegister::Forget, 0)?;
        tracing::debug!("network forgotten");
        Ok(())
    }

    /// Hard-reset card and network, then re-read the neuron capacity.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::CardReset`] when the reset write fails, timeout
    /// or fault errors while the card settles, [`NeuroMemError::ServRead`]
    /// when the capacity read fails.
    pub fn reset(&mut self) -> Result<()> {
        self.check_handle()?;
        self.transport
            .write32(ADDR_RESET, RESET_MAGIC)
            .map_err(|_| NeuroMemError::CardReset)?;

        // The card pulses ready twice while settling; both get the
        // extended budget.
        wait_for(self.transport.as_mut(), WaitCondition::Ready, POLL_CYCLES_EXT)?;
        wait_for(self.transport.as_mut(), WaitCondition::Ready, POLL_CYCLES_EXT)?;

        let info = self
            .transport
            .read32(ADDR_NET_INFO)
            .map_err(|_| NeuroMemError::ServRead)?;
        self.state.reset();
        self.state.neurons_capacity = info & 0xFFFF;
        tracing::debug!(capacity = self.state.neurons_capacity, "card reset complete");
        Ok(())
    }
}

fn validate_comps(comps: &[u8]) -> Result<()> {
    if comps.is_empty() || comps.len() > MAX_COMPONENTS {
        return Err(NeuroMemError::ArgsCompsCount { count: comps.len() });
    }
    Ok(())
}

fn validate_context(context: u16) -> Result<()> {
    if context == 0 || context > MAX_CONTEXT {
        return Err(NeuroMemError::ArgsContext { context });
    }
    Ok(())
}

fn elapsed_nanos(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
