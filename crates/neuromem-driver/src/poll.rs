//! Status-register polling.
//!
//! The card has no interrupt line: the host spins on the status register
//! until the condition bit appears, the fault bit appears, or the cycle
//! budget runs out. No sleeping between reads; each MMIO read already
//! takes a PCIe round trip, which paces the loop.

use crate::error::{NeuroMemError, Result};
use crate::transport::Transport;
use neuromem_chip::regs::ADDR_STATUS;
use neuromem_chip::status::StatusWord;

/// Status condition to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Card accepts a new request.
    Ready,
    /// A response frame is available.
    ResultsReady,
}

/// Successful poll outcome.
#[derive(Debug, Clone, Copy)]
pub struct WaitOutcome {
    /// Status word that satisfied the condition.
    pub status: StatusWord,
    /// Poll cycles consumed, 1-based.
    pub cycles_used: usize,
}

/// Spin on the status register until `condition` holds.
///
/// Fault wins over the condition: a status word with the fault bit set
/// aborts immediately even if the condition bit is also set.
///
/// # Errors
///
/// [`NeuroMemError::CardFault`] when the fault bit appears,
/// [`NeuroMemError::WaitTimeout`] after `max_cycles` reads, or
/// [`NeuroMemError::ServRead`] when the register read itself fails.
pub fn wait_for(
    transport: &mut dyn Transport,
    condition: WaitCondition,
    max_cycles: usize,
) -> Result<WaitOutcome> {
    let mut last = StatusWord::default();
    for cycle in 1..=max_cycles {
        let status = StatusWord::from_bits(
            transport
                .read32(ADDR_STATUS)
                .map_err(|_| NeuroMemError::ServRead)?,
        );
        last = status;

        if status.fault() {
            tracing::warn!(status = format_args!("{:#010x}", status.bits()), "card fault");
            return Err(NeuroMemError::CardFault {
                status: status.bits(),
            });
        }

        let satisfied = match condition {
            WaitCondition::Ready => status.ready(),
            WaitCondition::ResultsReady => status.results_ready(),
        };
        if satisfied {
            return Ok(WaitOutcome {
                status,
                cycles_used: cycle,
            });
        }
    }

    tracing::warn!(
        ?condition,
        max_cycles,
        status = format_args!("{:#010x}", last.bits()),
        "status poll timed out"
    );
    Err(NeuroMemError::WaitTimeout {
        cycles: max_cycles,
        status: last.bits(),
    })
}
