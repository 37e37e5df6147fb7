//! Transport seam between the protocol engine and the card.
//!
//! Everything above this trait is pure protocol logic; everything below
//! it moves bytes. Two implementations ship: [`crate::SysfsTransport`]
//! maps BAR0 of a real card, [`crate::SimTransport`] models the card in
//! software so the whole engine runs without hardware.

use crate::error::{NeuroMemError, Result};
use neuromem_chip::status::DATA_BLOCK_SIZE;

/// Byte-mover under the protocol engine.
///
/// Offsets are relative to the BAR0 window base. Block transfers must be
/// multiples of the 4-byte DMA unit; implementations get that checked for
/// them by [`check_block_len`] and should call it first.
pub trait Transport: std::fmt::Debug + Send {
    /// Stable identity of the underlying channel, used to derive the
    /// session-handle signature. Must not change while the transport
    /// is open.
    fn identity(&self) -> u64;

    /// Read one 32-bit word.
    ///
    /// # Errors
    ///
    /// Transport-specific failure reading the window.
    fn read32(&mut self, offset: u32) -> Result<u32>;

    /// Write one 32-bit word.
    ///
    /// # Errors
    ///
    /// Transport-specific failure writing the window.
    fn write32(&mut self, offset: u32, value: u32) -> Result<()>;

    /// Read `buf.len()` bytes from the data area.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::DatasizeMismatch`] for lengths that are not a
    /// multiple of 4, or a transport-specific read failure.
    fn block_read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `buf.len()` bytes to the data area.
    ///
    /// # Errors
    ///
    /// [`NeuroMemError::DatasizeMismatch`] for lengths that are not a
    /// multiple of 4, or a transport-specific write failure.
    fn block_write(&mut self, offset: u32, buf: &[u8]) -> Result<()>;

    /// Release the channel. Called once by the owning device on close.
    ///
    /// # Errors
    ///
    /// Transport-specific failure releasing resources.
    fn close(&mut self) -> Result<()>;
}

/// Reject block-transfer lengths the 32-bit DMA unit cannot move.
///
/// # Errors
///
/// [`NeuroMemError::DatasizeMismatch`] unless `len` is a non-zero
/// multiple of 4.
pub fn check_block_len(len: usize) -> Result<()> {
    if len == 0 || len % DATA_BLOCK_SIZE != 0 {
        return Err(NeuroMemError::DatasizeMismatch { len });
    }
    Ok(())
}
