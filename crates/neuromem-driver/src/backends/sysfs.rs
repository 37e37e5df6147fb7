//! BAR0 transport over PCIe sysfs.
//!
//! Maps `/sys/bus/pci/devices/<addr>/resource0` and performs volatile
//! 32-bit accesses. No kernel module and no DMA setup required; the
//! card's whole exchange window fits in one 4 KiB BAR.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cast_possible_truncation)]

use crate::error::{NeuroMemError, Result};
use crate::transport::{check_block_len, Transport};
use neuromem_chip::pcie::WINDOW_BYTES;
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};

/// Memory-mapped BAR0 window of one card.
pub struct SysfsTransport {
    /// Memory-mapped pointer; null after close.
    base: *mut u8,
    /// Size of the mapping; zero after close.
    len: usize,
    /// sysfs resource path, kept for diagnostics.
    resource: PathBuf,
}

impl std::fmt::Debug for SysfsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysfsTransport")
            .field("base", &format_args!("{:p}", self.base))
            .field("len", &self.len)
            .field("resource", &self.resource)
            .finish()
    }
}

// SAFETY: Send - the mapping is owned exclusively and mmap'd memory is
// process-wide, so moving the owner between threads is sound.
unsafe impl Send for SysfsTransport {}

impl SysfsTransport {
    /// Map BAR0 of the card at the given PCIe address
    /// (e.g. `0000:03:00.0`).
    ///
    /// # Errors
    ///
    /// Returns [`NeuroMemError::CardOpen`] when the resource file cannot
    /// be opened or mapped.
    pub fn open(pcie_address: &str) -> Result<Self> {
        let resource = Path::new("/sys/bus/pci/devices")
            .join(pcie_address)
            .join("resource0");

        // O_SYNC keeps the window uncached so every access hits the card.
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(&resource)
            .map_err(|e| {
                NeuroMemError::card_open(format!("cannot open {}: {e}", resource.display()))
            })?;

        // SAFETY: mmap necessary for MMIO - maps BAR0 into the process.
        // Invariants: (1) file open read/write on resource0; (2) length is
        // the fixed window size; (3) ptr valid for WINDOW_BYTES or Err.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                WINDOW_BYTES,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
            .map_err(|e| {
                NeuroMemError::card_open(format!("cannot mmap {}: {e}", resource.display()))
            })?
        };

        tracing::info!(
            resource = %resource.display(),
            base = ?ptr,
            len = WINDOW_BYTES,
            "mapped BAR0 window"
        );

        Ok(Self {
            base: ptr.cast(),
            len: WINDOW_BYTES,
            resource,
        })
    }

    fn check_open(&self, offset: u32, bytes: usize) -> Result<()> {
        if self.len == 0 || offset as usize + bytes > self.len {
            return Err(NeuroMemError::card_open(format!(
                "access at {offset:#06x}+{bytes} outside mapped window"
            )));
        }
        Ok(())
    }

    fn unmap(&mut self) {
        if self.len != 0 {
            // SAFETY: base/len come from the mmap in open() and are unmapped
            // at most once; len is zeroed below.
            unsafe {
                let _ = munmap(self.base.cast(), self.len);
            }
            tracing::debug!(resource = %self.resource.display(), "unmapped BAR0 window");
            self.base = std::ptr::null_mut();
            self.len = 0;
        }
    }
}

impl Transport for SysfsTransport {
    fn identity(&self) -> u64 {
        self.base as u64
    }

    fn read32(&mut self, offset: u32) -> Result<u32> {
        self.check_open(offset, 4)?;
        // SAFETY: read_volatile necessary for MMIO - the card updates the
        // word behind the host's back. Bounds checked above; offsets are
        // 4-aligned window constants.
        let raw = unsafe { std::ptr::read_volatile(self.base.add(offset as usize).cast::<u32>()) };
        Ok(u32::from_le(raw))
    }

    fn write32(&mut self, offset: u32, value: u32) -> Result<()> {
        self.check_open(offset, 4)?;
        // SAFETY: write_volatile necessary for MMIO - the write triggers
        // card-side effects. Bounds checked above.
        unsafe {
            std::ptr::write_volatile(self.base.add(offset as usize).cast::<u32>(), value.to_le());
        }
        Ok(())
    }

    fn block_read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        check_block_len(buf.len())?;
        self.check_open(offset, buf.len())?;
        for (ix, chunk) in buf.chunks_exact_mut(4).enumerate() {
            let word_offset = offset as usize + ix * 4;
            // SAFETY: bounds checked for the whole span above; the window
            // is read in 4-byte units as the DMA engine produces them.
            let raw = unsafe { std::ptr::read_volatile(self.base.add(word_offset).cast::<u32>()) };
            chunk.copy_from_slice(&u32::from_le(raw).to_le_bytes());
        }
        Ok(())
    }

    fn block_write(&mut self, offset: u32, buf: &[u8]) -> Result<()> {
        check_block_len(buf.len())?;
        self.check_open(offset, buf.len())?;
        for (ix, chunk) in buf.chunks_exact(4).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let word_offset = offset as usize + ix * 4;
            // SAFETY: bounds checked for the whole span above.
            unsafe {
                std::ptr::write_volatile(self.base.add(word_offset).cast::<u32>(), word.to_le());
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.unmap();
        Ok(())
    }
}

impl Drop for SysfsTransport {
    fn drop(&mut self) {
        self.unmap();
    }
}
