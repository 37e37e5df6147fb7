//! PCIe identifiers and host-visible sizing.
//!
//! Source: NeuroMem PCIe accelerator card, BAR0 probing plus the vendor
//! register documentation.

/// NeuroTechnologijos vendor ID (PCI-SIG assigned).
pub const NEUROTECH_VENDOR_ID: u16 = 0x1E51;

/// Device IDs for the NeuroMem accelerator family.
pub mod device_id {
    /// NeuroMem PCIe neural accelerator (`lspci: 1e51:000f`).
    pub const NM_PCIE: u16 = 0x000F;
}

/// All known NeuroMem device IDs.
pub const ALL_DEVICE_IDS: &[u16] = &[device_id::NM_PCIE];

/// Size of the BAR0 exchange window in bytes.
///
/// The card exposes one 4 KiB window: the data/exchange area at the base
/// plus a handful of service registers near the top (see [`crate::regs`]).
pub const WINDOW_BYTES: usize = 4 * 1024;

/// Upper bound on cards handled per host, matching the scan list size.
pub const MAX_CARDS: usize = 16;

/// Format a `vendor:device` string for use with `lspci -d`.
#[must_use]
pub fn lspci_filter() -> String {
    format!("{:04x}:{:04x}", NEUROTECH_VENDOR_ID, device_id::NM_PCIE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lspci_filter_matches_ids() {
        assert_eq!(lspci_filter(), "1e51:000f");
    }
}
