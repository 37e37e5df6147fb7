//! Runtime card discovery.
//!
//! Scans PCIe sysfs for the NeuroMem vendor/device pair. No device files
//! and no kernel module: the driver talks straight to BAR0, so discovery
//! only needs `/sys/bus/pci/devices`.

use std::path::{Path, PathBuf};

use neuromem_chip::pcie::{ALL_DEVICE_IDS, MAX_CARDS, NEUROTECH_VENDOR_ID};

use crate::backends::SysfsTransport;
use crate::device::NeuroMemDevice;
use crate::error::{NeuroMemError, Result};

/// Device manager for runtime discovery and access
#[derive(Debug)]
pub struct DeviceManager {
    devices: Vec<DeviceInfo>,
}

/// Information about a discovered card
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Card index (0, 1, 2, ...)
    pub index: usize,

    /// PCIe bus address (0000:03:00.0, etc.)
    pub pcie_address: String,

    /// sysfs device directory
    pub sysfs_path: PathBuf,
}

impl DeviceManager {
    /// Discover all NeuroMem cards on the system.
    ///
    /// # Errors
    ///
    /// Returns [`NeuroMemError::NoDevicesFound`] if no cards are detected.
    pub fn discover() -> Result<Self> {
        tracing::info!("Discovering NeuroMem cards...");

        let pci_devices_path = Path::new("/sys/bus/pci/devices");
        let entries = std::fs::read_dir(pci_devices_path).map_err(|e| {
            NeuroMemError::card_open(format!("cannot read PCIe devices: {e}"))
        })?;

        let mut addresses = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let vendor = Self::read_hex_sysfs(&path.join("vendor")).ok();
            let device = Self::read_hex_sysfs(&path.join("device")).ok();
            if let (Some(vendor), Some(device)) = (vendor, device) {
                if vendor == NEUROTECH_VENDOR_ID && ALL_DEVICE_IDS.contains(&device) {
                    addresses.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }

        // Sort for stable indexing across runs.
        addresses.sort();
        addresses.truncate(MAX_CARDS);

        let devices: Vec<DeviceInfo> = addresses
            .into_iter()
            .enumerate()
            .map(|(index, pcie_address)| {
                tracing::info!("Card {index}: {pcie_address}");
                let sysfs_path = pci_devices_path.join(&pcie_address);
                DeviceInfo {
                    index,
                    pcie_address,
                    sysfs_path,
                }
            })
            .collect();

        if devices.is_empty() {
            tracing::error!("No NeuroMem cards found");
            return Err(NeuroMemError::NoDevicesFound);
        }

        tracing::info!("Discovered {} NeuroMem card(s)", devices.len());
        Ok(Self { devices })
    }

    /// Get number of discovered cards
    #[must_use]
    pub const fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Get slice of all cards
    #[must_use]
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Get card info by index
    ///
    /// # Errors
    ///
    /// Returns [`NeuroMemError::InvalidIndex`] if the index is out of bounds.
    pub fn device(&self, index: usize) -> Result<&DeviceInfo> {
        self.devices
            .iter()
            .find(|d| d.index == index)
            .ok_or(NeuroMemError::InvalidIndex {
                index,
                count: self.devices.len(),
            })
    }

    /// Open a session on the card at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is invalid, BAR0 cannot be mapped,
    /// or the post-open hard reset fails.
    pub fn open(&self, index: usize) -> Result<NeuroMemDevice> {
        let info = self.device(index)?;
        let transport = SysfsTransport::open(&info.pcie_address)?;
        NeuroMemDevice::open(Box::new(transport))
    }

    /// Open a session on the first discovered card.
    ///
    /// # Errors
    ///
    /// Returns an error if no cards are available or the card cannot be
    /// opened.
    pub fn open_first(&self) -> Result<NeuroMemDevice> {
        let info = self.devices.first().ok_or(NeuroMemError::NoDevicesFound)?;
        let transport = SysfsTransport::open(&info.pcie_address)?;
        NeuroMemDevice::open(Box::new(transport))
    }

    /// Read a hexadecimal value from sysfs
    fn read_hex_sysfs(path: &Path) -> Result<u16> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NeuroMemError::card_open(format!("cannot read {}: {e}", path.display()))
        })?;
        let trimmed = content.trim().trim_start_matches("0x");
        u16::from_str_radix(trimmed, 16)
            .map_err(|e| NeuroMemError::card_open(format!("invalid hex value: {e}")))
    }
}

impl DeviceInfo {
    /// PCIe bus address
    #[must_use]
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }

    /// sysfs device directory
    #[must_use]
    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_without_hardware() {
        // This test requires actual hardware to find anything.
        match DeviceManager::discover() {
            Ok(manager) => {
                for device in manager.devices() {
                    println!("Card {}: {}", device.index, device.pcie_address);
                }
            }
            Err(NeuroMemError::NoDevicesFound) => {
                println!("No cards found (hardware required)");
            }
            Err(e) => {
                eprintln!("Discovery error (expected without sysfs): {e}");
            }
        }
    }
}
