//! Enumerate all NeuroMem cards on the system
//!
//! This example demonstrates runtime card discovery over PCIe sysfs.

use neuromem_driver::{DeviceManager, Result};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("neuromem_driver=debug")
        .init();

    println!("🧠 NeuroMem Card Enumeration\n");

    let manager = DeviceManager::discover()?;

    println!("Found {} card(s):\n", manager.device_count());

    for device in manager.devices() {
        println!("📟 Card {}:", device.index);
        println!("   PCIe:   {}", device.pcie_address());
        println!("   sysfs:  {}", device.sysfs_path().display());
        println!();
    }

    println!("✅ Discovery complete");

    Ok(())
}
