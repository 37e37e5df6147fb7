//! Teach the network a few patterns and recognize new ones.
//!
//! Runs against the simulated card, so no hardware is required. Swap
//! `SimTransport` for `DeviceManager::discover()? .open_first()?` to run
//! on a real card.

use neuromem_driver::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("neuromem_driver=debug")
        .init();

    let mut dev = NeuroMemDevice::open(Box::new(SimTransport::new()))?;
    println!("🧠 NeuroMem session open, capacity {} neurons\n", dev.capacity());

    // Teach three gesture-like byte patterns.
    let lessons: &[(u16, &[u8])] = &[
        (1, &[10, 30, 50, 70, 90]),
        (2, &[90, 70, 50, 30, 10]),
        (3, &[50, 50, 50, 50, 50]),
    ];
    for (category, pattern) in lessons {
        let committed = dev.learn(1, *category, pattern)?;
        println!("learned category {category}: {committed} neuron(s) committed");
    }

    // Recognize noisy variants.
    let probes: &[&[u8]] = &[
        &[12, 31, 52, 68, 91],
        &[88, 71, 49, 32, 11],
        &[51, 49, 50, 52, 48],
    ];
    println!();
    for probe in probes {
        let outcome = dev.classify(1, Classifier::Rbf, 4, probe)?;
        match outcome.best_category() {
            Some(category) => println!(
                "probe {probe:?} → category {category} (distance {}, identified: {})",
                outcome.matches[0].distance, outcome.identified
            ),
            None => println!("probe {probe:?} → no neuron fired"),
        }
    }

    println!(
        "\n📊 {} learned, {} classified, last exchange took {} poll cycle(s)",
        dev.state().vectors_learned,
        dev.state().vectors_classified,
        dev.state().last_wait_loops
    );

    dev.close()?;
    Ok(())
}
