//! Stream a trained knowledge base off the card and restore it.
//!
//! Demonstrates the store/forget/load cycle that backs persisting a
//! trained network to disk. Runs against the simulated card.

use neuromem_driver::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("neuromem_driver=info")
        .init();

    let mut dev = NeuroMemDevice::open(Box::new(SimTransport::new()))?;

    for (category, pattern) in [(7u16, [20u8, 40, 60]), (8, [200, 180, 160])] {
        dev.learn(1, category, &pattern)?;
    }
    println!("trained: {} neuron(s)", dev.committed());

    // Off the card...
    let records = dev.kb_store_all()?;
    println!("stored:  {} record(s), {} bytes each", records.len(), 264);

    // ...wipe the network...
    dev.forget()?;
    println!("forgot:  {} neuron(s) committed", dev.committed());

    // ...and back on.
    let restored = dev.kb_load_all(&records)?;
    println!("loaded:  {restored} neuron(s) restored");

    let outcome = dev.classify(1, Classifier::Rbf, 2, &[21, 41, 59])?;
    println!(
        "recall:  category {:?} after restore",
        outcome.best_category()
    );

    dev.close()?;
    Ok(())
}
