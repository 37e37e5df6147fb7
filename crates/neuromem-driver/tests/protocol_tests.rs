//! End-to-end protocol tests against the simulated card.
//!
//! Everything here drives the public engine API through the full
//! exchange path: ready polling, frame encode, results-ready polling,
//! response decode.

use neuromem_driver::prelude::*;

fn open_sim() -> NeuroMemDevice {
    NeuroMemDevice::open(Box::new(SimTransport::new())).expect("sim open")
}

fn open_sim_with_capacity(capacity: usize) -> NeuroMemDevice {
    NeuroMemDevice::open(Box::new(SimTransport::with_capacity(capacity))).expect("sim open")
}

#[test]
fn open_resets_and_reports_capacity() {
    let dev = open_sim_with_capacity(1024);
    assert_eq!(dev.capacity(), 1024);
    assert_eq!(dev.committed(), 0);
    assert!(dev.is_valid());
}

#[test]
fn multi_category_learning_session() {
    let mut dev = open_sim();

    // Three categories, two exemplars each.
    let exemplars: &[(u16, &[u8])] = &[
        (10, &[10, 10, 10, 10]),
        (10, &[12, 12, 12, 12]),
        (20, &[100, 100, 100, 100]),
        (20, &[102, 102, 102, 102]),
        (30, &[200, 200, 200, 200]),
        (30, &[202, 202, 202, 202]),
    ];
    for (category, comps) in exemplars {
        dev.learn(1, *category, comps).expect("learn");
    }
    assert_eq!(dev.committed(), 6);
    assert_eq!(dev.state().vectors_learned, 6);

    // Recall near each cluster.
    for (probe, want) in [
        ([11u8, 11, 11, 11], 10u16),
        ([101, 101, 101, 101], 20),
        ([201, 201, 201, 201], 30),
    ] {
        let outcome = dev.classify(1, Classifier::Rbf, 4, &probe).expect("classify");
        assert_eq!(outcome.best_category(), Some(want), "probe {probe:?}");
        assert!(outcome.identified);
    }
}

#[test]
fn duplicate_learn_does_not_grow_network() {
    let mut dev = open_sim();
    assert_eq!(dev.learn(1, 5, &[1, 2, 3]).unwrap(), 1);
    assert_eq!(dev.learn(1, 5, &[1, 2, 3]).unwrap(), 1);
    assert_eq!(dev.committed(), 1);
}

#[test]
fn full_network_returns_capacity() {
    let mut dev = open_sim_with_capacity(3);
    dev.learn(1, 1, &[10]).unwrap();
    dev.learn(1, 2, &[120]).unwrap();
    dev.learn(1, 3, &[240]).unwrap();
    // Fourth distinct vector: no room, count pins at capacity.
    let committed = dev.learn(1, 4, &[60]).unwrap();
    assert_eq!(committed, 3);
    assert_eq!(dev.committed(), 3);
}

#[test]
fn knn_reports_all_context_neurons_sorted() {
    let mut dev = open_sim();
    dev.learn(1, 10, &[100]).unwrap();
    dev.learn(1, 20, &[140]).unwrap();
    dev.learn(2, 30, &[100]).unwrap(); // other context, must not appear

    let outcome = dev.classify(1, Classifier::Knn, 8, &[110]).unwrap();
    assert_eq!(outcome.matches.len(), 2);
    assert_eq!(outcome.matches[0].category, 10);
    assert_eq!(outcome.matches[0].distance, 10);
    assert_eq!(outcome.matches[1].category, 20);
    assert_eq!(outcome.matches[1].distance, 30);
}

#[test]
fn sup_norm_exact_recall_reports_zero_distance() {
    let mut dev = open_sim();
    dev.set_dist_eval(DistEval::Lsup);
    dev.learn(1, 1, &[10, 40, 90, 160]).unwrap();
    dev.learn(1, 2, &[160, 90, 40, 10]).unwrap();

    let outcome = dev
        .classify(1, Classifier::Rbf, 4, &[160, 90, 40, 10])
        .unwrap();
    assert!(outcome.identified);
    assert_eq!(outcome.best_category(), Some(2));
    assert_eq!(outcome.matches[0].distance, 0);
}

#[test]
fn lsup_metric_changes_distances() {
    let mut dev = open_sim();
    dev.set_dist_eval(DistEval::Lsup);
    dev.learn(1, 10, &[100, 100]).unwrap();
    let outcome = dev.classify(1, Classifier::Knn, 4, &[110, 105]).unwrap();
    // Lsup: max(10, 5) rather than L1's 15.
    assert_eq!(outcome.matches[0].distance, 10);
}

#[test]
fn classify_answer_count_is_capped() {
    let mut dev = open_sim();
    for ix in 0..10u16 {
        dev.learn(1, 100 + ix, &[(ix * 20) as u8]).unwrap();
    }
    let outcome = dev.classify(1, Classifier::Knn, 3, &[5]).unwrap();
    assert_eq!(outcome.matches.len(), 3);
}

#[test]
fn knowledge_base_survives_store_forget_load() {
    let mut dev = open_sim();
    dev.learn(1, 10, &[10, 20, 30]).unwrap();
    dev.learn(1, 20, &[200, 210, 220]).unwrap();
    dev.learn(2, 30, &[50, 60, 70]).unwrap();

    let before = dev.classify(1, Classifier::Rbf, 4, &[10, 20, 30]).unwrap();
    let records = dev.kb_store_all().expect("store");
    assert_eq!(records.len(), 3);

    dev.forget().expect("forget");
    assert_eq!(dev.committed(), 0);
    let empty = dev.classify(1, Classifier::Rbf, 4, &[10, 20, 30]).unwrap();
    assert!(empty.matches.is_empty());

    let restored = dev.kb_load_all(&records).expect("load");
    assert_eq!(restored, 3);

    let after = dev.classify(1, Classifier::Rbf, 4, &[10, 20, 30]).unwrap();
    assert_eq!(after.best_category(), before.best_category());
    assert_eq!(after.matches.len(), before.matches.len());
    assert_eq!(after.matches[0].distance, before.matches[0].distance);
}

#[test]
fn store_walk_ends_with_kbase_eof() {
    let mut dev = open_sim();
    dev.learn(1, 10, &[1]).unwrap();
    assert_eq!(dev.kb_arm().unwrap(), 1);
    dev.kb_store_next().expect("first record");
    assert!(matches!(
        dev.kb_store_next(),
        Err(NeuroMemError::KbaseEof)
    ));
}

#[test]
fn store_on_empty_network_is_immediate_eof() {
    let mut dev = open_sim();
    assert_eq!(dev.kb_arm().unwrap(), 0);
    assert!(matches!(
        dev.kb_store_next(),
        Err(NeuroMemError::KbaseEof)
    ));
    // The convenience wrapper yields an empty vec instead.
    let records = dev.kb_store_all().unwrap();
    assert!(records.is_empty());
}

#[test]
fn stored_record_carries_full_neuron_state() {
    let mut dev = open_sim();
    dev.set_dist_eval(DistEval::Lsup);
    dev.learn(3, 42, &[7, 8, 9]).unwrap();

    let records = dev.kb_store_all().unwrap();
    let record = &records[0];
    assert_eq!(record.category, 42);
    assert_eq!(record.context(), 3);
    assert_eq!(record.dist_eval(), DistEval::Lsup);
    assert_eq!(&record.comps[..3], &[7, 8, 9]);
    assert!(record.comps[3..].iter().all(|&c| c == 0));
}

#[test]
fn neuron_read_matches_stored_record() {
    let mut dev = open_sim();
    dev.learn(1, 10, &[1, 2, 3]).unwrap();
    dev.learn(1, 20, &[4, 5, 6]).unwrap();

    let neuron = dev.neuron_read(1).unwrap();
    assert_eq!(neuron.category, 20);
    assert_eq!(&neuron.comps[..3], &[4, 5, 6]);

    let records = dev.kb_store_all().unwrap();
    assert_eq!(records[1].category, neuron.category);
    assert_eq!(records[1].comps, neuron.comps);
}

#[test]
fn forget_is_idempotent_and_resets_kbase_id() {
    let mut dev = open_sim();
    dev.learn(1, 10, &[9, 9]).unwrap();
    dev.set_kbase_id(9);
    dev.forget().unwrap();
    dev.forget().unwrap();
    assert_eq!(dev.committed(), 0);
    assert_eq!(dev.state().kbase_id, 0);
}

#[test]
fn reset_recovers_from_injected_fault() {
    let mut sim = SimTransport::new();
    sim.inject_fault();
    // Open performs a hard reset, which clears the fault.
    let mut dev = NeuroMemDevice::open(Box::new(sim)).expect("open resets fault");
    assert_eq!(dev.committed(), 0);
    dev.learn(1, 1, &[1]).unwrap();
    assert_eq!(dev.committed(), 1);
}

#[test]
fn custom_influence_fields_flow_into_learned_neurons() {
    let mut dev = open_sim();
    dev.set_influence_fields(InfluenceFields {
        maxif: 50,
        minif: 4,
    })
    .unwrap();
    dev.learn(1, 10, &[100]).unwrap();

    // A lone neuron takes the full maxif as its influence field.
    let records = dev.kb_store_all().unwrap();
    assert_eq!(records[0].aif, 50);
    assert_eq!(records[0].minif, 4);

    // Probe just outside the field no longer fires under RBF.
    let outside = dev.classify(1, Classifier::Rbf, 4, &[160]).unwrap();
    assert!(outside.matches.is_empty());
    let inside = dev.classify(1, Classifier::Rbf, 4, &[140]).unwrap();
    assert_eq!(inside.best_category(), Some(10));
}

#[test]
fn session_telemetry_accumulates() {
    let mut dev = open_sim();
    dev.learn(1, 1, &[1]).unwrap();
    dev.learn(1, 2, &[100]).unwrap();
    dev.classify(1, Classifier::Knn, 2, &[50]).unwrap();

    let state = dev.state();
    assert_eq!(state.vectors_learned, 2);
    assert_eq!(state.vectors_classified, 1);
    assert!(state.last_wait_loops > 0);
    assert!(state.total_learn_nanos > 0);
    assert!(state.total_classify_nanos > 0);
}
