//! Solver mode and lifecycle tests.

use lpn_core::{EventLevel, EventSink, NullSink};
use lpn_links::{Conductor, FluxSource};
use lpn_network::{BasicNode, SolverNode};
use lpn_solver::{GpuMode, Solver, SolverConfig, SolverMode};
use std::sync::Mutex;

fn config(name: &str) -> SolverConfig {
    SolverConfig {
        name: name.into(),
        convergence_tolerance: 1.0e-8,
        min_linearization_potential: 1.0,
        minor_step_limit: 10,
        decomposition_limit: 10,
    }
}

/// Captures posted events for assertions.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(EventLevel, String)>>,
}

impl EventSink for RecordingSink {
    fn post(&self, level: EventLevel, _source: &str, message: &str) {
        self.events.lock().unwrap().push((level, message.to_string()));
    }
}

fn single_node_solver(name: &str, sink: Box<dyn EventSink>) -> Solver<BasicNode> {
    let mut solver = Solver::new(config(name), sink);
    solver
        .initialize_nodes(vec![
            BasicNode::new("node_0", 0.0),
            BasicNode::new("ground", 0.0),
        ])
        .unwrap();
    solver
        .initialize(vec![
            Box::new(Conductor::new("sink", 0, 1, 1, 10.0)),
            Box::new(FluxSource::new("supply", 1, 0, 1, 27.0)),
        ])
        .unwrap();
    solver
}

/// SLAVE mode overwrites the solution with the external vector.
#[test]
fn slave_mode_takes_external_potential() {
    let mut solver = single_node_solver("slave", Box::new(NullSink));
    solver.set_solver_mode(SolverMode::Slave);
    solver.set_slave_potential(&[7.5]).unwrap();

    solver.step(0.1).unwrap();

    assert_eq!(solver.potential_vector()[0], 7.5);
    assert_eq!(solver.nodes()[0].core().potential(), 7.5);
}

#[test]
fn slave_potential_length_is_checked() {
    let mut solver = single_node_solver("slave_len", Box::new(NullSink));
    assert!(solver.set_slave_potential(&[1.0, 2.0]).is_err());
}

/// DUMMY mode suppresses the solution: node potentials are left alone.
#[test]
fn dummy_mode_suppresses_output() {
    let mut solver = single_node_solver("dummy", Box::new(NullSink));
    solver.nodes_mut()[0].core_mut().set_potential(5.0);
    solver.set_solver_mode(SolverMode::Dummy);

    solver.step(0.1).unwrap();

    assert_eq!(solver.nodes()[0].core().potential(), 5.0);
    assert_eq!(solver.metrics().decomposition_count, 0);
}

/// Mode transitions emit informational events on the next step.
#[test]
fn mode_change_emits_event() {
    let sink: &'static RecordingSink = &*Box::leak(Box::new(RecordingSink::default()));
    let mut solver = {
        let mut solver = Solver::new(config("events"), Box::new(SinkRef(sink)));
        solver
            .initialize_nodes(vec![
                BasicNode::new("node_0", 0.0),
                BasicNode::new("ground", 0.0),
            ])
            .unwrap();
        solver
            .initialize(vec![
                Box::new(Conductor::new("sink", 0, 1, 1, 10.0)) as _,
                Box::new(FluxSource::new("supply", 1, 0, 1, 27.0)) as _,
            ])
            .unwrap();
        solver
    };

    solver.set_solver_mode(SolverMode::Slave);
    solver.step(0.1).unwrap();

    let events = sink.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|(level, msg)| *level == EventLevel::Info && msg.contains("solver mode changed")));
}

/// Forwarding sink so the test can keep reading the recorder.
struct SinkRef(&'static RecordingSink);

impl EventSink for SinkRef {
    fn post(&self, level: EventLevel, source: &str, message: &str) {
        self.0.post(level, source, message);
    }
}

/// GPU modes warn and downgrade on a non-GPU build.
#[test]
fn gpu_mode_downgrade_warns() {
    let sink: &'static RecordingSink = &*Box::leak(Box::new(RecordingSink::default()));
    let mut solver: Solver<BasicNode> = Solver::new(config("gpu"), Box::new(SinkRef(sink)));
    solver.set_gpu_options(GpuMode::GpuSparse, 100);

    let events = sink.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|(level, msg)| *level == EventLevel::Warning && msg.contains("not GPU capable")));
}

/// Checkpoint state round-trips through serde and restores the major
/// potential vector and counters.
#[test]
fn checkpoint_restore_round_trip() {
    let mut solver = single_node_solver("checkpoint", Box::new(NullSink));
    solver.step(0.1).unwrap();

    let json = serde_json::to_string(&solver.checkpoint()).unwrap();

    let mut restored = single_node_solver("checkpoint_b", Box::new(NullSink));
    let checkpoint = serde_json::from_str(&json).unwrap();
    restored.restore(checkpoint).unwrap();
    restored.restart().unwrap();

    assert_eq!(restored.potential_vector()[0], 2.7);
    assert_eq!(restored.metrics().major_step_count, 1);

    // The first post-restore step re-decomposes and reproduces the frame.
    restored.step(0.1).unwrap();
    assert_eq!(restored.potential_vector()[0], 2.7);
    assert_eq!(restored.metrics().major_step_count, 2);
}

/// Restart recomputes derived state and forces a fresh decomposition,
/// reproducing the same solution.
#[test]
fn restart_forces_rebuild_and_preserves_solution() {
    let mut solver = single_node_solver("restart", Box::new(NullSink));
    solver.step(0.1).unwrap();
    let p_before = solver.potential_vector()[0];
    assert_eq!(solver.metrics().decomposition_count, 1);

    solver.restart().unwrap();
    assert!(solver.is_initialized());

    solver.step(0.1).unwrap();
    assert_eq!(solver.potential_vector()[0], p_before);
    // The first post-restart step always re-decomposes.
    assert_eq!(solver.metrics().decomposition_count, 2);
}
