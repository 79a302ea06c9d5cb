//! Minor-step protocol tests with non-linear links.

use lpn_core::NullSink;
use lpn_links::{Conductor, FluxSource};
use lpn_network::{BasicNode, Link, LinkCore, NetworkResult, SolutionResult, SolverNode};
use lpn_solver::{Solver, SolverConfig, StepResult};

fn config(minor_limit: usize, decomp_limit: usize) -> SolverConfig {
    SolverConfig {
        name: "nonlinear".into(),
        convergence_tolerance: 1.0e-8,
        min_linearization_potential: 1.0,
        minor_step_limit: minor_limit,
        decomposition_limit: decomp_limit,
    }
}

fn nodes(n: usize) -> Vec<BasicNode> {
    let mut nodes: Vec<BasicNode> = (0..n)
        .map(|i| BasicNode::new(&format!("node_{i}"), 0.0))
        .collect();
    nodes.push(BasicNode::new("ground", 0.0));
    nodes
}

/// A diode-like element: blocks until the potential drop across it goes
/// forward, then conducts. A wrong conduction state rejects the solution
/// and flips on the reset callback.
struct DiodeLink {
    core: LinkCore,
    g_on: f64,
    g_off: f64,
    on: bool,
    built_state: Option<bool>,
    pending_flip: bool,
}

impl DiodeLink {
    fn new(name: &str, port0: usize, port1: usize, network_size: usize, on: bool) -> Self {
        let mut core = LinkCore::new(name, vec![port0, port1], network_size);
        core.set_initialized();
        Self {
            core,
            g_on: 10.0,
            g_off: 1.0e-8,
            on,
            built_state: None,
            pending_flip: false,
        }
    }

    fn stamp(&mut self) {
        if self.built_state != Some(self.on) {
            let g = if self.on { self.g_on } else { self.g_off };
            self.core.admittance.values.copy_from_slice(&[g, -g, -g, g]);
            self.built_state = Some(self.on);
            self.core.needs_admittance_update = true;
        }
    }
}

impl Link<BasicNode> for DiodeLink {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn is_non_linear(&self) -> bool {
        true
    }

    fn step(&mut self, _dt: f64, _nodes: &mut [BasicNode]) -> NetworkResult<()> {
        self.core.apply_port_commands()?;
        self.stamp();
        Ok(())
    }

    fn minor_step(
        &mut self,
        _dt: f64,
        _minor_step: usize,
        _nodes: &mut [BasicNode],
    ) -> NetworkResult<()> {
        self.stamp();
        Ok(())
    }

    fn confirm_solution_acceptable(
        &mut self,
        _converged_step: usize,
        _absolute_step: usize,
        _nodes: &[BasicNode],
    ) -> SolutionResult {
        let drop = self.core.potentials[0] - self.core.potentials[1];
        let wrong_state = (!self.on && drop > 1.0e-9) || (self.on && drop < -1.0e-9);
        if wrong_state {
            self.pending_flip = true;
            SolutionResult::Reject
        } else {
            SolutionResult::Confirm
        }
    }

    fn reset_last_minor_step(&mut self, _converged_step: usize, _absolute_step: usize) -> bool {
        if self.pending_flip {
            self.on = !self.on;
            self.pending_flip = false;
        }
        true
    }

    fn compute_flows(&mut self, _dt: f64, _nodes: &mut [BasicNode]) -> NetworkResult<()> {
        Ok(())
    }
}

/// A link whose verdict sequence is scripted, for protocol tests.
struct ScriptedLink {
    core: LinkCore,
    verdicts: Vec<SolutionResult>,
    polls: usize,
    reset_ok: bool,
}

impl ScriptedLink {
    fn new(name: &str, node: usize, network_size: usize, verdicts: Vec<SolutionResult>) -> Self {
        let mut core = LinkCore::new(name, vec![node], network_size);
        core.set_initialized();
        Self {
            core,
            verdicts,
            polls: 0,
            reset_ok: true,
        }
    }
}

impl Link<BasicNode> for ScriptedLink {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn is_non_linear(&self) -> bool {
        true
    }

    fn step(&mut self, _dt: f64, _nodes: &mut [BasicNode]) -> NetworkResult<()> {
        Ok(())
    }

    fn confirm_solution_acceptable(
        &mut self,
        _converged_step: usize,
        _absolute_step: usize,
        _nodes: &[BasicNode],
    ) -> SolutionResult {
        let verdict = self
            .verdicts
            .get(self.polls)
            .copied()
            .unwrap_or(SolutionResult::Confirm);
        self.polls += 1;
        verdict
    }

    fn reset_last_minor_step(&mut self, _converged_step: usize, _absolute_step: usize) -> bool {
        self.reset_ok
    }

    fn compute_flows(&mut self, _dt: f64, _nodes: &mut [BasicNode]) -> NetworkResult<()> {
        Ok(())
    }
}

/// Scenario: a diode starting in the wrong (conducting) state. Minor
/// step 1 solves a reverse drop across it, the diode rejects and flips,
/// and the network re-solves and converges.
#[test]
fn diode_rejection_and_recovery() {
    let mut solver: Solver<BasicNode> = Solver::new(config(15, 15), Box::new(NullSink));
    solver.initialize_nodes(nodes(2)).unwrap();
    solver
        .initialize(vec![
            Box::new(Conductor::new("load", 0, 2, 2, 1.0)),
            // Reverse-biased: flow would have to run node1 -> node0, but
            // the source pulls node0 high, so the diode sees a forward
            // drop while believing it should block.
            Box::new(DiodeLink::new("diode", 0, 1, 2, false)),
            Box::new(Conductor::new("bleed", 1, 2, 2, 1.0)),
            Box::new(FluxSource::new("supply", 2, 0, 2, 5.0)),
        ])
        .unwrap();

    solver.step(0.1).unwrap();

    assert_eq!(solver.metrics().convergence_fail_count, 0);
    assert_eq!(solver.metrics().last_converged_step, 1);
    // One decomposition for the wrong state, one after the flip.
    assert_eq!(solver.metrics().decomposition_count, 2);
    assert_eq!(
        solver.step_log().last().map(|r| r.result),
        Some(StepResult::Success)
    );
    // A rejection was logged along the way.
    assert!(solver
        .step_log()
        .records()
        .any(|r| r.result == StepResult::Reject));

    // The diode ended up conducting: both nodes near each other.
    let p = solver.potential_vector();
    assert!(p[0] > p[1] && p[1] > 0.0, "p = {p:?}");
}

/// A link that rejects forever exhausts the minor-step limit; the step
/// completes with a warning, reverts to the prior major-frame state, and
/// counts the failure.
#[test]
fn perpetual_rejection_is_a_convergence_failure() {
    let mut solver: Solver<BasicNode> = Solver::new(config(5, 50), Box::new(NullSink));
    solver.initialize_nodes(nodes(1)).unwrap();
    solver
        .initialize(vec![
            Box::new(Conductor::new("sink", 0, 1, 1, 2.0)),
            Box::new(FluxSource::new("supply", 1, 0, 1, 4.0)),
            Box::new(ScriptedLink::new(
                "naysayer",
                0,
                1,
                vec![SolutionResult::Reject; 16],
            )),
        ])
        .unwrap();

    solver.step(0.1).unwrap();

    assert_eq!(solver.metrics().convergence_fail_count, 1);
    // The potential reverted to the last major frame (initialization).
    assert_eq!(solver.potential_vector()[0], 0.0);
    assert_eq!(solver.nodes()[0].core().potential(), 0.0);
}

/// DELAY before first convergence is coerced to CONFIRM; after
/// convergence it holds the network state without re-solving until the
/// link confirms.
#[test]
fn delay_holds_state_after_convergence() {
    let mut solver: Solver<BasicNode> = Solver::new(config(10, 10), Box::new(NullSink));
    solver.initialize_nodes(nodes(1)).unwrap();
    solver
        .initialize(vec![
            Box::new(Conductor::new("sink", 0, 1, 1, 2.0)),
            Box::new(FluxSource::new("supply", 1, 0, 1, 4.0)),
            Box::new(ScriptedLink::new(
                "dawdler",
                0,
                1,
                // Poll 1: pre-convergence delay (coerced to confirm).
                // Poll 2: converged, delay for one step. Poll 3: confirm.
                vec![
                    SolutionResult::Delay,
                    SolutionResult::Delay,
                    SolutionResult::Confirm,
                ],
            )),
        ])
        .unwrap();

    solver.step(0.1).unwrap();

    assert_eq!(solver.metrics().convergence_fail_count, 0);
    assert!(solver
        .step_log()
        .records()
        .any(|r| r.result == StepResult::Delay));
    assert_eq!(
        solver.step_log().last().map(|r| r.result),
        Some(StepResult::Success)
    );
    // The delayed iteration did not re-decompose.
    assert_eq!(solver.metrics().decomposition_count, 1);
    assert!((solver.potential_vector()[0] - 2.0).abs() < 1e-12);
}

/// A failing reset callback is counted and warned, not fatal.
#[test]
fn link_reset_failure_is_counted() {
    let mut solver: Solver<BasicNode> = Solver::new(config(4, 40), Box::new(NullSink));
    solver.initialize_nodes(nodes(1)).unwrap();
    let mut naysayer = ScriptedLink::new("naysayer", 0, 1, vec![SolutionResult::Reject; 8]);
    naysayer.reset_ok = false;
    solver
        .initialize(vec![
            Box::new(Conductor::new("sink", 0, 1, 1, 2.0)),
            Box::new(FluxSource::new("supply", 1, 0, 1, 4.0)),
            Box::new(naysayer),
        ])
        .unwrap();

    solver.step(0.1).unwrap();
    assert!(solver.metrics().link_reset_fail_count > 0);
    assert_eq!(solver.metrics().convergence_fail_count, 1);
}

/// Worst-case timing keeps decomposing after convergence until the
/// decomposition limit is exercised, observable in the step log.
#[test]
fn worst_case_timing_exercises_decomposition_limit() {
    let mut solver: Solver<BasicNode> = Solver::new(config(15, 4), Box::new(NullSink));
    solver.initialize_nodes(nodes(2)).unwrap();
    solver
        .initialize(vec![
            Box::new(Conductor::new("load", 0, 2, 2, 1.0)),
            Box::new(DiodeLink::new("diode", 0, 1, 2, false)),
            Box::new(Conductor::new("bleed", 1, 2, 2, 1.0)),
            Box::new(FluxSource::new("supply", 2, 0, 2, 5.0)),
        ])
        .unwrap();
    solver.set_worst_case_timing(true);

    solver.step(0.1).unwrap();

    assert_eq!(solver.metrics().convergence_fail_count, 0);
    assert_eq!(solver.metrics().decomposition_count, 4);
    assert_eq!(solver.metrics().last_decomposition, 4);
    assert_eq!(
        solver.step_log().last().map(|r| r.result),
        Some(StepResult::Success)
    );
}

/// The minor-step limit itself: a network that needs more iterations
/// than allowed reports non-convergence rather than raising.
#[test]
fn minor_step_limit_bounds_iteration() {
    let mut solver: Solver<BasicNode> = Solver::new(config(2, 50), Box::new(NullSink));
    solver.initialize_nodes(nodes(2)).unwrap();
    solver
        .initialize(vec![
            Box::new(Conductor::new("load", 0, 2, 2, 1.0)),
            // Conducting diode with a reverse drop: it must reject,
            // re-solve, then settle, which takes three minor steps.
            Box::new(DiodeLink::new("diode", 0, 1, 2, true)),
            Box::new(Conductor::new("bleed", 1, 2, 2, 1.0)),
            Box::new(FluxSource::new("supply", 2, 1, 2, 5.0)),
        ])
        .unwrap();

    solver.step(0.1).unwrap();
    assert_eq!(solver.metrics().convergence_fail_count, 1);
}
