//! The network orchestrator.
//!
//! Owns the admittance matrix, source and potential vectors, the island
//! partition, and the minor-step loop that iterates non-linear networks
//! to convergence. Nodes and links are supplied once at initialization;
//! the solver drives them in a fixed order every major frame.

use crate::cholesky;
use crate::error::{SolverError, SolverResult};
use crate::islands::Islands;
use crate::sor;
use crate::step_log::{StepLog, StepResult};
use lpn_core::{EventLevel, EventSink, Timer};
use lpn_network::{FlowOrchestrator, Link, SolutionResult, SolverNode, TransportOrchestrator};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Solver operating mode, read each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMode {
    /// Full build/solve of the system of equations.
    Normal,
    /// Links define their own potential; the solution is suppressed.
    Dummy,
    /// The solution is overwritten with an externally supplied vector.
    Slave,
}

/// Island handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IslandMode {
    Off,
    /// Compute islands but still solve the full matrix.
    Find,
    /// Decompose each island independently.
    Solve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Run,
    /// Short-circuit the step entirely.
    Pause,
}

/// GPU offload mode. This build carries no device back-ends, so any GPU
/// mode downgrades to `NoGpu` with a warning, exactly as a non-GPU
/// compilation of the original behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuMode {
    NoGpu,
    GpuDense,
    GpuSparse,
}

/// Static solver configuration, validated at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Name for event reporting.
    pub name: String,
    /// Per-node potential delta below which a minor step has converged.
    pub convergence_tolerance: f64,
    /// Minimum potential for link admittance linearization.
    pub min_linearization_potential: f64,
    /// Maximum minor steps per major step.
    pub minor_step_limit: usize,
    /// Maximum matrix decompositions per major step.
    pub decomposition_limit: usize,
}

impl SolverConfig {
    fn validate(&self) -> SolverResult<()> {
        if self.convergence_tolerance <= 0.0 {
            return Err(SolverError::Initialization {
                what: "convergence tolerance is too small (<= 0.0)".into(),
            });
        }
        if self.min_linearization_potential <= 0.0 {
            return Err(SolverError::Initialization {
                what: "minimum linearization potential is too small (<= 0.0)".into(),
            });
        }
        if self.minor_step_limit < 1 {
            return Err(SolverError::Initialization {
                what: "minor step limit is too small (< 1)".into(),
            });
        }
        if self.decomposition_limit < 1 {
            return Err(SolverError::Initialization {
                what: "decomposition limit is too small (< 1)".into(),
            });
        }
        Ok(())
    }
}

/// Solver-level state that survives a checkpoint: the last major-frame
/// potential, the counters, and the step log. Scratch matrices, island
/// tables, and factorizations are rebuilt on the first post-restore
/// step, which always forces a decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverCheckpoint {
    pub major_potential: Vec<f64>,
    pub metrics: SolverMetrics,
    pub step_log: StepLog,
}

/// Performance and diagnostic counters, persisted across checkpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverMetrics {
    pub major_step_count: u64,
    pub convergence_fail_count: u64,
    pub link_reset_fail_count: u64,
    pub minor_step_count: u64,
    pub last_minor_step: usize,
    pub max_minor_step: usize,
    pub avg_minor_steps: f64,
    pub decomposition_count: u64,
    pub last_decomposition: usize,
    pub max_decompositions: usize,
    pub avg_decompositions: f64,
    /// Consecutive converged minor steps when the last frame finished.
    pub last_converged_step: usize,
    pub island_count: usize,
    pub island_max_size: usize,
    pub sor_last_iteration: Option<usize>,
    pub sor_fail_count: u64,
    /// Wall-clock seconds spent exclusively in decompose/solve last step.
    pub solve_time_s: f64,
    /// Total wall-clock seconds of the last step.
    pub step_time_s: f64,
}

/// The network orchestrator, generic over the node flavour.
pub struct Solver<N: SolverNode> {
    config: SolverConfig,
    sink: Box<dyn EventSink>,

    nodes: Vec<N>,
    links: Vec<Box<dyn Link<N>>>,
    flow_orchestrator: Box<dyn FlowOrchestrator<N>>,

    network_size: usize,
    a: DMatrix<f64>,
    island_a: DMatrix<f64>,
    b: DVector<f64>,
    p: DVector<f64>,
    p_minor: DVector<f64>,
    p_major: DVector<f64>,
    slave_potential: DVector<f64>,
    islands: Islands,

    solver_mode: SolverMode,
    island_mode: IslandMode,
    run_mode: RunMode,
    gpu_mode: GpuMode,
    gpu_size_threshold: usize,
    last_solver_mode: SolverMode,
    last_island_mode: IslandMode,
    last_run_mode: RunMode,

    rebuild: bool,
    linear_network: bool,
    init_attempted: bool,
    init: bool,
    worst_case_timing: bool,

    sor_active: bool,
    sor_weight: f64,
    sor_max_iter: usize,
    sor_tolerance: f64,

    metrics: SolverMetrics,
    step_log: StepLog,
    solve_time_working: f64,
    nodes_convergence: Vec<f64>,
    links_convergence: Vec<SolutionResult>,
}

impl<N: SolverNode> Solver<N> {
    /// Create an uninitialized solver. Nodes and links are supplied by
    /// `initialize_nodes` and `initialize`, in that order, exactly once.
    pub fn new(config: SolverConfig, sink: Box<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            nodes: Vec::new(),
            links: Vec::new(),
            flow_orchestrator: Box::new(TransportOrchestrator),
            network_size: 0,
            a: DMatrix::zeros(0, 0),
            island_a: DMatrix::zeros(0, 0),
            b: DVector::zeros(0),
            p: DVector::zeros(0),
            p_minor: DVector::zeros(0),
            p_major: DVector::zeros(0),
            slave_potential: DVector::zeros(0),
            islands: Islands::default(),
            solver_mode: SolverMode::Normal,
            island_mode: IslandMode::Off,
            run_mode: RunMode::Run,
            gpu_mode: GpuMode::NoGpu,
            gpu_size_threshold: 9_999_999,
            last_solver_mode: SolverMode::Normal,
            last_island_mode: IslandMode::Off,
            last_run_mode: RunMode::Run,
            rebuild: false,
            linear_network: true,
            init_attempted: false,
            init: false,
            worst_case_timing: false,
            sor_active: false,
            sor_weight: 1.0,
            sor_max_iter: 100,
            sor_tolerance: 1.0e-12,
            metrics: SolverMetrics::default(),
            step_log: StepLog::default(),
            solve_time_working: 0.0,
            nodes_convergence: Vec::new(),
            links_convergence: Vec::new(),
        }
    }

    /// Supply the node slab, exactly once. The last node is ground.
    pub fn initialize_nodes(&mut self, nodes: Vec<N>) -> SolverResult<()> {
        if !self.nodes.is_empty() {
            return Err(self.init_error("node initialization attempted more than once"));
        }
        if nodes.len() < 2 {
            return Err(self.init_error("number of non-ground nodes is too small (< 1)"));
        }
        self.nodes = nodes;
        Ok(())
    }

    /// Initialize the solver with its links: validates configuration,
    /// sizes the matrix state, verifies node and link readiness, and
    /// distributes initial potentials. Callable exactly once.
    pub fn initialize(&mut self, links: Vec<Box<dyn Link<N>>>) -> SolverResult<()> {
        self.init = false;
        if self.init_attempted {
            return Err(self.init_error("initialization attempted more than once"));
        }
        self.init_attempted = true;

        if let Err(e) = self.config.validate() {
            self.post(EventLevel::Error, &e.to_string());
            return Err(e);
        }
        if self.nodes.is_empty() {
            return Err(self.init_error("nodes must be initialized before the solver"));
        }

        self.network_size = self.nodes.len() - 1;
        let n = self.network_size;
        self.a = DMatrix::zeros(n, n);
        self.island_a = DMatrix::zeros(n, n);
        self.b = DVector::zeros(n);
        self.p = DVector::zeros(n);
        self.p_minor = DVector::zeros(n);
        self.p_major = DVector::zeros(n);
        self.slave_potential = DVector::zeros(n);
        self.nodes_convergence = vec![0.0; n];

        self.links = links;
        self.links_convergence = vec![SolutionResult::Confirm; self.links.len()];
        self.verify_link_initialization()?;
        for link in &mut self.links {
            let core = link.core_mut();
            core.min_linearization_potential = self.config.min_linearization_potential;
        }
        if self.links.iter().any(|link| link.is_non_linear()) {
            self.linear_network = false;
        }

        // Prepare the nodes and seed the potential vector. Every node
        // starts on its own island until the first partition.
        self.verify_node_initialization()?;
        for index in 0..n {
            let node = &mut self.nodes[index];
            node.prepare_for_start();
            node.core_mut().allocate_netcap(n);
            node.core_mut().set_island(Some(Arc::new(vec![index])));
            self.p[index] = node.core().potential();
        }

        // The ground node never enters the system; zero its state.
        let ground = self.network_size;
        self.nodes[ground].reset_content_state();
        self.nodes[ground].core_mut().set_potential(0.0);

        self.output_potential_vector();
        self.p_minor.copy_from(&self.p);
        self.p_major.copy_from(&self.p);

        for link in &mut self.links {
            link.process_outputs();
        }

        self.initialize_restart_common();
        self.post(
            EventLevel::Info,
            &format!(
                "initialized with {} links, {} nodes",
                self.links.len(),
                self.nodes.len()
            ),
        );
        self.init = true;
        Ok(())
    }

    /// Replace the post-convergence flow dispatcher.
    pub fn set_flow_orchestrator(&mut self, orchestrator: Box<dyn FlowOrchestrator<N>>) {
        self.flow_orchestrator = orchestrator;
    }

    /// Select GPU offload. This build is not GPU capable, so any GPU mode
    /// downgrades to `NoGpu` with a warning; the size threshold is
    /// clamped to at least 2.
    pub fn set_gpu_options(&mut self, mode: GpuMode, size_threshold: usize) {
        self.gpu_size_threshold = size_threshold;
        if self.gpu_size_threshold < 2 {
            self.gpu_size_threshold = 2;
            self.post(
                EventLevel::Warning,
                "GPU size threshold reset to the minimum operating value of 2",
            );
        }
        if mode != GpuMode::NoGpu {
            self.gpu_mode = GpuMode::NoGpu;
            self.post(
                EventLevel::Warning,
                "GPU mode rejected because the solver compilation is not GPU capable",
            );
        } else {
            self.gpu_mode = mode;
        }
    }

    pub fn set_solver_mode(&mut self, mode: SolverMode) {
        self.solver_mode = mode;
    }

    pub fn set_island_mode(&mut self, mode: IslandMode) {
        self.island_mode = mode;
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
    }

    /// Supply the external potential vector used in SLAVE mode.
    pub fn set_slave_potential(&mut self, potential: &[f64]) -> SolverResult<()> {
        if potential.len() != self.network_size {
            return Err(SolverError::OutOfBounds {
                what: format!(
                    "slave potential length {} does not match network size {}",
                    potential.len(),
                    self.network_size
                ),
            });
        }
        self.slave_potential.copy_from_slice(potential);
        Ok(())
    }

    /// Configure the SOR pre-solver attempt.
    pub fn set_sor_options(&mut self, active: bool, weight: f64, max_iter: usize, tolerance: f64) {
        self.sor_active = active;
        self.sor_weight = weight;
        self.sor_max_iter = max_iter;
        self.sor_tolerance = tolerance;
    }

    /// Force a rebuild/decomposition every minor step and keep iterating
    /// after convergence until the decomposition limit is exercised.
    pub fn set_worst_case_timing(&mut self, enabled: bool) {
        self.worst_case_timing = enabled;
    }

    // --- accessors ---

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn network_size(&self) -> usize {
        self.network_size
    }

    pub fn is_initialized(&self) -> bool {
        self.init
    }

    pub fn metrics(&self) -> &SolverMetrics {
        &self.metrics
    }

    pub fn step_log(&self) -> &StepLog {
        &self.step_log
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [N] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[Box<dyn Link<N>>] {
        &self.links
    }

    pub fn potential_vector(&self) -> &DVector<f64> {
        &self.p
    }

    pub fn source_vector(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn admittance_matrix(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn islands(&self) -> &Islands {
        &self.islands
    }

    /// Per-node potential deltas from the last convergence check.
    pub fn nodes_convergence(&self) -> &[f64] {
        &self.nodes_convergence
    }

    /// Each link's verdict from the last acceptance poll.
    pub fn links_convergence(&self) -> &[SolutionResult] {
        &self.links_convergence
    }

    /// Capture the solver-level persisted state. Node and link state is
    /// checkpointed by the caller from their own serializable types.
    pub fn checkpoint(&self) -> SolverCheckpoint {
        SolverCheckpoint {
            major_potential: self.p_major.as_slice().to_vec(),
            metrics: self.metrics.clone(),
            step_log: self.step_log.clone(),
        }
    }

    /// Restore solver-level persisted state. `restart` must follow before
    /// the next step.
    pub fn restore(&mut self, checkpoint: SolverCheckpoint) -> SolverResult<()> {
        if checkpoint.major_potential.len() != self.network_size {
            return Err(SolverError::OutOfBounds {
                what: format!(
                    "checkpoint potential length {} does not match network size {}",
                    checkpoint.major_potential.len(),
                    self.network_size
                ),
            });
        }
        self.p_major.copy_from_slice(&checkpoint.major_potential);
        self.p.copy_from(&self.p_major);
        self.p_minor.copy_from(&self.p_major);
        self.metrics = checkpoint.metrics;
        self.step_log = checkpoint.step_log;
        Ok(())
    }

    /// Prepare for run after a checkpoint load: resets derived state and
    /// restarts nodes and links. On failure the solver is left
    /// uninitialized.
    pub fn restart(&mut self) -> SolverResult<()> {
        self.init = false;
        self.initialize_restart_common();

        let result = (|| -> SolverResult<()> {
            for index in 0..self.network_size {
                self.nodes[index].restart()?;
            }
            let ground = self.network_size;
            self.nodes[ground].reset_content_state();
            self.nodes[ground].core_mut().set_potential(0.0);
            for link in &mut self.links {
                link.restart()?;
            }
            Ok(())
        })();

        if result.is_err() {
            return Err(self.init_error("failed to restart"));
        }
        self.post(EventLevel::Info, "restarted");
        self.init = true;
        Ok(())
    }

    /// Advance the network one major frame.
    ///
    /// Numerical and out-of-bounds errors in run-time are not necessarily
    /// fatal and may be caught and ridden through; initialization errors
    /// indicate a broken network setup and should be fatal.
    pub fn step(&mut self, dt: f64) -> SolverResult<()> {
        let timer = Timer::start();

        self.check_step_inputs()?;
        if self.run_mode == RunMode::Pause {
            return Ok(());
        }
        self.metrics.major_step_count += 1;
        self.step_log.begin_major_step(self.metrics.major_step_count);

        for link in &mut self.links {
            link.process_inputs();
        }
        for node in &mut self.nodes {
            node.reset_flows();
        }

        let converged = match self.iterate_minor_steps(dt) {
            Ok(converged) => converged,
            Err(e) => {
                if matches!(e, SolverError::Numerical { .. }) {
                    self.step_log
                        .record_step_result(self.metrics.last_decomposition, StepResult::MathFail);
                    self.step_log.end_major_step();
                }
                return Err(e);
            }
        };

        self.metrics.avg_minor_steps =
            self.metrics.minor_step_count as f64 / self.metrics.major_step_count as f64;
        self.metrics.avg_decompositions =
            self.metrics.decomposition_count as f64 / self.metrics.major_step_count as f64;
        if self.metrics.last_decomposition > self.metrics.max_decompositions {
            self.metrics.max_decompositions = self.metrics.last_decomposition;
        }

        if converged {
            self.flow_orchestrator
                .update(dt, &mut self.links, &mut self.nodes)?;
            for link in self.links.iter_mut().rev() {
                link.process_outputs();
            }
        } else {
            // Fall back to the last major-frame state instead of
            // publishing an unconverged solution.
            self.metrics.convergence_fail_count += 1;
            self.p.copy_from(&self.p_major);
            self.override_potential();
            self.output_potential_vector();
            self.post(EventLevel::Warning, "failed to converge");
        }

        self.p_major.copy_from(&self.p);
        self.rebuild = false;
        self.step_log.end_major_step();

        self.metrics.solve_time_s = self.solve_time_working;
        self.metrics.step_time_s = timer.elapsed();
        Ok(())
    }

    // --- internals ---

    fn init_error(&self, what: &str) -> SolverError {
        self.post(EventLevel::Error, what);
        SolverError::Initialization { what: what.into() }
    }

    fn post(&self, level: EventLevel, message: &str) {
        self.sink.post(level, &self.config.name, message);
    }

    fn verify_link_initialization(&self) -> SolverResult<()> {
        for (index, link) in self.links.iter().enumerate() {
            if !link.core().is_initialized() {
                return Err(SolverError::Initialization {
                    what: format!("link {} has not been initialized", link.core().name()),
                });
            }
            for other in &self.links[..index] {
                if other.core().name() == link.core().name() {
                    return Err(SolverError::Initialization {
                        what: format!("link {} has been added more than once", link.core().name()),
                    });
                }
            }
        }
        Ok(())
    }

    fn verify_node_initialization(&self) -> SolverResult<()> {
        if self.network_size < 1 {
            return Err(SolverError::Initialization {
                what: "number of non-ground nodes is too small (< 1)".into(),
            });
        }
        for (index, node) in self.nodes.iter().enumerate() {
            node.validate().map_err(|e| SolverError::Initialization {
                what: format!("node {index} failed validation: {e}"),
            })?;
            if !node.core().is_initialized() {
                return Err(SolverError::Initialization {
                    what: format!("node {index} has not been initialized"),
                });
            }
        }
        Ok(())
    }

    fn initialize_restart_common(&mut self) {
        self.metrics.island_count = 0;
        self.metrics.island_max_size = 0;
        self.metrics.convergence_fail_count = 0;
        self.metrics.link_reset_fail_count = 0;
        self.metrics.max_minor_step = 0;
        self.metrics.last_minor_step = 0;
        self.metrics.max_decompositions = 0;
        self.metrics.last_decomposition = 0;
        self.worst_case_timing = false;
        self.last_solver_mode = self.solver_mode;
        self.last_island_mode = self.island_mode;
        self.last_run_mode = self.run_mode;
        // Never solve on a stale matrix after init or checkpoint load.
        self.rebuild = true;
    }

    fn check_step_inputs(&mut self) -> SolverResult<()> {
        if self.last_solver_mode != self.solver_mode {
            self.last_solver_mode = self.solver_mode;
            self.post(
                EventLevel::Info,
                &format!("solver mode changed to {:?}", self.solver_mode),
            );
            self.rebuild = true;
        }
        if self.last_island_mode != self.island_mode {
            self.last_island_mode = self.island_mode;
            self.post(
                EventLevel::Info,
                &format!("island mode changed to {:?}", self.island_mode),
            );
            self.rebuild = true;
        }
        if self.last_run_mode != self.run_mode {
            self.last_run_mode = self.run_mode;
            self.post(
                EventLevel::Info,
                &format!("run mode changed to {:?}", self.run_mode),
            );
            self.rebuild = true;
        }

        if self.gpu_mode != GpuMode::NoGpu {
            self.gpu_mode = GpuMode::NoGpu;
            self.post(
                EventLevel::Warning,
                "GPU mode downmoded to NoGpu because this solver is not GPU capable",
            );
        }

        if !self.init {
            return Err(SolverError::Initialization {
                what: "network has not been initialized".into(),
            });
        }
        Ok(())
    }

    /// Iterate minor steps until the solution converges and every
    /// non-linear link confirms, or the minor-step limit runs out.
    fn iterate_minor_steps(&mut self, dt: f64) -> SolverResult<bool> {
        let mut network_converged = false;
        let mut converged_step = 0usize;
        self.solve_time_working = 0.0;
        let mut result = SolutionResult::Confirm;

        // Linear networks are converged by definition; minor steps only
        // iterate for non-linear networks in NORMAL mode.
        let mut minor_step_limit = self.config.minor_step_limit;
        if self.linear_network || self.solver_mode != SolverMode::Normal {
            minor_step_limit = 1;
            network_converged = true;
        }

        self.metrics.last_decomposition = 0;
        let mut minor = 1;
        while minor <= minor_step_limit {
            self.metrics.minor_step_count += 1;
            self.metrics.last_minor_step = minor;
            if minor > self.metrics.max_minor_step {
                self.metrics.max_minor_step = minor;
            }
            self.step_log.begin_minor_step(minor);

            // A delayed network holds its state: no link stepping and no
            // re-solve this iteration.
            if result != SolutionResult::Delay {
                for link in self.links.iter_mut() {
                    if minor == 1 {
                        link.step(dt, &mut self.nodes)?;
                    } else if link.is_non_linear() {
                        link.minor_step(dt, minor, &mut self.nodes)?;
                    }
                    let core = link.core_mut();
                    if core.needs_admittance_update {
                        core.needs_admittance_update = false;
                        self.rebuild = true;
                    }
                }

                if self.worst_case_timing {
                    self.rebuild = true;
                }

                match self.build_and_solve_system(dt) {
                    Ok(()) => {}
                    Err(SolverError::OutOfBounds { .. }) => {
                        network_converged = false;
                        self.step_log.record_step_result(
                            self.metrics.last_decomposition,
                            StepResult::DecompLimit,
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                }
                self.override_potential();
                self.output_potential_vector();
            }

            if !self.linear_network && self.solver_mode == SolverMode::Normal {
                if result == SolutionResult::Delay || self.check_system_convergence() {
                    converged_step += 1;
                }

                result = self.confirm_solution_acceptance(converged_step, minor);

                if result == SolutionResult::Reject {
                    // Kick the whole network back to the previous minor
                    // step and let the rejecting links adjust.
                    self.p.copy_from(&self.p_minor);
                    self.output_potential_vector();
                    self.reset_links_to_minor_step(converged_step, minor);
                    converged_step = 0;
                } else {
                    self.p_minor.copy_from(&self.p);
                    if result == SolutionResult::Confirm && converged_step > 0 {
                        network_converged = true;
                        let wct_satisfied = self.metrics.last_decomposition
                            >= self.config.decomposition_limit;
                        if !self.worst_case_timing || wct_satisfied {
                            self.step_log.record_step_result(
                                self.metrics.last_decomposition,
                                StepResult::Success,
                            );
                            break;
                        }
                    }
                }
            }

            let outcome = match result {
                SolutionResult::Confirm => StepResult::Confirm,
                SolutionResult::Delay => StepResult::Delay,
                SolutionResult::Reject => StepResult::Reject,
            };
            self.step_log
                .record_step_result(self.metrics.last_decomposition, outcome);
            minor += 1;
        }

        self.metrics.last_converged_step = converged_step;
        Ok(network_converged)
    }

    /// Build the source vector (always) and the admittance matrix (when
    /// flagged), then decompose and solve per the current modes.
    fn build_and_solve_system(&mut self, dt: f64) -> SolverResult<()> {
        self.build_source_vector();

        let mut need_decomposition = false;
        if self.rebuild || self.sor_active {
            self.build_admittance_matrix();
            if self.island_mode != IslandMode::Off {
                self.build_islands();
            }
            self.condition_admittance_matrix();
            need_decomposition = true;
            self.rebuild = false;
        }

        // Attempt SOR first when active; on failure revert the potential
        // vector and fall through to the direct path.
        self.metrics.sor_last_iteration = None;
        if self.sor_active && self.solver_mode == SolverMode::Normal {
            let iterations = sor::solve(
                &mut self.p,
                &self.a,
                &self.b,
                self.network_size,
                self.sor_weight,
                self.sor_max_iter,
                self.sor_tolerance,
            );
            match iterations {
                Some(count) => self.metrics.sor_last_iteration = Some(count),
                None => {
                    self.p.copy_from(&self.p_minor);
                    self.metrics.sor_fail_count += 1;
                    self.post(
                        EventLevel::Warning,
                        "SOR failed to converge, reverting to Cholesky this step",
                    );
                }
            }
        }

        if self.metrics.sor_last_iteration.is_none() {
            if need_decomposition && self.solver_mode == SolverMode::Normal {
                if self.metrics.last_decomposition >= self.config.decomposition_limit {
                    return Err(SolverError::OutOfBounds {
                        what: "decomposition limit exceeded".into(),
                    });
                }
                self.metrics.last_decomposition += 1;
                self.metrics.decomposition_count += 1;
                self.decompose()?;
            }

            // The solution is only computed in NORMAL mode: DUMMY links
            // own their potential, SLAVE receives it externally.
            if self.solver_mode == SolverMode::Normal {
                self.perturb_network_capacitances()?;
                self.solve_system()?;
                self.clean_potential_vector();
                self.compute_network_capacitances(dt);
            }
        }
        Ok(())
    }

    /// Decompose the admittance matrix, per island when island solving is
    /// active. Islands of one node are trivially solved as b/A.
    fn decompose(&mut self) -> SolverResult<()> {
        let timer = Timer::start();
        let outcome = if self.island_mode == IslandMode::Solve {
            self.decompose_islands()
        } else {
            cholesky::decompose(&mut self.a, self.network_size)
        };
        self.solve_time_working += timer.elapsed();
        outcome
    }

    fn decompose_islands(&mut self) -> SolverResult<()> {
        for island in 0..self.islands.vectors().len() {
            let nodes = self.islands.vectors()[island].clone();
            let n = nodes.len();
            if n < 2 {
                continue;
            }
            for (i, &row) in nodes.iter().enumerate() {
                for (j, &col) in nodes.iter().enumerate() {
                    self.island_a[(i, j)] = self.a[(row, col)];
                }
            }
            cholesky::decompose(&mut self.island_a, n).map_err(|e| SolverError::Numerical {
                what: format!("{e} in island {island}"),
            })?;
            for (i, &row) in nodes.iter().enumerate() {
                for (j, &col) in nodes.iter().enumerate() {
                    self.a[(row, col)] = self.island_a[(i, j)];
                }
            }
        }
        Ok(())
    }

    /// Triangular solve of the factored system into the potential vector.
    /// Cross-island entries are zero, so the scattered per-island factors
    /// solve correctly as one full system.
    fn solve_system(&mut self) -> SolverResult<()> {
        let timer = Timer::start();
        let outcome = cholesky::solve(&self.a, &self.b, &mut self.p, self.network_size);
        self.solve_time_working += timer.elapsed();
        outcome
    }

    fn build_source_vector(&mut self) {
        self.b.fill(0.0);
        for link in &self.links {
            let core = link.core();
            for (port, &node) in core.node_map.iter().enumerate() {
                // The ground node is not in the system.
                if node < self.network_size {
                    self.b[node] += core.source[port];
                }
            }
        }
    }

    /// Accumulate each link's compressed admittance entries through its
    /// map. Out-of-range targets (ground, spare slots, bad link code)
    /// are dropped.
    fn build_admittance_matrix(&mut self) {
        self.a.fill(0.0);
        let n = self.network_size;
        let matrix_size = n * n;
        for link in &self.links {
            let map = &link.core().admittance;
            for (slot, target) in map.targets.iter().enumerate() {
                if let Some(position) = target {
                    if *position < matrix_size {
                        self.a[(position / n, position % n)] += map.values[slot];
                    }
                }
            }
        }
    }

    /// Add a phantom leak to ground on every non-capacitive isolated row.
    /// Such rows make the matrix singular; the leak costs a negligible
    /// offset of the isolated node toward zero potential.
    fn condition_admittance_matrix(&mut self) {
        for row in 0..self.network_size {
            let mut row_sum = 0.0;
            for col in 0..self.network_size {
                row_sum += self.a[(row, col)];
            }
            if row_sum.abs() < f64::EPSILON {
                let diagonal = self.a[(row, row)];
                self.a[(row, row)] += diagonal.max(f64::EPSILON) * 1.0e-15;
            }
        }
    }

    fn build_islands(&mut self) {
        self.islands = Islands::build(&self.a, self.network_size);
        self.metrics.island_count = self.islands.count();
        self.metrics.island_max_size = self.islands.max_size();
        for node in 0..self.network_size {
            let island = self.islands.island_of(node).clone();
            self.nodes[node].core_mut().set_island(Some(island));
        }
    }

    /// First half of the network-capacitance probe: for every requesting
    /// node, perturb its source term, solve on the current factors, and
    /// stash the perturbed potentials.
    fn perturb_network_capacitances(&mut self) -> SolverResult<()> {
        for node in 0..self.network_size {
            let flux = self.nodes[node].core().network_capacitance_request();
            if flux > f64::EPSILON {
                let saved = self.b[node];
                self.b[node] += flux;
                self.solve_system()?;
                self.b[node] = saved;

                let core = self.nodes[node].core_mut();
                core.set_network_capacitance(self.p[node]);
                core.netcap_delta_potential_mut()
                    .copy_from_slice(self.p.as_slice());
            } else {
                self.nodes[node].core_mut().set_network_capacitance(0.0);
            }
        }
        Ok(())
    }

    /// Second half: compare the stashed perturbed potential against the
    /// nominal solution and convert the delta into a capacitance.
    fn compute_network_capacitances(&mut self, dt: f64) {
        for node in 0..self.network_size {
            let flux = self.nodes[node].core().network_capacitance_request();
            if flux > f64::EPSILON {
                let core = self.nodes[node].core_mut();
                let delta = (core.network_capacitance() - self.p[node]).abs();
                if delta > f64::EPSILON {
                    core.set_network_capacitance(dt * flux / delta);
                } else {
                    core.set_network_capacitance(0.0);
                }
                for (value, nominal) in core
                    .netcap_delta_potential_mut()
                    .iter_mut()
                    .zip(self.p.iter())
                {
                    *value -= nominal;
                }
                core.set_network_capacitance_request(0.0);
            }
        }
    }

    /// Overwrite solved potentials: the whole vector in SLAVE mode, or
    /// individual link-port overrides in NORMAL mode. Ground is never
    /// overridden.
    fn override_potential(&mut self) {
        match self.solver_mode {
            SolverMode::Slave => {
                self.p.copy_from(&self.slave_potential);
                self.p_minor.copy_from(&self.slave_potential);
            }
            SolverMode::Normal => {
                for link in &self.links {
                    let core = link.core();
                    for (port, &node) in core.node_map.iter().enumerate() {
                        if core.overrides[port] && node < self.network_size {
                            self.p[node] = core.potentials[port];
                        }
                    }
                }
            }
            SolverMode::Dummy => {}
        }
    }

    /// Publish the potential vector to nodes and link ports. In DUMMY
    /// mode links own their potential, so nothing is written.
    fn output_potential_vector(&mut self) {
        if self.solver_mode == SolverMode::Dummy {
            return;
        }
        for node in 0..self.network_size {
            let potential = self.p[node];
            self.nodes[node].core_mut().set_potential(potential);
        }
        self.nodes[self.network_size].core_mut().set_potential(0.0);

        for link in self.links.iter_mut() {
            let core = link.core_mut();
            for port in 0..core.num_ports() {
                let node = core.node_map[port];
                core.potentials[port] = if node < self.network_size {
                    self.p[node]
                } else {
                    0.0
                };
            }
        }
    }

    /// Per-node convergence: every node's potential delta from the
    /// previous minor step must be within tolerance.
    fn check_system_convergence(&mut self) -> bool {
        let mut converged = true;
        for node in 0..self.network_size {
            let delta = (self.p_minor[node] - self.p[node]).abs();
            self.nodes_convergence[node] = delta;
            if delta > self.config.convergence_tolerance {
                converged = false;
            }
        }
        converged
    }

    /// Poll every non-linear link. Any rejection wins; otherwise any
    /// delay wins, except that links may not delay before the network
    /// has converged at least once.
    fn confirm_solution_acceptance(
        &mut self,
        converged_step: usize,
        absolute_step: usize,
    ) -> SolutionResult {
        let mut result = SolutionResult::Confirm;
        for (index, link) in self.links.iter_mut().enumerate() {
            if !link.is_non_linear() {
                continue;
            }
            let mut link_result =
                link.confirm_solution_acceptable(converged_step, absolute_step, &self.nodes);
            self.step_log.record_link_result(index, link_result);
            if converged_step == 0 && link_result == SolutionResult::Delay {
                link_result = SolutionResult::Confirm;
            }

            if link_result == SolutionResult::Reject {
                result = SolutionResult::Reject;
            } else if link_result == SolutionResult::Delay && result != SolutionResult::Reject {
                result = SolutionResult::Delay;
            }
            self.links_convergence[index] = link_result;
        }
        result
    }

    /// Tell non-linear links to fall back to the previous minor step.
    /// A link that cannot reset is counted and reported, nothing more.
    fn reset_links_to_minor_step(&mut self, converged_step: usize, absolute_step: usize) {
        for index in 0..self.links.len() {
            let link = &mut self.links[index];
            if link.is_non_linear() && !link.reset_last_minor_step(converged_step, absolute_step) {
                self.metrics.link_reset_fail_count += 1;
                let name = link.core().name().to_string();
                self.post(
                    EventLevel::Warning,
                    &format!("{name} failed to reset to last minor step"),
                );
            }
        }
    }

    /// Snap solution values below machine epsilon to exactly zero so the
    /// network does not accumulate dirty zeroes.
    fn clean_potential_vector(&mut self) {
        for node in 0..self.network_size {
            if self.p[node].abs() < f64::EPSILON {
                self.p[node] = 0.0;
            }
        }
    }
}
