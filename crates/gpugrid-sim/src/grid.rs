//! Grid of simulated GPU nodes sharing one clock

use gpugrid_core::{
    GpuTypeSpec, GridError, GridResult, GridStatus, SimulationConfig, TaskOutcome, TaskRequest,
    ThermalConfig,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use tracing::{debug, info};

use crate::clock::{Clock, SimEvent};
use crate::completion::CompletionHandle;
use crate::node::GpuNode;

/// Simulated seconds between telemetry updates
pub const TELEMETRY_PERIOD: f64 = 1.0;

/// The simulation context: clock, random source and the node collection.
pub struct GpuGrid {
    clock: Clock,
    rng: Pcg64,
    nodes: Vec<GpuNode>,
}

impl GpuGrid {
    /// Create a grid with hardware types drawn at random from the catalog
    pub fn new(config: &SimulationConfig) -> GridResult<Self> {
        if config.gpu_types.is_empty() {
            return Err(GridError::Config("gpu_types must not be empty".to_string()));
        }
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = Pcg64::seed_from_u64(seed);
        let specs: Vec<GpuTypeSpec> = (0..config.num_nodes)
            .filter_map(|_| config.gpu_types.choose(&mut rng).cloned())
            .collect();

        info!(
            nodes = specs.len(),
            seed = seed,
            "Grid initialized"
        );

        Ok(Self::build(specs, config.thermal, rng))
    }

    /// Create a grid with one node per given hardware type, in order
    pub fn with_specs(specs: Vec<GpuTypeSpec>, thermal: ThermalConfig, seed: u64) -> Self {
        Self::build(specs, thermal, Pcg64::seed_from_u64(seed))
    }

    fn build(specs: Vec<GpuTypeSpec>, thermal: ThermalConfig, rng: Pcg64) -> Self {
        let mut clock = Clock::new();
        let nodes = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                let node_id = i as u32;
                clock.schedule(0.0, SimEvent::TelemetryTick { node_id });
                GpuNode::new(node_id, spec, thermal)
            })
            .collect();
        Self { clock, rng, nodes }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn nodes(&self) -> &[GpuNode] {
        &self.nodes
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Idle nodes in node ID order
    pub fn get_available_nodes(&self) -> Vec<&GpuNode> {
        self.nodes.iter().filter(|n| n.is_available()).collect()
    }

    pub fn get_node_by_id(&self, node_id: u32) -> Option<&GpuNode> {
        self.nodes.get(node_id as usize)
    }

    /// Start a task on a node
    pub fn execute_task_on_node(
        &mut self,
        node_id: u32,
        request: TaskRequest,
    ) -> GridResult<CompletionHandle> {
        let node = self
            .nodes
            .get_mut(node_id as usize)
            .ok_or(GridError::NodeNotFound(node_id))?;
        node.execute(request, &mut self.clock)
    }

    /// Abort whatever runs on a node
    pub fn interrupt_node(&mut self, node_id: u32) -> GridResult<Option<TaskOutcome>> {
        let node = self
            .nodes
            .get_mut(node_id as usize)
            .ok_or(GridError::NodeNotFound(node_id))?;
        Ok(node.interrupt(&mut self.clock))
    }

    /// Fault injection: take a node out of service or bring it back
    pub fn set_offline(&mut self, node_id: u32, offline: bool) -> GridResult<Option<TaskOutcome>> {
        let node = self
            .nodes
            .get_mut(node_id as usize)
            .ok_or(GridError::NodeNotFound(node_id))?;
        Ok(node.set_offline(offline, &mut self.clock))
    }

    pub fn get_grid_status(&self) -> GridStatus {
        GridStatus {
            timestamp: self.clock.now(),
            nodes: self.nodes.iter().map(GpuNode::get_status).collect(),
            available_nodes: self.nodes.iter().filter(|n| n.is_available()).count(),
            total_nodes: self.nodes.len(),
        }
    }

    /// Fire every event due at or before `until`, then move the clock there.
    ///
    /// Returns the completion outcomes that fired.
    pub fn run_until(&mut self, until: f64) -> Vec<TaskOutcome> {
        let mut finished = Vec::new();
        while let Some(outcome) = self.step_until(until) {
            finished.extend(outcome);
        }
        self.clock.advance_to(until);
        finished
    }

    /// Fire the next event due at or before `until`.
    ///
    /// Returns `None` when no such event exists, otherwise the completion
    /// outcome it produced, if any.
    pub fn step_until(&mut self, until: f64) -> Option<Option<TaskOutcome>> {
        let (event_id, event) = self.clock.pop_until(until)?;
        let now = self.clock.now();
        match event {
            SimEvent::TelemetryTick { node_id } => {
                if let Some(node) = self.nodes.get_mut(node_id as usize) {
                    node.tick(&mut self.rng);
                    self.clock.schedule(TELEMETRY_PERIOD, event);
                }
                Some(None)
            }
            SimEvent::TaskFinished { node_id } => {
                let outcome = self
                    .nodes
                    .get_mut(node_id as usize)
                    .and_then(|node| node.finish(event_id, now));
                if outcome.is_none() {
                    debug!(node_id, "Completion event without a matching task");
                }
                Some(outcome)
            }
        }
    }
}
