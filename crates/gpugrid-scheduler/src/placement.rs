//! Task placement policies

use gpugrid_core::{NodeStatus, PolicyKind, Task};

/// Strategy for choosing a node for a pending task
pub trait PlacementPolicy: Send + Sync {
    /// Pick one of the candidate nodes, or none.
    ///
    /// Candidates are idle nodes in ascending node ID order.
    fn select(&self, task: &Task, candidates: &[NodeStatus]) -> Option<u32>;

    /// Policy name for logs and status output
    fn name(&self) -> &'static str;
}

/// Build the policy selected in configuration
pub fn policy_for(kind: PolicyKind, throttle_celsius: f64) -> Box<dyn PlacementPolicy> {
    match kind {
        PolicyKind::Fifo => Box::new(FifoPolicy),
        PolicyKind::Scored => Box::new(ScoredPolicy::new(throttle_celsius)),
    }
}

/// First available node, lowest ID first
pub struct FifoPolicy;

impl PlacementPolicy for FifoPolicy {
    fn select(&self, _task: &Task, candidates: &[NodeStatus]) -> Option<u32> {
        candidates.iter().map(|n| n.node_id).min()
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}

const TEMPERATURE_WEIGHT: f64 = 0.4;
const MEMORY_WEIGHT: f64 = 0.3;
const UTILIZATION_WEIGHT: f64 = 0.3;
/// Memory fit is not computed against the node's catalog entry; every
/// candidate gets the full memory term.
const MEMORY_SUITABILITY: f64 = 1.0;

/// Telemetry-aware placement: prefer cool, lightly used nodes
pub struct ScoredPolicy {
    /// Temperature at which the temperature term reaches zero
    reference_celsius: f64,
}

impl ScoredPolicy {
    pub fn new(reference_celsius: f64) -> Self {
        Self { reference_celsius }
    }

    /// Score of one candidate; higher is better
    pub fn score(&self, node: &NodeStatus) -> f64 {
        let t = &node.telemetry;
        TEMPERATURE_WEIGHT * (self.reference_celsius - t.temperature) / self.reference_celsius
            + MEMORY_WEIGHT * MEMORY_SUITABILITY
            + UTILIZATION_WEIGHT * (100.0 - t.utilization) / 100.0
    }
}

impl Default for ScoredPolicy {
    fn default() -> Self {
        Self::new(85.0)
    }
}

impl PlacementPolicy for ScoredPolicy {
    fn select(&self, _task: &Task, candidates: &[NodeStatus]) -> Option<u32> {
        let mut ordered: Vec<&NodeStatus> = candidates.iter().collect();
        ordered.sort_by_key(|n| n.node_id);

        let mut best: Option<(f64, u32)> = None;
        for node in ordered {
            let score = self.score(node);
            // Strictly greater keeps the lowest ID on ties.
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, node.node_id));
            }
        }
        best.map(|(_, node_id)| node_id)
    }

    fn name(&self) -> &'static str {
        "scored"
    }
}
