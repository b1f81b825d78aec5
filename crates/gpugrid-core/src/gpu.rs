//! GPU hardware catalog, node state and status snapshot types

use serde::{Deserialize, Serialize};

/// Hardware rating of one GPU model in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuTypeSpec {
    /// Model name (e.g., "A100")
    pub name: String,
    /// On-board memory in GB
    pub memory_gb: f64,
    /// Peak compute in TFLOPS
    pub tflops: f64,
    /// Rated power draw in watts
    pub power_w: f64,
}

impl GpuTypeSpec {
    pub fn new(name: &str, memory_gb: f64, tflops: f64, power_w: f64) -> Self {
        Self {
            name: name.to_string(),
            memory_gb,
            tflops,
            power_w,
        }
    }
}

/// Built-in hardware catalog
pub fn default_gpu_catalog() -> Vec<GpuTypeSpec> {
    vec![
        GpuTypeSpec::new("A100", 40.0, 312.0, 250.0),
        GpuTypeSpec::new("V100", 32.0, 125.0, 250.0),
        GpuTypeSpec::new("RTX4090", 24.0, 330.0, 450.0),
    ]
}

/// Node state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuState {
    /// Free for placement
    Idle,
    /// Running a task
    Busy,
    /// Over the thermal ceiling, not schedulable
    Throttled,
    /// Removed from service by fault injection
    Offline,
}

impl std::fmt::Display for GpuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuState::Idle => write!(f, "idle"),
            GpuState::Busy => write!(f, "busy"),
            GpuState::Throttled => write!(f, "throttled"),
            GpuState::Offline => write!(f, "offline"),
        }
    }
}

/// Simulated sensor readings of one node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Degrees Celsius
    pub temperature: f64,
    /// Watts
    pub power_usage: f64,
    /// GB
    pub memory_usage: f64,
    /// Percent
    pub utilization: f64,
}

impl Telemetry {
    /// Readings of a freshly started node
    pub fn initial(temperature: f64) -> Self {
        Self {
            temperature,
            power_usage: 0.0,
            memory_usage: 0.0,
            utilization: 0.0,
        }
    }

    /// Copy with every field rounded to two decimal places
    pub fn rounded(&self) -> Self {
        Self {
            temperature: round2(self.temperature),
            power_usage: round2(self.power_usage),
            memory_usage: round2(self.memory_usage),
            utilization: round2(self.utilization),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summary of the task occupying a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTask {
    pub task_id: String,
    pub duration: u32,
    pub memory_required: f64,
    /// Simulated time the task started
    pub started_at: f64,
}

/// Read-only snapshot of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: u32,
    pub gpu_type: String,
    pub state: GpuState,
    pub telemetry: Telemetry,
    pub current_task: Option<NodeTask>,
}

/// Snapshot of the whole grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridStatus {
    /// Simulated time of the snapshot
    pub timestamp: f64,
    pub nodes: Vec<NodeStatus>,
    pub available_nodes: usize,
    pub total_nodes: usize,
}

/// Grid snapshot plus scheduler counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub timestamp: f64,
    pub nodes: Vec<NodeStatus>,
    pub available_nodes: usize,
    pub total_nodes: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}
