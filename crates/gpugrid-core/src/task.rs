//! Task request, task record and completion outcome types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{GridError, GridResult};

/// Task priority. Stored and reported, not consulted by any placement policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(GridError::InvalidRequest(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the scheduler queue
    Pending,
    /// Placed on a node, completion not yet signalled
    Running,
    /// Ran for its full duration
    Completed,
    /// Interrupted before completion
    Failed,
}

impl TaskStatus {
    /// Whether the task has left the running map for good
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Admission limits applied to incoming task requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionLimits {
    /// Longest accepted duration in simulated seconds
    pub max_duration_secs: u32,
    /// Largest accepted memory requirement in GB
    pub max_memory_gb: f64,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: 300,
            max_memory_gb: 40.0,
        }
    }
}

/// A compute task as submitted by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Caller-supplied task identifier
    pub task_id: String,
    /// Simulated run time in seconds
    pub duration: u32,
    /// Memory requirement in GB
    pub memory_required: f64,
    /// Advisory priority
    #[serde(default)]
    pub priority: TaskPriority,
    /// Opaque caller metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TaskRequest {
    /// Create a request with medium priority and no metadata
    pub fn new(task_id: impl Into<String>, duration: u32, memory_required: f64) -> Self {
        Self {
            task_id: task_id.into(),
            duration,
            memory_required,
            priority: TaskPriority::default(),
            metadata: None,
        }
    }

    /// Check the request against admission limits
    pub fn validate(&self, limits: &AdmissionLimits) -> GridResult<()> {
        if self.task_id.trim().is_empty() {
            return Err(GridError::InvalidRequest(
                "task_id must not be empty".to_string(),
            ));
        }
        if self.duration == 0 || self.duration > limits.max_duration_secs {
            return Err(GridError::InvalidRequest(format!(
                "duration must be in 1..={} seconds, got {}",
                limits.max_duration_secs, self.duration
            )));
        }
        if !(1.0..=limits.max_memory_gb).contains(&self.memory_required) {
            return Err(GridError::InvalidRequest(format!(
                "memory_required must be in 1..={} GB, got {}",
                limits.max_memory_gb, self.memory_required
            )));
        }
        Ok(())
    }
}

/// Scheduler-side record of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    /// Node the task was placed on
    pub assigned_node: Option<u32>,
    /// Simulated time of placement
    pub start_time: Option<f64>,
    /// Simulated time of completion or interruption
    pub end_time: Option<f64>,
    pub request: TaskRequest,
    /// Wall-clock submission time
    pub submitted_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task from a request
    pub fn pending(request: TaskRequest) -> Self {
        Self {
            task_id: request.task_id.clone(),
            status: TaskStatus::Pending,
            assigned_node: None,
            start_time: None,
            end_time: None,
            request,
            submitted_at: Utc::now(),
        }
    }
}

/// Payload of a task completion signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub node_id: u32,
    /// Either `Completed` or `Failed`
    pub status: TaskStatus,
    /// Simulated time at which the signal fired
    pub finished_at: f64,
}
