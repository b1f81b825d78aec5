//! Task queue and scheduling passes

use gpugrid_core::{GridError, GridResult, NodeStatus, Task, TaskRequest, TaskStatus};
use gpugrid_sim::{CompletionHandle, GpuGrid};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

use crate::placement::PlacementPolicy;

struct RunningTask {
    task: Task,
    handle: CompletionHandle,
}

/// Scheduler owns the pending queue, the running map and finished history
pub struct Scheduler {
    /// Placement policy
    policy: Box<dyn PlacementPolicy>,
    /// Pending tasks in arrival order
    pending: VecDeque<Task>,
    /// Running tasks indexed by ID
    running: HashMap<String, RunningTask>,
    /// Most recently finished tasks, oldest first
    finished: VecDeque<Task>,
    /// Capacity of `finished`
    history_limit: usize,
    completed_total: usize,
    failed_total: usize,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(policy: Box<dyn PlacementPolicy>, history_limit: usize) -> Self {
        info!(
            policy = policy.name(),
            history_limit = history_limit,
            "Scheduler initialized"
        );

        Self {
            policy,
            pending: VecDeque::new(),
            running: HashMap::new(),
            finished: VecDeque::new(),
            history_limit,
            completed_total: 0,
            failed_total: 0,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Append a pending task to the tail of the queue
    pub fn add_task(&mut self, request: TaskRequest) -> Task {
        let task = Task::pending(request);
        debug!(task_id = %task.task_id, "Task queued");
        self.pending.push_back(task.clone());
        task
    }

    /// Whether a task with this ID is pending or running
    pub fn is_active(&self, task_id: &str) -> bool {
        self.running.contains_key(task_id) || self.pending.iter().any(|t| t.task_id == task_id)
    }

    /// Try to place every pending task once, in queue order.
    ///
    /// Each decision sees the grid as left by the previous one. Tasks that
    /// find no node, or whose node refuses them, stay pending in place.
    pub fn schedule(&mut self, grid: &mut GpuGrid) -> Vec<Task> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut placed = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.pending.len());

        while let Some(mut task) = self.pending.pop_front() {
            let candidates: Vec<NodeStatus> = grid
                .get_available_nodes()
                .iter()
                .map(|n| n.get_status())
                .collect();
            if candidates.is_empty() {
                remaining.push_back(task);
                remaining.extend(self.pending.drain(..));
                break;
            }

            let Some(node_id) = self.policy.select(&task, &candidates) else {
                remaining.push_back(task);
                continue;
            };

            match grid.execute_task_on_node(node_id, task.request.clone()) {
                Ok(handle) => {
                    task.status = TaskStatus::Running;
                    task.assigned_node = Some(node_id);
                    task.start_time = Some(grid.now());
                    info!(
                        task_id = %task.task_id,
                        node_id = node_id,
                        policy = self.policy.name(),
                        "Task placed"
                    );
                    placed.push(task.clone());
                    self.running
                        .insert(task.task_id.clone(), RunningTask { task, handle });
                }
                Err(e) => {
                    warn!(
                        task_id = %task.task_id,
                        node_id = node_id,
                        error = %e,
                        "Failed to schedule task, keeping it pending"
                    );
                    remaining.push_back(task);
                }
            }
        }

        self.pending = remaining;
        placed
    }

    /// Collect completion signals and move finished tasks to history.
    ///
    /// `now` stamps tasks whose node vanished without signalling.
    pub fn reap(&mut self, now: f64) -> Vec<Task> {
        let mut outcomes = Vec::new();
        for (task_id, entry) in self.running.iter_mut() {
            match entry.handle.poll_outcome() {
                Ok(Some(outcome)) => {
                    outcomes.push((task_id.clone(), outcome.status, outcome.finished_at))
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Lost completion signal");
                    outcomes.push((task_id.clone(), TaskStatus::Failed, now));
                }
            }
        }

        let mut done: Vec<Task> = outcomes
            .into_iter()
            .filter_map(|(task_id, status, finished_at)| {
                let mut task = self.running.remove(&task_id)?.task;
                task.status = status;
                task.end_time = Some(finished_at);
                Some(task)
            })
            .collect();
        done.sort_by(|a, b| {
            a.end_time
                .unwrap_or_default()
                .total_cmp(&b.end_time.unwrap_or_default())
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        for task in &done {
            self.record_finished(task.clone());
        }
        done
    }

    fn record_finished(&mut self, task: Task) {
        match task.status {
            TaskStatus::Completed => self.completed_total += 1,
            _ => self.failed_total += 1,
        }
        self.finished.push_back(task);
        while self.finished.len() > self.history_limit {
            self.finished.pop_front();
        }
    }

    /// Remove a pending task from the queue
    pub fn cancel(&mut self, task_id: &str) -> GridResult<Task> {
        if let Some(pos) = self.pending.iter().position(|t| t.task_id == task_id) {
            if let Some(task) = self.pending.remove(pos) {
                info!(task_id = %task_id, "Pending task cancelled");
                return Ok(task);
            }
        }
        if self.running.contains_key(task_id) {
            return Err(GridError::TaskNotCancellable(format!(
                "{} is running",
                task_id
            )));
        }
        if self.finished.iter().any(|t| t.task_id == task_id) {
            return Err(GridError::TaskNotCancellable(format!(
                "{} has finished",
                task_id
            )));
        }
        Err(GridError::TaskNotFound(task_id.to_string()))
    }

    /// Look up a task in the queue, the running map or history
    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.pending
            .iter()
            .find(|t| t.task_id == task_id)
            .or_else(|| self.running.get(task_id).map(|r| &r.task))
            .or_else(|| self.finished.iter().rev().find(|t| t.task_id == task_id))
            .cloned()
    }

    /// Pending tasks in queue order followed by running tasks by start time
    pub fn tasks(&self) -> Vec<Task> {
        let mut running: Vec<Task> = self.running.values().map(|r| r.task.clone()).collect();
        running.sort_by(|a, b| {
            a.start_time
                .unwrap_or_default()
                .total_cmp(&b.start_time.unwrap_or_default())
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        self.pending.iter().cloned().chain(running).collect()
    }

    /// Retained finished tasks, oldest first
    pub fn finished_tasks(&self) -> Vec<Task> {
        self.finished.iter().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Completed tasks since start, including those evicted from history
    pub fn completed_count(&self) -> usize {
        self.completed_total
    }

    /// Failed tasks since start, including those evicted from history
    pub fn failed_count(&self) -> usize {
        self.failed_total
    }
}
