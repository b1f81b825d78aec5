//! Control plane over the simulated grid
//!
//! `Cluster` is the single context object shared by the API and the
//! simulation driver. Grid and scheduler live behind one lock; every
//! operation holds it briefly and hands back owned snapshots.

use gpugrid_core::{
    AdmissionLimits, ClusterStatus, GridConfig, GridError, GridResult, NodeStatus, Task,
    TaskRequest,
};
use gpugrid_sim::GpuGrid;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::placement::policy_for;
use crate::scheduler::Scheduler;

struct ClusterState {
    grid: GpuGrid,
    scheduler: Scheduler,
    /// Simulated time of the next periodic scheduling pass
    next_pass_at: f64,
}

/// Simulated cluster: grid, scheduler and the scheduling cadence
pub struct Cluster {
    state: RwLock<ClusterState>,
    limits: AdmissionLimits,
    interval_secs: f64,
}

impl Cluster {
    /// Build the grid and scheduler described by the configuration
    pub fn new(config: &GridConfig) -> GridResult<Self> {
        config.validate()?;
        let grid = GpuGrid::new(&config.simulation)?;
        let scheduler = Scheduler::new(
            policy_for(
                config.scheduler.policy,
                config.simulation.thermal.throttle_celsius,
            ),
            config.scheduler.history_limit,
        );
        Ok(Self::from_parts(
            grid,
            scheduler,
            config.scheduler.admission_limits(),
            config.scheduler.interval_secs,
        ))
    }

    /// Assemble a cluster from pre-built parts
    pub fn from_parts(
        grid: GpuGrid,
        scheduler: Scheduler,
        limits: AdmissionLimits,
        interval_secs: f64,
    ) -> Self {
        let next_pass_at = grid.now() + interval_secs;
        info!(
            nodes = grid.total_nodes(),
            policy = scheduler.policy_name(),
            interval_secs = interval_secs,
            "Cluster initialized"
        );
        Self {
            state: RwLock::new(ClusterState {
                grid,
                scheduler,
                next_pass_at,
            }),
            limits,
            interval_secs,
        }
    }

    /// Admit a task into the pending queue
    pub async fn submit(&self, request: TaskRequest) -> GridResult<Task> {
        request.validate(&self.limits)?;

        let mut state = self.state.write().await;
        if state.scheduler.is_active(&request.task_id) {
            return Err(GridError::InvalidRequest(format!(
                "task {} is already pending or running",
                request.task_id
            )));
        }
        let task = state.scheduler.add_task(request);
        info!(
            task_id = %task.task_id,
            duration = task.request.duration,
            memory_required = task.request.memory_required,
            priority = %task.request.priority,
            "Task submitted"
        );
        Ok(task)
    }

    /// Pending and running tasks
    pub async fn list_tasks(&self) -> Vec<Task> {
        self.state.read().await.scheduler.tasks()
    }

    /// Retained completed and failed tasks
    pub async fn finished_tasks(&self) -> Vec<Task> {
        self.state.read().await.scheduler.finished_tasks()
    }

    pub async fn get_task(&self, task_id: &str) -> GridResult<Task> {
        self.state
            .read()
            .await
            .scheduler
            .get(task_id)
            .ok_or_else(|| GridError::TaskNotFound(task_id.to_string()))
    }

    /// Remove a pending task
    pub async fn cancel_task(&self, task_id: &str) -> GridResult<Task> {
        self.state.write().await.scheduler.cancel(task_id)
    }

    pub async fn cluster_status(&self) -> ClusterStatus {
        let state = self.state.read().await;
        let grid = state.grid.get_grid_status();
        ClusterStatus {
            timestamp: grid.timestamp,
            nodes: grid.nodes,
            available_nodes: grid.available_nodes,
            total_nodes: grid.total_nodes,
            pending_tasks: state.scheduler.pending_count(),
            running_tasks: state.scheduler.running_count(),
            completed_tasks: state.scheduler.completed_count(),
            failed_tasks: state.scheduler.failed_count(),
        }
    }

    pub async fn list_nodes(&self) -> Vec<NodeStatus> {
        self.state.read().await.grid.get_grid_status().nodes
    }

    pub async fn get_node(&self, node_id: u32) -> GridResult<NodeStatus> {
        self.state
            .read()
            .await
            .grid
            .get_node_by_id(node_id)
            .map(|n| n.get_status())
            .ok_or(GridError::NodeNotFound(node_id))
    }

    /// Run one scheduling pass now
    pub async fn trigger_schedule(&self) -> Vec<Task> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = state.grid.now();
        state.scheduler.reap(now);
        state.scheduler.schedule(&mut state.grid)
    }

    /// Advance simulated time by `dt` seconds, running a scheduling pass at
    /// every interval boundary crossed. Returns the tasks placed on the way.
    pub async fn advance(&self, dt: f64) -> Vec<Task> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let target = state.grid.now() + dt.max(0.0);
        let mut placed = Vec::new();

        while state.next_pass_at <= target {
            let at = state.next_pass_at;
            state.grid.run_until(at);
            state.scheduler.reap(at);
            let batch = state.scheduler.schedule(&mut state.grid);
            if !batch.is_empty() {
                debug!(time = at, placed = batch.len(), "Periodic scheduling pass");
            }
            placed.extend(batch);
            state.next_pass_at = at + self.interval_secs;
        }

        state.grid.run_until(target);
        state.scheduler.reap(target);
        placed
    }

    /// Current simulated time
    pub async fn now(&self) -> f64 {
        self.state.read().await.grid.now()
    }

    /// Fault injection: take a node offline or bring it back. A task running
    /// on a node going offline fails.
    pub async fn set_node_offline(&self, node_id: u32, offline: bool) -> GridResult<NodeStatus> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.grid.set_offline(node_id, offline)?;
        let now = state.grid.now();
        state.scheduler.reap(now);
        state
            .grid
            .get_node_by_id(node_id)
            .map(|n| n.get_status())
            .ok_or(GridError::NodeNotFound(node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpugrid_core::{GpuState, PolicyKind, TaskStatus};

    fn config(nodes: usize, policy: PolicyKind) -> GridConfig {
        let mut config = GridConfig::default();
        config.simulation.num_nodes = nodes;
        config.simulation.seed = Some(5);
        config.scheduler.policy = policy;
        config
    }

    #[tokio::test]
    async fn test_submit_and_get() {
        let cluster = Cluster::new(&config(2, PolicyKind::Fifo)).unwrap();
        let task = cluster
            .submit(TaskRequest::new("t1", 10, 4.0))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let fetched = cluster.get_task("t1").await.unwrap();
        assert_eq!(fetched.task_id, "t1");
        assert!(matches!(
            cluster.get_task("nope").await,
            Err(GridError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_and_duplicate() {
        let cluster = Cluster::new(&config(2, PolicyKind::Fifo)).unwrap();
        assert!(matches!(
            cluster.submit(TaskRequest::new("t1", 0, 4.0)).await,
            Err(GridError::InvalidRequest(_))
        ));
        assert!(cluster
            .submit(TaskRequest::new("t1", 301, 4.0))
            .await
            .is_err());

        cluster
            .submit(TaskRequest::new("t1", 10, 4.0))
            .await
            .unwrap();
        assert!(matches!(
            cluster.submit(TaskRequest::new("t1", 10, 4.0)).await,
            Err(GridError::InvalidRequest(_))
        ));
        assert_eq!(cluster.list_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_task_lifecycle_is_clock_driven() {
        let cluster = Cluster::new(&config(2, PolicyKind::Fifo)).unwrap();
        cluster
            .submit(TaskRequest::new("t1", 10, 4.0))
            .await
            .unwrap();

        let placed = cluster.trigger_schedule().await;
        assert_eq!(placed.len(), 1);
        assert_eq!(cluster.get_task("t1").await.unwrap().status, TaskStatus::Running);

        cluster.advance(9.0).await;
        assert_eq!(cluster.get_task("t1").await.unwrap().status, TaskStatus::Running);

        cluster.advance(1.0).await;
        let task = cluster.get_task("t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.start_time, Some(0.0));
        assert_eq!(task.end_time, Some(10.0));
        assert_eq!(cluster.now().await, 10.0);
        assert!(cluster.list_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_periodic_pass_places_queued_tasks() {
        let cluster = Cluster::new(&config(2, PolicyKind::Scored)).unwrap();
        cluster
            .submit(TaskRequest::new("t1", 30, 4.0))
            .await
            .unwrap();

        assert!(cluster.advance(4.0).await.is_empty());
        assert_eq!(cluster.get_task("t1").await.unwrap().status, TaskStatus::Pending);

        let placed = cluster.advance(1.0).await;
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].start_time, Some(5.0));
    }

    #[tokio::test]
    async fn test_cluster_status_counts() {
        let cluster = Cluster::new(&config(1, PolicyKind::Fifo)).unwrap();
        cluster
            .submit(TaskRequest::new("a", 5, 4.0))
            .await
            .unwrap();
        cluster
            .submit(TaskRequest::new("b", 5, 4.0))
            .await
            .unwrap();
        cluster.trigger_schedule().await;

        let status = cluster.cluster_status().await;
        assert_eq!(status.total_nodes, 1);
        assert_eq!(status.available_nodes, 0);
        assert_eq!(status.pending_tasks, 1);
        assert_eq!(status.running_tasks, 1);

        // "a" ends at 5, the pass at 5 places "b", which ends at 10.
        cluster.advance(10.0).await;
        let status = cluster.cluster_status().await;
        assert_eq!(status.completed_tasks, 2);
        assert_eq!(status.pending_tasks, 0);
        assert_eq!(status.running_tasks, 0);
        assert_eq!(status.timestamp, 10.0);
    }

    #[tokio::test]
    async fn test_get_node() {
        let cluster = Cluster::new(&config(3, PolicyKind::Fifo)).unwrap();
        assert_eq!(cluster.get_node(2).await.unwrap().node_id, 2);
        assert!(matches!(
            cluster.get_node(3).await,
            Err(GridError::NodeNotFound(3))
        ));
        assert_eq!(cluster.list_nodes().await.len(), 3);
    }

    #[tokio::test]
    async fn test_offline_node_fails_running_task() {
        let cluster = Cluster::new(&config(1, PolicyKind::Fifo)).unwrap();
        cluster
            .submit(TaskRequest::new("t1", 50, 4.0))
            .await
            .unwrap();
        cluster.trigger_schedule().await;
        cluster.advance(2.0).await;

        let node = cluster.set_node_offline(0, true).await.unwrap();
        assert_eq!(node.state, GpuState::Offline);
        let task = cluster.get_task("t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.end_time, Some(2.0));

        cluster
            .submit(TaskRequest::new("t2", 5, 4.0))
            .await
            .unwrap();
        assert!(cluster.trigger_schedule().await.is_empty());

        cluster.set_node_offline(0, false).await.unwrap();
        assert_eq!(cluster.trigger_schedule().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let cluster = Cluster::new(&config(1, PolicyKind::Fifo)).unwrap();
        cluster
            .submit(TaskRequest::new("t1", 5, 4.0))
            .await
            .unwrap();
        let task = cluster.cancel_task("t1").await.unwrap();
        assert_eq!(task.task_id, "t1");
        assert!(cluster.trigger_schedule().await.is_empty());
    }
}
