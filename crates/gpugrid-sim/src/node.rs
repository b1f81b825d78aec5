//! Simulated GPU node: state machine and telemetry

use gpugrid_core::{
    GpuState, GpuTypeSpec, GridError, GridResult, NodeStatus, NodeTask, TaskOutcome, TaskRequest,
    TaskStatus, Telemetry, ThermalConfig,
};
use rand::Rng;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::clock::{Clock, EventId, SimEvent};
use crate::completion::CompletionHandle;

/// Per-tick temperature rise while busy
const HEATING_RATE: std::ops::Range<f64> = 0.5..2.0;
/// Per-tick temperature drop while not busy
const COOLING_RATE: std::ops::Range<f64> = 0.1..0.5;
const BUSY_POWER_W: std::ops::Range<f64> = 200.0..300.0;
const IDLE_POWER_W: std::ops::Range<f64> = 10.0..30.0;
const BUSY_UTILIZATION: std::ops::Range<f64> = 80.0..99.0;

struct ActiveTask {
    request: TaskRequest,
    started_at: f64,
    completion_event: EventId,
    signal: oneshot::Sender<TaskOutcome>,
}

/// One simulated accelerator
pub struct GpuNode {
    node_id: u32,
    spec: GpuTypeSpec,
    thermal: ThermalConfig,
    state: GpuState,
    telemetry: Telemetry,
    current: Option<ActiveTask>,
}

impl GpuNode {
    pub fn new(node_id: u32, spec: GpuTypeSpec, thermal: ThermalConfig) -> Self {
        Self {
            node_id,
            spec,
            thermal,
            state: GpuState::Idle,
            telemetry: Telemetry::initial(thermal.initial_celsius),
            current: None,
        }
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn spec(&self) -> &GpuTypeSpec {
        &self.spec
    }

    pub fn state(&self) -> GpuState {
        self.state
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    /// ID of the task occupying the node
    pub fn current_task_id(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.request.task_id.as_str())
    }

    /// Only idle nodes accept work
    pub fn is_available(&self) -> bool {
        self.state == GpuState::Idle
    }

    /// One telemetry update, followed by the thermal overlay
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let thermal = self.thermal;
        if self.state == GpuState::Busy {
            self.telemetry.temperature =
                (self.telemetry.temperature + rng.gen_range(HEATING_RATE)).min(thermal.max_celsius);
            self.telemetry.power_usage = rng.gen_range(BUSY_POWER_W);
            self.telemetry.utilization = rng.gen_range(BUSY_UTILIZATION);
            self.telemetry.memory_usage = self
                .current
                .as_ref()
                .map_or(0.0, |t| t.request.memory_required.min(self.spec.memory_gb));
        } else {
            self.telemetry.temperature = (self.telemetry.temperature
                - rng.gen_range(COOLING_RATE))
            .max(thermal.ambient_celsius);
            self.telemetry.power_usage = rng.gen_range(IDLE_POWER_W);
            self.telemetry.utilization = 0.0;
            self.telemetry.memory_usage = 0.0;
        }

        if self.state == GpuState::Offline {
            return;
        }

        if self.telemetry.temperature > thermal.throttle_celsius {
            if self.state != GpuState::Throttled {
                warn!(
                    node_id = self.node_id,
                    temperature = self.telemetry.temperature,
                    task_id = ?self.current_task_id(),
                    "Node throttled"
                );
            }
            self.state = GpuState::Throttled;
        } else if self.state == GpuState::Throttled
            && self.telemetry.temperature < thermal.recovery_celsius
        {
            // A task held through throttling resumes.
            self.state = if self.current.is_some() {
                GpuState::Busy
            } else {
                GpuState::Idle
            };
            info!(
                node_id = self.node_id,
                temperature = self.telemetry.temperature,
                state = %self.state,
                "Node recovered from throttling"
            );
        }
    }

    /// Start a task. Fails with `ResourceUnavailable` unless the node is idle.
    pub fn execute(
        &mut self,
        request: TaskRequest,
        clock: &mut Clock,
    ) -> GridResult<CompletionHandle> {
        if self.state != GpuState::Idle {
            return Err(GridError::ResourceUnavailable {
                node_id: self.node_id,
                state: self.state.to_string(),
            });
        }

        let (signal, handle) = CompletionHandle::new(request.task_id.clone(), self.node_id);
        let completion_event = clock.schedule(
            f64::from(request.duration),
            SimEvent::TaskFinished {
                node_id: self.node_id,
            },
        );

        info!(
            node_id = self.node_id,
            task_id = %request.task_id,
            duration = request.duration,
            "Task started"
        );

        self.current = Some(ActiveTask {
            request,
            started_at: clock.now(),
            completion_event,
            signal,
        });
        self.state = GpuState::Busy;

        Ok(handle)
    }

    /// Handle the completion event with the given ID. Stale events are ignored.
    pub fn finish(&mut self, event_id: EventId, now: f64) -> Option<TaskOutcome> {
        if self.current.as_ref()?.completion_event != event_id {
            debug!(node_id = self.node_id, event_id, "Ignoring stale completion event");
            return None;
        }
        let task = self.current.take()?;
        if self.state == GpuState::Busy {
            self.state = GpuState::Idle;
        }
        Some(self.signal(task, TaskStatus::Completed, now))
    }

    /// Abort the running task, if any, signalling failure
    pub fn interrupt(&mut self, clock: &mut Clock) -> Option<TaskOutcome> {
        let task = self.current.take()?;
        clock.cancel(task.completion_event);
        if self.state == GpuState::Busy {
            self.state = GpuState::Idle;
        }
        warn!(
            node_id = self.node_id,
            task_id = %task.request.task_id,
            "Task interrupted"
        );
        Some(self.signal(task, TaskStatus::Failed, clock.now()))
    }

    /// Take the node out of service or bring it back.
    ///
    /// Going offline interrupts the running task. A node coming back online
    /// starts idle; the next tick applies the thermal overlay.
    pub fn set_offline(&mut self, offline: bool, clock: &mut Clock) -> Option<TaskOutcome> {
        if offline {
            let outcome = self.interrupt(clock);
            self.state = GpuState::Offline;
            info!(node_id = self.node_id, "Node taken offline");
            outcome
        } else {
            if self.state == GpuState::Offline {
                self.state = GpuState::Idle;
                info!(node_id = self.node_id, "Node back online");
            }
            None
        }
    }

    /// Snapshot with telemetry rounded to two decimals
    pub fn get_status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.node_id,
            gpu_type: self.spec.name.clone(),
            state: self.state,
            telemetry: self.telemetry.rounded(),
            current_task: self.current.as_ref().map(|t| NodeTask {
                task_id: t.request.task_id.clone(),
                duration: t.request.duration,
                memory_required: t.request.memory_required,
                started_at: t.started_at,
            }),
        }
    }

    fn signal(&self, task: ActiveTask, status: TaskStatus, now: f64) -> TaskOutcome {
        let outcome = TaskOutcome {
            task_id: task.request.task_id,
            node_id: self.node_id,
            status,
            finished_at: now,
        };
        info!(
            node_id = self.node_id,
            task_id = %outcome.task_id,
            status = %status,
            "Task finished"
        );
        // The receiver may have been dropped by a caller that ignores completion.
        let _ = task.signal.send(outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn test_node() -> GpuNode {
        GpuNode::new(
            0,
            GpuTypeSpec::new("A100", 40.0, 312.0, 250.0),
            ThermalConfig::default(),
        )
    }

    fn rng() -> Pcg64 {
        Pcg64::seed_from_u64(42)
    }

    #[test]
    fn test_new_node_is_idle() {
        let node = test_node();
        let status = node.get_status();
        assert_eq!(status.state, GpuState::Idle);
        assert_eq!(status.telemetry.temperature, 30.0);
        assert!(status.current_task.is_none());
        assert!(node.is_available());
    }

    #[test]
    fn test_execute_marks_busy() {
        let mut clock = Clock::new();
        let mut node = test_node();

        let handle = node.execute(TaskRequest::new("t1", 10, 8.0), &mut clock).unwrap();
        assert_eq!(handle.task_id(), "t1");
        assert_eq!(node.state(), GpuState::Busy);
        assert_eq!(node.current_task_id(), Some("t1"));
        assert_eq!(clock.peek_time(), Some(10.0));
    }

    #[test]
    fn test_execute_on_busy_node_fails_without_change() {
        let mut clock = Clock::new();
        let mut node = test_node();
        node.execute(TaskRequest::new("t1", 10, 8.0), &mut clock).unwrap();

        let err = node
            .execute(TaskRequest::new("t2", 5, 8.0), &mut clock)
            .unwrap_err();
        assert!(matches!(err, GridError::ResourceUnavailable { node_id: 0, .. }));
        assert_eq!(node.current_task_id(), Some("t1"));
        assert_eq!(node.state(), GpuState::Busy);
        assert_eq!(clock.pending_events(), 1);
    }

    #[test]
    fn test_execute_on_throttled_node_fails() {
        let mut clock = Clock::new();
        let mut node = test_node();
        node.state = GpuState::Throttled;

        let result = node.execute(TaskRequest::new("t1", 10, 8.0), &mut clock);
        assert!(matches!(result, Err(GridError::ResourceUnavailable { .. })));
        assert!(node.current_task_id().is_none());
    }

    #[test]
    fn test_finish_resets_to_idle() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let mut handle = node.execute(TaskRequest::new("t1", 10, 8.0), &mut clock).unwrap();

        let (event_id, _) = clock.pop_until(10.0).unwrap();
        let outcome = node.finish(event_id, clock.now()).unwrap();

        assert_eq!(outcome.status, TaskStatus::Completed);
        assert_eq!(outcome.finished_at, 10.0);
        assert_eq!(node.state(), GpuState::Idle);
        assert!(node.current_task_id().is_none());
        assert_eq!(handle.poll_outcome().unwrap(), Some(outcome));
    }

    #[test]
    fn test_finish_ignores_stale_event() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let event_id = {
            node.execute(TaskRequest::new("t1", 10, 8.0), &mut clock).unwrap();
            node.current.as_ref().unwrap().completion_event
        };
        assert!(node.finish(event_id + 100, 10.0).is_none());
        assert_eq!(node.state(), GpuState::Busy);
    }

    #[test]
    fn test_interrupt_signals_failure() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let mut handle = node.execute(TaskRequest::new("t1", 10, 8.0), &mut clock).unwrap();

        clock.advance_to(4.0);
        let outcome = node.interrupt(&mut clock).unwrap();
        assert_eq!(outcome.status, TaskStatus::Failed);
        assert_eq!(outcome.finished_at, 4.0);
        assert_eq!(node.state(), GpuState::Idle);
        assert_eq!(clock.pending_events(), 0);
        assert_eq!(
            handle.poll_outcome().unwrap().map(|o| o.status),
            Some(TaskStatus::Failed)
        );
        assert!(node.interrupt(&mut clock).is_none());
    }

    #[test]
    fn test_busy_tick_heats() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let mut rng = rng();
        node.execute(TaskRequest::new("t1", 100, 64.0), &mut clock).unwrap();

        node.tick(&mut rng);
        let t = node.telemetry();
        assert!(t.temperature >= 30.5 && t.temperature <= 32.0);
        assert!((200.0..300.0).contains(&t.power_usage));
        assert!((80.0..99.0).contains(&t.utilization));
        assert_eq!(t.memory_usage, 40.0);
    }

    #[test]
    fn test_idle_tick_cools_to_floor() {
        let mut node = test_node();
        let mut rng = rng();
        for _ in 0..100 {
            node.tick(&mut rng);
        }
        let t = node.telemetry();
        assert_eq!(t.temperature, 25.0);
        assert_eq!(t.utilization, 0.0);
        assert!((10.0..30.0).contains(&t.power_usage));
    }

    #[test]
    fn test_busy_temperature_capped() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let mut rng = rng();
        node.execute(TaskRequest::new("t1", 100, 8.0), &mut clock).unwrap();
        node.telemetry.temperature = 94.9;
        node.tick(&mut rng);
        assert_eq!(node.telemetry().temperature, 95.0);
    }

    #[test]
    fn test_idle_node_throttles_and_recovers() {
        let mut node = test_node();
        let mut rng = rng();
        node.telemetry.temperature = 86.0;

        node.tick(&mut rng);
        // 86 - 0.5 at most, still above the ceiling
        assert_eq!(node.state(), GpuState::Throttled);
        assert!(!node.is_available());

        while node.state() == GpuState::Throttled {
            node.tick(&mut rng);
        }
        assert_eq!(node.state(), GpuState::Idle);
        assert!(node.telemetry().temperature < 80.0);
    }

    #[test]
    fn test_throttled_node_keeps_task_and_resumes_busy() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let mut rng = rng();
        node.execute(TaskRequest::new("hot", 300, 8.0), &mut clock).unwrap();
        node.telemetry.temperature = 84.9;

        node.tick(&mut rng);
        assert_eq!(node.state(), GpuState::Throttled);
        assert_eq!(node.current_task_id(), Some("hot"));

        // Throttled nodes follow the cooling branch.
        let before = node.telemetry().temperature;
        node.tick(&mut rng);
        assert!(node.telemetry().temperature < before);
        assert_eq!(node.telemetry().utilization, 0.0);

        while node.state() == GpuState::Throttled {
            node.tick(&mut rng);
        }
        assert_eq!(node.state(), GpuState::Busy);
        assert_eq!(node.current_task_id(), Some("hot"));
    }

    #[test]
    fn test_completion_while_throttled_stays_throttled() {
        let mut clock = Clock::new();
        let mut node = test_node();
        node.execute(TaskRequest::new("t1", 5, 8.0), &mut clock).unwrap();
        node.state = GpuState::Throttled;

        let (event_id, _) = clock.pop_until(5.0).unwrap();
        let outcome = node.finish(event_id, clock.now()).unwrap();
        assert_eq!(outcome.status, TaskStatus::Completed);
        assert_eq!(node.state(), GpuState::Throttled);
        assert!(node.current_task_id().is_none());
    }

    #[test]
    fn test_offline_interrupts_and_excludes() {
        let mut clock = Clock::new();
        let mut node = test_node();
        let mut rng = rng();
        node.execute(TaskRequest::new("t1", 50, 8.0), &mut clock).unwrap();

        let outcome = node.set_offline(true, &mut clock).unwrap();
        assert_eq!(outcome.status, TaskStatus::Failed);
        assert_eq!(node.state(), GpuState::Offline);

        node.telemetry.temperature = 90.0;
        node.tick(&mut rng);
        assert_eq!(node.state(), GpuState::Offline);
        assert!(node
            .execute(TaskRequest::new("t2", 5, 8.0), &mut clock)
            .is_err());

        assert!(node.set_offline(false, &mut clock).is_none());
        assert_eq!(node.state(), GpuState::Idle);
    }
}
