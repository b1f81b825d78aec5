//! Completion signal returned by task execution

use gpugrid_core::{GridError, GridResult, TaskOutcome, TaskStatus};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Handle to a task running on a node.
///
/// The node fires the signal exactly once, with `Completed` when the task ran
/// its full duration or `Failed` when it was interrupted. Dropping the handle
/// is allowed; the node then fires into the void.
#[derive(Debug)]
pub struct CompletionHandle {
    task_id: String,
    node_id: u32,
    receiver: oneshot::Receiver<TaskOutcome>,
}

impl CompletionHandle {
    pub(crate) fn new(
        task_id: String,
        node_id: u32,
    ) -> (oneshot::Sender<TaskOutcome>, CompletionHandle) {
        let (sender, receiver) = oneshot::channel();
        (
            sender,
            CompletionHandle {
                task_id,
                node_id,
                receiver,
            },
        )
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Non-blocking check for the signal.
    ///
    /// Returns `Ok(None)` while the task is still running and an
    /// `ExecutionInterrupted` error if the node went away without signalling.
    pub fn poll_outcome(&mut self) -> GridResult<Option<TaskOutcome>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(self.interrupted()),
        }
    }

    /// Wait for the signal. A failed run surfaces as `ExecutionInterrupted`.
    pub async fn wait(self) -> GridResult<TaskOutcome> {
        let interrupted = self.interrupted();
        match self.receiver.await {
            Ok(outcome) if outcome.status == TaskStatus::Completed => Ok(outcome),
            Ok(_) | Err(_) => Err(interrupted),
        }
    }

    fn interrupted(&self) -> GridError {
        GridError::ExecutionInterrupted {
            task_id: self.task_id.clone(),
            node_id: self.node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: TaskStatus) -> TaskOutcome {
        TaskOutcome {
            task_id: "t1".to_string(),
            node_id: 2,
            status,
            finished_at: 12.0,
        }
    }

    #[test]
    fn test_poll_outcome() {
        let (sender, mut handle) = CompletionHandle::new("t1".to_string(), 2);
        assert!(handle.poll_outcome().unwrap().is_none());

        sender.send(outcome(TaskStatus::Completed)).unwrap();
        let received = handle.poll_outcome().unwrap().unwrap();
        assert_eq!(received.finished_at, 12.0);
    }

    #[test]
    fn test_poll_after_sender_dropped() {
        let (sender, mut handle) = CompletionHandle::new("t1".to_string(), 2);
        drop(sender);
        assert!(matches!(
            handle.poll_outcome(),
            Err(GridError::ExecutionInterrupted { node_id: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_completed() {
        let (sender, handle) = CompletionHandle::new("t1".to_string(), 2);
        sender.send(outcome(TaskStatus::Completed)).unwrap();
        let result = handle.wait().await.unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_wait_failed() {
        let (sender, handle) = CompletionHandle::new("t1".to_string(), 2);
        sender.send(outcome(TaskStatus::Failed)).unwrap();
        assert!(matches!(
            handle.wait().await,
            Err(GridError::ExecutionInterrupted { .. })
        ));
    }
}
