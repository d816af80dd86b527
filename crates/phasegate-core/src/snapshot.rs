use crate::{Phase, Task, WorkflowMode};

/// Read-only view of persisted workflow state used by the decision functions.
/// The store layer produces it; when a file could not be read the snapshot
/// carries the fallback values plus a note per failure in `degraded`.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub now_unix: i64,
    pub phase: Phase,
    pub active_task: Option<Task>,
    pub mode: WorkflowMode,
    pub degraded: Vec<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            now_unix: 0,
            phase: Phase::FIRST,
            active_task: None,
            mode: WorkflowMode::Discussion,
            degraded: vec![],
        }
    }
}

impl Snapshot {
    /// An in-progress task implies execution mode even if the marker was lost.
    pub fn workflow_active(&self) -> bool {
        self.mode == WorkflowMode::Execution || self.active_task.is_some()
    }
}
