use serde::{Deserialize, Serialize};

use crate::{ids::*, model::*};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub bound_branch: String,
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    pub status: TaskStatus,
}

impl Task {
    pub fn start(description: impl Into<String>, bound_branch: impl Into<String>, now_unix: i64) -> Self {
        let description = description.into();
        Self {
            id: TaskId::derive(&description, now_unix),
            description,
            bound_branch: bound_branch.into(),
            start_time: now_unix,
            end_time: None,
            status: TaskStatus::InProgress,
        }
    }

    pub fn finish(mut self, status: TaskStatus, now_unix: i64) -> Self {
        self.status = status;
        self.end_time = Some(now_unix);
        self
    }
}

/// Persisted task map: at most one active task plus the archive.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMap {
    #[serde(default)]
    pub active_task: Option<Task>,
    #[serde(default)]
    pub task_history: Vec<Task>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionRecord {
    pub from_phase: Option<Phase>,
    pub to_phase: Phase,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseRecord {
    pub current: Phase,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeRecord {
    pub mode: WorkflowMode,
    pub since: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub at: i64,
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>, now_unix: i64) -> Self {
        Self {
            id: EventId::new(),
            at: now_unix,
            kind,
            message: message.into(),
            task_id: None,
            phase: None,
        }
    }

    pub fn with_task(mut self, task_id: &TaskId) -> Self {
        self.task_id = Some(task_id.clone());
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub check_id: String,
    pub kind: CheckKind,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
}

impl Violation {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Block
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateVerdict {
    pub allowed: bool,
    pub blocking: bool,
    pub violations: Vec<Violation>,
}

impl GateVerdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let blocking = violations.iter().any(Violation::is_blocking);
        Self {
            allowed: !blocking,
            blocking,
            violations,
        }
    }

    pub fn allow() -> Self {
        Self::from_violations(vec![])
    }

    pub fn blocking_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_blocking())
    }

    pub fn has(&self, kind: CheckKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}
