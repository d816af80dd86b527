use std::path::PathBuf;

use thiserror::Error;

use crate::{CheckKind, Phase, Severity, TaskId, Violation};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid phase transition {} -> {to}: {reason}", from_label(.from))]
    InvalidTransition { from: Option<Phase>, to: Phase, reason: String },

    #[error("cannot enter {phase}: missing {artifact} ({detail})")]
    PrerequisiteMissing { phase: Phase, artifact: String, detail: String },

    #[error("cannot leave {phase}: {artifact} incomplete ({detail})")]
    OutputIncomplete { phase: Phase, artifact: String, detail: String },

    #[error("active task is bound to branch '{expected}' but the current branch is '{actual}'")]
    BindingViolation { expected: String, actual: String },

    #[error("bypass pattern detected by rule {rule_id} ({kind})")]
    BypassPatternDetected { rule_id: String, kind: CheckKind },

    #[error("task {task_id} is already active on branch '{branch}'")]
    TaskAlreadyActive { task_id: TaskId, branch: String },

    #[error("no active task")]
    NoActiveTask,

    #[error("malformed state file {}: {reason}", .path.display())]
    MalformedState { path: PathBuf, reason: String },

    #[error("timed out acquiring state lock {} after {attempts} attempts", .path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("vcs error: {0}")]
    Vcs(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn from_label(from: &Option<Phase>) -> String {
    match from {
        Some(p) => p.to_string(),
        None => "<none>".to_string(),
    }
}

impl GateError {
    pub fn check_id(&self) -> &'static str {
        match self {
            GateError::InvalidTransition { .. } => "invalid-transition",
            GateError::PrerequisiteMissing { .. } => "prerequisite-missing",
            GateError::OutputIncomplete { .. } => "output-incomplete",
            GateError::BindingViolation { .. } => "branch-binding",
            GateError::BypassPatternDetected { .. } => "bypass-pattern",
            GateError::TaskAlreadyActive { .. } => "task-already-active",
            GateError::NoActiveTask => "no-active-task",
            GateError::MalformedState { .. } => "malformed-state",
            GateError::LockTimeout { .. } => "lock-timeout",
            GateError::Vcs(_) => "vcs",
            GateError::Io(_) => "io",
        }
    }

    /// Concrete next step for the caller; agents act on this text.
    pub fn remediation(&self) -> String {
        match self {
            GateError::InvalidTransition { from: None, .. } => {
                format!("start the workflow at {}: `phasegate phase set P0`", Phase::FIRST.token())
            }
            GateError::InvalidTransition { from: Some(from), .. } => match from.next() {
                Some(next) => format!("advance one phase at a time: `phasegate phase advance` moves to {next}"),
                None => "the workflow is at its last phase; restart with `phasegate phase set P0`".to_string(),
            },
            GateError::PrerequisiteMissing { artifact, .. } => {
                format!("produce the {artifact} before entering this phase")
            }
            GateError::OutputIncomplete { phase, artifact, .. } => {
                format!("finish the {artifact} for {phase} and retry the transition")
            }
            GateError::BindingViolation { expected, .. } => {
                format!("switch to branch '{expected}' (`git checkout {expected}`) or run `phasegate complete` first")
            }
            GateError::BypassPatternDetected { .. } => {
                "follow the workflow: `phasegate status` shows the current phase and task".to_string()
            }
            GateError::TaskAlreadyActive { task_id, .. } => {
                format!("run `phasegate complete` (or `phasegate cancel`) to close {task_id} first")
            }
            GateError::NoActiveTask => "start one with `phasegate start <description> <branch>`".to_string(),
            GateError::MalformedState { path, .. } => {
                format!("repair or delete {} and retry", path.display())
            }
            GateError::LockTimeout { .. } => "another phasegate invocation holds the state lock; retry".to_string(),
            GateError::Vcs(_) => "run inside the repository working copy or pass --branch".to_string(),
            GateError::Io(_) => "check permissions on the state directory".to_string(),
        }
    }

    /// Verdict entry for the check failures that surface through `decide`.
    pub fn to_violation(&self, severity: Severity) -> Option<Violation> {
        let kind = match self {
            GateError::InvalidTransition { .. } => CheckKind::InvalidTransition,
            GateError::PrerequisiteMissing { .. } => CheckKind::PrerequisiteMissing,
            GateError::OutputIncomplete { .. } => CheckKind::OutputIncomplete,
            GateError::BindingViolation { .. } => CheckKind::BranchBinding,
            GateError::BypassPatternDetected { kind, .. } => *kind,
            GateError::MalformedState { .. } => CheckKind::MalformedState,
            _ => return None,
        };
        Some(Violation {
            check_id: self.check_id().to_string(),
            kind,
            severity,
            message: self.to_string(),
            remediation: self.remediation(),
        })
    }
}
