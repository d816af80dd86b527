use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The eight workflow stages, in order. Serialized as `P0`..`P7`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    #[serde(rename = "P0")]
    Discovery,
    #[serde(rename = "P1")]
    Planning,
    #[serde(rename = "P2")]
    Implementation,
    #[serde(rename = "P3")]
    Testing,
    #[serde(rename = "P4")]
    Review,
    #[serde(rename = "P5")]
    Release,
    #[serde(rename = "P6")]
    Acceptance,
    #[serde(rename = "P7")]
    Closure,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Discovery,
        Phase::Planning,
        Phase::Implementation,
        Phase::Testing,
        Phase::Review,
        Phase::Release,
        Phase::Acceptance,
        Phase::Closure,
    ];

    pub const FIRST: Phase = Phase::Discovery;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Phase> {
        Self::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Phase> {
        Self::from_index(self.index() + 1)
    }

    pub fn token(self) -> &'static str {
        match self {
            Phase::Discovery => "P0",
            Phase::Planning => "P1",
            Phase::Implementation => "P2",
            Phase::Testing => "P3",
            Phase::Review => "P4",
            Phase::Release => "P5",
            Phase::Acceptance => "P6",
            Phase::Closure => "P7",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Planning => "planning",
            Phase::Implementation => "implementation",
            Phase::Testing => "testing",
            Phase::Review => "review",
            Phase::Release => "release",
            Phase::Acceptance => "acceptance",
            Phase::Closure => "closure",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.token(), self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase '{0}'; expected P0..P7 or a phase name")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s.trim().to_ascii_lowercase();
        let digits = n.strip_prefix('p').unwrap_or(&n);
        if let Ok(i) = digits.parse::<usize>() {
            return Phase::from_index(i).ok_or_else(|| ParsePhaseError(s.to_string()));
        }
        Phase::ALL
            .iter()
            .copied()
            .find(|p| p.name() == n)
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Cancelled,
}

/// Discussion mode leaves the engine dormant; execution mode enforces.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    #[default]
    Discussion,
    Execution,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Block,
}

/// Every rule or check that can put a violation into a verdict.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    PhaseSkip,
    ProtectedBranchCoding,
    ContinuationBypass,
    #[serde(rename = "coding-without-workflow-activation")]
    CodingWithoutActivation,
    PhaseStateMismatch,
    BranchBinding,
    InvalidTransition,
    PrerequisiteMissing,
    OutputIncomplete,
    MalformedState,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::PhaseSkip => "phase-skip",
            CheckKind::ProtectedBranchCoding => "protected-branch-coding",
            CheckKind::ContinuationBypass => "continuation-bypass",
            CheckKind::CodingWithoutActivation => "coding-without-workflow-activation",
            CheckKind::PhaseStateMismatch => "phase-state-mismatch",
            CheckKind::BranchBinding => "branch-binding",
            CheckKind::InvalidTransition => "invalid-transition",
            CheckKind::PrerequisiteMissing => "prerequisite-missing",
            CheckKind::OutputIncomplete => "output-incomplete",
            CheckKind::MalformedState => "malformed-state",
        }
    }

    /// Categories the bypass detector is allowed to emit.
    pub fn is_bypass_category(self) -> bool {
        matches!(
            self,
            CheckKind::PhaseSkip
                | CheckKind::ProtectedBranchCoding
                | CheckKind::ContinuationBypass
                | CheckKind::CodingWithoutActivation
                | CheckKind::PhaseStateMismatch
        )
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    #[default]
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStarted,
    TaskCompleted,
    /// Cancellation is the emergency bypass and is recorded apart from completion.
    EmergencyBypass,
    BranchCreated,
    PhaseChanged,
    WorkflowActivated,
    WorkflowDeactivated,
    GateBlocked,
    GateWarned,
    StateDegraded,
}
