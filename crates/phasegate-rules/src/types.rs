use std::collections::BTreeMap;

use phasegate_core::{CheckKind, Phase, Severity};
use serde::{Deserialize, Serialize};

/// Declarative rule table: named term sets plus rules that reference them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    pub term_sets: BTreeMap<String, Vec<String>>,
    pub rules: Vec<RuleSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub category: CheckKind,
    pub severity: Severity,
    pub pattern: PatternSpec,
    /// Supports `{match}`, `{branch}` and `{phase}` placeholders.
    pub message: String,
    pub remediation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternSpec {
    /// Any term of the set appears.
    Terms { set: String },
    /// A term of each set appears, at any distance.
    CoOccurrence { left: String, right: String },
    /// A term of each set appears with at most `window` tokens between them, in either order.
    Proximity {
        left: String,
        right: String,
        #[serde(default)]
        window: Option<usize>,
    },
    /// Any of the regular expressions matches the raw text.
    Regex { any: Vec<String> },
}

/// State the detector evaluates text against.
#[derive(Clone, Debug)]
pub struct ScanContext {
    pub current_phase: Phase,
    pub current_branch: String,
    pub workflow_active: bool,
    pub protected_branches: Vec<String>,
    pub coding_phases: Vec<Phase>,
    pub continuation_window: usize,
}

pub const DEFAULT_CONTINUATION_WINDOW: usize = 3;

impl Default for ScanContext {
    fn default() -> Self {
        Self {
            current_phase: Phase::FIRST,
            current_branch: String::new(),
            workflow_active: false,
            protected_branches: vec!["main".to_string(), "master".to_string()],
            coding_phases: vec![Phase::Implementation, Phase::Testing],
            continuation_window: DEFAULT_CONTINUATION_WINDOW,
        }
    }
}

impl ScanContext {
    pub fn on_protected_branch(&self) -> bool {
        self.protected_branches.iter().any(|b| b == &self.current_branch)
    }

    pub fn phase_permits_coding(&self) -> bool {
        self.coding_phases.contains(&self.current_phase)
    }
}

/// Text plus its token stream, computed once per scan.
pub struct ScanInput<'a> {
    pub text: &'a str,
    pub tokens: Vec<String>,
    pub ctx: &'a ScanContext,
}
