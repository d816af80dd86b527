use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use phasegate_core::{GateError, Severity, Violation};
use tracing::debug;

use crate::rule::{Rule, TableRule};
use crate::tokenize::tokenize;
use crate::types::{RuleTable, ScanContext, ScanInput};

const BUILTIN_RULES: &str = include_str!("../rules/default_rules.yaml");

/// Lexical bypass detector. Reports violations; never decides blocking.
pub struct BypassDetector {
    rules: Vec<Box<dyn Rule>>,
}

impl BypassDetector {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_RULES).context("parse built-in rule table")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read rule table {}", path.display()))?;
        Self::from_yaml(&s).with_context(|| format!("parse rule table {}", path.display()))
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let table: RuleTable = serde_yaml::from_str(s)?;
        Self::from_table(table)
    }

    pub fn from_table(table: RuleTable) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut rules: Vec<Box<dyn Rule>> = Vec::with_capacity(table.rules.len());
        for spec in table.rules {
            if !seen.insert(spec.id.clone()) {
                return Err(anyhow!("duplicate rule id {}", spec.id));
            }
            rules.push(Box::new(TableRule::compile(spec, &table.term_sets)?));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Evaluate every rule in table order.
    pub fn scan(&self, text: &str, ctx: &ScanContext) -> Vec<Violation> {
        let input = ScanInput {
            text,
            tokens: tokenize(text),
            ctx,
        };
        let violations: Vec<Violation> = self.rules.iter().flat_map(|r| r.eval(&input)).collect();
        debug!(tokens = input.tokens.len(), hits = violations.len(), "bypass scan");
        violations
    }

    /// Like [`scan`](Self::scan), but the first blocking match is returned as
    /// an error; otherwise the warnings.
    pub fn check(&self, text: &str, ctx: &ScanContext) -> Result<Vec<Violation>, GateError> {
        let violations = self.scan(text, ctx);
        if let Some(v) = violations.iter().find(|v| v.severity == Severity::Block) {
            return Err(GateError::BypassPatternDetected {
                rule_id: v.check_id.clone(),
                kind: v.kind,
            });
        }
        Ok(violations)
    }
}
