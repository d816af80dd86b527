use phasegate_core::{
    check_binding, validate_transition, CheckKind, Event, EventKind, FailMode, GateError, GateVerdict, Phase,
    Severity, Snapshot, TransitionKind, Violation,
};
use phasegate_rules::ScanContext;
use tracing::{info, warn};

use crate::engine::Engine;

#[derive(Clone, Debug, Default)]
pub struct DecisionRequest {
    pub text: String,
    pub current_branch: String,
    /// Set when the caller is about to move the workflow to this phase.
    pub requested_phase: Option<Phase>,
}

impl Engine {
    pub fn scan_context(&self, snap: &Snapshot, branch: &str) -> ScanContext {
        ScanContext {
            current_phase: snap.phase,
            current_branch: branch.to_string(),
            workflow_active: snap.workflow_active(),
            protected_branches: self.cfg.branches.protected.clone(),
            coding_phases: self.cfg.workflow.coding_phases.clone(),
            continuation_window: self.cfg.detector.continuation_window,
        }
    }

    /// Rule-table check of `text` alone: the first blocking rule is an error.
    pub fn screen(&self, text: &str, branch: &str) -> Result<Vec<Violation>, GateError> {
        let (snap, _) = self.snapshot();
        self.detector.check(text, &self.scan_context(&snap, branch))
    }

    /// The single allow/block decision. Reads state, never mutates the task
    /// registry or phase; only the audit log is appended to.
    pub fn decide(&self, req: &DecisionRequest) -> GateVerdict {
        let (snap, errors) = self.snapshot();
        let mut violations = Vec::new();
        if !errors.is_empty() {
            self.record(Event::new(EventKind::StateDegraded, snap.degraded.join("; "), snap.now_unix));
        }

        let degraded_severity = match self.cfg.workflow.fail_mode {
            FailMode::Open => Severity::Warn,
            FailMode::Closed => Severity::Block,
        };
        violations.extend(errors.iter().map(|e| degraded_violation(e, degraded_severity)));

        let ctx = self.scan_context(&snap, &req.current_branch);
        violations.extend(self.detector.scan(&req.text, &ctx));

        if let Err(e) = check_binding(snap.active_task.as_ref(), &req.current_branch) {
            violations.extend(e.to_violation(Severity::Block));
        }

        if let Some(to) = req.requested_phase {
            match validate_transition(Some(snap.phase), to) {
                Ok(TransitionKind::Forward) => violations.extend(
                    self.requirements()
                        .forward_step(snap.phase, to)
                        .iter()
                        .filter_map(|f| f.to_violation()),
                ),
                Ok(_) => {}
                Err(e) => violations.extend(e.to_violation(Severity::Block)),
            }
        }

        let verdict = GateVerdict::from_violations(violations);
        self.log_verdict(&verdict, &snap);
        verdict
    }

    fn log_verdict(&self, verdict: &GateVerdict, snap: &Snapshot) {
        if verdict.violations.is_empty() {
            info!(phase = %snap.phase, "gate allowed");
            return;
        }
        let ids: Vec<&str> = verdict.violations.iter().map(|v| v.check_id.as_str()).collect();
        let kind = if verdict.blocking {
            EventKind::GateBlocked
        } else {
            EventKind::GateWarned
        };
        warn!(blocking = verdict.blocking, checks = ?ids, "gate violations");
        let mut event = Event::new(kind, ids.join(","), snap.now_unix).with_phase(snap.phase);
        if let Some(task) = &snap.active_task {
            event = event.with_task(&task.id);
        }
        self.record(event);
    }
}

/// Unreadable state as a verdict entry; its severity follows the fail mode.
fn degraded_violation(e: &GateError, severity: Severity) -> Violation {
    e.to_violation(severity).unwrap_or_else(|| Violation {
        check_id: CheckKind::MalformedState.as_str().to_string(),
        kind: CheckKind::MalformedState,
        severity,
        message: format!("state unreadable: {e}"),
        remediation: e.remediation(),
    })
}
