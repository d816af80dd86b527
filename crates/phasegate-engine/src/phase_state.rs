use phasegate_core::{
    now_unix, validate_transition, Event, EventKind, GateError, Phase, TransitionKind, TransitionRecord, Violation,
};
use tracing::{info, warn};

use crate::engine::Engine;

/// Result of an accepted phase change. `warnings` holds soft requirement misses.
#[derive(Debug)]
pub struct PhaseChange {
    pub record: TransitionRecord,
    pub kind: TransitionKind,
    pub warnings: Vec<Violation>,
}

impl Engine {
    /// Persisted phase; the first phase is recorded on first use. Never fails.
    pub fn current_phase(&self) -> Phase {
        let initial = TransitionRecord {
            from_phase: None,
            to_phase: Phase::FIRST,
            timestamp: now_unix(),
        };
        match self.store.read_phase() {
            Ok(Some(rec)) => rec.current,
            Ok(None) => match self.store.ensure_phase(&initial) {
                Ok(rec) => rec.current,
                Err(e) => {
                    warn!(error = %e, "cannot record initial phase");
                    Phase::FIRST
                }
            },
            Err(e) => {
                warn!(error = %e, "phase state unreadable; assuming {}", Phase::FIRST);
                Phase::FIRST
            }
        }
    }

    /// Overwrite the phase and append a transition record. No validation.
    pub fn set_phase(&self, to: Phase) -> Result<TransitionRecord, GateError> {
        let record = self.store.update_phase(&mut |from| {
            Ok(TransitionRecord {
                from_phase: from,
                to_phase: to,
                timestamp: now_unix(),
            })
        })?;
        self.phase_changed(&record);
        Ok(record)
    }

    /// Validated transition. A forward step also checks the outputs of the
    /// current phase and the prerequisites of the next; hard misses fail.
    pub fn transition_to(&self, to: Phase) -> Result<PhaseChange, GateError> {
        self.step(&|_| Ok(to))
    }

    /// One step forward from the current phase.
    pub fn advance(&self) -> Result<PhaseChange, GateError> {
        self.current_phase();
        self.step(&|from| {
            let from = from.unwrap_or(Phase::FIRST);
            from.next().ok_or_else(|| GateError::InvalidTransition {
                from: Some(from),
                to: from,
                reason: "already at the last phase".to_string(),
            })
        })
    }

    /// Pick the target, validate and persist, all against the phase read
    /// under the store's write lock.
    fn step(&self, target: &dyn Fn(Option<Phase>) -> Result<Phase, GateError>) -> Result<PhaseChange, GateError> {
        let mut kind = TransitionKind::Reentry;
        let mut warnings = Vec::new();
        let record = self.store.update_phase(&mut |from| {
            let to = target(from)?;
            kind = validate_transition(from, to)?;
            warnings.clear();
            if let (TransitionKind::Forward, Some(from)) = (kind, from) {
                let mut findings = self.requirements().forward_step(from, to);
                if let Some(pos) = findings.iter().position(|f| f.is_blocking()) {
                    return Err(findings.swap_remove(pos).error);
                }
                warnings.extend(findings.iter().filter_map(|f| f.to_violation()));
            }
            Ok(TransitionRecord {
                from_phase: from,
                to_phase: to,
                timestamp: now_unix(),
            })
        })?;
        if kind == TransitionKind::Reentry {
            info!(phase = %record.to_phase, "re-entering current phase");
        }
        for w in &warnings {
            warn!(check = %w.check_id, "{}", w.message);
        }
        self.phase_changed(&record);
        Ok(PhaseChange { record, kind, warnings })
    }

    fn phase_changed(&self, record: &TransitionRecord) {
        let to = record.to_phase;
        info!(from = ?record.from_phase, to = %to, "phase set");
        self.record(Event::new(EventKind::PhaseChanged, format!("phase -> {to}"), record.timestamp).with_phase(to));
    }

    /// Most recent first.
    pub fn transitions(&self, limit: usize) -> Result<Vec<TransitionRecord>, GateError> {
        let mut all = self.store.transitions()?;
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }
}
