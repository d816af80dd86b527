use crate::{GateError, Phase};

/// How an accepted transition relates to the current phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    /// First recorded phase.
    Initial,
    /// Back to the first phase from anywhere.
    Restart,
    /// Same phase again; accepted as a no-op note.
    Reentry,
    /// Exactly one step forward.
    Forward,
    /// Any step backward, used for corrections.
    Backward,
}

/// Sequencing rules. Prerequisites and outputs are checked by the caller,
/// and only for `TransitionKind::Forward`.
pub fn validate_transition(from: Option<Phase>, to: Phase) -> Result<TransitionKind, GateError> {
    let Some(from) = from else {
        if to == Phase::FIRST {
            return Ok(TransitionKind::Initial);
        }
        return Err(GateError::InvalidTransition {
            from: None,
            to,
            reason: format!("the workflow must start at {}", Phase::FIRST),
        });
    };

    if to == Phase::FIRST && from != Phase::FIRST {
        return Ok(TransitionKind::Restart);
    }
    if to == from {
        return Ok(TransitionKind::Reentry);
    }
    if from.next() == Some(to) {
        return Ok(TransitionKind::Forward);
    }
    if to < from {
        return Ok(TransitionKind::Backward);
    }

    let skipped = to.index() - from.index() - 1;
    Err(GateError::InvalidTransition {
        from: Some(from),
        to,
        reason: format!("skips {skipped} phase(s)"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_must_start_at_first_phase() {
        assert_eq!(validate_transition(None, Phase::Discovery).unwrap(), TransitionKind::Initial);
        assert!(matches!(
            validate_transition(None, Phase::Planning),
            Err(GateError::InvalidTransition { from: None, .. })
        ));
    }

    #[test]
    fn every_phase_rules() {
        for p in Phase::ALL {
            assert!(validate_transition(Some(p), Phase::FIRST).is_ok(), "restart from {p}");
            assert!(validate_transition(Some(p), p).is_ok(), "reentry {p}");
            if let Some(next) = p.next() {
                assert_eq!(validate_transition(Some(p), next).unwrap(), TransitionKind::Forward);
                if let Some(skip) = next.next() {
                    assert!(validate_transition(Some(p), skip).is_err(), "skip from {p}");
                }
            }
        }
    }

    #[test]
    fn backward_is_allowed() {
        assert_eq!(
            validate_transition(Some(Phase::Review), Phase::Implementation).unwrap(),
            TransitionKind::Backward
        );
    }

    #[test]
    fn skip_reason_counts_skipped_phases() {
        let err = validate_transition(Some(Phase::Discovery), Phase::Testing).unwrap_err();
        assert!(err.to_string().contains("skips 2 phase(s)"));
    }
}
