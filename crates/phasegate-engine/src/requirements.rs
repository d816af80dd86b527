use phasegate_artifacts::{ArtifactKind, ArtifactProbe, ProbeResult};
use phasegate_core::{GateError, Phase, Severity, Violation};
use tracing::warn;

use crate::config::GatesConfig;

/// Artifacts that must exist before entering `phase`.
pub fn prerequisites(phase: Phase) -> &'static [ArtifactKind] {
    match phase {
        Phase::Planning => &[ArtifactKind::RequirementsDoc],
        Phase::Implementation => &[ArtifactKind::PlanningDoc],
        Phase::Review => &[ArtifactKind::TestFiles],
        Phase::Release => &[ArtifactKind::ReviewReport],
        _ => &[],
    }
}

/// Artifacts `phase` must have produced before it is left.
pub fn outputs(phase: Phase) -> &'static [ArtifactKind] {
    match phase {
        Phase::Discovery => &[ArtifactKind::RequirementsDoc],
        Phase::Planning => &[ArtifactKind::PlanningDoc],
        Phase::Testing => &[ArtifactKind::TestFiles],
        Phase::Review => &[ArtifactKind::ReviewReport],
        Phase::Release => &[ArtifactKind::VersionConsistency],
        Phase::Acceptance => &[ArtifactKind::AcceptanceReport],
        _ => &[],
    }
}

/// One unmet requirement and how hard it is enforced.
#[derive(Debug)]
pub struct Finding {
    pub error: GateError,
    pub severity: Severity,
}

impl Finding {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Block
    }

    pub fn to_violation(&self) -> Option<Violation> {
        self.error.to_violation(self.severity)
    }
}

pub struct Requirements<'a> {
    pub probe: &'a dyn ArtifactProbe,
    pub gates: &'a GatesConfig,
}

impl Requirements<'_> {
    fn run(&self, kind: ArtifactKind) -> ProbeResult {
        self.probe.probe(kind).unwrap_or_else(|e| {
            warn!(kind = %kind, error = %format!("{e:#}"), "artifact probe failed");
            ProbeResult::missing(kind, format!("probe failed: {e:#}"))
        })
    }

    pub fn check_prerequisites(&self, to: Phase) -> Vec<Finding> {
        let severity = severity_for(self.gates.hard_prerequisites.contains(&to));
        prerequisites(to)
            .iter()
            .map(|k| self.run(*k))
            .filter(|r| !r.present)
            .map(|r| Finding {
                error: GateError::PrerequisiteMissing {
                    phase: to,
                    artifact: r.kind.to_string(),
                    detail: format!("{}; {}", r.detail, r.kind.hint()),
                },
                severity,
            })
            .collect()
    }

    pub fn verify_outputs(&self, of: Phase) -> Vec<Finding> {
        let severity = severity_for(self.gates.hard_outputs.contains(&of));
        outputs(of)
            .iter()
            .map(|k| self.run(*k))
            .filter(|r| !r.present)
            .map(|r| Finding {
                error: GateError::OutputIncomplete {
                    phase: of,
                    artifact: r.kind.to_string(),
                    detail: format!("{}; {}", r.detail, r.kind.hint()),
                },
                severity,
            })
            .collect()
    }

    /// Outputs of `from`, then prerequisites of `to`.
    pub fn forward_step(&self, from: Phase, to: Phase) -> Vec<Finding> {
        let mut findings = self.verify_outputs(from);
        findings.extend(self.check_prerequisites(to));
        findings
    }
}

fn severity_for(hard: bool) -> Severity {
    if hard {
        Severity::Block
    } else {
        Severity::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::collections::HashSet;

    struct FakeProbe {
        present: HashSet<ArtifactKind>,
        broken: Option<ArtifactKind>,
    }

    impl ArtifactProbe for FakeProbe {
        fn probe(&self, kind: ArtifactKind) -> Result<ProbeResult> {
            if self.broken == Some(kind) {
                return Err(anyhow!("unreadable manifest"));
            }
            Ok(if self.present.contains(&kind) {
                ProbeResult::found(kind, "ok")
            } else {
                ProbeResult::missing(kind, "absent")
            })
        }
    }

    fn probe_with(kinds: &[ArtifactKind]) -> FakeProbe {
        FakeProbe {
            present: kinds.iter().copied().collect(),
            broken: None,
        }
    }

    #[test]
    fn every_phase_but_the_last_has_outputs() {
        for p in Phase::ALL {
            if p == Phase::Implementation || p == Phase::Closure {
                assert!(outputs(p).is_empty(), "{p}");
            } else {
                assert!(!outputs(p).is_empty(), "{p}");
            }
        }
    }

    #[test]
    fn leaving_testing_without_tests_is_hard() {
        let gates = GatesConfig::default();
        let probe = probe_with(&[]);
        let req = Requirements { probe: &probe, gates: &gates };
        let findings = req.forward_step(Phase::Testing, Phase::Review);
        assert!(findings.iter().any(|f| f.is_blocking() && matches!(f.error, GateError::OutputIncomplete { .. })));
        // entering review also wants tests, but only as a warning
        assert!(findings.iter().any(|f| !f.is_blocking() && matches!(f.error, GateError::PrerequisiteMissing { .. })));

        let probe = probe_with(&[ArtifactKind::TestFiles]);
        let req = Requirements { probe: &probe, gates: &gates };
        assert!(req.forward_step(Phase::Testing, Phase::Review).is_empty());
    }

    #[test]
    fn soft_requirements_warn() {
        let gates = GatesConfig::default();
        let probe = probe_with(&[]);
        let req = Requirements { probe: &probe, gates: &gates };
        let findings = req.forward_step(Phase::Discovery, Phase::Planning);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| !f.is_blocking()));
        let v = findings[0].to_violation().unwrap();
        assert!(v.message.contains("requirements-doc"));
    }

    #[test]
    fn hard_prerequisites_are_configurable() {
        let gates = GatesConfig {
            hard_prerequisites: vec![Phase::Release],
            hard_outputs: vec![],
        };
        let probe = probe_with(&[]);
        let req = Requirements { probe: &probe, gates: &gates };
        let f = req.check_prerequisites(Phase::Release);
        assert_eq!(f.len(), 1);
        assert!(f[0].is_blocking());
        assert!(req.verify_outputs(Phase::Testing).iter().all(|f| !f.is_blocking()));
    }

    #[test]
    fn probe_failure_counts_as_missing() {
        let gates = GatesConfig::default();
        let probe = FakeProbe {
            present: HashSet::new(),
            broken: Some(ArtifactKind::VersionConsistency),
        };
        let req = Requirements { probe: &probe, gates: &gates };
        let f = req.verify_outputs(Phase::Release);
        assert_eq!(f.len(), 1);
        assert!(f[0].error.to_string().contains("unreadable manifest"));
    }
}
