pub mod config;
pub mod doctor;
pub mod engine;
pub mod gate;
pub mod phase_state;
pub mod registry;
pub mod requirements;
pub mod scenario;

pub use config::*;
pub use doctor::*;
pub use engine::*;
pub use gate::*;
pub use phase_state::*;
pub use requirements::*;

#[cfg(test)]
mod scenario_tests {
    use super::scenario::*;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/scenarios")
    }

    fn run(id: &str) -> phasegate_core::GateVerdict {
        let sc = load_scenario(&fixtures().join(format!("{id}.yaml"))).unwrap();
        let dir = tempdir().unwrap();
        let verdict = simulate(&sc, dir.path()).unwrap();
        check_expected(&sc, &verdict).unwrap();
        verdict
    }

    #[test]
    fn every_fixture_matches_its_expectation() {
        let all = load_all(&fixtures()).unwrap();
        assert!(all.len() >= 10);
        for (path, sc) in all {
            let dir = tempdir().unwrap();
            let verdict = simulate(&sc, dir.path()).unwrap_or_else(|e| panic!("{}: {e:#}", path.display()));
            if let Err(e) = check_expected(&sc, &verdict) {
                panic!("{}: {e:#}", path.display());
            }
        }
    }

    #[test]
    fn scenario_continuation_bypass_blocks() {
        let v = run("SC-01-continuation-bypass");
        assert!(v.blocking);
    }

    #[test]
    fn scenario_continued_discussion_is_clean() {
        assert!(run("SC-02-continued-discussion").violations.is_empty());
    }

    #[test]
    fn scenario_missing_tests_then_present() {
        assert!(!run("SC-05-leave-testing-without-tests").allowed);
        assert!(run("SC-06-leave-testing-with-tests").allowed);
    }

    #[test]
    fn scenario_fail_modes_differ() {
        assert!(run("SC-07-corrupt-tasks-fail-open").allowed);
        assert!(!run("SC-08-corrupt-tasks-fail-closed").allowed);
    }
}
