use std::fmt;
use std::path::Path;

use phasegate_storage::StateStore;
use phasegate_storage_fs::FsStore;
use phasegate_vcs::VcsAdapter;
use phasegate_vcs_git::GitAdapter;

use crate::config::Config;
use crate::engine::load_detector;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl fmt::Display for DoctorCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.ok { "ok" } else { "FAIL" };
        write!(f, "[{mark}] {}: {}", self.name, self.detail)
    }
}

fn check(name: &'static str, res: Result<String, String>) -> DoctorCheck {
    match res {
        Ok(detail) => DoctorCheck { name, ok: true, detail },
        Err(detail) => DoctorCheck { name, ok: false, detail },
    }
}

/// Config, state files, VCS and rule table health. Each component is loaded
/// on its own and every check is reported; after a broken config the rest
/// fall back to the default config.
pub fn diagnose(repo_root: &Path) -> Vec<DoctorCheck> {
    let cfg_path = Config::config_path(repo_root);
    let (cfg, config_check) = if cfg_path.exists() {
        match Config::load_from(&cfg_path) {
            Ok(cfg) => (cfg, check("config", Ok(cfg_path.display().to_string()))),
            Err(e) => (Config::default(), check("config", Err(format!("{e:#}")))),
        }
    } else {
        let missing = format!("{} not found; run `phasegate init`", cfg_path.display());
        (Config::default(), check("config", Err(missing)))
    };

    let mut out = vec![config_check];
    let state_dir = cfg.state_dir(repo_root);
    if state_dir.is_dir() {
        match FsStore::open(&state_dir) {
            Ok(store) => out.extend(state_checks(&store)),
            Err(e) => out.push(check("state", Err(format!("{}: {e}", state_dir.display())))),
        }
    } else {
        out.push(check("state", Err(format!("{} missing; run `phasegate init`", state_dir.display()))));
    }
    out.push(vcs_check(&GitAdapter::new(), repo_root));
    out.push(rules_check(load_detector(&cfg, repo_root).map(|d| d.rules().count())));
    out
}

fn state_checks(store: &dyn StateStore) -> Vec<DoctorCheck> {
    vec![
        check(
            "phase",
            match store.read_phase() {
                Ok(Some(r)) => Ok(r.current.to_string()),
                Ok(None) => Ok("not initialized; run `phasegate init`".to_string()),
                Err(e) => Err(e.to_string()),
            },
        ),
        check(
            "tasks",
            store
                .read_tasks()
                .map(|m| match m.active_task {
                    Some(t) => format!("active {} on {}", t.id, t.bound_branch),
                    None => format!("no active task, {} archived", m.task_history.len()),
                })
                .map_err(|e| e.to_string()),
        ),
        check(
            "mode",
            store
                .read_mode()
                .map(|m| format!("{:?}", m.map(|r| r.mode).unwrap_or_default()).to_lowercase())
                .map_err(|e| e.to_string()),
        ),
    ]
}

fn vcs_check(vcs: &dyn VcsAdapter, repo_root: &Path) -> DoctorCheck {
    check(
        "vcs",
        vcs.current_branch(repo_root)
            .map(|b| format!("{} branch {b}", vcs.name()))
            .map_err(|e| format!("{e:#}")),
    )
}

fn rules_check(loaded: anyhow::Result<usize>) -> DoctorCheck {
    check(
        "rules",
        match loaded {
            Ok(0) => Err("rule table is empty".to_string()),
            Ok(n) => Ok(format!("{n} rules loaded")),
            Err(e) => Err(format!("{e:#}")),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;
    use tempfile::tempdir;

    fn named<'a>(checks: &'a [DoctorCheck], name: &str) -> &'a DoctorCheck {
        checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn reports_every_check() {
        let dir = tempdir().unwrap();
        Engine::init_repo(dir.path()).unwrap();
        let checks = diagnose(dir.path());
        let names: Vec<_> = checks.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["config", "phase", "tasks", "mode", "vcs", "rules"]);
        assert!(named(&checks, "vcs").to_string().contains("] vcs: "));
        assert!(checks.iter().filter(|c| c.name != "vcs").all(|c| c.ok), "{checks:?}");
    }

    #[test]
    fn corrupt_config_is_a_failed_check() {
        let dir = tempdir().unwrap();
        Engine::init_repo(dir.path()).unwrap();
        std::fs::write(Config::config_path(dir.path()), "[workflow\n").unwrap();

        let checks = diagnose(dir.path());
        let config = named(&checks, "config");
        assert!(!config.ok);
        assert!(config.detail.contains("parse"), "{}", config.detail);
        assert!(named(&checks, "phase").ok);
        assert!(named(&checks, "rules").ok);
    }

    #[test]
    fn missing_rule_table_is_a_failed_check() {
        let dir = tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.detector.rules_file = Some("missing.yaml".to_string());
        cfg.save_to(&Config::config_path(dir.path())).unwrap();

        let checks = diagnose(dir.path());
        assert!(named(&checks, "config").ok);
        let rules = named(&checks, "rules");
        assert!(!rules.ok);
        assert!(rules.detail.contains("missing.yaml"), "{}", rules.detail);
    }

    #[test]
    fn uninitialized_repo_points_at_init() {
        let dir = tempdir().unwrap();
        let checks = diagnose(dir.path());
        assert!(!named(&checks, "config").ok);
        let state = named(&checks, "state");
        assert!(!state.ok && state.detail.contains("phasegate init"));
        assert!(!dir.path().join(".phasegate").exists());
    }
}
