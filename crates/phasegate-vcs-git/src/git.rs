use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use phasegate_vcs::VcsAdapter;
use tracing::info;

#[derive(Clone, Debug, Default)]
pub struct GitAdapter;

impl GitAdapter {
    pub fn new() -> Self {
        Self
    }

    fn output(repo: &Path, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(repo)
            .output()
            .with_context(|| format!("run git {:?}", args))
    }

    fn run(repo: &Path, args: &[&str]) -> Result<String> {
        let out = Self::output(repo, args)?;
        if !out.status.success() {
            return Err(anyhow!(
                "command failed: git {:?}\nstdout:{}\nstderr:{}",
                args,
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl VcsAdapter for GitAdapter {
    fn name(&self) -> &'static str {
        "git"
    }

    fn current_branch(&self, repo_root: &Path) -> Result<String> {
        let head = Self::run(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        if head == "HEAD" {
            return Err(anyhow!("detached HEAD in {}", repo_root.display()));
        }
        Ok(head)
    }

    fn branch_exists(&self, repo_root: &Path, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        let out = Self::output(repo_root, &["rev-parse", "--verify", "--quiet", &refname])?;
        Ok(out.status.success())
    }

    fn create_branch(&self, repo_root: &Path, branch: &str) -> Result<()> {
        Self::run(repo_root, &["checkout", "-b", branch])?;
        info!(branch, "created branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_vcs::contract::{init_git_repo, run_vcs_contract_suite};
    use tempfile::tempdir;

    #[test]
    fn git_adapter_contract() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path()).unwrap();
        run_vcs_contract_suite(&GitAdapter::new(), dir.path()).unwrap();
    }

    #[test]
    fn outside_a_repo_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(GitAdapter::new().current_branch(dir.path()).is_err());
    }
}
