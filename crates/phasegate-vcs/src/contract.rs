use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};

use crate::types::VcsAdapter;

/// Shared adapter contract suite, run against a freshly initialized repo.
pub fn run_vcs_contract_suite(adapter: &dyn VcsAdapter, repo_root: &Path) -> Result<()> {
    let start = adapter.current_branch(repo_root)?;
    if start.is_empty() {
        return Err(anyhow!("expected a named branch after init"));
    }
    if !adapter.branch_exists(repo_root, &start)? {
        return Err(anyhow!("current branch {start} not reported as existing"));
    }

    let branch = "feature/contract";
    if adapter.branch_exists(repo_root, branch)? {
        return Err(anyhow!("{branch} should not exist yet"));
    }
    adapter.create_branch(repo_root, branch)?;
    if !adapter.branch_exists(repo_root, branch)? {
        return Err(anyhow!("{branch} missing after create"));
    }
    let now = adapter.current_branch(repo_root)?;
    if now != branch {
        return Err(anyhow!("expected to be on {branch}, got {now}"));
    }

    if adapter.create_branch(repo_root, branch).is_ok() {
        return Err(anyhow!("creating an existing branch should fail"));
    }
    Ok(())
}

/// Initialize a minimal git repo fixture with one commit.
pub fn init_git_repo(dir: &Path) -> Result<()> {
    run(dir, &["git", "init"])?;
    run(dir, &["git", "config", "user.email", "phasegate@example.com"])?;
    run(dir, &["git", "config", "user.name", "phasegate"])?;
    std::fs::write(dir.join("README.md"), "fixture")?;
    run(dir, &["git", "add", "."])?;
    run(dir, &["git", "commit", "-m", "init"])?;
    Ok(())
}

fn run(dir: &Path, args: &[&str]) -> Result<()> {
    let out = Command::new(args[0])
        .args(&args[1..])
        .current_dir(dir)
        .output()
        .with_context(|| format!("run {:?}", args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(())
}
