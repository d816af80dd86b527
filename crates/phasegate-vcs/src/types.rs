use std::path::Path;

use anyhow::Result;

/// Label reported when the branch cannot be determined.
pub const UNKNOWN_BRANCH: &str = "<unknown>";

/// The slice of version control the gate needs: which branch is checked out,
/// and creating one when a task starts on a branch that does not exist yet.
pub trait VcsAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Short name of the checked-out branch. Detached HEAD is an error.
    fn current_branch(&self, repo_root: &Path) -> Result<String>;

    fn branch_exists(&self, repo_root: &Path, branch: &str) -> Result<bool>;

    /// Create `branch` from HEAD and check it out.
    fn create_branch(&self, repo_root: &Path, branch: &str) -> Result<()>;
}
