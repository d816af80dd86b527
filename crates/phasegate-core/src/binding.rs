use crate::{GateError, Task};

/// Branch binding: a write is only allowed on the branch the active task was started on.
/// No active task means nothing to enforce.
pub fn check_binding(active_task: Option<&Task>, current_branch: &str) -> Result<(), GateError> {
    match active_task {
        None => Ok(()),
        Some(task) if task.bound_branch == current_branch => Ok(()),
        Some(task) => Err(GateError::BindingViolation {
            expected: task.bound_branch.clone(),
            actual: current_branch.to_string(),
        }),
    }
}
