use phasegate_core::{now_unix, Event, EventKind, GateError, Task, TaskStatus, WorkflowMode};
use tracing::{info, warn};

use crate::engine::Engine;

impl Engine {
    /// Start a task bound to `branch` and switch to execution mode. With
    /// `create_branch`, a branch missing from the working copy is created and
    /// checked out first. The active-task check, the branch creation and the
    /// write happen under one lock.
    pub fn start(&self, description: &str, branch: &str, create_branch: bool) -> Result<Task, GateError> {
        let now = now_unix();
        let task = Task::start(description, branch, now);
        let mut created = false;
        self.store.update_tasks(&mut |map| {
            if let Some(active) = &map.active_task {
                return Err(GateError::TaskAlreadyActive {
                    task_id: active.id.clone(),
                    branch: active.bound_branch.clone(),
                });
            }
            if create_branch && !created {
                created = self.ensure_branch(branch)?;
            }
            map.active_task = Some(task.clone());
            Ok(())
        })?;
        if created {
            self.record(Event::new(EventKind::BranchCreated, format!("created branch {branch}"), now));
        }
        self.mode_after_commit(WorkflowMode::Execution);

        info!(task = %task.id, branch, "task started");
        self.record(Event::new(EventKind::TaskStarted, task.description.clone(), now).with_task(&task.id));
        Ok(task)
    }

    /// Create and check out `branch` unless it exists. True when created.
    fn ensure_branch(&self, branch: &str) -> Result<bool, GateError> {
        let exists = self
            .vcs
            .branch_exists(&self.repo_root, branch)
            .map_err(|e| GateError::Vcs(format!("{e:#}")))?;
        if exists {
            return Ok(false);
        }
        self.vcs
            .create_branch(&self.repo_root, branch)
            .map_err(|e| GateError::Vcs(format!("{e:#}")))?;
        Ok(true)
    }

    /// The task map is already written; a failed mode write must not report
    /// the whole operation as failed.
    fn mode_after_commit(&self, mode: WorkflowMode) {
        if let Err(e) = self.set_mode(mode) {
            warn!(error = %e, ?mode, "task state saved but mode not updated");
        }
    }

    pub fn complete(&self) -> Result<Task, GateError> {
        let task = self.finish(TaskStatus::Completed)?;
        info!(task = %task.id, "task completed");
        self.record(Event::new(EventKind::TaskCompleted, task.description.clone(), now_unix()).with_task(&task.id));
        Ok(task)
    }

    /// Abandon the active task. Recorded as an emergency bypass.
    pub fn cancel(&self) -> Result<Task, GateError> {
        let task = self.finish(TaskStatus::Cancelled)?;
        warn!(task = %task.id, branch = %task.bound_branch, "EMERGENCY BYPASS: task cancelled");
        self.record(
            Event::new(EventKind::EmergencyBypass, format!("cancelled: {}", task.description), now_unix())
                .with_task(&task.id),
        );
        Ok(task)
    }

    fn finish(&self, status: TaskStatus) -> Result<Task, GateError> {
        let now = now_unix();
        let mut finished = None;
        self.store.update_tasks(&mut |map| {
            let task = map.active_task.take().ok_or(GateError::NoActiveTask)?;
            let task = task.finish(status, now);
            map.task_history.push(task.clone());
            finished = Some(task);
            Ok(())
        })?;
        let task = finished.ok_or(GateError::NoActiveTask)?;
        self.mode_after_commit(WorkflowMode::Discussion);
        Ok(task)
    }

    pub fn status(&self) -> Result<Option<Task>, GateError> {
        Ok(self.store.read_tasks()?.active_task)
    }

    /// Archived tasks, most recent first.
    pub fn history(&self, limit: usize) -> Result<Vec<Task>, GateError> {
        let map = self.store.read_tasks()?;
        Ok(map.task_history.into_iter().rev().take(limit).collect())
    }

    /// Enforce without a task, e.g. for a review session.
    pub fn activate(&self) -> Result<(), GateError> {
        self.set_mode(WorkflowMode::Execution)?;
        info!("workflow activated");
        self.record(Event::new(EventKind::WorkflowActivated, "workflow activated", now_unix()));
        Ok(())
    }

    /// Back to discussion mode. An active task keeps the workflow active regardless.
    pub fn deactivate(&self) -> Result<(), GateError> {
        self.set_mode(WorkflowMode::Discussion)?;
        info!("workflow deactivated");
        self.record(Event::new(EventKind::WorkflowDeactivated, "workflow deactivated", now_unix()));
        Ok(())
    }
}
