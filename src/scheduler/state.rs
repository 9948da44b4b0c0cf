//! Worker-local schedule snapshot.

use crate::scheduler::tasks::{ScheduledTask, TaskId};

/// The schedule as last pushed by the foreground page.
///
/// Owned by exactly one [`ScheduleNotifier`](super::ScheduleNotifier). A new
/// worker lifetime starts from [`ScheduleState::new`]; nothing here is
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    tasks: Vec<ScheduledTask>,
    syncs: u64,
}

impl ScheduleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot.
    ///
    /// Sync order is kept; a later record with an id already seen in the
    /// same sync replaces the earlier one in place. Returns the number of
    /// tasks held afterwards.
    pub fn replace(&mut self, schedules: Vec<ScheduledTask>) -> usize {
        let mut tasks: Vec<ScheduledTask> = Vec::with_capacity(schedules.len());
        for task in schedules {
            match tasks.iter_mut().find(|existing| existing.id == task.id) {
                Some(existing) => *existing = task,
                None => tasks.push(task),
            }
        }
        self.tasks = tasks;
        self.syncs += 1;
        self.tasks.len()
    }

    /// Tasks in sync order.
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Mark a task notified. Returns `true` when found.
    pub fn mark_notified(&mut self, id: &TaskId) -> bool {
        if let Some(task) = self.tasks.iter_mut().find(|task| &task.id == id) {
            task.notified = true;
            return true;
        }
        false
    }

    /// `false` until the first sync of this worker lifetime.
    pub fn is_synced(&self) -> bool {
        self.syncs > 0
    }

    pub fn sync_count(&self) -> u64 {
        self.syncs
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
