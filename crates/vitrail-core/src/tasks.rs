//! Memory tasks: delayed and repeating jobs driven by the event thread.

use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::error::JobError;
use crate::events::EventContext;

/// Shortest event-thread sleep, targeting roughly 30 Hz under load.
pub const MIN_UPDATE_SPEED_MS: u64 = 33;
/// Longest event-thread sleep when idle.
pub const MAX_UPDATE_SPEED_MS: u64 = 1000;

bitflags! {
    /// Behavior flags of a memory task.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TaskFlags: u8 {
        /// A later task with the same id absorbs this task's start time so
        /// the job fires once instead of twice.
        const PROLONG = 1 << 0;
        /// The task re-arms after firing instead of being erased.
        const RETRIGGER = 1 << 1;
    }
}

/// Job closure run when a task expires.
pub type TaskJob = Box<dyn FnMut(&mut EventContext<'_>) -> Result<bool, JobError> + Send>;

/// A deferred or repeating piece of work bound to a time horizon.
pub struct MemoryTask {
    /// When the countdown started.
    pub start_time: Instant,
    /// Delay before the job fires, in milliseconds.
    pub end_time_ms: u64,
    /// The work itself.
    pub job: TaskJob,
    /// PROLONG / RETRIGGER behavior.
    pub flags: TaskFlags,
    /// Identity used for PROLONG merging and failure logs.
    pub id: String,
}

impl std::fmt::Debug for MemoryTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTask")
            .field("end_time_ms", &self.end_time_ms)
            .field("flags", &self.flags)
            .field("id", &self.id)
            .finish()
    }
}

impl MemoryTask {
    /// Create a task whose countdown starts at `now`.
    pub fn new(
        end_time_ms: u64,
        job: TaskJob,
        flags: TaskFlags,
        id: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            start_time: now,
            end_time_ms,
            job,
            flags,
            id: id.into(),
        }
    }
}

/// Merge prolongable tasks sharing a job identity: the earlier task absorbs
/// the later start time and the later task is erased.
pub fn merge_prolonged(tasks: &mut Vec<MemoryTask>) {
    let mut i = 0;
    while i < tasks.len() {
        if tasks[i].flags.contains(TaskFlags::PROLONG) {
            let mut j = i + 1;
            while j < tasks.len() {
                if tasks[j].flags.contains(TaskFlags::PROLONG) && tasks[i].id == tasks[j].id {
                    tasks[i].start_time = tasks[j].start_time;
                    tasks.remove(j);
                    break;
                }
                j += 1;
            }
        }
        i += 1;
    }
}

/// Outcome of one recall pass over the task vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecallOutcome {
    /// Event-thread load in `[0, 1]`; one means a task is due immediately.
    pub load: f32,
}

/// Run expired tasks in place.
///
/// Retriggering tasks reset their start time after firing; one-shot tasks
/// are erased on success and kept for another attempt on a `false` return.
/// A job error erases the task so a broken job cannot loop tightly; the
/// failure is reported through the returned list of `(id, error)` pairs.
pub fn recall(
    tasks: &mut Vec<MemoryTask>,
    ctx: &mut EventContext<'_>,
    now: Instant,
) -> (RecallOutcome, Vec<(String, JobError)>) {
    merge_prolonged(tasks);

    let mut failures = Vec::new();
    let mut shortest_ms = MAX_UPDATE_SPEED_MS;
    let mut i = 0;
    while i < tasks.len() {
        let elapsed = now.saturating_duration_since(tasks[i].start_time);
        let elapsed_ms = elapsed.as_millis() as u64;
        let remaining = tasks[i].end_time_ms.saturating_sub(elapsed_ms);
        shortest_ms = shortest_ms.min(remaining);

        if elapsed_ms > tasks[i].end_time_ms {
            let result = (tasks[i].job)(ctx);
            match result {
                Ok(_) if tasks[i].flags.contains(TaskFlags::RETRIGGER) => {
                    tasks[i].start_time = now;
                }
                Ok(true) => {
                    tasks.remove(i);
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    failures.push((tasks[i].id.clone(), error));
                    tasks.remove(i);
                    continue;
                }
            }
        }
        i += 1;
    }

    let load = 1.0 - (shortest_ms as f32 / MAX_UPDATE_SPEED_MS as f32).clamp(0.0, 1.0);
    (RecallOutcome { load }, failures)
}

/// Next event-thread sleep: the load-interpolated update speed minus the
/// time the tick already consumed, floored at the minimum speed.
pub fn next_sleep(load: f32, elapsed: Duration) -> Duration {
    let span = (MAX_UPDATE_SPEED_MS - MIN_UPDATE_SPEED_MS) as f32;
    let current = MIN_UPDATE_SPEED_MS as f32 + span * (1.0 - load.clamp(0.0, 1.0));
    let remaining = (current - elapsed.as_millis() as f32).max(MIN_UPDATE_SPEED_MS as f32);
    Duration::from_millis(remaining as u64)
}
