//! Cooperative task scheduler.
//!
//! A [`Task`] advances a bounded slice of work per [`Task::run_step`] call;
//! the [`Runner`] drives an ordered stack of tasks to completion, always
//! finishing the task on top of the stack before ticking the one beneath it.

use tracing::{debug, warn};

use crate::error::BakeError;

/// One unit of cooperatively-scheduled work.
///
/// `run_step` must perform at most one bounded slice of work and return;
/// `finish` is called exactly once, after the step that returned `true`,
/// to read back results and (for solver tasks) invoke the image writer.
pub trait Task {
    fn run_step(&mut self) -> bool;
    fn finish(&mut self) -> Result<(), BakeError>;
    fn progress(&self) -> f32;
    fn name(&self) -> &str;
}

/// Drives a LIFO stack of tasks to completion.
///
/// The stack is single-threaded and cooperatively preemptive at slice
/// boundaries only — nothing here suspends mid-`run_step`.
#[derive(Default)]
pub struct Runner {
    tasks: Vec<Box<dyn Task>>,
}

impl Runner {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Pushes a task onto the top of the stack. Callers push the mapping
    /// task first so it ends up at the bottom.
    pub fn push(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advances the top-of-stack task by one slice. Returns `false` once the
    /// stack is empty (nothing left to tick).
    pub fn tick(&mut self) -> Result<bool, BakeError> {
        let Some(top) = self.tasks.last_mut() else {
            return Ok(false);
        };

        let done = top.run_step();
        if !done {
            return Ok(true);
        }

        let mut task = self.tasks.pop().expect("just borrowed the top task");
        debug!(task = task.name(), "task complete, finishing");
        match task.finish() {
            Ok(()) => Ok(true),
            Err(err) if !err.is_fatal() => {
                warn!(task = task.name(), error = %err, "non-fatal task failure, continuing");
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    /// Ticks every task on the stack to completion, in order, returning on
    /// the first fatal error.
    pub fn run_to_completion(&mut self) -> Result<(), BakeError> {
        while self.tick()? {}
        Ok(())
    }
}
