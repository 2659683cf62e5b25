//! Post-phase tasks.
//!
//! Work queued here runs once the write phase has finished. [`FinishTasks::join`]
//! consumes the queue, so every task runs at most once per build.

/// Error returned by a finish task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

type Task = Box<dyn FnOnce() -> Result<(), TaskError> + Send>;

/// Ordered queue of deferred, run-once actions.
#[derive(Default)]
pub struct FinishTasks {
    tasks: Vec<(&'static str, Task)>,
}

/// Outcome of [`FinishTasks::join`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl FinishTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task to run after the write phase.
    pub fn add_task<F>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.tasks.push((name, Box::new(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every queued task in order.
    ///
    /// A failing task is logged and does not stop the ones after it.
    pub fn join(self) -> TaskSummary {
        let mut summary = TaskSummary::default();

        for (name, task) in self.tasks {
            match task() {
                Ok(()) => {
                    tracing::debug!("Finished task: {}", name);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Task '{}' failed: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn runs_each_task_once_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = FinishTasks::new();

        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            tasks.add_task(name, move || {
                order.lock().unwrap().push(name);
                Ok(())
            });
        }
        assert_eq!(tasks.len(), 2);

        let summary = tasks.join();

        assert_eq!(summary, TaskSummary { succeeded: 2, failed: 0 });
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn failures_do_not_stop_later_tasks() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut tasks = FinishTasks::new();

        tasks.add_task("broken", || Err("missing conf.py".into()));
        let counter = Arc::clone(&runs);
        tasks.add_task("counted", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let summary = tasks.join();

        assert_eq!(summary, TaskSummary { succeeded: 1, failed: 1 });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
