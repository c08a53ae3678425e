//! Named periodic worker threads with a shared stop flag.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use log::{error, info};

/// Runs periodic loops on dedicated threads.
///
/// Every loop checks one shared running flag once per iteration and sleeps
/// for its period between ticks, so shutdown completes within one tick.
pub struct TaskManager {
    running: Arc<AtomicBool>,
    tasks: Vec<TaskInfo>,
}

struct TaskInfo {
    name: String,
    handle: JoinHandle<()>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawns a thread calling `tick` every `period` until shutdown.
    pub fn spawn_periodic<F>(&mut self, name: impl Into<String>, period: Duration, mut tick: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let running = Arc::clone(&self.running);
        let task_name = name.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                info!("Starting task: {task_name}");
                while running.load(Ordering::Acquire) {
                    tick();
                    thread::sleep(period);
                }
                info!("Task '{task_name}' stopped");
            })
            .with_context(|| format!("Failed to spawn task '{name}'"))?;

        self.tasks.push(TaskInfo { name, handle });
        Ok(())
    }

    /// Clears the running flag and joins every task.
    ///
    /// Returns an error naming the first task that panicked.
    pub fn shutdown_all(&mut self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }
        info!("Stopping all {} tasks", self.tasks.len());
        self.running.store(false, Ordering::Release);

        let mut first_error = None;
        for task in self.tasks.drain(..) {
            if task.handle.join().is_err() {
                let e = anyhow!("Task '{}' panicked", task.name);
                error!("{e}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e).context("One or more tasks failed during shutdown"),
            None => {
                info!("All tasks stopped");
                Ok(())
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_all() {
            error!("{e:#}");
        }
    }
}
