//! Periodic task scheduler.
//!
//! One background thread runs a fixed roster of named tasks on a shared
//! tick.  Tasks are registered up front and toggled on and off at runtime;
//! a one-shot task is just a handler that deactivates itself through a
//! [`SchedulerHandle`] clone on its first run.
//!
//! Handlers run on the scheduler thread, sequentially, in registration
//! order.  A handler returning `Err` is logged and the task stays active;
//! errors never stop the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Error type for scheduler roster operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// A task with this name is already registered.
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),
    /// No task with this name is registered.
    #[error("no task named '{0}'")]
    UnknownTask(String),
}

type TaskHandler = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

struct TaskSlot {
    name: String,
    active: Arc<AtomicBool>,
    handler: Arc<Mutex<TaskHandler>>,
}

struct SchedulerInner {
    tasks: Mutex<Vec<TaskSlot>>,
    tick: Mutex<Duration>,
    stop: AtomicBool,
    running: AtomicBool,
}

impl SchedulerInner {
    fn find_active(&self, name: &str) -> Result<Arc<AtomicBool>, SchedulerError> {
        self.tasks
            .lock()
            .expect("scheduler roster lock poisoned")
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| Arc::clone(&slot.active))
            .ok_or_else(|| SchedulerError::UnknownTask(name.to_string()))
    }
}

/// Owner-side scheduler: registers tasks, starts and stops the loop.
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
    thread: Option<JoinHandle<()>>,
}

/// Cheaply cloneable control handle, safe to move into task handlers.
/// This is how a one-shot task deactivates itself without deadlocking on
/// the roster lock.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<SchedulerInner>,
}

impl TaskScheduler {
    /// Creates a stopped scheduler with the given tick interval.
    pub fn new(tick: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                tasks: Mutex::new(Vec::new()),
                tick: Mutex::new(tick),
                stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
            thread: None,
        }
    }

    /// A control handle for activating/deactivating tasks from elsewhere.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Registers a named task, initially inactive.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::DuplicateTask`] when the name is taken.
    pub fn add_task(
        &self,
        name: &str,
        handler: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Result<(), SchedulerError> {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .expect("scheduler roster lock poisoned");
        if tasks.iter().any(|slot| slot.name == name) {
            return Err(SchedulerError::DuplicateTask(name.to_string()));
        }
        tasks.push(TaskSlot {
            name: name.to_string(),
            active: Arc::new(AtomicBool::new(false)),
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });
        Ok(())
    }

    /// Starts the scheduler thread.  Starting an already-running scheduler
    /// is a no-op with a logged warning.
    pub fn start(&mut self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("scheduler already running, start ignored");
            return;
        }
        self.inner.stop.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        self.thread = Some(
            thread::Builder::new()
                .name("task-scheduler".to_string())
                .spawn(move || run_loop(inner))
                .expect("failed to spawn scheduler thread"),
        );
    }

    /// Requests the loop to stop after the current tick and waits for the
    /// thread to exit.
    pub fn shutdown(&mut self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SchedulerHandle {
    /// Activates a task; idempotent.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownTask`] for unregistered names.
    pub fn activate(&self, name: &str) -> Result<(), SchedulerError> {
        self.inner.find_active(name)?.store(true, Ordering::SeqCst);
        debug!(task = name, "task activated");
        Ok(())
    }

    /// Deactivates a task; idempotent.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownTask`] for unregistered names.
    pub fn deactivate(&self, name: &str) -> Result<(), SchedulerError> {
        self.inner.find_active(name)?.store(false, Ordering::SeqCst);
        debug!(task = name, "task deactivated");
        Ok(())
    }

    /// Whether a task is currently active.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownTask`] for unregistered names.
    pub fn is_active(&self, name: &str) -> Result<bool, SchedulerError> {
        Ok(self.inner.find_active(name)?.load(Ordering::SeqCst))
    }

    /// Changes the tick interval.  Takes effect from the next tick.
    pub fn set_tick(&self, tick: Duration) {
        *self.inner.tick.lock().expect("scheduler tick lock poisoned") = tick;
    }

    /// Requests the loop to stop; does not wait.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
    }
}

/// How often the sleeping loop re-checks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

fn run_loop(inner: Arc<SchedulerInner>) {
    debug!("scheduler loop started");
    'ticks: loop {
        // Sleep one tick in short slices so shutdown stays prompt and a
        // set_tick during the wait is picked up on the next tick.
        let tick = *inner.tick.lock().expect("scheduler tick lock poisoned");
        let deadline = Instant::now() + tick;
        loop {
            if inner.stop.load(Ordering::SeqCst) {
                break 'ticks;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }

        // Snapshot the roster so handlers may mutate task state (e.g.
        // deactivate themselves) without deadlocking on the roster lock.
        let slots: Vec<(String, Arc<AtomicBool>, Arc<Mutex<TaskHandler>>)> = inner
            .tasks
            .lock()
            .expect("scheduler roster lock poisoned")
            .iter()
            .map(|slot| {
                (
                    slot.name.clone(),
                    Arc::clone(&slot.active),
                    Arc::clone(&slot.handler),
                )
            })
            .collect();

        for (name, active, handler) in slots {
            if inner.stop.load(Ordering::SeqCst) {
                break 'ticks;
            }
            if !active.load(Ordering::SeqCst) {
                continue;
            }
            let result = {
                let mut handler = handler.lock().expect("task handler lock poisoned");
                handler()
            };
            if let Err(e) = result {
                warn!(task = %name, "task failed: {e:#}");
            }
        }
    }
    inner.running.store(false, Ordering::SeqCst);
    debug!("scheduler loop stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: Arc<AtomicUsize>) -> impl FnMut() -> anyhow::Result<()> + Send {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_add_task_rejects_duplicate_names() {
        let scheduler = TaskScheduler::new(Duration::from_millis(10));
        scheduler.add_task("poll", || Ok(())).unwrap();
        assert_eq!(
            scheduler.add_task("poll", || Ok(())),
            Err(SchedulerError::DuplicateTask("poll".to_string()))
        );
    }

    #[test]
    fn test_activate_unknown_task_is_an_error() {
        let scheduler = TaskScheduler::new(Duration::from_millis(10));
        assert_eq!(
            scheduler.handle().activate("ghost"),
            Err(SchedulerError::UnknownTask("ghost".to_string()))
        );
    }

    #[test]
    fn test_tasks_start_inactive_and_activation_is_idempotent() {
        let scheduler = TaskScheduler::new(Duration::from_millis(10));
        scheduler.add_task("poll", || Ok(())).unwrap();
        let handle = scheduler.handle();

        assert!(!handle.is_active("poll").unwrap());
        handle.activate("poll").unwrap();
        handle.activate("poll").unwrap();
        assert!(handle.is_active("poll").unwrap());
    }

    #[test]
    fn test_active_task_runs_on_each_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::new(Duration::from_millis(5));
        scheduler
            .add_task("count", counting_task(Arc::clone(&counter)))
            .unwrap();
        scheduler.handle().activate("count").unwrap();

        scheduler.start();
        thread::sleep(Duration::from_millis(60));
        scheduler.shutdown();

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_inactive_task_never_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::new(Duration::from_millis(5));
        scheduler
            .add_task("idle", counting_task(Arc::clone(&counter)))
            .unwrap();

        scheduler.start();
        thread::sleep(Duration::from_millis(30));
        scheduler.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_shot_task_deactivates_itself() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::new(Duration::from_millis(5));
        let handle = scheduler.handle();
        let inner_handle = handle.clone();
        let inner_counter = Arc::clone(&counter);
        scheduler
            .add_task("once", move || {
                inner_counter.fetch_add(1, Ordering::SeqCst);
                inner_handle.deactivate("once")?;
                Ok(())
            })
            .unwrap();
        handle.activate("once").unwrap();

        scheduler.start();
        thread::sleep(Duration::from_millis(60));
        scheduler.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active("once").unwrap());
    }

    #[test]
    fn test_failing_task_stays_active_and_loop_continues() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = TaskScheduler::new(Duration::from_millis(5));
        let failing_counter = Arc::clone(&counter);
        scheduler
            .add_task("flaky", move || {
                failing_counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("transient failure")
            })
            .unwrap();
        let handle = scheduler.handle();
        handle.activate("flaky").unwrap();

        scheduler.start();
        thread::sleep(Duration::from_millis(40));
        scheduler.shutdown();

        assert!(counter.load(Ordering::SeqCst) >= 2);
        assert!(handle.is_active("flaky").unwrap());
    }

    #[test]
    fn test_double_start_is_a_noop() {
        let mut scheduler = TaskScheduler::new(Duration::from_millis(5));
        scheduler.start();
        scheduler.start();
        scheduler.shutdown();
    }

    #[test]
    fn test_shutdown_stops_promptly_despite_long_tick() {
        let mut scheduler = TaskScheduler::new(Duration::from_secs(3600));
        scheduler.start();
        let started = Instant::now();
        scheduler.shutdown();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
