use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{self as chan, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{error, trace};

use crate::ApplyError;

type Task = Box<dyn FnOnce() -> Result<(), ApplyError> + Send + 'static>;

struct Job {
    label: String,
    task: Task,
}

/// A task that returned an error or panicked.
#[derive(Debug)]
pub struct TaskFailure {
    pub label: String,
    pub error: ApplyError,
}

/// What [`WorkQueue::join`] observed since the previous join.
#[derive(Debug, Default)]
#[must_use]
pub struct JoinReport {
    pub completed: usize,
    pub failures: Vec<TaskFailure>,
}

#[derive(Default)]
struct State {
    pending: Mutex<usize>,
    idle: Condvar,
    completed: Mutex<usize>,
    failures: Mutex<Vec<TaskFailure>>,
}

/// Fixed-size worker pool with a join barrier.
///
/// `enqueue` never blocks. `join` blocks until every task enqueued since the
/// queue was created (or since the last `join`) has finished. Task errors
/// and panics are caught at the task boundary, logged, and handed back from
/// `join`; they never stop sibling tasks.
pub struct WorkQueue {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    state: Arc<State>,
}

impl WorkQueue {
    /// Spawn `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Io`] if a worker thread cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, ApplyError> {
        let (tx, rx) = chan::unbounded::<Job>();
        let state = Arc::new(State::default());
        let mut handles = Vec::with_capacity(workers.max(1));

        for id in 0..workers.max(1) {
            let rx = rx.clone();
            let state = Arc::clone(&state);
            let handle = thread::Builder::new()
                .name(format!("apply-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        run_job(&state, job);
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            sender: Some(tx),
            workers: handles,
            state,
        })
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Schedule a task and return immediately.
    pub fn enqueue<F>(&self, label: impl Into<String>, task: F)
    where
        F: FnOnce() -> Result<(), ApplyError> + Send + 'static,
    {
        let job = Job {
            label: label.into(),
            task: Box::new(task),
        };
        *self.state.pending.lock() += 1;

        let job = match &self.sender {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                Err(chan::SendError(job)) => job,
            },
            None => job,
        };
        // Every worker is gone; run on the caller so join still balances.
        run_job(&self.state, job);
    }

    /// Block until all tasks enqueued so far have finished.
    pub fn join(&self) -> JoinReport {
        let mut pending = self.state.pending.lock();
        while *pending > 0 {
            self.state.idle.wait(&mut pending);
        }
        drop(pending);

        JoinReport {
            completed: mem::take(&mut *self.state.completed.lock()),
            failures: mem::take(&mut *self.state.failures.lock()),
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_job(state: &State, job: Job) {
    let Job { label, task } = job;
    trace!(task = %label, "running apply task");

    let error = match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(payload) => Some(ApplyError::TaskPanicked {
            message: panic_message(payload.as_ref()),
        }),
    };

    if let Some(error) = error {
        error!(task = %label, %error, "apply task failed");
        state.failures.lock().push(TaskFailure { label, error });
    }
    *state.completed.lock() += 1;

    let mut pending = state.pending.lock();
    *pending -= 1;
    if *pending == 0 {
        state.idle.notify_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
