use mlua::Lua;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Name given to the worker thread that owns the interpreter
const WORKER_THREAD_NAME: &str = "driftwood-lua";

/// The process-wide runner, created on first use
static GLOBAL_RUNNER: OnceLock<Runner> = OnceLock::new();

/// A unit of work that needs the interpreter
pub type Task = Box<dyn FnOnce(&Lua) + Send + 'static>;

/// Errors surfaced to callers of the runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn script worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("script worker is no longer running")]
    Closed,

    #[error("script task panicked")]
    TaskPanicked,

    #[error("script task submitted from inside the script worker")]
    Reentrant,
}

/// Serializes every access to the single Lua interpreter.
///
/// One dedicated thread owns the `Lua` state and executes submitted tasks
/// strictly one at a time, in the order they were accepted. Cloning a runner
/// clones the submission handle; all clones feed the same worker.
///
/// Tasks must never call back into the runner that is executing them. They
/// receive the interpreter directly and use it instead.
#[derive(Clone, Debug)]
pub struct Runner {
    tx: mpsc::Sender<Task>,
    worker: ThreadId,
}

impl Runner {
    /// Spawn a new worker thread with a fresh interpreter
    pub fn new() -> Result<Self, RunnerError> {
        let (tx, rx) = mpsc::channel::<Task>();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(rx))?;

        Ok(Self {
            tx,
            worker: handle.thread().id(),
        })
    }

    /// Get the process-wide runner, creating it on first use
    pub fn global() -> Result<&'static Runner, RunnerError> {
        if let Some(runner) = GLOBAL_RUNNER.get() {
            return Ok(runner);
        }

        // A losing racer's runner is dropped here and its worker exits
        let runner = Runner::new()?;
        Ok(GLOBAL_RUNNER.get_or_init(|| runner))
    }

    /// Queue a task without waiting for it to run
    pub fn submit<F>(&self, task: F) -> Result<(), RunnerError>
    where
        F: FnOnce(&Lua) + Send + 'static,
    {
        self.tx.send(Box::new(task)).map_err(|_| RunnerError::Closed)
    }

    /// Run a task and block the calling thread until it has finished
    pub fn run<F>(&self, task: F) -> Result<(), RunnerError>
    where
        F: FnOnce(&Lua) + Send + 'static,
    {
        self.call(task)
    }

    /// Run a task, block until it has finished and hand back its result
    pub fn call<F, R>(&self, task: F) -> Result<R, RunnerError>
    where
        F: FnOnce(&Lua) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_worker_thread() {
            return Err(RunnerError::Reentrant);
        }

        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.submit(move |lua| {
            let _ = done_tx.send(task(lua));
        })?;

        // The sender is dropped without a value when the task unwinds
        done_rx.recv().map_err(|_| RunnerError::TaskPanicked)
    }

    /// Run a task from async code without blocking the executor thread
    pub async fn call_async<F, R>(&self, task: F) -> Result<R, RunnerError>
    where
        F: FnOnce(&Lua) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(move |lua| {
            let _ = done_tx.send(task(lua));
        })?;

        done_rx.await.map_err(|_| RunnerError::TaskPanicked)
    }

    /// Whether the current thread is this runner's worker
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker
    }
}

fn worker_loop(rx: mpsc::Receiver<Task>) {
    let lua = Lua::new();
    debug!(target: "scripting", "Script worker started");

    let mut executed: u64 = 0;
    for task in rx {
        executed += 1;
        if let Err(e) = catch_unwind(AssertUnwindSafe(|| task(&lua))) {
            error!(
                target: "scripting",
                "Script task #{} panicked: {}",
                executed,
                panic_message(&e)
            );
        }
    }

    debug!(target: "scripting", "Script worker stopped after {} task(s)", executed);
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
