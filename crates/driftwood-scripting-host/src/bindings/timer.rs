use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mlua::{Function, Lua, Value};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{arg_error, store_handler, Binding};
use crate::marshal::type_name;
use crate::runner::Runner;

/// Unique identifier for a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    fn registry_key(self) -> String {
        format!("driftwood.timer.{}", self.0)
    }
}

/// Schedules delayed script calls on the async runtime.
///
/// Sleeping happens on the runtime; when a timer fires, its callback is queued
/// on the runner like any other script work.
#[derive(Clone)]
pub struct TimerScheduler {
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<TimerId, JoinHandle<()>>>>,
    runner: Runner,
    runtime: Handle,
}

impl TimerScheduler {
    pub fn new(runner: Runner, runtime: Handle) -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            runner,
            runtime,
        }
    }

    /// Number of timers that have not fired or been cancelled
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn schedule(&self, lua: &Lua, delay: Duration, callback: Function) -> mlua::Result<TimerId> {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        store_handler(lua, &id.registry_key(), callback)?;

        let pending = Arc::clone(&self.pending);
        let runner = self.runner.clone();

        // Hold the lock across spawn so the task cannot fire before it is tracked
        let mut guard = self.pending.lock();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if pending.lock().remove(&id).is_none() {
                return;
            }

            let submitted = runner.submit(move |lua| fire(lua, id));
            if let Err(e) = submitted {
                error!(target: "scripting", "Failed to queue timer {}: {}", id.0, e);
            }
        });
        guard.insert(id, task);

        debug!(target: "scripting", "Scheduled timer {} in {:?}", id.0, delay);
        Ok(id)
    }

    fn cancel(&self, lua: &Lua, id: TimerId) -> mlua::Result<bool> {
        match self.pending.lock().remove(&id) {
            Some(task) => {
                task.abort();
                lua.unset_named_registry_value(&id.registry_key())?;
                debug!(target: "scripting", "Cancelled timer {}", id.0);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn fire(lua: &Lua, id: TimerId) {
    let key = id.registry_key();
    let result = lua
        .named_registry_value::<Option<Function>>(&key)
        .and_then(|callback| {
            lua.unset_named_registry_value(&key)?;
            match callback {
                Some(callback) => callback.call::<()>(()),
                None => Ok(()),
            }
        });

    if let Err(e) = result {
        error!(target: "scripting", "Timer {} callback failed: {}", id.0, e);
    }
}

/// `timer.run_after(seconds, fn)`
pub struct RunAfterBinding {
    scheduler: TimerScheduler,
}

impl RunAfterBinding {
    const FUNCTION: &'static str = "timer.run_after";

    pub fn new(scheduler: TimerScheduler) -> Self {
        Self { scheduler }
    }
}

impl Binding for RunAfterBinding {
    fn name(&self) -> &'static str {
        "run_after"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let scheduler = self.scheduler.clone();

        lua.create_function(move |lua, (seconds, callback): (Value, Value)| {
            let seconds = match seconds {
                Value::Integer(n) => n as f64,
                Value::Number(n) => n,
                other => {
                    return Err(arg_error(
                        Self::FUNCTION,
                        1,
                        format!("expected number, got {}", type_name(&other)),
                    ))
                }
            };
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(arg_error(
                    Self::FUNCTION,
                    1,
                    "delay must be a non-negative number of seconds",
                ));
            }

            let callback = match callback {
                Value::Function(f) => f,
                other => {
                    return Err(arg_error(
                        Self::FUNCTION,
                        2,
                        format!("expected function, got {}", type_name(&other)),
                    ))
                }
            };

            let delay = Duration::try_from_secs_f64(seconds)
                .map_err(|_| arg_error(Self::FUNCTION, 1, "delay is too large"))?;
            let id = scheduler.schedule(lua, delay, callback)?;
            Ok(id.0)
        })
    }
}

/// `timer.cancel(id)`
pub struct CancelTimerBinding {
    scheduler: TimerScheduler,
}

impl CancelTimerBinding {
    pub fn new(scheduler: TimerScheduler) -> Self {
        Self { scheduler }
    }
}

impl Binding for CancelTimerBinding {
    fn name(&self) -> &'static str {
        "cancel"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let scheduler = self.scheduler.clone();

        lua.create_function(move |lua, id: Value| match id {
            Value::Integer(n) if n > 0 => scheduler.cancel(lua, TimerId(n as u64)),
            other => Err(arg_error(
                "timer.cancel",
                1,
                format!("expected timer id, got {}", type_name(&other)),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::testing::eval;

    fn install(runner: &Runner, scheduler: &TimerScheduler) {
        let run_after = RunAfterBinding::new(scheduler.clone());
        let cancel = CancelTimerBinding::new(scheduler.clone());
        runner
            .run(move |lua| {
                let timer = lua.create_table().unwrap();
                timer
                    .set(run_after.name(), run_after.entry_point(lua).unwrap())
                    .unwrap();
                timer.set(cancel.name(), cancel.entry_point(lua).unwrap()).unwrap();
                lua.globals().set("timer", timer).unwrap();
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_callback_runs_after_delay() {
        let runner = Runner::new().unwrap();
        let scheduler = TimerScheduler::new(runner.clone(), Handle::current());
        install(&runner, &scheduler);

        let id: i64 = eval(
            &runner,
            "fired = false return timer.run_after(0.05, function() fired = true end)",
        );
        assert!(id > 0);
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Queued behind the timer callback
        let fired = runner
            .call_async(|lua| lua.globals().get::<bool>("fired").unwrap())
            .await
            .unwrap();
        assert!(fired);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_timer_never_fires() {
        let runner = Runner::new().unwrap();
        let scheduler = TimerScheduler::new(runner.clone(), Handle::current());
        install(&runner, &scheduler);

        let cancelled: bool = eval(
            &runner,
            r#"
            fired = false
            local id = timer.run_after(0.05, function() fired = true end)
            return timer.cancel(id) and not timer.cancel(id)
            "#,
        );
        assert!(cancelled);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let fired = runner
            .call_async(|lua| lua.globals().get::<bool>("fired").unwrap())
            .await
            .unwrap();
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_negative_delay_is_rejected() {
        let runner = Runner::new().unwrap();
        let scheduler = TimerScheduler::new(runner.clone(), Handle::current());
        install(&runner, &scheduler);

        let err = runner
            .call_async(|lua| {
                lua.load("timer.run_after(-1, function() end)")
                    .exec()
                    .unwrap_err()
                    .to_string()
            })
            .await
            .unwrap();
        assert!(err.contains("bad argument #1 to 'timer.run_after'"), "{}", err);
    }

    #[tokio::test]
    async fn test_huge_delay_is_rejected() {
        let runner = Runner::new().unwrap();
        let scheduler = TimerScheduler::new(runner.clone(), Handle::current());
        install(&runner, &scheduler);

        let err = runner
            .call_async(|lua| {
                lua.load("timer.run_after(1e300, function() end)")
                    .exec()
                    .unwrap_err()
                    .to_string()
            })
            .await
            .unwrap();
        assert!(
            err.contains("bad argument #1 to 'timer.run_after' (delay is too large)"),
            "{}",
            err
        );
        assert_eq!(scheduler.pending(), 0);

        // The worker survives and keeps serving tasks
        let alive = runner.call_async(|_| true).await.unwrap();
        assert!(alive);
    }
}
