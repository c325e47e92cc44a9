use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use mlua::{Function, Lua, Value};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::bindings::{arg_error, load_handler, store_handler};
use crate::marshal::type_name;
use crate::runner::{Runner, RunnerError};

const NAME: &str = "on_ready";

/// Collects `on_ready` callbacks and runs them once the platform is ready
#[derive(Clone, Default)]
pub struct ReadyRegistrar {
    ids: Arc<Mutex<Vec<String>>>,
    sequence: Arc<AtomicU64>,
}

impl ReadyRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for readiness
    pub fn pending(&self) -> usize {
        self.ids.lock().len()
    }

    fn next_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("on_ready_{}_{}", nanos, sequence)
    }

    /// The `on_ready(fn)` function exposed to scripts
    pub fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let registrar = self.clone();

        lua.create_function(move |lua, handler: Value| {
            let handler = match handler {
                Value::Function(f) => f,
                other => {
                    return Err(arg_error(
                        NAME,
                        1,
                        format!("expected function, got {}", type_name(&other)),
                    ))
                }
            };

            let id = registrar.next_id();
            store_handler(lua, &registry_key(&id), handler)?;
            debug!(target: "scripting", "Registered ready callback {}", id);
            registrar.ids.lock().push(id);
            Ok(())
        })
    }

    /// Queue every registered callback on the runner, in registration order.
    ///
    /// The list is drained, so a second readiness signal runs nothing.
    pub fn fire(&self, runner: &Runner) -> Result<usize, RunnerError> {
        let ids = std::mem::take(&mut *self.ids.lock());
        if ids.is_empty() {
            return Ok(0);
        }

        info!(target: "scripting", "Running {} ready callback(s)", ids.len());
        let count = ids.len();
        for id in ids {
            runner.submit(move |lua| run_callback(lua, &id))?;
        }
        Ok(count)
    }
}

fn registry_key(id: &str) -> String {
    format!("driftwood.ready.{}", id)
}

fn run_callback(lua: &Lua, id: &str) {
    let key = registry_key(id);
    let result = load_handler(lua, &key).and_then(|handler| {
        lua.unset_named_registry_value(&key)?;
        match handler {
            Some(handler) => handler.call::<()>(()),
            None => Err(mlua::Error::runtime("callback is missing")),
        }
    });

    match result {
        Ok(()) => debug!(target: "scripting", "Ready callback {} finished", id),
        Err(e) => error!(target: "scripting", "Ready callback {} failed: {}", id, e),
    }
}
