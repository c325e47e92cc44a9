use std::collections::HashMap;
use std::sync::Arc;

use mlua::{Function, Lua, Value};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{arg_error, load_handler, marshal_arg_error, platform_error, store_handler};
use super::{Binding, DispatchError};
use crate::marshal::command::parse_command;
use crate::marshal::interaction::{build_context, command_dispatch_key};
use crate::marshal::{type_name, CommandSpec, InteractionEvent, InteractionKind};
use crate::platform::{PlatformError, PlatformSession};
use crate::runner::Runner;

const NAME: &str = "register_application_command";

/// A registration queued until the platform session is available
struct DeferredRegistration {
    command: String,
    register: Box<dyn FnOnce(&dyn PlatformSession) -> Result<(), PlatformError> + Send>,
}

#[derive(Default)]
struct CommandState {
    /// Dispatch key to the registry name of its handler
    handlers: HashMap<String, String>,
    pending: Vec<DeferredRegistration>,
    session: Option<Arc<dyn PlatformSession>>,
}

/// Registers application commands and routes their invocations to scripts
pub struct CommandBinding {
    state: Arc<Mutex<CommandState>>,
    runner: Runner,
}

impl CommandBinding {
    pub fn new(runner: Runner) -> Self {
        Self {
            state: Arc::new(Mutex::new(CommandState::default())),
            runner,
        }
    }

    /// Dispatch keys that currently have a handler, sorted
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.state.lock().handlers.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registrations waiting for a session
    pub fn pending_registrations(&self) -> usize {
        self.state.lock().pending.len()
    }
}

fn registry_key(dispatch_key: &str) -> String {
    format!("driftwood.command.{}", dispatch_key)
}

/// Send a command to the platform now, or queue it until a session exists
fn register_or_defer(state: &Mutex<CommandState>, spec: CommandSpec) -> Result<(), PlatformError> {
    let session = {
        let mut state = state.lock();
        match &state.session {
            Some(session) => Arc::clone(session),
            None => {
                debug!(target: "scripting", "Deferring registration of command {}", spec.name);
                state.pending.push(DeferredRegistration {
                    command: spec.name.clone(),
                    register: Box::new(move |session| session.create_command(&spec)),
                });
                return Ok(());
            }
        }
    };

    session.create_command(&spec)?;
    info!(target: "scripting", "Registered command {}", spec.name);
    Ok(())
}

impl Binding for CommandBinding {
    fn name(&self) -> &'static str {
        NAME
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let state = Arc::clone(&self.state);

        lua.create_function(move |lua, descriptor: Value| {
            let descriptor = match descriptor {
                Value::Table(table) => table,
                other => {
                    return Err(arg_error(
                        NAME,
                        1,
                        format!("expected table, got {}", type_name(&other)),
                    ))
                }
            };

            let parsed = parse_command(&descriptor).map_err(|e| marshal_arg_error(NAME, 1, e))?;
            let name = parsed.spec.name.clone();

            if parsed.has_subcommand_groups {
                warn!(
                    target: "scripting",
                    "Command {} uses subcommand groups; invocations through a group dispatch to '{}'",
                    name,
                    name
                );
            }

            let mut handlers = Vec::new();
            match parsed.handler {
                Some(handler) if parsed.subcommand_handlers.is_empty() => {
                    handlers.push((name.clone(), handler));
                }
                Some(_) => warn!(
                    target: "scripting",
                    "Ignoring top-level handler of command {} because it has subcommand handlers",
                    name
                ),
                None => {}
            }
            handlers.extend(parsed.subcommand_handlers);

            for (key, handler) in handlers {
                let registry_name = registry_key(&key);
                store_handler(lua, &registry_name, handler)?;
                debug!(target: "scripting", "Recorded handler for {}", key);
                state.lock().handlers.insert(key, registry_name);
            }

            register_or_defer(&state, parsed.spec).map_err(|e| {
                platform_error(&format!("register command '{}'", name), e)
            })
        })
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        let pending = {
            let mut state = self.state.lock();
            state.session = Some(Arc::clone(&session));
            std::mem::take(&mut state.pending)
        };

        if !pending.is_empty() {
            info!(
                target: "scripting",
                "Replaying {} deferred command registration(s)",
                pending.len()
            );
        }

        for deferred in pending {
            match (deferred.register)(session.as_ref()) {
                Ok(()) => info!(target: "scripting", "Registered command {}", deferred.command),
                Err(e) => error!(
                    target: "scripting",
                    "Failed to register command {}: {}",
                    deferred.command,
                    e
                ),
            }
        }
    }

    fn can_handle(&self, event: &InteractionEvent) -> bool {
        event.is_command()
    }

    fn handle(&self, event: &InteractionEvent) -> Result<(), DispatchError> {
        let InteractionKind::ApplicationCommand { name, options } = &event.kind else {
            return Err(DispatchError::Unsupported(NAME));
        };

        let key = command_dispatch_key(name, options);
        let (registry_name, session) = {
            let state = self.state.lock();
            match state.handlers.get(&key) {
                Some(registry_name) => (registry_name.clone(), state.session.clone()),
                None => {
                    warn!(target: "scripting", "Command {} is not registered", key);
                    return Err(DispatchError::NotRegistered(key));
                }
            }
        };

        info!(target: "scripting", "Handling command {} (interaction {})", key, event.id);
        let event = event.clone();

        self.runner.run(move |lua| {
            let result = load_handler(lua, &registry_name).and_then(|handler| {
                let handler = handler.ok_or_else(|| {
                    mlua::Error::runtime(format!("handler {} is missing", registry_name))
                })?;
                let ctx = build_context(lua, &event, session)?;
                handler.call::<()>(ctx)
            });

            match result {
                Ok(()) => debug!(target: "scripting", "Command {} handled", key),
                Err(e) => error!(target: "scripting", "Command handler {} failed: {}", key, e),
            }
        })?;

        Ok(())
    }
}
