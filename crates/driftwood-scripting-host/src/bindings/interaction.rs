use std::collections::HashSet;
use std::sync::Arc;

use mlua::{Function, Lua, Value};
use parking_lot::RwLock;
use tracing::{debug, error, info};

use super::{arg_error, load_handler, store_handler, Binding, DispatchError, SessionSlot};
use crate::marshal::interaction::build_context;
use crate::marshal::{lua_string, type_name, InteractionEvent};
use crate::platform::PlatformSession;
use crate::runner::Runner;

const NAME: &str = "interaction_event";

fn registry_key(custom_id: &str) -> String {
    format!("driftwood.component.{}", custom_id)
}

/// Routes button presses and select-menu choices to script handlers by custom id
pub struct ComponentBinding {
    custom_ids: Arc<RwLock<HashSet<String>>>,
    session: SessionSlot,
    runner: Runner,
}

impl ComponentBinding {
    pub fn new(runner: Runner) -> Self {
        Self {
            custom_ids: Arc::new(RwLock::new(HashSet::new())),
            session: SessionSlot::new(),
            runner,
        }
    }
}

impl Binding for ComponentBinding {
    fn name(&self) -> &'static str {
        NAME
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let custom_ids = Arc::clone(&self.custom_ids);

        lua.create_function(move |lua, (custom_id, handler): (Value, Value)| {
            let custom_id = match custom_id {
                Value::String(s) => lua_string(&s),
                other => {
                    return Err(arg_error(
                        NAME,
                        1,
                        format!("expected string, got {}", type_name(&other)),
                    ))
                }
            };
            if custom_id.is_empty() {
                return Err(arg_error(NAME, 1, "custom id must not be empty"));
            }
            let handler = match handler {
                Value::Function(f) => f,
                other => {
                    return Err(arg_error(
                        NAME,
                        2,
                        format!("expected function, got {}", type_name(&other)),
                    ))
                }
            };

            store_handler(lua, &registry_key(&custom_id), handler)?;
            debug!(target: "scripting", "Registered component handler for {}", custom_id);
            custom_ids.write().insert(custom_id);
            Ok(())
        })
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }

    fn can_handle(&self, event: &InteractionEvent) -> bool {
        event
            .custom_id()
            .is_some_and(|id| self.custom_ids.read().contains(id))
    }

    fn handle(&self, event: &InteractionEvent) -> Result<(), DispatchError> {
        let Some(custom_id) = event.custom_id() else {
            return Err(DispatchError::Unsupported(NAME));
        };
        if !self.custom_ids.read().contains(custom_id) {
            return Err(DispatchError::NotRegistered(custom_id.to_string()));
        }

        info!(target: "scripting", "Handling component {} (interaction {})", custom_id, event.id);
        let custom_id = custom_id.to_string();
        let session = self.session.get();
        let event = event.clone();

        self.runner.run(move |lua| {
            let result = load_handler(lua, &registry_key(&custom_id)).and_then(|handler| {
                let handler = handler.ok_or_else(|| {
                    mlua::Error::runtime(format!("handler for {} is missing", custom_id))
                })?;
                let ctx = build_context(lua, &event, session)?;
                handler.call::<()>(ctx)
            });

            if let Err(e) = result {
                error!(target: "scripting", "Component handler {} failed: {}", custom_id, e);
            }
        })?;

        Ok(())
    }
}
