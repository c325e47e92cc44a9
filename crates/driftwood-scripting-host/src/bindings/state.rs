use mlua::{Function, Lua, Value};
use tracing::debug;

use super::{arg_error, marshal_arg_error, Binding};
use crate::marshal::{lua_string, type_name, ScriptValue};
use crate::state::StateStore;

fn key_arg(function: &str, value: Value) -> mlua::Result<String> {
    match value {
        Value::String(s) => Ok(lua_string(&s)),
        other => Err(arg_error(
            function,
            1,
            format!("expected string, got {}", type_name(&other)),
        )),
    }
}

/// `state.get(key)`
pub struct GetStateBinding {
    store: StateStore,
}

impl GetStateBinding {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl Binding for GetStateBinding {
    fn name(&self) -> &'static str {
        "get"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let store = self.store.clone();
        lua.create_function(move |lua, key: Value| {
            let key = key_arg("state.get", key)?;
            match store.get(&key) {
                Some(value) => value.to_value(lua),
                None => Ok(Value::Nil),
            }
        })
    }
}

/// `state.set(key, value)`
pub struct SetStateBinding {
    store: StateStore,
}

impl SetStateBinding {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl Binding for SetStateBinding {
    fn name(&self) -> &'static str {
        "set"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let store = self.store.clone();
        lua.create_function(move |_, (key, value): (Value, Value)| {
            let key = key_arg("state.set", key)?;
            let value =
                ScriptValue::from_value(value).map_err(|e| marshal_arg_error("state.set", 2, e))?;
            debug!(target: "scripting", "Setting state {}", key);
            store.set(key, value);
            Ok(())
        })
    }
}

/// `state.clear(key?)`, clearing everything without a key
pub struct ClearStateBinding {
    store: StateStore,
}

impl ClearStateBinding {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl Binding for ClearStateBinding {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let store = self.store.clone();
        lua.create_function(move |_, key: Value| {
            match key {
                Value::Nil => {
                    debug!(target: "scripting", "Clearing all state");
                    store.clear();
                }
                other => {
                    let key = key_arg("state.clear", other)?;
                    store.remove(&key);
                }
            }
            Ok(())
        })
    }
}
