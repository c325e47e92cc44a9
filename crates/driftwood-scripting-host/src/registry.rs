use std::sync::Arc;

use mlua::{Lua, MultiValue, Table, Value};
use tracing::{debug, error, info};

use crate::bindings::{arg_error, Binding};
use crate::marshal::{lua_string, type_name, OptionKind};
use crate::ready::ReadyRegistrar;

/// Name scripts pass to `require`
pub const MODULE_NAME: &str = "driftwood";

/// Group whose bindings sit at the top level of the module
pub const DEFAULT_GROUP: &str = "default";

/// Bindings that share a namespace inside the module
pub struct BindingGroup {
    pub name: &'static str,
    pub bindings: Vec<Arc<dyn Binding>>,
}

impl BindingGroup {
    pub fn new(name: &'static str, bindings: Vec<Arc<dyn Binding>>) -> Self {
        Self { name, bindings }
    }
}

/// Every binding the host exposes, grouped and ordered
#[derive(Clone)]
pub struct BindingRegistry {
    groups: Arc<Vec<BindingGroup>>,
}

impl BindingRegistry {
    pub fn new(groups: Vec<BindingGroup>) -> Self {
        Self {
            groups: Arc::new(groups),
        }
    }

    pub fn groups(&self) -> &[BindingGroup] {
        &self.groups
    }

    /// All bindings in group order
    pub fn bindings(&self) -> impl Iterator<Item = &Arc<dyn Binding>> {
        self.groups.iter().flat_map(|group| group.bindings.iter())
    }

    /// Make `require("driftwood")` build the module in this interpreter
    pub fn install(&self, lua: &Lua, ready: &ReadyRegistrar) -> mlua::Result<()> {
        let groups = Arc::clone(&self.groups);
        let ready = ready.clone();

        let loader = lua.create_function(move |lua, _: MultiValue| {
            debug!(target: "scripting", "Building {} module", MODULE_NAME);
            build_module(lua, &groups, &ready)
        })?;

        let package: Table = lua.globals().get("package")?;
        let preload: Table = package.get("preload")?;
        preload.set(MODULE_NAME, loader)
    }
}

fn build_module(lua: &Lua, groups: &[BindingGroup], ready: &ReadyRegistrar) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    for kind in OptionKind::ALL {
        module.set(kind.constant_name(), kind.code())?;
    }
    module.set("on_ready", ready.entry_point(lua)?)?;

    for group in groups {
        let target = if group.name == DEFAULT_GROUP {
            module.clone()
        } else {
            let table = lua.create_table()?;
            module.set(group.name, table.clone())?;
            table
        };

        for binding in &group.bindings {
            target.set(binding.name(), binding.entry_point(lua)?)?;
        }
    }

    module.set("log", log_table(lua)?)?;
    Ok(module)
}

/// Build a log line from a message plus any trailing values
fn log_message(function: &str, args: MultiValue) -> mlua::Result<String> {
    let mut args = args.into_iter();
    let mut parts = match args.next() {
        Some(Value::String(s)) => vec![lua_string(&s)],
        // Numbers coerce to strings like any other Lua string argument
        Some(value @ (Value::Integer(_) | Value::Number(_))) => vec![value.to_string()?],
        other => {
            let got = other.as_ref().map_or("no value", type_name);
            return Err(arg_error(
                function,
                1,
                format!("expected string, got {}", got),
            ));
        }
    };
    for value in args {
        parts.push(value.to_string()?);
    }
    Ok(parts.join(" "))
}

fn log_table(lua: &Lua) -> mlua::Result<Table> {
    let log = lua.create_table()?;

    log.set(
        "debug",
        lua.create_function(|_, args: MultiValue| {
            debug!(target: "lua", "{}", log_message("log.debug", args)?);
            Ok(())
        })?,
    )?;
    log.set(
        "info",
        lua.create_function(|_, args: MultiValue| {
            info!(target: "lua", "{}", log_message("log.info", args)?);
            Ok(())
        })?,
    )?;
    log.set(
        "error",
        lua.create_function(|_, args: MultiValue| {
            error!(target: "lua", "{}", log_message("log.error", args)?);
            Ok(())
        })?,
    )?;

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{ButtonBinding, GetStateBinding, SetStateBinding};
    use crate::state::StateStore;

    fn registry() -> BindingRegistry {
        let store = StateStore::new();
        BindingRegistry::new(vec![
            BindingGroup::new(DEFAULT_GROUP, vec![Arc::new(ButtonBinding)]),
            BindingGroup::new(
                "state",
                vec![
                    Arc::new(GetStateBinding::new(store.clone())),
                    Arc::new(SetStateBinding::new(store)),
                ],
            ),
        ])
    }

    #[test]
    fn test_module_layout() {
        let lua = Lua::new();
        registry().install(&lua, &ReadyRegistrar::new()).unwrap();

        let ok: bool = lua
            .load(
                r#"
                local d = require("driftwood")
                return type(d.new_button) == "function"
                    and type(d.state.get) == "function"
                    and type(d.state.set) == "function"
                    and type(d.on_ready) == "function"
                    and type(d.log.info) == "function"
                    and d.option_subcommand == 1
                    and d.option_string == 3
                    and d.option_attachment == 11
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_require_is_cached() {
        let lua = Lua::new();
        registry().install(&lua, &ReadyRegistrar::new()).unwrap();

        let same: bool = lua
            .load(r#"return require("driftwood") == require("driftwood")"#)
            .eval()
            .unwrap();
        assert!(same);
    }

    #[test]
    fn test_bindings_follow_group_order() {
        let names: Vec<_> = registry().bindings().map(|b| b.name()).collect();
        assert_eq!(names, vec!["new_button", "get", "set"]);
    }

    #[test]
    fn test_log_appends_trailing_values() {
        let lua = Lua::new();
        registry().install(&lua, &ReadyRegistrar::new()).unwrap();

        lua.load(r#"local d = require("driftwood") d.log.info("count", 3, true, nil)"#)
            .exec()
            .unwrap();
        lua.load(r#"require("driftwood").log.debug(42)"#)
            .exec()
            .unwrap();
    }

    #[test]
    fn test_log_requires_message() {
        let lua = Lua::new();
        registry().install(&lua, &ReadyRegistrar::new()).unwrap();

        let err = lua
            .load(r#"require("driftwood").log.info({})"#)
            .exec()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("bad argument #1 to 'log.info' (expected string, got table)"));

        let err = lua
            .load(r#"require("driftwood").log.error()"#)
            .exec()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("bad argument #1 to 'log.error' (expected string, got no value)"));
    }
}
