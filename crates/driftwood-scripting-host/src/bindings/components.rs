use mlua::{Function, Lua, Table, Value};

use super::{arg_error, marshal_arg_error, Binding};
use crate::marshal::components::parse_select_options;
use crate::marshal::{
    flag, lua_string, optional_string, required_string, type_name, Button, ButtonStyle,
    SelectMenu, SelectMenuOption,
};

fn table_arg(function: &str, value: Value) -> mlua::Result<Table> {
    match value {
        Value::Table(table) => Ok(table),
        other => Err(arg_error(
            function,
            1,
            format!("expected table, got {}", type_name(&other)),
        )),
    }
}

/// `new_button{label, custom_id, style?, disabled?}`
pub struct ButtonBinding;

impl ButtonBinding {
    const NAME: &'static str = "new_button";
}

impl Binding for ButtonBinding {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        lua.create_function(|lua, spec: Value| {
            let spec = table_arg(Self::NAME, spec)?;
            let fail = |e| marshal_arg_error(Self::NAME, 1, e);

            let style = match optional_string(&spec, "style", "").map_err(fail)? {
                Some(style) => ButtonStyle::parse(&style).ok_or_else(|| {
                    arg_error(Self::NAME, 1, format!("style: unknown button style '{}'", style))
                })?,
                None => ButtonStyle::default(),
            };

            let button = Button {
                label: required_string(&spec, "label", "").map_err(fail)?,
                custom_id: required_string(&spec, "custom_id", "").map_err(fail)?,
                style,
                disabled: flag(&spec, "disabled"),
            };
            button.to_table(lua)
        })
    }
}

/// `new_select_menu{custom_id, placeholder?, options, disabled?}`
pub struct SelectMenuBinding;

impl SelectMenuBinding {
    const NAME: &'static str = "new_select_menu";
}

impl Binding for SelectMenuBinding {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        lua.create_function(|lua, spec: Value| {
            let spec = table_arg(Self::NAME, spec)?;
            let fail = |e| marshal_arg_error(Self::NAME, 1, e);

            let options = match spec.raw_get::<Value>("options")? {
                Value::Table(options) => parse_select_options(&options),
                other => {
                    return Err(arg_error(
                        Self::NAME,
                        1,
                        format!("options: expected table, got {}", type_name(&other)),
                    ))
                }
            };

            let menu = SelectMenu {
                custom_id: required_string(&spec, "custom_id", "").map_err(fail)?,
                placeholder: optional_string(&spec, "placeholder", "").map_err(fail)?,
                options,
                disabled: flag(&spec, "disabled"),
            };
            menu.to_table(lua)
        })
    }
}

/// `new_select_menu_option(label, value, description?)`
pub struct SelectMenuOptionBinding;

impl SelectMenuOptionBinding {
    const NAME: &'static str = "new_select_menu_option";
}

fn string_arg(function: &str, position: usize, value: Value) -> mlua::Result<String> {
    match value {
        Value::String(s) => Ok(lua_string(&s)),
        other => Err(arg_error(
            function,
            position,
            format!("expected string, got {}", type_name(&other)),
        )),
    }
}

impl Binding for SelectMenuOptionBinding {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        lua.create_function(|lua, (label, value, description): (Value, Value, Value)| {
            let description = match description {
                Value::Nil => None,
                other => Some(string_arg(Self::NAME, 3, other)?),
            };

            let option = SelectMenuOption {
                label: string_arg(Self::NAME, 1, label)?,
                value: string_arg(Self::NAME, 2, value)?,
                description,
            };
            option.to_table(lua)
        })
    }
}
