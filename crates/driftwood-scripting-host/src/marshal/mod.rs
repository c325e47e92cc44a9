//! Conversion between Lua tables and host-native structured types
//!
//! Every conversion site matches `mlua::Value` exhaustively. Required
//! top-level fields are hard failures; malformed nested entries are skipped
//! where a partial result is still useful (component lists, option lists).

pub mod command;
pub mod components;
pub mod interaction;
pub mod message;
pub mod value;

use mlua::{Table, Value};

pub use command::{CommandOptionSpec, CommandSpec, OptionKind, ParsedCommand};
pub use components::{ActionRow, Button, ButtonStyle, Component, SelectMenu, SelectMenuOption};
pub use interaction::{
    InteractionEvent, InteractionKind, InteractionOption, InteractionUser, OptionValue,
};
pub use message::MessageSpec;
pub use value::ScriptValue;

/// Failure to convert a script value into a host type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarshalError {
    #[error("{path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("no valid components found")]
    NoValidComponents,

    #[error("{path}: tables nested deeper than {max} levels")]
    TooDeep { path: String, max: usize },

    #[error("{path}: more than {max} values")]
    TooLarge { path: String, max: usize },
}

impl MarshalError {
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        MarshalError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Lua type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) | Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Table(_) => "table",
        Value::Function(_) => "function",
        Value::Thread(_) => "thread",
        Value::UserData(_) | Value::LightUserData(_) => "userdata",
        _ => "other",
    }
}

/// Join a parent path and a field name for error reporting
pub(crate) fn field_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

pub(crate) fn raw_field(table: &Table, field: &str, path: &str) -> Result<Value, MarshalError> {
    table
        .raw_get::<Value>(field)
        .map_err(|e| MarshalError::invalid(field_path(path, field), e.to_string()))
}

pub(crate) fn lua_string(value: &mlua::String) -> String {
    value.to_string_lossy().to_string()
}

/// Read a field that must be a string
pub(crate) fn required_string(table: &Table, field: &str, path: &str) -> Result<String, MarshalError> {
    match raw_field(table, field, path)? {
        Value::String(s) => Ok(lua_string(&s)),
        other => Err(MarshalError::invalid(
            field_path(path, field),
            format!("expected string, got {}", type_name(&other)),
        )),
    }
}

/// Read a field that may be absent but must be a string when present
pub(crate) fn optional_string(
    table: &Table,
    field: &str,
    path: &str,
) -> Result<Option<String>, MarshalError> {
    match raw_field(table, field, path)? {
        Value::Nil => Ok(None),
        Value::String(s) => Ok(Some(lua_string(&s))),
        other => Err(MarshalError::invalid(
            field_path(path, field),
            format!("expected string or nil, got {}", type_name(&other)),
        )),
    }
}

/// Read a boolean flag; anything that is not a boolean counts as `false`
pub(crate) fn flag(table: &Table, field: &str) -> bool {
    matches!(table.raw_get::<Value>(field), Ok(Value::Boolean(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    #[test]
    fn test_required_string_reports_path() {
        let lua = Lua::new();
        let table: Table = lua.load("return { name = 5 }").eval().unwrap();

        let err = required_string(&table, "name", "options[1]").unwrap_err();
        assert_eq!(
            err,
            MarshalError::invalid("options[1].name", "expected string, got number")
        );
        assert_eq!(err.to_string(), "options[1].name: expected string, got number");
    }

    #[test]
    fn test_flag_ignores_non_booleans() {
        let lua = Lua::new();
        let table: Table = lua
            .load("return { a = true, b = 'yes', c = false }")
            .eval()
            .unwrap();

        assert!(flag(&table, "a"));
        assert!(!flag(&table, "b"));
        assert!(!flag(&table, "c"));
        assert!(!flag(&table, "missing"));
    }
}
