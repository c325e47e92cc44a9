use mlua::{FromLua, IntoLua, Lua, Table, Value};

use super::{lua_string, type_name, MarshalError};

/// Deepest table nesting accepted when copying values out of a script
pub const MAX_DEPTH: usize = 32;

/// Most values copied out of a script in one go
pub const MAX_NODES: usize = 10_000;

/// A script value detached from any interpreter.
///
/// Only plain data survives the copy. Functions, threads and userdata are
/// rejected because they cannot outlive the interpreter they came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// Key/value pairs in iteration order
    Table(Vec<(ScriptValue, ScriptValue)>),
}

impl ScriptValue {
    /// Copy a Lua value out of the interpreter
    pub fn from_value(value: Value) -> Result<Self, MarshalError> {
        let mut nodes = 0;
        Self::copy_out(value, "value", 0, &mut nodes)
    }

    /// Rebuild this value inside an interpreter
    pub fn to_value(&self, lua: &Lua) -> mlua::Result<Value> {
        Ok(match self {
            ScriptValue::Nil => Value::Nil,
            ScriptValue::Boolean(b) => Value::Boolean(*b),
            ScriptValue::Integer(n) => Value::Integer(*n),
            ScriptValue::Number(n) => Value::Number(*n),
            ScriptValue::String(s) => Value::String(lua.create_string(s)?),
            ScriptValue::Table(pairs) => {
                let table = lua.create_table()?;
                for (key, value) in pairs {
                    table.raw_set(key.to_value(lua)?, value.to_value(lua)?)?;
                }
                Value::Table(table)
            }
        })
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ScriptValue::Nil)
    }

    fn copy_out(
        value: Value,
        path: &str,
        depth: usize,
        nodes: &mut usize,
    ) -> Result<Self, MarshalError> {
        // Shared subtables are copied once per reference
        *nodes += 1;
        if *nodes > MAX_NODES {
            return Err(MarshalError::TooLarge {
                path: path.to_string(),
                max: MAX_NODES,
            });
        }

        match value {
            Value::Nil => Ok(ScriptValue::Nil),
            Value::Boolean(b) => Ok(ScriptValue::Boolean(b)),
            Value::Integer(n) => Ok(ScriptValue::Integer(n)),
            Value::Number(n) => Ok(ScriptValue::Number(n)),
            Value::String(s) => Ok(ScriptValue::String(lua_string(&s))),
            Value::Table(table) => Self::copy_table(table, path, depth, nodes),
            other => Err(MarshalError::invalid(
                path,
                format!("cannot store a {}", type_name(&other)),
            )),
        }
    }

    fn copy_table(
        table: Table,
        path: &str,
        depth: usize,
        nodes: &mut usize,
    ) -> Result<Self, MarshalError> {
        if depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep {
                path: path.to_string(),
                max: MAX_DEPTH,
            });
        }

        let mut pairs = Vec::new();
        for pair in table.pairs::<Value, Value>() {
            let (key, value) = pair.map_err(|e| MarshalError::invalid(path, e.to_string()))?;
            let child = format!("{}[{}]", path, key_label(&key));
            let key = Self::copy_out(key, &child, depth + 1, nodes)?;
            let value = Self::copy_out(value, &child, depth + 1, nodes)?;
            pairs.push((key, value));
        }

        Ok(ScriptValue::Table(pairs))
    }
}

fn key_label(key: &Value) -> String {
    match key {
        Value::Integer(n) => n.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => lua_string(s),
        other => type_name(other).to_string(),
    }
}

impl FromLua for ScriptValue {
    fn from_lua(value: Value, _lua: &Lua) -> mlua::Result<Self> {
        ScriptValue::from_value(value).map_err(mlua::Error::external)
    }
}

impl IntoLua for ScriptValue {
    fn into_lua(self, lua: &Lua) -> mlua::Result<Value> {
        self.to_value(lua)
    }
}
