use mlua::{Function, Lua, Value};

use super::{arg_error, Binding};
use crate::marshal::{lua_string, type_name, OptionKind};

/// Constructor for a value option descriptor, such as `option.string(name, description, required?)`
pub struct OptionBinding {
    name: &'static str,
    kind: OptionKind,
}

impl OptionBinding {
    pub fn new(name: &'static str, kind: OptionKind) -> Self {
        Self { name, kind }
    }

    /// The constructors installed in the `option` group
    pub fn all() -> Vec<Self> {
        vec![
            Self::new("string", OptionKind::String),
            Self::new("integer", OptionKind::Integer),
            Self::new("number", OptionKind::Number),
            Self::new("bool", OptionKind::Boolean),
            Self::new("user", OptionKind::User),
            Self::new("channel", OptionKind::Channel),
            Self::new("role", OptionKind::Role),
        ]
    }
}

impl Binding for OptionBinding {
    fn name(&self) -> &'static str {
        self.name
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let function = format!("option.{}", self.name);
        let kind = self.kind;

        lua.create_function(
            move |lua, (name, description, required): (Value, Value, Value)| {
                let name = match name {
                    Value::String(s) => lua_string(&s),
                    other => {
                        return Err(arg_error(
                            &function,
                            1,
                            format!("expected string, got {}", type_name(&other)),
                        ))
                    }
                };
                let description = match description {
                    Value::String(s) => lua_string(&s),
                    other => {
                        return Err(arg_error(
                            &function,
                            2,
                            format!("expected string, got {}", type_name(&other)),
                        ))
                    }
                };
                let required = match required {
                    Value::Nil => false,
                    Value::Boolean(b) => b,
                    other => {
                        return Err(arg_error(
                            &function,
                            3,
                            format!("expected boolean or nil, got {}", type_name(&other)),
                        ))
                    }
                };

                let option = lua.create_table()?;
                option.set("name", name)?;
                option.set("description", description)?;
                option.set("type", kind.code())?;
                option.set("required", required)?;
                Ok(option)
            },
        )
    }
}
