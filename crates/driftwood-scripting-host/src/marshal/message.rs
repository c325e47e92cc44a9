use mlua::{Table, Value};

use super::components::parse_components;
use super::{flag, lua_string, optional_string, raw_field, type_name, ActionRow, MarshalError};

/// Outbound message content as a script describes it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageSpec {
    pub content: Option<String>,
    pub components: Vec<ActionRow>,
    /// Only meaningful for interaction replies
    pub ephemeral: bool,
}

impl MessageSpec {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Accepts either a plain string or `{ content?, components?, ephemeral? }`
    pub fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::String(s) => Ok(Self::text(lua_string(&s))),
            Value::Table(table) => Self::from_table(&table),
            other => Err(MarshalError::invalid(
                "message",
                format!("expected string or table, got {}", type_name(&other)),
            )),
        }
    }

    fn from_table(table: &Table) -> Result<Self, MarshalError> {
        let content = optional_string(table, "content", "message")?;

        let components = match raw_field(table, "components", "message")? {
            Value::Nil => Vec::new(),
            Value::Table(components) => parse_components(&components)?,
            other => {
                return Err(MarshalError::invalid(
                    "message.components",
                    format!("expected table or nil, got {}", type_name(&other)),
                ))
            }
        };

        if content.is_none() && components.is_empty() {
            return Err(MarshalError::invalid(
                "message",
                "needs content or components",
            ));
        }

        Ok(Self {
            content,
            components,
            ephemeral: flag(table, "ephemeral"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn parse(lua: &Lua, source: &str) -> Result<MessageSpec, MarshalError> {
        let value: Value = lua.load(source).eval().unwrap();
        MessageSpec::from_value(value)
    }

    #[test]
    fn test_plain_string() {
        let lua = Lua::new();
        assert_eq!(parse(&lua, "return 'pong'").unwrap(), MessageSpec::text("pong"));
    }

    #[test]
    fn test_table_with_components() {
        let lua = Lua::new();
        let message = parse(
            &lua,
            r#"return {
                content = "Pick",
                ephemeral = true,
                components = { { type = "button", label = "Go", custom_id = "go_btn" } },
            }"#,
        )
        .unwrap();

        assert_eq!(message.content.as_deref(), Some("Pick"));
        assert!(message.ephemeral);
        assert_eq!(message.components[0].components.len(), 1);
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let lua = Lua::new();
        let err = parse(&lua, "return {}").unwrap_err();
        assert_eq!(err.to_string(), "message: needs content or components");
    }

    #[test]
    fn test_invalid_components_propagate() {
        let lua = Lua::new();
        let err = parse(&lua, "return { content = 'x', components = { 1, 2 } }").unwrap_err();
        assert_eq!(err, MarshalError::NoValidComponents);
    }

    #[test]
    fn test_number_is_rejected() {
        let lua = Lua::new();
        let err = parse(&lua, "return 12").unwrap_err();
        assert_eq!(err.to_string(), "message: expected string or table, got number");
    }
}
