use std::fmt;
use std::sync::Arc;

use mlua::{Lua, MultiValue, Table, Value};

use super::command::{dispatch_key, OptionKind};
use super::message::MessageSpec;
use crate::platform::{InteractionHandle, PlatformError, PlatformSession};

/// An inbound interaction, detached from the platform library's types
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    pub id: String,
    pub token: String,
    pub kind: InteractionKind,
    pub user: InteractionUser,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionKind {
    ApplicationCommand {
        name: String,
        options: Vec<InteractionOption>,
    },
    MessageComponent {
        custom_id: String,
        values: Vec<String>,
    },
    /// Anything scripts cannot handle yet (autocomplete, modals, pings)
    Other,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::ApplicationCommand { .. } => "application_command",
            InteractionKind::MessageComponent { .. } => "message_component",
            InteractionKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InteractionUser {
    pub id: String,
    pub name: String,
}

/// One option of an invoked command, possibly a subcommand with children
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionOption {
    pub name: String,
    pub kind: OptionKind,
    pub value: OptionValue,
    pub options: Vec<InteractionOption>,
}

impl InteractionOption {
    pub fn value(name: impl Into<String>, kind: OptionKind, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            options: Vec::new(),
        }
    }

    pub fn nested(
        name: impl Into<String>,
        kind: OptionKind,
        options: Vec<InteractionOption>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value: OptionValue::None,
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    None,
    Integer(i64),
    Number(f64),
    Boolean(bool),
    String(String),
    /// Ids of users, channels, roles and attachments, already stringified
    Raw(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::None => Ok(()),
            OptionValue::Integer(n) => write!(f, "{}", n),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Boolean(b) => write!(f, "{}", b),
            OptionValue::String(s) | OptionValue::Raw(s) => f.write_str(s),
        }
    }
}

impl OptionValue {
    /// Convert for a handler context, typed by the option's declared kind
    fn to_lua(&self, lua: &Lua, kind: OptionKind) -> mlua::Result<Value> {
        Ok(match (kind, self) {
            (_, OptionValue::None) => Value::Nil,
            (OptionKind::Integer, OptionValue::Integer(n)) => Value::Integer(*n),
            (OptionKind::Number, OptionValue::Number(n)) => Value::Number(*n),
            (OptionKind::Number, OptionValue::Integer(n)) => Value::Number(*n as f64),
            (OptionKind::Boolean, OptionValue::Boolean(b)) => Value::Boolean(*b),
            (OptionKind::String, OptionValue::String(s)) => Value::String(lua.create_string(s)?),
            (_, other) => Value::String(lua.create_string(other.to_string())?),
        })
    }
}

impl InteractionEvent {
    pub fn handle(&self) -> InteractionHandle {
        InteractionHandle {
            id: self.id.clone(),
            token: self.token.clone(),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self.kind, InteractionKind::ApplicationCommand { .. })
    }

    pub fn custom_id(&self) -> Option<&str> {
        match &self.kind {
            InteractionKind::MessageComponent { custom_id, .. } => Some(custom_id),
            _ => None,
        }
    }
}

/// Key used to find the handler for a command invocation.
///
/// Only the first option is inspected, and only when it is a subcommand.
pub fn command_dispatch_key(name: &str, options: &[InteractionOption]) -> String {
    match options.first() {
        Some(first) if first.kind == OptionKind::SubCommand => dispatch_key(name, Some(&first.name)),
        _ => dispatch_key(name, None),
    }
}

/// Flatten an option tree into name/value pairs.
///
/// The first subcommand or group that carries options replaces everything
/// collected so far, so only the deepest level's values survive.
pub fn flatten_options(options: &[InteractionOption]) -> Vec<(String, OptionKind, OptionValue)> {
    let mut flat = Vec::new();

    for option in options {
        if option.kind.is_nesting() {
            if !option.options.is_empty() {
                return flatten_options(&option.options);
            }
            continue;
        }

        flat.push((option.name.clone(), option.kind, option.value.clone()));
    }

    flat
}

/// Build the table passed to script handlers.
///
/// `reply(message)` answers the interaction; it accepts both `ctx.reply(m)`
/// and `ctx:reply(m)` by taking the last argument.
pub fn build_context(
    lua: &Lua,
    event: &InteractionEvent,
    session: Option<Arc<dyn PlatformSession>>,
) -> mlua::Result<Table> {
    let ctx = lua.create_table()?;
    ctx.set("id", event.id.as_str())?;
    ctx.set("token", event.token.as_str())?;
    ctx.set("type", event.kind.as_str())?;

    let author = lua.create_table()?;
    author.set("id", event.user.id.as_str())?;
    author.set("name", event.user.name.as_str())?;
    ctx.set("author", author)?;

    if let Some(channel_id) = &event.channel_id {
        ctx.set("channel_id", channel_id.as_str())?;
    }
    if let Some(guild_id) = &event.guild_id {
        ctx.set("guild_id", guild_id.as_str())?;
    }

    let options = lua.create_table()?;
    match &event.kind {
        InteractionKind::ApplicationCommand { name, options: raw } => {
            ctx.set("command", name.as_str())?;
            for (name, kind, value) in flatten_options(raw) {
                options.set(name, value.to_lua(lua, kind)?)?;
            }
        }
        InteractionKind::MessageComponent { custom_id, values } => {
            ctx.set("custom_id", custom_id.as_str())?;
            ctx.set("values", lua.create_sequence_from(values.iter().map(String::as_str))?)?;
        }
        InteractionKind::Other => {}
    }
    ctx.set("options", options)?;

    let handle = event.handle();
    let reply = lua.create_function(move |_, args: MultiValue| {
        let message = args.into_iter().last().unwrap_or(Value::Nil);
        let message = MessageSpec::from_value(message).map_err(|e| {
            mlua::Error::runtime(format!("bad argument #1 to 'reply' ({})", e))
        })?;

        let session = session
            .clone()
            .ok_or_else(|| mlua::Error::runtime(PlatformError::Unavailable.to_string()))?;
        session
            .respond_to_interaction(&handle, &message)
            .map_err(|e| mlua::Error::runtime(format!("failed to reply to interaction: {}", e)))
    })?;
    ctx.set("reply", reply)?;

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_event(name: &str, options: Vec<InteractionOption>) -> InteractionEvent {
        InteractionEvent {
            id: "1".into(),
            token: "tok".into(),
            kind: InteractionKind::ApplicationCommand {
                name: name.into(),
                options,
            },
            user: InteractionUser {
                id: "42".into(),
                name: "alice".into(),
            },
            channel_id: Some("100".into()),
            guild_id: None,
        }
    }

    #[test]
    fn test_dispatch_key_uses_first_subcommand() {
        let options = vec![InteractionOption::nested("bar", OptionKind::SubCommand, vec![])];
        assert_eq!(command_dispatch_key("foo", &options), "foo_bar");
    }

    #[test]
    fn test_dispatch_key_ignores_value_options() {
        let options = vec![
            InteractionOption::value("text", OptionKind::String, OptionValue::String("x".into())),
            InteractionOption::nested("bar", OptionKind::SubCommand, vec![]),
        ];
        assert_eq!(command_dispatch_key("foo", &options), "foo");
    }

    #[test]
    fn test_dispatch_key_does_not_descend_into_groups() {
        let options = vec![InteractionOption::nested(
            "user",
            OptionKind::SubCommandGroup,
            vec![InteractionOption::nested("ban", OptionKind::SubCommand, vec![])],
        )];
        assert_eq!(command_dispatch_key("admin", &options), "admin");
    }

    #[test]
    fn test_flatten_keeps_only_deepest_level() {
        let options = vec![
            InteractionOption::value("outer", OptionKind::String, OptionValue::String("o".into())),
            InteractionOption::nested(
                "group",
                OptionKind::SubCommandGroup,
                vec![
                    InteractionOption::value("middle", OptionKind::Integer, OptionValue::Integer(1)),
                    InteractionOption::nested(
                        "sub",
                        OptionKind::SubCommand,
                        vec![InteractionOption::value(
                            "leaf",
                            OptionKind::Boolean,
                            OptionValue::Boolean(true),
                        )],
                    ),
                ],
            ),
        ];

        let flat = flatten_options(&options);
        assert_eq!(
            flat,
            vec![("leaf".to_string(), OptionKind::Boolean, OptionValue::Boolean(true))]
        );
    }

    #[test]
    fn test_flatten_skips_empty_subcommand() {
        let options = vec![
            InteractionOption::nested("bare", OptionKind::SubCommand, vec![]),
            InteractionOption::value("n", OptionKind::Number, OptionValue::Number(2.5)),
        ];
        let flat = flatten_options(&options);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].0, "n");
    }

    #[test]
    fn test_context_types_values_by_kind() {
        let lua = Lua::new();
        let event = command_event(
            "roll",
            vec![
                InteractionOption::value("sides", OptionKind::Integer, OptionValue::Integer(6)),
                InteractionOption::value("loud", OptionKind::Boolean, OptionValue::Boolean(false)),
                InteractionOption::value("who", OptionKind::User, OptionValue::Raw("99".into())),
            ],
        );

        let ctx = build_context(&lua, &event, None).unwrap();
        let options: Table = ctx.get("options").unwrap();
        assert_eq!(options.get::<i64>("sides").unwrap(), 6);
        assert!(!options.get::<bool>("loud").unwrap());
        assert_eq!(options.get::<String>("who").unwrap(), "99");
        assert_eq!(ctx.get::<String>("command").unwrap(), "roll");
        assert_eq!(ctx.get::<String>("type").unwrap(), "application_command");

        let author: Table = ctx.get("author").unwrap();
        assert_eq!(author.get::<String>("name").unwrap(), "alice");
    }

    #[test]
    fn test_reply_without_session_raises() {
        let lua = Lua::new();
        let event = command_event("ping", vec![]);
        let ctx = build_context(&lua, &event, None).unwrap();
        lua.globals().set("ctx", ctx).unwrap();

        let err = lua.load("ctx:reply('pong')").exec().unwrap_err();
        assert!(
            err.to_string().contains("platform session not available"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_component_context_has_values() {
        let lua = Lua::new();
        let event = InteractionEvent {
            kind: InteractionKind::MessageComponent {
                custom_id: "colour".into(),
                values: vec!["red".into(), "blue".into()],
            },
            ..command_event("unused", vec![])
        };

        let ctx = build_context(&lua, &event, None).unwrap();
        assert_eq!(ctx.get::<String>("custom_id").unwrap(), "colour");
        let values: Table = ctx.get("values").unwrap();
        assert_eq!(values.get::<String>(2).unwrap(), "blue");
        assert!(ctx.get::<Option<String>>("command").unwrap().is_none());
    }
}
