use std::sync::Arc;

use mlua::{Function, Lua, Value};

use super::channel::id_arg;
use super::{arg_error, platform_error, Binding, SessionSlot};
use crate::marshal::{lua_string, type_name};
use crate::platform::PlatformSession;

fn emoji_arg(function: &str, value: Value) -> mlua::Result<String> {
    match value {
        Value::String(s) => {
            let emoji = lua_string(&s);
            if emoji.is_empty() {
                Err(arg_error(function, 3, "emoji must not be empty"))
            } else {
                Ok(emoji)
            }
        }
        other => Err(arg_error(
            function,
            3,
            format!("expected string, got {}", type_name(&other)),
        )),
    }
}

/// `reaction.add(channel_id, message_id, emoji)`
#[derive(Default)]
pub struct AddReactionBinding {
    session: SessionSlot,
}

impl AddReactionBinding {
    const FUNCTION: &'static str = "reaction.add";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Binding for AddReactionBinding {
    fn name(&self) -> &'static str {
        "add"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let session = self.session.clone();

        lua.create_function(
            move |_, (channel_id, message_id, emoji): (Value, Value, Value)| {
                let channel_id = id_arg(Self::FUNCTION, 1, channel_id)?;
                let message_id = id_arg(Self::FUNCTION, 2, message_id)?;
                let emoji = emoji_arg(Self::FUNCTION, emoji)?;

                session
                    .require()?
                    .add_reaction(&channel_id, &message_id, &emoji)
                    .map_err(|e| platform_error("add reaction", e))?;
                Ok(true)
            },
        )
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }
}

/// `reaction.remove(channel_id, message_id, emoji)`
#[derive(Default)]
pub struct RemoveReactionBinding {
    session: SessionSlot,
}

impl RemoveReactionBinding {
    const FUNCTION: &'static str = "reaction.remove";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Binding for RemoveReactionBinding {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let session = self.session.clone();

        lua.create_function(
            move |_, (channel_id, message_id, emoji): (Value, Value, Value)| {
                let channel_id = id_arg(Self::FUNCTION, 1, channel_id)?;
                let message_id = id_arg(Self::FUNCTION, 2, message_id)?;
                let emoji = emoji_arg(Self::FUNCTION, emoji)?;

                session
                    .require()?
                    .remove_reaction(&channel_id, &message_id, &emoji)
                    .map_err(|e| platform_error("remove reaction", e))?;
                Ok(true)
            },
        )
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }
}
