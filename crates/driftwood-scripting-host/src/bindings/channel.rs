use std::sync::Arc;

use mlua::{Function, Lua, Value};

use super::{arg_error, platform_error, Binding, SessionSlot};
use crate::marshal::{lua_string, type_name};
use crate::platform::{ChannelInfo, PlatformSession};

/// Read a channel id argument; numbers are accepted for convenience
pub(crate) fn id_arg(function: &str, position: usize, value: Value) -> mlua::Result<String> {
    match value {
        Value::String(s) => Ok(lua_string(&s)),
        Value::Integer(n) if n > 0 => Ok(n.to_string()),
        other => Err(arg_error(
            function,
            position,
            format!("expected id string, got {}", type_name(&other)),
        )),
    }
}

fn channel_table(lua: &Lua, channel: ChannelInfo) -> mlua::Result<mlua::Table> {
    let table = lua.create_table()?;
    table.set("id", channel.id)?;
    table.set("name", channel.name)?;
    table.set("kind", channel.kind)?;
    table.set("guild_id", channel.guild_id)?;
    table.set("topic", channel.topic)?;
    Ok(table)
}

/// `get_channel(channel_id)`
#[derive(Default)]
pub struct ChannelBinding {
    session: SessionSlot,
}

impl ChannelBinding {
    const NAME: &'static str = "get_channel";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Binding for ChannelBinding {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let session = self.session.clone();

        lua.create_function(move |lua, channel_id: Value| {
            let channel_id = id_arg(Self::NAME, 1, channel_id)?;
            let channel = session
                .require()?
                .get_channel(&channel_id)
                .map_err(|e| platform_error("get channel", e))?;
            channel_table(lua, channel)
        })
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }
}
