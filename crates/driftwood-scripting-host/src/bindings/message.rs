use std::sync::Arc;

use mlua::{Function, Lua, Table, Value};

use super::channel::id_arg;
use super::{marshal_arg_error, platform_error, Binding, SessionSlot};
use crate::marshal::MessageSpec;
use crate::platform::{MessageRef, PlatformSession};

fn message_table(lua: &Lua, message: MessageRef) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("id", message.id)?;
    table.set("channel_id", message.channel_id)?;
    table.set("content", message.content)?;
    Ok(table)
}

/// `message.add(channel_id, message)`
#[derive(Default)]
pub struct AddMessageBinding {
    session: SessionSlot,
}

impl AddMessageBinding {
    const FUNCTION: &'static str = "message.add";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Binding for AddMessageBinding {
    fn name(&self) -> &'static str {
        "add"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let session = self.session.clone();

        lua.create_function(move |lua, (channel_id, message): (Value, Value)| {
            let channel_id = id_arg(Self::FUNCTION, 1, channel_id)?;
            let message =
                MessageSpec::from_value(message).map_err(|e| marshal_arg_error(Self::FUNCTION, 2, e))?;

            let sent = session
                .require()?
                .send_message(&channel_id, &message)
                .map_err(|e| platform_error("send message", e))?;
            message_table(lua, sent)
        })
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }
}

/// `message.edit(channel_id, message_id, message)`
#[derive(Default)]
pub struct EditMessageBinding {
    session: SessionSlot,
}

impl EditMessageBinding {
    const FUNCTION: &'static str = "message.edit";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Binding for EditMessageBinding {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let session = self.session.clone();

        lua.create_function(
            move |lua, (channel_id, message_id, message): (Value, Value, Value)| {
                let channel_id = id_arg(Self::FUNCTION, 1, channel_id)?;
                let message_id = id_arg(Self::FUNCTION, 2, message_id)?;
                let message = MessageSpec::from_value(message)
                    .map_err(|e| marshal_arg_error(Self::FUNCTION, 3, e))?;

                let edited = session
                    .require()?
                    .edit_message(&channel_id, &message_id, &message)
                    .map_err(|e| platform_error("edit message", e))?;
                message_table(lua, edited)
            },
        )
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }
}

/// `message.delete(channel_id, message_id)`
#[derive(Default)]
pub struct DeleteMessageBinding {
    session: SessionSlot,
}

impl DeleteMessageBinding {
    const FUNCTION: &'static str = "message.delete";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Binding for DeleteMessageBinding {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function> {
        let session = self.session.clone();

        lua.create_function(move |_, (channel_id, message_id): (Value, Value)| {
            let channel_id = id_arg(Self::FUNCTION, 1, channel_id)?;
            let message_id = id_arg(Self::FUNCTION, 2, message_id)?;

            session
                .require()?
                .delete_message(&channel_id, &message_id)
                .map_err(|e| platform_error("delete message", e))?;
            Ok(true)
        })
    }

    fn set_session(&self, session: Arc<dyn PlatformSession>) {
        self.session.set(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::testing::RecordingSession;

    fn install(lua: &Lua, session: Option<Arc<RecordingSession>>) {
        let message = lua.create_table().unwrap();
        let bindings: [Box<dyn Binding>; 3] = [
            Box::new(AddMessageBinding::new()),
            Box::new(EditMessageBinding::new()),
            Box::new(DeleteMessageBinding::new()),
        ];
        for binding in bindings {
            if let Some(session) = &session {
                binding.set_session(session.clone());
            }
            message
                .set(binding.name(), binding.entry_point(lua).unwrap())
                .unwrap();
        }
        lua.globals().set("message", message).unwrap();
    }

    #[test]
    fn test_add_edit_delete() {
        let lua = Lua::new();
        let session = RecordingSession::new();
        install(&lua, Some(session.clone()));

        let sent: Table = lua
            .load(r#"return message.add("10", "hello")"#)
            .eval()
            .unwrap();
        assert_eq!(sent.get::<String>("id").unwrap(), "900");
        assert_eq!(sent.get::<String>("content").unwrap(), "hello");

        lua.load(r#"message.edit("10", "900", { content = "bye" })"#)
            .exec()
            .unwrap();
        let deleted: bool = lua
            .load(r#"return message.delete("10", "900")"#)
            .eval()
            .unwrap();
        assert!(deleted);

        assert_eq!(
            session.calls(),
            vec![
                "send_message 10 hello",
                "edit_message 10 900 bye",
                "delete_message 10 900",
            ]
        );
    }

    #[test]
    fn test_add_with_invalid_message() {
        let lua = Lua::new();
        install(&lua, Some(RecordingSession::new()));

        let err = lua
            .load(r#"message.add("10", {})"#)
            .exec()
            .unwrap_err()
            .to_string();
        assert!(
            err.contains("bad argument #2 to 'message.add' (message: needs content or components)"),
            "{}",
            err
        );
    }

    #[test]
    fn test_platform_failure_is_raised() {
        let lua = Lua::new();
        install(&lua, Some(RecordingSession::failing()));

        let err = lua
            .load(r#"message.delete("10", "900")"#)
            .exec()
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to delete message"), "{}", err);
    }

    #[test]
    fn test_requires_session() {
        let lua = Lua::new();
        install(&lua, None);

        let err = lua
            .load(r#"message.add("10", "hi")"#)
            .exec()
            .unwrap_err()
            .to_string();
        assert!(err.contains("platform session not available"), "{}", err);
    }
}
