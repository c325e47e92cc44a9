//! Native capabilities exposed to scripts
//!
//! Each binding contributes one entry point to the `driftwood` module.
//! Bindings that answer inbound interactions also implement `can_handle`
//! and `handle`; the dispatcher asks them in registration order.

pub mod channel;
pub mod command;
pub mod components;
pub mod interaction;
pub mod message;
pub mod option;
pub mod reaction;
pub mod state;
pub mod timer;

use std::sync::Arc;

use mlua::{Function, Lua};
use parking_lot::RwLock;

use crate::marshal::{InteractionEvent, MarshalError};
use crate::platform::{PlatformError, PlatformSession};
use crate::runner::RunnerError;

pub use channel::ChannelBinding;
pub use command::CommandBinding;
pub use components::{ButtonBinding, SelectMenuBinding, SelectMenuOptionBinding};
pub use interaction::ComponentBinding;
pub use message::{AddMessageBinding, DeleteMessageBinding, EditMessageBinding};
pub use option::OptionBinding;
pub use reaction::{AddReactionBinding, RemoveReactionBinding};
pub use state::{ClearStateBinding, GetStateBinding, SetStateBinding};
pub use timer::{CancelTimerBinding, RunAfterBinding, TimerScheduler};

/// Why an interaction could not be handed to a script
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for '{0}'")]
    NotRegistered(String),

    #[error("binding '{0}' does not handle interactions")]
    Unsupported(&'static str),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// A native capability exposed to scripts
pub trait Binding: Send + Sync {
    /// Name of the entry point inside its group
    fn name(&self) -> &'static str;

    /// Create the function scripts call
    fn entry_point(&self, lua: &Lua) -> mlua::Result<Function>;

    /// Called once the platform session is connected
    fn set_session(&self, _session: Arc<dyn PlatformSession>) {}

    fn can_handle(&self, _event: &InteractionEvent) -> bool {
        false
    }

    fn handle(&self, _event: &InteractionEvent) -> Result<(), DispatchError> {
        Err(DispatchError::Unsupported(self.name()))
    }
}

/// The platform session shared by the bindings, empty until ready
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<Arc<dyn PlatformSession>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session: Arc<dyn PlatformSession>) {
        *self.inner.write() = Some(session);
    }

    pub fn get(&self) -> Option<Arc<dyn PlatformSession>> {
        self.inner.read().clone()
    }

    /// The session, or the script error raised when there is none yet
    pub fn require(&self) -> mlua::Result<Arc<dyn PlatformSession>> {
        self.get()
            .ok_or_else(|| mlua::Error::runtime(PlatformError::Unavailable.to_string()))
    }
}

/// Script error for a malformed argument
pub(crate) fn arg_error(function: &str, position: usize, message: impl Into<String>) -> mlua::Error {
    mlua::Error::runtime(format!(
        "bad argument #{} to '{}' ({})",
        position,
        function,
        message.into()
    ))
}

pub(crate) fn marshal_arg_error(function: &str, position: usize, err: MarshalError) -> mlua::Error {
    arg_error(function, position, err.to_string())
}

/// Script error for a failed platform call
pub(crate) fn platform_error(operation: &str, err: PlatformError) -> mlua::Error {
    match err {
        PlatformError::Unavailable => mlua::Error::runtime(err.to_string()),
        err => mlua::Error::runtime(format!("failed to {}: {}", operation, err)),
    }
}

/// Store a function in the interpreter's named registry
pub(crate) fn store_handler(lua: &Lua, key: &str, handler: Function) -> mlua::Result<()> {
    lua.set_named_registry_value(key, handler)
}

/// Look up a function stored with [`store_handler`]
pub(crate) fn load_handler(lua: &Lua, key: &str) -> mlua::Result<Option<Function>> {
    lua.named_registry_value::<Option<Function>>(key)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::Binding;
    use crate::marshal::{CommandSpec, MessageSpec};
    use crate::platform::{
        ChannelInfo, InteractionHandle, MessageRef, PlatformError, PlatformSession,
    };
    use crate::runner::Runner;

    /// Expose `binding` as a global named after it and run `source`
    pub fn exec_with(
        runner: &Runner,
        binding: Arc<dyn Binding>,
        source: &'static str,
    ) -> Result<(), String> {
        runner
            .call(move |lua| {
                let run = || -> mlua::Result<()> {
                    lua.globals().set(binding.name(), binding.entry_point(lua)?)?;
                    lua.load(source).exec()
                };
                run().map_err(|e| e.to_string())
            })
            .map_err(|e| e.to_string())?
    }

    /// Evaluate `source` on the runner and return its result
    pub fn eval<R>(runner: &Runner, source: &'static str) -> R
    where
        R: mlua::FromLua + Send + 'static,
    {
        runner
            .call(move |lua| lua.load(source).eval::<R>().map_err(|e| e.to_string()))
            .expect("runner should accept tasks")
            .expect("script should evaluate")
    }

    /// Session that records calls instead of talking to a server
    #[derive(Default)]
    pub struct RecordingSession {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingSession {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Default::default()
            })
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: String) -> Result<(), PlatformError> {
            self.calls.lock().push(call);
            if self.fail {
                Err(PlatformError::request("test", "refused"))
            } else {
                Ok(())
            }
        }
    }

    impl PlatformSession for RecordingSession {
        fn create_command(&self, command: &CommandSpec) -> Result<(), PlatformError> {
            self.record(format!("create_command {}", command.name))
        }

        fn send_message(
            &self,
            channel_id: &str,
            message: &MessageSpec,
        ) -> Result<MessageRef, PlatformError> {
            let content = message.content.clone().unwrap_or_default();
            self.record(format!("send_message {} {}", channel_id, content))?;
            Ok(MessageRef {
                id: "900".into(),
                channel_id: channel_id.into(),
                content,
            })
        }

        fn edit_message(
            &self,
            channel_id: &str,
            message_id: &str,
            message: &MessageSpec,
        ) -> Result<MessageRef, PlatformError> {
            let content = message.content.clone().unwrap_or_default();
            self.record(format!("edit_message {} {} {}", channel_id, message_id, content))?;
            Ok(MessageRef {
                id: message_id.into(),
                channel_id: channel_id.into(),
                content,
            })
        }

        fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), PlatformError> {
            self.record(format!("delete_message {} {}", channel_id, message_id))
        }

        fn add_reaction(
            &self,
            channel_id: &str,
            message_id: &str,
            emoji: &str,
        ) -> Result<(), PlatformError> {
            self.record(format!("add_reaction {} {} {}", channel_id, message_id, emoji))
        }

        fn remove_reaction(
            &self,
            channel_id: &str,
            message_id: &str,
            emoji: &str,
        ) -> Result<(), PlatformError> {
            self.record(format!("remove_reaction {} {} {}", channel_id, message_id, emoji))
        }

        fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, PlatformError> {
            self.record(format!("get_channel {}", channel_id))?;
            Ok(ChannelInfo {
                id: channel_id.into(),
                name: "general".into(),
                kind: "text".into(),
                guild_id: Some("1".into()),
                topic: None,
            })
        }

        fn respond_to_interaction(
            &self,
            interaction: &InteractionHandle,
            message: &MessageSpec,
        ) -> Result<(), PlatformError> {
            self.record(format!(
                "respond {} {}",
                interaction.id,
                message.content.clone().unwrap_or_default()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_error_message() {
        let err = arg_error("new_button", 1, "expected table, got nil");
        let message = err.to_string();
        assert_eq!(message, "bad argument #1 to 'new_button' (expected table, got nil)");
    }

    #[test]
    fn test_platform_error_message() {
        let err = platform_error("send message", PlatformError::InvalidId("x".into()));
        assert!(err.to_string().contains("failed to send message: invalid id 'x'"));

        let err = platform_error("send message", PlatformError::Unavailable);
        assert!(err.to_string().contains("platform session not available"));
    }

    #[test]
    fn test_session_slot_requires_session() {
        let slot = SessionSlot::new();
        let err = slot.require().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("platform session not available"));

        slot.set(testing::RecordingSession::new());
        assert!(slot.require().is_ok());
    }
}
