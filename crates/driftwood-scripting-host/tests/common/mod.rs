// Shared fixtures for scripting host integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use driftwood_scripting_host::marshal::{
    CommandSpec, InteractionKind, InteractionOption, InteractionUser, MessageSpec,
};
use driftwood_scripting_host::{
    ChannelInfo, InteractionEvent, InteractionHandle, MessageRef, PlatformError, PlatformSession,
    Runner, ScriptManager,
};

/// A platform call observed by [`MockSession`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateCommand(CommandSpec),
    SendMessage { channel_id: String, message: MessageSpec },
    Respond { interaction_id: String, message: MessageSpec },
    Other(String),
}

/// Records every platform call in order
#[derive(Default)]
pub struct MockSession {
    calls: Mutex<Vec<Call>>,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateCommand(spec) => Some(spec.name),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Respond { message, .. } => message.content,
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PlatformSession for MockSession {
    fn create_command(&self, command: &CommandSpec) -> Result<(), PlatformError> {
        self.push(Call::CreateCommand(command.clone()));
        Ok(())
    }

    fn send_message(
        &self,
        channel_id: &str,
        message: &MessageSpec,
    ) -> Result<MessageRef, PlatformError> {
        self.push(Call::SendMessage {
            channel_id: channel_id.to_string(),
            message: message.clone(),
        });
        Ok(MessageRef {
            id: "1000".to_string(),
            channel_id: channel_id.to_string(),
            content: message.content.clone().unwrap_or_default(),
        })
    }

    fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &MessageSpec,
    ) -> Result<MessageRef, PlatformError> {
        self.push(Call::Other(format!("edit {} {}", channel_id, message_id)));
        Ok(MessageRef {
            id: message_id.to_string(),
            channel_id: channel_id.to_string(),
            content: message.content.clone().unwrap_or_default(),
        })
    }

    fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), PlatformError> {
        self.push(Call::Other(format!("delete {} {}", channel_id, message_id)));
        Ok(())
    }

    fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), PlatformError> {
        self.push(Call::Other(format!("react {} {} {}", channel_id, message_id, emoji)));
        Ok(())
    }

    fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        self.push(Call::Other(format!("unreact {} {} {}", channel_id, message_id, emoji)));
        Ok(())
    }

    fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, PlatformError> {
        self.push(Call::Other(format!("channel {}", channel_id)));
        Ok(ChannelInfo {
            id: channel_id.to_string(),
            name: "general".to_string(),
            kind: "text".to_string(),
            guild_id: None,
            topic: Some("chatter".to_string()),
        })
    }

    fn respond_to_interaction(
        &self,
        interaction: &InteractionHandle,
        message: &MessageSpec,
    ) -> Result<(), PlatformError> {
        self.push(Call::Respond {
            interaction_id: interaction.id.clone(),
            message: message.clone(),
        });
        Ok(())
    }
}

/// A manager on its own runner, so tests do not share an interpreter
pub fn manager() -> ScriptManager {
    let runner = Runner::new().expect("runner should start");
    ScriptManager::with_runner(runner, tokio::runtime::Handle::current())
        .expect("manager should start")
}

pub fn command(name: &str, options: Vec<InteractionOption>) -> InteractionEvent {
    InteractionEvent {
        id: "4242".to_string(),
        token: "token".to_string(),
        kind: InteractionKind::ApplicationCommand {
            name: name.to_string(),
            options,
        },
        user: InteractionUser {
            id: "7".to_string(),
            name: "tester".to_string(),
        },
        channel_id: Some("99".to_string()),
        guild_id: Some("1".to_string()),
    }
}

pub fn component(custom_id: &str, values: &[&str]) -> InteractionEvent {
    InteractionEvent {
        kind: InteractionKind::MessageComponent {
            custom_id: custom_id.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        },
        ..command("unused", Vec::new())
    }
}

/// Evaluate an expression in the manager's interpreter
pub fn eval<R>(manager: &ScriptManager, source: &'static str) -> R
where
    R: mlua::FromLua + Send + 'static,
{
    manager
        .runner()
        .call(move |lua| lua.load(source).eval::<R>().map_err(|e| e.to_string()))
        .expect("runner should accept tasks")
        .expect("expression should evaluate")
}
