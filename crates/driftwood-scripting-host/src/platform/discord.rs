use std::future::Future;
use std::sync::Arc;

use serenity::all::{
    ButtonStyle as DiscordButtonStyle, Channel, ChannelId, Command, CommandDataOption,
    CommandDataOptionValue, CommandOptionType, ComponentInteractionDataKind, CreateActionRow,
    CreateButton, CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, EditMessage, GuildId, Http, Interaction, InteractionId, Message,
    MessageId, ReactionType,
};
use tokio::runtime::Handle;
use tracing::debug;

use super::{
    parse_id, ChannelInfo, InteractionHandle, MessageRef, PlatformError, PlatformSession,
};
use crate::marshal::{
    ActionRow, ButtonStyle, CommandOptionSpec, CommandSpec, Component, InteractionEvent,
    InteractionKind, InteractionOption, InteractionUser, MessageSpec, OptionKind, OptionValue,
};

/// Most buttons the platform allows in one row
const BUTTONS_PER_ROW: usize = 5;

/// [`PlatformSession`] backed by serenity's HTTP client.
///
/// Requests are driven to completion on the given runtime handle, so methods
/// must not be called from a runtime worker thread.
pub struct SerenitySession {
    http: Arc<Http>,
    guild_id: Option<GuildId>,
    runtime: Handle,
}

impl SerenitySession {
    /// Commands are registered in `guild_id` when set, globally otherwise
    pub fn new(http: Arc<Http>, guild_id: Option<u64>, runtime: Handle) -> Self {
        Self {
            http,
            guild_id: guild_id.filter(|id| *id != 0).map(GuildId::new),
            runtime,
        }
    }

    fn block_on<F, T>(&self, operation: &str, future: F) -> Result<T, PlatformError>
    where
        F: Future<Output = serenity::Result<T>>,
    {
        self.runtime
            .block_on(future)
            .map_err(|e| PlatformError::request(operation, e))
    }
}

impl PlatformSession for SerenitySession {
    fn create_command(&self, command: &CommandSpec) -> Result<(), PlatformError> {
        let builder = create_command(command);
        let http = &*self.http;

        match self.guild_id {
            Some(guild_id) => {
                self.block_on("create command", guild_id.create_command(http, builder))?;
            }
            None => {
                self.block_on(
                    "create command",
                    Command::create_global_command(http, builder),
                )?;
            }
        }

        debug!(target: "scripting", "Created application command {}", command.name);
        Ok(())
    }

    fn send_message(
        &self,
        channel_id: &str,
        message: &MessageSpec,
    ) -> Result<MessageRef, PlatformError> {
        let channel = ChannelId::new(parse_id(channel_id)?);
        let mut builder = CreateMessage::new().components(action_rows(&message.components));
        if let Some(content) = &message.content {
            builder = builder.content(content);
        }

        let sent = self.block_on("send message", channel.send_message(&*self.http, builder))?;
        Ok(message_ref(&sent))
    }

    fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &MessageSpec,
    ) -> Result<MessageRef, PlatformError> {
        let channel = ChannelId::new(parse_id(channel_id)?);
        let message_id = MessageId::new(parse_id(message_id)?);
        let mut builder = EditMessage::new().components(action_rows(&message.components));
        if let Some(content) = &message.content {
            builder = builder.content(content);
        }

        let edited = self.block_on(
            "edit message",
            channel.edit_message(&*self.http, message_id, builder),
        )?;
        Ok(message_ref(&edited))
    }

    fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_id(channel_id)?);
        let message_id = MessageId::new(parse_id(message_id)?);
        self.block_on(
            "delete message",
            channel.delete_message(&*self.http, message_id),
        )
    }

    fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_id(channel_id)?);
        let message_id = MessageId::new(parse_id(message_id)?);
        let reaction = ReactionType::Unicode(emoji.to_string());
        self.block_on(
            "add reaction",
            channel.create_reaction(&*self.http, message_id, reaction),
        )
    }

    fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_id(channel_id)?);
        let message_id = MessageId::new(parse_id(message_id)?);
        let reaction = ReactionType::Unicode(emoji.to_string());
        self.block_on(
            "remove reaction",
            channel.delete_reaction(&*self.http, message_id, None, reaction),
        )
    }

    fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, PlatformError> {
        let channel = ChannelId::new(parse_id(channel_id)?);
        let channel = self.block_on("get channel", channel.to_channel(&*self.http))?;

        Ok(match channel {
            Channel::Guild(guild) => ChannelInfo {
                id: guild.id.to_string(),
                name: guild.name.clone(),
                kind: guild.kind.name().to_string(),
                guild_id: Some(guild.guild_id.to_string()),
                topic: guild.topic.clone(),
            },
            Channel::Private(private) => ChannelInfo {
                id: private.id.to_string(),
                name: private.name(),
                kind: "private".to_string(),
                guild_id: None,
                topic: None,
            },
            other => ChannelInfo {
                id: other.id().to_string(),
                kind: "unknown".to_string(),
                ..Default::default()
            },
        })
    }

    fn respond_to_interaction(
        &self,
        interaction: &InteractionHandle,
        message: &MessageSpec,
    ) -> Result<(), PlatformError> {
        let interaction_id = InteractionId::new(parse_id(&interaction.id)?);

        let mut data = CreateInteractionResponseMessage::new()
            .components(action_rows(&message.components))
            .ephemeral(message.ephemeral);
        if let Some(content) = &message.content {
            data = data.content(content);
        }
        let response = CreateInteractionResponse::Message(data);

        self.block_on(
            "respond to interaction",
            self.http.create_interaction_response(
                interaction_id,
                &interaction.token,
                &response,
                Vec::new(),
            ),
        )
    }
}

fn message_ref(message: &Message) -> MessageRef {
    MessageRef {
        id: message.id.to_string(),
        channel_id: message.channel_id.to_string(),
        content: message.content.clone(),
    }
}

fn option_type(kind: OptionKind) -> CommandOptionType {
    match kind {
        OptionKind::SubCommand => CommandOptionType::SubCommand,
        OptionKind::SubCommandGroup => CommandOptionType::SubCommandGroup,
        OptionKind::String => CommandOptionType::String,
        OptionKind::Integer => CommandOptionType::Integer,
        OptionKind::Boolean => CommandOptionType::Boolean,
        OptionKind::User => CommandOptionType::User,
        OptionKind::Channel => CommandOptionType::Channel,
        OptionKind::Role => CommandOptionType::Role,
        OptionKind::Mentionable => CommandOptionType::Mentionable,
        OptionKind::Number => CommandOptionType::Number,
        OptionKind::Attachment => CommandOptionType::Attachment,
    }
}

fn create_command(command: &CommandSpec) -> CreateCommand {
    CreateCommand::new(&command.name)
        .description(&command.description)
        .set_options(command.options.iter().map(create_option).collect())
}

fn create_option(option: &CommandOptionSpec) -> CreateCommandOption {
    let builder = CreateCommandOption::new(
        option_type(option.kind),
        &option.name,
        &option.description,
    );

    // The platform rejects `required` on subcommands and groups
    if option.kind.is_nesting() {
        builder.set_sub_options(option.options.iter().map(create_option))
    } else {
        builder.required(option.required)
    }
}

fn button_style(style: ButtonStyle) -> DiscordButtonStyle {
    match style {
        ButtonStyle::Primary => DiscordButtonStyle::Primary,
        ButtonStyle::Secondary => DiscordButtonStyle::Secondary,
        ButtonStyle::Success => DiscordButtonStyle::Success,
        ButtonStyle::Danger => DiscordButtonStyle::Danger,
    }
}

/// Map script rows to platform rows.
///
/// Buttons and select menus cannot share a row on the platform, so buttons
/// are packed into rows of their own and every select menu takes a row.
fn action_rows(rows: &[ActionRow]) -> Vec<CreateActionRow> {
    let mut out = Vec::new();

    for row in rows {
        let mut buttons = Vec::new();

        for component in &row.components {
            match component {
                Component::Button(button) => buttons.push(
                    CreateButton::new(&button.custom_id)
                        .label(&button.label)
                        .style(button_style(button.style))
                        .disabled(button.disabled),
                ),
                Component::SelectMenu(menu) => {
                    let options = menu
                        .options
                        .iter()
                        .map(|o| {
                            let option = CreateSelectMenuOption::new(&o.label, &o.value);
                            match &o.description {
                                Some(description) => option.description(description),
                                None => option,
                            }
                        })
                        .collect();

                    let mut select = CreateSelectMenu::new(
                        &menu.custom_id,
                        CreateSelectMenuKind::String { options },
                    )
                    .disabled(menu.disabled);
                    if let Some(placeholder) = &menu.placeholder {
                        select = select.placeholder(placeholder);
                    }
                    out.push(CreateActionRow::SelectMenu(select));
                }
            }
        }

        while !buttons.is_empty() {
            let rest = buttons.split_off(buttons.len().min(BUTTONS_PER_ROW));
            out.push(CreateActionRow::Buttons(buttons));
            buttons = rest;
        }
    }

    out
}

/// Convert a serenity interaction into the host representation.
///
/// Returns `None` for interaction kinds scripts cannot observe.
pub fn interaction_from_serenity(interaction: &Interaction) -> Option<InteractionEvent> {
    match interaction {
        Interaction::Command(command) => Some(InteractionEvent {
            id: command.id.to_string(),
            token: command.token.clone(),
            kind: InteractionKind::ApplicationCommand {
                name: command.data.name.clone(),
                options: command.data.options.iter().filter_map(convert_option).collect(),
            },
            user: InteractionUser {
                id: command.user.id.to_string(),
                name: command.user.name.clone(),
            },
            channel_id: Some(command.channel_id.to_string()),
            guild_id: command.guild_id.map(|id| id.to_string()),
        }),
        Interaction::Component(component) => {
            let values = match &component.data.kind {
                ComponentInteractionDataKind::StringSelect { values } => values.clone(),
                ComponentInteractionDataKind::UserSelect { values } => {
                    values.iter().map(ToString::to_string).collect()
                }
                ComponentInteractionDataKind::RoleSelect { values } => {
                    values.iter().map(ToString::to_string).collect()
                }
                ComponentInteractionDataKind::ChannelSelect { values } => {
                    values.iter().map(ToString::to_string).collect()
                }
                _ => Vec::new(),
            };

            Some(InteractionEvent {
                id: component.id.to_string(),
                token: component.token.clone(),
                kind: InteractionKind::MessageComponent {
                    custom_id: component.data.custom_id.clone(),
                    values,
                },
                user: InteractionUser {
                    id: component.user.id.to_string(),
                    name: component.user.name.clone(),
                },
                channel_id: Some(component.channel_id.to_string()),
                guild_id: component.guild_id.map(|id| id.to_string()),
            })
        }
        _ => None,
    }
}

fn convert_option(option: &CommandDataOption) -> Option<InteractionOption> {
    let name = option.name.clone();

    let converted = match &option.value {
        CommandDataOptionValue::SubCommand(children) => InteractionOption::nested(
            name,
            OptionKind::SubCommand,
            children.iter().filter_map(convert_option).collect(),
        ),
        CommandDataOptionValue::SubCommandGroup(children) => InteractionOption::nested(
            name,
            OptionKind::SubCommandGroup,
            children.iter().filter_map(convert_option).collect(),
        ),
        CommandDataOptionValue::String(s) => {
            InteractionOption::value(name, OptionKind::String, OptionValue::String(s.clone()))
        }
        CommandDataOptionValue::Integer(n) => {
            InteractionOption::value(name, OptionKind::Integer, OptionValue::Integer(*n))
        }
        CommandDataOptionValue::Number(n) => {
            InteractionOption::value(name, OptionKind::Number, OptionValue::Number(*n))
        }
        CommandDataOptionValue::Boolean(b) => {
            InteractionOption::value(name, OptionKind::Boolean, OptionValue::Boolean(*b))
        }
        CommandDataOptionValue::User(id) => {
            InteractionOption::value(name, OptionKind::User, OptionValue::Raw(id.to_string()))
        }
        CommandDataOptionValue::Channel(id) => {
            InteractionOption::value(name, OptionKind::Channel, OptionValue::Raw(id.to_string()))
        }
        CommandDataOptionValue::Role(id) => {
            InteractionOption::value(name, OptionKind::Role, OptionValue::Raw(id.to_string()))
        }
        CommandDataOptionValue::Mentionable(id) => InteractionOption::value(
            name,
            OptionKind::Mentionable,
            OptionValue::Raw(id.to_string()),
        ),
        CommandDataOptionValue::Attachment(id) => InteractionOption::value(
            name,
            OptionKind::Attachment,
            OptionValue::Raw(id.to_string()),
        ),
        _ => return None,
    };

    Some(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{Button, SelectMenu, SelectMenuOption};

    fn button(id: &str) -> Component {
        Component::Button(Button {
            label: id.to_uppercase(),
            custom_id: id.to_string(),
            style: ButtonStyle::Primary,
            disabled: false,
        })
    }

    #[test]
    fn test_select_menus_get_their_own_rows() {
        let row = ActionRow {
            components: vec![
                button("a"),
                Component::SelectMenu(SelectMenu {
                    custom_id: "menu".into(),
                    placeholder: None,
                    options: vec![SelectMenuOption {
                        label: "One".into(),
                        value: "1".into(),
                        description: None,
                    }],
                    disabled: false,
                }),
                button("b"),
            ],
        };

        let rows = action_rows(&[row]);
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0], CreateActionRow::SelectMenu(_)));
        match &rows[1] {
            CreateActionRow::Buttons(buttons) => assert_eq!(buttons.len(), 2),
            _ => panic!("expected a button row"),
        }
    }

    #[test]
    fn test_buttons_are_split_into_rows_of_five() {
        let row = ActionRow {
            components: (0..7).map(|i| button(&format!("b{}", i))).collect(),
        };

        let rows = action_rows(&[row]);
        let sizes: Vec<_> = rows
            .iter()
            .map(|r| match r {
                CreateActionRow::Buttons(b) => b.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(sizes, vec![5, 2]);
    }

    #[test]
    fn test_every_option_kind_maps() {
        for kind in OptionKind::ALL {
            assert_eq!(u8::from(option_type(kind)), kind.code());
        }
    }

    #[test]
    fn test_nested_options_reach_command_payload() {
        let leaf = |name: &str, kind| CommandOptionSpec {
            name: name.into(),
            description: "d".into(),
            kind,
            required: true,
            options: Vec::new(),
        };
        let spec = CommandSpec {
            name: "admin".into(),
            description: "Admin tools".into(),
            options: vec![CommandOptionSpec {
                name: "user".into(),
                description: "group".into(),
                kind: OptionKind::SubCommandGroup,
                required: false,
                options: vec![CommandOptionSpec {
                    options: vec![leaf("who", OptionKind::User)],
                    ..leaf("ban", OptionKind::SubCommand)
                }],
            }],
        };

        let payload = serenity::json::to_string(&create_command(&spec)).unwrap();
        for name in ["\"admin\"", "\"user\"", "\"ban\"", "\"who\""] {
            assert!(payload.contains(name), "{} missing from {}", name, payload);
        }
    }
}
