use mlua::{Function, Table, Value};
use tracing::debug;

use super::{flag, raw_field, required_string, type_name, field_path, MarshalError};

/// Separator between a command name and its subcommand in a dispatch key
pub const DISPATCH_KEY_SEPARATOR: &str = "_";

/// Application command option types, numbered as the platform numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl OptionKind {
    pub const ALL: [OptionKind; 11] = [
        OptionKind::SubCommand,
        OptionKind::SubCommandGroup,
        OptionKind::String,
        OptionKind::Integer,
        OptionKind::Boolean,
        OptionKind::User,
        OptionKind::Channel,
        OptionKind::Role,
        OptionKind::Mentionable,
        OptionKind::Number,
        OptionKind::Attachment,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(OptionKind::SubCommand),
            2 => Some(OptionKind::SubCommandGroup),
            3 => Some(OptionKind::String),
            4 => Some(OptionKind::Integer),
            5 => Some(OptionKind::Boolean),
            6 => Some(OptionKind::User),
            7 => Some(OptionKind::Channel),
            8 => Some(OptionKind::Role),
            9 => Some(OptionKind::Mentionable),
            10 => Some(OptionKind::Number),
            11 => Some(OptionKind::Attachment),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            OptionKind::SubCommand => 1,
            OptionKind::SubCommandGroup => 2,
            OptionKind::String => 3,
            OptionKind::Integer => 4,
            OptionKind::Boolean => 5,
            OptionKind::User => 6,
            OptionKind::Channel => 7,
            OptionKind::Role => 8,
            OptionKind::Mentionable => 9,
            OptionKind::Number => 10,
            OptionKind::Attachment => 11,
        }
    }

    /// Name of the constant exposed to scripts for this kind
    pub fn constant_name(self) -> &'static str {
        match self {
            OptionKind::SubCommand => "option_subcommand",
            OptionKind::SubCommandGroup => "option_subcommand_group",
            OptionKind::String => "option_string",
            OptionKind::Integer => "option_integer",
            OptionKind::Boolean => "option_boolean",
            OptionKind::User => "option_user",
            OptionKind::Channel => "option_channel",
            OptionKind::Role => "option_role",
            OptionKind::Mentionable => "option_mentionable",
            OptionKind::Number => "option_number",
            OptionKind::Attachment => "option_attachment",
        }
    }

    /// Whether options of this kind carry nested options instead of a value
    pub fn is_nesting(self) -> bool {
        matches!(self, OptionKind::SubCommand | OptionKind::SubCommandGroup)
    }
}

/// A command as it is sent to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionSpec>,
}

/// One node of a command's option tree
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOptionSpec {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
    pub options: Vec<CommandOptionSpec>,
}

/// Result of parsing a command descriptor table
#[derive(Debug)]
pub struct ParsedCommand {
    pub spec: CommandSpec,
    /// The command's own handler, if the descriptor had one
    pub handler: Option<Function>,
    /// Subcommand handlers keyed by dispatch key, in declaration order
    pub subcommand_handlers: Vec<(String, Function)>,
    /// Whether any option is a subcommand group
    pub has_subcommand_groups: bool,
}

/// Build the dispatch key for a command and an optional subcommand
pub fn dispatch_key(command: &str, subcommand: Option<&str>) -> String {
    match subcommand {
        Some(sub) => format!("{}{}{}", command, DISPATCH_KEY_SEPARATOR, sub),
        None => command.to_string(),
    }
}

/// Parse a command descriptor table.
///
/// `name` and `description` must be strings, `handler` must be a function
/// when present and `options` a table when present. Option entries that are
/// not tables are skipped; malformed option tables are errors.
pub fn parse_command(table: &Table) -> Result<ParsedCommand, MarshalError> {
    let name = required_string(table, "name", "")?;
    let description = required_string(table, "description", "")?;

    let handler = match raw_field(table, "handler", "")? {
        Value::Nil => None,
        Value::Function(f) => Some(f),
        other => {
            return Err(MarshalError::invalid(
                "handler",
                format!("expected function or nil, got {}", type_name(&other)),
            ))
        }
    };

    let mut parser = OptionParser::default();
    let options = match raw_field(table, "options", "")? {
        Value::Nil => Vec::new(),
        Value::Table(options) => parser.parse(&options, &name, "options")?,
        other => {
            return Err(MarshalError::invalid(
                "options",
                format!("expected table or nil, got {}", type_name(&other)),
            ))
        }
    };

    Ok(ParsedCommand {
        spec: CommandSpec {
            name,
            description,
            options,
        },
        handler,
        subcommand_handlers: parser.handlers,
        has_subcommand_groups: parser.saw_group,
    })
}

#[derive(Default)]
struct OptionParser {
    handlers: Vec<(String, Function)>,
    saw_group: bool,
    /// Number of enclosing subcommand groups
    group_depth: usize,
}

impl OptionParser {
    fn parse(
        &mut self,
        table: &Table,
        parent_key: &str,
        path: &str,
    ) -> Result<Vec<CommandOptionSpec>, MarshalError> {
        let mut options = Vec::new();

        for (index, entry) in table.sequence_values::<Value>().enumerate() {
            let path = format!("{}[{}]", path, index + 1);
            let entry = entry.map_err(|e| MarshalError::invalid(&path, e.to_string()))?;

            let Value::Table(option) = entry else {
                debug!(target: "scripting", "Skipping non-table option entry at {}", path);
                continue;
            };

            options.push(self.parse_option(&option, parent_key, &path)?);
        }

        Ok(options)
    }

    fn parse_option(
        &mut self,
        option: &Table,
        parent_key: &str,
        path: &str,
    ) -> Result<CommandOptionSpec, MarshalError> {
        let name = required_string(option, "name", path)?;
        let description = required_string(option, "description", path)?;
        let kind = parse_kind(option, path)?;
        let required = flag(option, "required");

        let mut nested = Vec::new();
        match kind {
            OptionKind::SubCommand => {
                let handler = match raw_field(option, "handler", path)? {
                    Value::Function(f) => f,
                    other => {
                        return Err(MarshalError::invalid(
                            field_path(path, "handler"),
                            format!(
                                "subcommand '{}' must have a handler function, got {}",
                                name,
                                type_name(&other)
                            ),
                        ))
                    }
                };

                let key = dispatch_key(parent_key, Some(&name));
                if self.group_depth == 0 {
                    self.handlers.push((key.clone(), handler));
                } else {
                    // Group invocations dispatch to the command's own handler
                    debug!(target: "scripting", "Not recording handler for grouped subcommand {}", key);
                }
                nested = self.parse_nested(option, &key, path)?;
            }
            OptionKind::SubCommandGroup => {
                self.saw_group = true;
                let key = dispatch_key(parent_key, Some(&name));
                self.group_depth += 1;
                let parsed = self.parse_nested(option, &key, path);
                self.group_depth -= 1;
                nested = parsed?;
            }
            _ => {}
        }

        debug!(
            target: "scripting",
            "Parsed command option {} ({:?}) under {}",
            name,
            kind,
            parent_key
        );

        Ok(CommandOptionSpec {
            name,
            description,
            kind,
            required,
            options: nested,
        })
    }

    fn parse_nested(
        &mut self,
        option: &Table,
        key: &str,
        path: &str,
    ) -> Result<Vec<CommandOptionSpec>, MarshalError> {
        match raw_field(option, "options", path)? {
            Value::Nil => Ok(Vec::new()),
            Value::Table(nested) => self.parse(&nested, key, &field_path(path, "options")),
            other => Err(MarshalError::invalid(
                field_path(path, "options"),
                format!("expected table or nil, got {}", type_name(&other)),
            )),
        }
    }
}

fn parse_kind(option: &Table, path: &str) -> Result<OptionKind, MarshalError> {
    let code = match raw_field(option, "type", path)? {
        Value::Integer(n) => n,
        Value::Number(n) if n.fract() == 0.0 => n as i64,
        other => {
            return Err(MarshalError::invalid(
                field_path(path, "type"),
                format!("expected number, got {}", type_name(&other)),
            ))
        }
    };

    OptionKind::from_code(code).ok_or_else(|| {
        MarshalError::invalid(
            field_path(path, "type"),
            format!("unknown option type {}", code),
        )
    })
}
