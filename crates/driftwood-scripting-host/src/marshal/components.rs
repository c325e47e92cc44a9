use mlua::{Lua, Table, Value};
use tracing::debug;

use super::{flag, lua_string, MarshalError};

/// Visual style of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonStyle {
    #[default]
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ButtonStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Some(ButtonStyle::Primary),
            "secondary" => Some(ButtonStyle::Secondary),
            "success" => Some(ButtonStyle::Success),
            "danger" => Some(ButtonStyle::Danger),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ButtonStyle::Primary => "primary",
            ButtonStyle::Secondary => "secondary",
            ButtonStyle::Success => "success",
            ButtonStyle::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub custom_id: String,
    pub style: ButtonStyle,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectMenuOption {
    pub label: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: Option<String>,
    pub options: Vec<SelectMenuOption>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Button(Button),
    SelectMenu(SelectMenu),
}

/// A row of components as scripts describe it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionRow {
    pub components: Vec<Component>,
}

/// Parse a sequence of component tables into action rows.
///
/// Entries that are not tables, have an unknown `type` or lack required
/// fields are skipped. Everything valid lands in a single row.
pub fn parse_components(table: &Table) -> Result<Vec<ActionRow>, MarshalError> {
    let mut components = Vec::new();

    for (index, entry) in table.sequence_values::<Value>().enumerate() {
        let Ok(Value::Table(entry)) = entry else {
            debug!(target: "scripting", "Skipping component #{}: not a table", index + 1);
            continue;
        };

        match parse_component(&entry) {
            Some(component) => components.push(component),
            None => debug!(target: "scripting", "Skipping invalid component #{}", index + 1),
        }
    }

    if components.is_empty() {
        return Err(MarshalError::NoValidComponents);
    }

    Ok(vec![ActionRow { components }])
}

fn parse_component(table: &Table) -> Option<Component> {
    match string_field(table, "type")?.as_str() {
        "button" => {
            let style = string_field(table, "style")
                .and_then(|s| ButtonStyle::parse(&s))
                .unwrap_or_default();

            Some(Component::Button(Button {
                label: string_field(table, "label")?,
                custom_id: string_field(table, "custom_id")?,
                style,
                disabled: flag(table, "disabled"),
            }))
        }
        "select" => {
            let Ok(Value::Table(options)) = table.raw_get::<Value>("options") else {
                return None;
            };

            Some(Component::SelectMenu(SelectMenu {
                custom_id: string_field(table, "custom_id")?,
                placeholder: string_field(table, "placeholder"),
                options: parse_select_options(&options),
                disabled: flag(table, "disabled"),
            }))
        }
        _ => None,
    }
}

pub(crate) fn parse_select_options(table: &Table) -> Vec<SelectMenuOption> {
    table
        .sequence_values::<Value>()
        .filter_map(|entry| match entry {
            Ok(Value::Table(option)) => Some(SelectMenuOption {
                label: string_field(&option, "label")?,
                value: string_field(&option, "value")?,
                description: string_field(&option, "description"),
            }),
            _ => None,
        })
        .collect()
}

fn string_field(table: &Table, field: &str) -> Option<String> {
    match table.raw_get::<Value>(field) {
        Ok(Value::String(s)) => Some(lua_string(&s)),
        _ => None,
    }
}

impl Button {
    /// Component table handed back to scripts by `new_button`
    pub fn to_table(&self, lua: &Lua) -> mlua::Result<Table> {
        let table = lua.create_table()?;
        table.set("type", "button")?;
        table.set("label", self.label.as_str())?;
        table.set("custom_id", self.custom_id.as_str())?;
        table.set("style", self.style.as_str())?;
        table.set("disabled", self.disabled)?;
        Ok(table)
    }
}

impl SelectMenuOption {
    pub fn to_table(&self, lua: &Lua) -> mlua::Result<Table> {
        let table = lua.create_table()?;
        table.set("label", self.label.as_str())?;
        table.set("value", self.value.as_str())?;
        if let Some(description) = &self.description {
            table.set("description", description.as_str())?;
        }
        Ok(table)
    }
}

impl SelectMenu {
    /// Component table handed back to scripts by `new_select_menu`
    pub fn to_table(&self, lua: &Lua) -> mlua::Result<Table> {
        let table = lua.create_table()?;
        table.set("type", "select")?;
        table.set("custom_id", self.custom_id.as_str())?;
        if let Some(placeholder) = &self.placeholder {
            table.set("placeholder", placeholder.as_str())?;
        }
        let options = lua.create_table()?;
        for (i, option) in self.options.iter().enumerate() {
            options.raw_set(i + 1, option.to_table(lua)?)?;
        }
        table.set("options", options)?;
        table.set("disabled", self.disabled)?;
        Ok(table)
    }
}
