//! Declarative description of an application.
//!
//! The schema types mirror the builders in [`crate::tree`] field for field and
//! derive serde, so a whole command surface can live in a YAML or JSON file.
//! Callbacks cannot be described this way; attach them to the converted
//! [`Command`]s or the [`Application`] afterwards.

use serde::{Deserialize, Serialize};

use crate::app::Application;
use crate::tree::{Arg, Category, Command, Flag};
use crate::value::{ValueKind, ValueType};

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Schema for a whole application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage: String,
    /// Accept flags after positional values. Defaults to true.
    #[serde(default = "default_true")]
    pub mix_args_and_flags: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_help_command: bool,
    /// Global flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
}

impl AppSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            author: None,
            description: String::new(),
            usage: String::new(),
            mix_args_and_flags: true,
            show_help_command: false,
            flags: Vec::new(),
            args: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn with_flag(mut self, flag: FlagSchema) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_arg(mut self, arg: ArgSchema) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_command(mut self, command: CommandSchema) -> Self {
        self.commands.push(command);
        self
    }

    /// Counts every command in the schema, the root included.
    pub fn command_count(&self) -> usize {
        1 + self
            .commands
            .iter()
            .map(CommandSchema::command_count)
            .sum::<usize>()
    }

    /// Builds an application without callbacks.
    ///
    /// Declaration problems surface when the application initialises.
    pub fn into_application(self) -> Application {
        let mut app = Application::new(self.name)
            .with_description(self.description)
            .with_usage(self.usage)
            .with_mix_args_and_flags(self.mix_args_and_flags)
            .with_help_command(self.show_help_command);
        if let Some(version) = self.version {
            app = app.with_version(version);
        }
        if let Some(author) = self.author {
            app = app.with_author(author);
        }
        for flag in self.flags {
            app = app.with_flag(flag.into_flag());
        }
        for arg in self.args {
            app = app.with_arg(arg.into_arg());
        }
        for command in self.commands {
            app = app.with_subcommand(command.into_command());
        }
        app
    }
}

/// Schema for a sub-command and everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub usage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagSchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
}

impl CommandSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_flag(mut self, flag: FlagSchema) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_arg(mut self, arg: ArgSchema) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_command(mut self, command: CommandSchema) -> Self {
        self.commands.push(command);
        self
    }

    fn command_count(&self) -> usize {
        1 + self
            .commands
            .iter()
            .map(CommandSchema::command_count)
            .sum::<usize>()
    }

    pub fn into_command(self) -> Command {
        let mut command = Command::new(self.name)
            .with_description(self.description)
            .with_usage(self.usage)
            .with_groups(self.groups)
            .with_optional(self.optional)
            .with_hidden(self.hidden);
        for alias in self.aliases {
            command = command.with_alias(alias);
        }
        if let Some(category) = self.category {
            command = command.with_category(category);
        }
        for flag in self.flags {
            command = command.with_flag(flag.into_flag());
        }
        for arg in self.args {
            command = command.with_arg(arg.into_arg());
        }
        for child in self.commands {
            command = command.with_subcommand(child.into_command());
        }
        command
    }
}

/// Schema for a flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlagSchema {
    /// Long form without the dashes.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// Accept the flag more than once, accumulating values.
    #[serde(skip_serializing_if = "is_false")]
    pub multiple: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub hidden: bool,
}

impl FlagSchema {
    pub fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ..Default::default()
        }
    }

    pub fn boolean(name: &str, short: Option<char>) -> Self {
        Self {
            short,
            ..Self::new(name, ValueKind::Bool)
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn allow_multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn value_type(&self) -> ValueType {
        if self.multiple {
            ValueType::many(self.kind)
        } else {
            ValueType::one(self.kind)
        }
    }

    pub fn into_flag(self) -> Flag {
        let mut flag = Flag::new(self.name.clone(), self.value_type())
            .with_usage(self.description)
            .with_hints(self.hints)
            .with_required(self.required)
            .with_groups(self.groups)
            .with_hidden(self.hidden);
        if let Some(short) = self.short {
            flag = flag.with_short(short);
        }
        if let Some(default) = self.default {
            flag = flag.with_default(default);
        }
        if let Some(placeholder) = self.placeholder {
            flag = flag.with_placeholder(placeholder);
        }
        flag
    }
}

/// Schema for a positional argument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArgSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// Swallow every remaining positional value.
    #[serde(skip_serializing_if = "is_false")]
    pub multiple: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl ArgSchema {
    pub fn required(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            ..Default::default()
        }
    }

    pub fn optional(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ..Default::default()
        }
    }

    pub fn allow_multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn value_type(&self) -> ValueType {
        if self.multiple {
            ValueType::many(self.kind)
        } else {
            ValueType::one(self.kind)
        }
    }

    pub fn into_arg(self) -> Arg {
        let mut arg = Arg::new(self.name.clone(), self.value_type())
            .with_usage(self.description)
            .with_hints(self.hints)
            .with_required(self.required)
            .with_groups(self.groups);
        if let Some(default) = self.default {
            arg = arg.with_default(default);
        }
        if let Some(placeholder) = self.placeholder {
            arg = arg.with_placeholder(placeholder);
        }
        arg
    }
}
