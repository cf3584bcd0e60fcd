//! Declaration tree: command, flag and argument builders plus the arena they
//! are flattened into at init.
//!
//! Applications describe their surface with the owned builders [`Command`],
//! [`Flag`] and [`Arg`]. [`Tree::build`] walks that description once, top to
//! bottom, assigning every node a [`CommandId`] and recording parent links,
//! levels and the name/alias lookup of each command's children. After that the
//! shape never changes; only per-run bookkeeping (bound values and the
//! set-by-user bits) is touched by parsing.
//!
//! # Examples
//!
//! ```
//! use cmdtree_core::{Arg, Command, Flag, Tree, ValueKind, ValueType};
//!
//! let root = Command::new("kubectl")
//!     .with_flag(Flag::bool("verbose").with_short('v'))
//!     .with_subcommand(
//!         Command::new("get")
//!             .with_alias("g")
//!             .with_arg(Arg::new("resource", ValueType::one(ValueKind::Text)).with_required(true)),
//!     );
//!
//! let tree = Tree::build(root).unwrap();
//! let get = tree.find(&["g"]).unwrap();
//! assert_eq!(tree.full_command(get), "kubectl get");
//! assert!(tree.is_leaf(get));
//! assert!(!tree.is_leaf(tree.root()));
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BoxError, DeclarationError, ElementType, Error};
use crate::execute::{ActionContext, ActionData};
use crate::validate::Check;
use crate::value::{Destination, Value, ValueKind, ValueType};

/// Validator attached to a flag.
pub type FlagValidator = Box<dyn Fn(&Check<'_>, &Flag) -> Result<(), BoxError>>;
/// Validator attached to a positional argument.
pub type ArgValidator = Box<dyn Fn(&Check<'_>, &Arg) -> Result<(), BoxError>>;
/// Validator attached to a command; runs after all flags and arguments pass.
pub type CommandValidator = Box<dyn Fn(&Check<'_>, &CommandNode) -> Result<(), BoxError>>;
/// Action callback. Receives what the child command's action returned.
pub type Action =
    Box<dyn Fn(&ActionContext<'_>, Option<ActionData>) -> Result<Option<ActionData>, BoxError>>;

/// Index of a command in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CommandId(usize);

/// Index of a flag in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagId(usize);

/// Index of a positional argument in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgId(usize);

/// Heading under which usage lists a sub-command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Lower orders are listed first.
    #[serde(default)]
    pub order: i32,
}

impl Category {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

/// Value-binding state shared by flags and arguments.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    name: String,
    usage: String,
    hints: Vec<String>,
    default: Option<String>,
    required: bool,
    placeholder: Option<String>,
    groups: Vec<String>,
    destination: Destination,
    set_by_user: bool,
}

impl Binding {
    fn new(name: String, value_type: ValueType) -> Self {
        Self {
            name,
            destination: Destination::new(value_type),
            ..Self::default()
        }
    }

    fn bind(&mut self, raw: &str, element: ElementType) -> Result<(), Error> {
        self.destination
            .bind(raw, &self.hints)
            .map_err(|source| Error::InvalidValue {
                element,
                name: self.name.clone(),
                value: raw.to_string(),
                source,
            })
    }

    fn clear(&mut self) {
        self.destination.clear();
        self.set_by_user = false;
    }
}

/// Read access common to [`Flag`] and [`Arg`].
pub trait FlagArg {
    fn binding(&self) -> &Binding;

    fn element_type(&self) -> ElementType;

    fn name(&self) -> &str {
        &self.binding().name
    }

    fn usage(&self) -> &str {
        &self.binding().usage
    }

    fn hints(&self) -> &[String] {
        &self.binding().hints
    }

    /// Declared default, applied after parsing when the user gave nothing.
    fn default_value(&self) -> Option<&str> {
        self.binding().default.as_deref()
    }

    fn is_required(&self) -> bool {
        self.binding().required
    }

    /// Placeholder shown in usage; the name when none was declared.
    fn placeholder(&self) -> &str {
        self.binding()
            .placeholder
            .as_deref()
            .unwrap_or(self.name())
    }

    fn groups(&self) -> &[String] {
        &self.binding().groups
    }

    fn value_type(&self) -> ValueType {
        self.binding().destination.value_type()
    }

    fn is_cumulative(&self) -> bool {
        self.value_type().is_cumulative()
    }

    fn is_bool(&self) -> bool {
        self.value_type().is_bool()
    }

    /// Bound value, or the zero value of the declared type.
    fn value(&self) -> Value {
        self.binding().destination.current()
    }

    /// True only for values that came from the command line.
    fn is_set_by_user(&self) -> bool {
        self.binding().set_by_user
    }
}

macro_rules! binding_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
                self.binding.usage = usage.into();
                self
            }

            pub fn with_hints<I, S>(mut self, hints: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.binding.hints = hints.into_iter().map(Into::into).collect();
                self
            }

            /// Empty defaults are ignored.
            pub fn with_default(mut self, default: impl Into<String>) -> Self {
                let default = default.into();
                self.binding.default = (!default.is_empty()).then_some(default);
                self
            }

            pub fn with_required(mut self, required: bool) -> Self {
                self.binding.required = required;
                self
            }

            pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
                self.binding.placeholder = Some(placeholder.into());
                self
            }

            /// Validation groups this element belongs to.
            pub fn with_groups<I, S>(mut self, groups: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.binding.groups = groups.into_iter().map(Into::into).collect();
                self
            }

            pub(crate) fn set_required(&mut self, required: bool) {
                self.binding.required = required;
            }

            /// Binds the declared default without marking the element as set.
            pub(crate) fn apply_default(&mut self) -> Result<(), Error> {
                let Some(default) = self.binding.default.clone() else {
                    return Ok(());
                };
                self.bind_raw(&default)
            }

            pub(crate) fn clear(&mut self) {
                self.binding.clear();
            }
        }
    };
}

/// A named option, `--name` or `-n`.
pub struct Flag {
    binding: Binding,
    short: Option<char>,
    hidden: bool,
    level: usize,
    validator: Option<FlagValidator>,
}

impl Flag {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            binding: Binding::new(name.into(), value_type),
            short: None,
            hidden: false,
            level: 0,
            validator: None,
        }
    }

    /// A switch that takes no value token.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::one(ValueKind::Bool))
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::one(ValueKind::Text))
    }

    /// A single choice among `hints`.
    pub fn choice<I, S>(name: impl Into<String>, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, ValueType::one(ValueKind::Choice)).with_hints(hints)
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Hidden flags still parse but are left out of usage.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Check<'_>, &Flag) -> Result<(), BoxError> + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn short(&self) -> Option<char> {
        self.short
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Depth of the command that declared this flag.
    pub fn level(&self) -> usize {
        self.level
    }

    pub(crate) fn validator(&self) -> Option<&FlagValidator> {
        self.validator.as_ref()
    }

    /// Binds a value from the command line.
    ///
    /// A non-cumulative flag may be given only once per run.
    pub(crate) fn set_value(&mut self, raw: &str) -> Result<(), Error> {
        if self.binding.set_by_user && !self.is_cumulative() {
            return Err(Error::FlagAlreadySet {
                name: self.binding.name.clone(),
            });
        }
        self.bind_raw(raw)?;
        self.binding.set_by_user = true;
        Ok(())
    }

    fn bind_raw(&mut self, raw: &str) -> Result<(), Error> {
        self.binding.bind(raw, ElementType::Flag)
    }
}

binding_builders!(Flag);

impl FlagArg for Flag {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn element_type(&self) -> ElementType {
        ElementType::Flag
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("binding", &self.binding)
            .field("short", &self.short)
            .field("hidden", &self.hidden)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

/// A positional argument, bound in declaration order.
pub struct Arg {
    binding: Binding,
    validator: Option<ArgValidator>,
}

impl Arg {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            binding: Binding::new(name.into(), value_type),
            validator: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::one(ValueKind::Text))
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Check<'_>, &Arg) -> Result<(), BoxError> + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub(crate) fn validator(&self) -> Option<&ArgValidator> {
        self.validator.as_ref()
    }

    /// Binds a token; cumulative arguments split it on commas first.
    pub(crate) fn set_value(&mut self, raw: &str) -> Result<(), Error> {
        self.bind_raw(raw)?;
        self.binding.set_by_user = true;
        Ok(())
    }

    fn bind_raw(&mut self, raw: &str) -> Result<(), Error> {
        if !self.is_cumulative() {
            return self.binding.bind(raw, ElementType::Argument);
        }
        for part in raw.split(',') {
            self.binding.bind(part, ElementType::Argument)?;
        }
        Ok(())
    }
}

binding_builders!(Arg);

impl FlagArg for Arg {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn element_type(&self) -> ElementType {
        ElementType::Argument
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Builder for one command and everything beneath it.
#[derive(Default)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: String,
    usage: String,
    category: Option<Category>,
    flags: Vec<Flag>,
    args: Vec<Arg>,
    commands: Vec<Command>,
    action: Option<Action>,
    validator: Option<CommandValidator>,
    groups: Vec<String>,
    optional: bool,
    hidden: bool,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Free-form text printed after the generated usage.
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_subcommand(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&ActionContext<'_>, Option<ActionData>) -> Result<Option<ActionData>, BoxError>
            + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Check<'_>, &CommandNode) -> Result<(), BoxError> + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Validation groups this command belongs to. Descending into it drops
    /// inherited flags and arguments that share none of these groups.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// An optional command does not have to be named for its parent to be a
    /// complete invocation.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub(crate) fn prepend_flag(&mut self, flag: Flag) {
        self.flags.insert(0, flag);
    }

    pub(crate) fn prepend_subcommand(&mut self, command: Command) {
        self.commands.insert(0, command);
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("flags", &self.flags)
            .field("args", &self.args)
            .field("commands", &self.commands)
            .field("groups", &self.groups)
            .field("optional", &self.optional)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

/// A command after init, living in the [`Tree`] arena.
pub struct CommandNode {
    id: CommandId,
    name: String,
    aliases: Vec<String>,
    description: String,
    usage: String,
    category: Option<Category>,
    groups: Vec<String>,
    optional: bool,
    hidden: bool,
    parent: Option<CommandId>,
    level: usize,
    children: Vec<CommandId>,
    lookup: HashMap<String, CommandId>,
    flags: Vec<FlagId>,
    args: Vec<ArgId>,
    action: Option<Action>,
    validator: Option<CommandValidator>,
    set_by_user: bool,
}

impl CommandNode {
    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn parent(&self) -> Option<CommandId> {
        self.parent
    }

    /// Depth below the root, which is level 0.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn children(&self) -> &[CommandId] {
        &self.children
    }

    /// Child command by name or alias.
    pub fn child(&self, name: &str) -> Option<CommandId> {
        self.lookup.get(name).copied()
    }

    pub fn flags(&self) -> &[FlagId] {
        &self.flags
    }

    pub fn args(&self) -> &[ArgId] {
        &self.args
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    /// Whether the command is part of the resolved chain of the last run.
    pub fn is_set_by_user(&self) -> bool {
        self.set_by_user
    }

    pub(crate) fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub(crate) fn validator(&self) -> Option<&CommandValidator> {
        self.validator.as_ref()
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("level", &self.level)
            .field("children", &self.children)
            .field("flags", &self.flags)
            .field("args", &self.args)
            .field("groups", &self.groups)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// Arena holding every command, flag and argument of an application.
#[derive(Debug, Default)]
pub struct Tree {
    commands: Vec<CommandNode>,
    flags: Vec<Flag>,
    args: Vec<Arg>,
}

impl Tree {
    /// Flattens a declared command hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError`] for empty names, sibling commands sharing a
    /// name or alias, and cumulative arguments that are not the last argument
    /// of their command.
    pub fn build(root: Command) -> Result<Self, DeclarationError> {
        let mut tree = Self::default();
        tree.insert(root, None)?;
        Ok(tree)
    }

    fn insert(
        &mut self,
        command: Command,
        parent: Option<CommandId>,
    ) -> Result<CommandId, DeclarationError> {
        let parent_path = parent.map(|p| self.full_command(p)).unwrap_or_default();
        if command.name.trim().is_empty() {
            return Err(DeclarationError::EmptyCommandName {
                parent: parent_path,
            });
        }
        let path = if parent_path.is_empty() {
            command.name.clone()
        } else {
            format!("{parent_path} {}", command.name)
        };

        let Command {
            name,
            aliases,
            description,
            usage,
            category,
            flags,
            args,
            commands,
            action,
            validator,
            groups,
            optional,
            hidden,
        } = command;

        let level = parent.map_or(0, |p| self.commands[p.0].level + 1);
        let id = CommandId(self.commands.len());

        let arg_count = args.len();
        let mut arg_ids = Vec::with_capacity(arg_count);
        for (position, arg) in args.into_iter().enumerate() {
            if arg.name().trim().is_empty() {
                return Err(DeclarationError::EmptyElementName {
                    element: ElementType::Argument,
                    command: path,
                });
            }
            if arg.is_cumulative() && position + 1 != arg_count {
                return Err(DeclarationError::CumulativeArgNotLast {
                    command: path,
                    arg: arg.name().to_string(),
                });
            }
            arg_ids.push(ArgId(self.args.len()));
            self.args.push(arg);
        }

        let mut flag_ids = Vec::with_capacity(flags.len());
        for mut flag in flags {
            if flag.name().trim().is_empty() {
                return Err(DeclarationError::EmptyElementName {
                    element: ElementType::Flag,
                    command: path,
                });
            }
            flag.level = level;
            flag_ids.push(FlagId(self.flags.len()));
            self.flags.push(flag);
        }

        self.commands.push(CommandNode {
            id,
            name,
            aliases,
            description,
            usage,
            category,
            groups,
            optional,
            hidden,
            parent,
            level,
            children: Vec::new(),
            lookup: HashMap::new(),
            flags: flag_ids,
            args: arg_ids,
            action,
            validator,
            set_by_user: false,
        });

        for child in commands {
            let child_id = self.insert(child, Some(id))?;
            let child_node = &self.commands[child_id.0];
            let keys: Vec<String> = std::iter::once(child_node.name.clone())
                .chain(child_node.aliases.iter().cloned())
                .collect();
            let node = &mut self.commands[id.0];
            for key in keys {
                if node.lookup.insert(key.clone(), child_id).is_some() {
                    return Err(DeclarationError::DuplicateSubcommand {
                        command: path,
                        name: key,
                    });
                }
            }
            node.children.push(child_id);
        }

        Ok(id)
    }

    pub fn root(&self) -> CommandId {
        CommandId(0)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn command(&self, id: CommandId) -> &CommandNode {
        &self.commands[id.0]
    }

    pub fn get(&self, id: CommandId) -> Option<&CommandNode> {
        self.commands.get(id.0)
    }

    pub(crate) fn command_mut(&mut self, id: CommandId) -> &mut CommandNode {
        &mut self.commands[id.0]
    }

    pub fn flag(&self, id: FlagId) -> &Flag {
        &self.flags[id.0]
    }

    pub(crate) fn flag_mut(&mut self, id: FlagId) -> &mut Flag {
        &mut self.flags[id.0]
    }

    pub fn arg(&self, id: ArgId) -> &Arg {
        &self.args[id.0]
    }

    pub(crate) fn arg_mut(&mut self, id: ArgId) -> &mut Arg {
        &mut self.args[id.0]
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandNode> {
        self.commands.iter()
    }

    /// A command is a leaf when every child is optional.
    pub fn is_leaf(&self, id: CommandId) -> bool {
        self.command(id)
            .children
            .iter()
            .all(|child| self.command(*child).optional)
    }

    /// Ids from `id` up to the root, inclusive.
    pub fn chain(&self, id: CommandId) -> Vec<CommandId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.command(current).parent;
        }
        chain
    }

    /// Space-separated names from the root down to `id`.
    pub fn full_command(&self, id: CommandId) -> String {
        let mut names: Vec<&str> = self
            .chain(id)
            .into_iter()
            .map(|c| self.command(c).name.as_str())
            .collect();
        names.reverse();
        names.join(" ")
    }

    /// Resolves a path of names or aliases starting below the root.
    pub fn find(&self, path: &[&str]) -> Option<CommandId> {
        let mut current = self.root();
        for name in path {
            current = self.get(current)?.child(name)?;
        }
        Some(current)
    }

    /// Forgets everything bound by the previous run.
    pub(crate) fn clear_bindings(&mut self) {
        for flag in &mut self.flags {
            flag.clear();
        }
        for arg in &mut self.args {
            arg.clear();
        }
        for command in &mut self.commands {
            command.set_by_user = false;
        }
    }

    pub(crate) fn mark_chain(&mut self, id: CommandId) {
        for command in self.chain(id) {
            self.commands[command.0].set_by_user = true;
        }
    }
}
