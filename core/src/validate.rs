//! Validation-group resolution and required-field checks.
//!
//! Flags, arguments and commands may carry validation-group tags. Elements
//! tagged with exactly one group are mutually exclusive with elements of any
//! other single group; untagged elements belong to every group. After a parse,
//! [`resolve_validation_set`] works out which group the user populated and
//! returns the elements that must be checked for that choice.
//!
//! # Examples
//!
//! ```
//! use cmdtree_core::{Application, Arg, Command, ErrorKind, Flag};
//!
//! let mut app = Application::new("app").with_subcommand(
//!     Command::new("delete")
//!         .with_flag(Flag::text("filename").with_short('f').with_groups(["file"]))
//!         .with_arg(Arg::text("type").with_groups(["name"]))
//!         .with_arg(Arg::text("name").with_groups(["name"])),
//! );
//!
//! app.parse(["delete", "-f", "pods.yaml"]).unwrap();
//! app.validate().unwrap();
//!
//! app.parse(["delete", "-f", "pods.yaml", "pod", "web"]).unwrap();
//! let err = app.validate().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::FlagsArgsFromMultipleGroups);
//! ```

use std::cell::Cell;
use std::collections::BTreeMap;

use tracing::debug;

use crate::app::Application;
use crate::context::ParseContext;
use crate::error::{ElementType, Error};
use crate::tree::{ArgId, CommandId, FlagArg, FlagId, Tree};

/// Any element that can carry validation groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Arg(ArgId),
    Flag(FlagId),
    Command(CommandId),
}

impl ElementId {
    fn groups(self, tree: &Tree) -> &[String] {
        match self {
            Self::Arg(id) => tree.arg(id).groups(),
            Self::Flag(id) => tree.flag(id).groups(),
            Self::Command(id) => tree.command(id).groups(),
        }
    }

    fn is_set_by_user(self, tree: &Tree) -> bool {
        match self {
            Self::Arg(id) => tree.arg(id).is_set_by_user(),
            Self::Flag(id) => tree.flag(id).is_set_by_user(),
            Self::Command(id) => tree.command(id).is_set_by_user(),
        }
    }

    /// How the element is named in conflict messages.
    fn label(self, tree: &Tree) -> String {
        match self {
            Self::Arg(id) => format!("<{}>", tree.arg(id).placeholder()),
            Self::Flag(id) => format!("--{}", tree.flag(id).name()),
            Self::Command(id) => tree.command(id).name().to_string(),
        }
    }
}

/// Handed to validators; lets a flag or argument validator change whether its
/// element is required before the required check runs.
pub struct Check<'a> {
    app: &'a Application,
    required: Cell<Option<bool>>,
}

impl<'a> Check<'a> {
    fn new(app: &'a Application) -> Self {
        Self {
            app,
            required: Cell::new(None),
        }
    }

    /// The application, for looking up other flags and arguments.
    pub fn app(&self) -> &'a Application {
        self.app
    }

    /// Overrides the element's required bit. Ignored for commands.
    pub fn set_required(&self, required: bool) {
        self.required.set(Some(required));
    }
}

/// Everything validation looks at, in a stable order: arguments by position,
/// flags by level then name, then the command chain from the leaf up.
pub fn validation_elements(tree: &Tree, context: &ParseContext) -> Vec<ElementId> {
    let mut flags: Vec<FlagId> = context.flags().map(|(_, id)| id).collect();
    flags.sort_by(|a, b| {
        let (a, b) = (tree.flag(*a), tree.flag(*b));
        (a.level(), a.name()).cmp(&(b.level(), b.name()))
    });

    context
        .args()
        .iter()
        .map(|id| ElementId::Arg(*id))
        .chain(flags.into_iter().map(ElementId::Flag))
        .chain(
            tree.chain(context.current())
                .into_iter()
                .map(ElementId::Command),
        )
        .collect()
}

/// Picks the elements to validate for the group the user populated.
///
/// Only elements tagged with a single group decide which group is in use.
/// With no group in use, every element is returned so that required checks
/// can point at every legal option.
///
/// # Errors
///
/// [`Error::FlagsArgsFromMultipleGroups`] when user-set elements come from two
/// groups, [`Error::NoUniqueFlagArgCommandInGroup`] when several groups exist
/// but none of them has a single-group member.
pub fn resolve_validation_set(tree: &Tree, elements: &[ElementId]) -> Result<Vec<ElementId>, Error> {
    let mut groups: BTreeMap<&str, Vec<ElementId>> = BTreeMap::new();
    let mut unique: BTreeMap<&str, Vec<ElementId>> = BTreeMap::new();
    let mut ungrouped = Vec::new();

    for &element in elements {
        let tags = element.groups(tree);
        if tags.is_empty() {
            ungrouped.push(element);
        }
        for tag in tags {
            groups.entry(tag.as_str()).or_default().push(element);
        }
        if let [tag] = tags {
            unique.entry(tag.as_str()).or_default().push(element);
        }
    }

    let mut selected: Option<(&str, ElementId)> = None;
    for (&group, members) in &unique {
        for &element in members {
            if !element.is_set_by_user(tree) {
                continue;
            }
            match selected {
                Some((chosen, first)) if chosen != group => {
                    return Err(Error::FlagsArgsFromMultipleGroups {
                        first: first.label(tree),
                        second: element.label(tree),
                    });
                }
                Some(_) => {}
                None => selected = Some((group, element)),
            }
        }
    }

    if groups.len() > 1 && unique.is_empty() {
        return Err(Error::NoUniqueFlagArgCommandInGroup);
    }

    let Some((group, _)) = selected else {
        debug!("no validation group selected, checking every element");
        return Ok(elements.to_vec());
    };
    debug!(group, "validation group selected");
    let mut set = groups.remove(group).unwrap_or_default();
    set.extend(ungrouped);
    Ok(set)
}

/// Runs the full post-parse validation for the command the parse ended on.
pub(crate) fn validate(app: &mut Application) -> Result<(), Error> {
    let current = app.context.current();
    if !app.tree.is_leaf(current) {
        return Err(Error::CommandRequired {
            command: app.tree.full_command(current),
        });
    }
    app.tree.mark_chain(current);

    let elements = validation_elements(&app.tree, &app.context);
    let set = resolve_validation_set(&app.tree, &elements)?;

    for (element, required) in run_element_validators(app, &set)? {
        match element {
            ElementId::Flag(id) => app.tree.flag_mut(id).set_required(required),
            ElementId::Arg(id) => app.tree.arg_mut(id).set_required(required),
            ElementId::Command(_) => {}
        }
    }

    check_required(&app.tree, &set)?;
    run_command_validators(app, current)
}

fn run_element_validators(
    app: &Application,
    set: &[ElementId],
) -> Result<Vec<(ElementId, bool)>, Error> {
    let mut overrides = Vec::new();
    for &element in set {
        let check = Check::new(app);
        let outcome = match element {
            ElementId::Flag(id) => {
                let flag = app.tree.flag(id);
                flag.validator().map(|validator| {
                    validator(&check, flag).map_err(|err| {
                        Error::from_callback(err, |source| Error::ValidatorFailed {
                            element: ElementType::Flag,
                            name: flag.name().to_string(),
                            source,
                        })
                    })
                })
            }
            ElementId::Arg(id) => {
                let arg = app.tree.arg(id);
                arg.validator().map(|validator| {
                    validator(&check, arg).map_err(|err| {
                        Error::from_callback(err, |source| Error::ValidatorFailed {
                            element: ElementType::Argument,
                            name: arg.name().to_string(),
                            source,
                        })
                    })
                })
            }
            ElementId::Command(_) => None,
        };
        if let Some(result) = outcome {
            result?;
            if let Some(required) = check.required.get() {
                overrides.push((element, required));
            }
        }
    }
    Ok(overrides)
}

/// Arguments are checked before flags.
fn check_required(tree: &Tree, set: &[ElementId]) -> Result<(), Error> {
    for element in set {
        if let ElementId::Arg(id) = *element {
            let arg = tree.arg(id);
            if arg.is_required() && !arg.is_set_by_user() {
                return Err(Error::MissingRequiredArg {
                    name: arg.name().to_string(),
                    placeholder: arg.placeholder().to_string(),
                });
            }
        }
    }
    for element in set {
        if let ElementId::Flag(id) = *element {
            let flag = tree.flag(id);
            if flag.is_required() && !flag.is_set_by_user() {
                return Err(Error::MissingRequiredFlag {
                    name: flag.name().to_string(),
                    short: flag.short(),
                });
            }
        }
    }
    Ok(())
}

fn run_command_validators(app: &Application, current: CommandId) -> Result<(), Error> {
    for id in app.tree.chain(current) {
        let command = app.tree.command(id);
        let Some(validator) = command.validator() else {
            continue;
        };
        let check = Check::new(app);
        validator(&check, command).map_err(|err| {
            Error::from_callback(err, |source| Error::ValidatorFailed {
                element: ElementType::Command,
                name: command.name().to_string(),
                source,
            })
        })?;
    }
    Ok(())
}

/// One bucket of the grouped usage view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationGroup {
    /// Sub-command that belongs to this group, if any.
    pub command: Option<CommandId>,
    /// Set when untagged sub-commands are available.
    pub generic_command: bool,
    pub required_flags: Vec<FlagId>,
    pub optional_flags: Vec<FlagId>,
    pub required_args: Vec<ArgId>,
    pub optional_args: Vec<ArgId>,
}

impl ValidationGroup {
    pub fn is_empty(&self) -> bool {
        self.command.is_none()
            && !self.generic_command
            && self.required_flags.is_empty()
            && self.optional_flags.is_empty()
            && self.required_args.is_empty()
            && self.optional_args.is_empty()
    }

    fn push(&mut self, tree: &Tree, element: ElementId) {
        match element {
            ElementId::Flag(id) if tree.flag(id).is_required() => self.required_flags.push(id),
            ElementId::Flag(id) => self.optional_flags.push(id),
            ElementId::Arg(id) if tree.arg(id).is_required() => self.required_args.push(id),
            ElementId::Arg(id) => self.optional_args.push(id),
            ElementId::Command(id) => self.command = Some(id),
        }
    }
}

/// A command's flags, arguments and sub-commands bucketed by group, for usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedElements {
    pub ungrouped: ValidationGroup,
    /// Named buckets; a bucket identical to an earlier one is left out.
    pub groups: BTreeMap<String, ValidationGroup>,
}

/// Buckets `elements` by validation group.
///
/// Untagged sub-commands only raise the ungrouped bucket's
/// [`generic_command`](ValidationGroup::generic_command) marker.
pub fn group_elements(tree: &Tree, elements: &[ElementId]) -> GroupedElements {
    let mut grouped = GroupedElements::default();
    for &element in elements {
        let tags = element.groups(tree);
        if tags.is_empty() {
            match element {
                ElementId::Command(_) => grouped.ungrouped.generic_command = true,
                _ => grouped.ungrouped.push(tree, element),
            }
            continue;
        }
        for tag in tags {
            grouped
                .groups
                .entry(tag.clone())
                .or_default()
                .push(tree, element);
        }
    }

    let by_level = |id: &FlagId| (tree.flag(*id).level(), tree.flag(*id).name().to_string());
    for bucket in std::iter::once(&mut grouped.ungrouped).chain(grouped.groups.values_mut()) {
        bucket.required_flags.sort_by_key(by_level);
        bucket.optional_flags.sort_by_key(by_level);
    }

    let mut kept: Vec<ValidationGroup> = Vec::new();
    grouped.groups.retain(|_, bucket| {
        if kept.contains(bucket) {
            false
        } else {
            kept.push(bucket.clone());
            true
        }
    });
    grouped
}
