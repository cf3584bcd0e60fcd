//! Parse state machine.
//!
//! [`ParseContext`] walks the raw token queue once, left to right. Each token
//! is classified as a long flag, a cluster of short flags, a sub-command to
//! descend into, or a positional value for the next argument slot. Flags and
//! arguments come into scope level by level as commands are descended into;
//! inherited ones are dropped when they share no validation group with the
//! command being entered.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, trace};

use crate::error::{ElementType, Error};
use crate::tree::{ArgId, CommandId, FlagArg, FlagId, Tree};

/// Per-run parse state.
#[derive(Debug, Default)]
pub struct ParseContext {
    current: CommandId,
    mix_args_and_flags: bool,
    args_only: bool,
    no_commands: bool,
    tokens: VecDeque<String>,
    long_flags: BTreeMap<String, FlagId>,
    short_flags: HashMap<char, FlagId>,
    args: Vec<ArgId>,
    cursor: usize,
}

impl ParseContext {
    /// Parses `tokens` (argv without the program name) against `tree`.
    ///
    /// Everything bound by a previous run is cleared first, so the same tree
    /// can be parsed any number of times.
    pub fn parse<I, S>(
        &mut self,
        tree: &mut Tree,
        tokens: I,
        mix_args_and_flags: bool,
    ) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tree.clear_bindings();
        *self = Self {
            current: tree.root(),
            mix_args_and_flags,
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Self::default()
        };
        debug!(tokens = ?self.tokens, "parsing command line");

        let root = tree.root();
        self.merge_flags(tree, root)?;
        self.merge_args(tree, root);

        while let Some(token) = self.tokens.pop_front() {
            if self.args_only || token == "-" {
                trace!(%token, "positional");
                if token == "-" {
                    self.args_only = true;
                    self.no_commands = true;
                }
                self.process_arg(tree, token)?;
            } else if token == "--" {
                trace!("end of flags");
                self.args_only = true;
                self.no_commands = true;
            } else if let Some(body) = token.strip_prefix("--") {
                self.process_long_flag(tree, body)?;
            } else if let Some(body) = token.strip_prefix('-') {
                self.process_short_flags(tree, body)?;
            } else {
                self.process_arg(tree, token)?;
            }
        }

        self.apply_defaults(tree)
    }

    /// The command the parse ended on.
    pub fn current(&self) -> CommandId {
        self.current
    }

    /// Whether flags are still recognised after the first positional value.
    pub fn mixes_args_and_flags(&self) -> bool {
        self.mix_args_and_flags
    }

    /// In-scope flags by long name.
    pub fn flags(&self) -> impl Iterator<Item = (&str, FlagId)> {
        self.long_flags.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// In-scope arguments in position order.
    pub fn args(&self) -> &[ArgId] {
        &self.args
    }

    /// Looks up an in-scope flag by long name, or by short form for a
    /// single-character name.
    pub fn flag_id(&self, name: &str) -> Option<FlagId> {
        if let Some(id) = self.long_flags.get(name) {
            return Some(*id);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.short_flags.get(&c).copied(),
            _ => None,
        }
    }

    pub fn arg_id(&self, tree: &Tree, name: &str) -> Option<ArgId> {
        self.args
            .iter()
            .copied()
            .find(|id| tree.arg(*id).name() == name)
    }

    fn merge_flags(&mut self, tree: &Tree, command: CommandId) -> Result<(), Error> {
        for &id in tree.command(command).flags() {
            let flag = tree.flag(id);
            if self.long_flags.contains_key(flag.name()) {
                return Err(Error::DuplicateLongFlag {
                    name: flag.name().to_string(),
                });
            }
            if let Some(short) = flag.short() {
                if self.short_flags.contains_key(&short) {
                    return Err(Error::DuplicateShortFlag {
                        short,
                        name: flag.name().to_string(),
                    });
                }
                self.short_flags.insert(short, id);
            }
            self.long_flags.insert(flag.name().to_string(), id);
        }
        Ok(())
    }

    fn merge_args(&mut self, tree: &Tree, command: CommandId) {
        self.args.extend_from_slice(tree.command(command).args());
    }

    /// Drops inherited flags and arguments that share no group with `command`.
    ///
    /// Ungrouped elements and commands without groups keep everything.
    fn filter_inherited(&mut self, tree: &Tree, command: CommandId) {
        let groups = tree.command(command).groups();
        if groups.is_empty() {
            return;
        }
        let keep = |element_groups: &[String]| {
            element_groups.is_empty() || element_groups.iter().any(|g| groups.contains(g))
        };

        self.args.retain(|id| keep(tree.arg(*id).groups()));
        let dropped: Vec<FlagId> = self
            .long_flags
            .values()
            .copied()
            .filter(|id| !keep(tree.flag(*id).groups()))
            .collect();
        for id in dropped {
            let flag = tree.flag(id);
            trace!(flag = flag.name(), "dropping inherited flag");
            self.long_flags.remove(flag.name());
            if let Some(short) = flag.short() {
                self.short_flags.remove(&short);
            }
        }
    }

    fn descend(&mut self, tree: &Tree, command: CommandId) -> Result<(), Error> {
        debug!(command = %tree.full_command(command), "descending into command");
        self.current = command;
        self.filter_inherited(tree, command);
        self.merge_args(tree, command);
        self.merge_flags(tree, command)
    }

    /// Next argument slot, or `None` when every slot is taken.
    ///
    /// The cursor stays on a trailing cumulative argument while tokens remain
    /// so that it absorbs all of them.
    fn next_arg(&mut self, tree: &Tree) -> Option<ArgId> {
        let id = *self.args.get(self.cursor)?;
        let last = self.cursor + 1 == self.args.len();
        if !last || self.tokens.is_empty() || !tree.arg(id).is_cumulative() {
            self.cursor += 1;
        }
        Some(id)
    }

    fn process_arg(&mut self, tree: &mut Tree, token: String) -> Result<(), Error> {
        if !self.no_commands {
            if let Some(child) = tree.command(self.current).child(&token) {
                return self.descend(tree, child);
            }
        }

        if self.args.is_empty() {
            return Err(Error::UnexpectedToken { token });
        }
        self.no_commands = true;
        if !self.mix_args_and_flags {
            self.args_only = true;
        }
        let Some(id) = self.next_arg(tree) else {
            return Err(Error::UnknownArgument { token });
        };
        trace!(arg = tree.arg(id).name(), %token, "binding argument");
        tree.arg_mut(id).set_value(&token)
    }

    fn process_long_flag(&mut self, tree: &mut Tree, body: &str) -> Result<(), Error> {
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        let Some(&id) = self.long_flags.get(name) else {
            return Err(Error::UnknownElement {
                element: ElementType::Flag,
                name: format!("--{name}"),
            });
        };

        let value = if tree.flag(id).is_bool() {
            "true".to_string()
        } else if let Some(value) = inline {
            value.to_string()
        } else {
            self.pop_value(tree, id)?
        };
        trace!(flag = name, %value, "binding long flag");
        tree.flag_mut(id).set_value(&value)
    }

    /// Handles `-abc`, `-fvalue`, `-f=value` and `-f value`.
    ///
    /// Boolean flags in a cluster are switched on one by one. The first flag
    /// that takes a value consumes the rest of the cluster, or the next token
    /// when the cluster ends with it.
    fn process_short_flags(&mut self, tree: &mut Tree, body: &str) -> Result<(), Error> {
        for (index, c) in body.char_indices() {
            let Some(&id) = self.short_flags.get(&c) else {
                return Err(Error::UnknownElement {
                    element: ElementType::Flag,
                    name: format!("-{c}"),
                });
            };
            if tree.flag(id).is_bool() {
                trace!(flag = tree.flag(id).name(), "switching on short flag");
                tree.flag_mut(id).set_value("true")?;
                continue;
            }

            let rest = &body[index + c.len_utf8()..];
            let value = if rest.is_empty() {
                self.pop_value(tree, id)?
            } else {
                rest.strip_prefix('=').unwrap_or(rest).to_string()
            };
            trace!(flag = tree.flag(id).name(), %value, "binding short flag");
            return tree.flag_mut(id).set_value(&value);
        }
        Ok(())
    }

    fn pop_value(&mut self, tree: &Tree, id: FlagId) -> Result<String, Error> {
        self.tokens.pop_front().ok_or_else(|| {
            let flag = tree.flag(id);
            Error::MissingFlagValue {
                name: flag.name().to_string(),
                short: flag.short(),
            }
        })
    }

    fn apply_defaults(&mut self, tree: &mut Tree) -> Result<(), Error> {
        let flags: Vec<FlagId> = self.long_flags.values().copied().collect();
        for id in flags {
            let flag = tree.flag_mut(id);
            if !flag.is_set_by_user() && flag.default_value().is_some() {
                trace!(flag = flag.name(), "applying default");
                flag.apply_default()?;
            }
        }
        while let Some(id) = self.next_arg(tree) {
            let arg = tree.arg_mut(id);
            if !arg.is_set_by_user() && arg.default_value().is_some() {
                trace!(arg = arg.name(), "applying default");
                arg.apply_default()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Arg, Command, Flag};
    use crate::value::{ValueKind, ValueType};
    use crate::ErrorKind;

    fn parse(tree: &mut Tree, tokens: &[&str]) -> Result<ParseContext, Error> {
        let mut ctx = ParseContext::default();
        ctx.parse(tree, tokens.iter().copied(), true)?;
        Ok(ctx)
    }

    fn flag_value(tree: &Tree, ctx: &ParseContext, name: &str) -> String {
        let id = ctx.flag_id(name).unwrap();
        tree.flag(id).value().to_string()
    }

    fn cluster_tree() -> Tree {
        Tree::build(
            Command::new("app")
                .with_flag(Flag::bool("verbose").with_short('v'))
                .with_flag(Flag::bool("all").with_short('a'))
                .with_flag(Flag::text("file").with_short('f'))
                .with_arg(Arg::text("target")),
        )
        .unwrap()
    }

    #[test]
    fn test_short_cluster_with_separate_value() {
        let mut tree = cluster_tree();
        let ctx = parse(&mut tree, &["-vaf", "value"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "verbose"), "true");
        assert_eq!(flag_value(&tree, &ctx, "all"), "true");
        assert_eq!(flag_value(&tree, &ctx, "file"), "value");
    }

    #[test]
    fn test_short_cluster_with_attached_value() {
        let mut tree = cluster_tree();
        let ctx = parse(&mut tree, &["-vfvalue"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "file"), "value");
        assert_eq!(flag_value(&tree, &ctx, "all"), "false");

        let ctx = parse(&mut tree, &["-f=value"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "f"), "value");

        // Runes after a value flag are its value, not further flags.
        let ctx = parse(&mut tree, &["-fva"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "file"), "va");
        assert_eq!(flag_value(&tree, &ctx, "verbose"), "false");
    }

    #[test]
    fn test_long_flag_forms() {
        let mut tree = cluster_tree();
        let ctx = parse(&mut tree, &["--file=a=b", "--verbose=false"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "file"), "a=b");
        assert_eq!(flag_value(&tree, &ctx, "verbose"), "true");

        let ctx = parse(&mut tree, &["--file", "x"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "file"), "x");
    }

    #[test]
    fn test_missing_flag_value() {
        let mut tree = cluster_tree();
        let err = parse(&mut tree, &["--file"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedFlagValue);
        let err = parse(&mut tree, &["-vf"]).unwrap_err();
        assert!(matches!(err, Error::MissingFlagValue { short: Some('f'), .. }));
    }

    #[test]
    fn test_unknown_flags() {
        let mut tree = cluster_tree();
        let err = parse(&mut tree, &["--nope"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownElement);
        let err = parse(&mut tree, &["-vx"]).unwrap_err();
        assert_eq!(err.to_string(), "unknown flag -x");
    }

    #[test]
    fn test_double_dash_makes_rest_positional() {
        let mut tree = cluster_tree();
        let ctx = parse(&mut tree, &["--", "-v"]).unwrap();
        let target = ctx.arg_id(&tree, "target").unwrap();
        assert_eq!(tree.arg(target).value().as_str(), Some("-v"));
        assert_eq!(flag_value(&tree, &ctx, "verbose"), "false");
    }

    #[test]
    fn test_single_dash_is_positional() {
        let mut tree = cluster_tree();
        let ctx = parse(&mut tree, &["-"]).unwrap();
        let target = ctx.arg_id(&tree, "target").unwrap();
        assert_eq!(tree.arg(target).value().as_str(), Some("-"));
    }

    #[test]
    fn test_extra_and_unexpected_tokens() {
        let mut tree = cluster_tree();
        let err = parse(&mut tree, &["one", "two"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);

        let mut tree = Tree::build(Command::new("app").with_subcommand(Command::new("get"))).unwrap();
        let err = parse(&mut tree, &["put"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_sticky_cumulative_arg() {
        let mut tree = Tree::build(
            Command::new("app")
                .with_arg(Arg::text("first"))
                .with_arg(Arg::new("rest", ValueType::many(ValueKind::Text))),
        )
        .unwrap();
        let ctx = parse(&mut tree, &["a", "x.txt,y.txt", "z.txt"]).unwrap();
        let rest = ctx.arg_id(&tree, "rest").unwrap();
        assert_eq!(tree.arg(rest).value().strings(), vec!["x.txt", "y.txt", "z.txt"]);
    }

    #[test]
    fn test_commands_stop_after_first_positional() {
        let mut tree = Tree::build(
            Command::new("app")
                .with_arg(Arg::new("words", ValueType::many(ValueKind::Text)))
                .with_subcommand(Command::new("get").with_optional(true)),
        )
        .unwrap();
        let ctx = parse(&mut tree, &["hello", "get"]).unwrap();
        assert_eq!(ctx.current(), tree.root());

        let ctx = parse(&mut tree, &["get"]).unwrap();
        assert_eq!(tree.full_command(ctx.current()), "app get");
    }

    #[test]
    fn test_flags_after_args_when_mixing_disabled() {
        let mut tree = cluster_tree();
        let mut ctx = ParseContext::default();
        let err = ctx
            .parse(&mut tree, ["value", "-v"], false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);

        ctx.parse(&mut tree, ["value", "-v"], true).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "verbose"), "true");
    }

    #[test]
    fn test_duplicate_flags_across_levels() {
        let mut tree = Tree::build(
            Command::new("app")
                .with_flag(Flag::text("output").with_short('o'))
                .with_subcommand(Command::new("get").with_flag(Flag::text("out").with_short('o'))),
        )
        .unwrap();
        let err = parse(&mut tree, &["get"]).unwrap_err();
        assert!(matches!(err, Error::DuplicateShortFlag { short: 'o', .. }));
    }

    #[test]
    fn test_descent_filters_inherited_by_group() {
        let mut tree = Tree::build(
            Command::new("app")
                .with_flag(Flag::bool("verbose"))
                .with_flag(Flag::text("file").with_short('f').with_groups(["file"]))
                .with_arg(Arg::text("kind").with_groups(["name"]))
                .with_arg(Arg::text("name").with_groups(["name", "sub"]))
                .with_subcommand(Command::new("sub").with_groups(["sub"]).with_optional(true)),
        )
        .unwrap();
        let ctx = parse(&mut tree, &["sub", "my_name"]).unwrap();
        assert!(ctx.flag_id("verbose").is_some());
        assert!(ctx.flag_id("file").is_none());
        assert!(ctx.flag_id("f").is_none());
        assert_eq!(ctx.args().len(), 1);
        let name = ctx.arg_id(&tree, "name").unwrap();
        assert_eq!(tree.arg(name).value().as_str(), Some("my_name"));
    }

    #[test]
    fn test_reparse_forgets_previous_run() {
        let mut tree = cluster_tree();
        let ctx = parse(&mut tree, &["-f", "a", "-v"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "file"), "a");
        let ctx = parse(&mut tree, &["-f", "b"]).unwrap();
        assert_eq!(flag_value(&tree, &ctx, "file"), "b");
        assert_eq!(flag_value(&tree, &ctx, "verbose"), "false");
    }

    #[test]
    fn test_defaults_are_applied_but_not_user_set() {
        let mut tree = Tree::build(
            Command::new("app")
                .with_flag(Flag::choice("output", ["json", "table"]).with_default("table"))
                .with_arg(Arg::text("target").with_default("all")),
        )
        .unwrap();
        let ctx = parse(&mut tree, &[]).unwrap();
        let output = tree.flag(ctx.flag_id("output").unwrap());
        assert_eq!(output.value().as_str(), Some("table"));
        assert!(!output.is_set_by_user());
        let target = tree.arg(ctx.arg_id(&tree, "target").unwrap());
        assert_eq!(target.value().as_str(), Some("all"));
        assert!(!target.is_set_by_user());
    }

    #[test]
    fn test_bad_default_surfaces_at_parse() {
        let mut tree = Tree::build(
            Command::new("app").with_flag(Flag::choice("output", ["json"]).with_default("xml")),
        )
        .unwrap();
        let err = parse(&mut tree, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownChoiceValue);
    }
}
