//! Error and usage rendering.
//!
//! The core never prints prose of its own. It hands errors to an
//! [`ErrorRenderer`] and a [`Usage`] view of the current command to a
//! [`UsageRenderer`]; [`PlainRenderer`] implements both with plain text.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::tree::{Arg, Category, CommandNode, Flag, FlagArg, Tree};
use crate::validate::{GroupedElements, ValidationGroup};

/// Turns an error into a user-facing message.
pub trait ErrorRenderer {
    fn render_error(&self, error: &Error) -> String;
}

/// Produces help text for the command in [`Usage`].
pub trait UsageRenderer {
    fn render_usage(&self, usage: &Usage<'_>) -> String;
}

/// Both rendering contracts; blanket-implemented.
pub trait Renderer: ErrorRenderer + UsageRenderer {}

impl<T: ErrorRenderer + UsageRenderer + ?Sized> Renderer for T {}

/// Everything a usage renderer may show for one command.
#[derive(Debug)]
pub struct Usage<'a> {
    pub tree: &'a Tree,
    pub command: &'a CommandNode,
    /// `app sub sub` up to the command.
    pub full_command: String,
    pub version: Option<&'a str>,
    /// Visible in-scope flags, by level then name.
    pub flags: Vec<&'a Flag>,
    /// In-scope arguments in position order.
    pub args: Vec<&'a Arg>,
    /// Visible sub-commands in declaration order.
    pub subcommands: Vec<&'a CommandNode>,
    pub grouped: GroupedElements,
}

/// Plain-text renderer used unless the application installs another one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl ErrorRenderer for PlainRenderer {
    fn render_error(&self, error: &Error) -> String {
        format!("error: {error}\n")
    }
}

impl UsageRenderer for PlainRenderer {
    fn render_usage(&self, usage: &Usage<'_>) -> String {
        let command = usage.command;
        let mut out = String::new();

        if command.description().trim().is_empty() {
            out.push_str(&usage.full_command);
            out.push('\n');
        } else {
            out.push_str(&format!(
                "{} - {}\n",
                usage.full_command,
                command.description().trim()
            ));
        }
        out.push_str(&format!("\nUsage: {}\n", synopsis(usage)));

        if !usage.subcommands.is_empty() {
            for (heading, commands) in by_category(&usage.subcommands) {
                out.push_str(&format!("\n{heading}:\n"));
                let rows: Vec<(String, String)> = commands
                    .iter()
                    .map(|c| (command_left(c), c.description().trim().to_string()))
                    .collect();
                push_rows(&mut out, rows);
            }
        }

        if !usage.args.is_empty() {
            out.push_str("\nArguments:\n");
            let rows = usage
                .args
                .iter()
                .map(|a| (arg_left(*a), element_help(*a)))
                .collect();
            push_rows(&mut out, rows);
        }

        if !usage.flags.is_empty() {
            out.push_str("\nFlags:\n");
            let rows = usage
                .flags
                .iter()
                .map(|f| (flag_left(f), element_help(*f)))
                .collect();
            push_rows(&mut out, rows);
        }

        if !command.usage().trim().is_empty() {
            out.push('\n');
            out.push_str(command.usage().trim_end());
            out.push('\n');
        }
        out
    }
}

fn push_rows(out: &mut String, rows: Vec<(String, String)>) {
    let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            out.push_str(&format!("  {left:width$}  {help}\n"));
        }
    }
}

/// Groups sub-commands under their category headings, uncategorised first.
fn by_category<'a>(commands: &[&'a CommandNode]) -> Vec<(String, Vec<&'a CommandNode>)> {
    let mut plain = Vec::new();
    let mut categorised: BTreeMap<(i32, String), Vec<&'a CommandNode>> = BTreeMap::new();
    for command in commands {
        match command.category() {
            Some(Category { name, order }) => categorised
                .entry((*order, name.clone()))
                .or_default()
                .push(*command),
            None => plain.push(*command),
        }
    }

    let mut sections = Vec::new();
    if !plain.is_empty() {
        sections.push(("Commands".to_string(), plain));
    }
    sections.extend(
        categorised
            .into_iter()
            .map(|((_, name), commands)| (name, commands)),
    );
    sections
}

fn command_left(command: &CommandNode) -> String {
    let mut names = vec![command.name().to_string()];
    names.extend(command.aliases().iter().cloned());
    names.join(", ")
}

fn flag_left(flag: &Flag) -> String {
    let mut left = match flag.short() {
        Some(c) => format!("-{c}, --{}", flag.name()),
        None => format!("    --{}", flag.name()),
    };
    if !flag.is_bool() {
        left.push_str(&format!("=<{}>", flag.placeholder()));
    }
    if flag.is_cumulative() {
        left.push_str("...");
    }
    left
}

fn arg_left(arg: &Arg) -> String {
    let mut left = format!("<{}>", arg.placeholder());
    if arg.is_cumulative() {
        left.push_str("...");
    }
    left
}

fn element_help(element: &dyn FlagArg) -> String {
    let mut parts = Vec::new();
    if !element.usage().trim().is_empty() {
        parts.push(element.usage().trim().to_string());
    }
    if !element.hints().is_empty() {
        parts.push(format!("[{}]", element.hints().join(", ")));
    }
    if let Some(default) = element.default_value() {
        parts.push(format!("[default: {default}]"));
    }
    if element.is_required() {
        parts.push("(required)".to_string());
    }
    parts.join(" ")
}

fn flag_synopsis(flag: &Flag) -> String {
    let mut out = match (flag.short(), flag.is_bool()) {
        (Some(c), true) => format!("-{c}"),
        (Some(c), false) => format!("-{c} <{}>", flag.placeholder()),
        (None, true) => format!("--{}", flag.name()),
        (None, false) => format!("--{}=<{}>", flag.name(), flag.placeholder()),
    };
    if flag.is_cumulative() {
        out.push_str("...");
    }
    out
}

fn arg_synopsis(arg: &Arg) -> String {
    let mut out = format!("<{}>", arg.placeholder());
    if arg.is_cumulative() {
        out.push_str("...");
    }
    out
}

/// Optional parts are bracketed when `bracket_optional` is set; inside a
/// group alternative every part is shown plain.
fn group_parts(tree: &Tree, group: &ValidationGroup, bracket_optional: bool) -> Vec<String> {
    let optional = |text: String| {
        if bracket_optional {
            format!("[{text}]")
        } else {
            text
        }
    };
    let mut parts = Vec::new();
    if let Some(command) = group.command {
        parts.push(tree.command(command).name().to_string());
    }
    for id in &group.required_flags {
        parts.push(flag_synopsis(tree.flag(*id)));
    }
    for id in &group.optional_flags {
        parts.push(optional(flag_synopsis(tree.flag(*id))));
    }
    for id in &group.required_args {
        parts.push(arg_synopsis(tree.arg(*id)));
    }
    for id in &group.optional_args {
        parts.push(optional(arg_synopsis(tree.arg(*id))));
    }
    parts
}

/// `app get [-v] ( -f <file> | <type> <name> ) <command>`
fn synopsis(usage: &Usage<'_>) -> String {
    let mut parts = vec![usage.full_command.clone()];
    parts.extend(group_parts(usage.tree, &usage.grouped.ungrouped, true));

    let alternatives: Vec<String> = usage
        .grouped
        .groups
        .values()
        .map(|g| group_parts(usage.tree, g, false).join(" "))
        .filter(|g| !g.is_empty())
        .collect();
    match alternatives.len() {
        0 => {}
        1 => parts.extend(alternatives),
        _ => parts.push(format!("( {} )", alternatives.join(" | "))),
    }

    if usage.grouped.ungrouped.generic_command {
        parts.push("<command>".to_string());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Command;
    use crate::{Application, Error, ErrorKind};

    fn delete_app() -> Application {
        Application::new("kubectl").with_subcommand(
            Command::new("delete")
                .with_description("Delete resources")
                .with_usage("Examples:\n  kubectl delete pod web")
                .with_flag(
                    Flag::choice("output", ["json", "table", "yaml"])
                        .with_short('o')
                        .with_placeholder("format")
                        .with_usage("Output format")
                        .with_default("table"),
                )
                .with_flag(
                    Flag::text("filename")
                        .with_short('f')
                        .with_groups(["file"])
                        .with_usage("File identifying resources"),
                )
                .with_arg(Arg::text("resource-type").with_groups(["name"]).with_usage("type"))
                .with_arg(Arg::text("resource-name").with_groups(["name"]).with_usage("name")),
        )
    }

    #[test]
    fn test_plain_usage_layout() {
        let mut app = delete_app();
        app.parse(["delete"]).unwrap();
        let text = app.usage();

        assert!(text.starts_with("kubectl delete - Delete resources\n"), "{text}");
        assert!(
            text.contains(
                "Usage: kubectl delete [-h] [-o <format>] ( -f <filename> | <resource-type> <resource-name> )"
            ),
            "{text}"
        );
        assert!(text.contains("Output format [json, table, yaml] [default: table]"));
        assert!(text.contains("  -h, --help"));
        assert!(text.contains("Arguments:\n  <resource-type>  type\n"));
        assert!(text.ends_with("Examples:\n  kubectl delete pod web\n"));
    }

    #[test]
    fn test_root_usage_lists_commands_by_category() {
        let mut app = Application::new("tool")
            .with_subcommand(Command::new("zeta").with_category(Category::new("Admin", 2)))
            .with_subcommand(Command::new("alpha").with_alias("a").with_description("First"))
            .with_subcommand(Command::new("beta").with_category(Category::new("Basic", 1)))
            .with_subcommand(Command::new("secret").with_hidden(true));
        app.parse(Vec::<String>::new()).unwrap();
        let text = app.usage();

        let commands = text.find("Commands:\n  alpha, a  First").unwrap();
        let basic = text.find("Basic:\n  beta").unwrap();
        let admin = text.find("Admin:\n  zeta").unwrap();
        assert!(commands < basic && basic < admin, "{text}");
        assert!(!text.contains("secret"));
        assert!(text.contains("Usage: tool [-h] <command>"));
    }

    #[test]
    fn test_error_render() {
        let err = Error::CommandRequired {
            command: "tool".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::CommandRequired);
        assert_eq!(
            PlainRenderer.render_error(&err),
            "error: a sub-command is required after 'tool'; try --help\n"
        );
    }
}
