mod error;
mod load;
mod report;

use std::cell::Cell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use cmdtree_core::{
    ActionContext, ActionData, AppSchema, Application, Arg, BoxError, Command, CommandId, Flag,
    Tree, ValueKind, ValueType,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::load::load_schema;
use crate::report::{OutputFormat, ParseReport};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn main() -> ExitCode {
    let code = Rc::new(Cell::new(0));
    let exit = code.clone();
    let mut app = cli().with_terminator(move |c| exit.set(c));
    // Errors are already rendered to stderr; the code is all that is left.
    let _ = app.run(std::env::args());
    ExitCode::from(u8::try_from(code.get()).unwrap_or(1))
}

fn cli() -> Application {
    Application::new("cmdtree")
        .with_description("Check, exercise and document command trees described in YAML or JSON")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_help_command(true)
        .with_flag(
            Flag::choice("log-level", LOG_LEVELS)
                .with_short('l')
                .with_default("warn")
                .with_placeholder("level")
                .with_usage("Log verbosity; RUST_LOG takes precedence"),
        )
        .with_flags_parsed_hook(|app| {
            let level = app
                .flag_value("log-level")
                .map(|value| value.to_string())
                .unwrap_or_else(|_| "warn".to_string());
            init_tracing(&level);
        })
        .with_subcommand(
            Command::new("check")
                .with_description("Validate a schema and every command path it declares")
                .with_arg(schema_arg())
                .with_action(run_check),
        )
        .with_subcommand(
            Command::new("parse")
                .with_description("Parse tokens against a schema and print what they bound")
                .with_usage("Put the tokens after `--` so they are not read as cmdtree flags:\n  cmdtree parse app.yaml -- get -o json pods")
                .with_flag(
                    Flag::choice("format", ["json", "yaml"])
                        .with_short('f')
                        .with_default("json")
                        .with_usage("Report format"),
                )
                .with_flag(Flag::bool("no-validate").with_usage("Stop after parsing"))
                .with_arg(schema_arg())
                .with_arg(
                    Arg::new("tokens", ValueType::many(ValueKind::Text))
                        .with_usage("Command line for the described application"),
                )
                .with_action(run_parse),
        )
        .with_subcommand(
            Command::new("usage")
                .with_alias("describe")
                .with_description("Render usage for a command path of a schema")
                .with_arg(schema_arg())
                .with_arg(
                    Arg::new("path", ValueType::many(ValueKind::Text))
                        .with_usage("Command names leading to the command to describe"),
                )
                .with_action(run_usage),
        )
}

fn schema_arg() -> Arg {
    Arg::new("schema", ValueType::one(ValueKind::File))
        .with_required(true)
        .with_usage("Schema file (.yaml, .yml or .json)")
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn load(app: &Application) -> Result<AppSchema, BoxError> {
    let path: PathBuf = app
        .arg_value("schema")?
        .as_path()
        .cloned()
        .unwrap_or_default();
    Ok(load_schema(&path)?)
}

fn target_error(app: &Application, source: cmdtree_core::Error) -> CliError {
    CliError::Target {
        app: app.name().to_string(),
        source,
    }
}

/// Command names from below the root down to `id`.
fn command_path(tree: &Tree, id: CommandId) -> Vec<String> {
    let mut path: Vec<String> = tree
        .chain(id)
        .into_iter()
        .map(|id| tree.command(id).name().to_string())
        .collect();
    path.pop();
    path.reverse();
    path
}

fn run_check(ctx: &ActionContext<'_>, _: Option<ActionData>) -> Result<Option<ActionData>, BoxError> {
    let mut target = load(ctx.app())?.into_application();
    target.init().map_err(|e| target_error(&target, e))?;

    let paths: Vec<Vec<String>> = target
        .tree()
        .commands()
        .map(|command| command_path(target.tree(), command.id()))
        .collect();
    let mut problems = 0;
    for path in &paths {
        debug!(path = ?path, "checking command path");
        if let Err(err) = target.parse(path.clone()) {
            problems += 1;
            let mut full = vec![target.name().to_string()];
            full.extend(path.iter().cloned());
            eprintln!("{}: {err}", full.join(" "));
        }
    }
    if problems > 0 {
        return Err(CliError::CheckFailed(problems).into());
    }

    info!(app = target.name(), commands = paths.len(), "schema is valid");
    println!(
        "Schema for '{}' is valid: {} command(s).",
        target.name(),
        paths.len()
    );
    Ok(None)
}

fn run_parse(ctx: &ActionContext<'_>, _: Option<ActionData>) -> Result<Option<ActionData>, BoxError> {
    let app = ctx.app();
    let format: OutputFormat = app.flag_value("format")?.to_string().parse()?;
    let tokens = app.arg_value("tokens")?.strings();

    let mut target = load(app)?.into_application();
    target.parse(tokens).map_err(|e| target_error(&target, e))?;
    if !app.is_set("no-validate")? {
        target.validate().map_err(|e| target_error(&target, e))?;
    }

    let report = ParseReport::from_app(&target);
    println!("{}", format.render(&report)?.trim_end());
    Ok(None)
}

fn run_usage(ctx: &ActionContext<'_>, _: Option<ActionData>) -> Result<Option<ActionData>, BoxError> {
    let app = ctx.app();
    let path = app.arg_value("path")?.strings();

    let mut target = load(app)?.into_application();
    target.parse(path).map_err(|e| target_error(&target, e))?;
    print!("{}", target.usage());
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_path_excludes_root() {
        let mut app = cli();
        app.init().unwrap();
        let tree = app.tree();
        let usage = tree.find(&["usage"]).unwrap();
        assert_eq!(command_path(tree, usage), vec!["usage"]);
        assert!(command_path(tree, tree.root()).is_empty());
    }

    #[test]
    fn test_parse_tokens_follow_double_dash() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("app.yaml");
        std::fs::write(&schema, "name: kubectl\n").unwrap();
        let schema = schema.to_str().unwrap().to_string();

        let mut app = cli();
        app.parse(vec![
            "parse".to_string(),
            schema.clone(),
            "--format".to_string(),
            "yaml".to_string(),
            "--".to_string(),
            "get".to_string(),
            "-o".to_string(),
            "json".to_string(),
        ])
        .unwrap();
        app.validate().unwrap();
        assert_eq!(app.full_command(), "cmdtree parse");
        assert_eq!(app.flag_value("format").unwrap().as_str(), Some("yaml"));
        assert_eq!(
            app.arg_value("schema").unwrap().as_path().unwrap().to_str(),
            Some(schema.as_str())
        );
        assert_eq!(
            app.arg_value("tokens").unwrap().strings(),
            vec!["get", "-o", "json"]
        );
    }
}
