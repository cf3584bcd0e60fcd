//! The application: a root command plus everything needed to run it.
//!
//! [`Application::run`] drives the whole pipeline for one argv: parse, the
//! flags-parsed hook, help and version handling, validation, then the action
//! chain. Every outcome ends in a call to the terminator, 0 for help, version
//! and success, 1 for any error. The terminator defaults to
//! [`std::process::exit`]; tests swap it out.
//!
//! # Examples
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use cmdtree_core::{Application, Arg, Command, Flag, Outcome};
//!
//! let code = Rc::new(Cell::new(-1));
//! let seen = code.clone();
//! let mut app = Application::new("greet")
//!     .with_version("1.0.0")
//!     .with_flag(Flag::bool("loud").with_short('l'))
//!     .with_arg(Arg::text("name").with_default("world"))
//!     .with_action(|ctx, _| {
//!         let app = ctx.app();
//!         let name = app.arg_value("name")?;
//!         assert_eq!(name.as_str(), Some("ada"));
//!         assert!(app.is_set("loud")?);
//!         Ok(None)
//!     })
//!     .with_terminator(move |c| seen.set(c))
//!     .with_output(std::io::sink());
//!
//! let outcome = app.run(["greet", "-l", "ada"]).unwrap();
//! assert!(matches!(outcome, Outcome::Completed(None)));
//! assert_eq!(code.get(), 0);
//!
//! assert!(matches!(app.run(["greet", "--version"]), Ok(Outcome::Version)));
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::context::ParseContext;
use crate::error::{BoxError, ElementType, Error};
use crate::execute::{self, ActionContext, ActionData};
use crate::render::{PlainRenderer, Renderer, Usage};
use crate::tree::{Arg, Command, CommandId, CommandNode, Flag, FlagArg, FlagId, Tree};
use crate::validate::{self, Check, ElementId};
use crate::value::{Value, ValueKind, ValueType};

/// Receives the exit status at the end of [`Application::run`].
pub type Terminator = Box<dyn FnMut(i32)>;

/// Called once parsing succeeds, before help, version and validation.
pub type FlagsParsedHook = Box<dyn Fn(&Application)>;

const HELP_FLAG: &str = "help";
const VERSION_FLAG: &str = "version";
const HELP_COMMAND: &str = "help";
const HELP_COMMAND_ARG: &str = "command";

/// How a successful [`Application::run`] ended.
#[derive(Debug)]
pub enum Outcome {
    /// Usage was printed for `--help` or the help command.
    Help,
    /// The version was printed for `--version`.
    Version,
    /// The action chain ran; holds what the root-most action returned.
    Completed(Option<ActionData>),
}

/// A runnable command-line application.
pub struct Application {
    root: Command,
    pub(crate) tree: Tree,
    pub(crate) context: ParseContext,
    version: Option<String>,
    author: Option<String>,
    mix_args_and_flags: bool,
    show_help_command: bool,
    terminator: Terminator,
    renderer: Box<dyn Renderer>,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    on_flags_parsed: Option<FlagsParsedHook>,
    help_flag: Option<FlagId>,
    version_flag: Option<FlagId>,
    help_command: Option<CommandId>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: Command::new(name),
            tree: Tree::default(),
            context: ParseContext::default(),
            version: None,
            author: None,
            mix_args_and_flags: true,
            show_help_command: false,
            terminator: Box::new(|code| std::process::exit(code)),
            renderer: Box::new(PlainRenderer),
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            on_flags_parsed: None,
            help_flag: None,
            version_flag: None,
            help_command: None,
        }
    }

    /// Names the application after the running executable.
    pub fn from_env() -> Self {
        let name = std::env::args()
            .next()
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
        Self::new(name)
    }

    fn map_root(mut self, f: impl FnOnce(Command) -> Command) -> Self {
        self.root = f(std::mem::take(&mut self.root));
        self
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.map_root(|root| root.with_description(description))
    }

    pub fn with_usage(self, usage: impl Into<String>) -> Self {
        self.map_root(|root| root.with_usage(usage))
    }

    /// Adds a global flag, visible to every command.
    pub fn with_flag(self, flag: Flag) -> Self {
        self.map_root(|root| root.with_flag(flag))
    }

    pub fn with_arg(self, arg: Arg) -> Self {
        self.map_root(|root| root.with_arg(arg))
    }

    pub fn with_subcommand(self, command: Command) -> Self {
        self.map_root(|root| root.with_subcommand(command))
    }

    pub fn with_action<F>(self, action: F) -> Self
    where
        F: Fn(&ActionContext<'_>, Option<ActionData>) -> Result<Option<ActionData>, BoxError>
            + 'static,
    {
        self.map_root(|root| root.with_action(action))
    }

    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&Check<'_>, &CommandNode) -> Result<(), BoxError> + 'static,
    {
        self.map_root(|root| root.with_validator(validator))
    }

    /// Setting a version adds `--version`/`-V`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// When disabled, the first positional value ends flag parsing.
    /// Enabled by default.
    pub fn with_mix_args_and_flags(mut self, mix: bool) -> Self {
        self.mix_args_and_flags = mix;
        self
    }

    /// Adds a `help [command...]` sub-command.
    pub fn with_help_command(mut self, show: bool) -> Self {
        self.show_help_command = show;
        self
    }

    pub fn with_terminator<F>(mut self, terminator: F) -> Self
    where
        F: FnMut(i32) + 'static,
    {
        self.terminator = Box::new(terminator);
        self
    }

    pub fn with_renderer<R>(mut self, renderer: R) -> Self
    where
        R: Renderer + 'static,
    {
        self.renderer = Box::new(renderer);
        self
    }

    /// Where usage and version go. Stdout by default.
    pub fn with_output<W>(mut self, out: W) -> Self
    where
        W: Write + 'static,
    {
        self.out = Box::new(out);
        self
    }

    /// Where errors go. Stderr by default.
    pub fn with_error_output<W>(mut self, err: W) -> Self
    where
        W: Write + 'static,
    {
        self.err = Box::new(err);
        self
    }

    pub fn with_flags_parsed_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Application) + 'static,
    {
        self.on_flags_parsed = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        match self.tree.get(self.tree.root()) {
            Some(root) => root.name(),
            None => self.root.name(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Builds the command tree and adds the builtin flags and commands.
    ///
    /// Runs once; [`parse`](Self::parse) calls it on first use.
    pub fn init(&mut self) -> Result<(), Error> {
        if !self.tree.is_empty() {
            return Ok(());
        }
        let mut root = std::mem::take(&mut self.root);
        if self.version.is_some() {
            root.prepend_flag(
                Flag::bool(VERSION_FLAG)
                    .with_short('V')
                    .with_usage("Show application version"),
            );
        }
        root.prepend_flag(
            Flag::bool(HELP_FLAG)
                .with_short('h')
                .with_usage("Show context-sensitive help"),
        );
        if self.show_help_command {
            root.prepend_subcommand(
                Command::new(HELP_COMMAND)
                    .with_description("Show help for a command")
                    .with_optional(true)
                    .with_arg(
                        Arg::new(HELP_COMMAND_ARG, ValueType::many(ValueKind::Text))
                            .with_usage("Command path to describe"),
                    ),
            );
        }

        let name = root.name().to_string();
        self.tree = Tree::build(root).inspect_err(|_| self.root.set_name(name))?;
        let root = self.tree.command(self.tree.root());
        let builtin = |name: &str| {
            root.flags()
                .iter()
                .copied()
                .find(|id| self.tree.flag(*id).name() == name)
        };
        self.help_flag = builtin(HELP_FLAG);
        self.version_flag = self.version.as_ref().and_then(|_| builtin(VERSION_FLAG));
        self.help_command = if self.show_help_command {
            root.child(HELP_COMMAND)
        } else {
            None
        };
        debug!(app = root.name(), commands = self.tree.commands().count(), "initialized");
        Ok(())
    }

    /// Parses `tokens` (argv without the program name).
    pub fn parse<I, S>(&mut self, tokens: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.init()?;
        self.context
            .parse(&mut self.tree, tokens, self.mix_args_and_flags)
    }

    /// Validates the last parse: leaf check, group resolution, validators,
    /// required elements, then command validators from the leaf up.
    pub fn validate(&mut self) -> Result<(), Error> {
        self.init()?;
        validate::validate(self)
    }

    /// Runs the action chain for the last parse.
    pub fn execute(&self) -> Result<Option<ActionData>, Error> {
        if self.tree.is_empty() {
            return Ok(None);
        }
        execute::execute(self)
    }

    /// Runs the application for a full argv, including the program name.
    ///
    /// Errors are rendered with usage to the error output before the
    /// terminator receives 1, and are also returned.
    pub fn run<I, S>(&mut self, argv: I) -> Result<Outcome, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = argv.into_iter().skip(1).map(Into::into).collect();
        if let Err(err) = self.parse(tokens) {
            return Err(self.fail(err));
        }
        if let Some(hook) = &self.on_flags_parsed {
            hook(self);
        }

        if self.is_requested(self.help_flag) {
            self.print_usage();
            self.terminate(0);
            return Ok(Outcome::Help);
        }
        if self.is_requested(self.version_flag) {
            let text = format!("{} {}\n", self.name(), self.version.as_deref().unwrap_or_default());
            self.write_out(&text);
            self.terminate(0);
            return Ok(Outcome::Version);
        }

        if let Err(err) = self.validate() {
            return Err(self.fail(err));
        }

        if self.help_command.is_some() && self.help_command == Some(self.context.current()) {
            let path = self
                .arg_value(HELP_COMMAND_ARG)
                .map(|value| value.strings())
                .unwrap_or_default();
            if let Err(err) = self.parse(path) {
                return Err(self.fail(err));
            }
            self.print_usage();
            self.terminate(0);
            return Ok(Outcome::Help);
        }

        match self.execute() {
            Ok(data) => {
                self.terminate(0);
                Ok(Outcome::Completed(data))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn is_requested(&self, flag: Option<FlagId>) -> bool {
        flag.is_some_and(|id| self.tree.flag(id).is_set_by_user())
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!(kind = %err.kind(), "run failed");
        let mut text = self.renderer.render_error(&err);
        let usage = self.usage();
        if !usage.is_empty() {
            text.push('\n');
            text.push_str(&usage);
        }
        if let Err(e) = self.err.write_all(text.as_bytes()).and_then(|()| self.err.flush()) {
            warn!(error = %e, "failed to write error output");
        }
        self.terminate(1);
        err
    }

    fn print_usage(&mut self) {
        let text = self.usage();
        self.write_out(&text);
    }

    fn write_out(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write output");
        }
    }

    fn terminate(&mut self, code: i32) {
        debug!(code, "terminating");
        (self.terminator)(code);
    }

    /// Usage text for the command the last parse reached.
    pub fn usage(&self) -> String {
        self.usage_view()
            .map(|view| self.renderer.render_usage(&view))
            .unwrap_or_default()
    }

    pub fn render_error(&self, error: &Error) -> String {
        self.renderer.render_error(error)
    }

    /// The view handed to the usage renderer, or `None` before init.
    pub fn usage_view(&self) -> Option<Usage<'_>> {
        let command = self.tree.get(self.context.current())?;
        let flags: Vec<&Flag> = self
            .in_scope_flags()
            .into_iter()
            .filter(|flag| !flag.is_hidden())
            .collect();
        let args = self.in_scope_args();
        let subcommands: Vec<&CommandNode> = command
            .children()
            .iter()
            .map(|id| self.tree.command(*id))
            .filter(|child| !child.is_hidden())
            .collect();

        let mut elements: Vec<ElementId> =
            self.context.args().iter().map(|id| ElementId::Arg(*id)).collect();
        elements.extend(
            self.sorted_flag_ids()
                .into_iter()
                .filter(|id| !self.tree.flag(*id).is_hidden())
                .map(ElementId::Flag),
        );
        elements.extend(subcommands.iter().map(|c| ElementId::Command(c.id())));

        Some(Usage {
            tree: &self.tree,
            command,
            full_command: self.tree.full_command(command.id()),
            version: self.version(),
            flags,
            args,
            subcommands,
            grouped: validate::group_elements(&self.tree, &elements),
        })
    }

    fn sorted_flag_ids(&self) -> Vec<FlagId> {
        let mut ids: Vec<FlagId> = self.context.flags().map(|(_, id)| id).collect();
        ids.sort_by(|a, b| {
            let (a, b) = (self.tree.flag(*a), self.tree.flag(*b));
            (a.level(), a.name()).cmp(&(b.level(), b.name()))
        });
        ids
    }

    /// Flags in scope for the current command, by level then name.
    pub fn in_scope_flags(&self) -> Vec<&Flag> {
        self.sorted_flag_ids()
            .into_iter()
            .map(|id| self.tree.flag(id))
            .collect()
    }

    /// Arguments in scope for the current command, in position order.
    pub fn in_scope_args(&self) -> Vec<&Arg> {
        self.context
            .args()
            .iter()
            .map(|id| self.tree.arg(*id))
            .collect()
    }

    /// An in-scope flag by long name or single-character short form.
    pub fn flag(&self, name: &str) -> Result<&Flag, Error> {
        self.context
            .flag_id(name)
            .map(|id| self.tree.flag(id))
            .ok_or_else(|| Error::UnknownElement {
                element: ElementType::Flag,
                name: name.to_string(),
            })
    }

    pub fn flag_value(&self, name: &str) -> Result<Value, Error> {
        self.flag(name).map(FlagArg::value)
    }

    /// An in-scope argument by name.
    pub fn arg(&self, name: &str) -> Result<&Arg, Error> {
        self.context
            .arg_id(&self.tree, name)
            .map(|id| self.tree.arg(id))
            .ok_or_else(|| Error::UnknownElement {
                element: ElementType::Argument,
                name: name.to_string(),
            })
    }

    pub fn arg_value(&self, name: &str) -> Result<Value, Error> {
        self.arg(name).map(FlagArg::value)
    }

    /// Whether a flag (checked first) or argument came from the command line.
    pub fn is_set(&self, name: &str) -> Result<bool, Error> {
        if let Ok(flag) = self.flag(name) {
            return Ok(flag.is_set_by_user());
        }
        self.arg(name).map(FlagArg::is_set_by_user)
    }

    /// The command the last parse ended on, `None` before init.
    pub fn current_command(&self) -> Option<&CommandNode> {
        self.tree.get(self.context.current())
    }

    /// `app sub sub` for the current command.
    pub fn full_command(&self) -> String {
        if self.tree.is_empty() {
            return self.root.name().to_string();
        }
        self.tree.full_command(self.context.current())
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn context(&self) -> &ParseContext {
        &self.context
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name())
            .field("version", &self.version)
            .field("author", &self.author)
            .field("mix_args_and_flags", &self.mix_args_and_flags)
            .field("show_help_command", &self.show_help_command)
            .field("tree", &self.tree)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
