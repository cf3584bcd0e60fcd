//! Declarative command trees for command-line programs.
//!
//! An [`Application`] owns a tree of [`Command`]s, each declaring typed
//! [`Flag`]s and positional [`Arg`]s. A run tokenizes argv against the tree,
//! binds values through the value model, resolves validation groups, checks
//! required elements and validators, then walks the action chain from the
//! resolved command back up to the root.
//!
//! ```
//! use cmdtree_core::{Application, Arg, Command, Flag, FlagArg};
//!
//! let mut app = Application::new("kubectl").with_subcommand(
//!     Command::new("delete")
//!         .with_flag(Flag::text("filename").with_short('f').with_groups(["file"]))
//!         .with_arg(Arg::text("resource-type").with_groups(["name"]))
//!         .with_arg(Arg::text("resource-name").with_groups(["name"])),
//! );
//!
//! app.parse(["delete", "pods", "web"]).unwrap();
//! app.validate().unwrap();
//! assert_eq!(app.full_command(), "kubectl delete");
//! assert!(app.arg("resource-type").unwrap().is_set_by_user());
//!
//! app.parse(["delete", "pods", "-f", "pods.yaml"]).unwrap();
//! assert!(app.validate().is_err());
//! ```

mod app;
mod context;
mod error;
mod execute;
mod render;
mod schema;
mod tree;
mod validate;
mod value;

pub use app::{Application, FlagsParsedHook, Outcome, Terminator};
pub use context::ParseContext;
pub use error::{BoxError, DeclarationError, ElementType, Error, ErrorKind, Result, ValueError};
pub use execute::{ActionContext, ActionData};
pub use render::{ErrorRenderer, PlainRenderer, Renderer, Usage, UsageRenderer};
pub use schema::{AppSchema, ArgSchema, CommandSchema, FlagSchema};
pub use tree::{
    Action, Arg, ArgId, ArgValidator, Binding, Category, Command, CommandId, CommandNode,
    CommandValidator, Flag, FlagArg, FlagId, FlagValidator, Tree,
};
pub use validate::{
    Check, ElementId, GroupedElements, ValidationGroup, group_elements, resolve_validation_set,
    validation_elements,
};
pub use value::{
    Destination, Radix, Scalar, Value, ValueKind, ValueType, expand_files, match_hint,
    parse_timestamp,
};
