//! Execution chain: runs actions from the resolved command up to the root.
//!
//! Each action receives whatever the action below it returned. Any action may
//! call [`ActionContext::stop`] to keep the remaining ancestors from running.

use std::any::Any;
use std::cell::Cell;

use tracing::debug;

use crate::app::Application;
use crate::error::Error;
use crate::tree::{CommandId, CommandNode};

/// Opaque value passed from a command's action to its parent's.
pub type ActionData = Box<dyn Any>;

/// What an action sees while it runs.
pub struct ActionContext<'a> {
    app: &'a Application,
    command: CommandId,
    stop: &'a Cell<bool>,
}

impl<'a> ActionContext<'a> {
    /// The application, for flag and argument lookups.
    pub fn app(&self) -> &'a Application {
        self.app
    }

    /// The command whose action is running.
    pub fn command(&self) -> &'a CommandNode {
        self.app.tree.command(self.command)
    }

    /// Stops the walk after this action; parent actions do not run.
    pub fn stop(&self) {
        self.stop.set(true);
    }
}

enum ChainState {
    Pending(CommandId),
    Done,
}

/// Runs the chain for the command the last parse ended on.
///
/// Commands without an action pass the data they received on to their parent.
pub(crate) fn execute(app: &Application) -> Result<Option<ActionData>, Error> {
    let stop = Cell::new(false);
    let mut data: Option<ActionData> = None;
    let mut state = ChainState::Pending(app.context.current());

    while let ChainState::Pending(id) = state {
        let command = app.tree.command(id);
        if let Some(action) = command.action() {
            debug!(command = %app.tree.full_command(id), "running action");
            let ctx = ActionContext {
                app,
                command: id,
                stop: &stop,
            };
            data = action(&ctx, data).map_err(|err| {
                Error::from_callback(err, |source| Error::ActionFailed {
                    command: app.tree.full_command(id),
                    source,
                })
            })?;
        }
        state = match command.parent() {
            Some(parent) if !stop.get() => ChainState::Pending(parent),
            _ => ChainState::Done,
        };
    }

    if stop.get() {
        debug!("action chain stopped early");
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::tree::Command;
    use crate::{Application, ErrorKind};

    type Log = Rc<RefCell<Vec<String>>>;

    fn app(log: &Log, stop_in_child: bool) -> Application {
        let root_log = log.clone();
        let parent_log = log.clone();
        let child_log = log.clone();
        Application::new("app")
            .with_action(move |_, data| {
                let received = data
                    .and_then(|d| d.downcast::<String>().ok())
                    .map(|s| *s)
                    .unwrap_or_default();
                root_log.borrow_mut().push(format!("root:{received}"));
                Ok(None)
            })
            .with_subcommand(
                Command::new("parent")
                    .with_action(move |_, data| {
                        let received = data
                            .and_then(|d| d.downcast::<String>().ok())
                            .map(|s| *s)
                            .unwrap_or_default();
                        parent_log.borrow_mut().push(format!("parent:{received}"));
                        Ok(Some(Box::new("from parent".to_string())))
                    })
                    .with_subcommand(Command::new("passthrough").with_subcommand(
                        Command::new("child").with_action(move |ctx, _| {
                            child_log.borrow_mut().push(format!("child:{}", ctx.command().name()));
                            if stop_in_child {
                                ctx.stop();
                            }
                            Ok(Some(Box::new("from child".to_string())))
                        }),
                    )),
            )
    }

    #[test]
    fn test_data_flows_leaf_to_root() {
        let log = Log::default();
        let mut app = app(&log, false);
        app.parse(["parent", "passthrough", "child"]).unwrap();
        let out = app.execute().unwrap();
        assert!(out.is_none());
        assert_eq!(
            *log.borrow(),
            vec!["child:child", "parent:from child", "root:from parent"]
        );
    }

    #[test]
    fn test_stop_skips_ancestors() {
        let log = Log::default();
        let mut app = app(&log, true);
        app.parse(["parent", "passthrough", "child"]).unwrap();
        let out = app.execute().unwrap();
        assert_eq!(*log.borrow(), vec!["child:child"]);
        let out = out.and_then(|d| d.downcast::<String>().ok()).map(|s| *s);
        assert_eq!(out.as_deref(), Some("from child"));
    }

    #[test]
    fn test_action_error_aborts_walk() {
        let log = Log::default();
        let root_log = log.clone();
        let mut app = Application::new("app")
            .with_action(move |_, _| {
                root_log.borrow_mut().push("root".to_string());
                Ok(None)
            })
            .with_subcommand(Command::new("fail").with_action(|_, _| Err("boom".into())));
        app.parse(["fail"]).unwrap();
        let err = app.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionFailed);
        assert_eq!(err.to_string(), "command 'app fail' failed: boom");
        assert!(log.borrow().is_empty());
    }
}
