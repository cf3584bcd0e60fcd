//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cmdtree_core::Application;

/// In-memory writer whose contents outlive the application that owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captured output and exit status of an application under test.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub out: SharedBuffer,
    pub err: SharedBuffer,
    exit: Rc<Cell<Option<i32>>>,
}

impl Captured {
    pub fn exit_code(&self) -> Option<i32> {
        self.exit.get()
    }
}

/// Routes output into buffers and records the exit code instead of exiting.
pub fn capture(app: Application) -> (Application, Captured) {
    let captured = Captured::default();
    let exit = captured.exit.clone();
    let app = app
        .with_output(captured.out.clone())
        .with_error_output(captured.err.clone())
        .with_terminator(move |code| exit.set(Some(code)));
    (app, captured)
}

/// Creates empty files under `dir` and returns their paths.
pub fn touch(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, b"").unwrap();
            path
        })
        .collect()
}

pub fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}
