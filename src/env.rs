use crate::command::ExitCode;
use crate::history::History;
use std::collections::{BTreeSet, HashMap};
use std::env as stdenv;
use std::ffi::OsString;
use std::path::PathBuf;

/// Mutable session state handed to every command.
///
/// The environment contains:
/// - `vars`: a map of environment variables that will be visible to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `builtins`: names of the builtin commands registered with the interpreter.
/// - `history`: the lines entered so far and the `history -a` offset.
/// - `exit_request`: set by `exit`; the interpreter turns it into the end of the session.
///
/// Note: fields are public to keep builtins short; the interpreter is the
/// only owner and never shares an `Environment` between threads.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Builtin names, fixed once the interpreter is built.
    pub builtins: BTreeSet<String>,
    /// Session history.
    pub history: History,
    /// Exit status requested by the `exit` builtin, if any.
    pub exit_request: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`. History starts empty and no builtins are known.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            builtins: BTreeSet::new(),
            history: History::new(),
            exit_request: None,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The `PATH` search list, empty when unset.
    pub fn search_paths(&self) -> OsString {
        self.get_var("PATH").map(OsString::from).unwrap_or_default()
    }

    /// The user's home directory from `HOME`.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
