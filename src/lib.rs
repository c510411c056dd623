//! A small interactive shell.
//!
//! An input line is tokenized with POSIX-style quoting, split at the first `|`
//! into two concurrently running stages, stripped of output redirections
//! (`>`, `1>`, `2>`, `>>`, `1>>`, `2>>`) and finally dispatched either to a
//! builtin implemented in Rust (`echo`, `cd`, `pwd`, `type`, `exit`,
//! `history`) or to an executable found on `PATH`.
//!
//! The main entry point is [`Interpreter`], which executes lines or single
//! commands using a set of pluggable factories. The public modules [`command`] and
//! [`env`] expose traits and types for implementing your own commands and for
//! interacting with the session state; [`repl`] drives an interactive session.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod pipeline;
pub mod redirect;
pub mod repl;

/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, LineOutcome};
