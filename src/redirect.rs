//! Redirection resolver: separates `>`-style operators and their destinations
//! from the positional arguments of a command.

use crate::error::ShellError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Which standard stream a redirection replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStream {
    Stdout,
    Stderr,
}

/// How the destination file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>`, `1>`, `2>`: existing content is discarded.
    Truncate,
    /// `>>`, `1>>`, `2>>`: writes go to the end of the existing content.
    Append,
}

/// A single parsed redirection, e.g. `2>> err.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub stream: TargetStream,
    pub mode: RedirectMode,
    pub path: PathBuf,
}

impl RedirectionSpec {
    /// Open the destination, creating it if needed.
    ///
    /// Relative destinations are resolved against `cwd`.
    pub fn open(&self, cwd: &Path) -> io::Result<File> {
        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(self.mode == RedirectMode::Truncate)
            .append(self.mode == RedirectMode::Append)
            .open(cwd.join(&self.path))
    }
}

/// Result of stripping redirections from a token stream.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Redirections {
    /// Positional arguments, command name first. Never contains operators
    /// or their destinations.
    pub args: Vec<String>,
    /// All redirections in the order they appeared.
    pub specs: Vec<RedirectionSpec>,
}

impl Redirections {
    /// The effective stdout redirection (the last one wins).
    pub fn stdout(&self) -> Option<&RedirectionSpec> {
        self.last_for(TargetStream::Stdout)
    }

    /// The effective stderr redirection (the last one wins).
    pub fn stderr(&self) -> Option<&RedirectionSpec> {
        self.last_for(TargetStream::Stderr)
    }

    fn last_for(&self, stream: TargetStream) -> Option<&RedirectionSpec> {
        self.specs.iter().rev().find(|s| s.stream == stream)
    }

    /// Open every destination left to right, like a POSIX shell does, and
    /// keep the effective file for each stream.
    ///
    /// On failure every file opened so far is closed before returning.
    pub fn open(&self, cwd: &Path) -> io::Result<OpenedRedirections> {
        let mut opened = OpenedRedirections::default();
        for spec in &self.specs {
            let file = spec.open(cwd)?;
            match spec.stream {
                TargetStream::Stdout => opened.stdout = Some(file),
                TargetStream::Stderr => opened.stderr = Some(file),
            }
        }
        Ok(opened)
    }
}

/// Files backing the redirected streams of one invocation.
#[derive(Debug, Default)]
pub struct OpenedRedirections {
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

fn parse_operator(token: &str) -> Option<(TargetStream, RedirectMode)> {
    match token {
        ">" | "1>" => Some((TargetStream::Stdout, RedirectMode::Truncate)),
        ">>" | "1>>" => Some((TargetStream::Stdout, RedirectMode::Append)),
        "2>" => Some((TargetStream::Stderr, RedirectMode::Truncate)),
        "2>>" => Some((TargetStream::Stderr, RedirectMode::Append)),
        _ => None,
    }
}

/// Returns true if `token` is one of the recognized redirection operators.
pub fn is_operator(token: &str) -> bool {
    parse_operator(token).is_some()
}

/// Scan `tokens` left to right and pull out every redirection.
///
/// Each operator takes exactly the token that follows it as destination;
/// everything else stays a positional argument in its original order.
///
/// ```
/// use minish::redirect::{resolve, RedirectMode};
///
/// let tokens = ["echo", "hi", ">>", "out.txt"].map(String::from).to_vec();
/// let r = resolve(tokens).unwrap();
/// assert_eq!(r.args, ["echo", "hi"]);
/// assert_eq!(r.stdout().unwrap().mode, RedirectMode::Append);
/// ```
pub fn resolve(tokens: Vec<String>) -> Result<Redirections, ShellError> {
    let mut out = Redirections::default();
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        let Some((stream, mode)) = parse_operator(&token) else {
            out.args.push(token);
            continue;
        };
        let path = tokens
            .next()
            .ok_or_else(|| ShellError::MissingRedirectTarget(token.clone()))?;
        out.specs.push(RedirectionSpec {
            stream,
            mode,
            path: PathBuf::from(path),
        });
    }

    Ok(out)
}
