//! Two-stage pipelines: `left | right`, where `right` may itself contain
//! further pipes.

use crate::command::{CommandFactory, ExitCode, StdStreams};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::{report, run_tokens};
use std::thread;
use tracing::{debug, warn};

pub const PIPE: &str = "|";

/// A token list cut at its first pipe operator.
#[derive(Debug, PartialEq, Eq)]
pub enum Stages {
    /// No pipe at all.
    Single(Vec<String>),
    /// Tokens before the first `|`, and everything after it.
    Pipe(Vec<String>, Vec<String>),
}

/// Split `tokens` at the first `|`.
///
/// Only the first pipe is consumed; the right side keeps any later ones and
/// is split again when it runs.
pub fn split(mut tokens: Vec<String>) -> Result<Stages, ShellError> {
    let Some(pos) = tokens.iter().position(|t| t == PIPE) else {
        return Ok(Stages::Single(tokens));
    };
    let right = tokens.split_off(pos + 1);
    tokens.truncate(pos);
    if tokens.is_empty() || right.is_empty() {
        return Err(ShellError::EmptyPipelineStage);
    }
    Ok(Stages::Pipe(tokens, right))
}

/// Run `left` and `right` concurrently, connected by an OS pipe.
///
/// The left stage gets its own thread, the caller's stdin and the write end of
/// the pipe; its stderr is the shell's. The right stage runs on the calling
/// thread with the read end as stdin and the caller's stdout and stderr. Each
/// stage works on a copy of `env`, so neither can change the session (`cd`
/// or `exit` inside a pipeline has no lasting effect).
///
/// Returns the status of the right stage once both stages are done.
pub(crate) fn run_pipeline(
    commands: &[Box<dyn CommandFactory>],
    env: &Environment,
    left: Vec<String>,
    right: Vec<String>,
    io: StdStreams,
) -> ExitCode {
    let StdStreams {
        stdin,
        stdout,
        mut stderr,
    } = io;
    let (reader, writer) = match os_pipe::pipe() {
        Ok(ends) => ends,
        Err(e) => {
            warn!(error = %e, "could not create pipe");
            return report(&mut stderr, &ShellError::Pipe(e));
        }
    };

    debug!(?left, ?right, "starting pipeline");

    thread::scope(|scope| {
        let mut left_env = env.clone();
        let left_stage = scope.spawn(move || {
            let io = StdStreams {
                stdin,
                stdout: Box::new(writer),
                stderr: Box::new(std::io::stderr()),
            };
            // The write end is dropped when the stage returns, which lets the
            // right stage see end of input.
            run_tokens(commands, &mut left_env, left, io)
        });

        let mut right_env = env.clone();
        let io = StdStreams {
            stdin: Box::new(reader),
            stdout,
            stderr,
        };
        let status = run_tokens(commands, &mut right_env, right, io);

        match left_stage.join() {
            Ok(left_status) => debug!(left_status, right_status = status, "pipeline finished"),
            Err(_) => warn!("left pipeline stage panicked"),
        }
        status
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_pipe_is_single() {
        assert_eq!(
            split(tokens(&["echo", "a"])).unwrap(),
            Stages::Single(tokens(&["echo", "a"]))
        );
    }

    #[test]
    fn test_split_at_first_pipe_only() {
        assert_eq!(
            split(tokens(&["a", "|", "b", "x", "|", "c"])).unwrap(),
            Stages::Pipe(tokens(&["a"]), tokens(&["b", "x", "|", "c"]))
        );
    }

    #[test]
    fn test_empty_side_is_error() {
        assert!(matches!(
            split(tokens(&["|", "b"])),
            Err(ShellError::EmptyPipelineStage)
        ));
        assert!(matches!(
            split(tokens(&["a", "|"])),
            Err(ShellError::EmptyPipelineStage)
        ));
    }
}
