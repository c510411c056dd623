use crate::command::ExitCode;
use thiserror::Error;

/// Failures that abort a single input line before (or instead of) running it.
///
/// None of these end the session; the interpreter prints the message on the
/// line's error sink and continues with [`ShellError::exit_code`] as status.
#[derive(Error, Debug)]
pub enum ShellError {
    /// No builtin and no executable on the search path matched the name.
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// A redirection operator was the last token of the command.
    #[error("syntax error near unexpected token `newline' after `{0}'")]
    MissingRedirectTarget(String),

    /// One side of `|` had no command.
    #[error("syntax error near unexpected token `|'")]
    EmptyPipelineStage,

    /// The OS refused to create the pipe between two stages.
    #[error("pipe: {0}")]
    Pipe(#[source] std::io::Error),

    /// The destination of a redirection could not be opened.
    #[error("{command}: {args}: No such file or directory")]
    RedirectOpen {
        command: String,
        args: String,
        #[source]
        source: std::io::Error,
    },
}

impl ShellError {
    /// Status reported to the caller for this failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ShellError::CommandNotFound(_) => 127,
            _ => 1,
        }
    }
}
