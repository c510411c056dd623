use crate::env::Environment;
use anyhow::Result;
use std::fs::File;
use std::io::{self, Read, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Implementors typically wrap standard input, a file or the read end of a pipe.
/// A blanket implementation exists for any type that implements `Read` and
/// `Into<Stdio>` (e.g. [`std::fs::File`] or [`os_pipe::PipeReader`]).
///
/// Streams must be `Send` because the left stage of a pipeline runs on its own thread.
pub trait Stdin: Read + Send {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio> + Send> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Abstraction over a writable output stream (standard output or standard error)
/// that can also be converted into a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Write` and `Into<Stdio>`.
pub trait Stdout: Write + Send {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;

    /// Whether a child process cannot write here directly and its output has
    /// to be copied over by the shell instead.
    fn needs_relay(&self) -> bool {
        false
    }

    /// A second handle on the same destination, if one can be opened.
    ///
    /// Lets a runner report its own failures after [`Stdout::stdio`] handed
    /// the stream to a child.
    fn try_clone_box(&self) -> Option<Box<dyn Stdout>>;
}

impl<T: Write + Into<Stdio> + CloneSink + Send + 'static> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }

    fn try_clone_box(&self) -> Option<Box<dyn Stdout>> {
        match self.clone_sink() {
            Ok(sink) => Some(Box::new(sink)),
            Err(e) => {
                tracing::debug!(error = %e, "could not duplicate output stream");
                None
            }
        }
    }
}

/// Output destinations that can be opened twice.
pub trait CloneSink: Sized {
    fn clone_sink(&self) -> io::Result<Self>;
}

impl CloneSink for File {
    fn clone_sink(&self) -> io::Result<Self> {
        self.try_clone()
    }
}

impl CloneSink for os_pipe::PipeWriter {
    fn clone_sink(&self) -> io::Result<Self> {
        self.try_clone()
    }
}

impl CloneSink for io::Stdout {
    fn clone_sink(&self) -> io::Result<Self> {
        Ok(io::stdout())
    }
}

impl CloneSink for io::Stderr {
    fn clone_sink(&self) -> io::Result<Self> {
        Ok(io::stderr())
    }
}

/// The three standard streams of one command invocation.
///
/// Owning the streams means that whatever backs them (redirection files, pipe
/// ends) is closed as soon as the invocation is done with them.
pub struct StdStreams {
    pub stdin: Box<dyn Stdin>,
    pub stdout: Box<dyn Stdout>,
    pub stderr: Box<dyn Stdout>,
}

impl StdStreams {
    /// Streams inherited from the shell process itself.
    pub fn inherited() -> Self {
        Self {
            stdin: Box::new(InheritedStdin(std::io::stdin())),
            stdout: Box::new(std::io::stdout()),
            stderr: Box::new(std::io::stderr()),
        }
    }
}

/// Standard input of the shell; children inherit it directly.
pub struct InheritedStdin(pub std::io::Stdin);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(self: Box<Self>, io: StdStreams, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
/// Implementations can use the environment to resolve executables (e.g., using PATH).
///
/// Factories are shared with the thread running the left side of a pipeline,
/// hence the `Send + Sync` bound.
pub trait CommandFactory: Send + Sync {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;

    /// Name of the builtin this factory creates, if it creates one.
    fn builtin_name(&self) -> Option<&'static str> {
        None
    }
}
