use crate::command::{CommandFactory, ExitCode, StdStreams, Stdout};
use crate::env::Environment;
use crate::error::ShellError;
use crate::lexer;
use crate::pipeline::{self, Stages};
use crate::redirect::{self, OpenedRedirections};
use std::io::Write;
use tracing::{debug, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate: BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// What the caller should do after a line has been executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Read the next line; carries the status of this one.
    Continue(ExitCode),
    /// `exit` ran; end the session with this status.
    Exit(ExitCode),
}

impl LineOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match *self {
            LineOutcome::Continue(code) | LineOutcome::Exit(code) => code,
        }
    }
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried to create commands by name. See [`Default`] for the built-in
/// factories included out of the box.
///
/// Example
/// ```
/// use minish::{Interpreter, LineOutcome};
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// assert_eq!(sh.execute_line("exit 4"), LineOutcome::Exit(4));
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self::with_env(Environment::new(), commands)
    }

    /// Same as [`Interpreter::new`], starting from a prepared environment.
    ///
    /// The builtin names of `env` are replaced by those of `commands`.
    pub fn with_env(mut env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        env.builtins = commands
            .iter()
            .filter_map(|f| f.builtin_name())
            .map(str::to_string)
            .collect();
        Self { env, commands }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Names of the registered builtins, sorted.
    pub fn builtin_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.env.builtins.iter().map(String::as_str)
    }

    /// Run a single command invocation by name with arguments.
    ///
    /// No redirection or pipe handling: `args` reach the command verbatim.
    /// Returns the command's exit code or an error if the command cannot be created
    /// or fails to execute.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                return cmd.execute(StdStreams::inherited(), &mut self.env);
            }
        }
        Err(ShellError::CommandNotFound(name.to_string()).into())
    }

    /// Execute one input line with the shell's own standard streams.
    pub fn execute_line(&mut self, line: &str) -> LineOutcome {
        self.execute_line_with_io(line, StdStreams::inherited())
    }

    /// Execute one input line: tokenize, split pipes, apply redirections and
    /// run the commands.
    ///
    /// Failures are reported on `io.stderr` and turned into a status; they
    /// never end the session. Only `exit` yields [`LineOutcome::Exit`].
    pub fn execute_line_with_io(&mut self, line: &str, io: StdStreams) -> LineOutcome {
        let tokens = lexer::split_into_tokens(line);
        debug!(?tokens, "tokenized line");
        let status = run_tokens(&self.commands, &mut self.env, tokens, io);
        match self.env.exit_request.take() {
            Some(code) => LineOutcome::Exit(code),
            None => LineOutcome::Continue(status),
        }
    }
}

/// Run a token list, which may contain pipes and redirections.
pub(crate) fn run_tokens(
    commands: &[Box<dyn CommandFactory>],
    env: &mut Environment,
    tokens: Vec<String>,
    mut io: StdStreams,
) -> ExitCode {
    if tokens.is_empty() {
        return 0;
    }
    match pipeline::split(tokens) {
        Ok(Stages::Single(tokens)) => run_command(commands, env, tokens, io),
        Ok(Stages::Pipe(left, right)) => pipeline::run_pipeline(commands, env, left, right, io),
        Err(e) => report(&mut io.stderr, &e),
    }
}

fn run_command(
    commands: &[Box<dyn CommandFactory>],
    env: &mut Environment,
    tokens: Vec<String>,
    mut io: StdStreams,
) -> ExitCode {
    let redirections = match redirect::resolve(tokens) {
        Ok(r) => r,
        Err(e) => return report(&mut io.stderr, &e),
    };

    // Files are created even if the command turns out not to exist.
    let opened = match redirections.open(&env.current_dir) {
        Ok(opened) => opened,
        Err(source) => {
            let (command, args) = match redirections.args.split_first() {
                Some((name, rest)) => (name.clone(), rest.join(" ")),
                None => (String::new(), String::new()),
            };
            let e = ShellError::RedirectOpen {
                command,
                args,
                source,
            };
            return report(&mut io.stderr, &e);
        }
    };
    let OpenedRedirections { stdout, stderr } = opened;
    if let Some(file) = stdout {
        io.stdout = Box::new(file);
    }
    if let Some(file) = stderr {
        io.stderr = Box::new(file);
    }

    let Some((name, rest)) = redirections.args.split_first() else {
        return 0;
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();

    let Some(cmd) = commands
        .iter()
        .find_map(|f| f.try_create(env, name, &args))
    else {
        return report(&mut io.stderr, &ShellError::CommandNotFound(name.clone()));
    };

    debug!(command = %name, ?args, "dispatching");
    match cmd.execute(io, env) {
        Ok(code) => code,
        Err(e) => {
            warn!(command = %name, error = %e, "command failed");
            // The command consumed its streams; only the shell's stderr is left.
            if let Err(write_err) = writeln!(std::io::stderr(), "{:#}", e) {
                warn!(error = %write_err, "could not report error");
            }
            1
        }
    }
}

pub(crate) fn report(stderr: &mut Box<dyn Stdout>, err: &ShellError) -> ExitCode {
    if let Err(write_err) = writeln!(stderr, "{}", err) {
        warn!(error = %write_err, "could not report error");
    }
    err.exit_code()
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `echo`, `exit`, `type`, `pwd`, `cd`, `history`
    /// - external command launcher
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Type>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<HistoryCmd>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}
