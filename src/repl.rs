//! Interactive line source: a rustyline editor with command-name completion.

use crate::command::ExitCode;
use crate::external::executables_in;
use crate::interpreter::{Interpreter, LineOutcome};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, CompletionType, ConditionalEventHandler, Config, Context, Editor, Event, EventContext,
    EventHandler, Helper, KeyEvent, RepeatCount,
};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const PROMPT: &str = "$ ";

/// Completes the command word (the first word of the line) from builtin names
/// and the executables found on `PATH`.
pub struct ShellHelper {
    builtins: BTreeSet<String>,
    search_paths: OsString,
}

impl ShellHelper {
    pub fn new(builtins: BTreeSet<String>, search_paths: OsString) -> Self {
        Self {
            builtins,
            search_paths,
        }
    }

    /// Command names starting with `prefix`, sorted and deduplicated.
    ///
    /// A unique match is completed with a trailing space so the user can go on
    /// typing arguments.
    fn candidates(&self, prefix: &str) -> Vec<Pair> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let mut names: BTreeSet<String> = executables_in(&self.search_paths)
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.extend(
            self.builtins
                .iter()
                .filter(|name| name.starts_with(prefix))
                .cloned(),
        );

        let unique = names.len() == 1;
        names
            .into_iter()
            .map(|name| Pair {
                replacement: if unique {
                    format!("{} ", name)
                } else {
                    name.clone()
                },
                display: name,
            })
            .collect()
    }
}

/// Start and text of the word under the cursor if it is the command word.
fn command_word(line: &str, pos: usize) -> Option<(usize, &str)> {
    let before = line.get(..pos)?;
    let start = before.len() - before.trim_start().len();
    let word = &before[start..];
    if word.contains(char::is_whitespace) {
        None
    } else {
        Some((start, word))
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(match command_word(line, pos) {
            Some((start, word)) => (start, self.candidates(word)),
            None => (pos, Vec::new()),
        })
    }
}

impl Helper for ShellHelper {}
impl Highlighter for ShellHelper {}
impl Hinter for ShellHelper {
    type Hint = String;
}
impl Validator for ShellHelper {}

/// Ctrl-C handler: remembers whether there was a partly typed line to drop.
struct InterruptLine {
    abandoned: Arc<AtomicBool>,
}

impl ConditionalEventHandler for InterruptLine {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext,
    ) -> Option<Cmd> {
        if !ctx.line().is_empty() {
            self.abandoned.store(true, Ordering::SeqCst);
        }
        Some(Cmd::Interrupt)
    }
}

/// Read and execute lines until `exit`, end of input or Ctrl-C on an empty
/// prompt.
///
/// With `histfile`, its lines are loaded into the session history first and
/// the lines entered during the session are appended to it at the end.
///
/// Returns the status the shell should exit with.
pub fn run(sh: &mut Interpreter, histfile: Option<PathBuf>) -> rustyline::Result<ExitCode> {
    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();
    let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(ShellHelper::new(
        sh.env().builtins.clone(),
        sh.env().search_paths(),
    )));

    let abandoned = Arc::new(AtomicBool::new(false));
    rl.bind_sequence(
        KeyEvent::ctrl('C'),
        EventHandler::Conditional(Box::new(InterruptLine {
            abandoned: Arc::clone(&abandoned),
        })),
    );

    if let Some(path) = &histfile {
        load_history(sh, &mut rl, path)?;
    }

    let mut last_status = 0;
    let result = loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                    sh.env_mut().history.push(line.as_str());
                }
                match sh.execute_line(&line) {
                    LineOutcome::Continue(code) => last_status = code,
                    LineOutcome::Exit(code) => break Ok(code),
                }
            }
            Err(ReadlineError::Interrupted) if abandoned.swap(false, Ordering::SeqCst) => {
                debug!("line abandoned");
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break Ok(last_status),
            Err(err) => break Err(err),
        }
    };

    if let Some(path) = &histfile {
        if let Err(e) = sh.env_mut().history.append_to(path) {
            warn!(error = %e, file = %path.display(), "could not save history");
        }
    }
    result
}

/// Load `path` into the session history and the editor; a missing file is
/// not an error.
fn load_history(
    sh: &mut Interpreter,
    rl: &mut Editor<ShellHelper, DefaultHistory>,
    path: &Path,
) -> rustyline::Result<()> {
    let history = &mut sh.env_mut().history;
    match history.read_from(path) {
        Ok(loaded) => debug!(loaded, file = %path.display(), "history loaded"),
        Err(e) => debug!(error = %e, file = %path.display(), "no history loaded"),
    }
    history.mark_flushed();
    for line in sh.env().history.entries() {
        rl.add_history_entry(line.as_str())?;
    }
    Ok(())
}
