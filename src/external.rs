use crate::command::{CommandFactory, ExecutableCommand, ExitCode, StdStreams, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tracing::{debug, warn};

/// Command that is not a builtin.
pub struct ExternalCommand {
    /// Resolved location of the executable.
    path: PathBuf,
    /// Name as typed by the user; becomes `argv[0]` of the child.
    name: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(path: PathBuf, name: OsString, args: Vec<OsString>) -> Self {
        Self { path, name, args }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let executable = find_command_path(&env.search_paths(), &env.current_dir, name)?;
        Some(Box::new(ExternalCommand::new(
            executable,
            name.into(),
            args.iter().map(|x| x.into()).collect(),
        )))
    }
}

/// Where a child's output stream goes: straight into a file descriptor, or
/// through a pipe the runner copies into an in-memory sink afterwards.
///
/// A direct stream may keep a spare handle on its destination for messages
/// written by the runner itself.
enum ChildOutput {
    Direct(Stdio, Option<Box<dyn Stdout>>),
    Relayed(Box<dyn Stdout>),
}

impl ChildOutput {
    fn from_sink(sink: Box<dyn Stdout>, keep_spare: bool) -> Self {
        if sink.needs_relay() {
            ChildOutput::Relayed(sink)
        } else {
            let spare = if keep_spare { sink.try_clone_box() } else { None };
            ChildOutput::Direct(sink.stdio(), spare)
        }
    }

    fn stdio(&mut self) -> Stdio {
        match self {
            ChildOutput::Direct(stdio, _) => std::mem::replace(stdio, Stdio::null()),
            ChildOutput::Relayed(_) => Stdio::piped(),
        }
    }

    fn is_relayed(&self) -> bool {
        matches!(self, ChildOutput::Relayed(_))
    }

    fn deliver(self, data: &[u8]) -> std::io::Result<()> {
        match self {
            ChildOutput::Relayed(mut sink) => {
                sink.write_all(data)?;
                sink.flush()
            }
            ChildOutput::Direct(..) => Ok(()),
        }
    }

    /// Write a message of the shell's own. Returns false when there is no
    /// handle left to write it to.
    fn report(self, message: &str) -> std::io::Result<bool> {
        match self {
            ChildOutput::Relayed(mut sink) | ChildOutput::Direct(_, Some(mut sink)) => {
                writeln!(sink, "{}", message)?;
                sink.flush()?;
                Ok(true)
            }
            ChildOutput::Direct(_, None) => Ok(false),
        }
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, io: StdStreams, env: &mut Environment) -> Result<ExitCode> {
        let StdStreams {
            stdin,
            stdout,
            stderr,
        } = io;
        let mut stdout = ChildOutput::from_sink(stdout, false);
        let mut stderr = ChildOutput::from_sink(stderr, true);

        debug!(path = %self.path.display(), args = ?self.args, "spawning external command");

        // The `Command` is a temporary so that the parent's copies of pipe
        // ends and redirection files are closed before waiting on the child.
        let spawned = {
            let mut cmd = std::process::Command::new(&self.path);
            cmd.args(&self.args)
                .stdin(stdin.stdio())
                .stdout(stdout.stdio())
                .stderr(stderr.stdio())
                .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .current_dir(&env.current_dir);
            set_argv0(&mut cmd, &self.name);
            cmd.spawn()
        };
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let name = self.name.to_string_lossy();
                warn!(path = %self.path.display(), error = %e, "spawn failed");
                // Spawn failures belong to the command's stderr, redirection included.
                if stderr.report(&format!("{}: {}", name, e))? {
                    return Ok(1);
                }
                return Err(e).with_context(|| format!("{}: failed to spawn", name));
            }
        };

        let status = if stdout.is_relayed() || stderr.is_relayed() {
            let output = child.wait_with_output()?;
            stdout.deliver(&output.stdout)?;
            stderr.deliver(&output.stderr)?;
            output.status
        } else {
            child.wait()?
        };

        Ok(exit_code(status))
    }
}

#[cfg(unix)]
fn set_argv0(cmd: &mut std::process::Command, name: &OsStr) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_argv0(_cmd: &mut std::process::Command, _name: &OsStr) {}

/// Normal exits report their own code; anything else is a generic failure.
fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => code,
        None => {
            debug!(%status, "child terminated abnormally");
            1
        }
    }
}

/// Resolve a command name to the executable a shell would run.
///
/// Behavior:
/// - Name containing a path separator: taken as a path (relative ones are
///   joined to `cwd`) and accepted only if it is an executable non-directory.
/// - Otherwise: search each directory of `search_paths` (PATH) in order and
///   return the first executable non-directory match.
/// - Empty name: returns `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        let path = cwd.join(name);
        return is_executable(&path).then_some(path);
    }

    find_in_path(search_paths, OsStr::new(name))
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

/// Names of every executable file directly inside the `search_paths`
/// directories, deduplicated and sorted.
pub fn executables_in(search_paths: &OsStr) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in std::env::split_paths(search_paths) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            if !is_executable(&entry.path()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
    }
    names
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match fs::metadata(path) {
        Ok(meta) => !meta.is_dir() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
