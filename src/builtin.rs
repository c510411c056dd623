use crate::command::{CommandFactory, ExecutableCommand, ExitCode, StdStreams};
use crate::env::Environment;
use crate::external::find_command_path;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is printed on `stderr` prefixed with the command name and becomes status 1.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: StdStreams, env: &mut Environment) -> Result<ExitCode> {
        let StdStreams {
            mut stdout,
            mut stderr,
            ..
        } = io;
        let code = match T::execute(*self, &mut stdout, &mut stderr, env) {
            Ok(x) => x,
            Err(e) => {
                writeln!(stderr, "{}: {:#}", T::name(), e)?;
                1
            }
        };
        stdout.flush()?;
        Ok(code)
    }
}

/// Usage text or argument error reported by argh instead of running the builtin.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: StdStreams, _env: &mut Environment) -> Result<ExitCode> {
        let StdStreams {
            mut stdout,
            mut stderr,
            ..
        } = io;
        if self.is_error {
            writeln!(stderr, "{}", self.output)?;
            Ok(1)
        } else {
            writeln!(stdout, "{}", self.output)?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + Send + Sync + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }

    fn builtin_name(&self) -> Option<&'static str> {
        Some(T::name())
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory or starting with `~`.
    pub target: Option<String>,
}

impl Cd {
    fn expand_target(&self, env: &Environment) -> Option<PathBuf> {
        match self.target.as_deref() {
            None | Some("") | Some("~") => env.home_dir(),
            Some(t) => match t.strip_prefix("~/") {
                Some(rest) => env.home_dir().map(|home| home.join(rest)),
                None => Some(PathBuf::from(t)),
            },
        }
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let shown = self.target.clone().unwrap_or_else(|| "~".to_string());
        let Some(target) = self.expand_target(env) else {
            writeln!(stderr, "cd: HOME not set")?;
            return Ok(1);
        };

        // An absolute target replaces the current directory when joined.
        let new_dir = env.current_dir.join(target);
        match fs::canonicalize(&new_dir) {
            Ok(dir) if dir.is_dir() => {
                env.current_dir = dir;
                Ok(0)
            }
            _ => {
                writeln!(stderr, "cd: {}: No such file or directory", shown)?;
                Ok(1)
            }
        }
    }
}

/// Exit the shell with the given status (0 when omitted).
pub struct Exit {
    pub code: Option<String>,
}

// Hand-written so that `exit -1` is taken as a status rather than an option.
impl FromArgs for Exit {
    fn from_args(command_name: &[&str], args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        match args {
            [] => Ok(Exit { code: None }),
            [code] => Ok(Exit {
                code: Some(code.to_string()),
            }),
            _ => Err(EarlyExit {
                output: format!("{}: too many arguments", command_name.join(" ")),
                status: Err(()),
            }),
        }
    }
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match self.code {
            None => 0,
            Some(raw) => match raw.trim().parse::<ExitCode>() {
                Ok(code) => code,
                Err(_) => {
                    writeln!(stderr, "exit: {}: numeric argument required", raw)?;
                    2
                }
            },
        };
        env.exit_request = Some(code);
        Ok(code)
    }
}

/// Write the arguments to standard output, separated by single spaces and
/// followed by a newline.
///
/// No option parsing: every argument, including ones starting with `-`, is
/// printed as-is.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Display how each name would be interpreted if used as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let search_paths = env.search_paths();
        let mut code = 0;
        for name in &self.names {
            if env.is_builtin(name) {
                writeln!(stdout, "{} is a shell builtin", name)?;
            } else if let Some(path) = find_command_path(&search_paths, &env.current_dir, name) {
                writeln!(stdout, "{} is {}", name, path.display())?;
            } else {
                writeln!(stderr, "{}: not found", name)?;
                code = 1;
            }
        }
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Display the session history, or read, write or append it to a file.
pub struct HistoryCmd {
    #[argh(option, short = 'r')]
    /// append the lines of this file to the session history.
    pub read: Option<String>,

    #[argh(option, short = 'w')]
    /// overwrite this file with the whole session history.
    pub write: Option<String>,

    #[argh(option, short = 'a')]
    /// append the lines entered since the last append to this file.
    pub append: Option<String>,

    #[argh(positional)]
    /// show only the last N entries.
    pub count: Option<usize>,
}

impl BuiltinCommand for HistoryCmd {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if let Some(file) = &self.read {
            let path = env.current_dir.join(file);
            let loaded = env.history.read_from(&path).with_context(|| file.clone())?;
            tracing::debug!(loaded, file = %path.display(), "history loaded");
            return Ok(0);
        }
        if let Some(file) = &self.write {
            let path = env.current_dir.join(file);
            env.history.write_to(&path).with_context(|| file.clone())?;
            return Ok(0);
        }
        if let Some(file) = &self.append {
            let path = env.current_dir.join(file);
            env.history.append_to(&path).with_context(|| file.clone())?;
            return Ok(0);
        }

        for (number, line) in env.history.numbered(self.count) {
            writeln!(stdout, "{:>5}  {}", number, line)?;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use std::collections::{BTreeSet, HashMap};
    use std::env as stdenv;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_env(current_dir: PathBuf) -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir,
            builtins: ["cd", "echo", "exit", "history", "pwd", "type"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<_>>(),
            history: History::new(),
            exit_request: None,
        }
    }

    fn run<T: BuiltinCommand>(cmd: T, env: &mut Environment) -> (ExitCode, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = cmd.execute(&mut out, &mut err, env).unwrap();
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = stdenv::temp_dir().join(format!(
            "minish_builtin_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&p).unwrap();
        fs::canonicalize(&p).unwrap()
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let cur = make_unique_temp_dir("pwd");
        let mut env = test_env(cur.clone());

        let (code, out, _) = run(Pwd {}, &mut env);

        assert_eq!(code, 0);
        assert_eq!(out, format!("{}\n", cur.display()));
        let _ = fs::remove_dir_all(cur);
    }

    #[test]
    fn test_echo_joins_with_single_space() {
        let mut env = test_env(stdenv::temp_dir());
        let echo = Echo::from_args(&["echo"], &["hello", "-n", "world"]).unwrap();

        let (code, out, _) = run(echo, &mut env);

        assert_eq!(code, 0);
        assert_eq!(out, "hello -n world\n");
    }

    #[test]
    fn test_echo_without_args_prints_newline() {
        let mut env = test_env(stdenv::temp_dir());
        let (_, out, _) = run(Echo { args: Vec::new() }, &mut env);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let temp = make_unique_temp_dir("cd_abs");
        let mut env = test_env(stdenv::temp_dir());

        let target = Some(temp.to_string_lossy().to_string());
        let (code, _, err) = run(Cd { target }, &mut env);

        assert_eq!(code, 0, "stderr: {err}");
        assert_eq!(env.current_dir, temp);
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn test_cd_relative_and_parent() {
        let temp = make_unique_temp_dir("cd_rel");
        fs::create_dir_all(temp.join("inner")).unwrap();
        let mut env = test_env(temp.clone());

        let (code, _, _) = run(
            Cd {
                target: Some("inner".to_string()),
            },
            &mut env,
        );
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, temp.join("inner"));

        let (code, _, _) = run(
            Cd {
                target: Some("..".to_string()),
            },
            &mut env,
        );
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, temp);
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn test_cd_to_home_when_none_or_tilde() {
        let home = make_unique_temp_dir("cd_home");
        fs::create_dir_all(home.join("docs")).unwrap();
        let mut env = test_env(stdenv::temp_dir());
        env.set_var("HOME", home.to_string_lossy().to_string());

        let (code, _, _) = run(Cd { target: None }, &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, home);

        env.current_dir = stdenv::temp_dir();
        let (code, _, _) = run(
            Cd {
                target: Some("~".to_string()),
            },
            &mut env,
        );
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, home);

        let (code, _, _) = run(
            Cd {
                target: Some("~/docs".to_string()),
            },
            &mut env,
        );
        assert_eq!(code, 0);
        assert_eq!(env.current_dir, home.join("docs"));
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn test_cd_nonexistent_path_reports_and_keeps_dir() {
        let orig = stdenv::temp_dir();
        let mut env = test_env(orig.clone());

        let name = format!("nonexistent_dir_for_minish_test_{}", std::process::id());
        let (code, _, err) = run(
            Cd {
                target: Some(name.clone()),
            },
            &mut env,
        );

        assert_eq!(code, 1);
        assert_eq!(err, format!("cd: {}: No such file or directory\n", name));
        assert_eq!(env.current_dir, orig);
        assert!(env.exit_request.is_none());
    }

    #[test]
    fn test_cd_into_file_fails() {
        let temp = make_unique_temp_dir("cd_file");
        fs::write(temp.join("file"), "x").unwrap();
        let mut env = test_env(temp.clone());

        let (code, _, err) = run(
            Cd {
                target: Some("file".to_string()),
            },
            &mut env,
        );
        assert_eq!(code, 1);
        assert!(err.contains("No such file or directory"));
        assert_eq!(env.current_dir, temp);
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn test_exit_records_request() {
        let mut env = test_env(stdenv::temp_dir());
        let (code, _, _) = run(Exit { code: None }, &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.exit_request, Some(0));

        let exit = Exit::from_args(&["exit"], &["42"]).unwrap();
        let (code, _, _) = run(exit, &mut env);
        assert_eq!(code, 42);
        assert_eq!(env.exit_request, Some(42));
    }

    #[test]
    fn test_exit_non_numeric() {
        let mut env = test_env(stdenv::temp_dir());
        let (code, _, err) = run(
            Exit {
                code: Some("abc".to_string()),
            },
            &mut env,
        );
        assert_eq!(code, 2);
        assert_eq!(env.exit_request, Some(2));
        assert_eq!(err, "exit: abc: numeric argument required\n");
        assert!(Exit::from_args(&["exit"], &["1", "2"]).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_type_builtin_external_and_missing() {
        let mut env = test_env(stdenv::temp_dir());
        env.set_var("PATH", "/bin:/usr/bin");

        let names = ["cd", "sh", "lsxyz_not_here"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (code, out, err) = run(Type { names }, &mut env);

        assert_eq!(code, 1);
        assert_eq!(out, "cd is a shell builtin\nsh is /bin/sh\n");
        assert_eq!(err, "lsxyz_not_here: not found\n");
    }

    #[test]
    fn test_history_lists_numbered_entries() {
        let mut env = test_env(stdenv::temp_dir());
        for line in ["echo a", "pwd", "history 2"] {
            env.history.push(line);
        }

        let all = HistoryCmd::from_args(&["history"], &[]).unwrap();
        let (_, out, _) = run(all, &mut env);
        assert_eq!(out, "    1  echo a\n    2  pwd\n    3  history 2\n");

        let last = HistoryCmd::from_args(&["history"], &["2"]).unwrap();
        let (_, out, _) = run(last, &mut env);
        assert_eq!(out, "    2  pwd\n    3  history 2\n");
    }

    #[test]
    fn test_history_write_append_read() {
        let dir = make_unique_temp_dir("history");
        let mut env = test_env(dir.clone());
        env.history.push("echo one");
        env.history.push("history -w hist.txt");

        let write = HistoryCmd::from_args(&["history"], &["-w", "hist.txt"]).unwrap();
        assert_eq!(run(write, &mut env).0, 0);
        assert_eq!(
            fs::read_to_string(dir.join("hist.txt")).unwrap(),
            "echo one\nhistory -w hist.txt\n"
        );

        env.history.push("echo two");
        env.history.push("history -a hist.txt");
        let append = HistoryCmd::from_args(&["history"], &["-a", "hist.txt"]).unwrap();
        assert_eq!(run(append, &mut env).0, 0);
        assert_eq!(
            fs::read_to_string(dir.join("hist.txt")).unwrap(),
            "echo one\nhistory -w hist.txt\necho two\nhistory -a hist.txt\n"
        );

        let mut fresh = test_env(dir.clone());
        let read = HistoryCmd::from_args(&["history"], &["-r", "hist.txt"]).unwrap();
        assert_eq!(run(read, &mut fresh).0, 0);
        assert_eq!(fresh.history.len(), 4);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_history_read_missing_file_is_error() {
        let mut env = test_env(make_unique_temp_dir("history_missing"));
        let read = HistoryCmd::from_args(&["history"], &["-r", "nope.txt"]).unwrap();
        assert!(
            read.execute(&mut Vec::<u8>::new(), &mut Vec::<u8>::new(), &mut env)
                .is_err()
        );
    }

    #[test]
    fn test_factory_reports_builtin_name_and_bad_args() {
        let factory = Factory::<HistoryCmd>::default();
        assert_eq!(factory.builtin_name(), Some("history"));

        let env = test_env(stdenv::temp_dir());
        assert!(factory.try_create(&env, "pwd", &[]).is_none());
        assert!(factory.try_create(&env, "history", &["--bogus"]).is_some());
    }
}
