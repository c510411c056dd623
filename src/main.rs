use argh::FromArgs;
use minish::{Interpreter, repl};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A small interactive shell.
struct Options {
    /// run this line instead of reading from the terminal, then exit with its status.
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// history file loaded at startup and appended to on exit (default: $HISTFILE).
    #[argh(option)]
    histfile: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("MINISH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Process exit statuses are a single byte.
fn process_status(code: i32) -> std::process::ExitCode {
    std::process::ExitCode::from((code & 0xff) as u8)
}

fn main() -> std::process::ExitCode {
    let options: Options = argh::from_env();
    init_logging();

    let mut sh = Interpreter::default();

    if let Some(line) = options.command {
        return process_status(sh.execute_line(&line).exit_code());
    }

    let histfile = options.histfile.or_else(|| {
        sh.env()
            .get_var("HISTFILE")
            .filter(|f| !f.is_empty())
            .map(PathBuf::from)
    });
    tracing::debug!(?histfile, "starting interactive session");

    match repl::run(&mut sh, histfile) {
        Ok(code) => process_status(code),
        Err(e) => {
            eprintln!("minish: {}", e);
            process_status(1)
        }
    }
}
