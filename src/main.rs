use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use script_debugger::debugger::{Breakpoints, Controller, DebugSink};
use script_debugger::error::DebugError;
use script_debugger::executor::BatchEngine;
use script_debugger::frontend::{command_loop, ConsoleSink, JsonSink, HELP};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "script-debugger")]
#[command(about = "Step debugger for batch-style scripts")]
struct Cli {
    /// Script to execute
    script: PathBuf,

    /// Run without stopping
    #[arg(long)]
    run: bool,

    /// Emit debugger events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Breakpoint line (repeatable)
    #[arg(short = 'b', long = "break", value_name = "LINE")]
    breakpoints: Vec<usize>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Debug(#[from] DebugError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_thread_names(true)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        // Already reported through the sink.
        Err(CliError::Debug(DebugError::Compile(_))) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let source = fs::read_to_string(&cli.script).map_err(|source| CliError::Read {
        path: cli.script.clone(),
        source,
    })?;
    info!(script = %cli.script.display(), "loaded script");

    let breakpoints = Breakpoints::new();
    for &line in &cli.breakpoints {
        breakpoints.add(line);
    }

    let sink: Box<dyn DebugSink> = if cli.json {
        Box::new(JsonSink::stdout())
    } else {
        Box::new(ConsoleSink::stdio(&source))
    };
    let mut ctl = Controller::new(BatchEngine::new(), sink, breakpoints.clone());

    if cli.run {
        ctl.run(&source)?;
        ctl.wait();
    } else {
        ctl.debug(&source)?;
        if !cli.json {
            eprintln!("{HELP}");
        }
        let stdin = io::stdin();
        if !command_loop(&mut ctl, &breakpoints, stdin.lock(), io::stderr())? {
            return Ok(ExitCode::SUCCESS);
        }
    }

    Ok(match ctl.last_error() {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    })
}
