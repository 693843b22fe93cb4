//! Interactive front ends for the binary: a console UI and a JSON event
//! stream, both steered by the same command loop.

mod console;
mod json;

pub use console::ConsoleSink;
pub use json::JsonSink;

use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::debugger::{Breakpoints, Controller, DebugSink, Stop};
use crate::executor::ScriptEngine;
use crate::trace::Bindings;

pub const HELP: &str = "Commands: (s)tepInto, (n)ext/stepOver, (o)ut/stepOut, (c)ontinue to breakpoint, \
(r)un to end, (b) <line> toggle breakpoint, (bl) list breakpoints, (l)ocals, (g)lobals, (h)elp, (q)uit";

/// One line typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StepInto,
    StepOver,
    StepOut,
    Continue,
    RunToEnd,
    ToggleBreakpoint(usize),
    ListBreakpoints,
    Locals,
    Globals,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Invalid line number: {0}")]
    BadLine(String),
}

impl Command {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let cmd = input.trim();
        let cmd = match cmd {
            // Empty input steps into.
            "" | "s" | "stepIn" | "stepInto" => Self::StepInto,
            "n" | "next" | "stepOver" => Self::StepOver,
            "o" | "out" | "stepOut" => Self::StepOut,
            "c" | "continue" => Self::Continue,
            "r" | "run" => Self::RunToEnd,
            "bl" => Self::ListBreakpoints,
            "l" | "locals" => Self::Locals,
            "g" | "globals" => Self::Globals,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" => Self::Quit,
            cmd if cmd.starts_with("b ") => {
                let arg = cmd[2..].trim();
                match arg.parse::<usize>() {
                    Ok(line) if line > 0 => Self::ToggleBreakpoint(line),
                    _ => return Err(ParseError::BadLine(arg.to_string())),
                }
            }
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

/// Prompt for commands on `input` until the script finishes. Replies that are
/// not sink notifications (help, listings) go to `reply`.
///
/// End of input lets the script run to its end. Returns `false` if the user
/// quit while the script was still halted.
pub fn command_loop<E, S, R, W>(
    ctl: &mut Controller<E, S>,
    breakpoints: &Breakpoints,
    mut input: R,
    mut reply: W,
) -> io::Result<bool>
where
    E: ScriptEngine,
    S: DebugSink,
    R: BufRead,
    W: Write,
{
    loop {
        if ctl.wait() == Stop::Finished {
            return Ok(true);
        }

        write!(reply, "> ")?;
        reply.flush()?;
        let mut buf = String::new();
        if input.read_line(&mut buf)? == 0 {
            debug!("input closed; running to end");
            ctl.run_to_end();
            continue;
        }

        let cmd = match Command::parse(&buf) {
            Ok(cmd) => cmd,
            Err(err) => {
                writeln!(reply, "❓ {err}")?;
                continue;
            }
        };
        debug!(?cmd, "command");

        match cmd {
            Command::StepInto => {
                ctl.step_into();
            }
            Command::StepOver => {
                ctl.step_over();
            }
            Command::StepOut => {
                ctl.step_out();
            }
            Command::Continue => {
                ctl.run_to_breakpoint();
            }
            Command::RunToEnd => {
                ctl.run_to_end();
            }
            Command::ToggleBreakpoint(line) => {
                let set = breakpoints.toggle(line);
                let state = if set { "set at" } else { "removed from" };
                writeln!(reply, "Breakpoint {state} line {line}")?;
            }
            Command::ListBreakpoints => {
                let lines = breakpoints.lines();
                if lines.is_empty() {
                    writeln!(reply, "No breakpoints")?;
                } else {
                    let list: Vec<String> = lines.iter().map(usize::to_string).collect();
                    writeln!(reply, "Breakpoints: {}", list.join(", "))?;
                }
            }
            Command::Locals => {
                let locals = ctl.current_frame().map(|f| f.locals.clone()).unwrap_or_default();
                print_bindings(&mut reply, "Locals", &locals)?;
            }
            Command::Globals => {
                let globals = ctl.current_frame().map(|f| f.globals.clone()).unwrap_or_default();
                print_bindings(&mut reply, "Globals", &globals)?;
            }
            Command::Help => writeln!(reply, "{HELP}")?,
            Command::Quit => return Ok(false),
        }
    }
}

fn print_bindings(out: &mut impl Write, title: &str, vars: &Bindings) -> io::Result<()> {
    if vars.is_empty() {
        writeln!(out, "\n=== {title}: <none> ===")?;
        return Ok(());
    }
    writeln!(out, "\n=== {title} ===")?;
    for (key, val) in vars {
        writeln!(out, "  {key}={val}")?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::Recorder;
    use crate::executor::BatchEngine;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(Command::parse(""), Ok(Command::StepInto));
        assert_eq!(Command::parse("next\n"), Ok(Command::StepOver));
        assert_eq!(Command::parse("o"), Ok(Command::StepOut));
        assert_eq!(Command::parse("b 12"), Ok(Command::ToggleBreakpoint(12)));
        assert_eq!(Command::parse("b x"), Err(ParseError::BadLine("x".into())));
        assert_eq!(Command::parse("b 0"), Err(ParseError::BadLine("0".into())));
        assert_eq!(Command::parse("zap"), Err(ParseError::Unknown("zap".into())));
    }

    #[test]
    fn loop_drives_script_to_completion() {
        let breakpoints = Breakpoints::new();
        let mut ctl = Controller::new(BatchEngine::new(), Recorder::new(), breakpoints.clone());
        ctl.debug("set A=1\necho %A%\necho done\n").unwrap();

        let input = "s\nl\ng\nb 3\nbl\nc\nr\n".as_bytes();
        let mut reply = Vec::new();
        let finished = command_loop(&mut ctl, &breakpoints, input, &mut reply).unwrap();

        assert!(finished);
        assert_eq!(ctl.sink().output(), "1\ndone\n");
        let reply = String::from_utf8(reply).unwrap();
        assert!(reply.contains("Breakpoint set at line 3"));
        assert!(reply.contains("Breakpoints: 3"));
        assert!(reply.contains("ERRORLEVEL=0"));
        let lines: Vec<usize> = ctl.sink().steps().map(|(_, f)| f.line).collect();
        // every traced event: the call, each line, the return
        assert_eq!(lines, vec![1, 1, 2, 3, 3]);
    }

    #[test]
    fn end_of_input_runs_to_end() {
        let breakpoints = Breakpoints::new();
        let mut ctl = Controller::new(BatchEngine::new(), Recorder::new(), breakpoints.clone());
        ctl.debug("echo a\n").unwrap();

        let finished = command_loop(&mut ctl, &breakpoints, io::empty(), io::sink()).unwrap();
        assert!(finished);
        assert_eq!(ctl.sink().count_finished(), 1);
    }
}
