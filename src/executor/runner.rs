use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use super::arith;
use super::host::{Host, NoHost};
use super::program::{Cond, Jump, Op, Program};
use super::{OutputSink, ScriptEngine, StdoutSink};
use crate::error::{Diagnostic, RuntimeError};
use crate::parser::{expand, split_args};
use crate::trace::{Bindings, CodeId, ExceptionInfo, Frame, TraceCallback, TraceEvent, TraceFlow};

const MAIN: &str = "<main>";

/// One active invocation.
struct ActiveFrame {
    code: CodeId,
    name: String,
    first_line: usize,
    line: usize,
    args: Vec<String>,
    /// Variables scoped by SETLOCAL, if active in this frame.
    locals: Option<BTreeMap<String, String>>,
    return_to: usize,
}

/// Interpreter state for one run.
struct Machine {
    globals: BTreeMap<String, String>,
    frames: Vec<ActiveFrame>,
}

impl Machine {
    fn new() -> Self {
        let mut globals = BTreeMap::new();
        globals.insert("ERRORLEVEL".to_string(), "0".to_string());
        Self {
            globals,
            frames: vec![ActiveFrame {
                code: CodeId(0),
                name: MAIN.to_string(),
                first_line: 1,
                line: 1,
                args: Vec::new(),
                locals: None,
                return_to: 0,
            }],
        }
    }

    fn top(&self) -> &ActiveFrame {
        self.frames.last().expect("machine always has a frame while running")
    }

    fn top_mut(&mut self) -> &mut ActiveFrame {
        self.frames.last_mut().expect("machine always has a frame while running")
    }

    fn get(&self, name: &str) -> Option<String> {
        let key = name.to_uppercase();
        self.frames
            .iter()
            .rev()
            .filter_map(|f| f.locals.as_ref())
            .find_map(|vars| vars.get(&key))
            .or_else(|| self.globals.get(&key))
            .cloned()
    }

    fn set(&mut self, name: &str, value: String) {
        let key = name.to_uppercase();
        match self.top_mut().locals.as_mut() {
            Some(locals) => {
                locals.insert(key, value);
            }
            None => {
                self.globals.insert(key, value);
            }
        }
    }

    fn error_level(&self) -> i64 {
        self.globals
            .get("ERRORLEVEL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    fn set_error_level(&mut self, code: i64) {
        self.globals.insert("ERRORLEVEL".to_string(), code.to_string());
    }

    fn expand(&self, text: &str) -> String {
        expand(text, &self.top().args, |name| self.get(name))
    }
}

/// Borrowed view handed to the trace callback.
struct FrameView<'a> {
    frame: &'a ActiveFrame,
    globals: &'a BTreeMap<String, String>,
}

impl Frame for FrameView<'_> {
    fn line(&self) -> usize {
        self.frame.line
    }

    fn code_id(&self) -> CodeId {
        self.frame.code
    }

    fn function_name(&self) -> &str {
        &self.frame.name
    }

    fn first_line(&self) -> usize {
        self.frame.first_line
    }

    fn locals(&self) -> Bindings {
        let mut out: Bindings = self
            .frame
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| (format!("%{}", i + 1), arg.clone()))
            .collect();
        if let Some(locals) = &self.frame.locals {
            out.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }

    fn globals(&self) -> Bindings {
        self.globals.clone()
    }
}

/// Event to raise for the top frame.
enum Emit<'p> {
    Call,
    Line,
    Return(Option<&'p str>),
    Exception(&'p ExceptionInfo),
}

enum Flow {
    Next,
    Jump(usize),
    Call(ActiveFrame, usize),
    Return(Option<i64>),
}

/// Line-oriented interpreter for batch-flavoured scripts.
pub struct BatchEngine<H = NoHost> {
    host: H,
    trace: Option<Box<dyn TraceCallback>>,
    output: Box<dyn OutputSink>,
}

impl BatchEngine<NoHost> {
    pub fn new() -> Self {
        Self::with_host(NoHost)
    }
}

impl Default for BatchEngine<NoHost> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> BatchEngine<H> {
    pub fn with_host(host: H) -> Self {
        Self {
            host,
            trace: None,
            output: Box::new(StdoutSink),
        }
    }

    fn emit(&mut self, m: &Machine, what: Emit<'_>) {
        let Some(callback) = self.trace.as_mut() else {
            return;
        };
        let view = FrameView {
            frame: m.top(),
            globals: &m.globals,
        };
        let event = match what {
            Emit::Call => TraceEvent::Call(&view),
            Emit::Line => TraceEvent::Line(&view),
            Emit::Return(value) => TraceEvent::Return(&view, value),
            Emit::Exception(info) => TraceEvent::Exception(&view, info),
        };
        trace!(?event, "trace event");
        if callback.trace(event) == TraceFlow::Detach {
            debug!("trace callback detached");
            self.trace = None;
        }
    }

    /// Pop the top frame. Returns where the caller resumes, or `None` when
    /// the main frame has exited.
    fn leave(&mut self, m: &mut Machine, code: Option<i64>) -> Option<usize> {
        if let Some(code) = code {
            m.set_error_level(code);
        }
        let value = m.error_level().to_string();
        self.emit(m, Emit::Return(Some(&value)));
        let frame = m.frames.pop()?;
        if m.frames.is_empty() {
            None
        } else {
            Some(frame.return_to)
        }
    }

    fn unwind(&mut self, m: &mut Machine, error: &RuntimeError) {
        let info = ExceptionInfo {
            message: error.message.clone(),
            line: error.line,
        };
        self.emit(m, Emit::Exception(&info));
        while !m.frames.is_empty() {
            self.emit(m, Emit::Return(None));
            m.frames.pop();
        }
    }

    fn exec(&mut self, m: &mut Machine, op: &Op, pc: usize, line: usize) -> Result<Flow, RuntimeError> {
        let fail = |message: String| RuntimeError { line, message };

        match op {
            Op::Nop => {}
            Op::Echo(text) => {
                let text = m.expand(text);
                self.output.write(&format!("{text}\n"));
            }
            Op::Set { name, value } => {
                let value = m.expand(value);
                m.set(name, value);
            }
            Op::Arith { name, expr } => {
                let expr = m.expand(expr);
                let value = arith::evaluate(&expr, |var| {
                    m.get(var).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
                })
                .map_err(fail)?;
                m.set(name, value.to_string());
            }
            Op::SetLocal => {
                m.top_mut().locals.get_or_insert_with(BTreeMap::new);
            }
            Op::EndLocal => {
                m.top_mut().locals = None;
            }
            Op::Call {
                label,
                code,
                first_line,
                target,
                args,
            } => {
                let expanded = m.expand(args);
                let args = split_args(&expanded)
                    .ok_or_else(|| fail(format!("unbalanced quotes in arguments: {expanded}")))?;
                let frame = ActiveFrame {
                    code: *code,
                    name: label.clone(),
                    first_line: *first_line,
                    line: *first_line,
                    args,
                    locals: None,
                    return_to: pc + 1,
                };
                return Ok(Flow::Call(frame, *target));
            }
            Op::Exit(code) => {
                let code = match code {
                    Some(text) => {
                        let text = m.expand(text);
                        let code = text
                            .trim()
                            .parse::<i64>()
                            .map_err(|_| fail(format!("invalid exit code '{}'", text.trim())))?;
                        Some(code)
                    }
                    None => None,
                };
                return Ok(Flow::Return(code));
            }
            Op::Goto(Jump::Eof) => return Ok(Flow::Return(None)),
            Op::Goto(Jump::To(target)) => return Ok(Flow::Jump(*target)),
            Op::If { negate, cond, then } => {
                let holds = match cond {
                    Cond::Equals { lhs, rhs } => m.expand(lhs) == m.expand(rhs),
                    Cond::ErrorLevel(level) => m.error_level() >= *level,
                };
                if holds != *negate {
                    return self.exec(m, then, pc, line);
                }
            }
            Op::Throw(message) => return Err(fail(m.expand(message))),
            Op::Host { command, args } => {
                let expanded = m.expand(args);
                let args = split_args(&expanded).unwrap_or_else(|| vec![expanded.clone()]);
                match self.host.invoke(command, &args) {
                    Ok(out) => {
                        if !out.is_empty() {
                            let nl = if out.ends_with('\n') { "" } else { "\n" };
                            self.output.write(&format!("{out}{nl}"));
                        }
                        m.set_error_level(0);
                    }
                    Err(err) => {
                        warn!(%err, line, "host command failed");
                        self.output.domain_error(&err);
                        m.set_error_level(1);
                    }
                }
            }
        }

        Ok(Flow::Next)
    }

    fn execute(&mut self, program: &Program) -> Result<(), RuntimeError> {
        let mut m = Machine::new();
        if let Some(first) = program.statements.first() {
            m.top_mut().line = first.line;
        }
        self.emit(&m, Emit::Call);

        let mut pc = 0usize;
        loop {
            let Some(stmt) = program.statements.get(pc) else {
                // Running off the end returns from the current frame.
                match self.leave(&mut m, None) {
                    Some(next) => {
                        pc = next;
                        continue;
                    }
                    None => return Ok(()),
                }
            };

            m.top_mut().line = stmt.line;
            self.emit(&m, Emit::Line);

            match self.exec(&mut m, &stmt.op, pc, stmt.line) {
                Ok(Flow::Next) => pc += 1,
                Ok(Flow::Jump(target)) => pc = target,
                Ok(Flow::Call(frame, target)) => {
                    m.frames.push(frame);
                    self.emit(&m, Emit::Call);
                    pc = target;
                }
                Ok(Flow::Return(code)) => match self.leave(&mut m, code) {
                    Some(next) => pc = next,
                    None => return Ok(()),
                },
                Err(err) => {
                    self.unwind(&mut m, &err);
                    return Err(err);
                }
            }
        }
    }
}

impl<H: Host + 'static> ScriptEngine for BatchEngine<H> {
    type Program = Program;

    fn compile(&mut self, source: &str) -> Result<Program, Diagnostic> {
        Program::compile(source)
    }

    fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        self.execute(program)
    }

    fn set_trace(&mut self, callback: Option<Box<dyn TraceCallback>>) {
        self.trace = callback;
    }

    fn set_output(&mut self, sink: Box<dyn OutputSink>) {
        self.output = sink;
    }
}
