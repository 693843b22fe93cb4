use crate::error::Diagnostic;
use crate::parser::{build_label_map, classify, preprocess, split_args, strip_keyword, LineKind};
use crate::trace::CodeId;

/// GOTO destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    /// `GOTO :EOF`, leaves the current frame.
    Eof,
    /// Index of the next statement to execute.
    To(usize),
}

/// Condition of a single-line `IF`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cond {
    /// `lhs==rhs`, compared after expansion.
    Equals { lhs: String, rhs: String },
    /// `ERRORLEVEL n`: true when ERRORLEVEL >= n.
    ErrorLevel(i64),
}

/// Compiled statement. Text fields hold unexpanded source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Nop,
    Echo(String),
    Set { name: String, value: String },
    Arith { name: String, expr: String },
    SetLocal,
    EndLocal,
    Call {
        label: String,
        code: CodeId,
        first_line: usize,
        target: usize,
        args: String,
    },
    Exit(Option<String>),
    Goto(Jump),
    If {
        negate: bool,
        cond: Cond,
        then: Box<Op>,
    },
    Throw(String),
    Host { command: String, args: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub op: Op,
}

/// A compiled script.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

struct Label {
    name: String,
    code: CodeId,
    line: usize,
    target: usize,
}

struct LineCtx<'a> {
    raw: &'a str,
    line: usize,
    labels: &'a [(String, Label)],
}

impl LineCtx<'_> {
    fn error_at(&self, token: &str, message: impl Into<String>) -> Diagnostic {
        let column = self
            .raw
            .find(token)
            .map_or(1, |i| self.raw[..i].chars().count() + 1);
        Diagnostic::at(self.line, column, message)
    }

    fn label(&self, name: &str) -> Option<&Label> {
        let key = name.to_lowercase();
        self.labels.iter().find(|(k, _)| *k == key).map(|(_, l)| l)
    }
}

impl Program {
    /// Compile script source.
    pub fn compile(source: &str) -> Result<Self, Diagnostic> {
        let lines = preprocess(source);

        // statements preceding each logical line
        let mut before = Vec::with_capacity(lines.len());
        let mut count = 0usize;
        for line in &lines {
            before.push(count);
            if matches!(classify(&line.text), LineKind::Statement(_)) {
                count += 1;
            }
        }

        let mut labels: Vec<(String, Label)> = build_label_map(&lines)
            .into_iter()
            .map(|(key, idx)| {
                let name = match classify(&lines[idx].text) {
                    LineKind::Label(name) => name.to_string(),
                    _ => key.clone(),
                };
                let label = Label {
                    name,
                    code: CodeId(0),
                    line: lines[idx].line,
                    target: before[idx],
                };
                (key, label)
            })
            .collect();
        labels.sort_by_key(|(_, l)| l.line);
        for (i, (_, label)) in labels.iter_mut().enumerate() {
            label.code = CodeId(i + 1);
        }

        let mut statements = Vec::with_capacity(count);
        for line in &lines {
            if let LineKind::Statement(text) = classify(&line.text) {
                let ctx = LineCtx {
                    raw: &line.text,
                    line: line.line,
                    labels: &labels,
                };
                statements.push(Statement {
                    line: line.line,
                    op: parse_op(text, &ctx)?,
                });
            }
        }

        Ok(Self { statements })
    }
}

fn parse_op(text: &str, ctx: &LineCtx<'_>) -> Result<Op, Diagnostic> {
    let text = text.trim_start_matches('@').trim();

    if text.eq_ignore_ascii_case("echo.") {
        return Ok(Op::Echo(String::new()));
    }
    if let Some(rest) = strip_keyword(text, "ECHO") {
        if rest.eq_ignore_ascii_case("off") || rest.eq_ignore_ascii_case("on") {
            return Ok(Op::Nop);
        }
        return Ok(Op::Echo(rest.to_string()));
    }
    if strip_keyword(text, "SETLOCAL").is_some() {
        return Ok(Op::SetLocal);
    }
    if strip_keyword(text, "ENDLOCAL").is_some() {
        return Ok(Op::EndLocal);
    }
    if let Some(rest) = strip_keyword(text, "SET") {
        return parse_set(rest, ctx);
    }
    if let Some(rest) = strip_keyword(text, "CALL") {
        return parse_call(rest, ctx);
    }
    if let Some(rest) = strip_keyword(text, "EXIT") {
        return parse_exit(rest, ctx);
    }
    if let Some(rest) = strip_keyword(text, "GOTO") {
        return parse_goto(rest, ctx);
    }
    if let Some(rest) = strip_keyword(text, "IF") {
        return parse_if(rest, ctx);
    }
    if let Some(rest) = strip_keyword(text, "THROW") {
        return Ok(Op::Throw(rest.to_string()));
    }

    let (command, args) = split_first_word(text);
    Ok(Op::Host {
        command: command.to_string(),
        args: args.to_string(),
    })
}

fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    }
}

fn parse_set(rest: &str, ctx: &LineCtx<'_>) -> Result<Op, Diagnostic> {
    let (arith, assignment) = match strip_keyword(rest, "/A") {
        Some(expr) => (true, expr),
        None => (false, rest),
    };

    let Some((name, value)) = assignment.split_once('=') else {
        return Err(ctx.error_at(rest, "SET requires NAME=value"));
    };
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(ctx.error_at(assignment, "invalid variable name in SET"));
    }

    if arith {
        if value.trim().is_empty() {
            return Err(ctx.error_at(assignment, "SET /A requires an expression"));
        }
        Ok(Op::Arith {
            name: name.to_string(),
            expr: value.trim().to_string(),
        })
    } else {
        Ok(Op::Set {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

fn parse_call(rest: &str, ctx: &LineCtx<'_>) -> Result<Op, Diagnostic> {
    let (target, args) = split_first_word(rest);
    let Some(name) = target.strip_prefix(':') else {
        return Err(ctx.error_at(
            if target.is_empty() { "CALL" } else { target },
            "CALL expects a :label target",
        ));
    };
    let Some(label) = ctx.label(name) else {
        return Err(ctx.error_at(target, format!("unknown label '{name}'")));
    };
    if split_args(args).is_none() {
        return Err(ctx.error_at(args, "unbalanced quotes in CALL arguments"));
    }

    Ok(Op::Call {
        label: label.name.clone(),
        code: label.code,
        first_line: label.line,
        target: label.target,
        args: args.to_string(),
    })
}

fn parse_exit(rest: &str, ctx: &LineCtx<'_>) -> Result<Op, Diagnostic> {
    let Some(code) = strip_keyword(rest, "/B") else {
        return Err(ctx.error_at("EXIT", "only EXIT /B is supported"));
    };
    if code.is_empty() {
        return Ok(Op::Exit(None));
    }
    if !code.contains('%') && code.parse::<i64>().is_err() {
        return Err(ctx.error_at(code, format!("invalid exit code '{code}'")));
    }
    Ok(Op::Exit(Some(code.to_string())))
}

fn parse_goto(rest: &str, ctx: &LineCtx<'_>) -> Result<Op, Diagnostic> {
    let target = rest.split_whitespace().next().unwrap_or("");
    let name = target.trim_start_matches(':');
    if name.is_empty() {
        return Err(ctx.error_at("GOTO", "GOTO requires a label"));
    }
    if name.eq_ignore_ascii_case("eof") {
        return Ok(Op::Goto(Jump::Eof));
    }
    match ctx.label(name) {
        Some(label) => Ok(Op::Goto(Jump::To(label.target))),
        None => Err(ctx.error_at(target, format!("unknown label '{name}'"))),
    }
}

/// Take one IF operand: a quoted string (quotes kept) or a bare word ending at
/// whitespace or `==`.
fn take_operand<'a>(text: &'a str, ctx: &LineCtx<'_>) -> Result<(&'a str, &'a str), Diagnostic> {
    if let Some(inner) = text.strip_prefix('"') {
        let Some(end) = inner.find('"') else {
            return Err(ctx.error_at(text, "unterminated string in IF"));
        };
        return Ok((&text[..end + 2], &text[end + 2..]));
    }
    let end = text
        .char_indices()
        .find(|&(i, c)| c.is_whitespace() || text[i..].starts_with("=="))
        .map_or(text.len(), |(i, _)| i);
    Ok((&text[..end], &text[end..]))
}

fn parse_if(rest: &str, ctx: &LineCtx<'_>) -> Result<Op, Diagnostic> {
    let (negate, rest) = match strip_keyword(rest, "NOT") {
        Some(r) => (true, r),
        None => (false, rest),
    };

    let (cond, tail) = if let Some(r) = strip_keyword(rest, "ERRORLEVEL") {
        let (level, tail) = split_first_word(r);
        let level = level
            .parse::<i64>()
            .map_err(|_| ctx.error_at(r, "IF ERRORLEVEL requires a number"))?;
        (Cond::ErrorLevel(level), tail)
    } else {
        let (lhs, after) = take_operand(rest, ctx)?;
        let Some(after) = after.trim_start().strip_prefix("==") else {
            return Err(ctx.error_at(rest, "IF expects lhs==rhs"));
        };
        let (rhs, tail) = take_operand(after.trim_start(), ctx)?;
        if lhs.is_empty() || rhs.is_empty() {
            return Err(ctx.error_at(rest, "IF expects lhs==rhs"));
        }
        let cond = Cond::Equals {
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        };
        (cond, tail.trim_start())
    };

    if tail.is_empty() {
        return Err(ctx.error_at("IF", "IF requires a command"));
    }

    Ok(Op::If {
        negate,
        cond,
        then: Box::new(parse_op(tail, ctx)?),
    })
}
