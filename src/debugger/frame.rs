use serde::Serialize;

use crate::trace::{Bindings, CodeId, ExceptionInfo, Frame, TraceEvent};

/// Display-safe copy of a [`Frame`], safe to keep after the trace callback
/// that produced it has returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub function: String,
    pub code: CodeId,
    pub line: usize,
    pub first_line: usize,
    pub locals: Bindings,
    pub globals: Bindings,
}

impl FrameSummary {
    pub fn capture(frame: &dyn Frame) -> Self {
        Self {
            function: frame.function_name().to_string(),
            code: frame.code_id(),
            line: frame.line(),
            first_line: frame.first_line(),
            locals: frame.locals(),
            globals: frame.globals(),
        }
    }
}

/// Event-specific data of a halted trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    None,
    ReturnValue { value: String },
    Exception(ExceptionInfo),
}

impl Payload {
    pub fn capture(event: &TraceEvent<'_>) -> Self {
        match *event {
            TraceEvent::Return(_, Some(value)) => Self::ReturnValue {
                value: value.to_string(),
            },
            TraceEvent::Exception(_, info) => Self::Exception(info.clone()),
            _ => Self::None,
        }
    }
}
