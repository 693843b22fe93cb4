use std::io;

/// Compiler diagnostic. Position is 1-based when known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", position(.line, .column), .message)]
pub struct Diagnostic {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            message: message.into(),
        }
    }
}

fn position(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!("line {line}, column {column}: "),
        (Some(line), None) => format!("line {line}: "),
        _ => String::new(),
    }
}

/// Unhandled exception raised while the script runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line})")]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
}

/// Failure raised by the object model a script drives.
///
/// Reported where it happens; never stops the debugger by itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{command}: {message}")]
pub struct DomainError {
    pub command: String,
    pub message: String,
}

/// Failures kept as the controller's "last exception".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("compile error: {0}")]
    Compile(#[from] Diagnostic),

    #[error("unhandled exception: {0}")]
    Runtime(#[from] RuntimeError),

    /// The worker thread went away without reporting an outcome.
    #[error("script worker terminated unexpectedly")]
    WorkerLost,
}

/// Errors returned by controller commands.
#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    #[error("a script is already executing")]
    AlreadyRunning,

    #[error(transparent)]
    Compile(#[from] Diagnostic),

    #[error("failed to spawn script worker: {0}")]
    Spawn(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_shows_known_position() {
        assert_eq!(
            Diagnostic::at(2, 6, "unknown label 'missing'").to_string(),
            "line 2, column 6: unknown label 'missing'"
        );
        let line_only = Diagnostic {
            line: Some(4),
            ..Diagnostic::new("bad")
        };
        assert_eq!(line_only.to_string(), "line 4: bad");
        assert_eq!(Diagnostic::new("empty script").to_string(), "empty script");
        assert_eq!(
            ScriptError::from(Diagnostic::at(1, 1, "x")).to_string(),
            "compile error: line 1, column 1: x"
        );
    }
}
