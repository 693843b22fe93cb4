use crate::error::DomainError;

/// The object model scripts drive. Commands the interpreter does not know are
/// forwarded here.
pub trait Host: Send {
    /// Run `command` with its arguments and return its textual output.
    fn invoke(&mut self, command: &str, args: &[String]) -> Result<String, DomainError>;
}

impl<F> Host for F
where
    F: FnMut(&str, &[String]) -> Result<String, DomainError> + Send,
{
    fn invoke(&mut self, command: &str, args: &[String]) -> Result<String, DomainError> {
        self(command, args)
    }
}

/// Host without an object model: every command is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl Host for NoHost {
    fn invoke(&mut self, command: &str, _args: &[String]) -> Result<String, DomainError> {
        Err(DomainError {
            command: command.to_string(),
            message: format!("'{command}' is not recognized as a command"),
        })
    }
}
