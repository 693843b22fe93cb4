use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use script_debugger::error::{RuntimeError, ScriptError};
use script_debugger::executor::{BatchEngine, OutputSink, ScriptEngine};

#[derive(Clone, Default)]
struct Output(Arc<Mutex<String>>);

impl OutputSink for Output {
    fn write(&mut self, text: &str) {
        self.0.lock().push_str(text);
    }
}

fn run(source: &str) -> (Result<(), ScriptError>, String) {
    let out = Output::default();
    let mut engine = BatchEngine::new();
    engine.set_output(Box::new(out.clone()));
    let result = engine.compile_and_run(source);
    let text = out.0.lock().clone();
    (result, text)
}

#[test]
fn continued_lines_join_into_one_statement() {
    let (result, out) = run("echo one^\ntwo^\nthree\necho done\n");
    result.unwrap();
    assert_eq!(out, "one two three\ndone\n");
}

#[test]
fn arithmetic_reads_variables() {
    let (result, out) = run("set /a A=6\nset /a B=(A + 4) * 3 %% 7\necho %A% %B%\n");
    result.unwrap();
    assert_eq!(out, "6 2\n");
}

#[test]
fn setlocal_scopes_variables_to_the_frame() {
    let script = "set NAME=outer
call :inner
echo %NAME%
goto :eof
:inner
setlocal
set NAME=inner
echo %NAME%
endlocal
echo %NAME%
";
    let (result, out) = run(script);
    result.unwrap();
    assert_eq!(out, "inner\nouter\nouter\n");
}

#[test]
fn conditionals_and_goto() {
    let script = "set X=1
if not %X%==1 echo wrong
if %X%==1 goto skip
echo skipped
:skip
if errorlevel 0 echo level
";
    let (result, out) = run(script);
    result.unwrap();
    assert_eq!(out, "level\n");
}

#[test]
fn unknown_command_without_host_is_not_fatal() {
    let (result, out) = run("explode now\necho %ERRORLEVEL%\n");
    result.unwrap();
    assert_eq!(out, "explode: 'explode' is not recognized as a command\n1\n");
}

#[test]
fn deeply_nested_arithmetic_is_a_runtime_error() {
    let script = format!("set /a X={}1{}\necho never\n", "(".repeat(5_000), ")".repeat(5_000));
    let (result, out) = run(&script);
    assert_eq!(
        result,
        Err(ScriptError::Runtime(RuntimeError {
            line: 1,
            message: "Expression too complex.".to_string(),
        }))
    );
    assert_eq!(out, "");
}
