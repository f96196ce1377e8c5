//! Ordered extraction strategies.
//!
//! Each backend obtains its parser through a fixed strategy order, every
//! strategy independent and side-effect free:
//!
//! 1. `intercepted-exec` — run the full module body under `__main__` with
//!    the parse-entry trap armed; success is the trap firing with the
//!    parser the script was about to use.
//! 2. `module-load` — run under the module's own name (main guards stay
//!    false) without the trap, then scan the namespace in insertion order
//!    for a parser object.
//! 3. `normalized-load` — strip unresolvable imports from the source,
//!    persist the regenerated text to a scoped temporary file, and repeat
//!    the module-load scan against it. The artifact is removed on every
//!    exit path when the file handle drops.
//!
//! Failures are recorded per strategy label; only when every strategy
//! fails does the backend report an [`ExtractionError`].

use std::io::Write;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ExtractionError, LoadError, StrategyFailure};
use crate::interp::{EvalOptions, Interpreter, ModuleResolver, Outcome, ParserRef, parse_module};
use crate::normalize::strip_unresolvable_imports;
use crate::source::ScriptSource;

pub const STRATEGY_INTERCEPT: &str = "intercepted-exec";
pub const STRATEGY_MODULE_LOAD: &str = "module-load";
pub const STRATEGY_NORMALIZED_LOAD: &str = "normalized-load";

/// A parser captured by one of the strategies, together with the
/// evaluation run that owns its arena.
#[derive(Debug)]
pub struct CapturedParser {
    pub interpreter: Interpreter,
    pub parser: ParserRef,
    pub strategy: &'static str,
}

/// A module docstring captured by the load strategies.
#[derive(Debug)]
pub struct CapturedDocstring {
    pub docstring: String,
    pub strategy: &'static str,
}

fn resolver_for(source: &ScriptSource) -> ModuleResolver {
    ModuleResolver::new(source.directory())
}

/// Captures a live parser from the script, trying every strategy in order.
pub fn capture_parser(source: &ScriptSource) -> Result<CapturedParser, ExtractionError> {
    let mut attempts = Vec::new();

    match intercepted_exec(source) {
        Ok(captured) => return Ok(captured),
        Err(error) => record(&mut attempts, STRATEGY_INTERCEPT, error),
    }
    match module_load(source) {
        Ok(captured) => return Ok(captured),
        Err(error) => record(&mut attempts, STRATEGY_MODULE_LOAD, error),
    }
    match normalized_load(source) {
        Ok(captured) => return Ok(captured),
        Err(error) => record(&mut attempts, STRATEGY_NORMALIZED_LOAD, error),
    }

    Err(ExtractionError { attempts })
}

/// Captures the module docstring, for backends that read declarations out
/// of documentation text rather than parser objects.
pub fn capture_docstring(source: &ScriptSource) -> Result<CapturedDocstring, ExtractionError> {
    let mut attempts = Vec::new();

    match docstring_load(source, source.text(), STRATEGY_MODULE_LOAD) {
        Ok(captured) => return Ok(captured),
        Err(error) => record(&mut attempts, STRATEGY_MODULE_LOAD, error),
    }

    match normalized_docstring_load(source) {
        Ok(captured) => return Ok(captured),
        Err(error) => record(&mut attempts, STRATEGY_NORMALIZED_LOAD, error),
    }

    Err(ExtractionError { attempts })
}

fn record(attempts: &mut Vec<StrategyFailure>, strategy: &'static str, error: LoadError) {
    debug!(strategy, error = %error, "extraction strategy failed");
    attempts.push(StrategyFailure {
        strategy,
        detail: error.to_string(),
    });
}

fn intercepted_exec(source: &ScriptSource) -> Result<CapturedParser, LoadError> {
    let module = parse_module(source.text())?;
    let options = EvalOptions {
        module_name: "__main__".to_string(),
        file_path: source.path().to_string_lossy().to_string(),
        trap_parse: true,
        ..EvalOptions::default()
    };
    let (interpreter, outcome) = Interpreter::execute(&module, resolver_for(source), options)?;

    match outcome {
        Outcome::Intercepted(parser) => Ok(CapturedParser {
            interpreter,
            parser,
            strategy: STRATEGY_INTERCEPT,
        }),
        Outcome::Completed => Err(LoadError::Other(
            "script completed without reaching the parse entry point".to_string(),
        )),
    }
}

fn load_module(
    source: &ScriptSource,
    text: &str,
    file_path: String,
) -> Result<Interpreter, LoadError> {
    let module = parse_module(text)?;
    let options = EvalOptions {
        module_name: source.stem().to_string(),
        file_path,
        trap_parse: false,
        ..EvalOptions::default()
    };
    let (interpreter, _) = Interpreter::execute(&module, resolver_for(source), options)?;
    Ok(interpreter)
}

fn scan_for_parser(
    interpreter: Interpreter,
    strategy: &'static str,
) -> Result<CapturedParser, LoadError> {
    match interpreter.first_parser() {
        Some(parser) => Ok(CapturedParser {
            interpreter,
            parser,
            strategy,
        }),
        None => Err(LoadError::Other(
            "no parser object found in the module namespace".to_string(),
        )),
    }
}

fn module_load(source: &ScriptSource) -> Result<CapturedParser, LoadError> {
    let interpreter = load_module(
        source,
        source.text(),
        source.path().to_string_lossy().to_string(),
    )?;
    scan_for_parser(interpreter, STRATEGY_MODULE_LOAD)
}

fn normalized_load(source: &ScriptSource) -> Result<CapturedParser, LoadError> {
    let (text, artifact) = normalize_to_artifact(source)?;
    let interpreter = load_module(source, &text, artifact.path().to_string_lossy().to_string())?;
    scan_for_parser(interpreter, STRATEGY_NORMALIZED_LOAD)
    // `artifact` drops here, removing the temporary file on every path.
}

fn docstring_load(
    source: &ScriptSource,
    text: &str,
    strategy: &'static str,
) -> Result<CapturedDocstring, LoadError> {
    let interpreter = load_module(source, text, source.path().to_string_lossy().to_string())?;
    match interpreter.docstring() {
        Some(doc) if !doc.trim().is_empty() => Ok(CapturedDocstring {
            docstring: doc.to_string(),
            strategy,
        }),
        _ => Err(LoadError::Other(
            "module defines no docstring".to_string(),
        )),
    }
}

fn normalized_docstring_load(source: &ScriptSource) -> Result<CapturedDocstring, LoadError> {
    let (text, _artifact) = normalize_to_artifact(source)?;
    docstring_load(source, &text, STRATEGY_NORMALIZED_LOAD)
}

fn normalize_to_artifact(source: &ScriptSource) -> Result<(String, NamedTempFile), LoadError> {
    let resolver = resolver_for(source);
    let text = strip_unresolvable_imports(source.text(), &resolver)?;

    let mut artifact =
        NamedTempFile::new().map_err(|e| LoadError::Other(format!("temp file: {e}")))?;
    artifact
        .write_all(text.as_bytes())
        .map_err(|e| LoadError::Other(format!("temp file: {e}")))?;

    Ok((text, artifact))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> ScriptSource {
        ScriptSource::new("/tmp/scripts/sample.py", text)
    }

    #[test]
    fn test_intercept_wins_when_script_parses() {
        let captured = capture_parser(&source(
            "import argparse\n\
             parser = argparse.ArgumentParser()\n\
             parser.add_argument('--x')\n\
             args = parser.parse_args()\n",
        ))
        .unwrap();
        assert_eq!(captured.strategy, STRATEGY_INTERCEPT);
    }

    #[test]
    fn test_module_load_covers_scripts_that_never_parse() {
        // The parser is built at module level but parse_args is only
        // reachable behind the main guard.
        let captured = capture_parser(&source(
            "import argparse\n\
             parser = argparse.ArgumentParser()\n\
             parser.add_argument('--x')\n\
             def main():\n\
                 return parser.parse_args()\n",
        ))
        .unwrap();
        // Under __main__ nothing calls main(), so the trap never fires and
        // the namespace scan takes over.
        assert_eq!(captured.strategy, STRATEGY_MODULE_LOAD);
    }

    #[test]
    fn test_normalized_load_recovers_unresolvable_imports() {
        let captured = capture_parser(&source(
            "import argparse\n\
             import module_that_is_not_installed\n\
             parser = argparse.ArgumentParser()\n\
             parser.add_argument('--x')\n\
             args = parser.parse_args()\n",
        ));
        // Strategies 1 and 2 fail on the import; stripping it lets the
        // module load and the scan find the parser.
        let captured = captured.unwrap();
        assert_eq!(captured.strategy, STRATEGY_NORMALIZED_LOAD);
    }

    #[test]
    fn test_all_strategies_recorded_on_failure() {
        let error = capture_parser(&source("x = 1\n")).unwrap_err();
        let labels: Vec<&str> = error.attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(
            labels,
            vec![
                STRATEGY_INTERCEPT,
                STRATEGY_MODULE_LOAD,
                STRATEGY_NORMALIZED_LOAD
            ]
        );
    }

    #[test]
    fn test_unresolved_import_named_in_failure_detail() {
        let error = capture_parser(&source("import something_i_dont_have\nx = 1\n")).unwrap_err();
        assert!(error.to_string().contains("something_i_dont_have"));
    }

    #[test]
    fn test_docstring_capture() {
        let captured = capture_docstring(&source(
            "\"\"\"Usage: sample [options]\n\nOptions:\n  --count=N  how many\n\"\"\"\n",
        ))
        .unwrap();
        assert!(captured.docstring.contains("Usage: sample"));
        assert_eq!(captured.strategy, STRATEGY_MODULE_LOAD);
    }

    #[test]
    fn test_docstring_missing_is_an_error() {
        let error = capture_docstring(&source("x = 1\n")).unwrap_err();
        assert!(error.to_string().contains("no docstring"));
    }
}
