use std::io::Write;

use crate::ast::Stmt;
use crate::evaluator::{Evaluator, RuntimeError};
use crate::parser::{ParseError, Parser};
use crate::scanner::{ScanError, Scanner};

/// Exit code for source that failed to scan or parse.
pub const EXIT_STATIC_ERROR: u8 = 65;
/// Exit code for a run aborted by a runtime error.
pub const EXIT_RUNTIME_ERROR: u8 = 70;

/// An interpreter session. Globals persist across [`Lox::run`] calls, so a
/// prompt can keep going after an error.
pub struct Lox<W: Write> {
    evaluator: Evaluator<W>,
}

impl<W: Write> Lox<W> {
    pub fn new(output: W) -> Self {
        Self {
            evaluator: Evaluator::new(output),
        }
    }

    /// Scans, parses and, if both were clean, evaluates `source`.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let statements = parse(source)?;
        self.evaluator.interpret(&statements)?;
        Ok(())
    }

    pub fn output(&self) -> &W {
        self.evaluator.output()
    }

    pub fn into_output(self) -> W {
        self.evaluator.into_output()
    }
}

/// Scans and parses `source`, collecting every scan and parse error.
pub fn parse(source: &str) -> Result<Vec<Stmt>, RunError> {
    let (tokens, scan_errors) = Scanner::scan_tokens(source);
    let mut errors: Vec<StaticError> = scan_errors.into_iter().map(StaticError::from).collect();

    match Parser::new(tokens).parse() {
        Ok(statements) if errors.is_empty() => Ok(statements),
        Ok(_) => Err(RunError::Static(errors)),
        Err(parse_errors) => {
            errors.extend(parse_errors.into_iter().map(StaticError::from));
            Err(RunError::Static(errors))
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum StaticError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl StaticError {
    pub fn line(&self) -> usize {
        match self {
            StaticError::Scan(e) => e.line(),
            StaticError::Parse(e) => e.line(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{}", format_static_errors(.0))]
    Static(Vec<StaticError>),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Static(_) => EXIT_STATIC_ERROR,
            RunError::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }
}

fn format_static_errors(errors: &[StaticError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
