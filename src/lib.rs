// Private
mod callable;
mod environment;
mod evaluator;
mod interpreter;
mod native_fn;
mod parser;
mod scanner;

// Public
pub mod ast;
pub mod token;
pub mod value;

pub use callable::{Callable, LoxFunction, NativeFunction};
pub use environment::{Environment, EnvironmentError};
pub use evaluator::{Evaluator, RuntimeError, StmtResult};
pub use interpreter::{
    EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR, Lox, RunError, StaticError, parse,
};
pub use parser::{Location, ParseError, Parser};
pub use scanner::{ScanError, Scanner};
