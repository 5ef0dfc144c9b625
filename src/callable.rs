use std::fmt::{Debug, Display};
use std::io::Write;
use std::iter::zip;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::evaluator::{Evaluator, RuntimeError, StmtResult};
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Callable {
    Native(NativeFunction),
    User(Rc<LoxFunction>),
}

#[derive(Debug, Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: fn(&[Value]) -> Value,
}

/// A function declaration paired with the scope it was declared in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Environment) -> Self {
        Self {
            declaration,
            closure,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
}

// The closure may hold this very function, so it is left out.
impl Debug for LoxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.declaration.parameters.len())
            .finish_non_exhaustive()
    }
}

impl Callable {
    pub fn call<W: Write>(
        &self,
        evaluator: &mut Evaluator<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match self {
            Self::Native(native) => Ok((native.function)(&arguments)),
            Self::User(func) => {
                tracing::trace!(name = func.name(), arity = self.arity(), "calling function");
                let local = func.closure.enclosed();
                for (param, arg) in zip(&func.declaration.parameters, arguments) {
                    local.define(&param.lexeme, arg);
                }

                match evaluator.execute_block(&func.declaration.body, local)? {
                    StmtResult::Return(value) => Ok(value),
                    StmtResult::Normal => Ok(Value::Nil),
                }
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Native(native) => native.arity,
            Self::User(func) => func.declaration.parameters.len(),
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "<native fn>"),
            Callable::User(func) => write!(f, "<fn {}>", func.name()),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Native(l), Callable::Native(r)) => l.name == r.name,
            (Callable::User(l), Callable::User(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}
