use std::io::Write;
use std::rc::Rc;

use snafu::{ResultExt, Snafu};

use crate::ast::{Expr, Stmt};
use crate::callable::{Callable, LoxFunction};
use crate::environment::{Environment, EnvironmentError};
use crate::native_fn;
use crate::token::TokenType;
use crate::value::{TypeError, Value};

type Result<T> = std::result::Result<T, RuntimeError>;

/// How a statement finished. `Return` unwinds enclosing blocks and loops
/// until a function call turns it back into a value.
#[derive(Debug, PartialEq)]
pub enum StmtResult {
    Normal,
    Return(Value),
}

pub struct Evaluator<W: Write> {
    globals: Environment,
    environment: Environment,
    output: W,
}

impl<W: Write> Evaluator<W> {
    /// `print` output goes to `output`.
    pub fn new(output: W) -> Self {
        let globals = Environment::global();
        native_fn::define_natives(&globals);
        Self {
            environment: globals.clone(),
            globals,
            output,
        }
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs top-level statements. The first runtime error stops the run.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            match self.execute(statement) {
                Ok(StmtResult::Normal) => {}
                // Parsed source rejects top-level `return`; only a hand-built tree gets here
                Ok(StmtResult::Return(_)) => {
                    tracing::debug!("return escaped to top level");
                    return TopLevelReturnSnafu.fail();
                }
                Err(e) => {
                    tracing::debug!(error = %e, "runtime error");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Runs `statements` with `environment` as the current scope, restoring
    /// the previous scope however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Environment,
    ) -> Result<StmtResult> {
        let previous = std::mem::replace(&mut self.environment, environment);
        tracing::trace!(depth = self.environment.depth(), "entering block");
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<StmtResult> {
        for stmt in statements {
            match self.execute(stmt)? {
                StmtResult::Normal => {}
                rst @ StmtResult::Return(..) => return Ok(rst),
            }
        }
        Ok(StmtResult::Normal)
    }

    fn execute(&mut self, statement: &Stmt) -> Result<StmtResult> {
        match statement {
            Stmt::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(StmtResult::Normal)
            }
            Stmt::Print(expression) => {
                let value = self.evaluate(expression)?;
                writeln!(self.output, "{value}").context(OutputSnafu)?;
                Ok(StmtResult::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(StmtResult::Normal)
            }
            Stmt::Block(statements) => {
                let local = self.environment.enclosed();
                self.execute_block(statements, local)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(stmt) = else_branch {
                    self.execute(stmt)
                } else {
                    Ok(StmtResult::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        StmtResult::Normal => {}
                        rst @ StmtResult::Return(..) => return Ok(rst),
                    }
                }
                Ok(StmtResult::Normal)
            }
            Stmt::Function(declaration) => {
                let function = LoxFunction::new(Rc::clone(declaration), self.environment.clone());
                self.environment.define(
                    &declaration.name.lexeme,
                    Value::Callable(Callable::User(Rc::new(function))),
                );
                Ok(StmtResult::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(StmtResult::Return(value))
            }
        }
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Value> {
        match expression {
            Expr::Variable { name } => self
                .environment
                .get(&name.lexeme)
                .context(UndefinedVariableSnafu { line: name.line }),
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::Minus => {
                        let n = f64::try_from(&right).context(TypeSnafu {
                            line: operator.line,
                        })?;
                        Ok(Value::Number(-n))
                    }
                    TokenType::Bang => Ok(Value::Boolean(!right.is_truthy())),
                    _ => unreachable!("only minus and bang are unary operator"),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                // Right operand first
                let right = self.evaluate(right)?;
                let left = self.evaluate(left)?;

                let line = operator.line;
                let numbers = || Value::number_operands(&left, &right).context(TypeSnafu { line });
                match operator.token_type {
                    TokenType::Minus => numbers().map(|(l, r)| Value::Number(l - r)),
                    TokenType::Slash => numbers().map(|(l, r)| Value::Number(l / r)),
                    TokenType::Star => numbers().map(|(l, r)| Value::Number(l * r)),
                    TokenType::Plus => Value::add(&left, &right).context(TypeSnafu { line }),
                    TokenType::Greater => numbers().map(|(l, r)| Value::Boolean(l > r)),
                    TokenType::GreaterEqual => numbers().map(|(l, r)| Value::Boolean(l >= r)),
                    TokenType::Less => numbers().map(|(l, r)| Value::Boolean(l < r)),
                    TokenType::LessEqual => numbers().map(|(l, r)| Value::Boolean(l <= r)),
                    TokenType::EqualEqual => Ok(Value::Boolean(left == right)),
                    TokenType::BangEqual => Ok(Value::Boolean(left != right)),
                    _ => unreachable!("not a binary operator: {:?}", operator.token_type),
                }
            }
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment
                    .assign(&name.lexeme, value.clone())
                    .context(UndefinedVariableSnafu { line: name.line })?;
                Ok(value)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                if operator.token_type == TokenType::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let arguments = arguments
                    .iter()
                    .map(|expr| self.evaluate(expr))
                    .collect::<Result<Vec<_>>>()?;

                match callee {
                    Value::Callable(function) => {
                        if arguments.len() != function.arity() {
                            ArityMismatchSnafu {
                                line: paren.line,
                                expected: function.arity(),
                                found: arguments.len(),
                            }
                            .fail()
                        } else {
                            function.call(self, arguments)
                        }
                    }
                    _ => NotCallableSnafu { line: paren.line }.fail(),
                }
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum RuntimeError {
    #[snafu(display("{source}\n[line {line}]"))]
    UndefinedVariable {
        line: usize,
        source: EnvironmentError,
    },

    #[snafu(display("{source}\n[line {line}]"))]
    Type { line: usize, source: TypeError },

    #[snafu(display("Can only call functions.\n[line {line}]"))]
    NotCallable { line: usize },

    #[snafu(display("Expected {expected} arguments but got {found}.\n[line {line}]"))]
    ArityMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[snafu(display("Can't return from top-level code."))]
    TopLevelReturn,

    #[snafu(display("Failed to write output: {source}"))]
    Output { source: std::io::Error },
}

impl RuntimeError {
    pub fn line(&self) -> Option<usize> {
        match self {
            RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::Type { line, .. }
            | RuntimeError::NotCallable { line }
            | RuntimeError::ArityMismatch { line, .. } => Some(*line),
            RuntimeError::TopLevelReturn | RuntimeError::Output { .. } => None,
        }
    }
}
