use std::fmt::Display;
use std::iter::Peekable;
use std::rc::Rc;
use std::vec::IntoIter;

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Upper bound on parameters and call arguments.
const MAX_ARITY: usize = 255;

type Result<T> = std::result::Result<T, ParseError>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
    eof: Token,
    errors: Vec<ParseError>,
    function_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_line = tokens.last().map_or(1, |t| t.line);
        Self {
            tokens: tokens.into_iter().peekable(),
            eof: Token::new_eof(eof_line),
            errors: Vec::new(),
            function_depth: 0,
        }
    }

    /// Parses a whole program. Every independent syntax error is collected;
    /// any error means no statements are handed out.
    pub fn parse(mut self) -> std::result::Result<Vec<Stmt>, Vec<ParseError>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        tracing::debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(self.errors)
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_token(&[TokenType::Fun]).is_some() {
            self.function()
        } else if self.match_token(&[TokenType::Var]).is_some() {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.sync();
                None
            }
        }
    }

    fn function(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect function name.")?;
        self.consume(TokenType::LeftParen, "Expect '(' after function name.")?;

        let mut parameters = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if parameters.len() >= MAX_ARITY {
                    let error = ParseError::too_many(self.peek(), "parameters");
                    self.errors.push(error);
                }
                parameters.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if self.match_token(&[TokenType::Comma]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::LeftBrace, "Expect '{' before function body.")?;

        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;

        Ok(Stmt::Function(Rc::new(FunctionDecl {
            name,
            parameters,
            body: body?,
        })))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_token(&[TokenType::Equal]).is_some() {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt> {
        let token_type = self.peek().token_type;
        match token_type {
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Print => {
                self.advance();
                let value = self.expression()?;
                self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
                Ok(Stmt::Print(value))
            }
            TokenType::Return => {
                let keyword = self.advance();
                self.return_statement(keyword)
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            _ => {
                let expr = self.expression()?;
                self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
                Ok(Stmt::Expression(expr))
            }
        }
    }

    /// `for` has no node of its own: it becomes an optional initializer and a
    /// `while` whose body runs the increment after the original body.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(&[TokenType::Semicolon]).is_some() {
            None
        } else if self.match_token(&[TokenType::Var]).is_some() {
            Some(self.var_declaration()?)
        } else {
            let expr = self.expression()?;
            self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
            Some(Stmt::Expression(expr))
        };

        let condition = if self.check(TokenType::Semicolon) {
            Expr::literal(true)
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };
        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }
        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&[TokenType::Else]).is_some() {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn return_statement(&mut self, keyword: Token) -> Result<Stmt> {
        if self.function_depth == 0 {
            self.errors.push(ParseError::TopLevelReturn {
                line: keyword.line,
                location: Location::of(&keyword),
            });
        }

        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if let Some(equals) = self.match_token(&[TokenType::Equal]) {
            let value = self.assignment()?;
            if let Expr::Variable { name } = expr {
                return Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                });
            }
            // Reported, but the left-hand side is kept so parsing carries on
            self.errors.push(ParseError::InvalidAssignmentTarget {
                line: equals.line,
                location: Location::of(&equals),
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        self.parse_binary_op(|p| p.and(), &[TokenType::Or], logical)
    }

    fn and(&mut self) -> Result<Expr> {
        self.parse_binary_op(|p| p.equality(), &[TokenType::And], logical)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.parse_binary_op(
            |p| p.comparison(),
            &[TokenType::BangEqual, TokenType::EqualEqual],
            binary,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.parse_binary_op(
            |p| p.term(),
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            binary,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.parse_binary_op(|p| p.factor(), &[TokenType::Minus, TokenType::Plus], binary)
    }

    fn factor(&mut self) -> Result<Expr> {
        self.parse_binary_op(|p| p.unary(), &[TokenType::Slash, TokenType::Star], binary)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(operator) = self.match_token(&[TokenType::Bang, TokenType::Minus]) {
            let right = self.unary()?;
            Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            })
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while self.match_token(&[TokenType::LeftParen]).is_some() {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let error = ParseError::too_many(self.peek(), "arguments");
                    self.errors.push(error);
                }
                arguments.push(self.expression()?);
                if self.match_token(&[TokenType::Comma]).is_none() {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let token_type = self.peek().token_type;
        match token_type {
            TokenType::False => {
                self.advance();
                Ok(Expr::literal(false))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::literal(true))
            }
            TokenType::Nil => {
                self.advance();
                Ok(Expr::literal(Value::Nil))
            }
            TokenType::Number | TokenType::String => {
                let token = self.advance();
                Ok(Expr::Literal {
                    value: token.literal.unwrap_or(Value::Nil),
                })
            }
            TokenType::Identifier => Ok(Expr::Variable {
                name: self.advance(),
            }),
            TokenType::LeftParen => {
                self.advance();
                let expression = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expr::Grouping {
                    expression: Box::new(expression),
                })
            }
            _ => Err(ParseError::expected(self.peek(), "Expect expression.")),
        }
    }

    /// Panic-mode recovery: skip to the token after a `;` or to the next
    /// statement keyword.
    fn sync(&mut self) {
        while !self.is_at_end() {
            let token = self.advance();
            if token.token_type == TokenType::Semicolon || self.peek().token_type.starts_statement()
            {
                return;
            }
        }
    }

    // Helper function
    fn parse_binary_op<F>(
        &mut self,
        mut parse_operand: F,
        operators: &[TokenType],
        make: fn(Expr, Token, Expr) -> Expr,
    ) -> Result<Expr>
    where
        F: FnMut(&mut Self) -> Result<Expr>,
    {
        let mut expr = parse_operand(self)?;
        while let Some(operator) = self.match_token(operators) {
            let right = parse_operand(self)?;
            expr = make(expr, operator, right);
        }
        Ok(expr)
    }

    fn peek(&mut self) -> &Token {
        self.tokens.peek().unwrap_or(&self.eof)
    }

    fn is_at_end(&mut self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn check(&mut self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    /// Never steps past `Eof`.
    fn advance(&mut self) -> Token {
        self.tokens
            .next_if(|t| t.token_type != TokenType::Eof)
            .unwrap_or_else(|| self.eof.clone())
    }

    fn match_token(&mut self, types: &[TokenType]) -> Option<Token> {
        self.tokens
            .next_if(|t| t.token_type != TokenType::Eof && types.contains(&t.token_type))
    }

    fn consume(&mut self, token_type: TokenType, message: &'static str) -> Result<Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(ParseError::expected(self.peek(), message))
        }
    }
}

fn binary(left: Expr, operator: Token, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    }
}

fn logical(left: Expr, operator: Token, right: Expr) -> Expr {
    Expr::Logical {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    }
}

/// Where in the source a parse error was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    End,
    Lexeme(String),
}

impl Location {
    fn of(token: &Token) -> Self {
        match token.token_type {
            TokenType::Eof => Location::End,
            _ => Location::Lexeme(token.lexeme.clone()),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::End => write!(f, " at end"),
            Location::Lexeme(lexeme) => write!(f, " at '{lexeme}'"),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("[line {line}] Error{location}: {message}")]
    Expected {
        line: usize,
        location: Location,
        message: &'static str,
    },
    #[error("[line {line}] Error{location}: Invalid assignment target.")]
    InvalidAssignmentTarget { line: usize, location: Location },
    #[error("[line {line}] Error{location}: Can't have more than 255 {what}.")]
    TooMany {
        line: usize,
        location: Location,
        what: &'static str,
    },
    #[error("[line {line}] Error{location}: Can't return from top-level code.")]
    TopLevelReturn { line: usize, location: Location },
}

impl ParseError {
    fn expected(token: &Token, message: &'static str) -> Self {
        ParseError::Expected {
            line: token.line,
            location: Location::of(token),
            message,
        }
    }

    fn too_many(token: &Token, what: &'static str) -> Self {
        ParseError::TooMany {
            line: token.line,
            location: Location::of(token),
            what,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ParseError::Expected { line, .. }
            | ParseError::InvalidAssignmentTarget { line, .. }
            | ParseError::TooMany { line, .. }
            | ParseError::TopLevelReturn { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::scanner::Scanner;

    use super::*;

    fn parse_source(source: &str) -> std::result::Result<Vec<Stmt>, Vec<ParseError>> {
        let (tokens, errors) = Scanner::scan_tokens(source);
        assert!(errors.is_empty(), "unexpected scan errors: {errors:?}");
        Parser::new(tokens).parse()
    }

    fn print_program(source: &str) -> Vec<String> {
        parse_source(source)
            .expect("source should parse")
            .iter()
            .map(Stmt::print)
            .collect()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(print_program("1 + 2 * 3;"), vec!["(; (+ 1 (* 2 3)))"]);
        assert_eq!(
            print_program("(1 + 2) * 3;"),
            vec!["(; (* (group (+ 1 2)) 3))"]
        );
        assert_eq!(
            print_program("-1 - -2 < 3 == !true;"),
            vec!["(; (== (< (- (- 1) (- 2)) 3) (! true)))"]
        );
        assert_eq!(
            print_program("a or b and c;"),
            vec!["(; (or a (and b c)))"]
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(print_program("1 - 2 - 3;"), vec!["(; (- (- 1 2) 3))"]);
        assert_eq!(print_program("8 / 4 / 2;"), vec!["(; (/ (/ 8 4) 2))"]);
    }

    #[test]
    fn test_assignment_right_associative() {
        assert_eq!(print_program("a = b = 1;"), vec!["(; (= a (= b 1)))"]);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errors = parse_source("1 + 2 = 3;").unwrap_err();
        assert_eq!(
            errors,
            vec![ParseError::InvalidAssignmentTarget {
                line: 1,
                location: Location::Lexeme("=".to_string()),
            }]
        );
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at '=': Invalid assignment target."
        );
    }

    #[test]
    fn test_calls() {
        assert_eq!(print_program("f(1)(2, 3);"), vec!["(; (call (call f 1) 2 3))"]);
        assert_eq!(print_program("f();"), vec!["(; (call f))"]);
    }

    #[test]
    fn test_for_desugars_to_while() {
        assert_eq!(
            print_program("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"]
        );
        assert_eq!(
            print_program("for (;;) print 1;"),
            vec!["(while true (print 1))"]
        );
    }

    #[test]
    fn test_if_else_and_while() {
        assert_eq!(
            print_program("if (a) print 1; else print 2; while (b) { b = false; }"),
            vec![
                "(if a (print 1) (print 2))",
                "(while b (block (; (= b false))))",
            ]
        );
    }

    #[test]
    fn test_if_requires_closing_paren() {
        let errors = parse_source("if (a print 1;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at 'print': Expect ')' after if condition."
        );
    }

    #[test]
    fn test_function_declaration() {
        assert_eq!(
            print_program("fun add(a, b) { return a + b; } fun f() { return; }"),
            vec![
                "(fun add (a b) (return (+ a b)))",
                "(fun f () (return))",
            ]
        );
    }

    #[test]
    fn test_var_without_initializer() {
        let statements = parse_source("var a;").unwrap();
        assert!(matches!(
            &statements[0],
            Stmt::Var {
                initializer: None,
                ..
            }
        ));
    }

    #[test]
    fn test_top_level_return_is_reported() {
        let errors = parse_source("return 1;").unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at 'return': Can't return from top-level code."
        );
    }

    #[test]
    fn test_recovers_from_two_errors() {
        let errors = parse_source("print ;\nvar = 1;\nprint 3;").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at ';': Expect expression."
        );
        assert_eq!(
            errors[1].to_string(),
            "[line 2] Error at '=': Expect variable name."
        );
    }

    #[test]
    fn test_error_inside_block_keeps_parsing() {
        let errors = parse_source("{ var x = ; print 1; } print 2 print 3;").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].line(), 1);
    }

    #[test]
    fn test_error_at_end() {
        let errors = parse_source("print 1").unwrap_err();
        assert_eq!(
            errors,
            vec![ParseError::Expected {
                line: 1,
                location: Location::End,
                message: "Expect ';' after value.",
            }]
        );
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at end: Expect ';' after value."
        );
    }

    #[test]
    fn test_too_many_parameters() {
        let params = (0..256).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        let errors = parse_source(&format!("fun f({params}) {{}}")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::TooMany {
                what: "parameters",
                ..
            }
        ));
    }

    #[test]
    fn test_too_many_arguments() {
        let args = vec!["1"; 256].join(", ");
        let errors = parse_source(&format!("f({args});")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at '1': Can't have more than 255 arguments."
        );
    }

    #[test]
    fn test_parse_idempotent() {
        let (tokens, _) = Scanner::scan_tokens("fun f(x) { if (x) return x; } print f(1) + 2;");
        let first = Parser::new(tokens.clone()).parse();
        let second = Parser::new(tokens).parse();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_eof_token() {
        let tokens = vec![
            Token::new_simple(TokenType::Print, "print", 1),
            Token::new(TokenType::Number, "1", Some(Value::Number(1.0)), 1),
            Token::new_simple(TokenType::Semicolon, ";", 1),
        ];
        let statements = Parser::new(tokens).parse().unwrap();
        assert_eq!(statements.len(), 1);
    }
}
