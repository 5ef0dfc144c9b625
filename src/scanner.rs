use std::iter::Peekable;
use std::str::CharIndices;

use snafu::Snafu;

use crate::token::{Token, TokenType};
use crate::value::Value;

#[derive(Debug)]
pub struct Scanner<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    line: usize,
    start: usize,
    current: usize,
}

impl<'src> Scanner<'src> {
    /// Scans the whole source. Never fails: bad input is collected as errors
    /// and scanning resumes, and the token list always ends with `Eof`.
    pub fn scan_tokens(source: &'src str) -> (Vec<Token>, Vec<ScanError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        let mut scanner = Scanner {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            start: 0,
            current: 0,
        };

        loop {
            scanner.start = scanner.current;
            match scanner.advance() {
                Some(c) => match scanner.scan_token(c) {
                    Ok(Some(t)) => tokens.push(t),
                    Ok(None) => {}
                    Err(e) => errors.push(e),
                },
                None => break,
            }
        }

        tokens.push(Token::new_eof(scanner.line));
        tracing::debug!(
            tokens = tokens.len(),
            errors = errors.len(),
            "scanned source"
        );
        (tokens, errors)
    }

    fn scan_token(&mut self, c: char) -> Result<Option<Token>, ScanError> {
        match c {
            // Single-char token
            '(' | ')' | '{' | '}' | ',' | '.' | '-' | '+' | ';' | '*' => {
                let token_type = match c {
                    '(' => TokenType::LeftParen,
                    ')' => TokenType::RightParen,
                    '{' => TokenType::LeftBrace,
                    '}' => TokenType::RightBrace,
                    ',' => TokenType::Comma,
                    '.' => TokenType::Dot,
                    '-' => TokenType::Minus,
                    '+' => TokenType::Plus,
                    ';' => TokenType::Semicolon,
                    '*' => TokenType::Star,
                    _ => unreachable!(),
                };
                Ok(Some(self.simple_token(token_type)))
            }

            // Double-char token
            '!' => Ok(Some(self.lookahead_token(
                '=',
                TokenType::BangEqual,
                TokenType::Bang,
            ))),
            '=' => Ok(Some(self.lookahead_token(
                '=',
                TokenType::EqualEqual,
                TokenType::Equal,
            ))),
            '>' => Ok(Some(self.lookahead_token(
                '=',
                TokenType::GreaterEqual,
                TokenType::Greater,
            ))),
            '<' => Ok(Some(self.lookahead_token(
                '=',
                TokenType::LessEqual,
                TokenType::Less,
            ))),
            '/' => {
                if self.chars.next_if(|&(_, c)| c == '/').is_some() {
                    // Comment runs to end of line; the newline itself is left for the line counter
                    while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
                    Ok(None)
                } else {
                    Ok(Some(self.simple_token(TokenType::Slash)))
                }
            }

            // Whitespace
            ' ' | '\r' | '\t' => Ok(None),
            '\n' => {
                self.line += 1;
                Ok(None)
            }

            // State transitions
            '"' => self.scan_string().map(Some),
            '0'..='9' => Ok(Some(self.scan_number())),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.scan_identifier())),

            _ => UnexpectedCharacterSnafu {
                found: c,
                line: self.line,
            }
            .fail(),
        }
    }

    fn scan_string(&mut self) -> Result<Token, ScanError> {
        while let Some(c) = self.advance() {
            match c {
                '"' => {
                    let lexeme = self.current_lexeme();
                    let value = &lexeme[1..lexeme.len() - 1];
                    return Ok(Token::new(
                        TokenType::String,
                        lexeme,
                        Some(Value::from(value)),
                        self.line,
                    ));
                }
                '\n' => self.line += 1,
                _ => {}
            }
        }
        UnterminatedStringSnafu { line: self.line }.fail()
    }

    fn scan_number(&mut self) -> Token {
        self.consume_digits();

        // A fractional part needs at least one digit after the dot
        if self.peek() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.next().is_some_and(|(_, c)| c.is_ascii_digit()) {
                self.advance();
                self.consume_digits();
            }
        }

        let lexeme = self.current_lexeme();
        let literal = lexeme.parse::<f64>().ok().map(Value::Number);
        Token::new(TokenType::Number, lexeme, literal, self.line)
    }

    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let lexeme = self.current_lexeme();
        let token_type = TokenType::keyword(lexeme).unwrap_or(TokenType::Identifier);
        Token::new_simple(token_type, lexeme, self.line)
    }

    // helper function
    fn advance(&mut self) -> Option<char> {
        let (idx, c) = self.chars.next()?;
        self.current = idx + c.len_utf8();
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn consume_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn lookahead_token(
        &mut self,
        expected: char,
        match_type: TokenType,
        default_type: TokenType,
    ) -> Token {
        let token_type = if self.peek() == Some(expected) {
            self.advance();
            match_type
        } else {
            default_type
        };
        self.simple_token(token_type)
    }

    fn simple_token(&self, token_type: TokenType) -> Token {
        Token::new_simple(token_type, self.current_lexeme(), self.line)
    }

    fn current_lexeme(&self) -> &'src str {
        &self.source[self.start..self.current]
    }
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[snafu(display("[line {line}] Error: Unexpected character '{found}'."))]
    UnexpectedCharacter { found: char, line: usize },

    #[snafu(display("[line {line}] Error: Unterminated string."))]
    UnterminatedString { line: usize },
}

impl ScanError {
    pub fn line(&self) -> usize {
        match self {
            ScanError::UnexpectedCharacter { line, .. } | ScanError::UnterminatedString { line } => {
                *line
            }
        }
    }
}
