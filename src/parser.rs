use std::rc::Rc;

use thiserror::Error;

use crate::ast::{
    BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement,
};
use crate::token::{Span, Token, TokenKind};

pub mod ast;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected {expected}, found {found} at position {position}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Operator binding strength, weakest first. Mirrors the precedence ladder of
/// the grammar: equality, then ordering, then additive, then multiplicative,
/// with prefix operators and call/index postfixes binding tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
}

fn infix_operator(kind: &TokenKind<'_>) -> Option<(InfixOperator, Precedence)> {
    match kind {
        TokenKind::Eq => Some((InfixOperator::Eq, Precedence::Equals)),
        TokenKind::NotEq => Some((InfixOperator::NotEq, Precedence::Equals)),
        TokenKind::Lt => Some((InfixOperator::Lt, Precedence::LessGreater)),
        TokenKind::Gt => Some((InfixOperator::Gt, Precedence::LessGreater)),
        TokenKind::Plus => Some((InfixOperator::Plus, Precedence::Sum)),
        TokenKind::Minus => Some((InfixOperator::Minus, Precedence::Sum)),
        TokenKind::Asterisk => Some((InfixOperator::Asterisk, Precedence::Product)),
        TokenKind::Slash => Some((InfixOperator::Slash, Precedence::Product)),
        TokenKind::Percent => Some((InfixOperator::Percent, Precedence::Product)),
        _ => None,
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    current: Token<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::EOF, Span::default()));
        }
        let current = tokens[0].clone();
        Self {
            tokens,
            pos: 0,
            current,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !matches!(self.current.kind, TokenKind::EOF) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let statement = match self.current.kind {
            TokenKind::Let => self.parse_let()?,
            TokenKind::Return => self.parse_return()?,
            _ => Statement::Expression(self.parse_expression(Precedence::Lowest)?),
        };
        // Statement separators are optional in the grammar.
        if matches!(self.current.kind, TokenKind::Semicolon) {
            self.advance();
        }
        Ok(statement)
    }

    fn parse_let(&mut self) -> ParseResult<Statement> {
        self.advance(); // let
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Assign, "'='")?;
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Statement::Let { name, value })
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        self.advance(); // return
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Statement::Return(value))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expression> {
        let mut left = self.parse_prefix()?;

        while let Some((operator, operator_precedence)) = infix_operator(&self.current.kind) {
            if precedence >= operator_precedence {
                break;
            }
            self.advance();
            let right = self.parse_expression(operator_precedence)?;
            left = Expression::Infix {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expression> {
        let operator = match self.current.kind {
            TokenKind::Bang => PrefixOperator::Bang,
            TokenKind::Minus => PrefixOperator::Minus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let right = self.parse_prefix()?;
        Ok(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    /// Parses a primary expression followed by any run of call-argument and
    /// index postfixes, so `f(1)[2](3)` chains naturally.
    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::LParen => {
                    self.advance();
                    let arguments = self.parse_expression_list(TokenKind::RParen, "')'")?;
                    expr = Expression::Call {
                        function: Box::new(expr),
                        arguments,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression(Precedence::Lowest)?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expression::Index {
                        left: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Expression::Integer(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expression::Null)
            }
            TokenKind::String(value) => {
                let value = value.to_string();
                self.advance();
                Ok(Expression::String(value))
            }
            TokenKind::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                Ok(Expression::Identifier(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Function => self.parse_function(),
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_expression_list(TokenKind::RBracket, "']'")?;
                Ok(Expression::Array(elements))
            }
            TokenKind::LBrace => self.parse_hash(),
            _ => Err(self.error("an expression")),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Expression> {
        self.advance(); // if
        self.expect(TokenKind::LParen, "'('")?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::RParen, "')'")?;
        let consequence = self.parse_block()?;

        let alternative = if matches!(self.current.kind, TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function(&mut self) -> ParseResult<Expression> {
        self.advance(); // fn
        self.expect(TokenKind::LParen, "'('")?;

        let mut parameters = Vec::new();
        if !matches!(self.current.kind, TokenKind::RParen) {
            parameters.push(self.expect_identifier()?);
            while matches!(self.current.kind, TokenKind::Comma) {
                self.advance();
                parameters.push(self.expect_identifier()?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let body = self.parse_block()?;
        Ok(Expression::Function {
            parameters,
            body: Rc::new(body),
        })
    }

    fn parse_block(&mut self) -> ParseResult<BlockStatement> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::EOF) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(statements)
    }

    fn parse_hash(&mut self) -> ParseResult<Expression> {
        self.advance(); // {
        let mut pairs = Vec::new();
        if !matches!(self.current.kind, TokenKind::RBrace) {
            pairs.push(self.parse_hash_pair()?);
            while matches!(self.current.kind, TokenKind::Comma) {
                self.advance();
                pairs.push(self.parse_hash_pair()?);
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expression::Hash(pairs))
    }

    fn parse_hash_pair(&mut self) -> ParseResult<(Expression, Expression)> {
        let key = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::Colon, "':'")?;
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok((key, value))
    }

    fn parse_expression_list(
        &mut self,
        terminator: TokenKind<'a>,
        description: &'static str,
    ) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        if self.current.kind != terminator {
            items.push(self.parse_expression(Precedence::Lowest)?);
            while matches!(self.current.kind, TokenKind::Comma) {
                self.advance();
                items.push(self.parse_expression(Precedence::Lowest)?);
            }
        }
        self.expect(terminator, description)?;
        Ok(items)
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("an identifier")),
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>, description: &'static str) -> ParseResult<()> {
        if self.current.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(description))
        }
    }

    fn error(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            expected,
            found: format!("{:?}", self.current.kind),
            position: self.current.span.start,
        }
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
            self.current = self.tokens[self.pos].clone();
        }
    }
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}
