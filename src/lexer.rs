use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("Invalid integer literal '{literal}' at position {position}")]
    InvalidIntegerLiteral { literal: String, position: usize },
    #[error("Unterminated string literal at position {position}")]
    UnterminatedString { position: usize },
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let Some(ch) = self.peek_char() else {
            return Ok(Token::new(
                TokenKind::EOF,
                Span {
                    start,
                    end: start,
                },
            ));
        };

        if let Some(token) = self.try_consume_operator(ch, start) {
            return Ok(token);
        }

        match ch {
            '"' => self.read_string(start),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier(start)),
            c if c.is_ascii_digit() => self.read_integer(start),
            _ => Err(LexError::UnexpectedCharacter {
                character: ch,
                position: start,
            }),
        }
    }

    fn try_consume_operator(&mut self, ch: char, start: usize) -> Option<Token<'a>> {
        let kind = match ch {
            '=' => {
                self.consume_char();
                if self.peek_char() == Some('=') {
                    self.consume_char();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                self.consume_char();
                if self.peek_char() == Some('=') {
                    self.consume_char();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Asterisk),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '<' => self.single(TokenKind::Lt),
            '>' => self.single(TokenKind::Gt),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            ':' => self.single(TokenKind::Colon),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            _ => return None,
        };

        Some(Token::new(
            kind,
            Span {
                start,
                end: self.pos,
            },
        ))
    }

    fn single(&mut self, kind: TokenKind<'a>) -> TokenKind<'a> {
        self.consume_char();
        kind
    }

    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let end = self.pos;

        let ident = &self.input[start..end];
        let kind = match ident {
            "fn" => TokenKind::Function,
            "let" => TokenKind::Let,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(ident),
        };
        Token::new(kind, Span { start, end })
    }

    fn read_integer(&mut self, start: usize) -> LexResult<Token<'a>> {
        self.consume_while(|c| c.is_ascii_digit());
        let end = self.pos;

        let literal = &self.input[start..end];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                position: start,
            })?;
        Ok(Token::new(TokenKind::Integer(value), Span { start, end }))
    }

    fn read_string(&mut self, start: usize) -> LexResult<Token<'a>> {
        self.consume_char(); // opening quote
        let content_start = self.pos;

        self.consume_while(|c| c != '"');

        match self.peek_char() {
            Some('"') => {
                let content_end = self.pos;
                self.consume_char(); // closing quote
                Ok(Token::new(
                    TokenKind::String(&self.input[content_start..content_end]),
                    Span {
                        start,
                        end: self.pos,
                    },
                ))
            }
            _ => Err(LexError::UnterminatedString { position: start }),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.consume_while(|c| c.is_ascii_whitespace());
            if self.peek_char() == Some('/') && self.char_at(self.pos + 1) == Some('/') {
                self.consume_while(|c| c != '\n');
                continue;
            }
            break;
        }
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn char_at(&self, index: usize) -> Option<char> {
        if index >= self.input.len() {
            None
        } else {
            self.input[index..].chars().next()
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.char_at(self.pos)
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn tokenizes_full_token_set() {
        let input = indoc! {r#"
            let five = 5;
            let add = fn(x, y) { x + y; };
            !-/*5 % 2;
            5 < 10 > 5;
            if (5 == 10) { return true; } else { return false; }
            10 != 9;
            "foobar"
            [1, 2];
            {"foo": "bar"}
            null
        "#};

        let expected = vec![
            TokenKind::Let,
            TokenKind::Identifier("five"),
            TokenKind::Assign,
            TokenKind::Integer(5),
            TokenKind::Semicolon,
            TokenKind::Let,
            TokenKind::Identifier("add"),
            TokenKind::Assign,
            TokenKind::Function,
            TokenKind::LParen,
            TokenKind::Identifier("x"),
            TokenKind::Comma,
            TokenKind::Identifier("y"),
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Identifier("x"),
            TokenKind::Plus,
            TokenKind::Identifier("y"),
            TokenKind::Semicolon,
            TokenKind::RBrace,
            TokenKind::Semicolon,
            TokenKind::Bang,
            TokenKind::Minus,
            TokenKind::Slash,
            TokenKind::Asterisk,
            TokenKind::Integer(5),
            TokenKind::Percent,
            TokenKind::Integer(2),
            TokenKind::Semicolon,
            TokenKind::Integer(5),
            TokenKind::Lt,
            TokenKind::Integer(10),
            TokenKind::Gt,
            TokenKind::Integer(5),
            TokenKind::Semicolon,
            TokenKind::If,
            TokenKind::LParen,
            TokenKind::Integer(5),
            TokenKind::Eq,
            TokenKind::Integer(10),
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Return,
            TokenKind::True,
            TokenKind::Semicolon,
            TokenKind::RBrace,
            TokenKind::Else,
            TokenKind::LBrace,
            TokenKind::Return,
            TokenKind::False,
            TokenKind::Semicolon,
            TokenKind::RBrace,
            TokenKind::Integer(10),
            TokenKind::NotEq,
            TokenKind::Integer(9),
            TokenKind::Semicolon,
            TokenKind::String("foobar"),
            TokenKind::LBracket,
            TokenKind::Integer(1),
            TokenKind::Comma,
            TokenKind::Integer(2),
            TokenKind::RBracket,
            TokenKind::Semicolon,
            TokenKind::LBrace,
            TokenKind::String("foo"),
            TokenKind::Colon,
            TokenKind::String("bar"),
            TokenKind::RBrace,
            TokenKind::Null,
            TokenKind::EOF,
        ];

        let actual = tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
    }

    #[test]
    fn skips_line_comments() {
        let input = indoc! {"
            // leading comment
            let a = 1; // trailing comment
            a
        "};
        let kinds = tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let,
                TokenKind::Identifier("a"),
                TokenKind::Assign,
                TokenKind::Integer(1),
                TokenKind::Semicolon,
                TokenKind::Identifier("a"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn keeps_string_contents_raw() {
        let tokens = tokenize(r#""hello world""#).expect("tokenize should succeed");
        assert_eq!(tokens[0].kind, TokenKind::String("hello world"));
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("let a = 1 @ 2").expect_err("expected lexing failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                position: 10
            }
        );
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("99999999999999999999999999").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize(r#"let s = "abc"#).expect_err("expected unterminated string failure");
        assert_eq!(err, LexError::UnterminatedString { position: 8 });
    }
}
