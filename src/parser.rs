use crate::{
    ast::{BinOp, Expr, Token, VarBase},
    lexer::{LexError, Lexer},
};
use std::mem;

/// A parse failure, carrying the character position where it happened.
#[derive(Debug, Clone)]
pub enum ParseError {
    Lex(LexError),
    Unexpected { message: String, position: usize },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Lex(e) => write!(f, "{}", e),
            ParseError::Unexpected { message, position } => {
                write!(f, "{} at position {}", message, position)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Lex(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

/// Recursive-descent parser over the token stream.
///
/// `mutating` selects the dialect: action expressions accept the bespoke
/// `=` and `|` operators, selector expressions reject them at parse time
/// so a selector can never queue a mutation.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    mutating: bool,
}

impl Parser {
    pub fn new(mut lexer: Lexer, mutating: bool) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            mutating,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn unexpected(&self, message: impl Into<String>) -> ParseError {
        ParseError::Unexpected {
            message: message.into(),
            position: self.lexer.position(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(format!(
                "expected {:?}, got {:?}",
                expected, self.current_token
            )));
        }
        self.advance()
    }

    /// Parse one complete expression; trailing input is an error.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        if self.current_token != Token::Eof {
            return Err(self.unexpected(format!(
                "unexpected {:?} after expression",
                self.current_token
            )));
        }
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_pipe()
    }

    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_assign()?;

        while self.check(&Token::Pipe) {
            if !self.mutating {
                return Err(self.unexpected("unexpected '|' (pipes are not allowed in selectors)"));
            }
            self.advance()?;
            let body = self.parse_assign()?;
            left = Expr::Pipe {
                input: Box::new(left),
                body: Box::new(body),
            };
        }
        Ok(left)
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or()?;

        if self.check(&Token::Assign) {
            if !self.mutating {
                return Err(
                    self.unexpected("unexpected '=' (assignment is not allowed in selectors)")
                );
            }
            self.advance()?;
            let value = self.parse_or()?;
            return Ok(Expr::Assign {
                target: Box::new(left),
                value: Box::new(value),
            });
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::OrOr) {
            self.advance()?;
            let right = self.parse_and()?;
            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;

        while self.check(&Token::AndAnd) {
            self.advance()?;
            let right = self.parse_comparison()?;
            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;

        if let Some(op) = match &self.current_token {
            Token::EqEq => Some(BinOp::Equal),
            Token::NotEq => Some(BinOp::NotEqual),
            Token::Lt => Some(BinOp::LessThan),
            Token::LtEq => Some(BinOp::LessEqual),
            Token::Gt => Some(BinOp::GreaterThan),
            Token::GtEq => Some(BinOp::GreaterEqual),
            Token::Matches => Some(BinOp::Match),
            _ => None,
        } {
            self.advance()?;
            let right = self.parse_additive()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match &self.current_token {
            Token::Not => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Not(Box::new(operand)))
            }
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_unary()?;
                // Represented as 0 - operand
                Ok(Expr::BinaryOp {
                    op: BinOp::Subtract,
                    left: Box::new(Expr::Integer(0)),
                    right: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            // Literals
            Token::Integer(n) => {
                self.advance()?;
                Ok(Expr::Integer(n))
            }
            Token::Float(n) => {
                self.advance()?;
                Ok(Expr::Float(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Expr::Boolean(b))
            }

            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::LBracket => {
                self.advance()?;
                self.parse_array_literal()
            }

            // References
            Token::At => {
                self.advance()?;
                // Disambiguate '@', '@key', '@.path'
                if self.current_token == Token::Identifier("key".to_string()) {
                    self.advance()?;
                    return Ok(Expr::CurrentKey);
                }
                let path = self.parse_path_segments()?;
                Ok(Expr::Variable {
                    base: VarBase::Item,
                    path,
                })
            }
            Token::Dollar => {
                self.advance()?;
                let path = self.parse_path_segments()?;
                Ok(Expr::Variable {
                    base: VarBase::Params,
                    path,
                })
            }

            // Bare identifier: function call or root-relative path
            Token::Identifier(name) => {
                self.advance()?;
                if self.check(&Token::LParen) {
                    self.advance()?;
                    let args = self.parse_call_args()?;
                    return Ok(Expr::Call { name, args });
                }
                let mut path = vec![name];
                path.extend(self.parse_path_segments()?);
                Ok(Expr::Variable {
                    base: VarBase::Root,
                    path,
                })
            }

            token => {
                self.current_token = token;
                Err(self.unexpected(format!(
                    "unexpected {:?} in expression",
                    self.current_token
                )))
            }
        }
    }

    /// Zero or more `.segment` continuations after a reference anchor.
    /// Segments are identifiers or integer indices.
    fn parse_path_segments(&mut self) -> Result<Vec<String>, ParseError> {
        let mut segments = Vec::new();
        while self.check(&Token::Dot) {
            self.advance()?;
            match mem::replace(&mut self.current_token, Token::Eof) {
                Token::Identifier(name) => {
                    self.advance()?;
                    segments.push(name);
                }
                Token::Integer(n) => {
                    self.advance()?;
                    segments.push(n.to_string());
                }
                token => {
                    self.current_token = token;
                    return Err(self.unexpected(format!(
                        "expected identifier or index after '.', got {:?}",
                        self.current_token
                    )));
                }
            }
        }
        Ok(segments)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(&Token::RParen) {
            self.advance()?;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.check(&Token::Comma) {
                self.advance()?;
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut elements = Vec::new();
        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::Array(elements))
    }
}
