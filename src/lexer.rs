use crate::ast::Token;

/// A lexing failure with the offending position (in characters).
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for LexError {}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            position: self.position,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance(); // consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(self.error(format!("invalid escape sequence '\\{}'", ch)));
                        }
                        None => {
                            return Err(self.error("unterminated string: EOF after backslash"));
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error("unterminated string: missing closing quote"))
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float literal '{}'", number)))
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.error(format!("invalid integer literal '{}'", number)))
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        match self.current_char() {
            None => Ok(Token::Eof),
            Some('@') => {
                self.advance();
                Ok(Token::At)
            }
            Some('$') => {
                self.advance();
                Ok(Token::Dollar)
            }
            Some('.') => {
                self.advance();
                Ok(Token::Dot)
            }
            Some(',') => {
                self.advance();
                Ok(Token::Comma)
            }
            Some('(') => {
                self.advance();
                Ok(Token::LParen)
            }
            Some(')') => {
                self.advance();
                Ok(Token::RParen)
            }
            Some('[') => {
                self.advance();
                Ok(Token::LBracket)
            }
            Some(']') => {
                self.advance();
                Ok(Token::RBracket)
            }
            Some('+') => {
                self.advance();
                Ok(Token::Plus)
            }
            Some('-') => {
                self.advance();
                Ok(Token::Minus)
            }
            Some('*') => {
                self.advance();
                Ok(Token::Star)
            }
            Some('/') => {
                self.advance();
                Ok(Token::Slash)
            }
            Some('%') => {
                self.advance();
                Ok(Token::Percent)
            }
            Some('=') => match self.peek_char(1) {
                Some('=') => {
                    self.advance();
                    self.advance();
                    Ok(Token::EqEq)
                }
                Some('~') => {
                    self.advance();
                    self.advance();
                    Ok(Token::Matches)
                }
                _ => {
                    self.advance();
                    Ok(Token::Assign)
                }
            },
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    self.advance();
                    Ok(Token::Not)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::LtEq)
                } else {
                    self.advance();
                    Ok(Token::Lt)
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::GtEq)
                } else {
                    self.advance();
                    Ok(Token::Gt)
                }
            }
            Some('&') => {
                if self.peek_char(1) == Some('&') {
                    self.advance();
                    self.advance();
                    Ok(Token::AndAnd)
                } else {
                    Err(self.error("unexpected '&' (did you mean '&&'?)"))
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.advance();
                    self.advance();
                    Ok(Token::OrOr)
                } else {
                    self.advance();
                    Ok(Token::Pipe)
                }
            }
            Some('"') => Ok(Token::String(self.read_string('"')?)),
            Some('\'') => Ok(Token::String(self.read_string('\'')?)),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Ok(Token::Boolean(true)),
                    "false" => Ok(Token::Boolean(false)),
                    _ => Ok(Token::Identifier(ident)),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(self.error(format!("unexpected character '{}'", ch))),
        }
    }
}

#[test]
fn test_keywords_and_identifiers() {
    let mut lexer = Lexer::new("true false metadata drop");
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("metadata".to_string())
    );
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("drop".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_assign_vs_comparison() {
    let mut lexer = Lexer::new("a = b == c =~ d");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("a".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Assign);
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("b".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::EqEq);
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("c".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Matches);
}

#[test]
fn test_pipe_vs_or() {
    let mut lexer = Lexer::new("list | @ || true");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("list".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Pipe);
    assert_eq!(lexer.next_token().unwrap(), Token::At);
    assert_eq!(lexer.next_token().unwrap(), Token::OrOr);
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
}

#[test]
fn test_string_escapes() {
    let mut lexer = Lexer::new(r#""a\nb" 'c\'d'"#);
    assert_eq!(lexer.next_token().unwrap(), Token::String("a\nb".to_string()));
    assert_eq!(lexer.next_token().unwrap(), Token::String("c'd".to_string()));
}

#[test]
fn test_lone_ampersand_is_an_error() {
    let mut lexer = Lexer::new("a & b");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("a".to_string())
    );
    assert!(lexer.next_token().is_err());
}
