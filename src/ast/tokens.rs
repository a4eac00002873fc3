/// Lexical tokens of the expression language.
///
/// `=` and `|` are always lexed; whether they are legal is decided by the
/// parser's dialect (selectors reject both).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),

    /// Bare identifier: path segment or function name
    Identifier(String),

    /// `@` - current pipeline item
    At,
    /// `$` - parameter bundle
    Dollar,

    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,

    // Operators
    /// `=` (assignment; actions dialect only)
    Assign,
    /// `|` (pipe; actions dialect only)
    Pipe,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `=~` regex match
    Matches,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    AndAnd,
    OrOr,

    Eof,
}
