use super::operators::BinOp;

/// Anchor of a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarBase {
    /// Bare identifier path, resolved against the document root
    Root,
    /// `@` / `@.path`, resolved against the current pipeline item
    Item,
    /// `$` / `$.path`, resolved against the parameter bundle (read-only)
    Params,
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),

    /// `[a, b, c]` sequence literal
    Array(Vec<Expr>),

    /// Segmented reference resolved against the evaluation context.
    /// An empty path returns the anchor itself (`@`, `$`).
    Variable { base: VarBase, path: Vec<String> },

    /// `@key` - the current pipeline key (nil outside a pipe)
    CurrentKey,

    /// `name(args...)` against the dialect's function registry
    Call { name: String, args: Vec<Expr> },

    /// `!expr`
    Not(Box<Expr>),

    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `target = value`; queues a deferred mutation, evaluates to nil
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// `input | body`; re-evaluates `body` with the current item and key
    /// rescoped to each element of `input`
    Pipe {
        input: Box<Expr>,
        body: Box<Expr>,
    },
}
