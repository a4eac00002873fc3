pub mod ast;
pub mod codec;
pub mod context;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod mutate;
pub mod parser;
pub mod pipeline;
pub mod value;

pub use ast::{BinOp, Expr, Token, VarBase};
pub use codec::{Emitter, EncodeError, OutputFormat};
pub use context::{EvalContext, MissingKeyMode};
pub use evaluator::{EvalError, Language};
pub use functions::{Function, Registry};
pub use lexer::{LexError, Lexer};
pub use mutate::{MutateError, MutationTarget, Operation};
pub use parser::{ParseError, Parser};
pub use pipeline::{PatchError, PatchOptions, Patcher};
pub use value::{NodeId, Value, ValueKind};
