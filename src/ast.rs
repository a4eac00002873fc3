//! # ypatch expression language - Abstract Syntax Tree
//!
//! This module defines the AST for the small expression language that
//! selects and patches YAML documents.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, variables, calls, pipes)
//! - **[operators]** - Binary operators (comparison, arithmetic, logical, regex)
//!
//! ## The two dialects
//!
//! The same grammar backs two languages built at construction time:
//!
//! - **Selectors** decide which documents are patched. They are read-only:
//!   the parser rejects `=` and `|`, and no functions are registered, so a
//!   selector cannot queue mutations.
//! - **Actions** patch matched documents. They add the assignment operator
//!   `=`, the pipe operator `|`, and the mutation function registry.
//!
//! ## Core Concepts
//!
//! References resolve against a per-document context rather than explicit
//! tree positions:
//!
//! ```text
//! metadata.name            root-relative path
//! @                        current pipeline item (the root outside a pipe)
//! @.spec.replicas          path relative to the current item
//! @key                     current pipeline key (mapping key or index)
//! $.cluster.region         externally supplied parameters
//! ```
//!
//! ## Examples
//!
//! ### Selector
//!
//! ```text
//! kind == "Deployment" && metadata.name =~ "api-.*"
//! ```
//!
//! ### Assignment (deferred, applied by the mutation engine)
//!
//! ```text
//! spec.replicas = 3
//! ```
//!
//! ### Pipe iteration
//!
//! ```text
//! spec.containers | @.image = "registry/app:v2"
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Expr, VarBase};
pub use operators::BinOp;
pub use tokens::Token;
