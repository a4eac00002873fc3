//! Stream orchestration: decode, select, merge, act, apply, emit.
//!
//! A [`Patcher`] is configured once (selector, merges, actions, params)
//! and then run over any number of input streams. Every document flows
//! through the same stages; per-document state never leaks into the next
//! document.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::{
    ast::Expr,
    codec::{self, EncodeError, Emitter, OutputFormat},
    context::EvalContext,
    evaluator::Language,
    mutate::{self, MutateError},
    value::{self, Value},
};

/// Pipeline-level failures, each tagged with the source or expression
/// that produced it.
#[derive(Debug)]
pub enum PatchError {
    Input {
        source_name: String,
        error: io::Error,
    },
    Decode {
        source_name: String,
        message: String,
    },
    Selector {
        expr: String,
        message: String,
    },
    Action {
        expr: String,
        message: String,
    },
    Apply {
        expr: String,
        error: MutateError,
    },
    Encode(EncodeError),
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchError::Input { source_name, error } => {
                write!(f, "could not read '{}': {}", source_name, error)
            }
            PatchError::Decode {
                source_name,
                message,
            } => write!(f, "could not decode '{}': {}", source_name, message),
            PatchError::Selector { expr, message } => {
                write!(f, "selector '{}' failed: {}", expr, message)
            }
            PatchError::Action { expr, message } => {
                write!(f, "action '{}' failed: {}", expr, message)
            }
            PatchError::Apply { expr, error } => {
                write!(f, "could not apply mutations for '{}': {}", expr, error)
            }
            PatchError::Encode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatchError::Input { error, .. } => Some(error),
            PatchError::Apply { error, .. } => Some(error),
            PatchError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything a patch run is configured with. Each entry in `merges` and
/// `params` is either a file path or inline YAML text.
#[derive(Debug, Default)]
pub struct PatchOptions {
    pub selector: Option<String>,
    pub merges: Vec<String>,
    pub actions: Vec<String>,
    pub params: Vec<String>,
}

/// A fully prepared patch pipeline. Expressions are parsed and merge and
/// parameter sources loaded up front, so configuration errors surface
/// before any document is touched.
pub struct Patcher {
    selector: Option<(String, Expr)>,
    actions: Vec<(String, Expr)>,
    merges: Vec<Value>,
    params: Value,
    selector_lang: Language,
    action_lang: Language,
}

impl Patcher {
    pub fn new(options: PatchOptions) -> Result<Self, PatchError> {
        let selector_lang = Language::selector();
        let action_lang = Language::actions();

        let selector = match options.selector {
            Some(text) => {
                let expr = selector_lang
                    .parse(&text)
                    .map_err(|e| PatchError::Selector {
                        expr: text.clone(),
                        message: e.to_string(),
                    })?;
                Some((text, expr))
            }
            None => None,
        };

        let mut actions = Vec::with_capacity(options.actions.len());
        for text in options.actions {
            let expr = action_lang.parse(&text).map_err(|e| PatchError::Action {
                expr: text.clone(),
                message: e.to_string(),
            })?;
            actions.push((text, expr));
        }

        let mut merges = Vec::with_capacity(options.merges.len());
        for source in options.merges {
            let doc = load_mapping(&source, "merge source")?;
            merges.push(doc);
        }

        // Parameter bundles fold left-to-right into one mapping,
        // later bundles overriding earlier ones.
        let mut params_map = std::collections::HashMap::new();
        for source in options.params {
            let doc = load_mapping(&source, "parameter bundle")?;
            if let Some(map) = doc.as_mapping() {
                value::merge_override(&mut params_map, map);
            }
        }
        let params = Value::mapping(params_map);

        Ok(Patcher {
            selector,
            actions,
            merges,
            params,
            selector_lang,
            action_lang,
        })
    }

    /// Run over every named input in order, sharing one emitter so the
    /// output is a single well-formed stream. The name `-` means stdin.
    pub fn run<W: Write>(
        &self,
        inputs: &[String],
        out: W,
        format: OutputFormat,
    ) -> Result<(), PatchError> {
        let mut emitter = Emitter::new(out, format);
        let stdin = vec!["-".to_string()];
        let inputs = if inputs.is_empty() { &stdin } else { inputs };
        for name in inputs {
            let text = read_input(name).map_err(|error| PatchError::Input {
                source_name: name.clone(),
                error,
            })?;
            self.process_stream(name, &text, &mut emitter)?;
        }
        Ok(())
    }

    /// Decode one multi-document stream and push each document through
    /// the selector, merges and actions, emitting the survivors.
    pub fn process_stream<W: Write>(
        &self,
        source_name: &str,
        text: &str,
        emitter: &mut Emitter<W>,
    ) -> Result<(), PatchError> {
        // Documents are decoded one record at a time; output for earlier
        // documents is already flushed when a later record fails to decode.
        for (index, doc) in codec::documents(text).enumerate() {
            let doc = doc.map_err(|e| PatchError::Decode {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
            // Empty documents (bare separators, comment-only chunks,
            // empty mappings) are silently skipped.
            if doc.is_null() || doc.as_mapping().is_some_and(|m| m.is_empty()) {
                continue;
            }
            if !doc.is_mapping() {
                return Err(PatchError::Decode {
                    source_name: source_name.to_string(),
                    message: format!(
                        "document {} is a {}, expected a mapping",
                        index,
                        doc.type_name()
                    ),
                });
            }

            let mut ctx = EvalContext::new(doc, self.params.clone());

            if let Some((text, expr)) = &self.selector {
                let verdict = self
                    .selector_lang
                    .evaluate(expr, &mut ctx)
                    .map_err(|e| PatchError::Selector {
                        expr: text.clone(),
                        message: e.to_string(),
                    })?;
                if verdict != Value::boolean(true) {
                    debug!(source = source_name, index, "document not selected, passing through");
                    emitter.emit(&ctx.root).map_err(PatchError::Encode)?;
                    continue;
                }
            }

            for merge in &self.merges {
                // Merge sources were validated as mappings at construction
                if let (Some(dst), Some(src)) = (ctx.root.as_mapping_mut(), merge.as_mapping()) {
                    value::merge_override(dst, src);
                }
                ctx.refresh_current_item();
            }

            for (text, expr) in &self.actions {
                ctx.targets.clear();
                self.action_lang
                    .evaluate(expr, &mut ctx)
                    .map_err(|e| PatchError::Action {
                        expr: text.clone(),
                        message: e.to_string(),
                    })?;
                let targets = std::mem::take(&mut ctx.targets);
                mutate::apply(&mut ctx.root, &targets).map_err(|error| PatchError::Apply {
                    expr: text.clone(),
                    error,
                })?;
                ctx.refresh_current_item();
            }

            if ctx.drop {
                debug!(source = source_name, index, "document dropped");
                continue;
            }
            emitter.emit(&ctx.root).map_err(PatchError::Encode)?;
        }
        Ok(())
    }
}

fn read_input(name: &str) -> io::Result<String> {
    if name == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(name)
    }
}

/// Load a side document (merge source or parameter bundle) and require
/// it to be a mapping.
fn load_mapping(source: &str, role: &str) -> Result<Value, PatchError> {
    let text = codec::read_source(source).map_err(|error| PatchError::Input {
        source_name: source.to_string(),
        error,
    })?;
    let doc = codec::decode_document(&text).map_err(|e| PatchError::Decode {
        source_name: source.to_string(),
        message: e.to_string(),
    })?;
    if !doc.is_mapping() {
        return Err(PatchError::Decode {
            source_name: source.to_string(),
            message: format!("{} must be a mapping, got {}", role, doc.type_name()),
        });
    }
    Ok(doc)
}
