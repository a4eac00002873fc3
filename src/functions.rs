//! Mutation-capable builtin functions and their registry.
//!
//! Functions are looked up by name at evaluation time; the selector
//! dialect uses an empty registry, so any call site fails with an
//! unknown-function error there. Arity is validated dynamically against
//! [`Function::arity`]; argument types are checked inside each `call`.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::codec;
use crate::context::EvalContext;
use crate::evaluator::EvalError;
use crate::mutate::{MutationTarget, Operation};
use crate::value::{self, Value, ValueKind};

/// Trait for functions callable from action expressions. Implementations
/// may queue mutation targets or flip the drop flag through the context.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> RangeInclusive<usize>;
    fn call(&self, ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError>;
}

/// Function registry, shared by every evaluation under one language.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    /// Empty registry: the selector dialect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry carrying the full action vocabulary.
    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, Arc<dyn Function>> = HashMap::new();
        map.insert("drop", Arc::new(builtins::Drop));
        map.insert("unset", Arc::new(builtins::Unset));
        map.insert("if", Arc::new(builtins::If));
        map.insert("nil", Arc::new(builtins::Nil));
        map.insert("v", Arc::new(builtins::Var));
        map.insert("merge", Arc::new(builtins::Merge));
        map.insert("yaml_parse", Arc::new(builtins::YamlParse));
        map.insert("yaml_dump", Arc::new(builtins::YamlDump));
        map.insert("b64encode", Arc::new(builtins::B64Encode));
        map.insert("b64decode", Arc::new(builtins::B64Decode));
        map.insert("splice_replace", Arc::new(builtins::SpliceReplace));
        map.insert("concat", Arc::new(builtins::Concat));
        Self {
            inner: Arc::new(map),
        }
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }
}

fn want_string(name: &str, arg: &Value) -> Result<String, EvalError> {
    arg.as_str().map(str::to_string).ok_or_else(|| {
        EvalError::TypeError(format!(
            "{}(input) expects input to be a string, got {}",
            name,
            arg.type_name()
        ))
    })
}

pub mod builtins {
    use super::*;

    pub struct Drop;
    impl Function for Drop {
        fn name(&self) -> &'static str {
            "drop"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            0..=0
        }
        fn call(&self, ctx: &mut EvalContext, _args: Vec<Value>) -> Result<Value, EvalError> {
            ctx.drop = true;
            Ok(Value::null())
        }
    }

    pub struct Unset;
    impl Function for Unset {
        fn name(&self) -> &'static str {
            "unset"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=usize::MAX
        }
        fn call(&self, ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            // Absent keys resolve to fresh nil nodes whose ids match
            // nothing in the tree, so unsetting them is a harmless no-op.
            for arg in args {
                ctx.targets.push(MutationTarget {
                    id: arg.id(),
                    op: Operation::Unset,
                });
            }
            Ok(Value::null())
        }
    }

    pub struct If;
    impl Function for If {
        fn name(&self) -> &'static str {
            "if"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=3
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            // The condition must be exactly boolean true; anything else
            // takes the false branch.
            if args[0] == Value::boolean(true) {
                Ok(args[1].clone())
            } else {
                Ok(args.get(2).cloned().unwrap_or_else(Value::null))
            }
        }
    }

    pub struct Nil;
    impl Function for Nil {
        fn name(&self) -> &'static str {
            "nil"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            0..=0
        }
        fn call(&self, _ctx: &mut EvalContext, _args: Vec<Value>) -> Result<Value, EvalError> {
            Ok(Value::null())
        }
    }

    pub struct Var;
    impl Function for Var {
        fn name(&self) -> &'static str {
            "v"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let ValueKind::Sequence(segments) = args[0].kind() else {
                return Err(EvalError::TypeError(
                    "v(path) expects path to be a sequence".to_string(),
                ));
            };
            let path: Vec<String> = segments.iter().map(Value::as_string).collect();
            ctx.root
                .get_path(&path)
                .cloned()
                .ok_or_else(|| EvalError::KeyNotFound(path.join(".")))
        }
    }

    pub struct Merge;
    impl Function for Merge {
        fn name(&self) -> &'static str {
            "merge"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=2
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let (Some(a), Some(b)) = (args[0].as_mapping(), args[1].as_mapping()) else {
                return Err(EvalError::TypeError(format!(
                    "merge(a, b) expects two mappings, got {} and {}",
                    args[0].type_name(),
                    args[1].type_name()
                )));
            };
            let mut out: HashMap<String, Value> = a
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect();
            value::merge_override(&mut out, b);
            Ok(Value::mapping(out))
        }
    }

    pub struct YamlParse;
    impl Function for YamlParse {
        fn name(&self) -> &'static str {
            "yaml_parse"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let input = want_string("yaml_parse", &args[0])?;
            let text = codec::read_source(&input)
                .map_err(|e| EvalError::Function(format!("yaml_parse: {}", e)))?;
            codec::decode_document(&text)
                .map_err(|e| EvalError::Function(format!("yaml_parse: {}", e)))
        }
    }

    pub struct YamlDump;
    impl Function for YamlDump {
        fn name(&self) -> &'static str {
            "yaml_dump"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let text = codec::encode_yaml(&args[0])
                .map_err(|e| EvalError::Function(format!("yaml_dump: {}", e)))?;
            Ok(Value::string(text))
        }
    }

    pub struct B64Encode;
    impl Function for B64Encode {
        fn name(&self) -> &'static str {
            "b64encode"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let input = want_string("b64encode", &args[0])?;
            Ok(Value::string(STANDARD.encode(input.as_bytes())))
        }
    }

    pub struct B64Decode;
    impl Function for B64Decode {
        fn name(&self) -> &'static str {
            "b64decode"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let input = want_string("b64decode", &args[0])?;
            let bytes = STANDARD
                .decode(input.as_bytes())
                .map_err(|e| EvalError::Function(format!("b64decode: {}", e)))?;
            let text = String::from_utf8(bytes)
                .map_err(|e| EvalError::Function(format!("b64decode: {}", e)))?;
            Ok(Value::string(text))
        }
    }

    pub struct SpliceReplace;
    impl Function for SpliceReplace {
        fn name(&self) -> &'static str {
            "splice_replace"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=2
        }
        fn call(&self, ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let Some(replacement) = args[1].as_sequence() else {
                return Err(EvalError::TypeError(format!(
                    "splice_replace(target, list) expects list to be a sequence, got {}",
                    args[1].type_name()
                )));
            };
            ctx.targets.push(MutationTarget {
                id: args[0].id(),
                op: Operation::Splice(replacement.to_vec()),
            });
            Ok(Value::null())
        }
    }

    pub struct Concat;
    impl Function for Concat {
        fn name(&self) -> &'static str {
            "concat"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            0..=usize::MAX
        }
        fn call(&self, _ctx: &mut EvalContext, args: Vec<Value>) -> Result<Value, EvalError> {
            let mut out = Vec::new();
            for arg in args {
                match arg.as_sequence() {
                    Some(items) => out.extend(items.iter().cloned()),
                    None => out.push(arg),
                }
            }
            Ok(Value::sequence(out))
        }
    }
}
