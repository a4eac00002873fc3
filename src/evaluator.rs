use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use tracing::warn;

use crate::{
    ast::{BinOp, Expr, VarBase},
    context::{EvalContext, MissingKeyMode},
    functions::Registry,
    lexer::Lexer,
    mutate::{MutationTarget, Operation},
    parser::{ParseError, Parser},
    value::{Value, ValueKind},
};

/// Errors that can occur while evaluating an expression.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// Type mismatch or invalid operation for the given type
    TypeError(String),

    /// Wrong number of arguments passed to a function
    Arity(String),

    /// Call to a function name not present in the registry (every call in
    /// the selector dialect ends up here)
    UnknownFunction(String),

    /// A presence-required lookup (`v`) found nothing at the path
    KeyNotFound(String),

    /// Right-hand side of `=~` is not a valid regular expression
    InvalidRegex(String),

    DivisionByZero,

    /// A builtin failed at runtime (bad base64, unparsable YAML, I/O)
    Function(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::TypeError(msg) => write!(f, "type error: {}", msg),
            EvalError::Arity(msg) => write!(f, "arity error: {}", msg),
            EvalError::UnknownFunction(name) => {
                write!(f, "could not call '{}': unknown function", name)
            }
            EvalError::KeyNotFound(path) => write!(f, "no value at path '{}'", path),
            EvalError::InvalidRegex(msg) => write!(f, "invalid regex: {}", msg),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::Function(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

/// One fully configured dialect of the expression language.
///
/// Both dialects share the grammar engine and resolver; they differ only
/// in the registered functions and whether the bespoke `=`/`|` operators
/// parse. That construction-time split is what makes "selectors cannot
/// mutate" a structural guarantee instead of a runtime check.
pub struct Language {
    registry: Registry,
    mutating: bool,
}

impl Language {
    /// The restricted, read-only dialect used for document selection.
    pub fn selector() -> Self {
        Language {
            registry: Registry::new(),
            mutating: false,
        }
    }

    /// The full dialect used for action expressions.
    pub fn actions() -> Self {
        Language {
            registry: Registry::with_builtins(),
            mutating: true,
        }
    }

    pub fn parse(&self, source: &str) -> Result<Expr, ParseError> {
        Parser::new(Lexer::new(source), self.mutating)?.parse()
    }

    pub fn evaluate(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<Value, EvalError> {
        self.eval_expr(expr, ctx)
    }

    fn eval_expr(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<Value, EvalError> {
        match expr {
            Expr::Integer(n) => Ok(Value::integer(*n)),
            Expr::Float(n) => Ok(Value::float(*n)),
            Expr::String(s) => Ok(Value::string(s.clone())),
            Expr::Boolean(b) => Ok(Value::boolean(*b)),

            Expr::Array(exprs) => {
                let mut items = Vec::with_capacity(exprs.len());
                for e in exprs {
                    items.push(self.eval_expr(e, ctx)?);
                }
                Ok(Value::sequence(items))
            }

            Expr::CurrentKey => Ok(ctx.current_key.clone().unwrap_or_else(Value::null)),

            Expr::Variable { base, path } => {
                // A bare identifier naming a registered function invokes
                // it with no arguments (`drop` is the common case), unless
                // the document shadows the name with a real key. Never
                // while resolving an assignment target: `drop = 1` writes
                // a key named `drop`.
                if ctx.missing_key_mode == MissingKeyMode::Get
                    && *base == VarBase::Root
                    && path.len() == 1
                    && self.registry.contains(&path[0])
                    && ctx.root.get_path(path).is_none()
                {
                    return self.call_function(&path[0], Vec::new(), ctx);
                }
                self.resolve(*base, path, ctx)
            }

            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, ctx)?);
                }
                self.call_function(name, values, ctx)
            }

            Expr::Not(inner) => {
                let v = self.eval_expr(inner, ctx)?;
                Ok(Value::boolean(!v.as_bool()))
            }

            Expr::BinaryOp { op, left, right } => self.eval_binop(*op, left, right, ctx),

            Expr::Assign { target, value } => self.eval_assign(target, value, ctx),

            Expr::Pipe { input, body } => self.eval_pipe(input, body, ctx),
        }
    }

    /// Resolve a segmented reference against the context, honoring the
    /// missing-key mode for root- and item-anchored paths. Parameter
    /// lookups ignore the mode: unresolved parameter paths are always nil.
    fn resolve(
        &self,
        base: VarBase,
        path: &[String],
        ctx: &mut EvalContext,
    ) -> Result<Value, EvalError> {
        if base == VarBase::Params {
            return Ok(ctx
                .params
                .get_path(path)
                .cloned()
                .unwrap_or_else(Value::null));
        }

        let anchor = match base {
            VarBase::Item => ctx.current_item.clone(),
            _ => ctx.root.clone(),
        };
        if path.is_empty() {
            return Ok(anchor);
        }
        if let Some(found) = anchor.get_path(path) {
            return Ok(found.clone());
        }

        if ctx.missing_key_mode == MissingKeyMode::Set {
            // Create the missing path inside the real tree (located by the
            // anchor's identity), then resolve again. The placeholder is
            // an empty scalar; the queued Set will overwrite it.
            let anchor_id = anchor.id();
            let node = ctx.root.find_node_mut(anchor_id).ok_or_else(|| {
                EvalError::TypeError(
                    "assignment target is not part of the current document".to_string(),
                )
            })?;
            node.set_path(path, Value::string(String::new()))
                .map_err(|e| EvalError::TypeError(e.to_string()))?;
            let created = node
                .get_path(path)
                .cloned()
                .ok_or_else(|| EvalError::KeyNotFound(path.join(".")))?;
            if base == VarBase::Item {
                ctx.current_item = ctx
                    .root
                    .find_node_mut(anchor_id)
                    .map(|n| n.clone())
                    .unwrap_or(anchor);
            }
            return Ok(created);
        }

        // Missing keys never surface as errors in Get mode
        Ok(Value::null())
    }

    fn call_function(
        &self,
        name: &str,
        args: Vec<Value>,
        ctx: &mut EvalContext,
    ) -> Result<Value, EvalError> {
        let f = self
            .registry
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        let arity = f.arity();
        if !arity.contains(&args.len()) {
            return Err(EvalError::Arity(format!(
                "{} takes {} argument(s), got {}",
                name,
                describe_arity(&arity),
                args.len()
            )));
        }
        f.call(ctx, args)
    }

    /// `target = value`: deferred assignment. The right side evaluates
    /// first in Get mode; the left side in Set mode so the target exists.
    /// Nothing is written here; a mutation target is queued (or the root
    /// replaced wholesale) and the expression evaluates to nil.
    fn eval_assign(
        &self,
        target: &Expr,
        value: &Expr,
        ctx: &mut EvalContext,
    ) -> Result<Value, EvalError> {
        ctx.missing_key_mode = MissingKeyMode::Get;
        let mut val = self.eval_expr(value, ctx)?;

        // Assigning the root to itself: detach the value first, otherwise
        // the old and new root would share node identities.
        if val.id() == ctx.root.id() {
            val = ctx.root.deep_copy();
        }

        ctx.missing_key_mode = MissingKeyMode::Set;
        let resolved = self.eval_expr(target, ctx);
        ctx.missing_key_mode = MissingKeyMode::Get;
        let target_val = resolved?;

        if target_val.id() == ctx.root.id() {
            if !val.is_mapping() {
                return Err(EvalError::TypeError(format!(
                    "the document root can only be replaced with a mapping, got {}",
                    val.type_name()
                )));
            }
            ctx.root = val;
            return Ok(Value::null());
        }

        ctx.targets.push(MutationTarget {
            id: target_val.id(),
            op: Operation::Set(val),
        });
        Ok(Value::null())
    }

    /// `input | body`: evaluate `body` once per element of `input` with
    /// the current item and key rescoped, collecting non-nil results.
    /// Per-element failures are logged and swallowed; this is the one
    /// place the engine does not propagate errors.
    fn eval_pipe(
        &self,
        input: &Expr,
        body: &Expr,
        ctx: &mut EvalContext,
    ) -> Result<Value, EvalError> {
        let source = self.eval_expr(input, ctx)?;

        let pairs: Vec<(Value, Value)> = match source.kind() {
            ValueKind::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::integer(i as i64), item.clone()))
                .collect(),
            ValueKind::Mapping(map) => {
                // Sorted for deterministic iteration order
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|k| (Value::string(k.clone()), map[k].clone()))
                    .collect()
            }
            _ => vec![(Value::integer(0), source.clone())],
        };

        let mut out = Vec::new();
        for (key, item) in pairs {
            let saved_item = std::mem::replace(&mut ctx.current_item, item);
            let saved_key = std::mem::replace(&mut ctx.current_key, Some(key));

            match self.eval_expr(body, ctx) {
                Ok(result) => {
                    if !result.is_null() {
                        out.push(result);
                    }
                }
                Err(e) => warn!(error = %e, "pipe element error swallowed"),
            }

            ctx.current_item = saved_item;
            ctx.current_key = saved_key;
        }
        Ok(Value::sequence(out))
    }

    fn eval_binop(
        &self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        ctx: &mut EvalContext,
    ) -> Result<Value, EvalError> {
        // Logical operators short-circuit on truthiness
        match op {
            BinOp::And => {
                let l = self.eval_expr(left, ctx)?;
                if !l.as_bool() {
                    return Ok(Value::boolean(false));
                }
                let r = self.eval_expr(right, ctx)?;
                return Ok(Value::boolean(r.as_bool()));
            }
            BinOp::Or => {
                let l = self.eval_expr(left, ctx)?;
                if l.as_bool() {
                    return Ok(Value::boolean(true));
                }
                let r = self.eval_expr(right, ctx)?;
                return Ok(Value::boolean(r.as_bool()));
            }
            _ => {}
        }

        let l = self.eval_expr(left, ctx)?;
        let r = self.eval_expr(right, ctx)?;

        match op {
            BinOp::Equal => Ok(Value::boolean(values_equal(&l, &r))),
            BinOp::NotEqual => Ok(Value::boolean(!values_equal(&l, &r))),
            BinOp::LessThan => compare(&l, &r).map(|o| Value::boolean(o == std::cmp::Ordering::Less)),
            BinOp::LessEqual => {
                compare(&l, &r).map(|o| Value::boolean(o != std::cmp::Ordering::Greater))
            }
            BinOp::GreaterThan => {
                compare(&l, &r).map(|o| Value::boolean(o == std::cmp::Ordering::Greater))
            }
            BinOp::GreaterEqual => {
                compare(&l, &r).map(|o| Value::boolean(o != std::cmp::Ordering::Less))
            }
            BinOp::Match => {
                let (Some(s), Some(pattern)) = (l.as_str(), r.as_str()) else {
                    return Err(EvalError::TypeError(format!(
                        "'=~' expects two strings, got {} and {}",
                        l.type_name(),
                        r.type_name()
                    )));
                };
                let re = regex::Regex::new(pattern)
                    .map_err(|e| EvalError::InvalidRegex(e.to_string()))?;
                Ok(Value::boolean(re.is_match(s)))
            }
            BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
                arith(op, &l, &r)
            }
            BinOp::And | BinOp::Or => unreachable!(),
        }
    }
}

fn describe_arity(arity: &std::ops::RangeInclusive<usize>) -> String {
    let (start, end) = (*arity.start(), *arity.end());
    if start == end {
        format!("exactly {}", start)
    } else if end == usize::MAX {
        format!("at least {}", start)
    } else {
        format!("{} to {}", start, end)
    }
}

/// Equality with numeric cross-type comparison (1 == 1.0)
fn values_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare(left: &Value, right: &Value) -> Result<std::cmp::Ordering, EvalError> {
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return a.partial_cmp(&b).ok_or_else(|| {
            EvalError::TypeError("cannot order NaN".to_string())
        });
    }
    if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
        return Ok(a.cmp(b));
    }
    Err(EvalError::TypeError(format!(
        "cannot compare {} and {}",
        left.type_name(),
        right.type_name()
    )))
}

/// Arithmetic preserving integer types where mathematically exact.
/// Integer pairs stay integer (except inexact division); mixed pairs go
/// through `Decimal` and come back as an integer when the result is whole.
fn arith(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if op == BinOp::Add {
        if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
            return Ok(Value::string(format!("{}{}", a, b)));
        }
    }

    match (left.kind(), right.kind()) {
        (ValueKind::Integer(a), ValueKind::Integer(b)) => int_arith(op, *a, *b),
        _ => {
            let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
                return Err(EvalError::TypeError(format!(
                    "cannot apply arithmetic to {} and {}",
                    left.type_name(),
                    right.type_name()
                )));
            };
            match (Decimal::from_f64(a), Decimal::from_f64(b)) {
                (Some(da), Some(db)) => decimal_arith(op, da, db),
                _ => float_arith(op, a, b),
            }
        }
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => Ok(Value::integer(a.wrapping_add(b))),
        BinOp::Subtract => Ok(Value::integer(a.wrapping_sub(b))),
        BinOp::Multiply => Ok(Value::integer(a.wrapping_mul(b))),
        BinOp::Divide => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            if a % b == 0 {
                Ok(Value::integer(a / b))
            } else {
                Ok(Value::float(a as f64 / b as f64))
            }
        }
        BinOp::Modulo => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::integer(a % b))
        }
        _ => unreachable!(),
    }
}

fn decimal_arith(op: BinOp, a: Decimal, b: Decimal) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinOp::Modulo => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            a % b
        }
        _ => unreachable!(),
    };
    if result.is_integer() {
        if let Some(n) = result.to_i64() {
            return Ok(Value::integer(n));
        }
    }
    result
        .to_f64()
        .map(Value::float)
        .ok_or_else(|| EvalError::TypeError("arithmetic result out of range".to_string()))
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => Ok(Value::float(a + b)),
        BinOp::Subtract => Ok(Value::float(a - b)),
        BinOp::Multiply => Ok(Value::float(a * b)),
        BinOp::Divide => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::float(a / b))
        }
        BinOp::Modulo => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::float(a % b))
        }
        _ => unreachable!(),
    }
}
