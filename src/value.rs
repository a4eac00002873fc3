use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a tree node for the duration of one evaluation pass.
///
/// Every node receives a fresh id at construction. `Clone` preserves ids
/// (a resolved variable is a clone that still identifies the tree node it
/// came from), while [`Value::deep_copy`] reassigns fresh ids throughout.
/// Ids are only meaningful against nodes reachable from the same document
/// root; they must never be compared across two unrelated trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// One decoded tree document: a mapping, a sequence, or a scalar.
///
/// The distinction between integers and floats is preserved, like the
/// rest of the language. Equality compares by value and ignores node
/// identity, so two distinct nodes holding equal data compare equal with
/// `==` but never share a [`NodeId`].
#[derive(Debug, Clone)]
pub struct Value {
    id: NodeId,
    kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(HashMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// Errors from path-based mutation of a document tree.
#[derive(Debug, Clone)]
pub enum PathError {
    /// A path segment ran into a scalar that cannot hold children
    NotAContainer(String),
    /// A sequence was indexed out of range (or with a non-numeric segment)
    BadIndex(String),
    /// The empty path cannot be written through
    EmptyPath,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::NotAContainer(seg) => {
                write!(f, "cannot descend into scalar at segment '{}'", seg)
            }
            PathError::BadIndex(seg) => write!(f, "invalid sequence index '{}'", seg),
            PathError::EmptyPath => write!(f, "empty path"),
        }
    }
}

impl std::error::Error for PathError {}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Value {
            id: NodeId::fresh(),
            kind,
        }
    }

    pub fn null() -> Self {
        Value::new(ValueKind::Null)
    }

    pub fn boolean(b: bool) -> Self {
        Value::new(ValueKind::Boolean(b))
    }

    pub fn integer(n: i64) -> Self {
        Value::new(ValueKind::Integer(n))
    }

    pub fn float(n: f64) -> Self {
        Value::new(ValueKind::Float(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::new(ValueKind::String(s.into()))
    }

    pub fn sequence(items: Vec<Value>) -> Self {
        Value::new(ValueKind::Sequence(items))
    }

    pub fn mapping(map: HashMap<String, Value>) -> Self {
        Value::new(ValueKind::Mapping(map))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, ValueKind::Mapping(_))
    }

    pub fn as_mapping(&self) -> Option<&HashMap<String, Value>> {
        match &self.kind {
            ValueKind::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut HashMap<String, Value>> {
        match &mut self.kind {
            ValueKind::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.kind {
            ValueKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match &self.kind {
            ValueKind::Integer(n) => Some(*n as f64),
            ValueKind::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Truthiness used by `&&`, `||` and `!`
    pub fn as_bool(&self) -> bool {
        match &self.kind {
            ValueKind::Null => false,
            ValueKind::Boolean(b) => *b,
            ValueKind::Integer(n) => *n != 0,
            ValueKind::Float(n) => *n != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Sequence(items) => !items.is_empty(),
            ValueKind::Mapping(map) => !map.is_empty(),
        }
    }

    /// Scalar rendering used for path segments and string coercion
    pub fn as_string(&self) -> String {
        match &self.kind {
            ValueKind::String(s) => s.clone(),
            ValueKind::Integer(n) => n.to_string(),
            ValueKind::Float(n) => n.to_string(),
            ValueKind::Boolean(b) => b.to_string(),
            ValueKind::Null => "null".to_string(),
            _ => format!("{:?}", self.kind),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Null => "null",
            ValueKind::Boolean(_) => "boolean",
            ValueKind::Integer(_) => "integer",
            ValueKind::Float(_) => "float",
            ValueKind::String(_) => "string",
            ValueKind::Sequence(_) => "sequence",
            ValueKind::Mapping(_) => "mapping",
        }
    }

    /// Walk a segmented path. Mapping segments are keys; sequence segments
    /// must parse as indices. Any miss returns `None`.
    pub fn get_path(&self, path: &[String]) -> Option<&Value> {
        let mut node = self;
        for seg in path {
            node = match &node.kind {
                ValueKind::Mapping(map) => map.get(seg)?,
                ValueKind::Sequence(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Write a value at a segmented path, creating missing intermediate
    /// mapping keys as empty mappings. Existing scalar intermediates and
    /// out-of-range sequence indices are errors rather than replacements.
    pub fn set_path(&mut self, path: &[String], value: Value) -> Result<(), PathError> {
        let (last, front) = path.split_last().ok_or(PathError::EmptyPath)?;
        let mut node = self;
        for seg in front {
            node = match &mut node.kind {
                ValueKind::Mapping(map) => map
                    .entry(seg.clone())
                    .or_insert_with(|| Value::mapping(HashMap::new())),
                ValueKind::Sequence(items) => {
                    let idx = seg
                        .parse::<usize>()
                        .map_err(|_| PathError::BadIndex(seg.clone()))?;
                    items
                        .get_mut(idx)
                        .ok_or_else(|| PathError::BadIndex(seg.clone()))?
                }
                _ => return Err(PathError::NotAContainer(seg.clone())),
            };
        }
        match &mut node.kind {
            ValueKind::Mapping(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            ValueKind::Sequence(items) => {
                let idx = last
                    .parse::<usize>()
                    .map_err(|_| PathError::BadIndex(last.clone()))?;
                let slot = items
                    .get_mut(idx)
                    .ok_or_else(|| PathError::BadIndex(last.clone()))?;
                *slot = value;
                Ok(())
            }
            _ => Err(PathError::NotAContainer(last.clone())),
        }
    }

    /// Locate the node carrying `id` anywhere in this tree.
    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut Value> {
        if self.id == id {
            return Some(self);
        }
        match &mut self.kind {
            ValueKind::Mapping(map) => map.values_mut().find_map(|v| v.find_node_mut(id)),
            ValueKind::Sequence(items) => items.iter_mut().find_map(|v| v.find_node_mut(id)),
            _ => None,
        }
    }

    /// Independent copy with fresh node ids throughout. Used where a value
    /// must not alias the tree it came from (merge sources, root
    /// self-assignment).
    pub fn deep_copy(&self) -> Value {
        let kind = match &self.kind {
            ValueKind::Mapping(map) => ValueKind::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            ValueKind::Sequence(items) => {
                ValueKind::Sequence(items.iter().map(Value::deep_copy).collect())
            }
            other => other.clone(),
        };
        Value::new(kind)
    }
}

/// Recursive override merge: keys of `src` win over keys of `dst`.
/// Mappings merge key-by-key; everything else is replaced. Values taken
/// from `src` are deep-copied so the source never shares node ids with
/// the destination tree.
pub fn merge_override(dst: &mut HashMap<String, Value>, src: &HashMap<String, Value>) {
    for (key, value) in src {
        if let ValueKind::Mapping(src_map) = value.kind() {
            if let Some(existing) = dst.get_mut(key) {
                if let ValueKind::Mapping(dst_map) = &mut existing.kind {
                    merge_override(dst_map, src_map);
                    continue;
                }
            }
        }
        dst.insert(key.clone(), value.deep_copy());
    }
}
