//! Immutable tree values and the paths that address them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Number, Value};

/// A key inside a [`Node::Map`].
///
/// Entity lookup tables are keyed by numeric id; everything else, including
/// the fields of an entity converted from JSON, is keyed by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Id(i64),
    Name(Arc<str>),
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Id(id)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(Arc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Arc::from(name))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{id}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

/// An immutable value in the state tree.
///
/// Containers are reference counted, so cloning a node is cheap and two
/// snapshots share every subtree an update did not touch. Equality is
/// structural, but shared containers compare equal without being walked.
#[derive(Clone, Debug, Default)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Node>>),
    Map(Arc<BTreeMap<Key, Node>>),
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Int(a), Node::Int(b)) => a == b,
            (Node::Float(a), Node::Float(b)) => a == b,
            (Node::Str(a), Node::Str(b)) => a == b,
            (Node::List(a), Node::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Node::Map(a), Node::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Node {
    pub fn empty_map() -> Self {
        Node::Map(Arc::new(BTreeMap::new()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Key, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key if this node is a map.
    pub fn get(&self, key: &Key) -> Option<&Node> {
        self.as_map()?.get(key)
    }

    /// Look up a named field if this node is a map.
    pub fn field(&self, name: &str) -> Option<&Node> {
        self.get(&Key::from(name))
    }

    /// Number of entries in a map or list; zero for scalars.
    pub fn len(&self) -> usize {
        match self {
            Node::Map(map) => map.len(),
            Node::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a JSON value. Object keys become [`Key::Name`].
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Int(i),
                None => Node::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Node::Str(Arc::from(s.as_str())),
            Value::Array(items) => {
                Node::List(Arc::new(items.iter().map(Node::from_json).collect()))
            }
            Value::Object(fields) => Node::Map(Arc::new(
                fields
                    .iter()
                    .map(|(k, v)| (Key::from(k.as_str()), Node::from_json(v)))
                    .collect(),
            )),
        }
    }

    /// Convert back to JSON. Numeric keys are written as decimal strings and
    /// non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Int(i) => Value::Number((*i).into()),
            Node::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Node::Str(s) => Value::String(s.to_string()),
            Node::List(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Map(map) => {
                let mut fields = JsonMap::new();
                for (k, v) in map.iter() {
                    fields.insert(k.to_string(), v.to_json());
                }
                Value::Object(fields)
            }
        }
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Int(i)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Str(Arc::from(s))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Str(Arc::from(s))
    }
}

impl FromIterator<(Key, Node)> for Node {
    fn from_iter<I: IntoIterator<Item = (Key, Node)>>(iter: I) -> Self {
        Node::Map(Arc::new(iter.into_iter().collect()))
    }
}

/// A sequence of keys from the root of the tree to a node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Key>);

impl Path {
    /// The empty path, addressing the root node.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend the path by one key.
    pub fn child(mut self, key: impl Into<Key>) -> Self {
        self.0.push(key.into());
        self
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.0.starts_with(&other.0)
    }

    pub(crate) fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len].to_vec())
    }
}

impl FromIterator<Key> for Path {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for key in &self.0 {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}
