//! Script variable store.
//!
//! Dependency files can define variables (`@name = expression`), test them in conditionals
//! (`?expression?directive`) and expand them in directive text (`$name`). All of them live in
//! a [`Config`]: a tree of named nodes addressed by dotted paths such as `vivado.jobs`.
//!
//! # Locking
//!
//! While unlocked the store auto-creates any missing node it is asked for, so reading
//! `a.b.c` from an empty store yields a fresh empty subtree instead of an error. Once locked,
//! reading an undefined path fails with [`ConfigError::UndefinedVariable`]. The lock state is
//! held by every subtree and propagated top-down by [`Config::lock`] and [`Config::unlock`].
//!
//! ```
//! use deptree::config::{Config, Value};
//!
//! let mut config = Config::new();
//! config.set("vivado.jobs", 4).unwrap();
//! assert_eq!(config.evaluate("vivado.jobs * 2").unwrap(), Value::Int(8));
//!
//! config.lock();
//! assert!(config.get("vivado.threads").is_err());
//! ```

pub mod expr;
pub mod template;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use itertools::Itertools;
use thiserror::Error;

pub use expr::{Expr, ExpressionError, Scope};

/// Errors raised by path lookups in a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Lookup of a path that does not exist in a locked store.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    /// A path walks through a scalar value.
    #[error("'{0}' holds a value, not a subtree")]
    NotABranch(String),
    #[error("invalid variable path '{0}'")]
    InvalidPath(String),
}

/// A value held by a leaf of the store, or produced by an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    /// A subtree, represented by the names of its children.
    Branch(Vec<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Branch(_) => "subtree",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::List(l) => !l.is_empty(),
            Value::Branch(_) => true,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Branch(_))
    }

    fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s),
            v => v.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::List(items) => write!(f, "[{}]", items.iter().map(Value::repr).join(", ")),
            Value::Branch(keys) => write!(f, "{{{}}}", keys.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A node of the variable tree.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Value),
    Branch(Branch),
}

impl Node {
    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf(v) => v.clone(),
            Node::Branch(b) => Value::Branch(b.children.keys().cloned().collect()),
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Node::Leaf(v) => Some(v),
            Node::Branch(_) => None,
        }
    }
}

/// Inner node of the variable tree.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    locked: bool,
    children: BTreeMap<String, Node>,
}

impl Branch {
    fn new(locked: bool) -> Self {
        Branch {
            locked,
            children: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        for child in self.children.values_mut() {
            if let Node::Branch(b) = child {
                b.set_locked(locked);
            }
        }
    }

    /// Returns the named child, creating an empty subtree for it when unlocked.
    fn child_mut(&mut self, name: &str, path: &str) -> Result<&mut Node, ConfigError> {
        let locked = self.locked;
        match self.children.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(_) if locked => Err(ConfigError::UndefinedVariable(path.to_string())),
            Entry::Vacant(e) => Ok(e.insert(Node::Branch(Branch::new(locked)))),
        }
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
        for (name, child) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            match child {
                Node::Leaf(v) => out.push((path, v)),
                Node::Branch(b) => b.collect_leaves(&path, out),
            }
        }
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, ConfigError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Auto-vivifying tree of script variables.
#[derive(Debug, Clone, Default)]
pub struct Config {
    trunk: Branch,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn is_locked(&self) -> bool {
        self.trunk.locked
    }

    /// Switches every existing subtree to strict lookups.
    pub fn lock(&mut self) {
        self.trunk.set_locked(true);
    }

    pub fn unlock(&mut self) {
        self.trunk.set_locked(false);
    }

    /// Looks up a dotted path.
    ///
    /// Missing nodes along the path are created as empty subtrees unless the store is locked,
    /// in which case the lookup fails with [`ConfigError::UndefinedVariable`].
    pub fn get(&mut self, path: &str) -> Result<&Node, ConfigError> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(ConfigError::InvalidPath(path.to_string()));
        };

        let mut branch = &mut self.trunk;
        for (i, segment) in parents.iter().enumerate() {
            branch = match branch.child_mut(segment, path)? {
                Node::Branch(b) => b,
                Node::Leaf(_) => return Err(ConfigError::NotABranch(segments[..=i].join("."))),
            };
        }
        branch.child_mut(last, path).map(|node| &*node)
    }

    /// Looks up a dotted path without creating anything.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let segments = split_path(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut node = self.trunk.children.get(*first)?;
        for segment in rest {
            node = match node {
                Node::Branch(b) => b.children.get(*segment)?,
                Node::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Stores a value at a dotted path.
    ///
    /// When locked, every ancestor of the target must already exist; the leaf itself may be
    /// created or overwritten.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(ConfigError::InvalidPath(path.to_string()));
        };

        let mut branch = &mut self.trunk;
        for (i, segment) in parents.iter().enumerate() {
            branch = match branch.child_mut(segment, path)? {
                Node::Branch(b) => b,
                Node::Leaf(_) => return Err(ConfigError::NotABranch(segments[..=i].join("."))),
            };
        }
        branch
            .children
            .insert(last.to_string(), Node::Leaf(value.into()));
        Ok(())
    }

    /// Evaluates an expression using the store as its namespace.
    ///
    /// Reading an unset name while unlocked materialises it as an empty subtree.
    pub fn evaluate(&mut self, expression: &str) -> Result<Value, ExpressionError> {
        Expr::parse(expression)?.eval(self)
    }

    /// All leaves as `(dotted path, value)`, sorted by path.
    pub fn leaves(&self) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        self.trunk.collect_leaves("", &mut out);
        out
    }
}

impl Scope for Config {
    fn resolve(&mut self, name: &str) -> Result<Value, ConfigError> {
        self.get(name).map(Node::to_value)
    }
}
