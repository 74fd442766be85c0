//! The resolved configuration: a plain nested view of final values.

use std::ops::Index;

use indexmap::IndexMap;

use crate::namespace::{Namespace, Node};
use crate::value::Value;

/// An entry of a [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Value(Value),
    Table(Config),
}

/// Final option values (and aggregation results) keyed by name, nested like
/// the option tree they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    entries: IndexMap<String, Entry>,
}

static NULL: Value = Value::Null;

impl Config {
    /// Snapshot the current values of `tree`. Aggregations are not included;
    /// the overlay engine adds their results.
    pub fn from_namespace(tree: &Namespace) -> Self {
        let mut entries = IndexMap::new();
        for (name, node) in tree.iter() {
            match node {
                Node::Option(option) => {
                    entries.insert(name.to_string(), Entry::Value(option.value().clone()));
                }
                Node::Namespace(ns) => {
                    entries.insert(name.to_string(), Entry::Table(Config::from_namespace(ns)));
                }
                Node::Aggregation(_) => {}
            }
        }
        Self { entries }
    }

    /// The value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        match self.entry(path)? {
            Entry::Value(v) => Some(v),
            Entry::Table(_) => None,
        }
    }

    /// The nested table at a dotted path. The empty path is `self`.
    pub fn table(&self, path: &str) -> Option<&Config> {
        if path.is_empty() {
            return Some(self);
        }
        match self.entry(path)? {
            Entry::Table(t) => Some(t),
            Entry::Value(_) => None,
        }
    }

    fn entry(&self, path: &str) -> Option<&Entry> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.entries.get(first)?, |entry, segment| match entry {
            Entry::Table(t) => t.entries.get(segment),
            Entry::Value(_) => None,
        })
    }

    /// Set the value at a dotted path, creating tables on the way.
    pub fn insert(&mut self, path: &str, value: Value) {
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (self.table_mut(parent), last),
            None => (self, path),
        };
        parent
            .entries
            .insert(last.to_string(), Entry::Value(value));
    }

    fn table_mut(&mut self, path: &str) -> &mut Config {
        path.split('.').fold(self, |config, segment| {
            let entry = config
                .entries
                .entry(segment.to_string())
                .or_insert_with(|| Entry::Table(Config::default()));
            if !matches!(entry, Entry::Table(_)) {
                *entry = Entry::Table(Config::default());
            }
            match entry {
                Entry::Table(t) => t,
                Entry::Value(_) => unreachable!("replaced by a table above"),
            }
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }

    /// Direct entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every value with its dotted path, breadth-first per level.
    pub fn flatten(&self) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
        let mut tables = Vec::new();
        for (key, entry) in &self.entries {
            let path = crate::namespace::dotted(prefix, key);
            match entry {
                Entry::Value(v) => out.push((path, v)),
                Entry::Table(t) => tables.push((path, t)),
            }
        }
        for (path, table) in tables {
            table.flatten_into(&path, out);
        }
    }
}

/// `config["c.z"]`; missing paths index to `Value::Null`.
impl Index<&str> for Config {
    type Output = Value;

    fn index(&self, path: &str) -> &Value {
        self.get(path).unwrap_or(&NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::simple_tree;

    #[test]
    fn snapshot_keeps_nesting() {
        let config = Config::from_namespace(&simple_tree());
        assert_eq!(config["a"], Value::Int(1));
        assert_eq!(config["c.x"], Value::from("fred"));
        assert!(config.table("c").is_some());
        assert!(config.get("c").is_none());
        assert_eq!(config["missing.key"], Value::Null);
    }

    #[test]
    fn flatten_lists_direct_values_first() {
        let config = Config::from_namespace(&simple_tree());
        let keys: Vec<_> = config.flatten().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c.x", "c.y", "c.z"]);
    }

    #[test]
    fn insert_creates_tables() {
        let mut config = Config::default();
        config.insert("db.url", Value::from("pg://"));
        config.insert("top", Value::Int(1));
        assert_eq!(config["db.url"], Value::from("pg://"));
        assert_eq!(config.len(), 2);
        assert!(config.contains("db"));
    }

    #[test]
    fn table_of_empty_path_is_root() {
        let config = Config::from_namespace(&simple_tree());
        assert_eq!(config.table(""), Some(&config));
    }
}
