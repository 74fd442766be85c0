//! Ordered, nested option trees.
//!
//! A [`Namespace`] maps names to [`Node`]s in declaration order. Dotted paths
//! (`"d.x.size"`) address into nested namespaces: every segment but the last
//! must name a namespace.
//!
//! Traversal is breadth-first per level: a namespace yields all of its direct
//! options before descending into its child namespaces, and children are
//! visited in the order they were declared.

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::NestfigError;
use crate::option::{Aggregation, ConfigOption, OptionBuilder};
use crate::value::Value;

/// An entry in a [`Namespace`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Option(ConfigOption),
    Namespace(Namespace),
    Aggregation(Aggregation),
}

impl Node {
    pub fn as_option(&self) -> Option<&ConfigOption> {
        match self {
            Node::Option(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Node::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self, Node::Namespace(_))
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self {
            Node::Option(_) => "option",
            Node::Namespace(_) => "namespace",
            Node::Aggregation(_) => "aggregation",
        }
    }
}

/// An ordered, nested container of options, aggregations and namespaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    doc: Option<String>,
    entries: IndexMap<String, Node>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(doc: &str) -> Self {
        Self {
            doc: Some(doc.to_string()),
            entries: IndexMap::new(),
        }
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn set_doc(&mut self, doc: &str) {
        self.doc = Some(doc.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn entries_mut(&mut self) -> &mut IndexMap<String, Node> {
        &mut self.entries
    }

    pub(crate) fn into_parts(self) -> (Option<String>, IndexMap<String, Node>) {
        (self.doc, self.entries)
    }

    /// Build an option and add it under its name.
    pub fn add_option(&mut self, builder: OptionBuilder) -> Result<&mut ConfigOption, NestfigError> {
        self.insert_option(builder.build()?)
    }

    /// Add a ready-made option under its name.
    pub fn insert_option(&mut self, option: ConfigOption) -> Result<&mut ConfigOption, NestfigError> {
        let name = option.name().to_string();
        match self.insert_node(&name, Node::Option(option))? {
            Node::Option(o) => Ok(o),
            _ => unreachable!("just inserted an option"),
        }
    }

    /// Register a value computed after overlay.
    pub fn add_aggregation<F>(&mut self, name: &str, function: F) -> Result<(), NestfigError>
    where
        F: Fn(&Config, &Config, &[String]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert_node(name, Node::Aggregation(Aggregation::new(name, function)))?;
        Ok(())
    }

    /// Add `namespace` as a child named `name`.
    pub fn add_namespace(
        &mut self,
        name: &str,
        namespace: Namespace,
    ) -> Result<&mut Namespace, NestfigError> {
        match self.insert_node(name, Node::Namespace(namespace))? {
            Node::Namespace(ns) => Ok(ns),
            _ => unreachable!("just inserted a namespace"),
        }
    }

    /// The child namespace `name`, created empty if missing.
    pub fn namespace(&mut self, name: &str) -> Result<&mut Namespace, NestfigError> {
        let node = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Node::Namespace(Namespace::new()));
        match node {
            Node::Namespace(ns) => Ok(ns),
            other => Err(NestfigError::OptionError {
                name: name.to_string(),
                reason: format!("already an {}, not a namespace", other.kind_label()),
            }),
        }
    }

    pub(crate) fn insert_node(&mut self, name: &str, node: Node) -> Result<&mut Node, NestfigError> {
        if name.is_empty() || name.contains('.') {
            return Err(NestfigError::OptionError {
                name: name.to_string(),
                reason: "names must be non-empty and must not contain '.'".into(),
            });
        }
        if self.entries.contains_key(name) {
            return Err(NestfigError::DuplicateName {
                name: name.to_string(),
            });
        }
        let (index, _) = self.entries.insert_full(name.to_string(), node);
        Ok(&mut self.entries[index])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// The node at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (self.get_namespace(parent)?, last),
            None => (self, path),
        };
        parent.entries.get(last)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Node> {
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (self.get_namespace_mut(parent)?, last),
            None => (self, path),
        };
        parent.entries.get_mut(last)
    }

    fn get_namespace(&self, path: &str) -> Option<&Namespace> {
        path.split('.')
            .try_fold(self, |ns, segment| ns.entries.get(segment)?.as_namespace())
    }

    fn get_namespace_mut(&mut self, path: &str) -> Option<&mut Namespace> {
        path.split('.').try_fold(self, |ns, segment| {
            match ns.entries.get_mut(segment)? {
                Node::Namespace(child) => Some(child),
                _ => None,
            }
        })
    }

    /// The option at a dotted path.
    pub fn option(&self, path: &str) -> Option<&ConfigOption> {
        self.get(path)?.as_option()
    }

    pub fn option_mut(&mut self, path: &str) -> Option<&mut ConfigOption> {
        match self.get_mut(path)? {
            Node::Option(o) => Some(o),
            _ => None,
        }
    }

    /// The current value at a dotted path.
    pub fn value(&self, path: &str) -> Option<&Value> {
        self.option(path).map(ConfigOption::value)
    }

    /// Dotted paths of every option (and aggregation), breadth-first.
    /// With `include_namespaces`, namespace paths are listed too, in the
    /// position they are declared.
    pub fn keys_breadth_first(&self, include_namespaces: bool) -> Vec<String> {
        self.walk()
            .into_iter()
            .filter(|(_, _, node)| include_namespaces || !node.is_namespace())
            .map(|(path, _, _)| path)
            .collect()
    }

    /// Every node with its dotted path and local name, breadth-first.
    pub fn walk(&self) -> Vec<(String, &str, &Node)> {
        let mut out = Vec::new();
        self.walk_into("", &mut out);
        out
    }

    fn walk_into<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a str, &'a Node)>) {
        let mut children = Vec::new();
        for (name, node) in &self.entries {
            let path = dotted(prefix, name);
            if let Node::Namespace(ns) = node {
                children.push((path.clone(), ns));
            }
            out.push((path, name.as_str(), node));
        }
        for (path, ns) in children {
            ns.walk_into(&path, out);
        }
    }

    /// Find the option claiming `short_form`, searching the whole tree.
    pub fn option_by_short_form(&self, short_form: char) -> Option<(String, &ConfigOption)> {
        self.walk().into_iter().find_map(|(path, _, node)| {
            let option = node.as_option()?;
            (option.short_form() == Some(short_form)).then_some((path, option))
        })
    }

    /// Error if two options in the tree claim the same short form.
    pub fn check_short_forms(&self) -> Result<(), NestfigError> {
        let mut claimed: IndexMap<char, String> = IndexMap::new();
        for (path, _, node) in self.walk() {
            let Some(short_form) = node.as_option().and_then(ConfigOption::short_form) else {
                continue;
            };
            if let Some(first) = claimed.get(&short_form) {
                return Err(NestfigError::DuplicateShortForm {
                    short_form,
                    first: first.clone(),
                    second: path,
                });
            }
            claimed.insert(short_form, path);
        }
        Ok(())
    }
}

pub(crate) fn dotted(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{flintstones, simple_tree};

    #[test]
    fn breadth_first_lists_direct_options_first() {
        let tree = flintstones();
        assert_eq!(
            tree.keys_breadth_first(false),
            vec![
                "aaa",
                "c.fred",
                "c.wilma",
                "d.fred",
                "d.ethel",
                "d.x.size",
                "d.x.password",
            ]
        );
    }

    #[test]
    fn breadth_first_with_namespaces() {
        let tree = flintstones();
        assert_eq!(
            tree.keys_breadth_first(true),
            vec![
                "aaa",
                "c",
                "d",
                "c.fred",
                "c.wilma",
                "d.fred",
                "d.ethel",
                "d.x",
                "d.x.size",
                "d.x.password",
            ]
        );
    }

    #[test]
    fn dotted_lookup() {
        let tree = flintstones();
        assert_eq!(tree.value("d.x.size"), Some(&Value::Int(100)));
        assert_eq!(tree.value("c.fred"), Some(&Value::from("stupid")));
        assert!(tree.get("d.x").unwrap().is_namespace());
        assert!(tree.option("d.x").is_none());
        assert!(tree.get("c.fred.deeper").is_none());
        assert!(tree.get("nope").is_none());
        assert!(tree.get("x.size").is_none());
    }

    #[test]
    fn option_mut_reaches_nested() {
        let mut tree = simple_tree();
        tree.option_mut("c.z")
            .unwrap()
            .set_value("22".into())
            .unwrap();
        assert_eq!(tree.value("c.z"), Some(&Value::Int(22)));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut ns = Namespace::new();
        ns.add_option(ConfigOption::builder("a").default(1)).unwrap();
        let err = ns
            .add_option(ConfigOption::builder("a").default(2))
            .unwrap_err();
        assert!(matches!(err, NestfigError::DuplicateName { .. }));
        let err = ns.add_aggregation("a", |_, _, _| Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, NestfigError::DuplicateName { .. }));
    }

    #[test]
    fn dotted_names_rejected() {
        let mut ns = Namespace::new();
        let err = ns
            .add_option(ConfigOption::builder("a.b").default(1))
            .unwrap_err();
        assert!(matches!(err, NestfigError::OptionError { .. }));
    }

    #[test]
    fn namespace_creates_or_reuses() {
        let mut ns = Namespace::new();
        ns.namespace("c")
            .unwrap()
            .add_option(ConfigOption::builder("x").default("fred"))
            .unwrap();
        ns.namespace("c")
            .unwrap()
            .add_option(ConfigOption::builder("y").default(3.14159))
            .unwrap();
        assert_eq!(ns.keys_breadth_first(false), vec!["c.x", "c.y"]);

        ns.add_option(ConfigOption::builder("a").default(1)).unwrap();
        assert!(ns.namespace("a").is_err());
    }

    #[test]
    fn walk_reports_local_names() {
        let tree = flintstones();
        let walked: Vec<_> = tree
            .walk()
            .into_iter()
            .map(|(path, name, node)| (path, name.to_string(), node.kind_label()))
            .collect();
        assert_eq!(walked[0], ("aaa".to_string(), "aaa".to_string(), "option"));
        assert!(walked.contains(&("d.x".to_string(), "x".to_string(), "namespace")));
        assert!(walked.contains(&("d.x.size".to_string(), "size".to_string(), "option")));
    }

    #[test]
    fn short_form_lookup() {
        let tree = flintstones();
        let (path, option) = tree.option_by_short_form('s').unwrap();
        assert_eq!(path, "d.x.size");
        assert_eq!(option.name(), "size");
        assert!(tree.option_by_short_form('q').is_none());
        tree.check_short_forms().unwrap();
    }

    #[test]
    fn conflicting_short_forms_detected() {
        let mut tree = flintstones();
        tree.add_option(ConfigOption::builder("speed").default(1).short_form('s'))
            .unwrap();
        let err = tree.check_short_forms().unwrap_err();
        match err {
            NestfigError::DuplicateShortForm { first, second, .. } => {
                assert_eq!(first, "speed");
                assert_eq!(second, "d.x.size");
            }
            other => panic!("Expected DuplicateShortForm, got {other:?}"),
        }
    }
}
