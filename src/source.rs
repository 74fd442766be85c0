//! Value sources: anything that can contribute values to an option tree.
//!
//! A source hands the overlay engine a [`SourceMap`]: keys are either dotted
//! paths (`"c.z"`) or nested tables, values are raw strings, typed values or
//! [`DontCare`] sentinels. Conversion is left to the option that receives the
//! value, so the same string means the same thing whichever source supplied it.

use indexmap::IndexMap;
use serde::Serialize;

use crate::dontcare::DontCare;
use crate::error::NestfigError;
use crate::flatten;
use crate::namespace::Namespace;
use crate::option::ConfigOption;
use crate::value::Value;

/// The values one source contributes, in the order the source yields them.
pub type SourceMap = IndexMap<String, SourceValue>;

/// A single contributed value.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// Raw text, converted by the receiving option.
    Str(String),
    /// An already-typed value.
    Typed(Value),
    /// A default echoed back by a command-line parser.
    DontCare(DontCare<Value>),
    /// A nested table: a namespace's values, or an option given as a table
    /// with a `default` key.
    Table(SourceMap),
    /// A whole option; its default becomes the value.
    Option(Box<ConfigOption>),
}

impl From<&str> for SourceValue {
    fn from(v: &str) -> Self {
        SourceValue::Str(v.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(v: String) -> Self {
        SourceValue::Str(v)
    }
}

impl From<Value> for SourceValue {
    fn from(v: Value) -> Self {
        SourceValue::Typed(v)
    }
}

impl From<bool> for SourceValue {
    fn from(v: bool) -> Self {
        SourceValue::Typed(Value::Bool(v))
    }
}

impl From<i64> for SourceValue {
    fn from(v: i64) -> Self {
        SourceValue::Typed(Value::Int(v))
    }
}

impl From<i32> for SourceValue {
    fn from(v: i32) -> Self {
        SourceValue::Typed(Value::Int(v.into()))
    }
}

impl From<f64> for SourceValue {
    fn from(v: f64) -> Self {
        SourceValue::Typed(Value::Float(v))
    }
}

impl From<DontCare<Value>> for SourceValue {
    fn from(v: DontCare<Value>) -> Self {
        SourceValue::DontCare(v)
    }
}

impl From<SourceMap> for SourceValue {
    fn from(v: SourceMap) -> Self {
        SourceValue::Table(v)
    }
}

impl From<ConfigOption> for SourceValue {
    fn from(v: ConfigOption) -> Self {
        SourceValue::Option(Box::new(v))
    }
}

/// What kind of source this is. Command-line sources are held to stricter
/// rules by the overlay engine: an unknown key is always an error and
/// single-character keys are resolved as short forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mapping,
    Environment,
    File,
    CommandLine,
}

/// A provider of values for an option tree.
pub trait ValueSource {
    /// Name used in log lines and error messages.
    fn name(&self) -> String;

    fn kind(&self) -> SourceKind {
        SourceKind::Mapping
    }

    fn is_command_line(&self) -> bool {
        self.kind() == SourceKind::CommandLine
    }

    /// This source's contribution. `tree` is the complete option tree, which
    /// sources that need to know the options (command lines) consult.
    fn get_values(
        &self,
        tree: &Namespace,
        ignore_mismatches: bool,
    ) -> Result<SourceMap, NestfigError>;

    /// Tokens this source could not attribute to any option, discovered in a
    /// lenient pass. Only command-line sources report any.
    fn extra_args(&self, _tree: &Namespace) -> Result<Vec<String>, NestfigError> {
        Ok(Vec::new())
    }
}

/// An in-memory value source.
#[derive(Debug, Clone, Default)]
pub struct MappingSource {
    name: String,
    entries: SourceMap,
}

impl MappingSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: SourceMap::new(),
        }
    }

    /// Add an entry. `key` may be dotted.
    pub fn with(mut self, key: &str, value: impl Into<SourceValue>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<SourceValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn from_map(name: &str, entries: SourceMap) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }

    /// Build a source from any `Serialize` value, e.g. a parsed clap struct.
    ///
    /// Fields are flattened into dotted keys; `None` fields are skipped so
    /// that absent optional arguments leave lower-priority values alone.
    pub fn from_serialize<S: Serialize>(name: &str, source: &S) -> Result<Self, NestfigError> {
        let pairs = flatten::flatten(source).map_err(|e| NestfigError::OptionError {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let entries = pairs
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, SourceValue::Typed(v))))
            .collect();
        Ok(Self::from_map(name, entries))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ValueSource for MappingSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn get_values(&self, _tree: &Namespace, _ignore: bool) -> Result<SourceMap, NestfigError> {
        Ok(self.entries.clone())
    }
}

/// A resolved tree used as a source: every option contributes its value.
impl ValueSource for Namespace {
    fn name(&self) -> String {
        "namespace".to_string()
    }

    fn get_values(&self, _tree: &Namespace, _ignore: bool) -> Result<SourceMap, NestfigError> {
        Ok(self
            .keys_breadth_first(false)
            .into_iter()
            .filter_map(|path| {
                let value = self.option(&path)?.value().clone();
                Some((path, SourceValue::Typed(value)))
            })
            .collect())
    }
}

/// Insert `value` at a dotted `path`, creating intermediate tables.
pub fn insert_nested(map: &mut SourceMap, path: &[&str], value: SourceValue) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.to_string(), value);
        return;
    }
    let sub = map
        .entry(first.to_string())
        .or_insert_with(|| SourceValue::Table(SourceMap::new()));
    if !matches!(sub, SourceValue::Table(_)) {
        *sub = SourceValue::Table(SourceMap::new());
    }
    if let SourceValue::Table(table) = sub {
        insert_nested(table, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Args {
        action: Option<String>,
        text: String,
        limits: Limits,
    }

    #[derive(Serialize)]
    struct Limits {
        size: Option<u32>,
    }

    #[test]
    fn from_serialize_skips_none() {
        let args = Args {
            action: None,
            text: "hello".into(),
            limits: Limits { size: Some(9) },
        };
        let source = MappingSource::from_serialize("args", &args).unwrap();
        let values = source.get_values(&Namespace::new(), false).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["text"], SourceValue::Typed(Value::from("hello")));
        assert_eq!(values["limits.size"], SourceValue::Typed(Value::Int(9)));
    }

    #[test]
    fn mapping_source_keeps_insertion_order() {
        let source = MappingSource::new("m")
            .with("b", 1)
            .with("a", "x")
            .with("c.z", 22);
        let values = source.get_values(&Namespace::new(), false).unwrap();
        let keys: Vec<_> = values.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c.z"]);
        assert_eq!(source.kind(), SourceKind::Mapping);
        assert!(!source.is_command_line());
    }

    #[test]
    fn insert_nested_builds_tables() {
        let mut map = SourceMap::new();
        insert_nested(&mut map, &["d", "x", "size"], "100".into());
        insert_nested(&mut map, &["d", "fred"], "f".into());
        let SourceValue::Table(d) = &map["d"] else {
            panic!("expected table");
        };
        assert_eq!(d["fred"], SourceValue::from("f"));
        let SourceValue::Table(x) = &d["x"] else {
            panic!("expected table");
        };
        assert_eq!(x["size"], SourceValue::from("100"));
    }
}
