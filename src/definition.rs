//! Definition sources: where option trees come from.
//!
//! Every shape is turned into a [`Namespace`] and the results are merged into
//! one authoritative tree by [`assemble`] before any value is read. Plain
//! values in a mapping become options whose default is that value. A table
//! holding a `default` key is read as one option spec, the shape the JSON
//! writer emits:
//!
//! ```json
//! { "size": { "default": "100", "doc": "how big", "from_string_converter": "int",
//!             "short_form": "s" } }
//! ```

use indexmap::IndexMap;

use crate::convert;
use crate::error::NestfigError;
use crate::file::{json_scalar, toml_scalar};
use crate::merge::deep_merge;
use crate::namespace::Namespace;
use crate::option::{ConfigOption, OptionBuilder};
use crate::value::Value;

/// Something that declares the options it needs, e.g. a component that
/// wants a `host` and a `port`.
pub trait RequiredConfig {
    fn required_config() -> Result<Namespace, NestfigError>;
}

/// One definition source.
#[derive(Debug, Clone)]
pub enum Definition {
    Namespace(Namespace),
    /// Dotted keys to defaults: `{"c.x": "fred"}`.
    Mapping(IndexMap<String, Value>),
    Toml(toml::Table),
    Json(serde_json::Value),
}

impl Definition {
    /// The options declared by `T`.
    pub fn of<T: RequiredConfig>() -> Result<Self, NestfigError> {
        T::required_config().map(Definition::Namespace)
    }

    /// Parse TOML text into a definition.
    pub fn from_toml_str(content: &str) -> Result<Self, NestfigError> {
        content
            .parse::<toml::Table>()
            .map(Definition::Toml)
            .map_err(|e| NestfigError::ParseError {
                path: "<definition>".into(),
                reason: e.to_string(),
            })
    }

    pub fn into_namespace(self) -> Result<Namespace, NestfigError> {
        match self {
            Definition::Namespace(ns) => Ok(ns),
            Definition::Mapping(map) => {
                let mut ns = Namespace::new();
                for (path, value) in map {
                    let segments: Vec<&str> = path.split('.').collect();
                    let (name, parents) = segments
                        .split_last()
                        .ok_or_else(|| empty_key_error(&path))?;
                    let target = parents
                        .iter()
                        .try_fold(&mut ns, |ns, segment| ns.namespace(segment))?;
                    target.add_option(ConfigOption::builder(name).default(value))?;
                }
                Ok(ns)
            }
            Definition::Toml(table) => toml_namespace(&table),
            Definition::Json(serde_json::Value::Object(map)) => json_namespace(&map),
            Definition::Json(other) => Err(NestfigError::ParseError {
                path: "<definition>".into(),
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }
}

impl From<Namespace> for Definition {
    fn from(ns: Namespace) -> Self {
        Definition::Namespace(ns)
    }
}

/// Merge all definitions into one tree and check that no two options claim
/// the same short form.
pub fn assemble(definitions: impl IntoIterator<Item = Definition>) -> Result<Namespace, NestfigError> {
    let mut tree = Namespace::new();
    for definition in definitions {
        deep_merge(&mut tree, definition.into_namespace()?)?;
    }
    tree.check_short_forms()?;
    tracing::debug!(options = tree.keys_breadth_first(false).len(), "assembled option tree");
    Ok(tree)
}

fn empty_key_error(path: &str) -> NestfigError {
    NestfigError::OptionError {
        name: path.to_string(),
        reason: "empty option name".into(),
    }
}

fn toml_namespace(table: &toml::Table) -> Result<Namespace, NestfigError> {
    let mut ns = Namespace::new();
    for (key, value) in table {
        match value {
            toml::Value::Table(spec) if spec.contains_key("default") => {
                let fields = spec
                    .iter()
                    .map(|(k, v)| (k.as_str(), SpecField::Toml(v)))
                    .collect();
                ns.insert_option(option_from_spec(key, fields)?)?;
            }
            toml::Value::Table(sub) => {
                ns.add_namespace(key, toml_namespace(sub)?)?;
            }
            scalar => {
                ns.add_option(ConfigOption::builder(key).default(toml_scalar(scalar)))?;
            }
        }
    }
    Ok(ns)
}

fn json_namespace(map: &serde_json::Map<String, serde_json::Value>) -> Result<Namespace, NestfigError> {
    let mut ns = Namespace::new();
    for (key, value) in map {
        match value {
            serde_json::Value::Object(spec) if spec.contains_key("default") => {
                let fields = spec
                    .iter()
                    .map(|(k, v)| (k.as_str(), SpecField::Json(v)))
                    .collect();
                ns.insert_option(option_from_spec(key, fields)?)?;
            }
            serde_json::Value::Object(sub) => {
                ns.add_namespace(key, json_namespace(sub)?)?;
            }
            scalar => {
                ns.add_option(ConfigOption::builder(key).default(json_scalar(scalar)))?;
            }
        }
    }
    Ok(ns)
}

enum SpecField<'a> {
    Toml(&'a toml::Value),
    Json(&'a serde_json::Value),
}

impl SpecField<'_> {
    fn value(&self) -> Value {
        match self {
            SpecField::Toml(v) => toml_scalar(v),
            SpecField::Json(v) => json_scalar(v),
        }
    }

    fn text(&self) -> Option<String> {
        match self.value() {
            Value::Null => None,
            Value::Str(s) => Some(s),
            other => Some(convert::to_str(&other)),
        }
    }

    fn flag(&self) -> bool {
        matches!(self.value(), Value::Bool(true))
    }
}

fn option_from_spec(key: &str, fields: IndexMap<&str, SpecField<'_>>) -> Result<ConfigOption, NestfigError> {
    let mut builder: OptionBuilder = ConfigOption::builder(key);
    for (field, value) in &fields {
        builder = match *field {
            "default" => builder.default(value.value()),
            "doc" => match value.text() {
                Some(doc) => builder.doc(&doc),
                None => builder,
            },
            "annotation" => match value.text() {
                Some(text) => builder.annotation(&text),
                None => builder,
            },
            "short_form" => match value.text().and_then(|s| s.chars().next()) {
                Some(c) => builder.short_form(c),
                None => builder,
            },
            "from_string_converter" => {
                let Some(name) = value.text() else {
                    continue;
                };
                let converter = convert::registry().by_name(&name).ok_or_else(|| {
                    NestfigError::OptionError {
                        name: key.to_string(),
                        reason: format!("unknown converter '{name}'"),
                    }
                })?;
                builder.converter(converter)
            }
            "is_argument" => builder.is_argument(value.flag()),
            "exclude_from_print" => builder.exclude_from_print(value.flag()),
            "exclude_from_dump" => builder.exclude_from_dump(value.flag()),
            _ => builder,
        };
    }
    let mut option = builder.build()?;
    if let Some(value) = fields.get("value")
        && let Some(text) = value.text()
    {
        option.set_value(text.into())?;
    }
    Ok(option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Database, simple_tree};

    #[test]
    fn mapping_definition_builds_namespaces() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("c.x".to_string(), Value::from("fred"));
        map.insert("c.y".to_string(), Value::Float(3.14159));
        let ns = Definition::Mapping(map).into_namespace().unwrap();
        assert_eq!(ns.keys_breadth_first(false), vec!["a", "c.x", "c.y"]);
        assert_eq!(ns.option("c.y").unwrap().converter().name(), "float");
    }

    #[test]
    fn toml_definition_wraps_plain_values() {
        let def = Definition::from_toml_str(
            r#"
            a = 1
            b = 17

            [c]
            x = "fred"
            y = 3.14159
            z = 99
            "#,
        )
        .unwrap();
        let ns = def.into_namespace().unwrap();
        assert_eq!(ns.value("c.z"), Some(&Value::Int(99)));
        assert_eq!(ns.value("c.x"), Some(&Value::from("fred")));
    }

    #[test]
    fn toml_option_spec_tables() {
        let def = Definition::from_toml_str(
            r#"
            [size]
            default = "100"
            doc = "how big in tons"
            short_form = "s"
            from_string_converter = "int"
            "#,
        )
        .unwrap();
        let ns = def.into_namespace().unwrap();
        let size = ns.option("size").unwrap();
        assert_eq!(size.value(), &Value::Int(100));
        assert_eq!(size.doc(), Some("how big in tons"));
        assert_eq!(size.short_form(), Some('s'));
    }

    #[test]
    fn json_option_spec_with_value() {
        let json = serde_json::json!({
            "d": {
                "ethel": {
                    "name": "ethel",
                    "default": "silly",
                    "doc": "female neighbor from I Love Lucy",
                    "value": "goofy",
                    "from_string_converter": "str",
                    "short_form": null
                }
            }
        });
        let ns = Definition::Json(json).into_namespace().unwrap();
        let ethel = ns.option("d.ethel").unwrap();
        assert_eq!(ethel.default(), &Value::from("silly"));
        assert_eq!(ethel.value(), &Value::from("goofy"));
        assert_eq!(ethel.short_form(), None);
    }

    #[test]
    fn unknown_converter_name_is_an_error() {
        let json = serde_json::json!({"a": {"default": "1", "from_string_converter": "eval"}});
        let err = Definition::Json(json).into_namespace().unwrap_err();
        assert!(err.to_string().contains("eval"));
    }

    #[test]
    fn json_must_be_an_object() {
        let err = Definition::Json(serde_json::json!([1, 2]))
            .into_namespace()
            .unwrap_err();
        assert!(matches!(err, NestfigError::ParseError { .. }));
    }

    #[test]
    fn assemble_merges_required_config() {
        let mut wrapper = Namespace::new();
        wrapper
            .add_namespace("database", Database::required_config().unwrap())
            .unwrap();
        let tree = assemble([Definition::Namespace(simple_tree()), wrapper.into()]).unwrap();
        assert!(tree.contains("database.host"));
        assert!(tree.contains("c.z"));
        assert_eq!(tree.get("database").unwrap().as_namespace().unwrap().doc(), Some("database connection"));
    }

    #[test]
    fn assemble_rejects_conflicts_before_values() {
        let mut other = Namespace::new();
        other
            .add_option(ConfigOption::builder("a").default(2))
            .unwrap();
        let err = assemble([simple_tree().into(), other.into()]).unwrap_err();
        assert!(matches!(err, NestfigError::DefinitionConflict { .. }));
    }

    #[test]
    fn definition_of_required_config() {
        let ns = Definition::of::<Database>().unwrap().into_namespace().unwrap();
        assert_eq!(ns.keys_breadth_first(false), vec!["host", "port", "url"]);
    }
}
