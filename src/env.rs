use crate::error::NestfigError;
use crate::namespace::Namespace;
use crate::source::{SourceKind, SourceMap, SourceValue, ValueSource, insert_nested};

/// Environment variables matching `{PREFIX}__*` as a value source.
///
/// Double underscore `__` separates nesting levels; a single `_` is part of
/// the name. Segments are lowercased, so `MYAPP__D__X__SIZE=7` sets `d.x.size`.
/// Values stay strings; the receiving option converts them.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    vars: Vec<(String, String)>,
}

impl EnvSource {
    /// Snapshot the process environment.
    pub fn new(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Use the given pairs instead of the process environment.
    pub fn from_vars(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let needle = format!("{prefix}__");
        Self {
            prefix: prefix.to_string(),
            vars: vars
                .into_iter()
                .filter(|(key, _)| key.len() > needle.len() && key.starts_with(&needle))
                .collect(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ValueSource for EnvSource {
    fn name(&self) -> String {
        format!("environment ({}__*)", self.prefix)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Environment
    }

    fn get_values(&self, _tree: &Namespace, _ignore: bool) -> Result<SourceMap, NestfigError> {
        let needle = format!("{}__", self.prefix);
        let mut map = SourceMap::new();
        for (key, value) in &self.vars {
            let Some(rest) = key.strip_prefix(&needle) else {
                continue;
            };
            let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
            let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
            insert_nested(&mut map, &segments, SourceValue::Str(value.clone()));
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn values(prefix: &str, pairs: &[(&str, &str)]) -> SourceMap {
        EnvSource::from_vars(prefix, vars(pairs))
            .get_values(&Namespace::new(), false)
            .unwrap()
    }

    fn table<'a>(map: &'a SourceMap, key: &str) -> &'a SourceMap {
        match &map[key] {
            SourceValue::Table(t) => t,
            other => panic!("Expected table at {key}, got {other:?}"),
        }
    }

    #[test]
    fn top_level_key() {
        let map = values("MYAPP", &[("MYAPP__A", "2")]);
        assert_eq!(map["a"], SourceValue::from("2"));
    }

    #[test]
    fn nested_keys() {
        let map = values("MYAPP", &[("MYAPP__D__X__SIZE", "7"), ("MYAPP__C__X", "noob")]);
        let d = table(&map, "d");
        assert_eq!(table(d, "x")["size"], SourceValue::from("7"));
        assert_eq!(table(&map, "c")["x"], SourceValue::from("noob"));
    }

    #[test]
    fn single_underscore_preserved() {
        let map = values("MYAPP", &[("MYAPP__POOL_SIZE", "10")]);
        assert_eq!(map["pool_size"], SourceValue::from("10"));
    }

    #[test]
    fn values_are_not_interpreted() {
        let map = values("MYAPP", &[("MYAPP__DEBUG", "TRUE"), ("MYAPP__RATE", "1.50")]);
        assert_eq!(map["debug"], SourceValue::from("TRUE"));
        assert_eq!(map["rate"], SourceValue::from("1.50"));
    }

    #[test]
    fn unrelated_and_bare_prefix_ignored() {
        let map = values(
            "MYAPP",
            &[("OTHER__HOST", "x"), ("MYAPP", "x"), ("MYAPP__", "x"), ("MYAPP_HOST", "x")],
        );
        assert!(map.is_empty());
    }

    #[test]
    fn names_itself_after_prefix() {
        let source = EnvSource::from_vars("APP", vec![]);
        assert_eq!(source.kind(), SourceKind::Environment);
        assert!(source.name().contains("APP__"));
        assert_eq!(source.prefix(), "APP");
    }
}
