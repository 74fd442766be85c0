//! Flatten any `Serialize` value into dotted `(key, Value)` pairs. This is
//! how a parsed argument struct, or any other in-memory struct, becomes a
//! value source.
//!
//! The value is serialized to a `serde_json::Value` first and then walked;
//! JSON objects become dotted paths and JSON leaves become [`Value`]s.

use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::file::json_scalar;
use crate::namespace::dotted;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
#[error("flatten error: {0}")]
pub struct FlattenError(String);

/// Flatten a `Serialize` value into dotted key-value pairs.
///
/// `None` fields come out as `(key, None)` so callers can tell "absent" from
/// a present value. Structs and maps recurse into dotted paths:
/// `Outer { database: Inner { url: "pg://" } }` gives
/// `[("database.url", Some(Value::Str("pg://")))]`. Sequences become
/// [`Value::List`]; their elements must be scalars.
pub fn flatten<S: Serialize>(source: &S) -> Result<Vec<(String, Option<Value>)>, FlattenError> {
    let json = serde_json::to_value(source).map_err(|e| FlattenError(e.to_string()))?;
    let Json::Object(map) = json else {
        return Err(FlattenError(format!("expected a struct or map, got {json}")));
    };
    let mut out = Vec::new();
    walk("", &map, &mut out)?;
    Ok(out)
}

fn walk(
    prefix: &str,
    map: &Map<String, Json>,
    out: &mut Vec<(String, Option<Value>)>,
) -> Result<(), FlattenError> {
    for (key, value) in map {
        let path = dotted(prefix, key);
        match value {
            Json::Object(sub) => walk(&path, sub, out)?,
            Json::Null => out.push((path, None)),
            leaf_value => {
                let value = leaf(&path, leaf_value)?;
                out.push((path, Some(value)));
            }
        }
    }
    Ok(())
}

fn leaf(path: &str, value: &Json) -> Result<Value, FlattenError> {
    match value {
        Json::Number(n) if n.as_i64().is_none() && n.is_u64() => Err(FlattenError(format!(
            "'{path}': {n} does not fit in a signed 64-bit integer"
        ))),
        Json::Array(items) => items
            .iter()
            .map(|item| match item {
                Json::Object(_) | Json::Array(_) => Err(FlattenError(format!(
                    "'{path}': sequence items must be scalars"
                ))),
                scalar => leaf(path, scalar),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        scalar => Ok(json_scalar(scalar)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Demo {
        action: Option<String>,
        text: String,
        verbose: bool,
        limits: Limits,
    }

    #[derive(Serialize)]
    struct Limits {
        size: u32,
        ratio: f64,
        tags: Vec<String>,
    }

    fn demo() -> Demo {
        Demo {
            action: None,
            text: "hello".into(),
            verbose: true,
            limits: Limits {
                size: 100,
                ratio: 0.5,
                tags: vec!["a".into(), "b".into()],
            },
        }
    }

    #[test]
    fn struct_fields_become_dotted_keys() {
        let pairs = flatten(&demo()).unwrap();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["action", "text", "verbose", "limits.size", "limits.ratio", "limits.tags"]
        );
    }

    #[test]
    fn none_is_reported_as_absent() {
        let pairs = flatten(&demo()).unwrap();
        assert_eq!(pairs[0], ("action".into(), None));
        assert_eq!(pairs[1], ("text".into(), Some(Value::from("hello"))));
        assert_eq!(pairs[2], ("verbose".into(), Some(Value::Bool(true))));
    }

    #[test]
    fn numbers_and_sequences() {
        let pairs = flatten(&demo()).unwrap();
        assert_eq!(pairs[3].1, Some(Value::Int(100)));
        assert_eq!(pairs[4].1, Some(Value::Float(0.5)));
        assert_eq!(pairs[5].1, Some(Value::from(vec!["a", "b"])));
    }

    #[test]
    fn maps_flatten_like_structs() {
        let mut inner = BTreeMap::new();
        inner.insert("x".to_string(), 1);
        let mut outer = BTreeMap::new();
        outer.insert("c".to_string(), inner);
        let pairs = flatten(&outer).unwrap();
        assert_eq!(pairs, vec![("c.x".into(), Some(Value::Int(1)))]);
    }

    #[test]
    fn unit_variants_are_strings() {
        #[derive(Serialize)]
        #[serde(rename_all = "lowercase")]
        enum Action {
            Echo,
        }
        #[derive(Serialize)]
        struct Args {
            action: Action,
        }
        let pairs = flatten(&Args { action: Action::Echo }).unwrap();
        assert_eq!(pairs, vec![("action".into(), Some(Value::from("echo")))]);
    }

    #[test]
    fn sequences_of_structs_are_rejected() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
        }
        #[derive(Serialize)]
        struct Args {
            grid: Vec<Point>,
        }
        let err = flatten(&Args { grid: vec![Point { x: 1 }] }).unwrap_err();
        assert!(err.to_string().contains("grid"));
    }

    #[test]
    fn huge_unsigned_values_are_rejected() {
        #[derive(Serialize)]
        struct Args {
            n: u64,
        }
        assert!(flatten(&Args { n: u64::MAX }).is_err());
    }
}
