//! Writers: render an option tree in the formats the value sources read.
//!
//! Each writer emits current values through the option's converter, so the
//! output read back through [`FileSource`](crate::file::FileSource) (or as a
//! [`Definition::Json`](crate::Definition::Json)) reproduces the same
//! values. Options whose name contains `password` are written as
//! `********`. Options marked `exclude_from_dump` are left out of the
//! writers, and those marked `exclude_from_print` out of [`output_summary`].

use crate::convert::TRIPLE_QUOTES;
use crate::namespace::{Namespace, Node, dotted};
use crate::option::ConfigOption;
use crate::value::Value;

const MASK: &str = "********";
const RULE: &str =
    "#------------------------------------------------------------------------------";

fn is_password(name: &str) -> bool {
    name.to_lowercase().contains("password")
}

fn masked(option: &ConfigOption, rendered: String) -> String {
    if is_password(option.name()) {
        MASK.to_string()
    } else {
        rendered
    }
}

fn dumped_options(ns: &Namespace) -> impl Iterator<Item = (&str, &ConfigOption)> {
    ns.iter().filter_map(|(name, node)| match node {
        Node::Option(option) if !option.exclude_from_dump() => Some((name, option)),
        _ => None,
    })
}

fn child_namespaces(ns: &Namespace) -> impl Iterator<Item = (&str, &Namespace)> {
    ns.iter()
        .filter_map(|(name, node)| node.as_namespace().map(|child| (name, child)))
}

// --- flat key=value ---

/// Flat `path=value` lines with `# name`, `# doc` and `# converter`
/// comments; each namespace opens with a rule and its doc.
pub fn write_conf(tree: &Namespace) -> String {
    let mut out = String::new();
    conf_level(tree, "", &mut out);
    out
}

fn conf_level(ns: &Namespace, prefix: &str, out: &mut String) {
    for (name, option) in dumped_options(ns) {
        let path = dotted(prefix, name);
        out.push_str(&format!("# name: {path}\n"));
        if let Some(doc) = option.doc() {
            let mut lines = doc.lines();
            if let Some(first) = lines.next() {
                out.push_str(&format!("# doc: {first}\n"));
            }
            for line in lines {
                out.push_str(&format!("#      {line}\n"));
            }
        }
        out.push_str(&format!("# converter: {}\n", option.converter().name()));

        let value = if is_password(name) {
            MASK.to_string()
        } else {
            conf_value(option)
        };
        out.push_str(&format!("{path}={value}\n\n"));
    }

    for (name, child) in child_namespaces(ns) {
        let path = dotted(prefix, name);
        out.push_str(RULE);
        out.push('\n');
        match child.doc() {
            Some(doc) => out.push_str(&format!("# {path} - {doc}\n\n")),
            None => out.push_str(&format!("# {path}\n\n")),
        }
        conf_level(child, &path, out);
    }
}

/// The value as written after `=`: triple-quoted when the converter asks
/// for it or the bare text would not survive the reader.
fn conf_value(option: &ConfigOption) -> String {
    let value = option.value_as_str();
    let fragile = value.contains(['\n', '#', '='])
        || value.trim() != value
        || TRIPLE_QUOTES.iter().any(|quote| value.starts_with(quote));
    if !option.converter().requires_quotes() && !fragile {
        return value;
    }
    let quote = if value.contains(TRIPLE_QUOTES[0]) {
        TRIPLE_QUOTES[1]
    } else {
        TRIPLE_QUOTES[0]
    };
    format!("{quote}{value}{quote}")
}

// --- TOML ---

/// TOML with top-level options first and one table per namespace. Docs
/// become comments; options without a value are written commented out.
pub fn write_toml(tree: &Namespace) -> String {
    let mut out = String::new();
    toml_options(tree, &mut out);
    for (path, _, node) in tree.walk() {
        let Node::Namespace(ns) = node else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n');
        }
        if let Some(doc) = ns.doc() {
            out.push_str(&comment(doc));
        }
        let header: Vec<String> = path.split('.').map(toml_key).collect();
        out.push_str(&format!("[{}]\n", header.join(".")));
        toml_options(ns, &mut out);
    }
    out
}

fn toml_options(ns: &Namespace, out: &mut String) {
    for (name, option) in dumped_options(ns) {
        if let Some(doc) = option.doc() {
            out.push_str(&comment(doc));
        }
        let key = toml_key(name);
        match toml_literal(option) {
            Some(literal) => out.push_str(&format!("{key} = {literal}\n")),
            None => out.push_str(&format!("# {key} =\n")),
        }
    }
}

fn comment(doc: &str) -> String {
    doc.lines().map(|line| format!("# {line}\n")).collect()
}

fn toml_key(name: &str) -> String {
    let bare = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        name.to_string()
    } else {
        toml::Value::String(name.to_string()).to_string()
    }
}

fn toml_literal(option: &ConfigOption) -> Option<String> {
    if is_password(option.name()) {
        return Some(toml::Value::String(MASK.into()).to_string());
    }
    let value = match option.value() {
        Value::Null => return None,
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Int(i) => toml::Value::Integer(*i),
        Value::Float(f) => toml::Value::Float(*f),
        _ => toml::Value::String(option.value_as_str()),
    };
    Some(value.to_string())
}

// --- JSON ---

/// A nested JSON object; every option becomes
/// `{name, default, doc, value, from_string_converter, short_form}` with
/// `default` and `value` both holding the current value as a string.
pub fn write_json(tree: &Namespace) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json_level(tree))
}

fn json_level(ns: &Namespace) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, node) in ns.iter() {
        match node {
            Node::Option(option) if !option.exclude_from_dump() => {
                map.insert(name.to_string(), json_option(option));
            }
            Node::Namespace(child) => {
                map.insert(name.to_string(), json_level(child));
            }
            _ => {}
        }
    }
    serde_json::Value::Object(map)
}

fn json_option(option: &ConfigOption) -> serde_json::Value {
    let value = masked(option, option.value_as_str());
    serde_json::json!({
        "name": option.name(),
        "default": value,
        "doc": option.doc(),
        "value": value,
        "from_string_converter": option.converter().name(),
        "short_form": option.short_form().map(String::from),
    })
}

// --- help text ---

/// Help text: one entry per option with its flags, doc and current value.
pub fn output_summary(tree: &Namespace) -> String {
    let mut out = String::new();
    for (path, _, node) in tree.walk() {
        let Node::Option(option) = node else {
            continue;
        };
        if option.exclude_from_print() {
            continue;
        }
        let flags = if option.is_argument() {
            path.clone()
        } else {
            match option.short_form() {
                Some(c) => format!("-{c}, --{path}"),
                None => format!("    --{path}"),
            }
        };
        out.push_str(&format!("  {flags}\n"));

        let value = masked(option, option.value_as_str());
        let doc = option.doc().unwrap_or_default();
        let line = match (doc.is_empty(), value.is_empty()) {
            (_, true) => doc.to_string(),
            (true, false) => format!("(default: {value})"),
            (false, false) => format!("{doc} (default: {value})"),
        };
        if !line.is_empty() {
            out.push_str(&format!("        {line}\n"));
        }
    }
    out
}
