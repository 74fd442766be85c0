//! The overlay engine: apply value sources to an option tree, in order.
//!
//! Works on an already assembled tree and already constructed sources; no
//! discovery happens here, which keeps the whole pipeline testable with
//! in-memory sources. For each source, lowest priority first:
//!
//! 1. Command-line sources are first asked, leniently, for the tokens they
//!    cannot attribute to any option (`extra_args`).
//! 2. The source's values are flattened to dotted paths. When one source
//!    gives the same path both as a literal dotted key and through nested
//!    tables, the literal key wins.
//! 3. Each path is looked up in the tree. Unknown paths are errors in strict
//!    mode, and always for command-line sources; otherwise they are skipped.
//!    Command-line sources may use an option's short form as its key.
//! 4. Untouched [`DontCare`](crate::DontCare) sentinels are skipped. Every
//!    other value replaces the option's value, converted by the option.
//!
//! Options whose converter expands (class options whose symbol declares
//! options of its own, lists of classes in namespaces) can grow the tree.
//! When the tree has any, the sources are first applied leniently, over
//! and over, and the namespaces the resulting values contribute are merged
//! next to their options, until the set of contributions stops changing.
//! The strict pass above then runs once over the grown tree.
//!
//! After the last source, aggregations are evaluated once each, in tree
//! order, against the resolved [`Config`].

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::NestfigError;
use crate::merge::deep_merge;
use crate::namespace::{Namespace, Node, dotted};
use crate::source::{SourceMap, SourceValue, ValueSource};

/// The outcome of a full resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub config: Config,
    /// Command-line tokens no option claimed.
    pub extra_args: Vec<String>,
}

/// Apply every source in order, then evaluate aggregations.
pub fn resolve(
    tree: &mut Namespace,
    sources: &[Box<dyn ValueSource>],
    strict: bool,
) -> Result<Resolved, NestfigError> {
    if has_expanding_options(tree) {
        expand(tree, sources)?;
    }

    let mut extra_args = Vec::new();
    for source in sources {
        if source.is_command_line() {
            extra_args.extend(source.extra_args(tree)?);
        }
        overlay(tree, source.as_ref(), strict)?;
    }

    let mut config = Config::from_namespace(tree);
    evaluate_aggregations(tree, &mut config, &extra_args)?;
    Ok(Resolved { config, extra_args })
}

/// How unknown keys are treated while applying a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Strict,
    Lenient,
    /// The tree may still grow; unknown keys are expected.
    Discover,
}

/// Apply one source to `tree`.
pub fn overlay(
    tree: &mut Namespace,
    source: &dyn ValueSource,
    strict: bool,
) -> Result<(), NestfigError> {
    let pass = if strict || source.is_command_line() {
        Pass::Strict
    } else {
        Pass::Lenient
    };
    apply(tree, source, pass)
}

fn apply(tree: &mut Namespace, source: &dyn ValueSource, pass: Pass) -> Result<(), NestfigError> {
    let source_name = source.name();
    let command_line = source.is_command_line();
    let values = source.get_values(tree, pass != Pass::Strict)?;
    let entries = flatten_entries(tree, values);
    tracing::debug!(source = %source_name, keys = entries.len(), ?pass, "applying value source");

    for (key, value) in entries {
        let path = if !tree.contains(&key) && command_line {
            short_form_path(tree, &key).unwrap_or(key)
        } else {
            key
        };

        match tree.get_mut(&path) {
            Some(Node::Option(option)) => {
                if let SourceValue::DontCare(sentinel) = &value
                    && sentinel.dont_care()
                {
                    tracing::debug!(key = %path, source = %source_name, "ignoring untouched default");
                    continue;
                }
                option
                    .set_value(value)
                    .map_err(|e| e.with_origin(&path, &source_name))?;
                tracing::trace!(key = %path, value = %option.value_as_str(), "applied");
            }
            found => {
                let what = found.map_or("unknown key", |node| node.kind_label());
                match pass {
                    Pass::Strict => {
                        return Err(NestfigError::NotAnOption {
                            key: path,
                            source_name,
                        });
                    }
                    Pass::Lenient => {
                        tracing::warn!(key = %path, source = %source_name, what, "skipping value that is not an option");
                    }
                    Pass::Discover => {
                        tracing::trace!(key = %path, source = %source_name, what, "not an option yet");
                    }
                }
            }
        }
    }
    Ok(())
}

const MAX_EXPANSION_ROUNDS: usize = 16;

/// A namespace contributed by an option's current value.
struct Expansion {
    option: String,
    value: String,
    namespace: Namespace,
}

fn has_expanding_options(tree: &Namespace) -> bool {
    tree.walk()
        .iter()
        .any(|(_, _, node)| node.as_option().is_some_and(|o| o.converter().expands()))
}

/// Grow `tree` until the namespaces contributed by option values stop
/// changing. Leaves the grown tree at its defaults.
fn expand(tree: &mut Namespace, sources: &[Box<dyn ValueSource>]) -> Result<(), NestfigError> {
    let base = tree.clone();
    let mut settled: Vec<Expansion> = Vec::new();

    for round in 1..=MAX_EXPANSION_ROUNDS {
        for source in sources {
            apply(tree, source.as_ref(), Pass::Discover)?;
        }
        let found = expansions(tree)?;
        let changed = found.len() != settled.len()
            || found
                .iter()
                .zip(&settled)
                .any(|(a, b)| a.option != b.option || a.value != b.value);

        *tree = base.clone();
        for expansion in &found {
            merge_expansion(tree, expansion)?;
        }
        if !changed {
            tracing::debug!(rounds = round, contributions = found.len(), "option tree settled");
            return tree.check_short_forms();
        }
        settled = found;
    }

    Err(NestfigError::DefinitionConflict {
        path: settled.last().map(|e| e.option.clone()).unwrap_or_default(),
        reason: format!("option tree still growing after {MAX_EXPANSION_ROUNDS} rounds"),
    })
}

fn expansions(tree: &Namespace) -> Result<Vec<Expansion>, NestfigError> {
    let mut found = Vec::new();
    for (path, _, node) in tree.walk() {
        let Some(option) = node.as_option() else {
            continue;
        };
        if let Some(namespace) = option.converter().expand(option.value()) {
            found.push(Expansion {
                value: option.value_as_str(),
                namespace: namespace?,
                option: path,
            });
        }
    }
    Ok(found)
}

/// Merge an expansion into the namespace holding its option.
fn merge_expansion(tree: &mut Namespace, expansion: &Expansion) -> Result<(), NestfigError> {
    let mut wrapped = expansion.namespace.clone();
    if let Some((parent, _)) = expansion.option.rsplit_once('.') {
        for segment in parent.rsplit('.') {
            let mut outer = Namespace::new();
            outer.add_namespace(segment, wrapped)?;
            wrapped = outer;
        }
    }
    tracing::trace!(option = %expansion.option, value = %expansion.value, "merging contributed options");
    deep_merge(tree, wrapped)
}

fn short_form_path(tree: &Namespace, key: &str) -> Option<String> {
    let mut chars = key.chars();
    let short_form = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    tree.option_by_short_form(short_form).map(|(path, _)| path)
}

/// Flatten nested tables to dotted paths. A table stops being flattened
/// where the tree has an option, so `{"z": {"default": 22}}` reaches `z`
/// whole. Literal top-level keys beat nested-derived ones for the same path.
fn flatten_entries(tree: &Namespace, values: SourceMap) -> IndexMap<String, SourceValue> {
    let mut out: IndexMap<String, (SourceValue, bool)> = IndexMap::new();
    collect(tree, "", values, &mut out);
    out.into_iter().map(|(path, (value, _))| (path, value)).collect()
}

fn collect(
    tree: &Namespace,
    prefix: &str,
    values: SourceMap,
    out: &mut IndexMap<String, (SourceValue, bool)>,
) {
    let literal = prefix.is_empty();
    for (key, value) in values {
        let path = dotted(prefix, &key);
        match value {
            SourceValue::Table(table) if tree.get(&path).is_none_or(Node::is_namespace) => {
                collect(tree, &path, table, out);
            }
            value => match out.get_mut(&path) {
                Some((_, true)) if !literal => {}
                Some(slot) => *slot = (value, literal),
                None => {
                    out.insert(path, (value, literal));
                }
            },
        }
    }
}

/// Evaluate every aggregation in tree order and store its result in
/// `config` under the aggregation's path.
pub fn evaluate_aggregations(
    tree: &Namespace,
    config: &mut Config,
    args: &[String],
) -> Result<(), NestfigError> {
    for (path, _, node) in tree.walk() {
        let Node::Aggregation(aggregation) = node else {
            continue;
        };
        let parent = path.rsplit_once('.').map_or("", |(parent, _)| parent);
        let local = config.table(parent).cloned().unwrap_or_default();
        let value = aggregation.evaluate(config, &local, args)?;
        tracing::debug!(aggregation = %path, "evaluated");
        config.insert(&path, value);
    }
    Ok(())
}
