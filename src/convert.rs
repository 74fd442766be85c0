//! The converter registry: canonical string <-> value conversions.
//!
//! Every option owns a [`Converter`]. When no converter is given explicitly,
//! one is deduced from the option's default through the [`Registry`], so the
//! same string means the same thing no matter which value source supplied it.
//!
//! The registry is an explicit table of `(kind, converter)` pairs built at
//! startup. A host application that needs extra converters or named symbols
//! builds its own registry and calls [`install`] once, before any option is
//! constructed; after that the registry is read-only.
//!
//! # Lookup
//!
//! [`Registry::get_from_string_converter`] matches the exact [`ValueKind`]
//! first. Lists are then matched structurally: the item converter is deduced
//! from the first element of the list, so `["a", "b"]` gets a list-of-strings
//! converter and `[1, 2]` a list-of-ints converter. `Null` matches nothing and
//! callers fall back to [`Converter::string`].
//!
//! # Quoting
//!
//! Every from-string conversion strips one surrounding pair of triple quotes
//! (`'''…'''` or `"""…"""`). The flat-file writer wraps values that way when
//! their converter is marked [`requires_quotes`], and for any value holding a
//! newline, `#`, `=` or surrounding whitespace.
//!
//! [`requires_quotes`]: Converter::requires_quotes

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::NestfigError;
use crate::namespace::Namespace;
use crate::option::ConfigOption;
use crate::value::{Symbol, Value, ValueKind};

/// The quote pairs a from-string conversion strips.
pub(crate) const TRIPLE_QUOTES: [&str; 2] = ["'''", "\"\"\""];

type FromStrFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;
type ToStrFn = dyn Fn(&Value) -> String + Send + Sync;
type ExpandFn = dyn Fn(&Value) -> Option<Result<Namespace, NestfigError>> + Send + Sync;

/// A named pair of conversion functions: string -> [`Value`] and back.
#[derive(Clone)]
pub struct Converter {
    name: String,
    target: ValueKind,
    from: Arc<FromStrFn>,
    to: Option<Arc<ToStrFn>>,
    expand: Option<Arc<ExpandFn>>,
    requires_quotes: bool,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("requires_quotes", &self.requires_quotes)
            .finish()
    }
}

impl Converter {
    /// A custom converter. Rendering back to a string uses [`to_str`] unless
    /// [`with_to_str`](Self::with_to_str) supplies a dedicated function.
    pub fn new<F>(name: impl Into<String>, target: ValueKind, from: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target,
            from: Arc::new(from),
            to: None,
            expand: None,
            requires_quotes: false,
        }
    }

    pub fn with_to_str<F>(mut self, to: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.to = Some(Arc::new(to));
        self
    }

    /// Let converted values contribute options. `expand` returns the
    /// namespace a value adds next to its option, or `None`.
    pub fn with_expansion<F>(mut self, expand: F) -> Self
    where
        F: Fn(&Value) -> Option<Result<Namespace, NestfigError>> + Send + Sync + 'static,
    {
        self.expand = Some(Arc::new(expand));
        self
    }

    /// The namespace `value` contributes next to its option, if any.
    pub fn expand(&self, value: &Value) -> Option<Result<Namespace, NestfigError>> {
        self.expand.as_ref().and_then(|expand| expand(value))
    }

    pub fn expands(&self) -> bool {
        self.expand.is_some()
    }

    /// Mark values of this converter as needing triple quotes in flat dumps.
    pub fn quoted(mut self) -> Self {
        self.requires_quotes = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> ValueKind {
        self.target
    }

    pub fn requires_quotes(&self) -> bool {
        self.requires_quotes
    }

    /// Convert `raw` into a typed value.
    pub fn convert(&self, raw: &str) -> Result<Value, NestfigError> {
        (self.from)(strip_quotes(raw)).map_err(|reason| NestfigError::CannotConvert {
            value: raw.to_string(),
            target: self.name.clone(),
            reason,
            origin: None,
        })
    }

    /// Render `value` back into the string form [`convert`](Self::convert) accepts.
    pub fn render(&self, value: &Value) -> String {
        if value.is_null() {
            return String::new();
        }
        match &self.to {
            Some(to) => to(value),
            None => to_str(value),
        }
    }

    // --- built-in converters ---

    /// Identity: the string itself.
    pub fn string() -> Self {
        Self::new("str", ValueKind::Str, |s| Ok(Value::Str(s.to_string())))
    }

    /// `true`, `t`, `1`, `y`, `yes` (any case) are true; everything else is false.
    pub fn boolean() -> Self {
        Self::new("bool", ValueKind::Bool, |s| Ok(Value::Bool(parse_bool(s))))
    }

    pub fn int() -> Self {
        Self::new("int", ValueKind::Int, |s| {
            s.trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| e.to_string())
        })
    }

    pub fn float() -> Self {
        Self::new("float", ValueKind::Float, |s| {
            s.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string())
        })
    }

    pub fn decimal() -> Self {
        Self::new("decimal", ValueKind::Decimal, |s| {
            Decimal::from_str(s.trim())
                .map(Value::Decimal)
                .map_err(|e| e.to_string())
        })
    }

    /// ISO-8601 date and time, e.g. `2011-05-04T15:10:00`.
    pub fn datetime() -> Self {
        Self::new("datetime", ValueKind::DateTime, |s| {
            parse_datetime(s.trim()).map(Value::DateTime)
        })
    }

    /// ISO-8601 calendar date, e.g. `2011-05-04`.
    pub fn date() -> Self {
        Self::new("date", ValueKind::Date, |s| {
            NaiveDate::from_str(s.trim())
                .map(Value::Date)
                .map_err(|e| e.to_string())
        })
    }

    /// `[[[days:]hours:]minutes:]seconds`.
    pub fn timedelta() -> Self {
        Self::new("timedelta", ValueKind::Duration, |s| {
            parse_timedelta(s).map(Value::Duration)
        })
    }

    pub fn regex() -> Self {
        Self::new("regex", ValueKind::Regex, |s| {
            Regex::new(s).map(Value::Regex).map_err(|e| e.to_string())
        })
        .quoted()
    }

    /// Split on `separator`, trim and drop empty tokens, convert each token
    /// with `item`.
    pub fn list(item: Converter, separator: char) -> Self {
        let name = if item.target == ValueKind::Str && separator == ',' {
            "list".to_string()
        } else {
            format!("list[{}]", item.name)
        };
        let joiner = if separator.is_whitespace() {
            separator.to_string()
        } else {
            format!("{separator} ")
        };
        let render_item = item.clone();
        Self::new(name, ValueKind::List, move |s| {
            s.split(separator)
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| (item.from)(strip_quotes(token)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        })
        .with_to_str(move |value| match value {
            Value::List(items) => items
                .iter()
                .map(|v| render_item.render(v))
                .collect::<Vec<_>>()
                .join(&joiner),
            other => to_str(other),
        })
    }

    pub fn list_of_strings() -> Self {
        Self::list(Self::string(), ',')
    }

    pub fn list_comma_separated_ints() -> Self {
        Self::list(Self::int(), ',').renamed("list_comma_separated_ints")
    }

    pub fn list_space_separated_strings() -> Self {
        Self::list(Self::string(), ' ').renamed("list_space_separated_strings")
    }

    /// Resolve a dotted identifier to a registered [`Symbol`]. An empty
    /// string converts to `Null`.
    /// A symbol that declares options contributes them next to its option.
    pub fn symbol(table: Arc<SymbolTable>) -> Self {
        Self::new("class", ValueKind::Symbol, move |s| table.resolve(s))
            .with_expansion(|value| value.as_symbol().and_then(Symbol::required_config))
    }

    /// A class converter that also adds an aggregation called `name` next to
    /// its option. The aggregation builds the symbol through its factory from
    /// the options of that namespace.
    pub fn instantiator(table: Arc<SymbolTable>, name: &str) -> Self {
        let name = name.to_string();
        Self::new("class", ValueKind::Symbol, move |s| table.resolve(s)).with_expansion(
            move |value| {
                let symbol = value.as_symbol()?.clone();
                let mut ns = match symbol.required_config() {
                    Some(Ok(ns)) => ns,
                    Some(Err(e)) => return Some(Err(e)),
                    None => Namespace::new(),
                };
                let added = ns.add_aggregation(&name, move |_, local, _| symbol.instantiate(local));
                Some(added.map(|()| ns))
            },
        )
    }

    /// A comma separated list of symbols, each placed in a namespace of its
    /// own. The namespaces are named by `template` with `{}` replaced by the
    /// symbol's position, and each holds a class option called `option_name`
    /// set to the symbol. `classes_in_namespaces(t, "backend{}", "cls")` on
    /// `"Postgres, Sqlite"` adds `backend0.cls` and `backend1.cls`, and then
    /// whatever options those symbols declare.
    pub fn classes_in_namespaces(table: Arc<SymbolTable>, template: &str, option_name: &str) -> Self {
        let resolver = Arc::clone(&table);
        let template = template.to_string();
        let option_name = option_name.to_string();
        Self::new("classes_in_namespaces", ValueKind::List, move |s| {
            s.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| resolver.resolve(token))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        })
        .with_to_str(|value| match value {
            Value::List(items) => items.iter().map(to_str).collect::<Vec<_>>().join(", "),
            other => to_str(other),
        })
        .with_expansion(move |value| {
            let items = value.as_list()?;
            let mut ns = Namespace::new();
            for (index, item) in items.iter().enumerate() {
                let child = template.replace("{}", &index.to_string());
                let added = ns.namespace(&child).and_then(|child| {
                    child.add_option(
                        ConfigOption::builder(&option_name)
                            .default(item.clone())
                            .converter(Converter::symbol(Arc::clone(&table))),
                    )
                });
                if let Err(e) = added {
                    return Some(Err(e));
                }
            }
            Some(Ok(ns))
        })
    }

    fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// The table a class converter resolves identifiers against.
///
/// Identifiers without a dot are tried as given and then under the table's
/// root namespace (`main` unless changed), so `echo` finds `main.echo`.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    root: String,
    entries: IndexMap<String, Symbol>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            root: "main".to_string(),
            entries: IndexMap::new(),
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.to_string();
        self
    }

    pub fn insert(&mut self, symbol: Symbol) {
        self.entries.insert(symbol.name().to_string(), symbol);
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    pub fn resolve(&self, identifier: &str) -> Result<Value, String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(Value::Null);
        }
        if let Some(symbol) = self.entries.get(identifier) {
            return Ok(Value::Symbol(symbol.clone()));
        }
        if !identifier.contains('.')
            && let Some(symbol) = self.entries.get(&format!("{}.{identifier}", self.root))
        {
            return Ok(Value::Symbol(symbol.clone()));
        }
        Err(format!("'{identifier}' is not a registered symbol"))
    }
}

/// The converter registry. See the [module docs](self) for lookup rules.
#[derive(Debug, Clone)]
pub struct Registry {
    from_string: Vec<(ValueKind, Converter)>,
    named: IndexMap<String, Converter>,
    symbols: Arc<SymbolTable>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// A registry holding only the built-in converters.
    pub fn builtin() -> Self {
        let registry = Self {
            from_string: Vec::new(),
            named: IndexMap::new(),
            symbols: Arc::new(SymbolTable::new()),
        };
        registry
            .register(ValueKind::Bool, Converter::boolean())
            .register(ValueKind::Int, Converter::int())
            .register(ValueKind::Float, Converter::float())
            .register(ValueKind::Decimal, Converter::decimal())
            .register(ValueKind::Str, Converter::string())
            .register(ValueKind::DateTime, Converter::datetime())
            .register(ValueKind::Date, Converter::date())
            .register(ValueKind::Duration, Converter::timedelta())
            .register(ValueKind::Regex, Converter::regex())
            .register(ValueKind::List, Converter::list_of_strings())
            .register_named(Converter::list_comma_separated_ints())
            .register_named(Converter::list_space_separated_strings())
    }

    /// Register (or replace) the converter for `kind`; it also becomes
    /// reachable by name.
    pub fn register(mut self, kind: ValueKind, converter: Converter) -> Self {
        self.named
            .insert(converter.name().to_string(), converter.clone());
        match self.from_string.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = converter,
            None => self.from_string.push((kind, converter)),
        }
        self
    }

    /// Make a converter reachable by name only.
    pub fn register_named(mut self, converter: Converter) -> Self {
        self.named
            .insert(converter.name().to_string(), converter);
        self
    }

    pub fn register_symbol(mut self, symbol: Symbol) -> Self {
        Arc::make_mut(&mut self.symbols).insert(symbol);
        self
    }

    pub fn symbols(&self) -> Arc<SymbolTable> {
        Arc::clone(&self.symbols)
    }

    /// The converter deduced for values of `kind`, if any.
    pub fn get_from_string_converter(&self, kind: ValueKind) -> Option<Converter> {
        if kind == ValueKind::Symbol {
            return Some(Converter::symbol(self.symbols()));
        }
        self.from_string
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| c.clone())
    }

    /// The converter deduced from an instance. Lists get an item converter
    /// matching their first element.
    pub fn converter_for(&self, value: &Value) -> Option<Converter> {
        if let Value::List(items) = value
            && let Some(first) = items.first()
            && first.kind() != ValueKind::Str
        {
            let item = self.converter_for(first)?;
            return Some(Converter::list(item, ','));
        }
        self.get_from_string_converter(value.kind())
    }

    /// Look a converter up by the name it dumps as (`int`, `timedelta`, ...).
    pub fn by_name(&self, name: &str) -> Option<Converter> {
        if name == "class" {
            return Some(Converter::symbol(self.symbols()));
        }
        if let Some(item) = name.strip_prefix("list[").and_then(|r| r.strip_suffix(']')) {
            return Some(Converter::list(self.by_name(item)?, ','));
        }
        self.named.get(name).cloned()
    }

    /// Render any value as a string, dispatching on its exact kind.
    pub fn to_str(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Decimal(d) => d.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(|v| self.to_str(v))
                .collect::<Vec<_>>()
                .join(", "),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Duration(td) => timedelta_to_str(*td),
            Value::Regex(r) => r.as_str().to_string(),
            Value::Symbol(s) => s.name().to_string(),
        }
    }
}

static INSTALLED: OnceLock<Registry> = OnceLock::new();

/// Install the process-wide registry. Must happen before the first call to
/// [`registry`]; afterwards the registry is fixed.
pub fn install(registry: Registry) -> Result<(), NestfigError> {
    INSTALLED
        .set(registry)
        .map_err(|_| NestfigError::RegistryAlreadyInstalled)
}

/// The process-wide registry (the built-in one unless [`install`] ran first).
pub fn registry() -> &'static Registry {
    INSTALLED.get_or_init(Registry::builtin)
}

/// Render `value` with the process-wide registry.
pub fn to_str(value: &Value) -> String {
    registry().to_str(value)
}

/// Strip one surrounding pair of `'''` or `"""`.
pub fn strip_quotes(s: &str) -> &str {
    for quote in TRIPLE_QUOTES {
        if s.len() >= 2 * quote.len()
            && let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

pub(crate) fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "true" | "t" | "1" | "y" | "yes"
    )
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = NaiveDateTime::from_str(s) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::from_str(s)
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|e| e.to_string())
}

fn parse_timedelta(s: &str) -> Result<TimeDelta, String> {
    let segments: Vec<&str> = s.trim().split(':').collect();
    if segments.len() > 4 {
        return Err(format!("too many ':' separated fields in '{s}'"));
    }
    let mut units = [0i64; 4];
    let offset = 4 - segments.len();
    for (i, segment) in segments.iter().enumerate() {
        units[offset + i] = segment
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("'{segment}': {e}"))?;
    }
    let [days, hours, minutes, seconds] = units;
    days.checked_mul(24)
        .and_then(|h| h.checked_add(hours))
        .and_then(|h| h.checked_mul(60))
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|total| total.checked_add(seconds))
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| format!("'{s}' is out of range"))
}

fn timedelta_to_str(td: TimeDelta) -> String {
    let total = td.num_seconds();
    let days = total.div_euclid(86_400);
    let rest = total.rem_euclid(86_400);
    format!(
        "{days}:{:02}:{:02}:{:02}",
        rest / 3600,
        rest % 3600 / 60,
        rest % 60
    )
}
