//! Typed option values.
//!
//! A [`Value`] is what an option holds after conversion. Its [`ValueKind`] is
//! the runtime type tag the converter registry dispatches on, playing the role
//! a runtime type plays in dynamically typed configuration systems.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use rust_decimal::Decimal;

use crate::config::Config;
use crate::error::NestfigError;
use crate::namespace::Namespace;

/// A typed configuration value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value. Options declared without a default start here.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Str(String),
    List(Vec<Value>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Duration(TimeDelta),
    Regex(Regex),
    Symbol(Symbol),
}

/// Runtime type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Str,
    List,
    DateTime,
    Date,
    Duration,
    Regex,
    Symbol,
}

impl ValueKind {
    /// The label used in error messages and dumped `converter:` lines.
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Null => "none",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Decimal => "decimal",
            ValueKind::Str => "str",
            ValueKind::List => "list",
            ValueKind::DateTime => "datetime",
            ValueKind::Date => "date",
            ValueKind::Duration => "timedelta",
            ValueKind::Regex => "regex",
            ValueKind::Symbol => "symbol",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named live object: a function, factory or any other host-registered
/// thing that a dotted identifier resolves to.
///
/// A symbol may declare options of its own, the way a [`RequiredConfig`]
/// component does. When a class option is set to such a symbol, those
/// options are added next to it before the remaining sources are applied.
/// A symbol with a factory can also be built from those options by an
/// [`instantiator`](crate::Converter::instantiator) option.
///
/// Two symbols are equal when their names are equal.
///
/// [`RequiredConfig`]: crate::RequiredConfig
#[derive(Clone)]
pub struct Symbol {
    name: String,
    target: Arc<dyn Any + Send + Sync>,
    required_config: Option<RequiredConfigFn>,
    factory: Option<Arc<FactoryFn>>,
}

/// Builds the namespace a symbol contributes.
pub type RequiredConfigFn = fn() -> Result<Namespace, NestfigError>;

type FactoryFn = dyn Fn(&Config) -> Result<Value, String> + Send + Sync;

impl Symbol {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, target: T) -> Self {
        Self::from_arc(name, Arc::new(target))
    }

    pub fn from_arc(name: impl Into<String>, target: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            name: name.into(),
            target,
            required_config: None,
            factory: None,
        }
    }

    /// Declare the options this symbol needs, e.g. `Database::required_config`.
    pub fn with_required_config(mut self, required_config: RequiredConfigFn) -> Self {
        self.required_config = Some(required_config);
        self
    }

    /// Build a value from the configuration of the namespace the symbol's
    /// option lives in.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Config) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// The dotted identifier this symbol was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.target.downcast_ref::<T>()
    }

    /// The options this symbol declares, if it declares any.
    pub fn required_config(&self) -> Option<Result<Namespace, NestfigError>> {
        self.required_config.map(|build| build())
    }

    pub fn instantiate(&self, local: &Config) -> Result<Value, String> {
        match &self.factory {
            Some(factory) => factory(local),
            None => Err(format!("symbol '{}' has no factory", self.name)),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Symbol").field(&self.name).finish()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Date(_) => ValueKind::Date,
            Value::Duration(_) => ValueKind::Duration,
            Value::Regex(_) => ValueKind::Regex,
            Value::Symbol(_) => ValueKind::Symbol,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<TimeDelta> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<&Regex> {
        match self {
            Value::Regex(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

/// Renders through the canonical to-string converters.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::convert::to_str(self))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<TimeDelta> for Value {
    fn from(v: TimeDelta) -> Self {
        Value::Duration(v)
    }
}

impl From<Regex> for Value {
    fn from(v: Regex) -> Self {
        Value::Regex(v)
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::from(true).kind(), ValueKind::Bool);
        assert_eq!(Value::from(3).kind(), ValueKind::Int);
        assert_eq!(Value::from(3.5).kind(), ValueKind::Float);
        assert_eq!(Value::from("x").kind(), ValueKind::Str);
        assert_eq!(Value::from(vec![1, 2]).kind(), ValueKind::List);
        assert_eq!(Value::Null.kind(), ValueKind::Null);
    }

    #[test]
    fn regexes_compare_by_pattern() {
        let a = Value::Regex(Regex::new("a.*b").unwrap());
        let b = Value::Regex(Regex::new("a.*b").unwrap());
        let c = Value::Regex(Regex::new("a.+b").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn int_and_float_are_not_equal() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn symbols_compare_by_name() {
        let a = Symbol::new("app.echo", 1u8);
        let b = Symbol::new("app.echo", "different target");
        assert_eq!(a, b);
        assert_eq!(a.downcast_ref::<u8>(), Some(&1));
        assert!(b.downcast_ref::<u8>().is_none());
    }

    #[test]
    fn none_option_is_null() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: Value = Some(4).into();
        assert_eq!(v, Value::Int(4));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(ValueKind::Duration.to_string(), "timedelta");
        assert_eq!(ValueKind::Str.label(), "str");
    }
}
