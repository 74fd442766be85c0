//! Options and aggregations: the leaves of a [`Namespace`](crate::Namespace).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::Config;
use crate::convert::{self, Converter};
use crate::error::NestfigError;
use crate::source::SourceValue;
use crate::value::Value;

/// One named, typed, documented configuration value.
///
/// `value` starts out equal to `default` and is replaced once per value
/// source during overlay. `default` only changes through
/// [`set_default`](Self::set_default).
#[derive(Clone)]
pub struct ConfigOption {
    name: String,
    default: Value,
    value: Value,
    doc: Option<String>,
    annotation: Option<String>,
    short_form: Option<char>,
    converter: Converter,
    explicit_converter: bool,
    is_argument: bool,
    exclude_from_print: bool,
    exclude_from_dump: bool,
    facets: IndexMap<String, String>,
}

impl ConfigOption {
    pub fn builder(name: &str) -> OptionBuilder {
        OptionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn short_form(&self) -> Option<char> {
        self.short_form
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn is_argument(&self) -> bool {
        self.is_argument
    }

    pub fn exclude_from_print(&self) -> bool {
        self.exclude_from_print
    }

    pub fn exclude_from_dump(&self) -> bool {
        self.exclude_from_dump
    }

    pub fn facets(&self) -> &IndexMap<String, String> {
        &self.facets
    }

    /// The current value in the string form the converter reads back.
    pub fn value_as_str(&self) -> String {
        self.converter.render(&self.value)
    }

    pub fn default_as_str(&self) -> String {
        self.converter.render(&self.default)
    }

    /// Replace the current value.
    ///
    /// Strings go through the converter. Typed values of a different kind
    /// than the option expects are rendered and converted, so a TOML integer
    /// can feed a float option. A table is accepted only if it carries a
    /// `default` key, which is then used. Applying the same input twice gives
    /// the same value.
    pub fn set_value(&mut self, input: SourceValue) -> Result<(), NestfigError> {
        self.value = self.incoming_value(input)?;
        Ok(())
    }

    fn incoming_value(&self, input: SourceValue) -> Result<Value, NestfigError> {
        match input {
            SourceValue::Str(s) => self.converter.convert(&s),
            SourceValue::Typed(v) => self.coerce(v),
            SourceValue::DontCare(sentinel) => self.coerce(sentinel.into_bare_value()),
            SourceValue::Option(other) => Ok(other.default.clone()),
            SourceValue::Table(mut table) => match table.shift_remove("default") {
                Some(inner) => self.incoming_value(inner),
                None => Err(NestfigError::OptionError {
                    name: self.name.clone(),
                    reason: "a table value needs a 'default' key".into(),
                }),
            },
        }
    }

    fn coerce(&self, value: Value) -> Result<Value, NestfigError> {
        if value.is_null() || !self.is_typed() {
            return Ok(value);
        }
        match value {
            Value::Str(s) => self.converter.convert(&s),
            other if other.kind() == self.converter.target() => Ok(other),
            other => self.converter.convert(&convert::to_str(&other)),
        }
    }

    /// Whether the option knows its type: it has a non-null default or an
    /// explicit converter. Untyped options store what they are given.
    fn is_typed(&self) -> bool {
        self.explicit_converter || !self.default.is_null()
    }

    /// Set the default. Only allowed while there is none, unless `force`.
    /// The value follows the new default.
    pub fn set_default(&mut self, default: impl Into<Value>, force: bool) -> Result<(), NestfigError> {
        if !self.default.is_null() && !force {
            return Err(NestfigError::OptionError {
                name: self.name.clone(),
                reason: format!(
                    "default is already '{}'; use force to replace it",
                    self.default_as_str()
                ),
            });
        }
        let default = default.into();
        if !self.explicit_converter
            && let Some(converter) = convert::registry().converter_for(&default)
        {
            self.converter = converter;
        }
        let default = match default {
            Value::Str(s) if self.explicit_converter => self.converter.convert(&s)?,
            other => other,
        };
        self.value = default.clone();
        self.default = default;
        Ok(())
    }
}

/// Equal when name, default, doc, short form and value are equal.
impl PartialEq for ConfigOption {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.default == other.default
            && self.doc == other.doc
            && self.short_form == other.short_form
            && self.value == other.value
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOption")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("value", &self.value)
            .field("doc", &self.doc)
            .field("short_form", &self.short_form)
            .field("converter", &self.converter.name())
            .finish()
    }
}

/// Builder for [`ConfigOption`].
///
/// ```
/// use nestfig::{ConfigOption, Value};
///
/// let opt = ConfigOption::builder("size")
///     .default(100)
///     .doc("the size of the thing")
///     .short_form('s')
///     .build()
///     .unwrap();
/// assert_eq!(opt.value(), &Value::Int(100));
/// ```
#[derive(Debug, Clone)]
pub struct OptionBuilder {
    name: String,
    default: Value,
    value: Option<SourceValue>,
    doc: Option<String>,
    annotation: Option<String>,
    short_form: Option<char>,
    converter: Option<Converter>,
    is_argument: bool,
    exclude_from_print: bool,
    exclude_from_dump: bool,
    facets: IndexMap<String, String>,
}

impl OptionBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: Value::Null,
            value: None,
            doc: None,
            annotation: None,
            short_form: None,
            converter: None,
            is_argument: false,
            exclude_from_print: false,
            exclude_from_dump: false,
            facets: IndexMap::new(),
        }
    }

    /// The default. A string default is run through an explicit converter
    /// once, at build time.
    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Start from a value other than the default.
    ///
    /// The value goes through [`ConfigOption::set_value`] in
    /// [`build`](Self::build). A string the converter rejects fails the
    /// build with [`NestfigError::CannotConvert`]; it is never kept as a
    /// bare string.
    pub fn value(mut self, value: impl Into<SourceValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn annotation(mut self, annotation: &str) -> Self {
        self.annotation = Some(annotation.to_string());
        self
    }

    pub fn short_form(mut self, short_form: char) -> Self {
        self.short_form = Some(short_form);
        self
    }

    /// Use `converter` instead of the one deduced from the default.
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Positional on the command line rather than a `--flag`.
    pub fn is_argument(mut self, is_argument: bool) -> Self {
        self.is_argument = is_argument;
        self
    }

    pub fn exclude_from_print(mut self, exclude: bool) -> Self {
        self.exclude_from_print = exclude;
        self
    }

    pub fn exclude_from_dump(mut self, exclude: bool) -> Self {
        self.exclude_from_dump = exclude;
        self
    }

    pub fn facet(mut self, key: &str, value: &str) -> Self {
        self.facets.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Result<ConfigOption, NestfigError> {
        let explicit_converter = self.converter.is_some();
        let converter = match self.converter {
            Some(converter) => converter,
            None => convert::registry()
                .converter_for(&self.default)
                .unwrap_or_else(Converter::string),
        };
        let default = match self.default {
            Value::Str(s) if explicit_converter => converter
                .convert(&s)
                .map_err(|e| e.with_origin(&self.name, "its default"))?,
            other => other,
        };

        let mut option = ConfigOption {
            name: self.name,
            value: default.clone(),
            default,
            doc: self.doc,
            annotation: self.annotation,
            short_form: self.short_form,
            converter,
            explicit_converter,
            is_argument: self.is_argument,
            exclude_from_print: self.exclude_from_print,
            exclude_from_dump: self.exclude_from_dump,
            facets: self.facets,
        };
        if let Some(value) = self.value {
            option.set_value(value)?;
        }
        tracing::trace!(option = %option.name, converter = option.converter.name(), "built option");
        Ok(option)
    }
}

type AggregationFn = dyn Fn(&Config, &Config, &[String]) -> Result<Value, String> + Send + Sync;

/// A value derived from the resolved configuration, computed once after
/// every value source has been applied.
///
/// The function receives the whole configuration, the configuration of the
/// namespace the aggregation lives in, and the extra command-line arguments.
#[derive(Clone)]
pub struct Aggregation {
    name: String,
    function: Arc<AggregationFn>,
}

impl Aggregation {
    pub fn new<F>(name: &str, function: F) -> Self
    where
        F: Fn(&Config, &Config, &[String]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            function: Arc::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(
        &self,
        config: &Config,
        local: &Config,
        args: &[String],
    ) -> Result<Value, NestfigError> {
        (self.function)(config, local, args).map_err(|reason| NestfigError::AggregationFailed {
            name: self.name.clone(),
            reason,
        })
    }
}

impl fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Aggregation").field(&self.name).finish()
    }
}

/// Equal when both name the same function object.
impl PartialEq for Aggregation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.function, &other.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dontcare::DontCare;
    use crate::source::SourceMap;
    use chrono::{NaiveDate, TimeDelta};

    #[test]
    fn converter_deduced_from_default() {
        let opt = ConfigOption::builder("a").default(1).build().unwrap();
        assert_eq!(opt.converter().name(), "int");
        let opt = ConfigOption::builder("b").default(true).build().unwrap();
        assert_eq!(opt.converter().name(), "bool");
        let opt = ConfigOption::builder("c").build().unwrap();
        assert_eq!(opt.converter().name(), "str");
    }

    #[test]
    fn string_default_goes_through_explicit_converter() {
        let opt = ConfigOption::builder("when")
            .default("2011-05-04")
            .converter(Converter::date())
            .build()
            .unwrap();
        let expected = Value::Date(NaiveDate::from_ymd_opt(2011, 5, 4).unwrap());
        assert_eq!(opt.default(), &expected);
        assert_eq!(opt.value(), &expected);
    }

    #[test]
    fn bad_string_default_fails_build() {
        let err = ConfigOption::builder("n")
            .default("not-a-number")
            .converter(Converter::int())
            .build()
            .unwrap_err();
        assert!(matches!(err, NestfigError::CannotConvert { .. }));
    }

    #[test]
    fn bad_initial_value_fails_build() {
        let err = ConfigOption::builder("n")
            .default(1)
            .value("several")
            .build()
            .unwrap_err();
        assert!(matches!(err, NestfigError::CannotConvert { .. }));
    }

    #[test]
    fn set_value_converts_strings() {
        let mut opt = ConfigOption::builder("y").default(3.14159).build().unwrap();
        opt.set_value("2.89".into()).unwrap();
        assert_eq!(opt.value(), &Value::Float(2.89));
        assert_eq!(opt.default(), &Value::Float(3.14159));
    }

    #[test]
    fn set_value_is_idempotent() {
        let mut opt = ConfigOption::builder("t")
            .default(TimeDelta::seconds(10))
            .build()
            .unwrap();
        opt.set_value("1:0:0".into()).unwrap();
        let first = opt.value().clone();
        opt.set_value("1:0:0".into()).unwrap();
        assert_eq!(opt.value(), &first);
        assert_eq!(first, Value::Duration(TimeDelta::seconds(3600)));
    }

    #[test]
    fn set_value_coerces_foreign_kinds() {
        let mut opt = ConfigOption::builder("y").default(1.5).build().unwrap();
        opt.set_value(Value::Int(22).into()).unwrap();
        assert_eq!(opt.value(), &Value::Float(22.0));

        let mut untyped = ConfigOption::builder("z").build().unwrap();
        untyped.set_value(Value::Int(22).into()).unwrap();
        assert_eq!(untyped.value(), &Value::Int(22));
    }

    #[test]
    fn set_value_rejects_unconvertible() {
        let mut opt = ConfigOption::builder("n").default(1).build().unwrap();
        let err = opt.set_value("not-a-number".into()).unwrap_err();
        assert!(matches!(err, NestfigError::CannotConvert { .. }));
        assert_eq!(opt.value(), &Value::Int(1));
    }

    #[test]
    fn set_value_from_table_uses_default_key() {
        let mut opt = ConfigOption::builder("z").default(99).build().unwrap();
        let mut table = SourceMap::new();
        table.insert("name".into(), "z".into());
        table.insert("default".into(), "22".into());
        opt.set_value(SourceValue::Table(table)).unwrap();
        assert_eq!(opt.value(), &Value::Int(22));

        let err = opt.set_value(SourceValue::Table(SourceMap::new())).unwrap_err();
        assert!(matches!(err, NestfigError::OptionError { .. }));
    }

    #[test]
    fn set_value_from_option_copies_default() {
        let other = ConfigOption::builder("z").default(7).value(8).build().unwrap();
        let mut opt = ConfigOption::builder("z").default(99).build().unwrap();
        opt.set_value(other.into()).unwrap();
        assert_eq!(opt.value(), &Value::Int(7));
    }

    #[test]
    fn set_value_unwraps_sentinels() {
        let mut opt = ConfigOption::builder("l").default(vec!["a"]).build().unwrap();
        opt.set_value(DontCare::touched(Value::from(vec!["b"])).into())
            .unwrap();
        assert_eq!(opt.value(), &Value::from(vec!["b"]));
    }

    #[test]
    fn set_default_requires_force_when_present() {
        let mut opt = ConfigOption::builder("a").default(1).build().unwrap();
        let err = opt.set_default(2, false).unwrap_err();
        assert!(matches!(err, NestfigError::OptionError { .. }));
        opt.set_default(2, true).unwrap();
        assert_eq!(opt.default(), &Value::Int(2));
        assert_eq!(opt.value(), &Value::Int(2));
    }

    #[test]
    fn set_default_on_empty_option_picks_converter() {
        let mut opt = ConfigOption::builder("a").build().unwrap();
        opt.set_default(17, false).unwrap();
        assert_eq!(opt.converter().name(), "int");
        opt.set_value("18".into()).unwrap();
        assert_eq!(opt.value(), &Value::Int(18));
    }

    #[test]
    fn equality_ignores_metadata_flags() {
        let a = ConfigOption::builder("fred")
            .default("stupid")
            .doc("husband from Flintstones")
            .build()
            .unwrap();
        let b = ConfigOption::builder("fred")
            .default("stupid")
            .doc("husband from Flintstones")
            .exclude_from_print(true)
            .build()
            .unwrap();
        let c = ConfigOption::builder("fred").default("smart").build().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn value_as_str_uses_converter() {
        let opt = ConfigOption::builder("ratio")
            .default(vec![1, 2])
            .build()
            .unwrap();
        assert_eq!(opt.value_as_str(), "1, 2");
        assert_eq!(opt.default_as_str(), "1, 2");
    }

    #[test]
    fn metadata_is_kept() {
        let opt = ConfigOption::builder("password")
            .default("secret")
            .annotation("never printed")
            .is_argument(true)
            .exclude_from_dump(true)
            .facet("group", "db")
            .build()
            .unwrap();
        assert_eq!(opt.annotation(), Some("never printed"));
        assert!(opt.is_argument());
        assert!(opt.exclude_from_dump());
        assert!(!opt.exclude_from_print());
        assert_eq!(opt.facets()["group"], "db");
    }

    #[test]
    fn aggregation_reports_failures_by_name() {
        let agg = Aggregation::new("connection", |_, _, _| Err("no host".into()));
        let err = agg
            .evaluate(&Config::default(), &Config::default(), &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "Aggregation 'connection' failed: no host");
    }
}
