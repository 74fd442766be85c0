//! Clap adapter: the command line as a value source.
//!
//! This module is the optional integration layer between nestfig's
//! parser-agnostic core and [clap](https://docs.rs/clap). It is compiled only
//! when the `clap` Cargo feature is enabled (on by default).
//!
//! [`ArgvSource`] builds a clap [`Command`] from the option tree, so every
//! option gets a flag without any declarations of its own:
//!
//! - `--d.x.size 7`: long flags are the dotted paths.
//! - `-s 7`: an option's short form, when it has one.
//! - `--debug` / `--debug=false`: bool options take an optional value.
//! - options marked `is_argument` are positionals, in tree order.
//!
//! Options the user did not type come back as untouched
//! [`DontCare`](crate::DontCare) sentinels, which the overlay engine skips,
//! so files and the environment are not clobbered by echoed defaults.
//! Words no option claims are collected as extra arguments.

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource as ArgOrigin;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::dontcare::DontCare;
use crate::error::NestfigError;
use crate::namespace::{Namespace, Node};
use crate::option::ConfigOption;
use crate::source::{SourceKind, SourceMap, SourceValue, ValueSource};
use crate::value::{Value, ValueKind};

const EXTRA_ARGS: &str = "__nestfig_extra_args";

/// Command-line arguments, including the program name, as a value source.
#[derive(Debug, Clone)]
pub struct ArgvSource {
    args: Vec<String>,
}

impl ArgvSource {
    pub fn new<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The arguments this process was started with.
    pub fn from_env() -> Self {
        Self::new(std::env::args())
    }

    fn program(&self) -> String {
        self.args
            .first()
            .cloned()
            .unwrap_or_else(|| "app".to_string())
    }

    /// The clap command for `tree`.
    pub fn command(&self, tree: &Namespace) -> Command {
        build_command(self.program(), tree)
    }

    fn parse(&self, command: Command) -> Result<ArgMatches, NestfigError> {
        command
            .try_get_matches_from(&self.args)
            .map_err(|e| self.parse_error(e))
    }

    /// An unknown flag names a key that is not an option; every other clap
    /// failure is reported as clap renders it.
    fn parse_error(&self, error: clap::Error) -> NestfigError {
        if error.kind() == ErrorKind::UnknownArgument
            && let Some(ContextValue::String(flag)) = error.get(ContextKind::InvalidArg)
        {
            let flag = flag.split('=').next().unwrap_or(flag);
            return NestfigError::NotAnOption {
                key: flag.trim_start_matches('-').to_string(),
                source_name: self.name(),
            };
        }
        NestfigError::CommandLine(error.to_string())
    }
}

fn build_command(program: String, tree: &Namespace) -> Command {
    let mut command = Command::new(program)
        .disable_help_flag(true)
        .disable_version_flag(true);
    for (path, _, node) in tree.walk() {
        if let Node::Option(option) = node {
            command = command.arg(option_arg(path, option));
        }
    }
    command.arg(
        Arg::new(EXTRA_ARGS)
            .num_args(0..)
            .action(ArgAction::Append)
            .hide(true),
    )
}

fn option_arg(path: String, option: &ConfigOption) -> Arg {
    let mut arg = Arg::new(path.clone()).action(ArgAction::Set);
    if !option.is_argument() {
        arg = arg.long(path);
        if let Some(short_form) = option.short_form() {
            arg = arg.short(short_form);
        }
        if option.converter().target() == ValueKind::Bool {
            arg = arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true");
        }
    }
    if let Some(doc) = option.doc() {
        arg = arg.help(doc.to_string());
    }
    let current = option.value_as_str();
    if !current.is_empty() {
        arg = arg.default_value(current);
    }
    arg
}

impl ValueSource for ArgvSource {
    fn name(&self) -> String {
        "command line".to_string()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CommandLine
    }

    fn get_values(&self, tree: &Namespace, ignore: bool) -> Result<SourceMap, NestfigError> {
        let matches = self.parse(self.command(tree).ignore_errors(ignore))?;
        let mut map = SourceMap::new();
        for path in tree.keys_breadth_first(false) {
            if tree.option(&path).is_none() {
                continue;
            }
            let Some(raw) = matches.get_one::<String>(&path) else {
                continue;
            };
            let value = if matches.value_source(&path) == Some(ArgOrigin::DefaultValue) {
                SourceValue::DontCare(DontCare::new(Value::Str(raw.clone())))
            } else {
                SourceValue::Str(raw.clone())
            };
            map.insert(path, value);
        }
        Ok(map)
    }

    /// Words no option claims, found in a pass that ignores parse errors.
    fn extra_args(&self, tree: &Namespace) -> Result<Vec<String>, NestfigError> {
        let matches = self.parse(self.command(tree).ignore_errors(true))?;
        Ok(matches
            .get_many::<String>(EXTRA_ARGS)
            .map(|values| values.cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{flintstones, simple_tree};
    use crate::resolve::{overlay, resolve};
    use crate::source::MappingSource;

    fn argv(args: &[&str]) -> ArgvSource {
        ArgvSource::new(args.iter().copied())
    }

    #[test]
    fn long_flags_are_dotted_paths() {
        let mut tree = simple_tree();
        overlay(&mut tree, &argv(&["app", "--a", "2", "--c.x", "noob"]), true).unwrap();
        assert_eq!(tree.value("a"), Some(&Value::Int(2)));
        assert_eq!(tree.value("c.x"), Some(&Value::from("noob")));
    }

    #[test]
    fn untyped_flags_echo_defaults_as_sentinels() {
        let values = argv(&["app", "--a", "2"])
            .get_values(&simple_tree(), false)
            .unwrap();
        assert_eq!(values["a"], SourceValue::from("2"));
        match &values["b"] {
            SourceValue::DontCare(sentinel) => {
                assert!(sentinel.dont_care());
                assert_eq!(sentinel.as_bare_value(), &Value::from("17"));
            }
            other => panic!("Expected a sentinel, got {other:?}"),
        }
    }

    #[test]
    fn defaults_do_not_clobber_earlier_sources() {
        let mut tree = simple_tree();
        overlay(&mut tree, &MappingSource::new("file").with("b", 40), true).unwrap();
        overlay(&mut tree, &argv(&["app"]), true).unwrap();
        assert_eq!(tree.value("b"), Some(&Value::Int(40)));
    }

    #[test]
    fn short_forms() {
        let mut tree = flintstones();
        overlay(&mut tree, &argv(&["app", "-s", "7"]), true).unwrap();
        assert_eq!(tree.value("d.x.size"), Some(&Value::Int(7)));
    }

    #[test]
    fn bool_flags() {
        let mut tree = Namespace::new();
        tree.add_option(ConfigOption::builder("debug").default(false))
            .unwrap();
        tree.add_option(ConfigOption::builder("color").default(true))
            .unwrap();
        overlay(&mut tree, &argv(&["app", "--debug", "--color=false"]), true).unwrap();
        assert_eq!(tree.value("debug"), Some(&Value::Bool(true)));
        assert_eq!(tree.value("color"), Some(&Value::Bool(false)));
    }

    #[test]
    fn arguments_are_positional() {
        let mut tree = Namespace::new();
        tree.add_option(
            ConfigOption::builder("text")
                .default("")
                .is_argument(true)
                .doc("the text"),
        )
        .unwrap();
        tree.add_option(ConfigOption::builder("count").default(1))
            .unwrap();
        overlay(&mut tree, &argv(&["app", "hello", "--count", "3"]), true).unwrap();
        assert_eq!(tree.value("text"), Some(&Value::from("hello")));
        assert_eq!(tree.value("count"), Some(&Value::Int(3)));
    }

    #[test]
    fn unknown_flag_is_not_an_option() {
        let mut tree = simple_tree();
        let err = overlay(&mut tree, &argv(&["app", "--nonexistent", "1"]), false).unwrap_err();
        match err {
            NestfigError::NotAnOption { key, source_name } => {
                assert_eq!(key, "nonexistent");
                assert_eq!(source_name, "command line");
            }
            other => panic!("Expected NotAnOption, got {other:?}"),
        }
    }

    #[test]
    fn unknown_flag_with_inline_value_is_not_an_option() {
        let mut tree = simple_tree();
        let err = overlay(&mut tree, &argv(&["app", "--c.nope=3"]), false).unwrap_err();
        assert!(matches!(err, NestfigError::NotAnOption { key, .. } if key == "c.nope"));
    }

    #[test]
    fn missing_flag_value_stays_a_command_line_error() {
        let mut tree = simple_tree();
        let err = overlay(&mut tree, &argv(&["app", "--a"]), false).unwrap_err();
        assert!(matches!(err, NestfigError::CommandLine(_)));
    }

    #[test]
    fn bad_value_names_flag_and_source() {
        let mut tree = simple_tree();
        let err = overlay(&mut tree, &argv(&["app", "--c.z", "lots"]), true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("c.z"));
        assert!(msg.contains("command line"));
    }

    #[test]
    fn extra_words_reach_aggregations() {
        let mut tree = simple_tree();
        tree.add_aggregation("words", |_, _, args| Ok(Value::Int(args.len() as i64)))
            .unwrap();
        let sources: Vec<Box<dyn ValueSource>> =
            vec![Box::new(argv(&["app", "--a", "3", "one", "two"]))];
        let resolved = resolve(&mut tree, &sources, true).unwrap();
        assert_eq!(resolved.extra_args, vec!["one", "two"]);
        assert_eq!(resolved.config["words"], Value::Int(2));
        assert_eq!(resolved.config["a"], Value::Int(3));
    }

    #[test]
    fn command_lists_every_option() {
        let source = argv(&["app"]);
        let command = source.command(&flintstones());
        let longs: Vec<_> = command
            .get_arguments()
            .filter_map(|arg| arg.get_long().map(str::to_string))
            .collect();
        assert_eq!(longs[0], "aaa");
        assert!(longs.contains(&"d.x.size".to_string()));
        assert!(longs.contains(&"d.x.password".to_string()));
    }
}
