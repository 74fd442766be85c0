//! Option definitions for the nestfig demo application.
//!
//! The tree has top-level options for the action and its input, plus a
//! `display` namespace:
//!
//! | Option            | Flag                  | Env var                         |
//! |-------------------|-----------------------|---------------------------------|
//! | `action`          | `-a`, `--action`      | `NESTFIG_DEMO__ACTION`          |
//! | `text`            | positional            | `NESTFIG_DEMO__TEXT`            |
//! | `times`           | `-t`, `--times`       | `NESTFIG_DEMO__TIMES`           |
//! | `display.color`   | `--display.color`     | `NESTFIG_DEMO__DISPLAY__COLOR`  |
//! | `display.format`  | `--display.format`    | `NESTFIG_DEMO__DISPLAY__FORMAT` |
//!
//! `action` names a registered function through the `class` converter, so
//! `-a upper` and `-a main.upper` both resolve to [`upper`].

use nestfig::{Config, ConfigOption, Namespace, NestfigError, Registry, Symbol, Value};

/// A text transformation selectable with `--action`.
pub type Action = fn(&str) -> String;

pub fn echo(text: &str) -> String {
    text.to_string()
}

pub fn backwards(text: &str) -> String {
    text.chars().rev().collect()
}

pub fn upper(text: &str) -> String {
    text.to_uppercase()
}

/// Register the actions as symbols. Must run before any option is built.
pub fn install_actions() -> Result<(), NestfigError> {
    let registry = Registry::builtin()
        .register_symbol(Symbol::new("main.echo", echo as Action))
        .register_symbol(Symbol::new("main.backwards", backwards as Action))
        .register_symbol(Symbol::new("main.upper", upper as Action));
    nestfig::convert::install(registry)
}

/// The demo's option tree.
pub fn definitions() -> Result<Namespace, NestfigError> {
    let class = nestfig::convert::registry()
        .by_name("class")
        .ok_or_else(|| NestfigError::OptionError {
            name: "action".into(),
            reason: "no class converter registered".into(),
        })?;

    let mut tree = Namespace::new();
    tree.add_option(
        ConfigOption::builder("action")
            .default("echo")
            .converter(class)
            .short_form('a')
            .doc("the action to take on the text (echo, backwards, upper)"),
    )?;
    tree.add_option(
        ConfigOption::builder("text")
            .default("Hello World")
            .is_argument(true)
            .doc("the text input value"),
    )?;
    tree.add_option(
        ConfigOption::builder("times")
            .default(1)
            .short_form('t')
            .doc("how many times to repeat the result"),
    )?;
    tree.add_aggregation("result", compute_result)?;

    let display = tree.add_namespace("display", Namespace::with_doc("output settings"))?;
    display.add_option(
        ConfigOption::builder("color")
            .default("yellow")
            .doc("color of the result (red, green, yellow, blue, magenta, cyan)"),
    )?;
    display.add_option(
        ConfigOption::builder("format")
            .default("result")
            .doc("what to print: result, summary, toml, json or conf"),
    )?;
    Ok(tree)
}

/// Apply the action to the text and any extra words, `times` times over.
fn compute_result(config: &Config, _local: &Config, args: &[String]) -> Result<Value, String> {
    let action = config
        .get("action")
        .and_then(Value::as_symbol)
        .and_then(|symbol| symbol.downcast_ref::<Action>())
        .ok_or("no action selected")?;
    let times = config.get("times").and_then(Value::as_int).unwrap_or(1);
    let times = usize::try_from(times).map_err(|_| format!("times must not be negative, got {times}"))?;

    let mut words = vec![config.get("text").map(Value::to_string).unwrap_or_default()];
    words.extend(args.iter().cloned());
    let once = action(&words.join(" "));
    Ok(Value::Str(vec![once; times].join(" ")))
}
