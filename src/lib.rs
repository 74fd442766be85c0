//! Typed option namespaces with ordered, multi-source value overlay.
//!
//! Nestfig keeps one authoritative tree of options. Every option has a name,
//! a default, a doc string and a converter that turns strings into typed
//! values and back. Value sources (config files, environment variables,
//! in-memory maps, the command line) are then laid over that tree in
//! priority order, and the result is read as a plain nested [`Config`].
//!
//! ```ignore
//! let mut tree = Namespace::new();
//! tree.add_option(ConfigOption::builder("port").default(8080).short_form('p'))?;
//!
//! let manager = Nestfig::builder()
//!     .app_name("myapp")
//!     .definition(tree)
//!     .args(std::env::args())
//!     .load()?;
//!
//! let port = manager.get("port");
//! ```
//!
//! That single call searches the platform config directory for `myapp.toml`,
//! applies `MYAPP__*` environment variables, then the command line, and
//! hands you the resolved values.
//!
//! # Definitions
//!
//! The tree is assembled from one or more [`Definition`]s before any value
//! is read: namespaces built in code, dotted-key mappings, TOML or JSON
//! documents, and components implementing [`RequiredConfig`]. Definitions
//! are deep-merged. Namespaces with the same name merge recursively, and two
//! definitions of one option must agree or loading fails with
//! [`NestfigError::DefinitionConflict`]. This happens eagerly, so a broken
//! definition fails the same way whatever the user passes at runtime.
//!
//! # Converters
//!
//! When an option is built without an explicit converter, one is deduced
//! from its default through the process-wide [`Registry`]: an integer
//! default gets the `int` converter, `["a", "b"]` a list-of-strings
//! converter, a `TimeDelta` the `timedelta` converter, and so on. Because
//! every source hands strings to the same converter, `"2.89"` means the
//! same thing in a file, an environment variable and a flag. A host
//! application that needs extra converters, or named [`Symbol`]s for the
//! `class` converter, builds its own registry and calls
//! [`convert::install`] once at startup.
//!
//! A symbol can declare options of its own. Setting a class option to it,
//! from any source, adds those options next to the option, and later
//! sources can then set them. [`Converter::classes_in_namespaces`] does the
//! same for a list of symbols, one namespace each.
//!
//! # Layer precedence
//!
//! ```text
//! Definition defaults
//!        ↑ overridden by
//! Config files          search paths in order, later paths win
//!        ↑ overridden by
//! Environment vars      PREFIX__KEY
//!        ↑ overridden by
//! Added sources         .source(), in call order
//!        ↑ overridden by
//! Overrides             .cli_override()
//!        ↑ overridden by
//! Command line          .args()
//! ```
//!
//! Every layer is sparse: a source only names the keys it wants to change.
//! Keys may be dotted (`"c.z"`) or nested tables (`{"c": {"z": ...}}`); both
//! address the same option.
//!
//! The command line reports a default for every flag the user did not
//! type. Those come back wrapped in [`DontCare`] and are skipped, so they
//! never clobber a value a file or the environment set.
//!
//! # Strict mode
//!
//! Strict mode is on by default: a key that is not an option fails loading
//! with [`NestfigError::NotAnOption`], naming the key and the source. Turn
//! it off with [`.strict(false)`](NestfigBuilder::strict) to skip such keys
//! with a warning. The command line is always strict.
//!
//! # Aggregations
//!
//! An aggregation is a value computed from the resolved configuration after
//! the last source. It receives the whole [`Config`], the table of the
//! namespace it lives in, and the command-line words no option claimed, and
//! its result appears in the [`Config`] under its own name.
//!
//! # Config files
//!
//! [`search_paths()`](NestfigBuilder::search_paths) accepts [`SearchPath`]s
//! in priority-ascending order; [`SearchMode`] decides whether every found
//! file is applied or only the highest-priority one. The file extension
//! picks the format: `.toml`, `.json`, or flat `key=value` lines. The
//! [`write`] module writes all three back, masking passwords.
//!
//! # Clap adapter
//!
//! The `cli` module (behind the `clap` feature, on by default) turns the
//! option tree into a clap command: dotted long flags, short forms,
//! positional arguments. Without it, the core works with any parser; feed
//! parsed values in through [`cli_overrides_from()`](NestfigBuilder::cli_overrides_from)
//! or your own [`ValueSource`].
//!
//! # Error handling
//!
//! All fallible operations return [`NestfigError`]. Conversion failures name
//! the value, the target type, the key and the source that supplied it. See
//! the [`error`] module for the full set.

pub mod convert;
pub mod error;
pub mod file;
pub mod resolve;
pub mod types;
pub mod write;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod config;
mod definition;
mod dontcare;
mod env;
mod flatten;
pub(crate) mod merge;
mod namespace;
mod option;
mod source;
mod value;

#[cfg(test)]
mod fixtures;

pub use builder::{ConfigManager, Nestfig, NestfigBuilder};
#[cfg(feature = "clap")]
pub use cli::ArgvSource;
pub use config::{Config, Entry};
pub use convert::{Converter, Registry, SymbolTable};
pub use definition::{Definition, RequiredConfig, assemble};
pub use dontcare::DontCare;
pub use env::EnvSource;
pub use error::{NestfigError, Origin};
pub use file::{FileFormat, FileSource};
pub use namespace::{Namespace, Node};
pub use option::{Aggregation, ConfigOption, OptionBuilder};
pub use resolve::Resolved;
pub use source::{MappingSource, SourceKind, SourceMap, SourceValue, ValueSource, insert_nested};
pub use types::{Boundary, SearchMode, SearchPath};
pub use value::{RequiredConfigFn, Symbol, Value, ValueKind};
