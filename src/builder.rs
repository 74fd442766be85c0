use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::definition::{Definition, RequiredConfig, assemble};
use crate::env::EnvSource;
use crate::error::NestfigError;
use crate::file::{self, FileFormat};
use crate::namespace::{Namespace, Node};
use crate::option::ConfigOption;
use crate::resolve::{self, Resolved};
use crate::source::{MappingSource, SourceValue, ValueSource};
use crate::types::{SearchMode, SearchPath};
use crate::value::Value;
use crate::write;

/// Entry point for building a nestfig configuration.
pub struct Nestfig;

impl Nestfig {
    pub fn builder() -> NestfigBuilder {
        NestfigBuilder::new()
    }
}

enum PendingDefinition {
    Ready(Definition),
    Required(fn() -> Result<Namespace, NestfigError>),
}

struct Override {
    key: String,
    value: Value,
    known_only: bool,
}

/// Builder for assembling an option tree and resolving values into it.
///
/// Sources are applied lowest priority first:
///
/// 1. defaults from the definitions
/// 2. config files, in search-path order ([`search_paths()`](Self::search_paths))
/// 3. environment variables ([`env_prefix()`](Self::env_prefix))
/// 4. sources added with [`source()`](Self::source), in call order
/// 5. overrides ([`cli_override()`](Self::cli_override))
/// 6. the command line ([`args()`](Self::args))
pub struct NestfigBuilder {
    definitions: Vec<PendingDefinition>,
    app_name: Option<String>,
    file_name: Option<String>,
    search_paths: Option<Vec<SearchPath>>,
    search_mode: SearchMode,
    env_prefix: Option<String>,
    env_enabled: bool,
    env_vars: Option<Vec<(String, String)>>,
    sources: Vec<Box<dyn ValueSource>>,
    overrides: Vec<Override>,
    #[cfg(feature = "clap")]
    args: Option<Vec<String>>,
    strict: bool,
    deferred_error: Option<NestfigError>,
}

impl NestfigBuilder {
    fn new() -> Self {
        Self {
            definitions: Vec::new(),
            app_name: None,
            file_name: None,
            search_paths: None,
            search_mode: SearchMode::default(),
            env_prefix: None,
            env_enabled: true,
            env_vars: None,
            sources: Vec::new(),
            overrides: Vec::new(),
            #[cfg(feature = "clap")]
            args: None,
            strict: true,
            deferred_error: None,
        }
    }

    /// Add a definition source. All definitions are merged before any value
    /// is read.
    pub fn definition(mut self, definition: impl Into<Definition>) -> Self {
        self.definitions
            .push(PendingDefinition::Ready(definition.into()));
        self
    }

    /// Add the options `T` declares.
    pub fn required<T: RequiredConfig>(mut self) -> Self {
        self.definitions
            .push(PendingDefinition::Required(T::required_config));
        self
    }

    /// Set the application name. This derives defaults:
    /// - `file_name` → `"{app_name}.toml"`
    /// - `search_paths` → `[SearchPath::Platform]`
    /// - `env_prefix` → `"{APP_NAME}"` (uppercased)
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Override the config file name. The extension picks the format.
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Replace the default search paths. Paths are listed in
    /// priority-ascending order: the last entry has the highest priority.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path. If none were set yet, starts from `[Platform]`.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths
            .get_or_insert_with(|| vec![SearchPath::Platform])
            .push(path);
        self
    }

    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Search paths, file name and mode in one call.
    pub fn files(self, paths: Vec<SearchPath>, file_name: &str, mode: SearchMode) -> Self {
        self.search_paths(paths).file_name(file_name).search_mode(mode)
    }

    /// Override the environment variable prefix (default: uppercased `app_name`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Read these pairs instead of the process environment.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Add a value source above files and the environment.
    pub fn source(mut self, source: impl ValueSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = Box<dyn ValueSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Enable or disable strict mode (default: `true`).
    /// In strict mode, keys that are not options are errors in every source;
    /// otherwise only the command line rejects them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add an override. `None` values are ignored (useful for optional clap args).
    pub fn cli_override<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.overrides.push(Override {
                key: key.to_string(),
                value: v.into(),
                known_only: false,
            });
        }
        self
    }

    /// Add overrides from any serializable value, matched by field name.
    ///
    /// `None` fields are skipped, and keys that are not options in the
    /// assembled tree are dropped, so clap-only fields like `verbose` fall
    /// away on their own.
    pub fn cli_overrides_from<S: Serialize>(mut self, source: &S) -> Self {
        match MappingSource::from_serialize("overrides", source)
            .and_then(|m| m.get_values(&Namespace::new(), true))
        {
            Ok(values) => {
                for (key, value) in values {
                    if let SourceValue::Typed(value) = value {
                        self.overrides.push(Override {
                            key,
                            value,
                            known_only: true,
                        });
                    }
                }
            }
            Err(e) => {
                self.deferred_error.get_or_insert(e);
            }
        }
        self
    }

    /// Parse these command-line arguments (program name first) as the
    /// highest-priority source.
    #[cfg(feature = "clap")]
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    fn effective_file_name(&self) -> Option<String> {
        if let Some(name) = &self.file_name {
            return Some(name.clone());
        }
        self.app_name.as_ref().map(|app| format!("{app}.toml"))
    }

    fn effective_search_paths(&self) -> Vec<SearchPath> {
        if let Some(paths) = &self.search_paths {
            return paths.clone();
        }
        if self.app_name.is_some() {
            vec![SearchPath::Platform]
        } else {
            Vec::new()
        }
    }

    fn effective_env_prefix(&self) -> Option<String> {
        if !self.env_enabled {
            return None;
        }
        if let Some(prefix) = &self.env_prefix {
            return Some(prefix.clone());
        }
        self.app_name.as_ref().map(|app| app.to_uppercase())
    }

    fn build_tree(&mut self) -> Result<Namespace, NestfigError> {
        let definitions = std::mem::take(&mut self.definitions)
            .into_iter()
            .map(|pending| match pending {
                PendingDefinition::Ready(definition) => Ok(definition),
                PendingDefinition::Required(f) => f().map(Definition::Namespace),
            })
            .collect::<Result<Vec<_>, _>>()?;
        assemble(definitions)
    }

    /// Every value source, lowest priority first.
    fn build_sources(&mut self, tree: &Namespace) -> Result<Vec<Box<dyn ValueSource>>, NestfigError> {
        let mut sources: Vec<Box<dyn ValueSource>> = Vec::new();

        if let Some(file_name) = self.effective_file_name() {
            let app_name = self.app_name.clone().unwrap_or_default();
            let files = file::discover(
                &self.effective_search_paths(),
                &file_name,
                &app_name,
                self.search_mode,
            )?;
            for found in files {
                sources.push(Box::new(found));
            }
        }

        if let Some(prefix) = self.effective_env_prefix() {
            let env = match self.env_vars.take() {
                Some(vars) => EnvSource::from_vars(&prefix, vars),
                None => EnvSource::new(&prefix),
            };
            sources.push(Box::new(env));
        }

        sources.append(&mut self.sources);

        let mut overrides = MappingSource::new("overrides");
        for o in std::mem::take(&mut self.overrides) {
            if o.known_only && tree.option(&o.key).is_none() {
                continue;
            }
            overrides.insert(&o.key, o.value);
        }
        if !overrides.is_empty() {
            sources.push(Box::new(overrides));
        }

        if let Some(command_line) = self.command_line() {
            sources.push(command_line);
        }

        Ok(sources)
    }

    #[cfg(feature = "clap")]
    fn command_line(&mut self) -> Option<Box<dyn ValueSource>> {
        let args = self.args.take()?;
        Some(Box::new(crate::cli::ArgvSource::new(args)))
    }

    #[cfg(not(feature = "clap"))]
    fn command_line(&mut self) -> Option<Box<dyn ValueSource>> {
        None
    }

    /// Assemble the definitions, then apply every source and evaluate
    /// aggregations.
    pub fn load(mut self) -> Result<ConfigManager, NestfigError> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }
        let mut tree = self.build_tree()?;
        let sources = self.build_sources(&tree)?;
        tracing::debug!(sources = sources.len(), strict = self.strict, "resolving configuration");
        let Resolved { config, extra_args } = resolve::resolve(&mut tree, &sources, self.strict)?;
        Ok(ConfigManager {
            tree,
            config,
            extra_args,
        })
    }
}

/// A resolved configuration together with the option tree it came from.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    tree: Namespace,
    config: Config,
    extra_args: Vec<String>,
}

impl ConfigManager {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// The resolved value at a dotted path, aggregations included.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.config.get(path)
    }

    /// The whole option tree with final values.
    pub fn option_definitions(&self) -> &Namespace {
        &self.tree
    }

    /// Dotted paths of every option, breadth-first.
    pub fn option_names(&self) -> Vec<String> {
        self.tree
            .walk()
            .into_iter()
            .filter(|(_, _, node)| node.as_option().is_some())
            .map(|(path, _, _)| path)
            .collect()
    }

    pub fn option_by_name(&self, path: &str) -> Option<&ConfigOption> {
        self.tree.option(path)
    }

    /// Every option and namespace as `(dotted_path, name, node)`.
    pub fn walk_config(&self) -> Vec<(String, &str, &Node)> {
        self.tree
            .walk()
            .into_iter()
            .filter(|(_, _, node)| !matches!(node, Node::Aggregation(_)))
            .collect()
    }

    /// Command-line words no option claimed.
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    pub fn write_conf(&self) -> String {
        write::write_conf(&self.tree)
    }

    pub fn write_toml(&self) -> String {
        write::write_toml(&self.tree)
    }

    pub fn write_json(&self) -> Result<String, NestfigError> {
        write::write_json(&self.tree).map_err(|e| NestfigError::ParseError {
            path: "<json>".into(),
            reason: e.to_string(),
        })
    }

    pub fn summary(&self) -> String {
        write::output_summary(&self.tree)
    }

    /// Write the current values to `path` in the format its extension names.
    /// Creates parent directories as needed.
    pub fn write_file(&self, path: &Path) -> Result<(), NestfigError> {
        let content = match FileFormat::from_path(path) {
            FileFormat::Toml => self.write_toml(),
            FileFormat::Json => self.write_json()?,
            FileFormat::Conf => self.write_conf(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NestfigError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| NestfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "wrote configuration");
        Ok(())
    }
}
