//! Config files as value sources, and where to find them.
//!
//! # Formats
//!
//! The format is chosen from the file extension:
//!
//! - `.toml` — tables are namespaces, `[d.x]` addresses `d.x.*`.
//! - `.json` — nested objects are namespaces.
//! - anything else — flat `key=value` lines with dotted keys, `#` comments
//!   and blank lines ignored. This is the format [`write_conf`] emits.
//!
//! # Discovery
//!
//! Each [`SearchPath`] resolves to one or more directories, listed in
//! priority-ascending order. `Ancestors(boundary)` walks from the current
//! directory toward the root and emits directories **shallowest first**, so
//! the one closest to the current directory has the highest priority.
//!
//! Every directory is then checked for `{dir}/{file_name}`. With
//! [`SearchMode::Merge`] every found file becomes a source; with
//! [`SearchMode::FirstMatch`] only the highest-priority one does. Missing
//! files are skipped; other I/O errors are returned.
//!
//! [`write_conf`]: crate::write::write_conf

use std::path::{Path, PathBuf};

use crate::convert::{Converter, TRIPLE_QUOTES};
use crate::error::NestfigError;
use crate::namespace::Namespace;
use crate::source::{SourceKind, SourceMap, SourceValue, ValueSource};
use crate::types::{Boundary, SearchMode, SearchPath};
use crate::value::Value;

/// The on-disk formats a [`FileSource`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
    Conf,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Conf,
        }
    }
}

/// A config file, parsed up front.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    values: SourceMap,
}

impl FileSource {
    /// Read and parse `path`, picking the format from its extension.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, NestfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| NestfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        Self::parse(path, &content)
    }

    /// Parse `content` as if read from `path`.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, NestfigError> {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        let values = match format {
            FileFormat::Toml => {
                let table: toml::Table = content.parse().map_err(|e: toml::de::Error| {
                    NestfigError::ParseError {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                toml_map(&table)
            }
            FileFormat::Json => {
                let json: serde_json::Value =
                    serde_json::from_str(content).map_err(|e| NestfigError::ParseError {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                match json {
                    serde_json::Value::Object(map) => json_map(&map),
                    _ => {
                        return Err(NestfigError::ParseError {
                            path,
                            reason: "top level must be an object".into(),
                        });
                    }
                }
            }
            FileFormat::Conf => parse_conf(&path, content)?,
        };
        tracing::debug!(path = %path.display(), ?format, keys = values.len(), "parsed config file");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ValueSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn get_values(&self, _tree: &Namespace, _ignore: bool) -> Result<SourceMap, NestfigError> {
        Ok(self.values.clone())
    }
}

/// A triple-quoted value still waiting for its closing quote.
struct OpenQuote {
    key: String,
    quote: &'static str,
    text: String,
    line: usize,
}

/// Flat `key=value` lines. Unquoted values are trimmed. A value opened with
/// `'''` or `"""` is taken verbatim up to the matching closing quote, which
/// may be on a later line.
fn parse_conf(path: &Path, content: &str) -> Result<SourceMap, NestfigError> {
    let parse_error = |line: usize, reason: &str| NestfigError::ParseError {
        path: path.to_path_buf(),
        reason: format!("line {line}: {reason}"),
    };
    let mut map = SourceMap::new();
    let mut open: Option<OpenQuote> = None;

    for (index, line) in content.lines().enumerate() {
        if let Some(mut pending) = open.take() {
            pending.text.push('\n');
            match line.trim_end().strip_suffix(pending.quote) {
                Some(last) => {
                    pending.text.push_str(last);
                    map.insert(pending.key, SourceValue::Str(pending.text));
                }
                None => {
                    pending.text.push_str(line);
                    open = Some(pending);
                }
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(parse_error(index + 1, "expected 'key=value'"));
        };
        let key = key.trim().to_string();
        // `trimmed` lost the line's trailing whitespace; quoted text keeps it.
        let value = line
            .split_once('=')
            .map_or(value, |(_, raw)| raw)
            .trim_start();

        match TRIPLE_QUOTES
            .into_iter()
            .find(|quote| value.starts_with(*quote))
        {
            Some(quote) => {
                let body = &value[quote.len()..];
                match body.trim_end().strip_suffix(quote) {
                    Some(inner) => {
                        map.insert(key, SourceValue::Str(inner.to_string()));
                    }
                    None => {
                        open = Some(OpenQuote {
                            key,
                            quote,
                            text: body.to_string(),
                            line: index + 1,
                        });
                    }
                }
            }
            None => {
                map.insert(key, SourceValue::Str(value.trim_end().to_string()));
            }
        }
    }

    match open {
        Some(pending) => Err(parse_error(
            pending.line,
            &format!("no closing {} for '{}'", pending.quote, pending.key),
        )),
        None => Ok(map),
    }
}

fn toml_map(table: &toml::Table) -> SourceMap {
    table
        .iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::Table(sub) => SourceValue::Table(toml_map(sub)),
                toml::Value::String(s) => SourceValue::Str(s.clone()),
                other => SourceValue::Typed(toml_scalar(other)),
            };
            (key.clone(), value)
        })
        .collect()
}

fn json_map(object: &serde_json::Map<String, serde_json::Value>) -> SourceMap {
    object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::Object(sub) => SourceValue::Table(json_map(sub)),
                serde_json::Value::String(s) => SourceValue::Str(s.clone()),
                other => SourceValue::Typed(json_scalar(other)),
            };
            (key.clone(), value)
        })
        .collect()
}

/// A TOML leaf as a [`Value`]. Datetimes without an offset become
/// `DateTime`/`Date`; tables fall back to their TOML text.
pub(crate) fn toml_scalar(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => {
            let text = dt.to_string();
            let converter = match (dt.date, dt.time, dt.offset) {
                (Some(_), Some(_), None) => Converter::datetime(),
                (Some(_), None, None) => Converter::date(),
                _ => return Value::Str(text),
            };
            converter.convert(&text).unwrap_or(Value::Str(text))
        }
        toml::Value::Array(items) => Value::List(items.iter().map(toml_scalar).collect()),
        toml::Value::Table(table) => Value::Str(table.to_string()),
    }
}

/// A JSON leaf as a [`Value`].
pub(crate) fn json_scalar(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_scalar).collect()),
        serde_json::Value::Object(_) => Value::Str(value.to_string()),
    }
}

// --- discovery ---

/// A single-directory search path as a concrete directory, or `None` when it
/// cannot be resolved (no home directory, no current directory).
fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
        SearchPath::Ancestors(_) => None,
    }
}

/// Directories from `start` up to `boundary`, shallowest first.
pub fn expand_ancestors_from(start: &Path, boundary: &Boundary) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = start
        .ancestors()
        .scan(false, |stop, dir| {
            if *stop {
                return None;
            }
            if let Boundary::Marker(name) = boundary {
                *stop = dir.join(name).exists();
            }
            Some(dir.to_path_buf())
        })
        .collect();
    dirs.reverse();
    dirs
}

/// All search paths as concrete directories, priority-ascending.
/// `Ancestors` walks from `ancestors_start`, or the current directory.
pub fn expand_search_paths(
    search_paths: &[SearchPath],
    app_name: &str,
    ancestors_start: Option<&Path>,
) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for sp in search_paths {
        match sp {
            SearchPath::Ancestors(boundary) => {
                let start = match ancestors_start {
                    Some(start) => start.to_path_buf(),
                    None => match std::env::current_dir() {
                        Ok(cwd) => cwd,
                        Err(_) => continue,
                    },
                };
                dirs.extend(expand_ancestors_from(&start, boundary));
            }
            other => dirs.extend(resolve_search_path(other, app_name)),
        }
    }
    dirs
}

/// Find and parse `file_name` in `dirs`, respecting `mode`.
pub fn load_from_dirs(
    dirs: &[PathBuf],
    file_name: &str,
    mode: SearchMode,
) -> Result<Vec<FileSource>, NestfigError> {
    let mut found = Vec::new();
    let ordered: Box<dyn Iterator<Item = &PathBuf>> = match mode {
        SearchMode::Merge => Box::new(dirs.iter()),
        SearchMode::FirstMatch => Box::new(dirs.iter().rev()),
    };
    for dir in ordered {
        let path = dir.join(file_name);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                found.push(FileSource::parse(path, &content)?);
                if mode == SearchMode::FirstMatch {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(NestfigError::IoError { path, source: e }),
        }
    }
    Ok(found)
}

/// Discover config files along `search_paths` and parse them into sources,
/// lowest priority first.
pub fn discover(
    search_paths: &[SearchPath],
    file_name: &str,
    app_name: &str,
    mode: SearchMode,
) -> Result<Vec<FileSource>, NestfigError> {
    let dirs = expand_search_paths(search_paths, app_name, None);
    load_from_dirs(&dirs, file_name, mode)
}
