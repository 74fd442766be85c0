//! Config file lookup has two independent axes:
//!
//! - **Discovery**: which directories are searched, listed as [`SearchPath`]s
//!   in priority-ascending order (last = highest priority).
//! - **Resolution**: what happens when more than one directory holds the
//!   file, chosen by [`SearchMode`].
//!
//! Each file found becomes one value source; the file format is picked from
//! the extension by [`FileFormat::from_path`](crate::file::FileFormat::from_path).

use std::path::PathBuf;

/// Where to search for config files.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp")`.
    Home(&'static str),
    /// Current working directory.
    Cwd,
    /// An explicit path.
    Path(PathBuf),
    /// The current directory and its parents, up to `Boundary`.
    Ancestors(Boundary),
}

/// Where an [`Ancestors`](SearchPath::Ancestors) walk stops.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// Walk to the filesystem root.
    Root,
    /// Stop at the first directory containing this file or directory name
    /// (inclusive), e.g. `Marker(".git")`.
    Marker(&'static str),
}

/// How multiple found files are used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Every found file is a source, later ones overriding earlier ones.
    #[default]
    Merge,
    /// Only the highest-priority file found is used.
    FirstMatch,
}
