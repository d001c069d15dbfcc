//! Locating the external agent runtime executable.
//!
//! The runtime is installed next to a Python interpreter, so the default search
//! list is derived from the interpreter's directory. The first existing
//! candidate wins.

use std::path::{Path, PathBuf};

/// Name of the agent network runtime executable, without platform suffix.
pub const RUNTIME_EXECUTABLE: &str = "openagents";

#[derive(Debug, thiserror::Error)]
#[error("could not find {name}; searched: {}", display_paths(.candidates))]
pub struct ResolveError {
    pub name: String,
    pub candidates: Vec<PathBuf>,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Platform file name for an executable stem.
pub fn executable_file_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{stem}.exe")
    } else {
        stem.to_string()
    }
}

/// Look `name` up on `PATH`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Ordered candidate list for one executable.
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    name: String,
    candidates: Vec<PathBuf>,
}

impl ExecutableResolver {
    pub fn new(name: impl Into<String>, candidates: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }

    /// A single, explicitly configured location.
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self::new(RUNTIME_EXECUTABLE, vec![path.into()])
    }

    /// Default runtime locations relative to a Python interpreter.
    ///
    /// Order: beside the interpreter, its `Scripts` subdirectory, then one level up.
    /// A bare interpreter name is looked up on `PATH` first.
    pub fn for_python(python: &Path) -> Self {
        let python = if python.components().count() == 1 {
            python
                .to_str()
                .and_then(find_on_path)
                .unwrap_or_else(|| python.to_path_buf())
        } else {
            python.to_path_buf()
        };
        // Resolve the directory only: a virtualenv interpreter links elsewhere
        // but its runtime lives beside the link.
        let python_dir = python
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let python_dir = python_dir
            .canonicalize()
            .unwrap_or_else(|_| python_dir.to_path_buf());

        let file_name = executable_file_name(RUNTIME_EXECUTABLE);
        let mut candidates = vec![
            python_dir.join(&file_name),
            python_dir.join("Scripts").join(&file_name),
        ];
        if let Some(parent) = python_dir.parent() {
            candidates.push(parent.join(&file_name));
        }

        Self::new(RUNTIME_EXECUTABLE, candidates)
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn resolve(&self) -> Result<PathBuf, ResolveError> {
        self.candidates
            .iter()
            .find(|c| c.is_file())
            .cloned()
            .ok_or_else(|| ResolveError {
                name: self.name.clone(),
                candidates: self.candidates.clone(),
            })
    }
}
