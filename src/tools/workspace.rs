// Workspace sandbox
//
// File tools only see paths under the workspace root. Resolution is lexical:
// absolute paths and any `..` that would climb above the root are rejected
// before the filesystem is touched. Protected files (the database and the
// session store when they sit inside the root), along with their journal and
// temp siblings, are invisible to the tools.

use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    protected: Vec<PathBuf>,
}

impl Workspace {
    /// Use `root` as the sandbox, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create workspace: {}", root.display()))?;
        Ok(Self {
            root,
            protected: Vec::new(),
        })
    }

    /// Hide `path` from the file tools
    pub fn protect(mut self, path: impl AsRef<Path>) -> Self {
        self.protected.push(lexical_absolute(path.as_ref()));
        self
    }

    /// Whether `path` is a protected file or one of its siblings
    /// (`agent.db-journal`, `sessions.json.tmp`)
    pub fn is_protected(&self, path: &Path) -> bool {
        let path = lexical_absolute(path);
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        self.protected.iter().any(|guarded| {
            let Some(base) = guarded.file_name().map(|n| n.to_string_lossy()) else {
                return false;
            };
            path.parent() == guarded.parent()
                && (name == base
                    || name.starts_with(&format!("{}-", base))
                    || name.starts_with(&format!("{}.", base)))
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            bail!("Path must not be empty");
        }

        let candidate = Path::new(trimmed);
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        bail!("Path escapes the workspace: {}", relative);
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    bail!("Absolute paths are not allowed: {}", relative);
                }
            }
        }

        if parts.is_empty() {
            bail!("Path does not name a file: {}", relative);
        }

        let mut resolved = self.root.clone();
        resolved.extend(parts);
        if self.is_protected(&resolved) {
            bail!("Path is reserved for the assistant's own data: {}", relative);
        }
        Ok(resolved)
    }

    /// Workspace-relative form of `path` with `/` separators
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

/// Absolute form of `path` with `.` and `..` folded, without touching the
/// filesystem
fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
