//! Sandbox module for confined file access and source execution
//!
//! Everything a tool call touches on disk goes through this module:
//! - `path_guard` - resolves model-supplied paths and rejects escapes
//! - `language` - maps file extensions to run/compile commands
//! - `execution` - compiles and runs a source file with a hard timeout
//!
//! # Confinement
//!
//! ```text
//! WorkingDirectory (/work/project)
//!        │
//!        ├── "src/main.py"        → /work/project/src/main.py   ✅
//!        ├── "../secrets.txt"     → /work/secrets.txt           ❌ PathEscape
//!        └── "/etc/passwd"        → /etc/passwd                 ❌ PathEscape
//! ```
//!
//! The guard is a path-prefix check, not an OS-level jail. Spawned programs
//! run with the privileges of the host process.

pub mod execution;
pub mod language;
pub mod path_guard;

pub use execution::{ExecutionConfig, ExecutionEngine, ExecutionReport};
pub use language::Language;
pub use path_guard::{confine, confine_existing};

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised inside the sandbox
///
/// None of these abort an agent session: the tool layer renders them as
/// text and feeds them back to the model.
#[derive(Debug)]
pub enum SandboxError {
    /// Resolved path is outside the working directory
    PathEscape(String),
    /// Resolved path does not exist
    NotFound(String),
    /// Resolved path exists but is not a regular file
    NotAFile(String),
    /// Resolved path exists but is not a directory
    NotADirectory(String),
    /// I/O failure while reading a file or listing a directory
    ReadError { path: String, source: io::Error },
    /// No runner is registered for the file extension
    UnsupportedType(String),
    /// The interpreter or compiler binary is not installed
    ExecutorNotFound(String),
    /// Compilation exited non-zero; carries the compiler's stderr
    CompileFailed {
        language: Language,
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The program exceeded its wall-clock budget and was killed
    TimedOut(Duration),
    /// Any other failure while spawning or waiting on a child process
    Spawn(io::Error),
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::PathEscape(path) => {
                write!(f, "\"{}\" is outside the working directory", path)
            }
            SandboxError::NotFound(path) => write!(f, "\"{}\" does not exist", path),
            SandboxError::NotAFile(path) => write!(f, "\"{}\" is not a file", path),
            SandboxError::NotADirectory(path) => write!(f, "\"{}\" is not a directory", path),
            SandboxError::ReadError { path, source } => {
                write!(f, "failed to read \"{}\": {}", path, source)
            }
            SandboxError::UnsupportedType(ext) => {
                write!(f, "unsupported file type \"{}\"", ext)
            }
            SandboxError::ExecutorNotFound(binary) => {
                write!(f, "required interpreter or compiler not found: {}", binary)
            }
            SandboxError::CompileFailed {
                language, stderr, ..
            } => write!(f, "{} compilation failed:\n{}", language.display_name(), stderr),
            SandboxError::TimedOut(timeout) => {
                write!(f, "execution exceeded {} s timeout", timeout.as_secs())
            }
            SandboxError::Spawn(e) => write!(f, "failed to run process: {}", e),
        }
    }
}

impl std::error::Error for SandboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SandboxError::ReadError { source, .. } => Some(source),
            SandboxError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Immediate entry counts of a working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub file_count: usize,
    pub dir_count: usize,
}

/// The single filesystem root a session may read from and execute within
///
/// Always stored in canonical form so that confinement checks compare
/// like with like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    /// Open a working directory, canonicalizing it
    ///
    /// Fails if the path does not exist or is not a directory.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let root = std::fs::canonicalize(path)?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", path.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Canonical root path
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Count immediate files and directories under the root
    pub fn summary(&self) -> io::Result<WorkspaceSummary> {
        let mut summary = WorkspaceSummary {
            file_count: 0,
            dir_count: 0,
        };
        for entry in std::fs::read_dir(&self.root)? {
            let file_type = entry?.file_type()?;
            if file_type.is_dir() {
                summary.dir_count += 1;
            } else if file_type.is_file() {
                summary.file_count += 1;
            }
        }
        Ok(summary)
    }
}
