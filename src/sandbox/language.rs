//! Extension-to-runner table
//!
//! | extension     | run                          | compile                     |
//! |---------------|------------------------------|-----------------------------|
//! | `.py`         | `python3 <file>`             | -                           |
//! | `.js`, `.jsx` | `node <file>`                | -                           |
//! | `.cpp`        | `<stem>`                     | `g++ -std=c++17 -O2 -o <stem>` |
//! | `.java`       | `java -cp <root> <Stem>`     | `javac <file>`              |

use std::fmt;
use std::path::Path;

use super::SandboxError;

/// Languages the execution engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    Cpp,
    Java,
}

impl Language {
    /// Pick a language from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, SandboxError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "py" => Ok(Language::Python),
            "js" | "jsx" => Ok(Language::JavaScript),
            "cpp" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "" => Err(SandboxError::UnsupportedType(String::new())),
            other => Err(SandboxError::UnsupportedType(format!(".{}", other))),
        }
    }

    /// Whether a compile step precedes the run step
    pub fn is_compiled(self) -> bool {
        matches!(self, Language::Cpp | Language::Java)
    }

    /// Label used in metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// Human-facing name used in compile failure messages
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::Cpp => "C++",
            Language::Java => "Java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
