use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds that end a run (or a resolution request) early.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Malformed or self-contradictory configuration, reported before discovery.
    #[error("configuration error: {0}")]
    Config(String),

    /// A setup script failed; no test file was executed.
    #[error("setup script {} failed: {reason}", script.display())]
    Setup { script: PathBuf, reason: String },

    /// Zero test files matched and the empty-suite policy forbids it.
    #[error(
        "no tests found under {roots} ({searched} files scanned); \
         set pass_with_no_tests to allow an empty run"
    )]
    NoTests { roots: String, searched: usize },

    #[error("cannot resolve module '{specifier}' (tried: {tried})")]
    Resolution { specifier: String, tried: String },

    #[error("transform of {} with '{tool}' failed: {reason}", file.display())]
    Transform {
        file: PathBuf,
        tool: String,
        reason: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error when it ends a run.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoTests { .. } => 1,
            _ => 2,
        }
    }
}
