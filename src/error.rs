//! Error types for coup
//!
//! All modules use `CoupResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for coup operations
pub type CoupResult<T> = Result<T, CoupError>;

/// All errors that can occur in coup
#[derive(Error, Debug)]
pub enum CoupError {
    // Declaration errors
    #[error("Malformed package token '{token}', expected <name>-<version>")]
    MalformedSpec { token: String },

    #[error("Malformed package token '{token}' at {path}:{line}, expected <name>-<version>")]
    MalformedDeclaration {
        token: String,
        path: PathBuf,
        line: usize,
    },

    #[error("No .hackage declaration found from {0} up to the filesystem root")]
    NoDeclarationFound(PathBuf),

    #[error("Multiple .hackage declarations found in {0}")]
    MultipleDeclarationsFound(PathBuf),

    #[error("Declaration file does not exist: {0}")]
    DeclarationNotFound(PathBuf),

    // Local build target errors
    #[error("No .cabal file found in {0}")]
    NoCabalFile(PathBuf),

    #[error("Multiple .cabal files found in {0}")]
    MultipleCabalFiles(PathBuf),

    // Toolchain errors
    #[error("External tool not found: {0}")]
    ExternalToolMissing(String),

    #[error("Could not determine compiler version from '{0}'")]
    ToolchainVersion(String),

    #[error("Global package database does not exist: {0}")]
    GlobalDbMissing(PathBuf),

    #[error("Dependency resolver failed: {stderr}")]
    ResolverInvocationFailed { stderr: String },

    #[error("Unparseable plan line from resolver: '{0}'")]
    PlanParse(String),

    #[error("Install of {0} failed")]
    InstallFailed(String),

    #[error("Installer proposed {proposed:?} instead of exactly {name}")]
    PlanInconsistent { name: String, proposed: Vec<String> },

    #[error("Failed to initialize package database {path}: {stderr}")]
    DatabaseInit { path: PathBuf, stderr: String },

    // Mirror errors
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl CoupError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoDeclarationFound(_) => {
                Some("Create a <project>.hackage file listing name-version tokens, or pass -p <path>")
            }
            Self::MultipleDeclarationsFound(_) => Some("Select one with -p <path>"),
            Self::ExternalToolMissing(_) => {
                Some("Install the Haskell toolchain (ghc, ghc-pkg, cabal) or set GHC/GHC_PKG/CABAL")
            }
            Self::PlanInconsistent { .. } => {
                Some("The resolver changed its mind between planning and install; re-run with -v for details")
            }
            _ => None,
        }
    }
}
