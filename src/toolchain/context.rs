//! Per-project execution environment for external tool invocations
//!
//! The original design exported the database search path and the generated
//! toolchain config through process-global environment variables. Here the
//! same values travel as an explicit context applied to each child process,
//! never to our own environment.

use std::path::PathBuf;
use tokio::process::Command;

/// Environment injected into every external toolchain invocation
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Generated cabal config for this project environment
    pub cabal_config: PathBuf,

    /// Database search path exported to child processes (registered
    /// databases followed by the compiler's global database)
    pub package_path: Vec<PathBuf>,

    /// Build profiling variants of every library
    pub profiling: bool,
}

impl ExecutionContext {
    pub fn new(cabal_config: PathBuf, package_path: Vec<PathBuf>, profiling: bool) -> Self {
        Self {
            cabal_config,
            package_path,
            profiling,
        }
    }

    /// The `GHC_PACKAGE_PATH` value for child processes
    pub fn package_path_value(&self) -> String {
        let parts: Vec<String> = self
            .package_path
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        parts.join(":")
    }

    /// Apply the full environment: config plus database search path.
    /// Used for passthrough commands (build, exec, ghc-pkg queries).
    pub fn apply(&self, cmd: &mut Command) {
        self.apply_config(cmd);
        if !self.package_path.is_empty() {
            cmd.env("GHC_PACKAGE_PATH", self.package_path_value());
        }
    }

    /// Apply only the generated config. Install invocations select their
    /// databases with explicit `--package-db` flags instead, so exporting a
    /// search path there would fight with the installer's own selection.
    pub fn apply_config(&self, cmd: &mut Command) {
        cmd.env("CABAL_CONFIG", &self.cabal_config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_path_joins_with_colon() {
        let ctx = ExecutionContext::new(
            PathBuf::from("/proj/cabal.config"),
            vec![PathBuf::from("/a/db"), PathBuf::from("/b/db")],
            false,
        );
        assert_eq!(ctx.package_path_value(), "/a/db:/b/db");
    }

    #[test]
    fn empty_search_path_is_empty_value() {
        let ctx = ExecutionContext::new(PathBuf::from("/proj/cabal.config"), vec![], false);
        assert_eq!(ctx.package_path_value(), "");
    }
}
