//! External toolchain abstraction
//!
//! Every unit of real work is delegated to the Haskell toolchain (`ghc`,
//! `ghc-pkg`, `cabal`) as a blocking subprocess. The trait keeps that seam
//! narrow: plan parsing and cache decisions live behind it, so tests can
//! substitute a fake and the text-protocol fragility stays in one place.

pub mod context;
pub mod ghc;

pub use context::ExecutionContext;
pub use ghc::GhcToolchain;

use crate::error::CoupResult;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// What an install invocation is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    /// A named `name-version` package from the plan
    Package(String),

    /// The package rooted at the current directory. The installer is invoked
    /// with no package argument; the name is carried for diagnostics only.
    LocalDirectory { name: String },
}

impl InstallTarget {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Package(name) => name,
            Self::LocalDirectory { name } => name,
        }
    }
}

impl fmt::Display for InstallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Abstract interface to the external resolver/compiler toolchain
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Verify the underlying tools exist
    async fn ensure_ready(&self) -> CoupResult<()>;

    /// Numeric compiler version, e.g. "9.4.8"
    async fn numeric_version(&self) -> CoupResult<String>;

    /// Path of the compiler's global package database
    async fn global_package_db(&self) -> CoupResult<PathBuf>;

    /// Dry-run the install of `targets` and return the raw plan output: one
    /// line per package, first token the package, the rest its dependencies,
    /// lines in install order.
    async fn plan_dry_run(
        &self,
        targets: &[String],
        extra_flags: &[String],
        search_paths: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<String>;

    /// Cheap probe: is `name` present in the database at `db`?
    async fn is_registered(&self, name: &str, db: &Path) -> CoupResult<bool>;

    /// Initialize an empty package database at `db`
    async fn init_db(&self, db: &Path) -> CoupResult<()>;

    /// The packages the installer would touch for `target` given these
    /// database search paths, without installing anything
    async fn proposed_installs(
        &self,
        target: &InstallTarget,
        search_paths: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<Vec<String>>;

    /// Install `target` with prefix `prefix` and the given database search
    /// paths, streaming the tool's own diagnostics through
    async fn install(
        &self,
        target: &InstallTarget,
        prefix: &Path,
        search_paths: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<()>;

    /// Run a raw cabal subcommand in the project environment, returning the
    /// child's exit code
    async fn cabal(&self, args: &[String], ctx: &ExecutionContext) -> CoupResult<i32>;

    /// Run a raw ghc-pkg subcommand in the project environment, returning the
    /// child's exit code
    async fn ghc_pkg(&self, args: &[String], ctx: &ExecutionContext) -> CoupResult<i32>;

    /// Human-readable toolchain name for display
    fn toolchain_name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-memory toolchain for plan, cache, and project tests

    use super::*;
    use crate::error::CoupError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// One recorded install invocation
    #[derive(Debug, Clone)]
    pub struct InstallCall {
        pub target: InstallTarget,
        pub prefix: PathBuf,
        pub search_paths: Vec<PathBuf>,
    }

    pub struct FakeToolchain {
        pub version: String,
        pub global_db: PathBuf,
        pub plan_output: Mutex<String>,
        /// Databases considered populated, keyed `name@db-path`
        pub populated: Mutex<HashSet<String>>,
        pub install_calls: Mutex<Vec<InstallCall>>,
        pub init_calls: Mutex<Vec<PathBuf>>,
        /// When set, returned from `proposed_installs` instead of the target
        pub proposed_override: Mutex<Option<Vec<String>>>,
        /// When set, installs of this package fail
        pub fail_install: Mutex<Option<String>>,
    }

    impl FakeToolchain {
        pub fn new(plan_output: &str) -> Self {
            Self {
                version: "9.4.8".to_string(),
                global_db: PathBuf::from("/fake/ghc/package.conf.d"),
                plan_output: Mutex::new(plan_output.to_string()),
                populated: Mutex::new(HashSet::new()),
                install_calls: Mutex::new(Vec::new()),
                init_calls: Mutex::new(Vec::new()),
                proposed_override: Mutex::new(None),
                fail_install: Mutex::new(None),
            }
        }

        pub fn key(name: &str, db: &Path) -> String {
            format!("{}@{}", name, db.display())
        }

        pub fn mark_populated(&self, name: &str, db: &Path) {
            self.populated.lock().unwrap().insert(Self::key(name, db));
        }

        pub fn install_count(&self) -> usize {
            self.install_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        async fn ensure_ready(&self) -> CoupResult<()> {
            Ok(())
        }

        async fn numeric_version(&self) -> CoupResult<String> {
            Ok(self.version.clone())
        }

        async fn global_package_db(&self) -> CoupResult<PathBuf> {
            Ok(self.global_db.clone())
        }

        async fn plan_dry_run(
            &self,
            _targets: &[String],
            _extra_flags: &[String],
            _search_paths: &[PathBuf],
            _ctx: &ExecutionContext,
        ) -> CoupResult<String> {
            Ok(self.plan_output.lock().unwrap().clone())
        }

        async fn is_registered(&self, name: &str, db: &Path) -> CoupResult<bool> {
            Ok(self.populated.lock().unwrap().contains(&Self::key(name, db)))
        }

        async fn init_db(&self, db: &Path) -> CoupResult<()> {
            std::fs::create_dir_all(db)
                .map_err(|e| CoupError::io(format!("creating fake db {}", db.display()), e))?;
            self.init_calls.lock().unwrap().push(db.to_path_buf());
            Ok(())
        }

        async fn proposed_installs(
            &self,
            target: &InstallTarget,
            _search_paths: &[PathBuf],
            _ctx: &ExecutionContext,
        ) -> CoupResult<Vec<String>> {
            if let Some(proposed) = self.proposed_override.lock().unwrap().clone() {
                return Ok(proposed);
            }
            Ok(vec![target.display_name().to_string()])
        }

        async fn install(
            &self,
            target: &InstallTarget,
            prefix: &Path,
            search_paths: &[PathBuf],
            _ctx: &ExecutionContext,
        ) -> CoupResult<()> {
            let name = target.display_name().to_string();
            if self.fail_install.lock().unwrap().as_deref() == Some(name.as_str()) {
                return Err(CoupError::InstallFailed(name));
            }

            // the node's own database is always the last search path
            if let Some(own_db) = search_paths.last() {
                self.mark_populated(&name, own_db);
            }
            self.install_calls.lock().unwrap().push(InstallCall {
                target: target.clone(),
                prefix: prefix.to_path_buf(),
                search_paths: search_paths.to_vec(),
            });
            Ok(())
        }

        async fn cabal(&self, _args: &[String], _ctx: &ExecutionContext) -> CoupResult<i32> {
            Ok(0)
        }

        async fn ghc_pkg(&self, _args: &[String], _ctx: &ExecutionContext) -> CoupResult<i32> {
            Ok(0)
        }

        fn toolchain_name(&self) -> &'static str {
            "fake"
        }
    }
}
