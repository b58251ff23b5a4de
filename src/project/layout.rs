//! On-disk layout of the cache root
//!
//! ```text
//! <root>/projects/<name>-<digest>/ghc-<version>[-prof]/
//!     packages.conf.d/        the project's own database
//!     cabal.config            generated toolchain config (created once)
//!     installed_packages      registered database paths
//!     packages/               local mirror of registry metadata
//!     dist/<descriptor>/      local build output
//! <root>/packages/ghc-<version>[-prof]/<name>-<digest>/package.conf.d/
//! <root>/cache/<name>/<version>/<name>-<version>.tar.gz
//! ```

use crate::error::{CoupError, CoupResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cache root directory layout
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloaded archive cache, shared by every project
    pub fn archive_cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Versioned root for isolated per-dependency-set package databases
    pub fn packages_dir(&self, ghc_version: &str, profiling: bool) -> PathBuf {
        self.root
            .join("packages")
            .join(versioned_segment(ghc_version, profiling))
    }

    /// Environment directory for one (declaration, toolchain version) pair.
    /// Any change to the requested set or the compiler version changes the
    /// digest or the segment, yielding an isolated directory.
    pub fn project_env_dir(
        &self,
        project_name: &str,
        digest: &str,
        ghc_version: &str,
        profiling: bool,
    ) -> ProjectEnv {
        let dir = self
            .root
            .join("projects")
            .join(format!("{}-{}", project_name, digest))
            .join(versioned_segment(ghc_version, profiling));
        ProjectEnv { dir }
    }
}

fn versioned_segment(ghc_version: &str, profiling: bool) -> String {
    if profiling {
        format!("ghc-{}-prof", ghc_version)
    } else {
        format!("ghc-{}", ghc_version)
    }
}

/// One project's environment directory and the well-known paths inside it
#[derive(Debug, Clone)]
pub struct ProjectEnv {
    dir: PathBuf,
}

impl ProjectEnv {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The project's own database, for ad-hoc local installs
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("packages.conf.d")
    }

    pub fn cabal_config(&self) -> PathBuf {
        self.dir.join("cabal.config")
    }

    /// Local mirror of the registry metadata this project needs
    pub fn repo_dir(&self) -> PathBuf {
        self.dir.join("packages")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.dir.join("bin")
    }

    /// Build output directory for the named local source descriptor. Keyed by
    /// descriptor name so two differently-named local projects sharing this
    /// environment never collide on build output.
    pub fn dist_dir(&self, descriptor: &str) -> PathBuf {
        self.dir.join("dist").join(descriptor)
    }
}

/// Write the generated toolchain config, once. An existing config is never
/// regenerated.
pub fn write_cabal_config(
    env: &ProjectEnv,
    ghc_version: &str,
    profiling: bool,
) -> CoupResult<()> {
    let path = env.cabal_config();
    if path.exists() {
        debug!("Toolchain config already present: {}", path.display());
        return Ok(());
    }

    let mut config = String::new();
    config.push_str(&format!("local-repo: {}\n", env.repo_dir().display()));
    config.push_str(&format!("with-compiler: ghc-{}\n", ghc_version));
    config.push_str(&format!("package-db: {}\n", env.db_path().display()));
    if profiling {
        config.push_str("library-profiling: True\n");
    }

    // Binaries always land in the project's bin dir; the per-package prefix
    // is supplied by each install invocation, so the prefix here is a
    // placeholder that must never be used.
    config.push_str("install-dirs user\n");
    config.push_str("  prefix: DUMMY\n");
    config.push_str(&format!("  bindir: {}\n", env.bin_dir().display()));
    config.push_str("  libdir: $prefix\n");
    config.push_str("  libsubdir: $pkgid/lib\n");
    config.push_str("  libexecdir: $prefix/$pkgid/libexec\n");
    config.push_str("  datadir: $prefix\n");
    config.push_str("  datasubdir: $pkgid/share\n");
    config.push_str("  docdir: $datadir/$pkgid/doc\n");

    std::fs::write(&path, config)
        .map_err(|e| CoupError::io(format!("writing toolchain config {}", path.display()), e))?;
    debug!("Wrote toolchain config {}", path.display());
    Ok(())
}
