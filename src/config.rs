//! User configuration
//!
//! Optional file at `~/.config/coup/config.toml`; every field has a default
//! and a missing file is not an error. Environment variables override the
//! file, command-line flags override both.

use crate::error::{CoupError, CoupResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// External tool selection
    pub toolchain: ToolchainSettings,

    /// Cache location
    pub cache: CacheSettings,
}

/// External tool selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Compiler binary name (a versioned name like `ghc-9.4.8` works)
    pub ghc: String,

    /// Database tool binary name
    pub ghc_pkg: String,

    /// Resolver/installer binary name
    pub cabal: String,

    /// Compiler version override; skips probing `ghc --numeric-version`
    pub version: Option<String>,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            ghc: "ghc".to_string(),
            ghc_pkg: "ghc-pkg".to_string(),
            cabal: "cabal".to_string(),
            version: None,
        }
    }
}

/// Cache location settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache root; defaults to `~/.coup`
    pub root: Option<PathBuf>,
}

impl Settings {
    /// Default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coup")
            .join("config.toml")
    }

    /// Load settings, then fold in environment overrides. A missing file
    /// yields defaults.
    pub fn load(path: Option<&Path>) -> CoupResult<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| CoupError::io(format!("reading config {}", path.display()), e))?;
            toml::from_str(&content).map_err(|e| CoupError::ConfigInvalid {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            Self::default()
        };

        settings.apply_env();
        Ok(settings)
    }

    /// Environment overrides: GHC, GHC_PKG, CABAL select binaries,
    /// COUP_GHC_VERSION pins the compiler version, COUP_USER_DIR moves the
    /// cache root.
    fn apply_env(&mut self) {
        if let Ok(ghc) = std::env::var("GHC") {
            self.toolchain.ghc = ghc;
        }
        if let Ok(ghc_pkg) = std::env::var("GHC_PKG") {
            self.toolchain.ghc_pkg = ghc_pkg;
        }
        if let Ok(cabal) = std::env::var("CABAL") {
            self.toolchain.cabal = cabal;
        }
        if let Ok(version) = std::env::var("COUP_GHC_VERSION") {
            self.toolchain.version = Some(version);
        }
        if let Ok(root) = std::env::var("COUP_USER_DIR") {
            self.cache.root = Some(PathBuf::from(root));
        }
    }

    /// Effective cache root
    pub fn cache_root(&self) -> PathBuf {
        self.cache.root.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".coup")
        })
    }
}
