//! Real Haskell toolchain adapter
//!
//! Implements the Toolchain trait by shelling out to `ghc`, `ghc-pkg` and
//! `cabal`. Binary names are overridable (GHC/GHC_PKG/CABAL or config) so a
//! versioned compiler like `ghc-9.4.8` can be selected.

use crate::config::ToolchainSettings;
use crate::error::{CoupError, CoupResult};
use crate::toolchain::{ExecutionContext, InstallTarget, Toolchain};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Toolchain backed by the real `ghc`/`ghc-pkg`/`cabal` binaries
pub struct GhcToolchain {
    ghc: String,
    ghc_pkg: String,
    cabal: String,
}

impl GhcToolchain {
    pub fn new(settings: &ToolchainSettings) -> Self {
        Self {
            ghc: settings.ghc.clone(),
            ghc_pkg: settings.ghc_pkg.clone(),
            cabal: settings.cabal.clone(),
        }
    }

    /// Check that a tool answers `--version`
    async fn tool_answers(name: &str) -> bool {
        Command::new(name)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run a tool and capture its output
    async fn exec(&self, program: &str, args: &[String]) -> CoupResult<std::process::Output> {
        debug!("Executing: {} {:?}", program, args);

        Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CoupError::command_failed(format!("{} {:?}", program, args), e))
    }

    /// Run a tool with inherited stdio, returning its exit code
    async fn exec_interactive(
        &self,
        program: &str,
        args: &[String],
        ctx: &ExecutionContext,
    ) -> CoupResult<i32> {
        debug!("Executing interactively: {} {:?}", program, args);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        ctx.apply(&mut cmd);

        let status = cmd
            .status()
            .await
            .map_err(|e| CoupError::command_failed(format!("{} {:?}", program, args), e))?;

        Ok(status.code().unwrap_or(-1))
    }

    fn package_db_flags(search_paths: &[PathBuf]) -> Vec<String> {
        search_paths
            .iter()
            .map(|p| format!("--package-db={}", p.display()))
            .collect()
    }

    /// Arguments shared by the planner dry-run and the pre-flight check
    fn dry_run_args(
        &self,
        targets: &[String],
        extra_flags: &[String],
        search_paths: &[PathBuf],
    ) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            "--global".to_string(),
            "-v0".to_string(),
            "--dry-run".to_string(),
        ];
        args.extend(Self::package_db_flags(search_paths));
        args.extend(extra_flags.iter().cloned());
        args.extend(targets.iter().cloned());
        args
    }
}

#[async_trait]
impl Toolchain for GhcToolchain {
    async fn ensure_ready(&self) -> CoupResult<()> {
        for tool in [&self.ghc, &self.ghc_pkg, &self.cabal] {
            if !Self::tool_answers(tool).await {
                return Err(CoupError::ExternalToolMissing(tool.clone()));
            }
        }
        Ok(())
    }

    async fn numeric_version(&self) -> CoupResult<String> {
        let args = vec!["--numeric-version".to_string()];
        let output = self.exec(&self.ghc, &args).await?;
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();

        // three-component versions only, e.g. "9.4.8"
        if output.status.success() && semver::Version::parse(&version).is_ok() {
            Ok(version)
        } else {
            Err(CoupError::ToolchainVersion(version))
        }
    }

    async fn global_package_db(&self) -> CoupResult<PathBuf> {
        let args = vec!["--print-global-package-db".to_string()];
        let output = self.exec(&self.ghc, &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoupError::command_exec(
                format!("{} --print-global-package-db", self.ghc),
                stderr,
            ));
        }

        let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        if path.exists() {
            Ok(path)
        } else {
            Err(CoupError::GlobalDbMissing(path))
        }
    }

    async fn plan_dry_run(
        &self,
        targets: &[String],
        extra_flags: &[String],
        search_paths: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<String> {
        let args = self.dry_run_args(targets, extra_flags, search_paths);
        debug!("Resolving plan: {} {:?}", self.cabal, args);

        let mut cmd = Command::new(&self.cabal);
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        ctx.apply_config(&mut cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| CoupError::command_failed(format!("{} install --dry-run", self.cabal), e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(CoupError::ResolverInvocationFailed {
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }

    async fn is_registered(&self, name: &str, db: &Path) -> CoupResult<bool> {
        let status = Command::new(&self.ghc_pkg)
            .arg(format!("--package-conf={}", db.display()))
            .arg("describe")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CoupError::command_failed(format!("{} describe {}", self.ghc_pkg, name), e))?;

        Ok(status.success())
    }

    async fn init_db(&self, db: &Path) -> CoupResult<()> {
        let args = vec!["init".to_string(), db.display().to_string()];
        let output = self.exec(&self.ghc_pkg, &args).await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CoupError::DatabaseInit {
                path: db.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }

    async fn proposed_installs(
        &self,
        target: &InstallTarget,
        search_paths: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<Vec<String>> {
        let targets = match target {
            InstallTarget::Package(name) => vec![name.clone()],
            InstallTarget::LocalDirectory { .. } => vec![],
        };
        let out = self.plan_dry_run(&targets, &[], search_paths, ctx).await?;

        Ok(out
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect())
    }

    async fn install(
        &self,
        target: &InstallTarget,
        prefix: &Path,
        search_paths: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<()> {
        let mut args = vec![
            "install".to_string(),
            format!("--prefix={}", prefix.display()),
        ];
        if ctx.profiling {
            args.push("--enable-library-profiling".to_string());
        }
        args.extend(Self::package_db_flags(search_paths));
        if let InstallTarget::Package(name) = target {
            args.push(name.clone());
        }

        debug!("Installing {}: {} {:?}", target, self.cabal, args);

        // the installer's diagnostics stream through unmodified
        let mut cmd = Command::new(&self.cabal);
        cmd.args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        ctx.apply_config(&mut cmd);

        let status = cmd
            .status()
            .await
            .map_err(|e| CoupError::command_failed(format!("{} install", self.cabal), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(CoupError::InstallFailed(target.display_name().to_string()))
        }
    }

    async fn cabal(&self, args: &[String], ctx: &ExecutionContext) -> CoupResult<i32> {
        let program = self.cabal.clone();
        self.exec_interactive(&program, args, ctx).await
    }

    async fn ghc_pkg(&self, args: &[String], ctx: &ExecutionContext) -> CoupResult<i32> {
        let program = self.ghc_pkg.clone();
        self.exec_interactive(&program, args, ctx).await
    }

    fn toolchain_name(&self) -> &'static str {
        "ghc/cabal"
    }
}
