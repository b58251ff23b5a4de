//! Project orchestration
//!
//! Composes declaration parsing, plan resolution, the database cache walk and
//! the durable registry into the commands the CLI exposes.

pub mod layout;
pub mod repo;

pub use layout::{Layout, ProjectEnv};

use crate::cache::{CacheWalk, WalkSummary};
use crate::declaration::{self, Declaration, PackageSpec};
use crate::digest::dependency_digest;
use crate::error::{CoupError, CoupResult};
use crate::plan::{InstallPlan, PlanResolver};
use crate::state::InstallRegistry;
use crate::toolchain::{ExecutionContext, Toolchain};
use console::style;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tracing::{debug, info};

/// How to open a project
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Explicit declaration path; otherwise the nearest `*.hackage` up the
    /// directory tree is used
    pub declaration: Option<PathBuf>,

    /// Build profiling variants (forks every versioned cache path)
    pub profiling: bool,

    /// Cache root (default `~/.coup`)
    pub cache_root: PathBuf,

    /// Compiler version override; skips probing the compiler
    pub version: Option<String>,
}

/// An opened project: declaration resolved, environment directories in
/// place, registry loaded
pub struct Project {
    name: String,
    declaration_path: PathBuf,
    declaration: Declaration,
    package_list: Vec<String>,
    ghc_version: String,
    profiling: bool,
    layout: Layout,
    env: ProjectEnv,
    global_db: PathBuf,
    registry: InstallRegistry,
    toolchain: Arc<dyn Toolchain>,
}

impl Project {
    /// Open (and on first use, create) the project environment for a
    /// declaration. Idempotent: the config and databases are only created
    /// when absent.
    pub async fn open(toolchain: Arc<dyn Toolchain>, opts: OpenOptions) -> CoupResult<Self> {
        let declaration_path = match opts.declaration {
            Some(path) => path,
            None => {
                let cwd = current_dir()?;
                declaration::find_declaration(&cwd)?
            }
        };
        let declaration = Declaration::load(&declaration_path)?;

        for warning in declaration.validate() {
            eprintln!("{} {}", style("!").yellow(), warning);
        }

        let package_list = declaration.flatten();
        let name = declaration_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());

        toolchain.ensure_ready().await?;
        let ghc_version = match opts.version {
            Some(version) => version,
            None => toolchain.numeric_version().await?,
        };

        let layout = Layout::new(opts.cache_root);
        let digest = dependency_digest(&package_list);
        let env = layout.project_env_dir(&name, &digest, &ghc_version, opts.profiling);

        tokio::fs::create_dir_all(env.dir())
            .await
            .map_err(|e| CoupError::io(format!("creating project dir {}", env.dir().display()), e))?;

        repo::sync_local_repo(&env.repo_dir(), &layout.archive_cache_dir(), &declaration).await?;

        if !env.db_path().exists() {
            toolchain.init_db(&env.db_path()).await?;
        }
        layout::write_cabal_config(&env, &ghc_version, opts.profiling)?;

        let global_db = toolchain.global_package_db().await?;
        let registry = InstallRegistry::load(env.dir()).await?;

        info!(
            "Opened project {} ({} packages, ghc {})",
            name,
            package_list.len(),
            ghc_version
        );

        Ok(Self {
            name,
            declaration_path,
            declaration,
            package_list,
            ghc_version,
            profiling: opts.profiling,
            layout,
            env,
            global_db,
            registry,
            toolchain,
        })
    }

    /// Environment injected into external invocations: the registered
    /// databases followed by the compiler's global database
    pub fn context(&self) -> ExecutionContext {
        let mut search = self.registry.paths().to_vec();
        search.push(self.global_db.clone());
        ExecutionContext::new(self.env.cabal_config(), search, self.profiling)
    }

    /// Resolve the install plan for `requested` tokens (empty = the package
    /// in the current directory)
    pub async fn resolve_plan(
        &self,
        requested: &[String],
        extra_flags: &[String],
    ) -> CoupResult<InstallPlan> {
        for token in requested {
            PackageSpec::parse(token)?;
        }

        let packages_root = self.layout.packages_dir(&self.ghc_version, self.profiling);
        let resolver = PlanResolver::new(self.toolchain.as_ref(), packages_root);
        resolver
            .resolve(requested, extra_flags, self.registry.paths(), &self.context())
            .await
    }

    /// Walk a resolved plan, installing or reusing each node and persisting
    /// every registration durably before the next node
    pub async fn apply_plan(
        &mut self,
        plan: &InstallPlan,
        requested: &[String],
        deps_only: bool,
    ) -> CoupResult<WalkSummary> {
        let local_name = if requested.is_empty() {
            Some(local_descriptor(&current_dir()?)?)
        } else {
            None
        };

        let ctx = self.context();
        let toolchain = self.toolchain.clone();
        let walk = CacheWalk::new(
            toolchain.as_ref(),
            plan,
            requested,
            deps_only,
            local_name.as_deref(),
        );
        walk.run(&mut self.registry, &ctx).await
    }

    /// Run a cabal subcommand in the project environment. Commands operating
    /// on the current directory get a build dir keyed by the local source
    /// descriptor, reachable through a `./dist` symlink.
    pub async fn run_cabal_command(
        &self,
        cmd: &str,
        pkgs: &[String],
        flags: &[String],
    ) -> CoupResult<i32> {
        if pkgs.is_empty() {
            let cwd = current_dir()?;
            let descriptor = local_descriptor(&cwd)?;
            let build_dir = self.env.dist_dir(&descriptor);
            tokio::fs::create_dir_all(&build_dir)
                .await
                .map_err(|e| CoupError::io(format!("creating {}", build_dir.display()), e))?;
            link_dist(&cwd, &build_dir).await?;
        }

        let mut args = vec![cmd.to_string()];
        args.extend(flags.iter().cloned());
        args.extend(pkgs.iter().cloned());
        self.toolchain.cabal(&args, &self.context()).await
    }

    /// ghc-pkg passthrough with the project's database search path
    pub async fn run_pkg_command(&self, args: &[String]) -> CoupResult<i32> {
        self.toolchain.ghc_pkg(args, &self.context()).await
    }

    /// Run an arbitrary command inside the project environment
    pub async fn exec(&self, command: &[String]) -> CoupResult<i32> {
        let (program, rest) = command
            .split_first()
            .ok_or_else(|| CoupError::command_exec("exec", "no command given"))?;
        debug!("Executing in project environment: {:?}", command);

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(rest)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        self.context().apply(&mut cmd);

        let status = cmd
            .status()
            .await
            .map_err(|e| CoupError::command_failed(program.clone(), e))?;
        Ok(status.code().unwrap_or(-1))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaration_path(&self) -> &Path {
        &self.declaration_path
    }

    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// Flattened, sorted `name-version` tokens from the declaration
    pub fn package_list(&self) -> &[String] {
        &self.package_list
    }

    pub fn ghc_version(&self) -> &str {
        &self.ghc_version
    }

    pub fn env(&self) -> &ProjectEnv {
        &self.env
    }

    pub fn registered_dbs(&self) -> &[PathBuf] {
        self.registry.paths()
    }
}

fn current_dir() -> CoupResult<PathBuf> {
    std::env::current_dir().map_err(|e| CoupError::io("getting current directory", e))
}

/// Name of the single `*.cabal` source descriptor in `dir`
fn local_descriptor(dir: &Path) -> CoupResult<String> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CoupError::io(format!("reading directory {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CoupError::io("reading directory entry", e))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "cabal") {
            found.push(path);
        }
    }

    match found.len() {
        0 => Err(CoupError::NoCabalFile(dir.to_path_buf())),
        1 => Ok(found[0]
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()),
        _ => Err(CoupError::MultipleCabalFiles(dir.to_path_buf())),
    }
}

/// Point `./dist` at the project-local build dir. A stale symlink is
/// repointed; a real directory the user created is left alone.
async fn link_dist(cwd: &Path, build_dir: &Path) -> CoupResult<()> {
    #[cfg(unix)]
    {
        let link = cwd.join("dist");
        match tokio::fs::symlink_metadata(&link).await {
            Err(_) => {}
            Ok(meta) if meta.is_symlink() => {
                let target = tokio::fs::read_link(&link)
                    .await
                    .map_err(|e| CoupError::io("reading dist symlink", e))?;
                if target == build_dir {
                    return Ok(());
                }
                tokio::fs::remove_file(&link)
                    .await
                    .map_err(|e| CoupError::io("removing stale dist symlink", e))?;
            }
            Ok(_) => {
                debug!("./dist exists and is not a symlink, leaving it alone");
                return Ok(());
            }
        }

        tokio::fs::symlink(build_dir, &link)
            .await
            .map_err(|e| CoupError::io(format!("linking {}", link.display()), e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (cwd, build_dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::fake::FakeToolchain;
    use tempfile::TempDir;

    fn write_declaration(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Put a real archive with the package's .cabal member into the cache so
    /// the mirror sync never reaches for the network
    fn stage_archive(cache_root: &Path, token: &str) {
        let spec = PackageSpec::parse(token).unwrap();
        let staging = cache_root.join("staging").join(token);
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(
            staging.join(format!("{}.cabal", spec.name)),
            format!("name: {}\nversion: {}\n", spec.name, spec.version),
        )
        .unwrap();

        let archive = repo::archive_path(&cache_root.join("cache"), &spec);
        std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
        let status = std::process::Command::new("tar")
            .args([
                "czf",
                &archive.display().to_string(),
                "-C",
                &cache_root.join("staging").display().to_string(),
                &format!("{}/{}.cabal", token, spec.name),
            ])
            .status()
            .unwrap();
        assert!(status.success());
    }

    fn opts(declaration: PathBuf, root: &Path) -> OpenOptions {
        OpenOptions {
            declaration: Some(declaration),
            profiling: false,
            cache_root: root.to_path_buf(),
            version: None,
        }
    }

    async fn open_with_plan(temp: &TempDir, plan: &str) -> (Project, Arc<FakeToolchain>) {
        let decl = write_declaration(temp.path(), "proj.hackage", "x-1.0\n");
        let root = temp.path().join("coup-root");
        stage_archive(&root, "x-1.0");
        let toolchain = Arc::new(FakeToolchain::new(plan));
        let project = Project::open(toolchain.clone(), opts(decl, &root)).await.unwrap();
        (project, toolchain)
    }

    #[tokio::test]
    async fn open_creates_environment() {
        let temp = TempDir::new().unwrap();
        let (project, toolchain) = open_with_plan(&temp, "").await;

        assert_eq!(project.name(), "proj");
        assert_eq!(project.package_list(), &["x-1.0"]);
        assert_eq!(project.ghc_version(), "9.4.8");
        assert!(project.env().dir().exists());
        assert!(project.env().cabal_config().exists());
        assert!(project.env().repo_dir().join("00-index.tar").exists());
        // the project's own database was initialized exactly once
        assert_eq!(
            toolchain.init_calls.lock().unwrap().as_slice(),
            &[project.env().db_path()]
        );
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let decl = write_declaration(temp.path(), "proj.hackage", "x-1.0\n");
        let root = temp.path().join("coup-root");
        stage_archive(&root, "x-1.0");

        let toolchain = Arc::new(FakeToolchain::new(""));
        let first = Project::open(toolchain.clone(), opts(decl.clone(), &root))
            .await
            .unwrap();
        let config_before = std::fs::read_to_string(first.env().cabal_config()).unwrap();

        let second = Project::open(toolchain.clone(), opts(decl, &root)).await.unwrap();
        assert_eq!(first.env().dir(), second.env().dir());
        assert_eq!(
            std::fs::read_to_string(second.env().cabal_config()).unwrap(),
            config_before
        );
        // db init ran only on the first open
        assert_eq!(toolchain.init_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn changed_declaration_gets_isolated_environment() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("coup-root");
        stage_archive(&root, "x-1.0");
        stage_archive(&root, "y-1.0");
        let toolchain = Arc::new(FakeToolchain::new(""));

        let a = write_declaration(temp.path(), "proj.hackage", "x-1.0\n");
        let first = Project::open(toolchain.clone(), opts(a, &root)).await.unwrap();

        let b = write_declaration(temp.path(), "proj.hackage", "x-1.0\ny-1.0\n");
        let second = Project::open(toolchain.clone(), opts(b, &root)).await.unwrap();

        assert_ne!(first.env().dir(), second.env().dir());
    }

    #[tokio::test]
    async fn context_lists_registered_then_global() {
        let temp = TempDir::new().unwrap();
        let (mut project, _toolchain) = open_with_plan(&temp, "x-1.0\n").await;

        let plan = project.resolve_plan(&["x-1.0".to_string()], &[]).await.unwrap();
        let requested = vec!["x-1.0".to_string()];
        project.apply_plan(&plan, &requested, false).await.unwrap();

        let ctx = project.context();
        assert_eq!(ctx.package_path.len(), 2);
        assert_eq!(ctx.package_path[0], plan.nodes()[0].db_path);
        assert_eq!(
            ctx.package_path.last().unwrap(),
            &PathBuf::from("/fake/ghc/package.conf.d")
        );
    }

    #[tokio::test]
    async fn repeated_install_run_does_nothing() {
        let temp = TempDir::new().unwrap();
        let (mut project, toolchain) = open_with_plan(&temp, "a-1.0\nx-1.0 a-1.0\n").await;
        let requested = vec!["x-1.0".to_string()];

        let plan = project.resolve_plan(&requested, &[]).await.unwrap();
        let first = project.apply_plan(&plan, &requested, false).await.unwrap();
        assert_eq!(first.installed, 2);

        let plan = project.resolve_plan(&requested, &[]).await.unwrap();
        let second = project.apply_plan(&plan, &requested, false).await.unwrap();
        assert_eq!(second.installed, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(toolchain.install_count(), 2);
    }

    #[tokio::test]
    async fn resolve_plan_rejects_malformed_request() {
        let temp = TempDir::new().unwrap();
        let (project, _toolchain) = open_with_plan(&temp, "").await;

        let err = project
            .resolve_plan(&["notaversion".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CoupError::MalformedSpec { .. }));
    }

    #[test]
    fn local_descriptor_requires_exactly_one() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            local_descriptor(temp.path()),
            Err(CoupError::NoCabalFile(_))
        ));

        std::fs::write(temp.path().join("app.cabal"), "").unwrap();
        assert_eq!(local_descriptor(temp.path()).unwrap(), "app");

        std::fs::write(temp.path().join("other.cabal"), "").unwrap();
        assert!(matches!(
            local_descriptor(temp.path()),
            Err(CoupError::MultipleCabalFiles(_))
        ));
    }
}
