//! CLI command implementations

mod cabal;
mod exec;
mod info;
mod install;

pub use cabal::cabal;
pub use exec::{exec, pkg};
pub use info::info;
pub use install::install;

use crate::config::Settings;
use crate::error::CoupResult;
use crate::project::{OpenOptions, Project};
use crate::toolchain::GhcToolchain;
use std::path::PathBuf;
use std::sync::Arc;

/// Global flags shared by every command
#[derive(Debug, Clone)]
pub struct Globals {
    pub declaration: Option<PathBuf>,
    pub profiling: bool,
    pub user_dir: Option<PathBuf>,
}

/// Open the project the global flags select
pub(crate) async fn open_project(globals: &Globals, settings: &Settings) -> CoupResult<Project> {
    let cache_root = globals
        .user_dir
        .clone()
        .unwrap_or_else(|| settings.cache_root());
    let toolchain = Arc::new(GhcToolchain::new(&settings.toolchain));

    Project::open(
        toolchain,
        OpenOptions {
            declaration: globals.declaration.clone(),
            profiling: globals.profiling,
            cache_root,
            version: settings.toolchain.version.clone(),
        },
    )
    .await
}
