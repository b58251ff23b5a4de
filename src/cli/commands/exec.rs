//! Passthrough commands running inside the project environment

use super::Globals;
use crate::config::Settings;
use crate::error::CoupResult;

/// Run an arbitrary command with the project's database search path
pub async fn exec(command: &[String], globals: &Globals, settings: &Settings) -> CoupResult<i32> {
    let project = super::open_project(globals, settings).await?;
    project.exec(command).await
}

/// Run a ghc-pkg command against the project's databases
pub async fn pkg(args: &[String], globals: &Globals, settings: &Settings) -> CoupResult<i32> {
    let project = super::open_project(globals, settings).await?;
    project.run_pkg_command(args).await
}
