//! Cabal passthrough commands (configure, build, clean, raw cabal)

use super::Globals;
use crate::config::Settings;
use crate::error::CoupResult;

/// Run a cabal subcommand in the project environment. Arguments are split
/// the way the toolchain expects them: leading-dash tokens are flags,
/// everything else names packages.
pub async fn cabal(
    cmd: &str,
    args: &[String],
    globals: &Globals,
    settings: &Settings,
) -> CoupResult<i32> {
    let project = super::open_project(globals, settings).await?;

    let (flags, pkgs): (Vec<String>, Vec<String>) =
        args.iter().cloned().partition(|a| a.starts_with('-'));

    project.run_cabal_command(cmd, &pkgs, &flags).await
}
