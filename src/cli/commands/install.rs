//! Install command - resolve a plan and walk it

use super::Globals;
use crate::cli::args::InstallArgs;
use crate::config::Settings;
use crate::error::CoupResult;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Execute the install command
pub async fn install(args: InstallArgs, globals: &Globals, settings: &Settings) -> CoupResult<i32> {
    let mut project = super::open_project(globals, settings).await?;

    let requested: Vec<String> = if args.all {
        project.package_list().to_vec()
    } else {
        args.packages.clone()
    };
    debug!(
        "Installing {} (deps_only: {})",
        if requested.is_empty() {
            "local directory target".to_string()
        } else {
            requested.join(", ")
        },
        args.deps_only
    );

    let pb = create_progress_bar("Resolving install plan...");
    let resolved = project.resolve_plan(&requested, &args.flags).await;
    pb.finish_and_clear();
    let plan = resolved?;

    if plan.is_empty() {
        println!("{} Nothing to install", style("✓").green());
        return Ok(0);
    }

    let summary = project.apply_plan(&plan, &requested, args.deps_only).await?;
    println!(
        "{} {} installed, {} registered, {} skipped",
        style("✓").green(),
        summary.installed,
        summary.registered,
        summary.skipped
    );

    Ok(0)
}

fn create_progress_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
