//! Info command - show the project's environment and registered databases

use super::Globals;
use crate::cli::args::{InfoArgs, OutputFormat};
use crate::config::Settings;
use crate::error::CoupResult;
use console::style;
use serde_json::json;

/// Execute the info command
pub async fn info(args: InfoArgs, globals: &Globals, settings: &Settings) -> CoupResult<i32> {
    let project = super::open_project(globals, settings).await?;

    match args.format {
        OutputFormat::Table => {
            println!("{} {}", style("Project:").bold(), project.name());
            println!(
                "{} {}",
                style("Declaration:").bold(),
                project.declaration_path().display()
            );
            println!("{} {}", style("Compiler:").bold(), project.ghc_version());
            println!(
                "{} {}",
                style("Environment:").bold(),
                project.env().dir().display()
            );
            println!(
                "{} {}",
                style("Packages declared:").bold(),
                project.package_list().len()
            );
            println!(
                "{} {}",
                style("Registered databases:").bold(),
                project.registered_dbs().len()
            );
            for db in project.registered_dbs() {
                println!("  {}", db.display());
            }
        }
        OutputFormat::Json => {
            let value = json!({
                "name": project.name(),
                "declaration": project.declaration_path(),
                "ghc_version": project.ghc_version(),
                "environment": project.env().dir(),
                "packages": project.package_list(),
                "registered_databases": project.registered_dbs(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            for db in project.registered_dbs() {
                println!("{}", db.display());
            }
        }
    }

    Ok(0)
}
