//! coup - project-scoped package isolation for the Haskell toolchain
//!
//! CLI entry point that dispatches to subcommands.

use clap::{CommandFactory, Parser};
use console::style;
use coup::cli::commands::{self, Globals};
use coup::cli::{Cli, Commands};
use coup::config::Settings;
use coup::error::CoupResult;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code.clamp(1, 255) as u8),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CoupResult<i32> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => tracing_subscriber::EnvFilter::new("coup=warn"),
        1 => tracing_subscriber::EnvFilter::new("coup=info"),
        _ => tracing_subscriber::EnvFilter::new("coup=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Completions don't need a project or a toolchain
    if let Commands::Completions(args) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(args.shell, &mut cmd, "coup", &mut std::io::stdout());
        return Ok(0);
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let globals = Globals {
        declaration: cli.project.clone(),
        profiling: cli.profiling,
        user_dir: cli.user_dir.clone(),
    };

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Install(args) => commands::install(args, &globals, &settings).await,
        Commands::Configure(args) => commands::cabal("configure", &args.args, &globals, &settings).await,
        Commands::Build(args) => commands::cabal("build", &args.args, &globals, &settings).await,
        Commands::Clean(args) => commands::cabal("clean", &args.args, &globals, &settings).await,
        Commands::Cabal(args) => commands::cabal(&args.cmd, &args.args, &globals, &settings).await,
        Commands::Pkg(args) => commands::pkg(&args.args, &globals, &settings).await,
        Commands::Exec(args) => commands::exec(&args.command, &globals, &settings).await,
        Commands::Info(args) => commands::info(args, &globals, &settings).await,
    }
}
