//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// coup - project-scoped package isolation for the Haskell toolchain
///
/// Installs every (package, dependency-set) pair into its own
/// content-addressed database and shares those databases between projects.
#[derive(Parser, Debug)]
#[command(name = "coup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Project declaration file (default: nearest *.hackage up the tree)
    #[arg(short = 'p', long, global = true)]
    pub project: Option<PathBuf>,

    /// Build libraries and executables with profiling
    #[arg(short = 'P', long, global = true)]
    pub profiling: bool,

    /// Cache root directory
    #[arg(long, global = true, env = "COUP_USER_DIR")]
    pub user_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true, env = "COUP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install packages and their dependencies into the project
    Install(InstallArgs),

    /// Run `cabal configure` in the project environment
    Configure(BuildArgs),

    /// Run `cabal build` in the project environment
    Build(BuildArgs),

    /// Run `cabal clean` in the project environment
    Clean(BuildArgs),

    /// Run an arbitrary cabal command in the project environment
    Cabal(CabalArgs),

    /// Run a ghc-pkg command against the project's databases
    Pkg(PkgArgs),

    /// Run any command inside the project environment
    Exec(ExecArgs),

    /// Show the project's environment and registered databases
    Info(InfoArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Packages to install as name-version tokens
    /// (none = the package in the current directory)
    pub packages: Vec<String>,

    /// Install dependencies only, not the named packages themselves
    #[arg(long)]
    pub deps_only: bool,

    /// Install every package from the project declaration
    #[arg(long, conflicts_with = "packages")]
    pub all: bool,

    /// Extra flags passed to the resolver verbatim
    #[arg(last = true)]
    pub flags: Vec<String>,
}

/// Arguments for configure/build/clean
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Packages and flags passed through to cabal
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the cabal passthrough command
#[derive(Parser, Debug)]
pub struct CabalArgs {
    /// cabal subcommand to run
    pub cmd: String,

    /// Packages and flags passed through to cabal
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the ghc-pkg passthrough command
#[derive(Parser, Debug)]
pub struct PkgArgs {
    /// ghc-pkg subcommand and arguments (describe, unregister, list, check, ...)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the exec command
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Command and arguments to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Arguments for the info command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format for the info command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Registered database paths, one per line
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_install() {
        let cli = Cli::parse_from(["coup", "install", "text-2.0.2"]);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.packages, vec!["text-2.0.2"]);
                assert!(!args.deps_only);
                assert!(!args.all);
            }
            _ => panic!("expected Install command"),
        }
    }

    #[test]
    fn cli_parses_install_deps_only() {
        let cli = Cli::parse_from(["coup", "install", "--deps-only"]);
        match cli.command {
            Commands::Install(args) => {
                assert!(args.deps_only);
                assert!(args.packages.is_empty());
            }
            _ => panic!("expected Install command"),
        }
    }

    #[test]
    fn cli_parses_install_extra_flags() {
        let cli = Cli::parse_from(["coup", "install", "text-2.0.2", "--", "--reinstall"]);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.packages, vec!["text-2.0.2"]);
                assert_eq!(args.flags, vec!["--reinstall"]);
            }
            _ => panic!("expected Install command"),
        }
    }

    #[test]
    fn cli_install_all_conflicts_with_packages() {
        assert!(Cli::try_parse_from(["coup", "install", "--all", "text-2.0.2"]).is_err());
        assert!(Cli::try_parse_from(["coup", "install", "--all"]).is_ok());
    }

    #[test]
    fn cli_parses_build_with_flags() {
        let cli = Cli::parse_from(["coup", "build", "--ghc-options=-O2", "mypkg"]);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.args, vec!["--ghc-options=-O2", "mypkg"]);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn cli_parses_cabal_passthrough() {
        let cli = Cli::parse_from(["coup", "cabal", "haddock", "--internal"]);
        match cli.command {
            Commands::Cabal(args) => {
                assert_eq!(args.cmd, "haddock");
                assert_eq!(args.args, vec!["--internal"]);
            }
            _ => panic!("expected Cabal command"),
        }
    }

    #[test]
    fn cli_parses_pkg() {
        let cli = Cli::parse_from(["coup", "pkg", "list"]);
        match cli.command {
            Commands::Pkg(args) => assert_eq!(args.args, vec!["list"]),
            _ => panic!("expected Pkg command"),
        }
    }

    #[test]
    fn cli_pkg_requires_arguments() {
        assert!(Cli::try_parse_from(["coup", "pkg"]).is_err());
    }

    #[test]
    fn cli_parses_exec() {
        let cli = Cli::parse_from(["coup", "exec", "ghci", "-Wall"]);
        match cli.command {
            Commands::Exec(args) => assert_eq!(args.command, vec!["ghci", "-Wall"]),
            _ => panic!("expected Exec command"),
        }
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from([
            "coup",
            "-P",
            "-p",
            "custom.hackage",
            "-vv",
            "install",
            "--all",
        ]);
        assert!(cli.profiling);
        assert_eq!(cli.project, Some(PathBuf::from("custom.hackage")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_parses_info_format() {
        let cli = Cli::parse_from(["coup", "info", "--format", "json"]);
        match cli.command {
            Commands::Info(args) => assert!(matches!(args.format, OutputFormat::Json)),
            _ => panic!("expected Info command"),
        }
    }
}
