//! Pagesmith CLI - Command line interface for pagesmith
//!
//! Publishes a directory of build output to a git branch such as `gh-pages`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagesmith_core::{CliOverrides, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::DeployArgs;

/// Pagesmith: publish build artifacts to a pages branch
#[derive(Parser, Debug)]
#[command(name = "pagesmith")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default search path
    #[arg(short, long, global = true, env = "PAGESMITH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Publish a build directory
    #[command(visible_alias = "d")]
    Deploy(DeployArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("pagesmith {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Deploy(args)) => {
            args.execute(cli.verbose, cli.config.as_deref()).await?;
        }
        Some(Commands::Config) => {
            let config =
                Config::load_with_overrides(cli.config.as_deref(), CliOverrides::default())?;

            println!("Pagesmith Configuration");
            println!("=======================");
            println!();
            println!("Deploy Settings:");
            println!(
                "  remote_url: {}",
                config.deploy.remote_url.as_deref().unwrap_or("(current repository)")
            );
            println!("  origin: {}", config.deploy.origin);
            println!("  branch: {}", config.deploy.branch);
            match &config.deploy.cache_dir {
                Some(dir) => println!("  cache_dir: {}", dir.display()),
                None => println!("  cache_dir: (temporary)"),
            }
            println!("  push: {}", config.deploy.push);
            println!("  message: {}", config.deploy.message);
            println!("  force: {}", config.deploy.force);
            println!();
            println!("Author:");
            match config.author.to_author() {
                Some(author) => println!("  {} <{}>", author.name, author.email),
                None => println!("  (from git config)"),
            }
            println!();

            let path = cli.config.clone().or_else(Config::find_config_file);
            match path {
                Some(path) => println!("Config file: {}", path.display()),
                None => {
                    if let Some(path) = Config::default_config_path() {
                        println!("Config file: {}", path.display());
                        println!("  (not found - using defaults)");
                    }
                }
            }
        }
        None => {
            println!("Pagesmith - publish build artifacts to a pages branch");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
