mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "proxygen", about = "Serve generated Clash configs and package the service as a container image")]
#[command(version)]
struct Cli {
    /// Project directory holding proxygen.toml, the manifest, the lock file and `.env`
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service (configured through the environment and the project's .env)
    Serve,
    /// Print the container recipe
    Dockerfile,
    /// Validate the dependency manifest against the lock file
    Check,
    /// Validate inputs and assemble the build context in .proxygen-context/
    Bundle,
    /// Eject the recipe to .proxygen/Dockerfile for manual customization
    Eject,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => commands::serve(&cli.project_dir).await?,
        Commands::Dockerfile => commands::dockerfile(&cli.project_dir).await?,
        Commands::Check => commands::check(&cli.project_dir).await?,
        Commands::Bundle => commands::bundle(&cli.project_dir).await?,
        Commands::Eject => commands::eject(&cli.project_dir).await?,
    }

    Ok(())
}
