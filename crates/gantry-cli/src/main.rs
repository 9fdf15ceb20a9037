//! Gantry CLI entrypoint.

use clap::Parser;

mod commands;
mod handlers;
mod sink;

use commands::Commands;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about = "Gantry pipeline runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => handlers::init()?,
        Commands::Validate { path } => handlers::validate(path.as_deref())?,
        Commands::Jobs { path } => handlers::jobs(path.as_deref())?,
        Commands::Run(args) => {
            let success = handlers::run(args).await?;
            if !success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
