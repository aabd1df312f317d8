mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "leadhook", about = "Leadhook - Lead Ads webhook service", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Path to the config file
        #[arg(short, long, default_value = "config/leadhook.toml")]
        config: String,
    },
    /// Show server status
    Status {
        /// Server URL
        #[arg(short, long, default_value = "http://localhost:3200")]
        server: String,
    },
    /// List recently received leads
    Leads {
        /// Server URL
        #[arg(short, long, default_value = "http://localhost:3200")]
        server: String,
        /// Maximum number of leads to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            commands::serve::run(&config).await?;
        }
        Commands::Status { server } => {
            commands::status::run(&server).await?;
        }
        Commands::Leads { server, limit } => {
            commands::leads::list(&server, limit).await?;
        }
    }

    Ok(())
}
