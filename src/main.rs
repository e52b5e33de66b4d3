//! oauth-callback - OAuth authorization-code callback server
//!
#![doc = "Main entry point for the OAuth callback server."]

use anyhow::Result;

use oauth_callback::cli::{Cli, Commands};
use oauth_callback::config::Config;
use oauth_callback::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    logging::init_logging(cli.verbose, cli.json_logs)?;

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    match cli.command {
        Commands::Serve { .. } => {
            config.validate()?;
            tracing::info!("Starting OAuth callback server");
            server::serve(&config).await?;
            Ok(())
        }
        Commands::ShowConfig => {
            tracing::debug!("Printing effective configuration");
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}
