mod cli;
mod commands;
mod config;
mod host;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Commands;
use crate::commands::App;
use crate::config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(Config::get_config_path);

    let exit_code = match cli.command {
        Commands::Config { command } => {
            commands::handle_config_command(command, &config_path).await?;
            None
        }
        command => {
            let app = App::build(Config::load(&config_path).await?).await?;
            match command {
                Commands::Run => commands::handle_run_command(&app).await?,
                Commands::Sweep { kind } => commands::handle_sweep_command(&app, kind).await?,
                Commands::Register {
                    repository,
                    category,
                    force,
                } => {
                    commands::handle_register_command(&app, &repository, category, force).await?;
                    None
                }
                Commands::List { installed } => {
                    commands::handle_list_command(&app, installed).await?;
                    None
                }
                Commands::Critical { command } => {
                    commands::handle_critical_command(&app, command).await?;
                    None
                }
                Commands::RateLimit => {
                    commands::handle_rate_limit_command(&app).await?;
                    None
                }
                Commands::Config { .. } => None,
            }
        }
    };

    if let Some(code) = exit_code {
        std::process::exit(code);
    }
    Ok(())
}
