use anyhow::Result;
use clap::Parser;

use press_import::cli::commands::{history, import, machines, merge, show};
use press_import::cli::{Cli, Commands, default_log_filter};
use press_import::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(cli.verbose)),
    )
    .format_timestamp(None)
    .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import(args) => import::handle_import_command(args, &config).await,
        Commands::Show(args) => show::handle_show_command(args, &config).await,
        Commands::MergeDuplicates(args) => merge::handle_merge_command(args, &config).await,
        Commands::Machines(args) => machines::handle_machines_command(args, &config).await,
        Commands::History(args) => history::handle_history_command(args, &config).await,
    }
}
