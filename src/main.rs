//! Squadforge CLI entry point.

use clap::Parser;

use squadforge::cli::{commands, handle_error, Cli, Commands};
use squadforge::infrastructure::config::ConfigLoader;
use squadforge::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging follows the project config; a broken config is reported by the command itself
    let log_config = ConfigLoader::load()
        .map(|config| LogConfig::from(&config.logging))
        .unwrap_or_default();
    let _logger = LoggerImpl::init(&log_config).ok();

    let actor = cli.actor.as_deref();
    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Squad(args) => commands::squad::execute(args, cli.json).await,
        Commands::Member(args) => commands::member::execute(args, cli.json).await,
        Commands::Building(args) => commands::building::execute(args, actor, cli.json).await,
        Commands::Task(args) => commands::task::execute(args, actor, cli.json).await,
        Commands::Report(args) => commands::report::execute(args, actor, cli.json).await,
        Commands::Sprint(args) => commands::sprint::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
