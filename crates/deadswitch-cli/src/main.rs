use clap::{Parser, Subcommand};
use deadswitch_core::Config;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "deadswitch", version, about = "Dead man's switch CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current switch status as JSON
    Status(commands::status::StatusArgs),
    /// Check in now and reset the deadline
    CheckIn,
    /// Protocol length management
    Protocol {
        #[command(subcommand)]
        action: commands::protocol::ProtocolAction,
    },
    /// Keep the switch evaluated and print every published status
    Watch(commands::watch::WatchArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    logging::init(&config.logging);

    let result = match cli.command {
        Commands::Status(args) => commands::status::run(args, &config),
        Commands::CheckIn => commands::check_in::run(&config),
        Commands::Protocol { action } => commands::protocol::run(action, &config),
        Commands::Watch(args) => commands::watch::run(args, &config),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
