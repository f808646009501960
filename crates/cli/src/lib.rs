pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ordermate",
    about = "Ordermate operator CLI",
    long_about = "Operate the ordermate database: migrations, demo data, config inspection, and session cleanup.",
    after_help = "Examples:\n  ordermate migrate\n  ordermate seed\n  ordermate config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the demo tenant and its menu")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Remove sessions idle for longer than the configured TTL")]
    Sweep,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Sweep => commands::sweep::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
