pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "leadflow",
    about = "Leadflow operator CLI",
    long_about = "Distribute lead batches across advisors, inspect configuration, and run readiness checks.",
    after_help = "Examples:\n  leadflow distribute leads.csv\n  leadflow distribute leads.csv --apply --output result.csv\n  leadflow doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Distribute a CSV batch of leads across active advisors")]
    Distribute {
        #[arg(help = "Input CSV batch of candidate leads")]
        input: PathBuf,
        #[arg(long, help = "Create the leads in the CRM for real (default is a simulation)")]
        apply: bool,
        #[arg(long, default_value = "output.csv", help = "Path for the outcome table")]
        output: PathBuf,
    },
    #[command(about = "Talk to the course assistant prototype on stdin/stdout")]
    Chat,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, CRM credential presence, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Distribute { input, apply, output } => {
            commands::distribute::run(commands::distribute::DistributeArgs {
                input,
                apply,
                output,
            })
        }
        Command::Chat => commands::chat::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
