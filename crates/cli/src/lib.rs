pub mod commands;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

use commands::search::SearchArgs;

#[derive(Debug, Parser)]
#[command(
    name = "flightdesk",
    about = "Flightdesk operator CLI",
    long_about = "Run flight searches through the fulfillment pipeline, list supported cities, inspect configuration, and check readiness.",
    after_help = "Examples:\n  flightdesk search --from Miami --to Dubai --depart 2024-06-01 --return 2024-06-10\n  flightdesk airports\n  flightdesk doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Search flights and print the reply the conversational agent would get")]
    Search(SearchCommand),
    #[command(about = "List the cities the webhook can resolve to airport codes")]
    Airports {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, secret backend reachability, and mail credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct SearchCommand {
    #[arg(long, help = "Departure city, exactly as listed by `flightdesk airports`")]
    from: String,
    #[arg(long, help = "Destination city, exactly as listed by `flightdesk airports`")]
    to: String,
    #[arg(long, help = "Outbound date (YYYY-MM-DD)")]
    depart: String,
    #[arg(long = "return", help = "Return date (YYYY-MM-DD), required unless --one-way")]
    return_date: Option<String>,
    #[arg(long, help = "Search one-way instead of round trip")]
    one_way: bool,
    #[arg(long, help = "Budget in USD to compare the cheapest option against")]
    budget: Option<Decimal>,
    #[arg(long, help = "Also email the results to this address (requires mail.enabled)")]
    email: Option<String>,
    #[arg(long, help = "Emit machine-readable JSON output")]
    json: bool,
}

impl From<SearchCommand> for SearchArgs {
    fn from(command: SearchCommand) -> Self {
        Self {
            from: command.from,
            to: command.to,
            depart: command.depart,
            return_date: command.return_date,
            one_way: command.one_way,
            budget: command.budget,
            email: command.email,
            json: command.json,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Search(command) => commands::search::run(command.into()),
        Command::Airports { json } => commands::airports::run(json),
        Command::Config => commands::CommandResult::text(0, commands::config::run()),
        Command::Doctor { json } => commands::CommandResult::text(0, commands::doctor::run(json)),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
