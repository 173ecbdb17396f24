pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use approvly_core::config::{ConfigOverrides, LoadOptions};
use clap::{Parser, Subcommand};

use commands::analytics::AnalyticsArgs;
use commands::auth::{LoginArgs, RegisterArgs};
use commands::policies::PoliciesCommand;
use commands::requests::RequestsCommand;
use commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "approvly",
    about = "Approvly approval request client",
    long_about = "Submit, review and decide leave, expense and discount requests, manage approval policies, and inspect analytics.",
    after_help = "Examples:\n  approvly login --username ana --password ********\n  approvly requests list --mine --status PENDING\n  approvly requests act 42 --action APPROVED --reason \"within budget\"\n  approvly doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an approvly.toml file")]
    config: Option<PathBuf>,
    #[arg(long = "api-url", global = true, help = "Override api.base_url")]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Create an account")]
    Register(RegisterArgs),
    #[command(about = "Log in and persist the session tokens")]
    Login(LoginArgs),
    #[command(about = "Log out and clear the persisted session")]
    Logout,
    #[command(about = "Show the logged-in user")]
    Whoami,
    #[command(subcommand, about = "Submit, inspect and decide approval requests")]
    Requests(RequestsCommand),
    #[command(about = "Status counts and recent activity for your own requests")]
    Dashboard,
    #[command(subcommand, about = "Manage approval policies (admin only)")]
    Policies(PoliciesCommand),
    #[command(about = "Server-computed request analytics with distributions")]
    Analytics(AnalyticsArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, the persisted session, and API reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                api_base_url: self.api_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn execute(cli: Cli) -> CommandResult {
    let options = cli.load_options();

    match cli.command {
        Command::Register(args) => commands::auth::register(options, args),
        Command::Login(args) => commands::auth::login(options, args),
        Command::Logout => commands::auth::logout(options),
        Command::Whoami => commands::auth::whoami(options),
        Command::Requests(command) => commands::requests::run(options, command),
        Command::Dashboard => commands::requests::dashboard(options),
        Command::Policies(command) => commands::policies::run(options, command),
        Command::Analytics(args) => commands::analytics::run(options, args),
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
