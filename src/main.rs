use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod auth;
mod booking;
mod calendar;
mod claims;
mod cli;
mod client;
mod config;
mod context;
mod desktop;
mod error;
mod notify;
mod reminder;
mod scheduler;
mod session;
mod storage;
mod ui;
mod utils;

#[cfg(test)]
mod tests;

use cli::CliHandler;
use notify::NotificationPermission;
use reminder::LeadTime;

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "roombook",
    about = "Room booking console",
    long_about = "Roombook - Room reservations from the terminal

OVERVIEW:
  Browse rooms, book them and get reminded before your reservations start.
  Reminders are kept on this machine and delivered by 'roombook watch'.

QUICK START:
  roombook config set-endpoint <URL>    # Point the console at the booking server
  roombook login <USERNAME>             # Authenticate
  roombook rooms list                   # See what can be booked
  roombook reserve --room 3 --date 2026-03-02 --start 10:00 --end 11:00 ...
  roombook remind add <RESERVATION_ID>  # Reminder 15 minutes before it starts
  roombook watch                        # Deliver reminders until Ctrl+C",
    version = CURRENT_VERSION,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with username and password
    Login(CredentialsArgs),

    /// Create an account and log in
    Register(CredentialsArgs),

    /// Forget the stored session
    Logout,

    /// Show session, dashboard and reminder status
    #[command(aliases = &["st"])]
    Status,

    /// Browse or manage rooms
    Rooms(RoomsArgs),

    /// Reserve a room
    Reserve(ReserveArgs),

    /// List reservations
    #[command(aliases = &["ls"])]
    Reservations(ReservationsArgs),

    /// Manage local reservation reminders
    Remind(RemindArgs),

    /// Deliver due reminders until interrupted
    Watch,

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct CredentialsArgs {
    pub username: String,

    /// Prompted for when omitted
    #[arg(short, long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct RoomsArgs {
    #[command(subcommand)]
    pub command: RoomsCommand,
}

#[derive(Subcommand)]
pub enum RoomsCommand {
    List,
    Create {
        name: String,
    },
    Rename {
        id: String,
        name: String,
    },
    #[command(aliases = &["rm"])]
    Delete {
        id: String,

        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct ReserveArgs {
    /// Room id
    #[arg(long)]
    pub room: String,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: String,

    /// HH:MM
    #[arg(long)]
    pub start: String,

    /// HH:MM
    #[arg(long)]
    pub end: String,

    /// DNI of the person in charge
    #[arg(long)]
    pub dni: String,

    #[arg(long)]
    pub first_names: String,

    #[arg(long)]
    pub last_names: String,

    #[arg(long)]
    pub attendees: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct ReservationsArgs {
    /// Only this day (administrators)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args)]
pub struct RemindArgs {
    #[command(subcommand)]
    pub command: RemindCommand,
}

#[derive(Subcommand)]
pub enum RemindCommand {
    /// Remind before a reservation starts
    Add {
        reservation_id: String,

        /// 5, 15, 30 or 60
        #[arg(short, long, default_value = "15", value_parser = parse_lead_time)]
        minutes: LeadTime,
    },
    /// Cancel by reminder id or reservation id
    Cancel { id: String },
    List,
}

fn parse_lead_time(value: &str) -> Result<LeadTime, String> {
    let minutes: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of minutes", value))?;
    LeadTime::try_from(minutes)
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    /// Seconds between reminder scans
    SetInterval { seconds: u64 },
    SetTimeout { seconds: u64 },
    SetPermission {
        #[arg(value_enum)]
        permission: NotificationPermission,
    },
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(format!("roombook={}", log_level))
        .with_writer(std::io::stderr);
    subscriber.init();

    let mut handler = CliHandler::with_config_path(cli.config);

    if let Err(e) = handler.execute(cli.command).await {
        let ui = ui::UI::new();
        ui.error(&format!("Error [{}]: {}", e.code(), e.user_message()));
        if e.is_auth_error() {
            ui.info("Run 'roombook login' to sign in again");
        } else if e.is_network_error() {
            ui.info("Check the server address with 'roombook config show'");
        }
        std::process::exit(1);
    }
}
