use clap::{Parser, Subcommand};
use relaygateapp::model::{AccessControl, LogCategory};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "relaygate",
    bin_name = "relaygate",
    version,
    disable_help_subcommand = true,
    after_help = "Commands that talk to a relay print the SMS to send; relaygate never sends it."
)]
#[command(about = "Manage SMS-controlled GSM relay gate openers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (defaults to RELAYGATE_DATA or the OS data dir)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Emit diagnostics as JSON lines
    #[arg(long, global = true, help_heading = "Options")]
    pub log_json: bool,

    /// Verbose diagnostics
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage relay devices
    #[command(alias = "d", display_order = 1)]
    Device {
        #[command(subcommand)]
        action: Option<DeviceCommands>,
    },

    /// Manage users
    #[command(alias = "u", display_order = 2)]
    User {
        #[command(subcommand)]
        action: Option<UserCommands>,
    },

    /// Open the gate
    #[command(display_order = 3)]
    Open {
        /// Device (defaults to the active device)
        #[arg(long, short = 'd')]
        device: Option<String>,
    },

    /// Close the gate
    #[command(display_order = 4)]
    Close {
        /// Device (defaults to the active device)
        #[arg(long, short = 'd')]
        device: Option<String>,
    },

    /// Ask the relay for its status
    #[command(display_order = 5)]
    Status {
        /// Device (defaults to the active device)
        #[arg(long, short = 'd')]
        device: Option<String>,
    },

    /// Show or clear activity logs
    #[command(alias = "log", display_order = 6)]
    Logs {
        #[command(subcommand)]
        action: Option<LogCommands>,
    },

    /// Show or change global settings
    #[command(display_order = 7)]
    Settings {
        #[command(subcommand)]
        action: Option<SettingsCommands>,
    },

    /// Write a backup of all stored data
    #[command(display_order = 20)]
    Backup {
        /// Destination directory (defaults to the configured backup dir)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Restore from a backup file, merging with existing data
    #[command(display_order = 21)]
    Restore {
        /// Backup file, or `-` to read stdin
        path: String,
    },

    /// Remove all stored data
    #[command(display_order = 22)]
    Reset {
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show or change configuration
    #[command(display_order = 30)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// Add a device
    Add {
        name: String,
        /// Phone number of the relay's SIM
        unit_number: String,
        /// Relay password (defaults to the configured default)
        #[arg(long, short = 'p')]
        password: Option<String>,
    },

    /// List devices
    #[command(alias = "ls")]
    List,

    /// Update a device
    Update {
        /// Device (defaults to the active device)
        device: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        unit_number: Option<String>,
        #[arg(long, short = 'p')]
        password: Option<String>,
    },

    /// Delete a device and its logs
    #[command(alias = "rm")]
    Delete { device: String },

    /// Make a device the active one
    Use { device: String },

    /// Change relay settings and print the SMS to apply them
    Relay {
        /// Device (defaults to the active device)
        #[arg(long, short = 'd')]
        device: Option<String>,
        /// Who may open the gate by calling (authorized-only, allow-all)
        #[arg(long)]
        access: Option<AccessControl>,
        /// Seconds the relay stays closed (000 = toggle)
        #[arg(long)]
        latch: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Add a user
    Add {
        name: String,
        phone: String,
        /// Default relay position (001-200)
        #[arg(long, short = 's', default_value = "")]
        serial: String,
        /// Access window start (YYMMDDHHMM)
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Access window end (YYMMDDHHMM)
        #[arg(long, requires = "start")]
        end: Option<String>,
    },

    /// List users, optionally only those on one device
    #[command(alias = "ls")]
    List {
        #[arg(long, short = 'd')]
        device: Option<String>,
    },

    /// Update a user
    Update {
        user: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, short = 's')]
        serial: Option<String>,
        #[arg(long, conflicts_with = "clear_window")]
        start: Option<String>,
        #[arg(long, conflicts_with = "clear_window")]
        end: Option<String>,
        /// Remove the access window
        #[arg(long)]
        clear_window: bool,
    },

    /// Delete a user from every device
    #[command(alias = "rm")]
    Delete { user: String },

    /// Authorize a user on a device and print the SMS
    #[command(alias = "auth")]
    Authorize {
        user: String,
        #[arg(long, short = 'd')]
        device: Option<String>,
        /// Relay position (defaults to the user's, or the next free one)
        #[arg(long, short = 's')]
        serial: Option<String>,
    },

    /// Remove a user from a device and print the SMS
    #[command(alias = "deauth")]
    Deauthorize {
        user: String,
        #[arg(long, short = 'd')]
        device: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// List log entries, newest first
    #[command(alias = "ls")]
    List {
        /// Device, or `system`
        #[arg(long, short = 'd')]
        device: Option<String>,
        /// relay, settings, user or system
        #[arg(long, short = 'c', value_parser = parse_category)]
        category: Option<LogCategory>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        /// Only failed commands
        #[arg(long)]
        failures: bool,
    },

    /// Clear a device's log (or `system`)
    Clear { device: String },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show settings
    Show,

    /// Set the admin phone number
    Admin { number: String },

    /// Mark a setup step as completed
    Complete { step: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a sample relaygate.toml
    Gen {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print one configuration value
    Get { key: String },

    /// Persist a configuration value
    Set { key: String, value: String },
}

fn parse_category(s: &str) -> Result<LogCategory, String> {
    match s.to_ascii_lowercase().as_str() {
        "relay" => Ok(LogCategory::Relay),
        "settings" => Ok(LogCategory::Settings),
        "user" => Ok(LogCategory::User),
        "system" => Ok(LogCategory::System),
        other => Err(format!("unknown category: {}", other)),
    }
}
