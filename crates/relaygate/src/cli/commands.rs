//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr, stdin)
//! - Handles argument parsing
//! - Formats output for human consumption
//!
//! ## Flow
//!
//! 1. Parse arguments.
//! 2. Resolve the data directory and load config (needed before tracing so
//!    `log_json` can come from the file).
//! 3. `config` subcommands are handled by clapfig directly, without opening
//!    the store.
//! 4. Everything else builds the context, dispatches to the API and renders
//!    the returned `CmdResult`.

use super::render::{render, render_json, View};
use super::setup::{
    parse_cli, Cli, Commands, ConfigCommands, DeviceCommands, LogCommands, SettingsCommands,
    UserCommands,
};
use anyhow::{bail, Context};
use clapfig::{Clapfig, ConfigAction, SearchPath};
use relaygateapp::api::{CmdMessage, CmdResult, LogFilter, RelayGateApi};
use relaygateapp::config::RelayGateConfig;
use relaygateapp::init::{self, initialize, CONFIG_FILE_NAME};
use relaygateapp::model::{DeviceUpdate, NewDevice, NewUser, UserUpdate};
use relaygateapp::sms::RelayCommand;
use relaygateapp::store::fs_backend::FsBackend;
use relaygateapp::store::InitOutcome;
use relaygateapp::tracing_init::{default_filter, init_tracing};
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub async fn run() -> anyhow::Result<()> {
    let cli = parse_cli();

    let data_dir = init::data_dir(cli.data.clone());
    let config = init::load_config(&data_dir);
    init_tracing(default_filter(cli.verbose), cli.log_json || config.log_json);

    if let Some(Commands::Config { action }) = &cli.command {
        return handle_config_command(action.as_ref(), &data_dir);
    }

    debug!(data_dir = %data_dir.display(), "opening store");
    let ctx = initialize(Some(data_dir)).await;
    let mut notices = Vec::new();
    match &ctx.init_outcome {
        InitOutcome::Unreadable(reason) => notices.push(CmdMessage::warning(format!(
            "Stored data could not be read ({}); starting empty. Restore a backup to recover.",
            reason
        ))),
        InitOutcome::Migrated(report) => notices.push(CmdMessage::info(format!(
            "Imported data from an older version: {} device(s), {} user(s), {} log entries",
            report.devices, report.users, report.logs
        ))),
        _ => {}
    }

    let (mut result, view) = dispatch(&cli, &ctx.api).await?;
    // Flush before exit so a pending write is not lost with the runtime.
    ctx.api.store().flush().await;

    notices.append(&mut result.messages);
    result.messages = notices;

    if cli.json {
        println!("{}", render_json(&result)?);
    } else {
        print!("{}", render(&result, view));
    }
    Ok(())
}

async fn dispatch(cli: &Cli, api: &RelayGateApi<FsBackend>) -> anyhow::Result<(CmdResult, View)> {
    let Some(command) = &cli.command else {
        // Naked `relaygate`: show devices.
        return Ok((api.list_devices()?, View::Devices));
    };

    let outcome = match command {
        Commands::Device { action } => match action {
            None | Some(DeviceCommands::List) => (api.list_devices()?, View::Devices),
            Some(DeviceCommands::Add {
                name,
                unit_number,
                password,
            }) => {
                let mut fields = NewDevice::new(name.clone(), unit_number.clone());
                fields.password = password.clone();
                (api.add_device(fields).await?, View::Plain)
            }
            Some(DeviceCommands::Update {
                device,
                name,
                unit_number,
                password,
            }) => {
                let update = DeviceUpdate {
                    name: name.clone(),
                    unit_number: unit_number.clone(),
                    password: password.clone(),
                    ..Default::default()
                };
                (api.update_device(device.as_deref(), update).await?, View::Plain)
            }
            Some(DeviceCommands::Delete { device }) => (api.delete_device(device).await?, View::Plain),
            Some(DeviceCommands::Use { device }) => (api.activate_device(device).await?, View::Plain),
            Some(DeviceCommands::Relay {
                device,
                access,
                latch,
            }) => (
                api.configure_relay(device.as_deref(), *access, latch.clone())
                    .await?,
                View::Plain,
            ),
        },

        Commands::User { action } => match action {
            None => (api.list_users(None)?, View::Users),
            Some(UserCommands::List { device }) => (api.list_users(device.as_deref())?, View::Users),
            Some(UserCommands::Add {
                name,
                phone,
                serial,
                start,
                end,
            }) => {
                let mut fields = NewUser::new(name.clone(), phone.clone(), serial.clone());
                fields.start_time = start.clone();
                fields.end_time = end.clone();
                (api.add_user(fields).await?, View::Plain)
            }
            Some(UserCommands::Update {
                user,
                name,
                phone,
                serial,
                start,
                end,
                clear_window,
            }) => {
                let (start_time, end_time) = if *clear_window {
                    (Some(None), Some(None))
                } else {
                    (start.clone().map(Some), end.clone().map(Some))
                };
                let update = UserUpdate {
                    name: name.clone(),
                    phone_number: phone.clone(),
                    serial_number: serial.clone(),
                    start_time,
                    end_time,
                };
                (api.update_user(user, update).await?, View::Plain)
            }
            Some(UserCommands::Delete { user }) => (api.delete_user(user).await?, View::Plain),
            Some(UserCommands::Authorize {
                user,
                device,
                serial,
            }) => (
                api.authorize_user(device.as_deref(), user, serial.clone())
                    .await?,
                View::Plain,
            ),
            Some(UserCommands::Deauthorize { user, device }) => (
                api.deauthorize_user(device.as_deref(), user).await?,
                View::Plain,
            ),
        },

        Commands::Open { device } => (
            api.send_command(device.as_deref(), RelayCommand::Open).await?,
            View::Plain,
        ),
        Commands::Close { device } => (
            api.send_command(device.as_deref(), RelayCommand::Close).await?,
            View::Plain,
        ),
        Commands::Status { device } => (
            api.send_command(device.as_deref(), RelayCommand::Status)
                .await?,
            View::Plain,
        ),

        Commands::Logs { action } => match action {
            None => (api.list_logs(LogFilter::default())?, View::Logs),
            Some(LogCommands::List {
                device,
                category,
                limit,
                failures,
            }) => {
                let filter = LogFilter {
                    device: device.clone(),
                    category: *category,
                    limit: *limit,
                    failures_only: *failures,
                };
                (api.list_logs(filter)?, View::Logs)
            }
            Some(LogCommands::Clear { device }) => (api.clear_logs(device).await?, View::Plain),
        },

        Commands::Settings { action } => match action {
            None | Some(SettingsCommands::Show) => (api.settings()?, View::Settings),
            Some(SettingsCommands::Admin { number }) => {
                (api.set_admin_number(number).await?, View::Plain)
            }
            Some(SettingsCommands::Complete { step }) => {
                (api.complete_step(step).await?, View::Plain)
            }
        },

        Commands::Backup { dir } => (api.export_backup(dir.as_deref()).await?, View::Plain),
        Commands::Restore { path } => {
            let result = if path == "-" {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("reading backup from stdin")?;
                api.import_backup_text(&text).await?
            } else {
                api.import_backup(Path::new(path)).await?
            };
            (result, View::Plain)
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to remove all data without --yes");
            }
            (api.reset().await?, View::Plain)
        }

        Commands::Config { .. } => bail!("config is handled before the store is opened"),
    };
    Ok(outcome)
}

/// Handle `relaygate config` using clapfig directly.
fn handle_config_command(action: Option<&ConfigCommands>, data_dir: &Path) -> anyhow::Result<()> {
    let paths = vec![SearchPath::Path(data_dir.to_path_buf())];
    match action {
        None => {
            // Bare `relaygate config`: show all resolved values
            let config: RelayGateConfig = Clapfig::builder()
                .app_name("relaygate")
                .file_name(CONFIG_FILE_NAME)
                .search_paths(paths)
                .no_env()
                .strict(false)
                .load()
                .unwrap_or_default();

            let table = toml::Value::try_from(&config)?;
            if let toml::Value::Table(t) = table {
                for (k, v) in &t {
                    println!("{} = {}", k, format_toml_value(v));
                }
            }
            Ok(())
        }
        Some(ConfigCommands::Gen { output }) => {
            let action = ConfigAction::Gen {
                output: output.clone(),
            };
            print!("{}", handle_config_action(paths, &action)?);
            Ok(())
        }
        Some(ConfigCommands::Get { key }) => {
            let action = ConfigAction::Get {
                key: key.clone(),
                scope: None,
            };
            println!("{}", handle_config_action(paths, &action)?);
            Ok(())
        }
        Some(ConfigCommands::Set { key, value }) => {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("creating {}", data_dir.display()))?;
            let action = ConfigAction::Set {
                key: key.clone(),
                value: value.clone(),
                scope: None,
            };
            println!("{}", handle_config_action(paths, &action)?);
            Ok(())
        }
    }
}

fn handle_config_action(paths: Vec<SearchPath>, action: &ConfigAction) -> anyhow::Result<String> {
    let result = Clapfig::builder::<RelayGateConfig>()
        .app_name("relaygate")
        .file_name(CONFIG_FILE_NAME)
        .search_paths(paths)
        .no_env()
        .strict(false)
        .handle(action)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(result.to_string())
}

/// Format a TOML value for display.
fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => format!("\"{}\"", s),
        toml::Value::Array(a) => toml::to_string(a).unwrap_or_else(|_| format!("{a:?}")),
        other => other.to_string(),
    }
}
