//! # Rendering
//!
//! Turns a [`CmdResult`] into terminal text. Each command picks a [`View`]
//! that decides which parts of the result are shown; messages and outgoing SMS
//! are always shown. With `--json` the whole result is printed instead.
//!
//! Renderers return strings so tests can check them without a terminal.

use super::styles;
use chrono::{DateTime, Utc};
use relaygateapp::api::{CmdMessage, CmdResult, MessageLevel, OutgoingSms};
use relaygateapp::model::{Device, GlobalSettings, LogEntry, User};
use std::fmt::Write;

pub const ACTIVE_MARKER: &str = "●";
pub const OK_MARKER: &str = "✓";
pub const FAIL_MARKER: &str = "✗";

/// What a command's output is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Devices,
    Users,
    Logs,
    Settings,
    /// Only messages and SMS.
    Plain,
}

pub fn render(result: &CmdResult, view: View) -> String {
    let mut out = String::new();
    let active = result
        .settings
        .as_ref()
        .and_then(|s| s.active_device_id.as_deref());

    match view {
        View::Devices => out.push_str(&render_devices(&result.listed_devices, active)),
        View::Users => out.push_str(&render_users(&result.listed_users)),
        View::Logs => out.push_str(&render_logs(&result.listed_logs, &result.listed_devices)),
        View::Settings => {
            if let Some(settings) = &result.settings {
                out.push_str(&render_settings(settings, &result.listed_devices));
            }
        }
        View::Plain => {}
    }

    out.push_str(&render_sms(&result.sms));
    out.push_str(&render_messages(&result.messages));
    out
}

pub fn render_json(result: &CmdResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

pub fn render_devices(devices: &[Device], active: Option<&str>) -> String {
    let mut out = String::new();
    let name_width = devices.iter().map(|d| d.name.chars().count()).max().unwrap_or(0);
    for device in devices {
        let marker = if Some(device.id.as_str()) == active {
            styles::ACTIVE.apply_to(ACTIVE_MARKER).to_string()
        } else {
            " ".to_string()
        };
        let _ = writeln!(
            out,
            "{} {:<width$}  {}  {}  {}",
            marker,
            styles::TITLE.apply_to(&device.name),
            device.unit_number,
            styles::MUTED.apply_to(format!("{} user(s)", device.authorized_users.len())),
            styles::TIME.apply_to(time_ago(device.updated_at)),
            width = name_width,
        );
        if let Some(relay) = &device.relay_settings {
            let _ = writeln!(
                out,
                "  {}",
                styles::MUTED.apply_to(format!(
                    "{}, latch {}s",
                    relay.access_control.as_str(),
                    relay.latch_time
                ))
            );
        }
    }
    out
}

pub fn render_users(users: &[User]) -> String {
    let mut out = String::new();
    let name_width = users.iter().map(|u| u.name.chars().count()).max().unwrap_or(0);
    for user in users {
        let serial = if user.serial_number.is_empty() {
            "---"
        } else {
            user.serial_number.as_str()
        };
        let _ = write!(
            out,
            "{}  {:<width$}  {}",
            styles::ACTIVE.apply_to(serial),
            styles::TITLE.apply_to(&user.name),
            user.phone_number,
            width = name_width,
        );
        if let (Some(start), Some(end)) = (&user.start_time, &user.end_time) {
            let _ = write!(out, "  {}", styles::MUTED.apply_to(format!("{} → {}", start, end)));
        }
        out.push('\n');
    }
    out
}

/// Log lines, labelled with the device name when it is known.
pub fn render_logs(logs: &[LogEntry], devices: &[Device]) -> String {
    let mut out = String::new();
    for entry in logs {
        let marker = if entry.success {
            styles::SUCCESS.apply_to(OK_MARKER)
        } else {
            styles::ERROR.apply_to(FAIL_MARKER)
        };
        let source = match entry.device_id.as_deref() {
            Some(id) => devices
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| id.to_string()),
            None => "system".to_string(),
        };
        let _ = write!(
            out,
            "{} {:>8}  {}  {}",
            marker,
            styles::TIME.apply_to(time_ago(entry.timestamp)),
            styles::MUTED.apply_to(format!("[{}]", source)),
            styles::TITLE.apply_to(&entry.action),
        );
        if !entry.details.is_empty() {
            let _ = write!(out, ": {}", entry.details);
        }
        out.push('\n');
    }
    out
}

pub fn render_settings(settings: &GlobalSettings, devices: &[Device]) -> String {
    let admin = if settings.admin_number.is_empty() {
        "(not set)"
    } else {
        settings.admin_number.as_str()
    };
    let active = settings
        .active_device_id
        .as_deref()
        .map(|id| {
            devices
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| id.to_string())
        })
        .unwrap_or_else(|| "(none)".to_string());
    let steps = if settings.completed_steps.is_empty() {
        "(none)".to_string()
    } else {
        settings.completed_steps.join(", ")
    };

    let mut out = String::new();
    let _ = writeln!(out, "{:<16}{}", "Admin number", admin);
    let _ = writeln!(out, "{:<16}{}", "Active device", active);
    let _ = writeln!(out, "{:<16}{}", "Completed steps", steps);
    out
}

pub fn render_sms(sms: &[OutgoingSms]) -> String {
    let mut out = String::new();
    for message in sms {
        let _ = writeln!(
            out,
            "{} {}: {}",
            styles::SMS.apply_to("SMS to"),
            message.to,
            styles::TITLE.apply_to(&message.body)
        );
    }
    out
}

pub fn render_messages(messages: &[CmdMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let styled = match message.level {
            MessageLevel::Info => styles::INFO.apply_to(&message.content),
            MessageLevel::Success => styles::SUCCESS.apply_to(&message.content),
            MessageLevel::Warning => styles::WARNING.apply_to(&message.content),
            MessageLevel::Error => styles::ERROR.apply_to(&message.content),
        };
        let _ = writeln!(out, "{}", styled);
    }
    out
}

fn time_ago(timestamp: DateTime<Utc>) -> String {
    let elapsed = Utc::now()
        .signed_duration_since(timestamp)
        .to_std()
        .unwrap_or_default();
    let mut formatter = timeago::Formatter::new();
    formatter.num_items(1);
    formatter.convert(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use relaygateapp::model::{Authorization, LogCategory};

    fn plain(s: String) -> String {
        console::strip_ansi_codes(&s).into_owned()
    }

    fn device(id: &str, name: &str) -> Device {
        Device {
            id: id.to_string(),
            name: name.to_string(),
            unit_number: "0400000000".to_string(),
            password: "1234".to_string(),
            authorized_users: vec![Authorization::new("u1", Some("001".into()))],
            relay_settings: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn devices_mark_the_active_one() {
        let devices = vec![device("d1", "Gate"), device("d2", "Garage")];
        let out = plain(render_devices(&devices, Some("d2")));
        let lines: Vec<_> = out.lines().collect();
        assert!(!lines[0].starts_with(ACTIVE_MARKER));
        assert!(lines[1].starts_with(ACTIVE_MARKER));
        assert!(lines[0].contains("1 user(s)"));
    }

    #[test]
    fn logs_show_device_name_and_outcome() {
        let mut entry = LogEntry::new(
            Some("d1".into()),
            "Gate Open",
            "Open the gate (****CC)",
            false,
            LogCategory::Relay,
        );
        entry.timestamp = Utc::now() - Duration::minutes(5);
        let out = plain(render_logs(&[entry], &[device("d1", "Gate")]));
        assert!(out.starts_with(FAIL_MARKER));
        assert!(out.contains("[Gate]"));
        assert!(out.contains("Gate Open: Open the gate (****CC)"));
        assert!(out.contains("5 minutes ago"));
    }

    #[test]
    fn sms_and_messages_always_render() {
        let result = CmdResult::default()
            .with_sms("0400000000", "1234CC")
            .with_listed_devices(vec![device("d1", "Gate")]);
        let out = plain(render(&result, View::Plain));
        assert_eq!(out, "SMS to 0400000000: 1234CC\n");
    }

    #[test]
    fn settings_show_placeholders() {
        let out = plain(render_settings(&GlobalSettings::default(), &[]));
        assert!(out.contains("Admin number    (not set)"));
        assert!(out.contains("Active device   (none)"));
    }

    #[test]
    fn users_without_serial_show_dashes() {
        let user = User {
            id: "u1".into(),
            name: "Ann".into(),
            phone_number: "0411222333".into(),
            serial_number: String::new(),
            start_time: None,
            end_time: None,
        };
        assert!(plain(render_users(&[user])).starts_with("---  Ann  0411222333"));
    }
}
