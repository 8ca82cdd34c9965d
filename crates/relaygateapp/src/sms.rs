//! # Relay Command Grammar
//!
//! GSM relays are driven by plain SMS bodies. Every body starts with the
//! device's 4-digit password, followed by an operation code and optional
//! `#`-terminated fields:
//!
//! | Body                                 | Operation              |
//! |--------------------------------------|------------------------|
//! | `1234CC`                             | open                   |
//! | `1234DD`                             | close                  |
//! | `1234EE`                             | status                 |
//! | `1234A007#0411222333#`               | add user at 007        |
//! | `1234A007#0411222333#2405010000#2412312359#` | add user with window |
//! | `1234A007##`                         | remove user at 007     |
//! | `1234AUT#` / `1234ALL#`              | authorized-only / allow-all |
//! | `1234GOT005#`                        | latch time, seconds    |
//! | `1234TEL0411222333#`                 | register admin number  |
//!
//! This module encodes [`RelayCommand`]s into bodies, parses bodies back, and
//! [`describe`]s any body as a log-friendly triple with the password redacted.
//! Sending is somebody else's job.

use crate::model::{AccessControl, LogCategory};
use crate::validation::{
    format_serial, validate_access_time, validate_latch_time, validate_password,
    validate_phone_number, validate_serial, FieldError,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// What replaces the password in anything that gets logged.
pub const REDACTED_PASSWORD: &str = "****";

static USER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^A(\d{3})#([^#]*)#(?:(\d{10})#(\d{10})#)?$").expect("static regex is valid")
});
static LATCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^GOT(\d{3})#$").expect("static regex is valid"));
static ADMIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^TEL(\+?\d+)#$").expect("static regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Open,
    Close,
    Status,
    AddUser {
        serial: String,
        phone: String,
        window: Option<AccessWindow>,
    },
    RemoveUser {
        serial: String,
    },
    AccessControl(AccessControl),
    LatchTime(String),
    RegisterAdmin(String),
}

/// `YYMMDDHHMM` bounds of a user's access window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessWindow {
    pub start: String,
    pub end: String,
}

impl RelayCommand {
    pub fn add_user(serial: u16, phone: impl Into<String>) -> Self {
        RelayCommand::AddUser {
            serial: format_serial(serial),
            phone: phone.into(),
            window: None,
        }
    }

    /// Build the SMS body for this command, validating every field.
    pub fn encode(&self, password: &str) -> Result<String, FieldError> {
        validate_password(password)?;
        let body = match self {
            RelayCommand::Open => "CC".to_string(),
            RelayCommand::Close => "DD".to_string(),
            RelayCommand::Status => "EE".to_string(),
            RelayCommand::AddUser {
                serial,
                phone,
                window,
            } => {
                validate_serial(serial)?;
                validate_phone_number(phone)?;
                match window {
                    Some(w) => {
                        validate_access_time(&w.start)?;
                        validate_access_time(&w.end)?;
                        format!("A{}#{}#{}#{}#", serial, phone, w.start, w.end)
                    }
                    None => format!("A{}#{}#", serial, phone),
                }
            }
            RelayCommand::RemoveUser { serial } => {
                validate_serial(serial)?;
                format!("A{}##", serial)
            }
            RelayCommand::AccessControl(AccessControl::AuthorizedOnly) => "AUT#".to_string(),
            RelayCommand::AccessControl(AccessControl::AllowAll) => "ALL#".to_string(),
            RelayCommand::LatchTime(seconds) => {
                validate_latch_time(seconds)?;
                format!("GOT{}#", seconds)
            }
            RelayCommand::RegisterAdmin(number) => {
                validate_phone_number(number)?;
                format!("TEL{}#", number)
            }
        };
        Ok(format!("{}{}", password, body))
    }

    pub fn category(&self) -> LogCategory {
        match self {
            RelayCommand::Open | RelayCommand::Close | RelayCommand::Status => LogCategory::Relay,
            RelayCommand::AddUser { .. } | RelayCommand::RemoveUser { .. } => LogCategory::User,
            RelayCommand::AccessControl(_)
            | RelayCommand::LatchTime(_)
            | RelayCommand::RegisterAdmin(_) => LogCategory::Settings,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            RelayCommand::Open => "Gate Open",
            RelayCommand::Close => "Gate Close",
            RelayCommand::Status => "Status Check",
            RelayCommand::AddUser { .. } => "Add User",
            RelayCommand::RemoveUser { .. } => "Remove User",
            RelayCommand::AccessControl(_) => "Access Control",
            RelayCommand::LatchTime(_) => "Latch Time",
            RelayCommand::RegisterAdmin(_) => "Register Admin",
        }
    }

    fn summary(&self) -> String {
        match self {
            RelayCommand::Open => "Opened gate".to_string(),
            RelayCommand::Close => "Closed gate".to_string(),
            RelayCommand::Status => "Requested relay status".to_string(),
            RelayCommand::AddUser {
                serial,
                phone,
                window: None,
            } => format!("Added {} at position {}", phone, serial),
            RelayCommand::AddUser {
                serial,
                phone,
                window: Some(w),
            } => format!(
                "Added {} at position {} (access {} to {})",
                phone, serial, w.start, w.end
            ),
            RelayCommand::RemoveUser { serial } => format!("Removed user at position {}", serial),
            RelayCommand::AccessControl(AccessControl::AuthorizedOnly) => {
                "Restricted access to authorized users".to_string()
            }
            RelayCommand::AccessControl(AccessControl::AllowAll) => {
                "Allowed access for all callers".to_string()
            }
            RelayCommand::LatchTime(seconds) => {
                let secs = seconds.parse::<u32>().unwrap_or(0);
                format!("Set latch time to {} seconds", secs)
            }
            RelayCommand::RegisterAdmin(number) => format!("Registered admin {}", number),
        }
    }
}

/// Split a body into its password and command. None if it isn't one we know.
pub fn parse(sms: &str) -> Option<(String, RelayCommand)> {
    let sms = sms.trim();
    let (password, rest) = split_password(sms)?;

    let command = match rest {
        "CC" => RelayCommand::Open,
        "DD" => RelayCommand::Close,
        "EE" => RelayCommand::Status,
        "AUT#" => RelayCommand::AccessControl(AccessControl::AuthorizedOnly),
        "ALL#" => RelayCommand::AccessControl(AccessControl::AllowAll),
        _ => parse_with_fields(rest)?,
    };
    Some((password.to_string(), command))
}

fn parse_with_fields(rest: &str) -> Option<RelayCommand> {
    if let Some(caps) = USER_RE.captures(rest) {
        let serial = caps[1].to_string();
        let phone = &caps[2];
        if phone.is_empty() {
            // A007## with no window is removal; A007##<start>#<end># is nonsense
            return caps
                .get(3)
                .is_none()
                .then_some(RelayCommand::RemoveUser { serial });
        }
        let window = match (caps.get(3), caps.get(4)) {
            (Some(start), Some(end)) => Some(AccessWindow {
                start: start.as_str().to_string(),
                end: end.as_str().to_string(),
            }),
            _ => None,
        };
        return Some(RelayCommand::AddUser {
            serial,
            phone: phone.to_string(),
            window,
        });
    }
    if let Some(caps) = LATCH_RE.captures(rest) {
        return Some(RelayCommand::LatchTime(caps[1].to_string()));
    }
    if let Some(caps) = ADMIN_RE.captures(rest) {
        return Some(RelayCommand::RegisterAdmin(caps[1].to_string()));
    }
    None
}

fn split_password(sms: &str) -> Option<(&str, &str)> {
    if sms.len() < 4 || !sms.is_char_boundary(4) {
        return None;
    }
    let (password, rest) = sms.split_at(4);
    validate_password(password).ok()?;
    Some((password, rest))
}

/// Replace a leading 4-digit password with [`REDACTED_PASSWORD`].
pub fn redact(sms: &str) -> String {
    let sms = sms.trim();
    match split_password(sms) {
        Some((_, rest)) => format!("{}{}", REDACTED_PASSWORD, rest),
        None => sms.to_string(),
    }
}

/// Log-ready description of an SMS body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescription {
    pub action: String,
    pub details: String,
    pub category: LogCategory,
}

/// Classify any SMS body. Unknown bodies become a generic system entry.
/// The password never appears in the result.
pub fn describe(sms: &str) -> CommandDescription {
    let redacted = redact(sms);
    match parse(sms) {
        Some((_, command)) => CommandDescription {
            action: command.action().to_string(),
            details: format!("{} ({})", command.summary(), redacted),
            category: command.category(),
        },
        None => CommandDescription {
            action: "Command Sent".to_string(),
            details: redacted,
            category: LogCategory::System,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple_commands() {
        assert_eq!(RelayCommand::Open.encode("1234").unwrap(), "1234CC");
        assert_eq!(RelayCommand::Close.encode("1234").unwrap(), "1234DD");
        assert_eq!(RelayCommand::Status.encode("1234").unwrap(), "1234EE");
        assert_eq!(
            RelayCommand::AccessControl(AccessControl::AllowAll)
                .encode("1234")
                .unwrap(),
            "1234ALL#"
        );
    }

    #[test]
    fn test_encode_user_commands() {
        let add = RelayCommand::add_user(7, "0411222333");
        assert_eq!(add.encode("1234").unwrap(), "1234A007#0411222333#");

        let windowed = RelayCommand::AddUser {
            serial: "007".into(),
            phone: "0411222333".into(),
            window: Some(AccessWindow {
                start: "2405010000".into(),
                end: "2412312359".into(),
            }),
        };
        assert_eq!(
            windowed.encode("1234").unwrap(),
            "1234A007#0411222333#2405010000#2412312359#"
        );

        let remove = RelayCommand::RemoveUser {
            serial: "007".into(),
        };
        assert_eq!(remove.encode("1234").unwrap(), "1234A007##");
    }

    #[test]
    fn test_encode_rejects_bad_fields() {
        assert!(RelayCommand::Open.encode("12").is_err());
        assert!(RelayCommand::LatchTime("5".into()).encode("1234").is_err());
        assert!(RelayCommand::add_user(250, "0411").encode("1234").is_err());
    }

    #[test]
    fn test_parse_inverts_encode() {
        let commands = [
            RelayCommand::Open,
            RelayCommand::add_user(12, "+61411222333"),
            RelayCommand::RemoveUser {
                serial: "200".into(),
            },
            RelayCommand::AccessControl(AccessControl::AuthorizedOnly),
            RelayCommand::LatchTime("010".into()),
            RelayCommand::RegisterAdmin("0411222333".into()),
        ];
        for command in commands {
            let body = command.encode("4321").unwrap();
            assert_eq!(parse(&body), Some(("4321".to_string(), command)));
        }
    }

    #[test]
    fn test_all_is_not_mistaken_for_a_user_command() {
        let (_, command) = parse("1234ALL#").unwrap();
        assert_eq!(command, RelayCommand::AccessControl(AccessControl::AllowAll));
    }

    #[test]
    fn test_parse_rejects_unknown_bodies() {
        assert_eq!(parse("hello"), None);
        assert_eq!(parse("1234XYZ"), None);
        assert_eq!(parse("abcdCC"), None);
    }

    #[test]
    fn test_describe_redacts_password() {
        let d = describe("9876GOT005#");
        assert_eq!(d.action, "Latch Time");
        assert_eq!(d.category, LogCategory::Settings);
        assert_eq!(d.details, "Set latch time to 5 seconds (****GOT005#)");
        assert!(!d.details.contains("9876"));
    }

    #[test]
    fn test_describe_user_commands() {
        let add = describe("1234A003#0411222333#");
        assert_eq!(add.action, "Add User");
        assert_eq!(add.category, LogCategory::User);
        assert!(add.details.contains("0411222333"));

        let remove = describe("1234A003##");
        assert_eq!(remove.action, "Remove User");
    }

    #[test]
    fn test_describe_unknown_command() {
        let d = describe("5555ZZZ");
        assert_eq!(d.action, "Command Sent");
        assert_eq!(d.category, LogCategory::System);
        assert_eq!(d.details, "****ZZZ");
    }
}
