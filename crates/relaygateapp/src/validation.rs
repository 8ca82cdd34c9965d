//! Field validation for values that end up inside SMS commands.
//!
//! The relay parses commands positionally, so every field has a fixed width:
//! - Password: exactly 4 digits
//! - Serial: 3 digits, 001–200
//! - Latch time: 3 digits (seconds)
//! - Access window: 10 digits, `YYMMDDHHMM`
//! - Phone numbers: digits with an optional leading `+`

use crate::error::GateError;

pub const MIN_SERIAL: u16 = 1;
pub const MAX_SERIAL: u16 = 200;

/// Validates a device password.
///
/// ```
/// use relaygateapp::validation::validate_password;
///
/// assert!(validate_password("1234").is_ok());
/// assert!(validate_password("123").is_err());
/// assert!(validate_password("12a4").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if is_digits(password, 4) {
        Ok(())
    } else {
        Err(FieldError::Password(password.to_string()))
    }
}

/// Validates a device-table position and returns it as a number.
pub fn validate_serial(serial: &str) -> Result<u16, FieldError> {
    if !is_digits(serial, 3) {
        return Err(FieldError::Serial(serial.to_string()));
    }
    match serial.parse::<u16>() {
        Ok(n) if (MIN_SERIAL..=MAX_SERIAL).contains(&n) => Ok(n),
        _ => Err(FieldError::Serial(serial.to_string())),
    }
}

/// Formats a table position the way the relay expects (`7` → `"007"`).
pub fn format_serial(position: u16) -> String {
    format!("{:03}", position)
}

pub fn validate_latch_time(latch: &str) -> Result<(), FieldError> {
    if is_digits(latch, 3) {
        Ok(())
    } else {
        Err(FieldError::LatchTime(latch.to_string()))
    }
}

/// Validates a `YYMMDDHHMM` access window bound.
pub fn validate_access_time(value: &str) -> Result<(), FieldError> {
    if !is_digits(value, 10) {
        return Err(FieldError::AccessTime(value.to_string()));
    }
    let part = |range: std::ops::Range<usize>| value[range].parse::<u32>().unwrap_or(0);
    let (month, day, hour, minute) = (part(2..4), part(4..6), part(6..8), part(8..10));
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 {
        return Err(FieldError::AccessTime(value.to_string()));
    }
    Ok(())
}

pub fn validate_phone_number(phone: &str) -> Result<(), FieldError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !digits.is_empty() && digits.len() <= 20 && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FieldError::PhoneNumber(phone.to_string()))
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Password(String),
    Serial(String),
    LatchTime(String),
    AccessTime(String),
    PhoneNumber(String),
    Required(&'static str),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Password(v) => write!(f, "password must be exactly 4 digits, got '{}'", v),
            FieldError::Serial(v) => {
                write!(
                    f,
                    "serial must be a 3-digit position between {:03} and {:03}, got '{}'",
                    MIN_SERIAL, MAX_SERIAL, v
                )
            }
            FieldError::LatchTime(v) => write!(f, "latch time must be 3 digits, got '{}'", v),
            FieldError::AccessTime(v) => {
                write!(f, "access time must be YYMMDDHHMM, got '{}'", v)
            }
            FieldError::PhoneNumber(v) => write!(f, "invalid phone number '{}'", v),
            FieldError::Required(field) => write!(f, "{} is required", field),
        }
    }
}

impl std::error::Error for FieldError {}

impl From<FieldError> for GateError {
    fn from(err: FieldError) -> Self {
        GateError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_bounds() {
        assert_eq!(validate_serial("001"), Ok(1));
        assert_eq!(validate_serial("200"), Ok(200));
        assert!(validate_serial("000").is_err());
        assert!(validate_serial("201").is_err());
        assert!(validate_serial("12").is_err());
    }

    #[test]
    fn test_format_serial_pads() {
        assert_eq!(format_serial(7), "007");
        assert_eq!(format_serial(150), "150");
    }

    #[test]
    fn test_latch_time() {
        assert!(validate_latch_time("005").is_ok());
        assert!(validate_latch_time("5").is_err());
    }

    #[test]
    fn test_access_time() {
        assert!(validate_access_time("2405011230").is_ok());
        assert!(validate_access_time("2413011230").is_err());
        assert!(validate_access_time("2405012460").is_err());
        assert!(validate_access_time("24050112").is_err());
    }

    #[test]
    fn test_phone_number() {
        assert!(validate_phone_number("+61400000000").is_ok());
        assert!(validate_phone_number("0400000000").is_ok());
        assert!(validate_phone_number("").is_err());
        assert!(validate_phone_number("04-00").is_err());
    }

    #[test]
    fn test_field_error_converts_to_validation() {
        let err: GateError = validate_password("12").unwrap_err().into();
        assert!(matches!(err, GateError::Validation(_)));
    }
}
