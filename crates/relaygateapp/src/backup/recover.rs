//! Getting a JSON value out of text of unknown quality.
//!
//! Backups arrive through share sheets, chat apps and email, so the text may be
//! wrapped in noise, hand-edited, or truncated. Recovery happens in two steps:
//!
//! 1. [`isolate`] trims leading and trailing noise around the first top-level
//!    object (or array, for the oldest format).
//! 2. [`parse_recovered`] tries increasingly forgiving parsers, stopping at
//!    the first one that succeeds. See [`ParseTier`].

use crate::error::{GateError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Where a JSON object plausibly starts: a brace, optional whitespace, then
/// a key's opening quote. Covers compact, spaced and pretty-printed output.
static OBJECT_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*""#).expect("static regex is valid"));

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)"\s*:\s*"#).expect("static regex is valid"));

/// Which parser produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseTier {
    /// Plain `serde_json`.
    Strict,
    /// Parsed after removing trailing commas.
    Repaired,
    /// Rebuilt from whatever `"key": value` pairs could be found.
    Extracted,
}

impl ParseTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseTier::Strict => "strict",
            ParseTier::Repaired => "repaired",
            ParseTier::Extracted => "extracted",
        }
    }
}

/// Trim noise around the first top-level JSON object or array.
///
/// Returns None when there is no plausible start marker at all. If the value
/// never closes, everything from the start marker on is returned and left to
/// the parsers.
pub fn isolate(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    let start = if trimmed.starts_with('[') {
        input.find('[')?
    } else {
        OBJECT_START_RE.find(input)?.start()
    };

    let candidate = &input[start..];
    match closing_offset(candidate) {
        Some(end) => Some(&candidate[..end]),
        None => Some(candidate),
    }
}

/// Byte offset just past the bracket closing the value that opens `text`.
/// Brackets inside string literals do not count.
fn closing_offset(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Run the parser tiers over already-isolated text.
pub fn parse_recovered(text: &str) -> Result<(Value, ParseTier)> {
    let strict_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok((value, ParseTier::Strict)),
        Err(e) => e,
    };
    debug!(error = %strict_err, "strict parse failed; trying trailing-comma repair");

    let repaired = strip_trailing_commas(text);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => return Ok((value, ParseTier::Repaired)),
        Err(e) => debug!(error = %e, "repaired parse failed; extracting key/value pairs"),
    }

    let extracted = extract_pairs(&repaired);
    if extracted.is_empty() {
        warn!(error = %strict_err, "backup text could not be parsed");
        return Err(GateError::BackupFormat(format!(
            "no JSON could be recovered ({})",
            strict_err
        )));
    }
    warn!(keys = extracted.len(), "backup rebuilt from loose key/value pairs");
    Ok((Value::Object(extracted), ParseTier::Extracted))
}

/// Isolate then parse. The full front half of the restore pipeline.
pub fn recover(input: &str) -> Result<(Value, ParseTier)> {
    if input.trim().is_empty() {
        return Err(GateError::EmptyBackup);
    }
    let text = isolate(input)
        .ok_or_else(|| GateError::BackupFormat("no JSON object found in input".to_string()))?;
    parse_recovered(text)
}

/// Remove commas that directly precede `}` or `]`, outside string literals.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Find `"key": <value>` pairs and keep the first value seen for each key.
///
/// Values are read with a streaming deserializer so nested objects and arrays
/// come through whole. Scanning resumes after each value, so keys nested
/// inside a recovered value are not lifted to the top.
pub fn extract_pairs(text: &str) -> Map<String, Value> {
    let mut pairs = Map::new();
    let mut pos = 0;

    while let Some(caps) = KEY_RE.captures_at(text, pos) {
        let whole = caps.get(0).map(|m| (m.start(), m.end()));
        let Some((match_start, value_start)) = whole else {
            break;
        };
        let key = caps[1].to_string();

        let mut values = serde_json::Deserializer::from_str(&text[value_start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => {
                pos = value_start + values.byte_offset();
                pairs.entry(key).or_insert(value);
            }
            _ => {
                // Skip past the key only; its value may hold other pairs.
                pos = match_start + 1;
            }
        }
    }
    pairs
}
