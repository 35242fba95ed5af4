//! Minimal TOML parser for board configuration
//!
//! Handles only the subset `cyclo.toml` needs. It does NOT support the full
//! TOML spec.
//!
//! Supported features:
//! - Key = value pairs (string, integer, boolean)
//! - [section] headers
//! - Comments (# ...)
//!
//! NOT supported:
//! - Arrays and tables of any kind
//! - Multi-line strings
//! - Dotted keys

use super::{BoardConfig, ConfigError, PinConfig, GPIO_COUNT};

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Relay,
    NoNc,
    Console,
    Ui,
    Storage,
}

/// Parse TOML configuration into a validated [`BoardConfig`]
///
/// Keys that are not present keep their defaults.
pub fn parse_config(input: &str) -> Result<BoardConfig, ConfigError> {
    let mut config = BoardConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = line
                .strip_suffix(']')
                .ok_or(ConfigError::InvalidSection)?;
            section = parse_section_header(&header[1..])?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ConfigError::InvalidValue)?;
        apply_value(section, key, value, &mut config)?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ConfigError> {
    match header.trim() {
        "relay" => Ok(Section::Relay),
        "nonc" => Ok(Section::NoNc),
        "console" => Ok(Section::Console),
        "ui" => Ok(Section::Ui),
        "storage" => Ok(Section::Storage),
        _ => Err(ConfigError::InvalidSection),
    }
}

/// Split `key = value`, dropping an inline comment
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    let value = match value.find('#') {
        // Only strip when the # is outside quotes
        Some(hash_pos) if value[..hash_pos].matches('"').count() % 2 == 0 => {
            value[..hash_pos].trim()
        }
        _ => value,
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value, removing quotes if present
fn parse_string(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ConfigError> {
    strip_underscores(value)
        .parse()
        .map_err(|_| ConfigError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}

/// Parse a pin string like `"gpio23"` or `"!gpio23"` (active-low)
fn parse_pin(value: &str) -> Result<PinConfig, ConfigError> {
    let value = parse_string(value);
    let (inverted, name) = match value.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let number = name.strip_prefix("gpio").ok_or(ConfigError::InvalidPin)?;
    let gpio: u8 = number.parse().map_err(|_| ConfigError::InvalidPin)?;
    if gpio >= GPIO_COUNT {
        return Err(ConfigError::InvalidPin);
    }

    Ok(PinConfig { gpio, inverted })
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut BoardConfig,
) -> Result<(), ConfigError> {
    match (section, key) {
        (Section::Relay, "pin") => config.relay.pin = parse_pin(value)?,

        (Section::NoNc, "no_pin") => config.nonc.no_pin = parse_pin(value)?,
        (Section::NoNc, "nc_pin") => config.nonc.nc_pin = parse_pin(value)?,
        (Section::NoNc, "sample_hz") => config.nonc.sample_hz = parse_int(value)?,

        (Section::Console, "baudrate") => config.console.baudrate = parse_int(value)?,
        (Section::Console, "banner") => config.console.banner = parse_bool(value)?,

        (Section::Ui, "splash_ms") => config.ui.splash_ms = parse_int(value)?,
        (Section::Ui, "health_interval_ms") => {
            config.ui.health_interval_ms = parse_int(value)?
        }

        (Section::Storage, "offset") => config.storage.offset = parse_int(value)?,

        _ => return Err(ConfigError::UnknownKey),
    }
    Ok(())
}

/// Drop `_` digit separators
///
/// Anything too long to be an integer comes back empty and fails to parse.
fn strip_underscores(value: &str) -> heapless::String<24> {
    let mut out = heapless::String::new();
    for c in value.chars().filter(|&c| c != '_') {
        if out.push(c).is_err() {
            out.clear();
            break;
        }
    }
    out
}
