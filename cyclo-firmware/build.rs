//! Build script for cyclo-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates cyclo.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sections and the keys each one accepts
const SECTIONS: &[(&str, &[&str])] = &[
    ("relay", &["pin"]),
    ("nonc", &["no_pin", "nc_pin", "sample_hz"]),
    ("console", &["baudrate", "banner"]),
    ("ui", &["splash_ms", "health_interval_ms"]),
    ("storage", &["offset"]),
];

/// GPIOs taken by the console UART
const CONSOLE_PINS: [i64; 2] = [0, 1];

const SECTOR_SIZE: i64 = 4096;
const STORAGE_START: i64 = 0x1F_0000;
const FLASH_SIZE: i64 = 2 * 1024 * 1024;

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate cyclo.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=cyclo.toml");

    let config_path = Path::new("cyclo.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: cyclo.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a cyclo.toml board configuration file.    ║\n\
            ║  Please create one in the cyclo-firmware directory.              ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read cyclo.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in cyclo.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_layout(&config, &mut errors);
    validate_pins(&config, &mut errors);
    validate_numbers(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid board configuration in cyclo.toml                ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=cyclo.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Only known sections and keys, no top-level keys
fn validate_layout(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(root) = config.as_table() else {
        errors.push("top level must be a table".to_string());
        return;
    };

    for (name, value) in root {
        let Some((_, keys)) = SECTIONS.iter().find(|(section, _)| section == name) else {
            errors.push(format!("unknown section or key '{}'", name));
            continue;
        };
        let Some(table) = value.as_table() else {
            errors.push(format!("'{}' must be a [section]", name));
            continue;
        };
        for key in table.keys() {
            if !keys.contains(&key.as_str()) {
                errors.push(format!("[{}] unknown key '{}'", name, key));
            }
        }
    }
}

/// Parse "gpioN" / "!gpioN"
fn pin_number(value: &str) -> Option<i64> {
    let name = value.strip_prefix('!').unwrap_or(value);
    name.strip_prefix("gpio")?.parse().ok()
}

fn validate_pins(config: &toml::Value, errors: &mut Vec<String>) {
    let pins = [("relay", "pin"), ("nonc", "no_pin"), ("nonc", "nc_pin")];
    let mut used: Vec<(i64, String)> = Vec::new();

    for (section, key) in pins {
        let Some(value) = config.get(section).and_then(|s| s.get(key)) else {
            continue;
        };
        let name = format!("[{}] {}", section, key);

        let Some(gpio) = value.as_str().and_then(pin_number) else {
            errors.push(format!("{} must look like \"gpio23\" or \"!gpio23\"", name));
            continue;
        };
        if !(0..30).contains(&gpio) {
            errors.push(format!("{} gpio{} does not exist", name, gpio));
        } else if CONSOLE_PINS.contains(&gpio) {
            errors.push(format!("{} gpio{} is used by the console", name, gpio));
        } else if let Some((_, other)) = used.iter().find(|(g, _)| *g == gpio) {
            errors.push(format!("{} gpio{} already used by {}", name, gpio, other));
        }
        used.push((gpio, name));
    }
}

fn integer(config: &toml::Value, section: &str, key: &str, errors: &mut Vec<String>) -> Option<i64> {
    let value = config.get(section)?.get(key)?;
    match value.as_integer() {
        Some(n) => Some(n),
        None => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            None
        }
    }
}

fn validate_numbers(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(hz) = integer(config, "nonc", "sample_hz", errors) {
        if !(1..=1000).contains(&hz) {
            errors.push("[nonc] sample_hz must be 1-1000".to_string());
        }
    }
    if let Some(baud) = integer(config, "console", "baudrate", errors) {
        if !(1200..=921_600).contains(&baud) {
            errors.push("[console] baudrate must be 1200-921600".to_string());
        }
    }
    if let Some(banner) = config.get("console").and_then(|c| c.get("banner")) {
        if banner.as_bool().is_none() {
            errors.push("[console] banner must be true or false".to_string());
        }
    }
    if let Some(ms) = integer(config, "ui", "splash_ms", errors) {
        if !(0..=60_000).contains(&ms) {
            errors.push("[ui] splash_ms must be 0-60000".to_string());
        }
    }
    if let Some(ms) = integer(config, "ui", "health_interval_ms", errors) {
        if !(100..=600_000).contains(&ms) {
            errors.push("[ui] health_interval_ms must be 100-600000".to_string());
        }
    }
    if let Some(offset) = integer(config, "storage", "offset", errors) {
        if offset % SECTOR_SIZE != 0 {
            errors.push("[storage] offset must be 4096-byte aligned".to_string());
        }
        // The store banks across two sectors
        if !(STORAGE_START..=FLASH_SIZE - 2 * SECTOR_SIZE).contains(&offset) {
            errors.push("[storage] two sectors at offset must lie in the last 64 KB".to_string());
        }
    }
}
