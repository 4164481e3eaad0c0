//! Configuration file parser.
//!
//! Parses `section.key = value` configuration files with a custom
//! lightweight parser.

use super::types::*;
use std::{fs, io};

/// Load configuration from a file path.
pub fn load_config(path: &str) -> io::Result<Config> {
    let s = fs::read_to_string(path)?;
    parse_config(&s)
}

/// Parse configuration from a string.
fn parse_config(s: &str) -> io::Result<Config> {
    let mut cfg = Config::default();

    for (lineno, line) in s.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((lhs, rhs)) = line.split_once('=') else {
            continue;
        };
        let lhs = lhs.trim();
        let mut val = rhs.trim();
        if let Some((v, _comment)) = val.split_once('#') {
            val = v.trim();
        }

        let (section, key) = if let Some((a, b)) = lhs.split_once('.') {
            (a.trim(), b.trim())
        } else {
            ("", lhs)
        };

        if section.is_empty() {
            continue;
        }

        set_config_value(section, key, val, &mut cfg).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", lineno + 1, e),
            )
        })?;
    }

    Ok(cfg)
}

/// Set a configuration value based on section, key, and value strings.
fn set_config_value(section: &str, key: &str, val: &str, cfg: &mut Config) -> Result<(), String> {
    macro_rules! parse {
        (s) => {
            val.trim_matches('"').to_string()
        };
        (b) => {
            match val {
                "true" => true,
                "false" => false,
                _ => return Err(format!("bad bool {val}")),
            }
        };
        (u) => {
            val.parse::<u64>().map_err(|e| e.to_string())?
        };
        (usize_) => {
            val.parse::<usize>().map_err(|e| e.to_string())?
        };
        (i32_) => {
            val.parse::<i32>().map_err(|e| e.to_string())?
        };
        (u16_) => {
            val.parse::<u16>().map_err(|e| e.to_string())?
        };
    }

    match (section, key) {
        // Server section
        ("server", "host") => cfg.server.host = parse!(s),
        ("server", "port") => cfg.server.port = parse!(u16_),
        ("server", "name") => cfg.server.name = parse!(s),
        ("server", "secure") => cfg.server.secure = parse!(b),
        ("server", "debug") => cfg.server.debug = parse!(b),

        // Limits section
        ("limits", "backlog") => cfg.limits.backlog = parse!(i32_),
        ("limits", "max_active_conns") => cfg.limits.max_active_conns = parse!(usize_),
        ("limits", "read_chunk_bytes") => cfg.limits.read_chunk_bytes = parse!(usize_),
        ("limits", "read_timeout_ms") => cfg.limits.read_timeout_ms = parse!(u),
        ("limits", "max_request_bytes") => cfg.limits.max_request_bytes = parse!(usize_),

        // Secrets section
        ("secrets", "password_salt") => cfg.secrets.password_salt = parse!(s),

        _ => return Err(format!("unknown option {}.{}", section, key)),
    }

    Ok(())
}
