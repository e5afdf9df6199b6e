//! Output rendering and argument parsing helpers.

use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

/// Structured output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Serialize `value` in the requested format.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(text.trim_end().to_string())
}

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Parse a duration like "10m", "2s", "1h30m" or "1.5h".
///
/// Units (case-insensitive): `h`, `m`, `s`. Every number needs a unit.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("empty duration value".to_string());
    }

    let mut total = 0f64;
    let mut number = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }
        let unit = match ch {
            'h' => 3600.0,
            'm' => 60.0,
            's' => 1.0,
            _ => return Err(format!("invalid duration value: {s}")),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration value: {s}"))?;
        total += value * unit;
        number.clear();
    }

    if !number.is_empty() {
        return Err(format!("missing duration unit: {s}"));
    }
    Duration::try_from_secs_f64(total).map_err(|_| format!("invalid duration value: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        target_image: String,
        cached: bool,
    }

    #[test]
    fn test_render_json() {
        let sample = Sample {
            target_image: "wave.io/alpine".to_string(),
            cached: true,
        };
        let text = render(&sample, OutputFormat::Json).unwrap();
        assert!(text.contains("\"targetImage\": \"wave.io/alpine\""));
        assert!(text.starts_with('{'));
    }

    #[test]
    fn test_render_yaml() {
        let sample = Sample {
            target_image: "wave.io/alpine".to_string(),
            cached: false,
        };
        let text = render(&sample, OutputFormat::Yaml).unwrap();
        assert_eq!(text, "targetImage: wave.io/alpine\ncached: false");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1048576), "5.0 MB");
        assert_eq!(format_bytes(1073741824), "1.0 GB");
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("1..5s").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("99999999999999999999h").is_err());
        assert!(parse_duration("2500000000000000h").is_ok());
    }
}
