//! Current-time tool.
//!
//! Resolves `UTC`/`GMT`, fixed offsets (`+05:30`, `UTC-3`, `GMT+1`) and a
//! table of common zone names. Named zones use their standard offset; daylight
//! saving is not applied.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use turnwise_core::error::ToolError;
use turnwise_core::tool::LocalTool;

/// Zone name → (standard offset in minutes, abbreviation).
const KNOWN_ZONES: &[(&str, i32, &str)] = &[
    ("America/New_York", -300, "EST"),
    ("America/Chicago", -360, "CST"),
    ("America/Denver", -420, "MST"),
    ("America/Los_Angeles", -480, "PST"),
    ("America/Sao_Paulo", -180, "BRT"),
    ("America/Toronto", -300, "EST"),
    ("Europe/London", 0, "GMT"),
    ("Europe/Paris", 60, "CET"),
    ("Europe/Berlin", 60, "CET"),
    ("Europe/Madrid", 60, "CET"),
    ("Europe/Moscow", 180, "MSK"),
    ("Asia/Dubai", 240, "GST"),
    ("Asia/Kolkata", 330, "IST"),
    ("Asia/Singapore", 480, "SGT"),
    ("Asia/Shanghai", 480, "CST"),
    ("Asia/Tokyo", 540, "JST"),
    ("Australia/Sydney", 600, "AEST"),
    ("Pacific/Auckland", 720, "NZST"),
];

pub struct CurrentTimeTool;

#[async_trait]
impl LocalTool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current time in a specific timezone."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "The timezone name (e.g., \"America/New_York\", \"Europe/London\", \"Asia/Tokyo\") or an offset like \"+05:30\"",
                    "default": "UTC"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let timezone = arguments["timezone"].as_str().unwrap_or("UTC");
        Ok(describe_time(Utc::now(), timezone))
    }
}

/// Render `now` in `timezone`, or an explanatory message for unknown zones.
pub fn describe_time(now: DateTime<Utc>, timezone: &str) -> String {
    match resolve_timezone(timezone) {
        Some((offset, label)) => {
            let local = now.with_timezone(&offset);
            format!(
                "Current time in {timezone}: {} {label}",
                local.format("%Y-%m-%d %H:%M:%S")
            )
        }
        None => format!("Unknown timezone: {timezone}. Please use a valid timezone name."),
    }
}

/// Map a zone name or offset to a fixed offset and a display label.
pub fn resolve_timezone(timezone: &str) -> Option<(FixedOffset, String)> {
    let tz = timezone.trim();
    if tz.eq_ignore_ascii_case("UTC") || tz.eq_ignore_ascii_case("GMT") || tz == "Z" {
        return Some((FixedOffset::east_opt(0)?, "UTC".into()));
    }

    if let Some((_, minutes, abbr)) = KNOWN_ZONES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(tz))
    {
        return Some((FixedOffset::east_opt(minutes * 60)?, (*abbr).to_string()));
    }

    let offset_part = ["UTC", "GMT", "utc", "gmt"]
        .iter()
        .find_map(|prefix| tz.strip_prefix(prefix))
        .unwrap_or(tz);
    let minutes = parse_offset(offset_part)?;
    let offset = FixedOffset::east_opt(minutes * 60)?;
    Some((offset, format!("UTC{}", format_offset(minutes))))
}

/// Parse `+5`, `-03`, `+05:30`, `+0530` into minutes east of UTC.
fn parse_offset(text: &str) -> Option<i32> {
    let (sign, rest) = match text.chars().next()? {
        '+' => (1, &text[1..]),
        '-' => (-1, &text[1..]),
        _ => return None,
    };
    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else if rest.len() == 4 && rest.is_ascii() {
        (rest[..2].parse::<i32>().ok()?, rest[2..].parse::<i32>().ok()?)
    } else {
        (rest.parse::<i32>().ok()?, 0)
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.abs();
    format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn utc_by_default() {
        assert_eq!(
            describe_time(noon(), "UTC"),
            "Current time in UTC: 2024-03-01 12:00:00 UTC"
        );
    }

    #[test]
    fn named_zone() {
        let text = describe_time(noon(), "Asia/Tokyo");
        assert_eq!(text, "Current time in Asia/Tokyo: 2024-03-01 21:00:00 JST");
    }

    #[test]
    fn fixed_offsets() {
        assert_eq!(
            describe_time(noon(), "+05:30"),
            "Current time in +05:30: 2024-03-01 17:30:00 UTC+05:30"
        );
        assert_eq!(
            describe_time(noon(), "UTC-3"),
            "Current time in UTC-3: 2024-03-01 09:00:00 UTC-03:00"
        );
    }

    #[test]
    fn unknown_zone_is_text_not_error() {
        let text = describe_time(noon(), "Mars/Olympus");
        assert!(text.starts_with("Unknown timezone: Mars/Olympus"));
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert!(resolve_timezone("+25").is_none());
        assert!(resolve_timezone("+05:75").is_none());
    }

    #[tokio::test]
    async fn tool_defaults_to_utc() {
        let out = CurrentTimeTool.execute(serde_json::json!({})).await.unwrap();
        assert!(out.starts_with("Current time in UTC: "));
    }
}
