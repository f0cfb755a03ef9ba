//! Staking period duration formatting and parsing.

use thiserror::Error;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {0:?}: expected seconds or a number with d/h/m/s suffix")]
pub struct DurationParseError(pub String);

/// Format a period duration the way the dashboard labels pools.
///
/// Whole days render as `"30 days"`; anything else falls back to the largest
/// two units (`"1d 6h"`, `"2h 30m"`, `"45s"`).
pub fn format_period(secs: u64) -> String {
    if secs >= DAY && secs % DAY == 0 {
        let days = secs / DAY;
        return if days == 1 {
            "1 day".to_string()
        } else {
            format!("{days} days")
        };
    }
    if secs < MINUTE {
        format!("{}s", secs)
    } else if secs < HOUR {
        format!("{}m {}s", secs / MINUTE, secs % MINUTE)
    } else if secs < DAY {
        format!("{}h {}m", secs / HOUR, (secs % HOUR) / MINUTE)
    } else {
        format!("{}d {}h", secs / DAY, (secs % DAY) / HOUR)
    }
}

/// Parse `"30d"`, `"12h"`, `"90m"`, `"45s"` or bare seconds into seconds.
pub fn parse_period(input: &str) -> Result<u64, DurationParseError> {
    let err = || DurationParseError(input.to_string());
    let s = input.trim();
    let (digits, unit) = match s.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&s[..idx], c.to_ascii_lowercase()),
        Some(_) => (s, 's'),
        None => return Err(err()),
    };
    let value: u64 = digits.trim().parse().map_err(|_| err())?;
    let scale = match unit {
        'd' => DAY,
        'h' => HOUR,
        'm' => MINUTE,
        's' => 1,
        _ => return Err(err()),
    };
    value.checked_mul(scale).ok_or_else(err)
}
