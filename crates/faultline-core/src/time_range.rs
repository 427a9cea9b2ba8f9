use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_TIME_RANGE: &str = "24h";

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Trailing statistics window parsed from `<integer><h|d|w>`.
///
/// Anything outside that grammar, including values that would overflow,
/// falls back to 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    window_ms: i64,
}

impl TimeRange {
    pub const ONE_HOUR: Self = Self { window_ms: HOUR_MS };

    pub const fn default_window() -> Self {
        Self { window_ms: DAY_MS }
    }

    pub fn parse(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or_else(Self::default_window)
    }

    fn try_parse(raw: &str) -> Option<Self> {
        let unit = raw.chars().last()?;
        let digits = &raw[..raw.len() - unit.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        let value = digits.parse::<i64>().ok()?;
        let unit_ms = match unit {
            'h' => HOUR_MS,
            'd' => DAY_MS,
            'w' => WEEK_MS,
            _ => return None,
        };
        let window_ms = value.checked_mul(unit_ms)?;
        // Windows beyond chrono's representable range cannot produce a cutoff.
        Duration::try_milliseconds(window_ms)?;
        Some(Self { window_ms })
    }

    pub const fn window_ms(self) -> i64 {
        self.window_ms
    }

    pub fn window(self) -> Duration {
        Duration::try_milliseconds(self.window_ms).unwrap_or_else(|| Duration::milliseconds(DAY_MS))
    }

    /// Oldest timestamp included in the window ending at `now`.
    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::default_window()
    }
}
