#[must_use]
pub(super) fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[must_use]
pub(super) fn parse_u16(raw: Option<String>) -> Option<u16> {
    raw.and_then(|raw| raw.trim().parse::<u16>().ok())
}

#[must_use]
pub(super) fn parse_u32_min(raw: Option<String>, min_value: u32) -> Option<u32> {
    raw.and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|value| *value >= min_value)
}

#[must_use]
pub(super) fn parse_u64_min(raw: Option<String>, min_value: u64) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value >= min_value)
}

#[must_use]
pub(super) fn parse_usize_min(raw: Option<String>, min_value: usize) -> Option<usize> {
    raw.and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value >= min_value)
}

#[must_use]
pub(super) fn parse_log_level(raw: Option<String>) -> Option<String> {
    let level = non_empty(raw)?.to_ascii_lowercase();
    matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error").then_some(level)
}
