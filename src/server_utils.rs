const MAX_ADDRESS_LEN: usize = 64;
const MAX_LEVEL: u32 = 10_000;

/// Player addresses are opaque ledger ids: ASCII alphanumerics only.
pub fn sanitize_address(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_ADDRESS_LEN
        || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn normalize_level(value: Option<i64>) -> u32 {
    value.unwrap_or(1).clamp(1, MAX_LEVEL as i64) as u32
}

/// Seeds are taken modulo 2^32 so any integer a client sends is usable.
pub fn normalize_seed(value: i64) -> u32 {
    value.rem_euclid(1 << 32) as u32
}

pub fn parse_query_i64(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

pub fn parse_leaderboard_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse::<usize>().ok())
}
