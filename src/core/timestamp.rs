use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn utc_ns_now() -> u64 {
    system_time_to_utc_ns(SystemTime::now())
}

/// Times before the epoch collapse to 0.
pub fn system_time_to_utc_ns(t: SystemTime) -> u64 {
    let d = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64
}

pub fn format_utc_ns(utc_ns: u64) -> String {
    let seconds = utc_ns / 1_000_000_000;
    let nanos = utc_ns % 1_000_000_000;
    format!("{}.{:09}", seconds, nanos)
}

pub fn days(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 24 * 60 * 60)
}
