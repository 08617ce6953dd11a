use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Milliseconds since the Unix epoch, saturating to zero on a clock set before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
