use std::time::Duration;

use chrono::Utc;

/// The current time as unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The unix-millisecond instant at which a lease taken now for `lease` runs out.
pub fn lease_expiry_ms(lease: Duration) -> i64 {
    let lease = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
    now_ms().saturating_add(lease)
}
