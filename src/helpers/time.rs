use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn now_i64() -> i64 {
    now().timestamp()
}

/// Absolute expiry for a token endpoint's relative `expires_in`.
///
/// A missing lifetime maps to the UNIX epoch, the zero-value expiry.
pub fn expiry_from_expires_in(fetched_at: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    match expires_in {
        Some(seconds) => fetched_at + Duration::seconds(seconds),
        None => DateTime::<Utc>::default(),
    }
}
