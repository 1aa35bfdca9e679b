//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for due times, log entries, message creation, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a [`std::time::Duration`] into a [`chrono::TimeDelta`], saturating
/// at the largest representable delta.
#[must_use]
pub fn delta(duration: std::time::Duration) -> chrono::TimeDelta {
    chrono::TimeDelta::from_std(duration).unwrap_or(chrono::TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_convert_std_duration_to_delta() {
        let d = delta(std::time::Duration::from_secs(90));
        assert_eq!(d.num_seconds(), 90);
    }
}
