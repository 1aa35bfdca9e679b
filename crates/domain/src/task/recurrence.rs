use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WardenError};
use crate::time::Timestamp;

const DAY_SECS: u64 = 24 * 60 * 60;
const DAY_MS: i64 = 86_400_000;

/// How a task repeats after firing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    None,
    Interval {
        every: Duration,
        /// IANA zone name (`Europe/Paris`) or fixed offset (`+02:00`,
        /// `UTC-5`). Whole-day intervals step by local calendar days.
        timezone: Option<String>,
    },
}

/// Resolved timezone of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl FromStr for Zone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(tz) = trimmed.parse::<Tz>() {
            return Ok(Self::Named(tz));
        }
        parse_offset(trimmed)
            .map(Self::Fixed)
            .ok_or_else(|| ValidationError::UnknownTimezone(s.to_string()))
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let rest = s
        .strip_prefix("UTC")
        .or_else(|| s.strip_prefix("GMT"))
        .unwrap_or(s);
    let (sign, rest) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl Recurrence {
    /// Build and validate an interval recurrence.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroInterval`] for intervals under one
    /// millisecond and [`ValidationError::UnknownTimezone`] when the zone
    /// cannot be resolved.
    pub fn interval(every: Duration, timezone: Option<String>) -> Result<Self, WardenError> {
        let recurrence = Self::Interval { every, timezone };
        recurrence.validate()?;
        Ok(recurrence)
    }

    /// # Errors
    ///
    /// See [`Recurrence::interval`].
    pub fn validate(&self) -> Result<(), WardenError> {
        if let Self::Interval { every, timezone } = self {
            if every.as_millis() == 0 {
                return Err(ValidationError::ZeroInterval.into());
            }
            if let Some(tz) = timezone {
                tz.parse::<Zone>()?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Interval { .. })
    }

    /// Next due time strictly after `now`, stepping from `due` in whole
    /// intervals. Returns `None` for one-shot tasks.
    ///
    /// The step count is computed directly, so a task that was due long ago
    /// fires once and lands on the next future slot. Whole-day intervals with
    /// a named zone keep the same local wall-clock time across DST changes.
    #[must_use]
    pub fn next_due_after(&self, due: Timestamp, now: Timestamp) -> Option<Timestamp> {
        let Self::Interval { every, timezone } = self else {
            return None;
        };
        let zone = timezone.as_deref().and_then(|tz| tz.parse::<Zone>().ok());
        match zone {
            Some(Zone::Named(tz)) if every.as_secs() % DAY_SECS == 0 && every.subsec_nanos() == 0 => {
                let days = i64::try_from(every.as_secs() / DAY_SECS).ok()?;
                next_calendar_slot(tz, due, now, days)
            }
            _ => next_fixed_slot(*every, due, now),
        }
    }
}

fn steps_past(step_ms: i64, due: Timestamp, now: Timestamp) -> i64 {
    let elapsed = (now - due).num_milliseconds();
    if elapsed < 0 {
        1
    } else {
        elapsed / step_ms + 1
    }
}

fn next_fixed_slot(every: Duration, due: Timestamp, now: Timestamp) -> Option<Timestamp> {
    let step_ms = i64::try_from(every.as_millis()).ok()?;
    let k = steps_past(step_ms, due, now);
    let offset = TimeDelta::try_milliseconds(step_ms.checked_mul(k)?)?;
    due.checked_add_signed(offset)
}

fn next_calendar_slot(tz: Tz, due: Timestamp, now: Timestamp, days: i64) -> Option<Timestamp> {
    let local = due.with_timezone(&tz).naive_local();
    let at = |k: i64| {
        let shift = TimeDelta::try_days(days.checked_mul(k)?)?;
        resolve_local(tz, local.checked_add_signed(shift)?)
    };
    let mut k = steps_past(days.checked_mul(DAY_MS)?, due, now);
    while at(k)? <= now {
        k = k.checked_add(1)?;
    }
    while k > 1 && at(k - 1)? > now {
        k -= 1;
    }
    at(k)
}

/// Map a local wall-clock time to UTC. Ambiguous times take the earlier
/// instant; times inside a DST gap move forward by the gap.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<Timestamp> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => Some(t.with_timezone(&Utc)),
        LocalResult::None => resolve_local(tz, local.checked_add_signed(TimeDelta::hours(1))?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn should_not_recur_when_none() {
        assert_eq!(Recurrence::None.next_due_after(utc(2024, 1, 1, 0, 0), utc(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn should_step_once_when_just_due() {
        let r = Recurrence::interval(Duration::from_secs(3600), None).unwrap();
        let due = utc(2024, 1, 1, 10, 0);
        assert_eq!(r.next_due_after(due, due), Some(utc(2024, 1, 1, 11, 0)));
    }

    #[test]
    fn should_skip_missed_slots_after_downtime() {
        let r = Recurrence::interval(Duration::from_secs(3600), None).unwrap();
        let due = utc(2024, 1, 1, 10, 0);
        let now = utc(2024, 1, 11, 10, 30);
        assert_eq!(r.next_due_after(due, now), Some(utc(2024, 1, 11, 11, 0)));
    }

    #[test]
    fn should_keep_local_time_across_dst_for_daily_alarm() {
        // 09:00 in Paris is 08:00 UTC before the March change and 07:00 after.
        let r = Recurrence::interval(Duration::from_secs(DAY_SECS), Some("Europe/Paris".into())).unwrap();
        let due = utc(2024, 3, 30, 8, 0);
        assert_eq!(r.next_due_after(due, due), Some(utc(2024, 3, 31, 7, 0)));
    }

    #[test]
    fn should_land_on_next_local_slot_after_long_downtime() {
        let r = Recurrence::interval(Duration::from_secs(DAY_SECS), Some("Europe/Paris".into())).unwrap();
        let due = utc(2024, 3, 20, 8, 0);
        let now = utc(2024, 4, 5, 12, 0);
        assert_eq!(r.next_due_after(due, now), Some(utc(2024, 4, 6, 7, 0)));
    }

    #[test]
    fn should_use_plain_arithmetic_for_fixed_offsets() {
        let r = Recurrence::interval(Duration::from_secs(DAY_SECS), Some("UTC+2".into())).unwrap();
        let due = utc(2024, 3, 30, 7, 0);
        assert_eq!(r.next_due_after(due, due), Some(utc(2024, 3, 31, 7, 0)));
    }

    #[test]
    fn should_reject_zero_interval_and_unknown_zone() {
        assert!(matches!(
            Recurrence::interval(Duration::ZERO, None),
            Err(WardenError::Validation(ValidationError::ZeroInterval))
        ));
        assert!(matches!(
            Recurrence::interval(Duration::from_secs(60), Some("Mars/Olympus".into())),
            Err(WardenError::Validation(ValidationError::UnknownTimezone(_)))
        ));
    }

    #[test]
    fn should_stop_recurring_when_calendar_step_overflows() {
        let r = Recurrence::interval(
            Duration::from_secs(DAY_SECS * 100_000_000),
            Some("Europe/Paris".into()),
        )
        .unwrap();
        let due = utc(2024, 1, 1, 9, 0);
        assert_eq!(r.next_due_after(due, due), None);
    }

    #[test]
    fn should_stop_recurring_when_fixed_step_overflows() {
        let r = Recurrence::interval(Duration::from_secs(u64::MAX / 2), None).unwrap();
        let due = utc(2024, 1, 1, 9, 0);
        assert_eq!(r.next_due_after(due, due), None);
    }

    #[test]
    fn should_parse_offsets() {
        assert_eq!(
            "+05:30".parse::<Zone>(),
            Ok(Zone::Fixed(FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()))
        );
        assert_eq!(
            "GMT-3".parse::<Zone>(),
            Ok(Zone::Fixed(FixedOffset::east_opt(-3 * 3600).unwrap()))
        );
    }
}
