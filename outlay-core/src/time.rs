//! Time utilities: occurrence stepping and timezone-aware daily firing.

use anyhow::Result;
use chrono::{DateTime, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::recurring::Frequency;

/// Advance `date` by one occurrence interval.
///
/// Monthly steps keep the day-of-month where it exists and clamp to the last day of
/// the target month otherwise (Jan 31 -> Feb 28/29). Saturates at `NaiveDate::MAX`.
pub fn step(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    let next = match frequency {
        Frequency::Weekly => date.checked_add_days(Days::new(7)),
        Frequency::Monthly => date.checked_add_months(Months::new(1)),
    };
    next.unwrap_or(NaiveDate::MAX)
}

/// Parse an IANA timezone name like "America/Chicago".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Parse a local wall-clock time like "00:05".
pub fn parse_wall_time(hhmm: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(hhmm.trim(), "%H:%M")
        .map_err(|e| anyhow::anyhow!("invalid time of day '{hhmm}': {e}"))
}

/// Calendar date of `now` as seen in `tz`.
pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Next instant strictly after `now` at which the local clock in `tz` reads `at`.
pub fn next_daily_fire(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
    let today = local_today(now, tz);
    let candidate = resolve_local(tz, today.and_time(at));
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.succ_opt().unwrap_or(today);
    resolve_local(tz, tomorrow.and_time(at))
}

/// Map a wall time to UTC. Ambiguous times (DST fall-back) take the earlier instant;
/// non-existent times (DST spring-forward) move to the first valid minute after.
fn resolve_local(tz: Tz, wall: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = wall;
    for _ in 0..=24 * 60 {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
        candidate = candidate + Duration::minutes(1);
    }
    Utc.from_utc_datetime(&wall)
}
