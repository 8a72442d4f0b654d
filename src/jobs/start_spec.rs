//! Parsed job start time.
//!
//! Accepted forms:
//!
//! - `HH:MM`: every day at that time
//! - `YYYY-MM-DDTHH:MM` or `YYYY-MM-DD HH:MM`: once, on that date
//!   (every day when the job recurs daily)
//!
//! A trailing `:SS` is tolerated and ignored.  Calendar validity (month
//! length, leap years) is checked by the `time` crate at parse time.

use core::fmt;

use time::{Date, Month, PrimitiveDateTime, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSpec {
    TimeOfDay(Time),
    At(PrimitiveDateTime),
}

impl StartSpec {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some((date, clock)) = s.split_once(|c| c == 'T' || c == ' ') {
            let mut parts = date.split('-');
            let year = number(parts.next()?, 4)?;
            let month = number(parts.next()?, 2)?;
            let day = number(parts.next()?, 2)?;
            if parts.next().is_some() || year < 1970 {
                return None;
            }
            let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
            let date =
                Date::from_calendar_date(year as i32, month, u8::try_from(day).ok()?).ok()?;
            return Some(Self::At(PrimitiveDateTime::new(date, clock_time(clock)?)));
        }
        clock_time(s).map(Self::TimeOfDay)
    }

    /// Target time of day.
    pub fn time(&self) -> Time {
        match self {
            Self::TimeOfDay(t) => *t,
            Self::At(dt) => dt.time(),
        }
    }

    /// Whether `now` (local) lies within `window_secs` of the target.
    ///
    /// The comparison is within one calendar day; a target at 23:59:50
    /// does not match 00:00:10 the next day.
    pub fn matches(&self, now: PrimitiveDateTime, recurs_daily: bool, window_secs: u32) -> bool {
        let on_date = match self {
            Self::TimeOfDay(_) => true,
            Self::At(dt) => recurs_daily || dt.date() == now.date(),
        };
        on_date && seconds_of_day(now.time()).abs_diff(seconds_of_day(self.time())) <= window_secs
    }
}

impl fmt::Display for StartSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeOfDay(t) => write!(f, "{:02}:{:02}", t.hour(), t.minute()),
            Self::At(dt) => write!(
                f,
                "{:04}-{:02}-{:02}T{:02}:{:02}",
                dt.year(),
                dt.month() as u8,
                dt.day(),
                dt.hour(),
                dt.minute()
            ),
        }
    }
}

fn clock_time(s: &str) -> Option<Time> {
    let mut parts = s.split(':');
    let hour = number(parts.next()?, 2)?;
    let minute = number(parts.next()?, 2)?;
    if let Some(sec) = parts.next() {
        number(sec, 2)?;
    }
    if parts.next().is_some() {
        return None;
    }
    Time::from_hms(u8::try_from(hour).ok()?, u8::try_from(minute).ok()?, 0).ok()
}

/// Decimal field of 1..=`max_digits` ASCII digits.
fn number(s: &str, max_digits: usize) -> Option<u32> {
    if s.is_empty() || s.len() > max_digits || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn seconds_of_day(t: Time) -> u32 {
    u32::from(t.hour()) * 3600 + u32::from(t.minute()) * 60 + u32::from(t.second())
}
