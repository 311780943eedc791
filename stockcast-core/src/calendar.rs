//! Session calendar: which minutes are valid trading minutes.
//!
//! A session is one trading day's window `[start, end]`, both ends inclusive.
//! Sessions never span midnight, so the calendar date of a minute identifies
//! its session.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Trading hours and trading weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCalendar {
    start: NaiveTime,
    end: NaiveTime,
    /// Indexed by `Weekday::num_days_from_monday()`.
    weekdays: [bool; 7],
}

impl SessionCalendar {
    /// Build a calendar, rejecting sessions that would span midnight or have
    /// no trading days.
    pub fn new(start: NaiveTime, end: NaiveTime, weekdays: &[Weekday]) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::invalid(
                "session",
                format!("start {start} must be before end {end}"),
            ));
        }
        for (name, t) in [("session_start_time", start), ("session_end_time", end)] {
            if t.second() != 0 || t.nanosecond() != 0 {
                return Err(ConfigError::invalid(
                    name,
                    format!("{t} is not on a minute boundary"),
                ));
            }
        }
        if weekdays.is_empty() {
            return Err(ConfigError::invalid("valid_weekdays", "at least one weekday is required"));
        }

        let mut days = [false; 7];
        for day in weekdays {
            days[day.num_days_from_monday() as usize] = true;
        }

        Ok(Self {
            start,
            end,
            weekdays: days,
        })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Trading weekdays, Monday first.
    pub fn weekdays(&self) -> Vec<Weekday> {
        const ORDER: [Weekday; 7] = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        ORDER
            .into_iter()
            .filter(|d| self.weekdays[d.num_days_from_monday() as usize])
            .collect()
    }

    /// Number of minutes in one full session, both ends included (376 for 09:15 to 15:30).
    pub fn minutes_per_session(&self) -> i64 {
        (self.end - self.start).num_minutes() + 1
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.weekdays[date.weekday().num_days_from_monday() as usize]
    }

    /// True when `ts` falls inside a trading session.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let t = ts.time();
        self.is_trading_day(ts.date()) && t >= self.start && t <= self.end
    }

    /// The session `ts` belongs to, if any.
    pub fn session_of(&self, ts: NaiveDateTime) -> Option<NaiveDate> {
        self.contains(ts).then(|| ts.date())
    }

    /// Every trading minute in `[from, to]`, ascending.
    ///
    /// `from` and `to` are expected on minute boundaries; sub-minute parts are
    /// carried into the first minute of the range unchanged.
    pub fn trading_minutes(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> impl Iterator<Item = NaiveDateTime> + '_ {
        let last_day = to.date();
        from.date()
            .iter_days()
            .take_while(move |day| *day <= last_day)
            .filter(move |day| self.is_trading_day(*day))
            .flat_map(move |day| {
                let open = day.and_time(self.start).max(from);
                let close = day.and_time(self.end).min(to);
                let count = if close >= open {
                    (close - open).num_minutes() + 1
                } else {
                    0
                };
                (0..count).map(move |i| open + Duration::minutes(i))
            })
    }
}

impl Default for SessionCalendar {
    /// 09:15–15:30, Monday to Friday.
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            weekdays: [true, true, true, true, true, false, false],
        }
    }
}

/// Parse a session bound written as `HH:MM` or `HH:MM:SS`.
pub fn parse_session_time(option: &'static str, s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| ConfigError::invalid(option, format!("'{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, hm: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {hm}"), "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn default_is_nse_hours_on_weekdays() {
        let cal = SessionCalendar::default();
        assert_eq!(cal.minutes_per_session(), 376);
        assert_eq!(
            cal.weekdays(),
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        );
    }

    #[test]
    fn minutes_per_session_matches_enumeration() {
        let cal = SessionCalendar::default();
        let minutes = cal
            .trading_minutes(at("2021-01-04", "00:00"), at("2021-01-04", "23:59"))
            .count();
        assert_eq!(minutes as i64, cal.minutes_per_session());
    }

    #[test]
    fn contains_is_inclusive_at_both_ends() {
        let cal = SessionCalendar::default();
        // 2021-01-04 is a Monday.
        assert!(!cal.contains(at("2021-01-04", "09:14")));
        assert!(cal.contains(at("2021-01-04", "09:15")));
        assert!(cal.contains(at("2021-01-04", "15:30")));
        assert!(!cal.contains(at("2021-01-04", "15:31")));
        // Saturday
        assert!(!cal.contains(at("2021-01-09", "10:00")));
    }

    #[test]
    fn session_of_is_calendar_date() {
        let cal = SessionCalendar::default();
        let d = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        assert_eq!(cal.session_of(at("2021-01-04", "11:00")), Some(d));
        assert_eq!(cal.session_of(at("2021-01-04", "08:00")), None);
    }

    #[test]
    fn trading_minutes_within_one_session() {
        let cal = SessionCalendar::default();
        let minutes: Vec<_> = cal
            .trading_minutes(at("2021-01-04", "09:15"), at("2021-01-04", "09:27"))
            .collect();
        assert_eq!(minutes.len(), 13);
        assert_eq!(minutes[0], at("2021-01-04", "09:15"));
        assert_eq!(minutes[12], at("2021-01-04", "09:27"));
    }

    #[test]
    fn trading_minutes_skip_nights_and_weekends() {
        let cal = SessionCalendar::default();
        // Friday 15:29 → Monday 09:16
        let minutes: Vec<_> = cal
            .trading_minutes(at("2021-01-08", "15:29"), at("2021-01-11", "09:16"))
            .collect();
        assert_eq!(
            minutes,
            vec![
                at("2021-01-08", "15:29"),
                at("2021-01-08", "15:30"),
                at("2021-01-11", "09:15"),
                at("2021-01-11", "09:16"),
            ]
        );
    }

    #[test]
    fn trading_minutes_clip_out_of_session_bounds() {
        let cal = SessionCalendar::default();
        let minutes: Vec<_> = cal
            .trading_minutes(at("2021-01-04", "08:00"), at("2021-01-04", "09:16"))
            .collect();
        assert_eq!(minutes, vec![at("2021-01-04", "09:15"), at("2021-01-04", "09:16")]);

        let none: Vec<_> = cal
            .trading_minutes(at("2021-01-04", "16:00"), at("2021-01-04", "17:00"))
            .collect();
        assert!(none.is_empty());
    }

    #[test]
    fn rejects_session_spanning_midnight() {
        let start = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        assert!(SessionCalendar::new(start, end, &[Weekday::Mon]).is_err());
    }

    #[test]
    fn rejects_empty_weekdays_and_unaligned_bounds() {
        let start = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
        let end = NaiveTime::from_hms_opt(15, 30, 0).unwrap();
        assert!(SessionCalendar::new(start, end, &[]).is_err());

        let unaligned = NaiveTime::from_hms_opt(9, 15, 30).unwrap();
        assert!(SessionCalendar::new(unaligned, end, &[Weekday::Mon]).is_err());
    }

    #[test]
    fn parses_hh_mm_and_hh_mm_ss() {
        assert_eq!(
            parse_session_time("session_start_time", "09:15").unwrap(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap()
        );
        assert_eq!(
            parse_session_time("session_end_time", "15:30:00").unwrap(),
            NaiveTime::from_hms_opt(15, 30, 0).unwrap()
        );
        assert!(parse_session_time("session_end_time", "3pm").is_err());
    }
}
