//! Exchange trading session calendar.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Daily trading session in exchange-local time.
///
/// The session is open on `trading_days` between `open` and `close`, both
/// inclusive. Exchange holidays are not modelled.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub timezone: Tz,
    pub trading_days: Vec<Weekday>,
}

impl Default for MarketHours {
    /// NSE cash and F&O session.
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            timezone: chrono_tz::Asia::Kolkata,
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

impl MarketHours {
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.trading_days.contains(&date.weekday())
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        let time = local.time();
        self.is_trading_day(local.date_naive()) && self.open <= time && time <= self.close
    }

    /// Time left until today's session opens.
    ///
    /// `None` when the session is already open, has already closed today, or
    /// today is not a trading day. The collector does not wait across days.
    pub fn time_until_open(&self, now: DateTime<Utc>) -> Option<Duration> {
        let today = self.local_date(now);
        if !self.is_trading_day(today) {
            return None;
        }
        let open_at = self
            .timezone
            .from_local_datetime(&today.and_time(self.open))
            .earliest()?
            .with_timezone(&Utc);
        (open_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_session_bounds_are_inclusive() {
        let hours = MarketHours::default();
        // 2025-01-06 is a Monday
        assert!(!hours.is_open(ist(2025, 1, 6, 9, 14)));
        assert!(hours.is_open(ist(2025, 1, 6, 9, 15)));
        assert!(hours.is_open(ist(2025, 1, 6, 15, 30)));
        assert!(!hours.is_open(ist(2025, 1, 6, 15, 31)));
    }

    #[test]
    fn test_weekend_is_closed() {
        let hours = MarketHours::default();
        assert!(!hours.is_open(ist(2025, 1, 4, 11, 0)));
        assert_eq!(hours.time_until_open(ist(2025, 1, 4, 8, 0)), None);
    }

    #[test]
    fn test_time_until_open() {
        let hours = MarketHours::default();
        assert_eq!(
            hours.time_until_open(ist(2025, 1, 6, 9, 0)),
            Some(Duration::from_secs(15 * 60))
        );
        assert_eq!(hours.time_until_open(ist(2025, 1, 6, 10, 0)), None);
        assert_eq!(hours.time_until_open(ist(2025, 1, 6, 16, 0)), None);
    }

    #[test]
    fn test_local_date_uses_exchange_timezone() {
        let hours = MarketHours::default();
        // 20:00 UTC on the 6th is already the 7th in India
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 20, 0, 0).unwrap();
        assert_eq!(hours.local_date(now), NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
    }
}
