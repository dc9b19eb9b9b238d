use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::UnitsError;

/// A calendar of reference time units.
///
/// Aliases are folded into one variant on parsing, so `gregorian` is [`Calendar::Standard`], `365_day` is [`Calendar::NoLeap`] and `366_day` is [`Calendar::AllLeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// The mixed Julian/Gregorian calendar, with the Gregorian reform on 1582-10-15.
    #[display("standard")]
    Standard,
    /// The Gregorian calendar extended before 1582-10-15.
    #[display("proleptic_gregorian")]
    ProlepticGregorian,
    /// The Julian calendar.
    #[display("julian")]
    Julian,
    /// A calendar where every year has 365 days.
    #[display("noleap")]
    NoLeap,
    /// A calendar where every year has 366 days.
    #[display("all_leap")]
    AllLeap,
    /// A calendar where every month has 30 days.
    #[display("360_day")]
    #[serde(rename = "360_day")]
    Day360,
}

impl std::str::FromStr for Calendar {
    type Err = UnitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "julian" => Ok(Self::Julian),
            "noleap" | "no_leap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            _ => Err(UnitsError::UnknownCalendar(s.to_string())),
        }
    }
}

const SECONDS_PER_DAY: f64 = 86400.0;

/// The Julian day number of 1582-10-15, the first day of the Gregorian calendar.
const GREGORIAN_REFORM: i64 = 2_299_161;

const DAYS_BEFORE_MONTH: [u32; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

/// A civil date and time of day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Date {
    year: i64,
    month: u32,
    day: u32,
    second: f64,
}

impl Date {
    /// Create a date at midnight.
    #[must_use]
    pub fn new(year: i64, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            second: 0.0,
        }
    }

    /// Set the time of day in seconds since midnight.
    #[must_use]
    pub fn with_second(mut self, second: f64) -> Self {
        self.second = second;
        self
    }

    /// The year.
    #[must_use]
    pub fn year(&self) -> i64 {
        self.year
    }

    /// The month, from 1.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The day of the month, from 1.
    #[must_use]
    pub fn day(&self) -> u32 {
        self.day
    }

    /// The seconds since midnight.
    #[must_use]
    pub fn second(&self) -> f64 {
        self.second
    }

    /// Parse a date such as `1970-1-1`, `2000-01-01 12:00:00`, or `2000-01-01T00:00:00Z`.
    ///
    /// # Errors
    /// Returns [`UnitsError::InvalidDate`] if `text` is not a date.
    pub fn parse(text: &str) -> Result<Self, UnitsError> {
        let invalid = || UnitsError::InvalidDate(text.to_string());
        let text = text.trim();
        let text = ["UTC", "GMT", "Z"]
            .iter()
            .find_map(|zone| text.strip_suffix(zone))
            .unwrap_or(text)
            .trim_end();
        let (date, time) = match text.split_once(&['T', ' '][..]) {
            Some((date, time)) => (date, Some(time.trim())),
            None => (text, None),
        };

        let (negative, date) = match date.strip_prefix('-') {
            Some(date) => (true, date),
            None => (false, date),
        };
        let mut fields = date.split('-');
        let year: i64 = fields.next().and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
        let month: u32 = match fields.next() {
            Some(m) => m.parse().map_err(|_| invalid())?,
            None => 1,
        };
        let day: u32 = match fields.next() {
            Some(d) => d.parse().map_err(|_| invalid())?,
            None => 1,
        };
        if fields.next().is_some() || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }
        let year = if negative { -year } else { year };

        let second = match time {
            Some(time) if !time.is_empty() => {
                let mut fields = time.split(':');
                let mut second = 0.0;
                for (scale, field) in [3600.0, 60.0, 1.0].into_iter().zip(fields.by_ref()) {
                    let value: f64 = field.parse().map_err(|_| invalid())?;
                    second += value * scale;
                }
                if fields.next().is_some() {
                    return Err(invalid());
                }
                second
            }
            _ => 0.0,
        };
        Ok(Self::new(year, month, day).with_second(second))
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}-{:02}", self.year, self.month, self.day)?;
        if self.second != 0.0 {
            let hour = (self.second / 3600.0).floor();
            let minute = ((self.second - hour * 3600.0) / 60.0).floor();
            let second = self.second - hour * 3600.0 - minute * 60.0;
            write!(f, " {hour:02}:{minute:02}:{second:02}")?;
        }
        Ok(())
    }
}

fn julian_day_number(year: i64, month: u32, day: u32, gregorian: bool) -> i64 {
    let a = (14 - i64::from(month)) / 12;
    let y = year + 4800 - a;
    let m = i64::from(month) + 12 * a - 3;
    let days = i64::from(day) + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4);
    if gregorian {
        days - y.div_euclid(100) + y.div_euclid(400) - 32045
    } else {
        days - 32083
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn date_from_julian_day_number(jdn: i64, gregorian: bool) -> Date {
    let (b, c) = if gregorian {
        let a = jdn + 32044;
        let b = (4 * a + 3).div_euclid(146_097);
        (b, a - (146_097 * b).div_euclid(4))
    } else {
        (0, jdn + 32082)
    };
    let d = (4 * c + 3).div_euclid(1461);
    let e = c - (1461 * d).div_euclid(4);
    let m = (5 * e + 2).div_euclid(153);
    let day = e - (153 * m + 2).div_euclid(5) + 1;
    let month = m + 3 - 12 * m.div_euclid(10);
    let year = 100 * b + d - 4800 + m.div_euclid(10);
    Date::new(year, month as u32, day as u32)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
impl Calendar {
    /// Returns true if the calendars count days identically.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self == other
    }

    /// Returns true if `year` is a leap year.
    #[must_use]
    pub fn is_leap_year(&self, year: i64) -> bool {
        let julian = year.rem_euclid(4) == 0;
        let gregorian = julian && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0);
        match self {
            Self::Standard => {
                if year > 1582 {
                    gregorian
                } else {
                    julian
                }
            }
            Self::ProlepticGregorian => gregorian,
            Self::Julian => julian,
            Self::NoLeap | Self::Day360 => false,
            Self::AllLeap => true,
        }
    }

    /// The number of days in `month` of `year`.
    #[must_use]
    pub fn days_in_month(&self, year: i64, month: u32) -> u32 {
        if *self == Self::Day360 {
            return 30;
        }
        let month = month.clamp(1, 12) as usize;
        let days = DAYS_BEFORE_MONTH[month] - DAYS_BEFORE_MONTH[month - 1];
        if month == 2 && self.is_leap_year(year) {
            days + 1
        } else {
            days
        }
    }

    /// The number of days from the calendar's epoch to `date`.
    ///
    /// Only differences between day numbers of the same calendar are meaningful.
    ///
    /// # Errors
    /// Returns [`UnitsError::InvalidDate`] if `date` does not exist in the calendar.
    pub fn day_number(&self, date: &Date) -> Result<i64, UnitsError> {
        let invalid = || UnitsError::InvalidDate(format!("{date} in the {self} calendar"));
        if !(1..=12).contains(&date.month)
            || date.day < 1
            || date.day > self.days_in_month(date.year, date.month)
        {
            return Err(invalid());
        }
        let (year, month, day) = (date.year, date.month, date.day);
        let day_of_year = |leap: bool| {
            let leap_day = u32::from(leap && month > 2);
            i64::from(DAYS_BEFORE_MONTH[month as usize - 1] + leap_day + day - 1)
        };
        Ok(match self {
            Self::Standard => {
                let jdn = julian_day_number(year, month, day, true);
                if jdn >= GREGORIAN_REFORM {
                    jdn
                } else if (year, month, day) <= (1582, 10, 4) {
                    julian_day_number(year, month, day, false)
                } else {
                    return Err(invalid());
                }
            }
            Self::ProlepticGregorian => julian_day_number(year, month, day, true),
            Self::Julian => julian_day_number(year, month, day, false),
            Self::NoLeap => year * 365 + day_of_year(false),
            Self::AllLeap => year * 366 + day_of_year(true),
            Self::Day360 => year * 360 + i64::from((month - 1) * 30 + day - 1),
        })
    }

    /// The date of a day number.
    #[must_use]
    pub fn date(&self, day_number: i64) -> Date {
        let from_day_of_year = |year: i64, day_of_year: i64, leap: bool| {
            let month = (1..=12)
                .rev()
                .find(|&m| {
                    let leap_day = i64::from(leap && m > 2);
                    i64::from(DAYS_BEFORE_MONTH[m as usize - 1]) + leap_day <= day_of_year
                })
                .unwrap_or(1);
            let leap_day = i64::from(leap && month > 2);
            let day = day_of_year - i64::from(DAYS_BEFORE_MONTH[month as usize - 1]) - leap_day;
            Date::new(year, month, day as u32 + 1)
        };
        match self {
            Self::Standard => date_from_julian_day_number(day_number, day_number >= GREGORIAN_REFORM),
            Self::ProlepticGregorian => date_from_julian_day_number(day_number, true),
            Self::Julian => date_from_julian_day_number(day_number, false),
            Self::NoLeap => from_day_of_year(
                day_number.div_euclid(365),
                day_number.rem_euclid(365),
                false,
            ),
            Self::AllLeap => from_day_of_year(
                day_number.div_euclid(366),
                day_number.rem_euclid(366),
                true,
            ),
            Self::Day360 => {
                let day_of_year = day_number.rem_euclid(360);
                Date::new(
                    day_number.div_euclid(360),
                    (day_of_year / 30) as u32 + 1,
                    (day_of_year % 30) as u32 + 1,
                )
            }
        }
    }

    /// The number of seconds from the calendar's epoch to `date`.
    ///
    /// # Errors
    /// Returns [`UnitsError::InvalidDate`] if `date` does not exist in the calendar.
    pub fn seconds(&self, date: &Date) -> Result<f64, UnitsError> {
        Ok(self.day_number(date)? as f64 * SECONDS_PER_DAY + date.second)
    }

    /// The date of a number of seconds from the calendar's epoch.
    #[must_use]
    pub fn date_from_seconds(&self, seconds: f64) -> Date {
        let days = (seconds / SECONDS_PER_DAY).floor();
        self.date(days as i64)
            .with_second(seconds - days * SECONDS_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_names() {
        assert_eq!("gregorian".parse::<Calendar>().unwrap(), Calendar::Standard);
        assert_eq!("365_day".parse::<Calendar>().unwrap(), Calendar::NoLeap);
        assert_eq!("360_day".parse::<Calendar>().unwrap(), Calendar::Day360);
        assert_eq!(Calendar::Day360.to_string(), "360_day");
        assert!("lunar".parse::<Calendar>().is_err());
    }

    #[test]
    fn date_parse() {
        let date = Date::parse("2000-1-2 06:30:00").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2000, 1, 2));
        assert_eq!(date.second(), 23400.0);
        assert_eq!(Date::parse("1970-01-01T00:00:00Z").unwrap(), Date::new(1970, 1, 1));
        assert_eq!(Date::parse("1850").unwrap(), Date::new(1850, 1, 1));
        assert!(Date::parse("2000-13-01").is_err());
        assert!(Date::parse("yesterday").is_err());
    }

    #[test]
    fn julian_day_numbers() {
        let standard = Calendar::Standard;
        assert_eq!(standard.day_number(&Date::new(2000, 1, 1)).unwrap(), 2_451_545);
        assert_eq!(
            standard.day_number(&Date::new(1582, 10, 15)).unwrap()
                - standard.day_number(&Date::new(1582, 10, 4)).unwrap(),
            1
        );
        assert!(standard.day_number(&Date::new(1582, 10, 10)).is_err());
        assert_eq!(standard.date(2_451_545), Date::new(2000, 1, 1));
        assert_eq!(standard.date(2_299_160), Date::new(1582, 10, 4));
    }

    #[test]
    fn day_number_round_trip() {
        for calendar in [
            Calendar::Standard,
            Calendar::ProlepticGregorian,
            Calendar::Julian,
            Calendar::NoLeap,
            Calendar::AllLeap,
            Calendar::Day360,
        ] {
            for date in [
                Date::new(1, 1, 1),
                Date::new(1900, 2, 28),
                Date::new(2000, 12, 30),
                Date::new(2024, 3, 1),
            ] {
                let day_number = calendar.day_number(&date).unwrap();
                assert_eq!(calendar.date(day_number), date, "{calendar}");
            }
        }
    }

    #[test]
    fn month_lengths() {
        assert_eq!(Calendar::Day360.days_in_month(2001, 2), 30);
        assert_eq!(Calendar::NoLeap.days_in_month(2000, 2), 28);
        assert_eq!(Calendar::AllLeap.days_in_month(2001, 2), 29);
        assert_eq!(Calendar::Standard.days_in_month(1900, 2), 28);
        assert_eq!(Calendar::Julian.days_in_month(1900, 2), 29);
        assert!(Calendar::Day360.day_number(&Date::new(2000, 2, 30)).is_ok());
        assert!(Calendar::Standard.day_number(&Date::new(2000, 2, 30)).is_err());
    }
}
