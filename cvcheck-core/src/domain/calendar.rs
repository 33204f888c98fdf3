// cvcheck-core/src/domain/calendar.rs

// CF time arithmetic: "<unit> since <reference date>" plus a calendar name.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::ports::CalendarDate;

pub const DEFAULT_CALENDAR: &str = "standard";

const SECONDS_PER_DAY: i64 = 86_400;
const NOLEAP_MONTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const ALL_LEAP_MONTHS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    Gregorian,
    NoLeap,
    AllLeap,
    Day360,
}

impl Calendar {
    pub fn parse(name: &str) -> Result<Self, String> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Self::Gregorian),
            "noleap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            other => Err(format!("unsupported calendar '{}'", other)),
        }
    }

    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        let index = (month.clamp(1, 12) - 1) as usize;
        match self {
            Self::Gregorian => {
                if month == 2 && NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                    29
                } else {
                    NOLEAP_MONTHS[index]
                }
            }
            Self::NoLeap => NOLEAP_MONTHS[index],
            Self::AllLeap => ALL_LEAP_MONTHS[index],
            Self::Day360 => 30,
        }
    }

    fn validate(self, date: &CalendarDate) -> Result<(), String> {
        let valid = (1..=12).contains(&date.month)
            && date.day >= 1
            && date.day <= self.days_in_month(date.year, date.month)
            && date.hour < 24
            && date.minute < 60
            && date.second < 60;
        if valid {
            Ok(())
        } else {
            Err(format!("date {} does not exist", date))
        }
    }

    /// Seconds since a calendar-specific origin. Only differences between two
    /// values of the same calendar are meaningful.
    fn to_seconds(self, date: &CalendarDate) -> Result<i64, String> {
        self.validate(date)?;
        let time_of_day =
            i64::from(date.hour) * 3600 + i64::from(date.minute) * 60 + i64::from(date.second);

        if self == Self::Gregorian {
            let at: NaiveDateTime = NaiveDate::from_ymd_opt(date.year, date.month, date.day)
                .and_then(|d| d.and_hms_opt(date.hour, date.minute, date.second))
                .ok_or_else(|| format!("date {} does not exist", date))?;
            return Ok(at.signed_duration_since(gregorian_origin()?).num_seconds());
        }

        let months = self.month_lengths();
        let year_days: i64 = months.iter().map(|m| i64::from(*m)).sum();
        let day_of_year: i64 = months[..(date.month - 1) as usize]
            .iter()
            .map(|m| i64::from(*m))
            .sum::<i64>()
            + i64::from(date.day - 1);
        Ok((i64::from(date.year) * year_days + day_of_year) * SECONDS_PER_DAY + time_of_day)
    }

    fn from_seconds(self, seconds: i64) -> Result<CalendarDate, String> {
        let out_of_range = || format!("offset of {} seconds is out of range", seconds);

        if self == Self::Gregorian {
            let delta = TimeDelta::try_seconds(seconds).ok_or_else(out_of_range)?;
            let t = gregorian_origin()?
                .checked_add_signed(delta)
                .ok_or_else(out_of_range)?;
            return Ok(from_naive(&t));
        }

        let months = self.month_lengths();
        let year_days: i64 = months.iter().map(|m| i64::from(*m)).sum();
        let days = seconds.div_euclid(SECONDS_PER_DAY);
        let second_of_day = seconds.rem_euclid(SECONDS_PER_DAY);

        let year = i32::try_from(days.div_euclid(year_days)).map_err(|_| out_of_range())?;
        let mut remaining = days.rem_euclid(year_days);
        let mut month = 1u32;
        for length in months {
            let length = i64::from(length);
            if remaining < length {
                break;
            }
            remaining -= length;
            month += 1;
        }

        Ok(CalendarDate::new(year, month, remaining as u32 + 1)
            .with_time(
                (second_of_day / 3600) as u32,
                ((second_of_day % 3600) / 60) as u32,
            )
            .with_second((second_of_day % 60) as u32))
    }

    /// Month lengths of the fixed-length calendars.
    fn month_lengths(self) -> [u32; 12] {
        match self {
            Self::NoLeap | Self::Gregorian => NOLEAP_MONTHS,
            Self::AllLeap => ALL_LEAP_MONTHS,
            Self::Day360 => [30; 12],
        }
    }

    /// Moves `date` forward by `step`. Month and year steps keep the day of
    /// month, clamped to the length of the target month.
    pub fn add(self, date: &CalendarDate, step: Step) -> Result<CalendarDate, String> {
        let amount = i64::from(step.amount);
        let months = match step.unit {
            StepUnit::Months => amount,
            StepUnit::Years => amount * 12,
            fixed => {
                let seconds = self.to_seconds(date)? + amount * fixed.seconds();
                return self.from_seconds(seconds);
            }
        };

        let total = i64::from(date.year) * 12 + i64::from(date.month - 1) + months;
        let year = i32::try_from(total.div_euclid(12))
            .map_err(|_| format!("{} + {} is out of range", date, step))?;
        let month = total.rem_euclid(12) as u32 + 1;
        let day = date.day.min(self.days_in_month(year, month));
        Ok(CalendarDate {
            year,
            month,
            day,
            ..*date
        })
    }
}

fn gregorian_origin() -> Result<NaiveDateTime, String> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| "gregorian origin is not representable".to_string())
}

fn from_naive(t: &NaiveDateTime) -> CalendarDate {
    use chrono::{Datelike, Timelike};
    CalendarDate::new(t.year(), t.month(), t.day())
        .with_time(t.hour(), t.minute())
        .with_second(t.second())
}

// --- STEPS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Months,
    Years,
}

impl StepUnit {
    /// Length in seconds of the fixed units. Zero for months and years.
    fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3600,
            Self::Days => SECONDS_PER_DAY,
            Self::Months | Self::Years => 0,
        }
    }

    pub fn is_fixed(self) -> bool {
        !matches!(self, Self::Months | Self::Years)
    }
}

/// A time increment such as `30m`, `3h`, `1D`, `1M` or `10Y`.
/// Lower-case `m` is minutes, upper-case `M` is months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub amount: u32,
    pub unit: StepUnit,
}

impl Step {
    pub fn parse(token: &str) -> Result<Self, String> {
        let token = token.trim();
        let bad = || format!("invalid time step '{}'", token);
        let split = token.find(|c: char| !c.is_ascii_digit()).ok_or_else(bad)?;
        let (digits, suffix) = token.split_at(split);
        let amount: u32 = digits.parse().map_err(|_| bad())?;
        let unit = match suffix.trim() {
            "s" => StepUnit::Seconds,
            "m" => StepUnit::Minutes,
            "h" => StepUnit::Hours,
            "D" => StepUnit::Days,
            "M" => StepUnit::Months,
            "Y" => StepUnit::Years,
            _ => return Err(bad()),
        };
        if amount == 0 {
            return Err(bad());
        }
        Ok(Self { amount, unit })
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffix = match self.unit {
            StepUnit::Seconds => "s",
            StepUnit::Minutes => "m",
            StepUnit::Hours => "h",
            StepUnit::Days => "D",
            StepUnit::Months => "M",
            StepUnit::Years => "Y",
        };
        write!(f, "{}{}", self.amount, suffix)
    }
}

// --- UNITS ---

/// Parsed `"<unit> since <reference date>"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    seconds_per_unit: f64,
    pub reference: CalendarDate,
}

impl TimeUnits {
    pub fn parse(units: &str) -> Result<Self, String> {
        let (unit, reference) = units
            .split_once(" since ")
            .ok_or_else(|| format!("units '{}' are not of the form '<unit> since <date>'", units))?;
        Ok(Self {
            seconds_per_unit: unit_seconds(unit.trim())?,
            reference: parse_reference(reference)?,
        })
    }
}

fn unit_seconds(unit: &str) -> Result<f64, String> {
    match unit.to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => Ok(1.0),
        "minutes" | "minute" | "mins" | "min" => Ok(60.0),
        "hours" | "hour" | "hrs" | "hr" | "h" => Ok(3600.0),
        "days" | "day" | "d" => Ok(SECONDS_PER_DAY as f64),
        other => Err(format!("unsupported time unit '{}'", other)),
    }
}

/// Parses the reference date: `YYYY-M-D`, optionally followed by a time of
/// day (`T` or space separated, fractional seconds dropped) and a trailing
/// `Z`/`UTC`.
fn parse_reference(text: &str) -> Result<CalendarDate, String> {
    let bad = || format!("invalid reference date '{}'", text);
    let text = text.trim();
    let text = text
        .strip_suffix("UTC")
        .or_else(|| text.strip_suffix('Z'))
        .unwrap_or(text)
        .trim();

    let (date, time) = match text.split_once(['T', ' ']) {
        Some((d, t)) => (d, Some(t.trim())),
        None => (text, None),
    };

    // A leading '-' belongs to the year.
    let (sign, date) = match date.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, date),
    };
    let mut parts = date.split('-');
    let year: i32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let month: u32 = parts.next().map_or(Ok(1), |p| p.parse()).map_err(|_| bad())?;
    let day: u32 = parts.next().map_or(Ok(1), |p| p.parse()).map_err(|_| bad())?;
    if parts.next().is_some() || !(1..=12).contains(&month) || day == 0 {
        return Err(bad());
    }

    let (hour, minute, second) = match time.filter(|t| !t.is_empty()) {
        Some(t) => {
            let mut hms = t.split(':');
            let hour: u32 = hms.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
            let minute: u32 = hms.next().map_or(Ok(0), |p| p.parse()).map_err(|_| bad())?;
            let second: f64 = hms.next().map_or(Ok(0.0), |p| p.parse()).map_err(|_| bad())?;
            (hour, minute, second.trunc() as u32)
        }
        None => (0, 0, 0),
    };
    if hour > 23 || minute > 59 || second > 59 {
        return Err(bad());
    }

    Ok(CalendarDate::new(sign * year, month, day)
        .with_time(hour, minute)
        .with_second(second))
}

// --- ENCODE / DECODE ---

/// Decodes raw offsets into calendar dates, to the second.
pub fn decode(values: &[f64], units: &str, calendar: &str) -> Result<Vec<CalendarDate>, String> {
    let units = TimeUnits::parse(units)?;
    let calendar = Calendar::parse(calendar)?;
    let origin = calendar.to_seconds(&units.reference)?;

    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                return Err(format!("non-finite time value {}", v));
            }
            let offset = (v * units.seconds_per_unit).round() as i64;
            let seconds = origin
                .checked_add(offset)
                .ok_or_else(|| format!("offset {} is out of range", v))?;
            calendar.from_seconds(seconds)
        })
        .collect()
}

/// Offset of `date` from the reference date, in the units' unit.
pub fn encode(date: &CalendarDate, units: &TimeUnits, calendar: Calendar) -> Result<f64, String> {
    let origin = calendar.to_seconds(&units.reference)?;
    let at = calendar.to_seconds(date)?;
    Ok((at - origin) as f64 / units.seconds_per_unit)
}
