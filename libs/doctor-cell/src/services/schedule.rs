use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use std::fmt;
use thiserror::Error;

/// Unparseable availability string. Distinct from a slot merely falling
/// outside the parsed window, which is a `SlotRejection`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable availability rule: {0}")]
pub struct ScheduleFormatError(pub String);

/// Structured weekly availability window parsed from a doctor's free-text
/// rule string, e.g. "Mon-Fri, 9 AM - 5 PM". Day indices follow
/// Monday = 0 .. Sunday = 6; the time window is half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityRule {
    pub start_day: Weekday,
    pub end_day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Why a candidate slot was refused. Callers surface the distinct reason,
/// never a generic failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRejection {
    OutsideDays {
        requested: Weekday,
        start: Weekday,
        end: Weekday,
    },
    OutsideHours {
        requested: NaiveTime,
        start: NaiveTime,
        end: NaiveTime,
    },
}

impl fmt::Display for SlotRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRejection::OutsideDays { requested, start, end } => write!(
                f,
                "{} is outside the doctor's working days ({}-{})",
                day_abbrev(*requested),
                day_abbrev(*start),
                day_abbrev(*end)
            ),
            SlotRejection::OutsideHours { requested, start, end } => write!(
                f,
                "{} is outside the doctor's working hours ({} - {})",
                requested.format("%H:%M"),
                render_hour(*start),
                render_hour(*end)
            ),
        }
    }
}

const DAY_ABBREVS: [(&str, Weekday); 7] = [
    ("Mon", Weekday::Mon),
    ("Tue", Weekday::Tue),
    ("Wed", Weekday::Wed),
    ("Thu", Weekday::Thu),
    ("Fri", Weekday::Fri),
    ("Sat", Weekday::Sat),
    ("Sun", Weekday::Sun),
];

fn day_abbrev(day: Weekday) -> &'static str {
    DAY_ABBREVS
        .iter()
        .find(|(_, d)| *d == day)
        .map(|(abbrev, _)| *abbrev)
        .unwrap_or("Mon")
}

fn parse_day(token: &str) -> Result<Weekday, ScheduleFormatError> {
    DAY_ABBREVS
        .iter()
        .find(|(abbrev, _)| *abbrev == token)
        .map(|(_, day)| *day)
        .ok_or_else(|| ScheduleFormatError(format!("unrecognized day abbreviation '{}'", token)))
}

/// Parse a "<h> AM|PM" token. Exact token matching only, no normalization.
fn parse_hour(token: &str) -> Result<NaiveTime, ScheduleFormatError> {
    let bad = || ScheduleFormatError(format!("time token '{}' does not match '<h> AM|PM'", token));

    let (hour_part, meridiem) = token.split_once(' ').ok_or_else(bad)?;
    let hour: u32 = hour_part.parse().map_err(|_| bad())?;
    if hour < 1 || hour > 12 {
        return Err(bad());
    }

    let hour24 = match meridiem {
        "AM" => hour % 12,
        "PM" => hour % 12 + 12,
        _ => return Err(bad()),
    };

    NaiveTime::from_hms_opt(hour24, 0, 0).ok_or_else(bad)
}

fn render_hour(time: NaiveTime) -> String {
    let (is_pm, hour12) = time.hour12();
    format!("{} {}", hour12, if is_pm { "PM" } else { "AM" })
}

impl AvailabilityRule {
    /// Parse "<StartDay>-<EndDay>, <StartHour> <AM|PM> - <EndHour> <AM|PM>".
    ///
    /// Day ranges never wrap across the week boundary: a rule like
    /// "Fri-Mon" is malformed input, not a window. Likewise the time
    /// window must strictly increase.
    pub fn parse(input: &str) -> Result<Self, ScheduleFormatError> {
        let (days_part, hours_part) = input
            .split_once(", ")
            .ok_or_else(|| ScheduleFormatError("missing ', ' separator".to_string()))?;

        let (start_day_token, end_day_token) = days_part
            .split_once('-')
            .ok_or_else(|| ScheduleFormatError("missing '-' in day range".to_string()))?;

        let start_day = parse_day(start_day_token)?;
        let end_day = parse_day(end_day_token)?;

        if start_day.num_days_from_monday() > end_day.num_days_from_monday() {
            return Err(ScheduleFormatError(format!(
                "inverted day range {}-{}",
                start_day_token, end_day_token
            )));
        }

        let (start_token, end_token) = hours_part.split_once(" - ").ok_or_else(|| {
            ScheduleFormatError(format!(
                "time range '{}' does not match '<h> AM|PM - <h> AM|PM'",
                hours_part
            ))
        })?;

        let start_time = parse_hour(start_token)?;
        let end_time = parse_hour(end_token)?;

        if start_time >= end_time {
            return Err(ScheduleFormatError(format!(
                "start time {} is not before end time {}",
                start_token, end_token
            )));
        }

        Ok(Self {
            start_day,
            end_day,
            start_time,
            end_time,
        })
    }

    /// Decide whether a candidate appointment timestamp falls inside this
    /// window. Day is checked first, then time-of-day against the
    /// half-open interval, so a slot exactly at the closing hour is
    /// refused.
    pub fn check_slot(&self, slot: DateTime<Utc>) -> Result<(), SlotRejection> {
        let requested_day = slot.weekday();
        let d = requested_day.num_days_from_monday();

        if d < self.start_day.num_days_from_monday() || d > self.end_day.num_days_from_monday() {
            return Err(SlotRejection::OutsideDays {
                requested: requested_day,
                start: self.start_day,
                end: self.end_day,
            });
        }

        let requested_time = slot.time();
        if requested_time < self.start_time || requested_time >= self.end_time {
            return Err(SlotRejection::OutsideHours {
                requested: requested_time,
                start: self.start_time,
                end: self.end_time,
            });
        }

        Ok(())
    }

    pub fn is_available(&self, slot: DateTime<Utc>) -> bool {
        self.check_slot(slot).is_ok()
    }
}

impl fmt::Display for AvailabilityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}, {} - {}",
            day_abbrev(self.start_day),
            day_abbrev(self.end_day),
            render_hour(self.start_time),
            render_hour(self.end_time)
        )
    }
}
