//! Next-due computation for scheduled top-ups.
//!
//! Times of day and day selectors are interpreted in the configured schedule
//! timezone; every result is returned in UTC.

use chrono::{
    DateTime,
    Datelike,
    Duration,
    FixedOffset,
    NaiveDate,
    NaiveTime,
    TimeZone,
    Timelike,
    Utc,
};

use crate::enums::ScheduleKind;
use crate::error::{ AppError, Result };

/// Day-of-month is capped so every month has the selected day.
pub const MAX_DAY_OF_MONTH: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    OneTime {
        scheduled_at: DateTime<Utc>,
    },
    Daily {
        time: NaiveTime,
    },
    /// `weekday` counts from Sunday = 0.
    Weekly {
        weekday: u32,
        time: NaiveTime,
    },
    Monthly {
        day: u32,
        time: NaiveTime,
    },
}

impl Recurrence {
    /// Build a recurrence from the loose fields a schedule is stored with,
    /// rejecting combinations that do not match the kind.
    pub fn from_parts(
        kind: ScheduleKind,
        scheduled_at: Option<DateTime<Utc>>,
        time_of_day: Option<&str>,
        day_of_week: Option<i32>,
        day_of_month: Option<i32>
    ) -> Result<Self> {
        if kind == ScheduleKind::OneTime {
            let scheduled_at = scheduled_at.ok_or_else(||
                AppError::validation("scheduled_at", "One-time schedules require scheduled_at")
            )?;
            return Ok(Recurrence::OneTime { scheduled_at });
        }

        let time = match time_of_day {
            Some(raw) => parse_time_of_day(raw)?,
            None => {
                return Err(
                    AppError::validation("time_of_day", "Recurring schedules require time_of_day")
                );
            }
        };

        match kind {
            ScheduleKind::Daily => Ok(Recurrence::Daily { time }),
            ScheduleKind::Weekly => {
                let weekday = day_of_week.ok_or_else(||
                    AppError::validation("day_of_week", "Weekly schedules require day_of_week")
                )?;
                if !(0..=6).contains(&weekday) {
                    return Err(
                        AppError::validation(
                            "day_of_week",
                            "day_of_week must be between 0 (Sunday) and 6 (Saturday)"
                        )
                    );
                }
                Ok(Recurrence::Weekly { weekday: weekday as u32, time })
            }
            ScheduleKind::Monthly => {
                let day = day_of_month.ok_or_else(||
                    AppError::validation("day_of_month", "Monthly schedules require day_of_month")
                )?;
                if day < 1 || day > (MAX_DAY_OF_MONTH as i32) {
                    return Err(
                        AppError::validation(
                            "day_of_month",
                            format!("day_of_month must be between 1 and {}", MAX_DAY_OF_MONTH)
                        )
                    );
                }
                Ok(Recurrence::Monthly { day: day as u32, time })
            }
            ScheduleKind::OneTime => unreachable!("handled above"),
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        match self {
            Recurrence::OneTime { .. } => ScheduleKind::OneTime,
            Recurrence::Daily { .. } => ScheduleKind::Daily,
            Recurrence::Weekly { .. } => ScheduleKind::Weekly,
            Recurrence::Monthly { .. } => ScheduleKind::Monthly,
        }
    }

    /// Next due time strictly after `now`, or `None` when the recurrence can
    /// never fire again (a one-time schedule at or before `now`).
    pub fn next_execution(&self, now: DateTime<Utc>, tz: &FixedOffset) -> Option<DateTime<Utc>> {
        let local_now = now.with_timezone(tz);
        let today = local_now.date_naive();

        match *self {
            Recurrence::OneTime { scheduled_at } => {
                if scheduled_at > now { Some(scheduled_at) } else { None }
            }
            Recurrence::Daily { time } => {
                let candidate = at_local(today, time, tz)?;
                if candidate > now {
                    Some(candidate)
                } else {
                    at_local(today + Duration::days(1), time, tz)
                }
            }
            Recurrence::Weekly { weekday, time } => {
                let current = local_now.weekday().num_days_from_sunday();
                let days_ahead = (weekday + 7 - current) % 7;
                let candidate = at_local(today + Duration::days(days_ahead as i64), time, tz)?;
                if candidate > now {
                    Some(candidate)
                } else {
                    at_local(today + Duration::days(days_ahead as i64 + 7), time, tz)
                }
            }
            Recurrence::Monthly { day, time } => {
                let this_month = NaiveDate::from_ymd_opt(today.year(), today.month(), day)?;
                let candidate = at_local(this_month, time, tz)?;
                if candidate > now {
                    return Some(candidate);
                }
                let (year, month) = if today.month() == 12 {
                    (today.year() + 1, 1)
                } else {
                    (today.year(), today.month() + 1)
                };
                at_local(NaiveDate::from_ymd_opt(year, month, day)?, time, tz)
            }
        }
    }

    /// Next due time after an attempt at `attempted`.
    ///
    /// The baseline is the occurrence just attempted; occurrences that
    /// already elapsed while the runner was late are skipped, so a delayed
    /// run fires once and then resumes the regular cadence.
    pub fn next_after_attempt(
        &self,
        attempted: DateTime<Utc>,
        now: DateTime<Utc>,
        tz: &FixedOffset
    ) -> Option<DateTime<Utc>> {
        if let Recurrence::OneTime { .. } = self {
            return None;
        }

        let mut next = self.next_execution(attempted, tz)?;
        if next <= now {
            // Every calendar-anchored rule yields the first occurrence past
            // `now` when evaluated from `now`, which is the fast-forward target.
            next = self.next_execution(now, tz)?;
        }
        Some(next)
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::validation("time_of_day", format!("Invalid time of day: {}", raw)))
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    let pattern = if time.second() == 0 { "%H:%M" } else { "%H:%M:%S" };
    time.format(pattern).to_string()
}

fn at_local(date: NaiveDate, time: NaiveTime, tz: &FixedOffset) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
