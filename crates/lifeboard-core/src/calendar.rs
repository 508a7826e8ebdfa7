use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

pub const DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CalendarMode {
  #[default]
  Month,
  Week
}

impl CalendarMode {
  pub fn as_str(self) -> &'static str {
    match self {
      | CalendarMode::Month => "month",
      | CalendarMode::Week => "week"
    }
  }

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw.trim() {
      | "month" => {
        Some(CalendarMode::Month)
      }
      | "week" => Some(CalendarMode::Week),
      | _ => None
    }
  }
}

/// Resolves the calendar timezone from
/// an IANA name, falling back to UTC.
pub fn resolve_timezone(
  name: Option<&str>
) -> Tz {
  let Some(raw) = name else {
    return chrono_tz::UTC;
  };
  match raw.trim().parse::<Tz>() {
    | Ok(tz) => tz,
    | Err(err) => {
      tracing::error!(
        timezone = %raw,
        error = %err,
        "invalid calendar timezone; using UTC"
      );
      chrono_tz::UTC
    }
  }
}

#[must_use]
pub fn today_in(
  tz: &Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

#[must_use]
pub fn date_key(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

/// Accepts `YYYY-MM-DD` and full
/// timestamps, keeping only the date.
pub fn parse_date_key(
  raw: &str
) -> Option<NaiveDate> {
  let day = raw
    .trim()
    .split('T')
    .next()
    .unwrap_or_default();
  NaiveDate::parse_from_str(
    day,
    DATE_FORMAT
  )
  .ok()
}

/// Parses a reminder timestamp. Values
/// without an offset are read in `tz`.
pub fn parse_reminder(
  raw: &str,
  tz: &Tz
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(
      parsed.with_timezone(&Utc)
    );
  }

  for format in [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return tz
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| {
          local.with_timezone(&Utc)
        });
    }
  }

  None
}

pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

/// Monday-start week containing
/// `today`, shifted by whole weeks.
pub fn week_strip(
  today: NaiveDate,
  week_offset: i32
) -> Vec<NaiveDate> {
  let base = add_days(
    start_of_week(today, Weekday::Mon),
    i64::from(week_offset) * 7
  );
  (0..7)
    .map(|offset| add_days(base, offset))
    .collect()
}

/// Full Monday-start weeks covering the
/// month of `cursor`.
pub fn month_grid(
  cursor: NaiveDate
) -> Vec<NaiveDate> {
  let first = first_day_of_month(
    cursor.year(),
    cursor.month()
  );
  let last = last_day_of_month(
    cursor.year(),
    cursor.month()
  );
  let start =
    start_of_week(first, Weekday::Mon);
  let end = add_days(
    start_of_week(last, Weekday::Mon),
    6
  );

  let mut days = Vec::with_capacity(42);
  let mut day = start;
  while day <= end {
    days.push(day);
    day = add_days(day, 1);
  }
  days
}

/// Moves the calendar cursor one period
/// forward or backward. Month mode
/// snaps to the first of the month.
pub fn shift_cursor(
  cursor: NaiveDate,
  mode: CalendarMode,
  step: i32
) -> NaiveDate {
  match mode {
    | CalendarMode::Month => {
      let shifted = shift_months(
        first_day_of_month(
          cursor.year(),
          cursor.month()
        ),
        step
      );
      first_day_of_month(
        shifted.year(),
        shifted.month()
      )
    }
    | CalendarMode::Week => {
      add_days(
        cursor,
        i64::from(step) * 7
      )
    }
  }
}

pub fn period_label(
  cursor: NaiveDate,
  mode: CalendarMode
) -> String {
  match mode {
    | CalendarMode::Month => {
      cursor
        .format("%B %Y")
        .to_string()
    }
    | CalendarMode::Week => {
      let start = start_of_week(
        cursor,
        Weekday::Mon
      );
      let end = add_days(start, 6);
      format!(
        "{} – {}",
        start.format("%b %-d"),
        end.format("%b %-d, %Y")
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn month_grid_covers_full_weeks() {
    let grid = month_grid(day(2026, 2, 15));

    assert_eq!(grid.len() % 7, 0);
    assert_eq!(grid[0], day(2026, 1, 26));
    assert_eq!(
      grid[0].weekday(),
      Weekday::Mon
    );
    assert!(grid.contains(&day(2026, 2, 1)));
    assert!(
      grid.contains(&day(2026, 2, 28))
    );
    assert_eq!(
      grid.last().copied(),
      Some(day(2026, 3, 1))
    );
  }

  #[test]
  fn week_strip_honours_offset() {
    let today = day(2026, 2, 18);

    let current = week_strip(today, 0);
    assert_eq!(current[0], day(2026, 2, 16));
    assert_eq!(current[6], day(2026, 2, 22));

    let previous = week_strip(today, -1);
    assert_eq!(
      previous[0],
      day(2026, 2, 9)
    );
  }

  #[test]
  fn cursor_shift_clamps_month_end() {
    assert_eq!(
      shift_cursor(
        day(2026, 1, 31),
        CalendarMode::Month,
        1
      ),
      day(2026, 2, 1)
    );
    assert_eq!(
      shift_cursor(
        day(2026, 1, 31),
        CalendarMode::Week,
        -1
      ),
      day(2026, 1, 24)
    );
    assert_eq!(
      shift_months(day(2026, 3, 31), -1),
      day(2026, 2, 28)
    );
  }

  #[test]
  fn date_keys_drop_time_component() {
    assert_eq!(
      parse_date_key("2026-02-03T10:00"),
      Some(day(2026, 2, 3))
    );
    assert_eq!(
      date_key(day(2026, 2, 3)),
      "2026-02-03"
    );
    assert!(parse_date_key("soon").is_none());
  }

  #[test]
  fn reminder_accepts_rfc3339() {
    let parsed = parse_reminder(
      "2026-02-03T10:00:00Z",
      &chrono_tz::Asia::Tokyo
    )
    .expect("reminder");
    assert_eq!(
      parsed,
      Utc.with_ymd_and_hms(
        2026, 2, 3, 10, 0, 0
      )
      .single()
      .expect("valid instant")
    );
  }

  #[test]
  fn naive_reminder_uses_given_zone() {
    let parsed = parse_reminder(
      "2026-02-03T10:00",
      &chrono_tz::Europe::Paris
    )
    .expect("reminder");
    assert_eq!(
      parsed,
      Utc.with_ymd_and_hms(
        2026, 2, 3, 9, 0, 0
      )
      .single()
      .expect("valid instant")
    );
  }

  #[test]
  fn unknown_timezone_falls_back_to_utc() {
    assert_eq!(
      resolve_timezone(Some("Mars/Base")),
      chrono_tz::UTC
    );
    assert_eq!(
      resolve_timezone(Some(
        "Europe/Paris"
      )),
      chrono_tz::Europe::Paris
    );
  }
}
