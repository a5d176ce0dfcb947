use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::errors::FormatError;
use crate::payload::AgendaEntry;

/// Timezone used for planning items, which carry no timezone of their own.
pub const DEFAULT_TIMEZONE: &str = "Australia/Sydney";

pub fn parse_timezone(name: &str) -> Result<Tz, FormatError> {
    name.parse::<Tz>()
        .map_err(|_| FormatError::UnknownTimezone(name.to_string()))
}

/// Local end times that mark an all-day entry.
fn is_end_of_day(t: NaiveTime) -> bool {
    t == NaiveTime::MIN || (t.hour() == 23 && t.minute() == 59)
}

/// Fill the date, time and zone fields of `entry` from a UTC range shown in
/// `tz`.
///
/// `DateTo` is only set when the local end falls on a different day. Times are
/// only set for same-day entries that are not midnight-to-midnight; Agenda
/// treats an entry without times as all-day. A missing start leaves the entry
/// untouched, a missing end is taken to equal the start.
pub fn set_dates(
    entry: &mut AgendaEntry,
    tz: Tz,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) {
    let Some(start) = start else {
        return;
    };
    let from = start.with_timezone(&tz);
    let to = end.unwrap_or(start).with_timezone(&tz);

    let same_day = from.date_naive() == to.date_naive();
    entry.date_from = Some(from.format("%Y-%m-%d").to_string());
    if !same_day {
        entry.date_to = Some(to.format("%Y-%m-%d").to_string());
    }

    let all_day = from.time() == NaiveTime::MIN && is_end_of_day(to.time());
    if same_day && !all_day {
        entry.time_from = Some(from.format("%H:%M").to_string());
        entry.time_to = Some(to.format("%H:%M").to_string());
    }

    entry.time_from_zone = Some(from.format("%:z").to_string());
    entry.time_to_zone = Some(to.format("%:z").to_string());
}
