//! Subdue policy (spec §4.3 `check_subdued`).

use chrono::{Datelike, Local, NaiveTime, Timelike, Weekday};

use crate::model::{Subdue, SubdueGate};

/// True iff `subdue` (if any) is active for the requested gate at the
/// current local time (spec §4.3). `None` is never subdued. Takes the
/// bare `Subdue` rather than a whole check so it serves both the handler
/// gate (`EffectiveCheck::subdue`) and the publisher gate
/// (`CheckConfig::subdue`, spec §4.8).
#[must_use]
pub fn check_subdued(subdue: Option<&Subdue>, at: SubdueGate) -> bool {
    let Some(subdue) = subdue else {
        return false;
    };
    subdue_active(subdue, at, Local::now().time(), weekday_name(Local::now().weekday()))
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn parse_hm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// Whether `now` falls in a `[begin,end]` window, honoring the midnight
/// wrap when `end < begin` (spec §4.3).
fn in_window(begin: &str, end: &str, now: NaiveTime) -> bool {
    let (Some(begin), Some(end)) = (parse_hm(begin), parse_hm(end)) else {
        return false;
    };
    if begin <= end {
        now >= begin && now <= end
    } else {
        now >= begin || now <= end
    }
}

fn subdue_active(subdue: &Subdue, at: SubdueGate, now: NaiveTime, today: &str) -> bool {
    if subdue.at != at {
        return false;
    }

    let in_primary_window = match (&subdue.begin, &subdue.end) {
        (Some(begin), Some(end)) => in_window(begin, end, now),
        _ => false,
    };
    let in_primary_day = subdue.days.iter().any(|d| d == today);

    if !(in_primary_window || in_primary_day) {
        return false;
    }

    let excepted = subdue.exceptions.iter().any(|window| {
        let in_window_time = match (&window.begin, &window.end) {
            (Some(b), Some(e)) => in_window(b, e, now),
            _ => false,
        };
        let in_window_day = window.days.iter().any(|d| d == today);
        in_window_time || in_window_day
    });

    !excepted
}
