//! Date and time helpers for reservation records

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use roombook_protocol::Reservation;

/// Parse a `YYYY-MM-DD` reservation date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Parse an `HH:MM` or `HH:MM:SS` reservation time.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Combine a reservation date and time in the local time zone.
///
/// Times skipped by a DST jump have no instant and yield `None`; repeated
/// times resolve to the earlier instant.
pub fn local_instant(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::new(parse_date(date)?, parse_time(time)?);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Start of a reservation; a missing start time counts as midnight.
pub fn reservation_start(reservation: &Reservation) -> Option<DateTime<Utc>> {
    let time = reservation
        .start_time
        .as_deref()
        .filter(|time| !time.trim().is_empty())
        .unwrap_or("00:00");
    local_instant(&reservation.date, time)
}

/// `HH:MM` part of a reservation time, `--:--` when absent.
pub fn format_hour(value: Option<&str>) -> String {
    match value {
        Some(time) if !time.is_empty() => time.chars().take(5).collect(),
        _ => "--:--".to_string(),
    }
}

/// Earliest reservation starting at or after `now`.
pub fn next_upcoming(reservations: &[Reservation], now: DateTime<Utc>) -> Option<&Reservation> {
    reservations
        .iter()
        .filter_map(|reservation| reservation_start(reservation).map(|start| (start, reservation)))
        .filter(|(start, _)| *start >= now)
        .min_by_key(|(start, _)| *start)
        .map(|(_, reservation)| reservation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_helpers::reservation_at;
    use chrono::Duration;

    #[test]
    fn test_time_formats() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time("09:30:15"), NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(parse_time("9h30"), None);
        assert_eq!(parse_date("2026-02-30"), None);
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(format_hour(Some("10:15:00")), "10:15");
        assert_eq!(format_hour(Some("10:15")), "10:15");
        assert_eq!(format_hour(None), "--:--");
        assert_eq!(format_hour(Some("")), "--:--");
    }

    #[test]
    fn test_next_upcoming_skips_past_reservations() {
        let now = Utc::now();
        let past = reservation_at("1", now - Duration::hours(2));
        let later = reservation_at("2", now + Duration::hours(5));
        let sooner = reservation_at("3", now + Duration::hours(1));
        let reservations = vec![past, later, sooner];

        let next = next_upcoming(&reservations, now).unwrap();
        assert_eq!(next.id, "3");
        assert!(next_upcoming(&reservations[..1], now).is_none());
    }
}
