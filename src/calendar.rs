//! Google Calendar links for new reservations

use reqwest::Url;

use roombook_protocol::ReservationPayload;

use crate::utils::local_instant;

const CALENDAR_URL: &str = "https://calendar.google.com/calendar/render";

/// UTC stamp in the `YYYYMMDDTHHMMSSZ` form the calendar template expects.
pub fn calendar_stamp(date: &str, time: &str) -> Option<String> {
    local_instant(date, time).map(|instant| instant.format("%Y%m%dT%H%M%SZ").to_string())
}

/// Event description: room, manager and DNI, plus attendees and
/// description when given.
pub fn event_details(payload: &ReservationPayload, room_name: &str) -> String {
    let mut lines = vec![
        format!("Sala: {}", room_name),
        format!(
            "Encargado: {} {}",
            payload.manager_first_names, payload.manager_last_names
        ),
        format!("DNI: {}", payload.manager_dni),
    ];
    if let Some(attendees) = payload.attendees.as_deref().filter(|a| !a.is_empty()) {
        lines.push(format!("Asistentes: {}", attendees));
    }
    if let Some(description) = payload.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("Descripción: {}", description));
    }
    lines.join("\n")
}

/// Template link for a reservation, or `None` when either end of the
/// reservation is not a valid local time.
pub fn calendar_link(payload: &ReservationPayload, room_name: &str) -> Option<String> {
    let start = calendar_stamp(&payload.date, &payload.start_time)?;
    let end = calendar_stamp(&payload.date, &payload.end_time)?;
    let summary = format!("Reserva sala {}", room_name);
    let dates = format!("{}/{}", start, end);
    let details = event_details(payload, room_name);

    let url = Url::parse_with_params(
        CALENDAR_URL,
        &[
            ("action", "TEMPLATE"),
            ("text", summary.as_str()),
            ("dates", dates.as_str()),
            ("details", details.as_str()),
        ],
    )
    .ok()?;
    Some(url.to_string())
}
