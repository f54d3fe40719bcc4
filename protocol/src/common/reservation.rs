//! Reservation records as returned by the server

use serde::{Deserialize, Serialize};

use super::room::{flexible_id, flexible_optional_id, Room};

/// Account that created a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationOwner {
    #[serde(
        default,
        deserialize_with = "flexible_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub username: String,
}

/// A room reservation ("reserva")
///
/// Dates are `YYYY-MM-DD` and times `HH:MM` or `HH:MM:SS`, both in the
/// room's local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "horaInicio", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "horaFin", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(rename = "dniEncargado", default, skip_serializing_if = "Option::is_none")]
    pub manager_dni: Option<String>,
    #[serde(rename = "nombresEncargado", default, skip_serializing_if = "Option::is_none")]
    pub manager_first_names: Option<String>,
    #[serde(rename = "apellidosEncargado", default, skip_serializing_if = "Option::is_none")]
    pub manager_last_names: Option<String>,
    #[serde(rename = "asistentes", default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "sala")]
    pub room: Room,
    #[serde(rename = "usuario", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ReservationOwner>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_from_server_json() {
        let json = r#"{
            "id": 42,
            "fecha": "2026-03-02",
            "horaInicio": "10:00:00",
            "horaFin": "11:30:00",
            "sala": {"id": 3, "nombre": "Laboratorio"},
            "usuario": {"username": "jdoe"}
        }"#;
        let reservation: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(reservation.id, "42");
        assert_eq!(reservation.start_time.as_deref(), Some("10:00:00"));
        assert_eq!(reservation.room.name, "Laboratorio");
        assert_eq!(reservation.owner.unwrap().username, "jdoe");
    }
}
