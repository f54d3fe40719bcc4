//! Reservation API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reference to an existing room inside a request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub id: String,
}

/// Body of `POST /api/reservas`
///
/// The room travels as `sala: { id }`; every other field keeps its wire name.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReservationPayload {
    #[serde(rename = "sala")]
    pub room: RoomRef,
    #[serde(rename = "fecha")]
    #[validate(length(min = 1, message = "date is required"))]
    pub date: String,
    #[serde(rename = "horaInicio")]
    #[validate(length(min = 1, message = "start time is required"))]
    pub start_time: String,
    #[serde(rename = "horaFin")]
    #[validate(length(min = 1, message = "end time is required"))]
    pub end_time: String,
    #[serde(rename = "dniEncargado")]
    #[validate(length(min = 1, message = "manager DNI is required"))]
    pub manager_dni: String,
    #[serde(rename = "nombresEncargado")]
    #[validate(length(min = 1, message = "manager first names are required"))]
    pub manager_first_names: String,
    #[serde(rename = "apellidosEncargado")]
    #[validate(length(min = 1, message = "manager last names are required"))]
    pub manager_last_names: String,
    #[serde(rename = "asistentes", default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
