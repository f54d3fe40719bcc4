//! Room inventory API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /api/salas` and `PUT /api/salas/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoomPayload {
    #[serde(rename = "nombre")]
    #[validate(length(min = 1, max = 120, message = "room name is required"))]
    pub name: String,
}
