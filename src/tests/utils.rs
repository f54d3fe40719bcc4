//! Test utilities and helpers for unit tests
//!
//! This module provides common testing utilities including:
//! - Temporary directories
//! - Unsigned tokens carrying arbitrary claims
//! - Reservation fixtures anchored to a given instant

#[cfg(test)]
pub mod test_helpers {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::{DateTime, Local, Utc};
    use tempfile::TempDir;

    use roombook_protocol::{Reservation, Room};

    use crate::error::{Result, RoombookError};
    use crate::storage::Storage;

    /// Create a temporary directory for testing
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Build an unsigned token whose payload segment is `claims`
    pub fn make_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    /// A reservation in "Laboratorio" starting at `start` (local wall clock,
    /// whole seconds) and lasting one hour
    pub fn reservation_at(id: &str, start: DateTime<Utc>) -> Reservation {
        let local = start.with_timezone(&Local);
        let end = (start + chrono::Duration::hours(1)).with_timezone(&Local);
        Reservation {
            id: id.to_string(),
            date: local.format("%Y-%m-%d").to_string(),
            start_time: Some(local.format("%H:%M:%S").to_string()),
            end_time: Some(end.format("%H:%M:%S").to_string()),
            manager_dni: Some("12345678".to_string()),
            manager_first_names: Some("Ana".to_string()),
            manager_last_names: Some("Quispe".to_string()),
            attendees: None,
            description: None,
            status: None,
            created_at: None,
            room: Room {
                id: "3".to_string(),
                name: "Laboratorio".to_string(),
                capacity: None,
                description: None,
            },
            owner: None,
        }
    }

    /// Storage whose every operation fails
    pub struct FailingStorage;

    impl Storage for FailingStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Err(RoombookError::io(key, "storage unavailable"))
        }

        fn set(&self, key: &str, _value: &str) -> Result<()> {
            Err(RoombookError::io(key, "storage unavailable"))
        }

        fn remove(&self, key: &str) -> Result<()> {
            Err(RoombookError::io(key, "storage unavailable"))
        }
    }
}
