//! HTTP client for the room booking API

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use roombook_protocol::{
    CredentialsPayload, LoginResponse, Reservation, ReservationPayload, Room, RoomPayload,
};

use crate::config::ClientConfig;
use crate::error::{Result, RoombookError};

/// Operations the console needs from the booking server
///
/// The server is authoritative for every rule; implementations only move
/// data across the boundary.
#[allow(async_fn_in_trait)]
pub trait BookingApi {
    async fn login(&self, credentials: &CredentialsPayload) -> Result<LoginResponse>;
    async fn register(&self, credentials: &CredentialsPayload) -> Result<()>;
    async fn rooms(&self, token: &str) -> Result<Vec<Room>>;
    async fn create_room(&self, token: &str, name: &str) -> Result<Room>;
    async fn update_room(&self, token: &str, id: &str, name: &str) -> Result<Room>;
    async fn delete_room(&self, token: &str, id: &str) -> Result<()>;
    async fn create_reservation(&self, token: &str, payload: &ReservationPayload) -> Result<()>;
    async fn reservations_by_date(&self, token: &str, date: &str) -> Result<Vec<Reservation>>;
    async fn reservation_history(&self, token: &str) -> Result<Vec<Reservation>>;
    async fn my_reservations(&self, token: &str) -> Result<Vec<Reservation>>;
}

/// Pick the message to show for a failed response.
///
/// JSON `message` wins, then JSON `error`, then any non-blank body text,
/// then a generic `Error {status}`.
pub fn extract_error_message(status: u16, data: &Value, raw: &str) -> String {
    if let Value::Object(fields) = data {
        for key in ["message", "error"] {
            if let Some(Value::String(text)) = fields.get(key) {
                return text.clone();
            }
        }
    }
    if let Value::String(text) = data {
        if !text.trim().is_empty() {
            return text.clone();
        }
    }
    if !raw.trim().is_empty() {
        return raw.to_string();
    }
    format!("Error {}", status)
}

/// Decode a response body: JSON when the server says so, text otherwise,
/// `null` when empty or unparseable.
fn parse_body(is_json: bool, raw: &str) -> Value {
    if raw.is_empty() {
        Value::Null
    } else if is_json {
        serde_json::from_str(raw).unwrap_or(Value::Null)
    } else {
        Value::String(raw.to_string())
    }
}

/// reqwest-backed [`BookingApi`]
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder().timeout(Duration::from_secs(config.timeout));

        if !config.use_proxy {
            client_builder = client_builder.no_proxy();
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    async fn request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        payload: Option<&T>,
        token: Option<&str>,
    ) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint_url(endpoint);
        debug!(%method, %url, "api request");

        let mut request_builder = self
            .client
            .request(method, &url)
            .header(ACCEPT, "application/json");

        if !query.is_empty() {
            request_builder = request_builder.query(query);
        }

        if let Some(data) = payload {
            request_builder = request_builder
                .header(CONTENT_TYPE, "application/json")
                .json(data);
        }

        if let Some(token) = token {
            request_builder = request_builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        let raw = response.text().await?;
        let data = parse_body(is_json, &raw);

        if !status.is_success() {
            return Err(RoombookError::api(
                status.as_u16(),
                extract_error_message(status.as_u16(), &data, &raw),
            ));
        }

        serde_json::from_value(data).map_err(|e| {
            RoombookError::invalid_response(
                status.as_u16(),
                format!("Unexpected response from {}: {}", endpoint, e),
            )
        })
    }

    async fn get<R: DeserializeOwned>(&self, endpoint: &str, token: &str) -> Result<R> {
        self.request::<(), R>(Method::GET, endpoint, &[], None, Some(token))
            .await
    }
}

impl BookingApi for ApiClient {
    async fn login(&self, credentials: &CredentialsPayload) -> Result<LoginResponse> {
        self.request(Method::POST, "/api/auth/login", &[], Some(credentials), None)
            .await
    }

    async fn register(&self, credentials: &CredentialsPayload) -> Result<()> {
        let _: IgnoredAny = self
            .request(Method::POST, "/api/auth/register", &[], Some(credentials), None)
            .await?;
        Ok(())
    }

    async fn rooms(&self, token: &str) -> Result<Vec<Room>> {
        self.get("/api/salas", token).await
    }

    async fn create_room(&self, token: &str, name: &str) -> Result<Room> {
        let payload = RoomPayload {
            name: name.to_string(),
        };
        self.request(Method::POST, "/api/salas", &[], Some(&payload), Some(token))
            .await
    }

    async fn update_room(&self, token: &str, id: &str, name: &str) -> Result<Room> {
        let payload = RoomPayload {
            name: name.to_string(),
        };
        let endpoint = format!("/api/salas/{}", id);
        self.request(Method::PUT, &endpoint, &[], Some(&payload), Some(token))
            .await
    }

    async fn delete_room(&self, token: &str, id: &str) -> Result<()> {
        let endpoint = format!("/api/salas/{}", id);
        let _: IgnoredAny = self
            .request::<(), _>(Method::DELETE, &endpoint, &[], None, Some(token))
            .await?;
        Ok(())
    }

    async fn create_reservation(&self, token: &str, payload: &ReservationPayload) -> Result<()> {
        let _: IgnoredAny = self
            .request(Method::POST, "/api/reservas", &[], Some(payload), Some(token))
            .await?;
        Ok(())
    }

    async fn reservations_by_date(&self, token: &str, date: &str) -> Result<Vec<Reservation>> {
        self.request::<(), _>(
            Method::GET,
            "/api/reservas",
            &[("fecha", date)],
            None,
            Some(token),
        )
        .await
    }

    async fn reservation_history(&self, token: &str) -> Result<Vec<Reservation>> {
        self.get("/api/reservas/historico", token).await
    }

    async fn my_reservations(&self, token: &str) -> Result<Vec<Reservation>> {
        self.get("/api/reservas/mis-reservas", token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_field_wins() {
        let data = json!({"message": "Sala ocupada", "error": "Conflict"});
        assert_eq!(extract_error_message(409, &data, "ignored"), "Sala ocupada");
    }

    #[test]
    fn test_error_field_is_second_choice() {
        let data = json!({"error": "Forbidden", "status": 403});
        assert_eq!(extract_error_message(403, &data, ""), "Forbidden");
    }

    #[test]
    fn test_plain_text_and_raw_fallbacks() {
        assert_eq!(
            extract_error_message(500, &Value::String("boom".to_string()), "boom"),
            "boom"
        );
        // JSON without usable fields falls back to the raw body
        let data = json!({"status": 400});
        assert_eq!(
            extract_error_message(400, &data, r#"{"status":400}"#),
            r#"{"status":400}"#
        );
        assert_eq!(extract_error_message(502, &Value::Null, "  "), "Error 502");
    }

    #[test]
    fn test_body_parsing() {
        assert_eq!(parse_body(true, ""), Value::Null);
        assert_eq!(parse_body(true, "{oops"), Value::Null);
        assert_eq!(parse_body(true, r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body(false, "created"), Value::String("created".to_string()));
    }

    #[test]
    fn test_void_endpoints_accept_any_body() {
        for body in [Value::Null, json!({"id": 1}), Value::String("ok".to_string())] {
            assert!(serde_json::from_value::<IgnoredAny>(body).is_ok());
        }
        assert!(serde_json::from_value::<Vec<Room>>(Value::Null).is_err());
    }

    #[test]
    fn test_client_rejects_empty_base_url() {
        let config = ClientConfig {
            base_url: String::new(),
            ..ClientConfig::default()
        };
        assert!(ApiClient::new(config).is_err());
    }
}
