//! Best-effort identity claims read from a bearer token
//!
//! The token signature is never checked here. Claims only personalize the
//! console when the server leaves the user block out of a login response;
//! the server keeps enforcing authorization on every request.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};
use tracing::debug;

use roombook_protocol::UserRole;

/// Standard alphabet, padding optional (JWT segments are unpadded).
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims a token says about its bearer, unverified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenClaims {
    pub role: Option<String>,
    pub sub: Option<String>,
    pub username: Option<String>,
}

impl TokenClaims {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.sub.is_none() && self.username.is_none()
    }

    /// Role claim, if it names a role this console knows.
    pub fn user_role(&self) -> Option<UserRole> {
        self.role.as_deref().and_then(|role| role.parse().ok())
    }
}

/// Decode the payload segment of a dot-delimited token.
///
/// Never fails: anything malformed yields empty claims.
pub fn decode(token: &str) -> TokenClaims {
    match decode_payload(token) {
        Some(payload) => TokenClaims {
            role: string_claim(&payload, "role"),
            sub: string_claim(&payload, "sub"),
            username: string_claim(&payload, "username"),
        },
        None => TokenClaims::default(),
    }
}

fn decode_payload(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    segments.next()?;
    let payload = segments.next()?;
    if payload.is_empty() {
        return None;
    }

    let standard: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = match PAYLOAD_ENGINE.decode(standard.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("token payload is not base64: {}", e);
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            debug!("token payload is not a JSON object");
            None
        }
        Err(e) => {
            debug!("token payload is not JSON: {}", e);
            None
        }
    }
}

/// Non-empty string claim; numeric claims (numeric subject ids) become text.
fn string_claim(payload: &Map<String, Value>, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_helpers::make_token;

    #[test]
    fn test_tokens_without_payload_segment_decode_empty() {
        for token in ["", "abc", "header-only", "a."] {
            assert!(decode(token).is_empty(), "token {:?}", token);
        }
    }

    #[test]
    fn test_garbage_payload_decodes_empty() {
        assert!(decode("x.!!!not-base64!!!.y").is_empty());
        // valid base64 of plain text, not JSON
        assert!(decode("x.aGVsbG8gd29ybGQ.y").is_empty());
        // a JSON array is not a claim set
        assert!(decode("x.WzEsMiwzXQ.y").is_empty());
    }

    #[test]
    fn test_decodes_url_safe_payload() {
        let token = make_token(&serde_json::json!({"sub": "jdoe", "role": "ADMIN"}));
        let claims = decode(&token);
        assert_eq!(claims.sub.as_deref(), Some("jdoe"));
        assert_eq!(claims.role.as_deref(), Some("ADMIN"));
        assert_eq!(claims.user_role(), Some(UserRole::Admin));
        assert_eq!(claims.username, None);
    }

    #[test]
    fn test_url_safe_characters_are_translated() {
        let payload = serde_json::json!({"username": "a?>?b"});
        let token = make_token(&payload);
        assert_eq!(decode(&token).username.as_deref(), Some("a?>?b"));
    }

    #[test]
    fn test_two_segments_are_enough() {
        let token = make_token(&serde_json::json!({"sub": 17}));
        let mut parts = token.split('.');
        let two = format!("{}.{}", parts.next().unwrap(), parts.next().unwrap());
        assert_eq!(decode(&two).sub.as_deref(), Some("17"));
    }

    #[test]
    fn test_unknown_role_is_kept_but_not_resolved() {
        let token = make_token(&serde_json::json!({"role": "AUDITOR", "sub": ""}));
        let claims = decode(&token);
        assert_eq!(claims.role.as_deref(), Some("AUDITOR"));
        assert_eq!(claims.user_role(), None);
        assert_eq!(claims.sub, None);
    }
}
