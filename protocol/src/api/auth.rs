//! Authentication API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::common::{LoginResponse, LoginUser, UserRole};

/// Body of `POST /api/auth/login` and `POST /api/auth/register`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CredentialsPayload {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}
