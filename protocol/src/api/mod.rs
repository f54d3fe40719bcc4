//! API DTOs module
//!
//! Request bodies organized by domain:
//! - `auth`: login and registration
//! - `room`: room inventory management
//! - `reservation`: booking requests

pub mod auth;
pub mod reservation;
pub mod room;

pub use auth::*;
pub use reservation::*;
pub use room::*;
