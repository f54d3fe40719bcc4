//! Wire types for the rooms and reservations API
//!
//! - `common`: records returned by the server (rooms, reservations, login)
//! - `api`: request bodies sent by clients, validated before they leave

pub mod api;
pub mod common;

pub use api::*;
pub use common::*;
