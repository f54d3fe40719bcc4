pub mod auth;
pub mod reservation;
pub mod room;

pub use auth::*;
pub use reservation::*;
pub use room::*;
