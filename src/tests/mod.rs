//! Shared test support

pub mod utils;

pub use utils::test_helpers;
