// Library exports for the binary and integration tests

pub mod config;
pub mod error;
pub mod events;
pub mod hashing;
pub mod logging;
pub mod protector;
pub mod recovery;
