//! Infrastructure implementations.
//!
//! Configuration, time and the directory service clients.

pub mod clock;
pub mod config;
pub mod directory;
pub mod ports;

pub use clock::SystemClock;
pub use config::AdapterConfig;
pub use directory::{HttpDirectoryClient, InMemoryDirectory};
pub use ports::ClockPort;
