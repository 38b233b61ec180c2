//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod executable;
pub mod exiftool;
pub mod http;
pub mod telemetry;
pub mod webdriver;
