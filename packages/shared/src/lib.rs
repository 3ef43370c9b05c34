//! Utilities shared by the headcon binaries and libraries.

pub mod logger;
pub mod time;
