//! # voxroom-observability
//!
//! Gemeinsames Logging-Setup fuer Relay-Server und Client:
//! Structured Logging (Text oder JSON) via tracing-subscriber.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat};
