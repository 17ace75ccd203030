//! voxroom-voice – serverseitiges Raum-Relay
//!
//! ## Module
//! - [`registry`] – Sitzungen und Raummitgliedschaften
//! - [`relay`] – Klassifizierung und Fan-out eingehender Datagramme
//! - [`udp`] – UDP-Empfangs-Loop

pub mod registry;
pub mod relay;
pub mod udp;

pub use registry::{RoomRegistry, Sitzung};
pub use relay::{Ausgang, PacketRelay, RelayKonfig, Verarbeitung};
pub use udp::RelayServer;
