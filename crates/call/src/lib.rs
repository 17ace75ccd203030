//! voxroom-call – Anruf-Client
//!
//! Verbindet Capture, UDP-Transport und Playback zu einem Anruf in einem Raum.
//!
//! ## Module
//! - [`session`] – Zustandsmaschine Idle/Connecting/Connected/Disconnected/Error
//! - `capture` – Aufnahme- und Sende-Thread
//! - `playback` – Netzwerk- und Playback-Thread
//! - [`call`] – `VoiceCall`, die oeffentliche Schnittstelle
//! - [`events`] – Benachrichtigungen an die Anwendung

pub mod call;
mod capture;
pub mod error;
pub mod events;
mod playback;
pub mod session;

pub use call::{CallKonfig, VoiceCall};
pub use error::{CallError, CallResult};
pub use events::{CallEvents, KeineEvents};
pub use session::{Ausloeser, CallState, ClientSession};
