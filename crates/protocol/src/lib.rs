//! voxroom-protocol – Wire-Protokoll
//!
//! Text-Steuernachrichten (JOIN/JOIN_OK/JOIN_FAIL/LEAVE) und binaere
//! Audio-Pakete teilen sich denselben UDP-Port. Das Praefix entscheidet.

pub mod control;
pub mod error;
pub mod voice;

pub use control::ControlMessage;
pub use error::{ProtokollFehler, ProtokollResult};
pub use voice::{
    benutzer_hash, pcm_zu_samples, samples_zu_pcm, AudioPacket, AudioPacketHeader,
    HEADER_GROESSE, MAX_CAPTURE_NUTZDATEN, MAX_NUTZDATEN,
};
