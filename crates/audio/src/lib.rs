//! voxroom-audio – Audio-Bausteine des Clients
//!
//! - Gain fuer Mikrofon und Lautsprecher
//! - Pegelmessung (RMS/dB)
//! - Geraete-Schnittstelle (Capture-Quelle, Playback-Senke)

pub mod device;
pub mod error;
pub mod gain;
pub mod level;

// Bequeme Re-Exporte der wichtigsten Typen
pub use device::{AudioFormat, CaptureSource, DiscardSink, PlaybackSink, SinkStatistik, ToneSource};
pub use error::{AudioError, AudioResult};
pub use gain::{ist_stille, verstaerkung_anwenden, Lautstaerke};
pub use level::pegel_berechnen;
