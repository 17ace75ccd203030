//! Fehlertypen fuer die Audio-Schicht

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Schicht
#[derive(Debug, Error)]
pub enum AudioError {
    /// Geraet fehlt oder laesst sich nicht oeffnen (`starten`)
    #[error("Audio-Geraet nicht verfuegbar: {0}")]
    GeraetNichtVerfuegbar(String),

    /// Voruebergehender Lese- oder Schreibfehler eines laufenden Streams
    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    /// Das Ausgabegeraet kann gerade keinen weiteren Puffer aufnehmen
    #[error("Ausgabepuffer voll")]
    PufferVoll,

    #[error("Ungueltiger Wert: {0}")]
    UngueltigerWert(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
