//! Fehlertypen fuer Voxroom
//!
//! Zentraler Fehler-Enum fuer die Kennungs-Pruefung und die Aufnahme-Grenzen
//! des Relays. Die uebrigen Crates definieren eigene Fehler und konvertieren
//! via `From`.

use thiserror::Error;

/// Globaler Result-Alias fuer Voxroom
pub type Result<T> = std::result::Result<T, VoxroomError>;

/// Fehler, die zwischen den Crates weitergereicht werden
#[derive(Debug, Error)]
pub enum VoxroomError {
    #[error("Ungueltige Kennung: {0}")]
    UngueltigeKennung(String),

    #[error("Server voll: maximale Clientanzahl ({0}) erreicht")]
    ServerVoll(usize),
}
