//! Gemeinsame Identifikationstypen fuer Voxroom
//!
//! Raum- und Benutzerkennungen sind frei gewaehlte Strings, die der Client im
//! JOIN mitschickt. Das Newtype-Pattern schliesst Verwechslungen zwischen
//! beiden zur Compilezeit aus.

use crate::error::{Result, VoxroomError};

/// Trennzeichen des Control-Protokolls – darf in keiner Kennung vorkommen
pub const FELD_TRENNER: char = ':';

/// Standard-Maximallaenge einer Kennung in Bytes
pub const MAX_ID_LAENGE: usize = 63;

/// Prueft eine Kennung gegen die Regeln des Control-Protokolls
fn kennung_pruefen(art: &str, wert: &str, max_laenge: usize) -> Result<()> {
    if wert.is_empty() {
        return Err(VoxroomError::UngueltigeKennung(format!("{art} ist leer")));
    }
    if wert.contains(FELD_TRENNER) {
        return Err(VoxroomError::UngueltigeKennung(format!(
            "{art} '{wert}' enthaelt '{FELD_TRENNER}'"
        )));
    }
    if wert.len() > max_laenge {
        return Err(VoxroomError::UngueltigeKennung(format!(
            "{art} zu lang: {} Bytes (Maximum {max_laenge})",
            wert.len()
        )));
    }
    Ok(())
}

/// Kennung eines Raums
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub String);

impl RoomId {
    /// Erstellt eine RoomId ohne Validierung (Wire-Daten werden vom Relay geprueft)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validiert die Kennung (nicht leer, kein ':', hoechstens `max_laenge` Bytes)
    pub fn pruefen(&self, max_laenge: usize) -> Result<()> {
        kennung_pruefen("Raum-ID", &self.0, max_laenge)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kennung eines Benutzers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl UserId {
    /// Erstellt eine UserId ohne Validierung
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validiert die Kennung (nicht leer, kein ':', hoechstens `max_laenge` Bytes)
    pub fn pruefen(&self, max_laenge: usize) -> Result<()> {
        kennung_pruefen("Benutzer-ID", &self.0, max_laenge)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
