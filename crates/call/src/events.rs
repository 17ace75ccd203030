//! Benachrichtigungen des Anruf-Clients
//!
//! Alle Methoden haben leere Standard-Implementierungen. Sie werden aus den
//! Netzwerk-, Capture- und Playback-Threads aufgerufen und sollten daher
//! schnell zurueckkehren.

use crate::error::CallError;
use crate::session::CallState;
use voxroom_core::types::UserId;

pub trait CallEvents: Send + Sync {
    /// Jeder Zustandswechsel mit kurzem Grund
    fn zustand_geaendert(&self, _zustand: CallState, _grund: &str) {}

    /// Ein anderer Benutzer ist dem eigenen Raum beigetreten
    fn peer_beigetreten(&self, _peer: &UserId) {}

    /// Ein anderer Benutzer hat den eigenen Raum verlassen
    fn peer_verlassen(&self, _peer: &UserId) {}

    /// Pegel in [0, 1]; Schluessel ist die Benutzerkennung, fuer unbekannte
    /// Sender der Hash als Hex-String
    fn audio_pegel(&self, _benutzer: &str, _pegel: f32) {}

    fn fehler(&self, _fehler: &CallError) {}
}

/// Verwirft alle Benachrichtigungen
#[derive(Debug, Default, Clone, Copy)]
pub struct KeineEvents;

impl CallEvents for KeineEvents {}
