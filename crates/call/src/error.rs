//! Fehlertypen des Anruf-Clients

use thiserror::Error;
use voxroom_audio::AudioError;

/// Fehler, die ein [`VoiceCall`](crate::VoiceCall) melden kann
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Ungueltiger Parameter: {0}")]
    UngueltigerParameter(String),

    #[error("Initialisierung fehlgeschlagen: {0}")]
    InitFehlgeschlagen(String),

    #[error("Netzwerkfehler: {0}")]
    Netzwerk(String),

    #[error("Audiofehler: {0}")]
    Audio(#[source] AudioError),

    #[error("Peer nicht gefunden: {0}")]
    PeerNichtGefunden(String),

    #[error("Bereits im Anruf")]
    BereitsImAnruf,
}

impl From<AudioError> for CallError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::UngueltigerWert(msg) => Self::UngueltigerParameter(msg),
            andere => Self::Audio(andere),
        }
    }
}

impl From<voxroom_core::VoxroomError> for CallError {
    fn from(e: voxroom_core::VoxroomError) -> Self {
        Self::UngueltigerParameter(e.to_string())
    }
}

pub type CallResult<T> = Result<T, CallError>;
