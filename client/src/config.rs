//! Client-Konfiguration
//!
//! TOML-Datei mit Standardwerten fuer jedes Feld; ohne Datei verbindet sich
//! der Client als `linux_user` mit `test_room` auf `127.0.0.1:8080`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use voxroom_audio::AudioFormat;
use voxroom_call::CallKonfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerEinstellungen,
    pub anruf: AnrufEinstellungen,
    pub audio: AudioEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Adresse des Relays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Hostname oder IP-Adresse
    pub adresse: String,
    pub port: u16,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            adresse: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnrufEinstellungen {
    pub raum: String,
    pub benutzer: String,
    /// Wartezeit auf JOIN_OK / JOIN_FAIL
    pub join_timeout_ms: u64,
    /// Keepalive-Abstand, solange stumm; sollte unter dem Sitzungs-Timeout
    /// des Servers liegen
    pub keepalive_ms: u64,
    pub mikrofon_lautstaerke: f32,
    pub lautsprecher_lautstaerke: f32,
    /// Mikrofon beim Start stumm
    pub stumm: bool,
    /// Laufzeit in Sekunden (0 = bis Ctrl-C)
    pub dauer_sek: u64,
}

impl Default for AnrufEinstellungen {
    fn default() -> Self {
        Self {
            raum: "test_room".into(),
            benutzer: "linux_user".into(),
            join_timeout_ms: 5000,
            keepalive_ms: 2000,
            mikrofon_lautstaerke: 1.0,
            lautsprecher_lautstaerke: 1.0,
            stumm: false,
            dauer_sek: 0,
        }
    }
}

/// PCM-Format und Tongenerator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
    pub ton_frequenz_hz: f32,
    /// Amplitude relativ zur Vollaussteuerung
    pub ton_amplitude: f32,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        let format = AudioFormat::default();
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            frame_ms: format.frame_ms,
            ton_frequenz_hz: 440.0,
            ton_amplitude: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    pub level: String,
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration; fehlende Datei ergibt die Standardwerte
    pub fn laden(pfad: &str) -> Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}")),
        }
    }

    /// Loest `[server]` auf; bevorzugt IPv4, falls der Name beides liefert
    pub fn server_adresse(&self) -> Result<SocketAddr> {
        let ziel = (self.server.adresse.as_str(), self.server.port);
        let adressen: Vec<SocketAddr> = ziel
            .to_socket_addrs()
            .map_err(|e| anyhow!("Server '{}' nicht aufloesbar: {e}", self.server.adresse))?
            .collect();
        adressen
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| adressen.first())
            .copied()
            .ok_or_else(|| anyhow!("Server '{}' hat keine Adresse", self.server.adresse))
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            frame_ms: self.audio.frame_ms,
        }
    }

    /// Anruf-Parameter; die Pruefung der Werte uebernimmt `VoiceCall::neu`
    pub fn call_konfig(&self) -> Result<CallKonfig> {
        let mut konfig = CallKonfig::neu(
            self.server_adresse()?,
            self.anruf.raum.clone(),
            self.anruf.benutzer.clone(),
        );
        konfig.format = self.audio_format();
        konfig.join_timeout = Duration::from_millis(self.anruf.join_timeout_ms);
        konfig.keepalive_intervall = Duration::from_millis(self.anruf.keepalive_ms);
        konfig.mikrofon_lautstaerke = self.anruf.mikrofon_lautstaerke;
        konfig.lautsprecher_lautstaerke = self.anruf.lautsprecher_lautstaerke;
        Ok(konfig)
    }
}
