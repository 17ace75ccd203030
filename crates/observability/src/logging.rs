//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `VOXROOM_LOG_LEVEL`: Filter-Ausdruck (trace/debug/info/warn/error oder
//!   EnvFilter-Direktiven wie `voxroom_voice=trace`), Standard: info
//! - `VOXROOM_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Die Umgebung hat Vorrang vor den Werten aus der Konfigurationsdatei.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "VOXROOM_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "VOXROOM_LOG_FORMAT";

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Unbekannte Werte fallen auf `Text` zurueck
    pub fn aus_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `level` und `format` kommen aus der Konfiguration und werden von
/// `VOXROOM_LOG_LEVEL` / `VOXROOM_LOG_FORMAT` ueberschrieben. Ein ungueltiger
/// Filter faellt auf `info` zurueck.
///
/// # Fehler
/// Wenn bereits ein globaler Subscriber gesetzt ist.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let level = wert_waehlen(std::env::var(ENV_LOG_LEVEL).ok(), level);
    let format = LogFormat::aus_str(&wert_waehlen(std::env::var(ENV_LOG_FORMAT).ok(), format));

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init(),
    };

    ergebnis.map_err(|e| anyhow!("Logging konnte nicht initialisiert werden: {e}"))
}

/// Nicht-leerer Umgebungswert vor Konfigurationswert
fn wert_waehlen(env: Option<String>, konfig: &str) -> String {
    match env {
        Some(wert) if !wert.trim().is_empty() => wert,
        _ => konfig.to_string(),
    }
}
