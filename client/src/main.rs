//! Voxroom Client – Einstiegspunkt
//!
//! Headless-Client: ein Tongenerator ersetzt das Mikrofon, empfangenes Audio
//! wird gezaehlt und verworfen. Laeuft bis Ctrl-C, bis `dauer_sek` abgelaufen
//! ist oder bis der Anruf in den Fehlerzustand wechselt.

mod config;

use anyhow::{bail, Result};
use config::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use voxroom_audio::{DiscardSink, ToneSource};
use voxroom_call::{CallError, CallEvents, CallState, VoiceCall};
use voxroom_core::types::UserId;

/// Abstand der Status-Zeilen im Log
const STATUS_INTERVALL: Duration = Duration::from_secs(5);

/// Leitet alle Anruf-Ereignisse ins Log
struct LogEvents;

impl CallEvents for LogEvents {
    fn zustand_geaendert(&self, zustand: CallState, grund: &str) {
        tracing::info!(zustand = %zustand, grund = grund, "Anruf-Zustand");
    }

    fn peer_beigetreten(&self, peer: &UserId) {
        tracing::info!(peer = %peer, "Peer beigetreten");
    }

    fn peer_verlassen(&self, peer: &UserId) {
        tracing::info!(peer = %peer, "Peer gegangen");
    }

    fn audio_pegel(&self, benutzer: &str, pegel: f32) {
        tracing::trace!(benutzer = benutzer, pegel, "Pegel");
    }

    fn fehler(&self, fehler: &CallError) {
        tracing::error!(fehler = %fehler, "Anruf-Fehler");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("VOXROOM_CLIENT_CONFIG").unwrap_or_else(|_| "client.toml".into());
    let config = ClientConfig::laden(&config_pfad)?;

    voxroom_observability::logging_initialisieren(&config.logging.level, &config.logging.format)?;

    let senke = DiscardSink::neu();
    let statistik = senke.statistik();
    let quelle = ToneSource::neu(config.audio.ton_frequenz_hz).mit_amplitude(config.audio.ton_amplitude);

    let mut call = VoiceCall::neu(
        config.call_konfig()?,
        Arc::new(LogEvents),
        Box::new(quelle),
        Box::new(senke),
    )?;
    call.set_muted(config.anruf.stumm);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        server = %call.konfig().server,
        raum = %call.konfig().raum,
        benutzer = %call.konfig().benutzer,
        "Voxroom Client startet"
    );

    call.connect()?;

    let dauer = match config.anruf.dauer_sek {
        0 => None,
        sek => Some(Duration::from_secs(sek)),
    };
    let ende = async {
        match dauer {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(ende);

    let mut status = tokio::time::interval(STATUS_INTERVALL);
    status.tick().await;

    let ergebnis = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(fehler = %e, "Signal-Handler fehlgeschlagen");
                }
                tracing::info!("Shutdown-Signal empfangen");
                break Ok(());
            }
            _ = &mut ende => {
                tracing::info!("Laufzeit abgelaufen");
                break Ok(());
            }
            _ = status.tick() => {
                let zustand = call.zustand();
                let peers: Vec<String> = call.peers().iter().map(UserId::to_string).collect();
                tracing::info!(
                    zustand = %zustand,
                    peers = ?peers,
                    muted = call.is_muted(),
                    empfangen = statistik.angenommen(),
                    lokal = ?call.lokale_adresse(),
                    "Status"
                );
                if zustand == CallState::Error {
                    break Err(zustand);
                }
            }
        }
    };

    call.disconnect();

    match ergebnis {
        Ok(()) => Ok(()),
        Err(zustand) => bail!("Anruf im Zustand {zustand} beendet"),
    }
}
