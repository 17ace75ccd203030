//! Sende-Pipeline (Capture -> Server)
//!
//! ```text
//! Aufnahme-Thread (Takt = Frame-Dauer)
//!     -> CaptureSource::frame_lesen()       nur wenn verbunden und nicht stumm
//!     -> crossbeam bounded Channel
//! Sende-Thread
//!     -> Mikrofon-Gain
//!     -> Pegel an CallEvents
//!     -> PCM-Bytes, auf 640 Bytes begrenzt
//!     -> AudioPacket (Sequenz, Zeitstempel, Benutzer-Hash)
//!     -> UdpSocket::send_to(server)
//!     -> ohne gesendetes Audio (stumm) alle `keepalive_intervall` ein
//!        Paket ohne Nutzdaten, damit der Server die Sitzung behaelt
//! ```

use crate::error::{CallError, CallResult};
use crate::events::CallEvents;
use crate::session::ClientSession;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use voxroom_audio::{pegel_berechnen, verstaerkung_anwenden, AudioFormat, CaptureSource, Lautstaerke};
use voxroom_core::types::UserId;
use voxroom_protocol::voice::{
    benutzer_hash, samples_zu_pcm, AudioPacket, AudioPacketHeader, MAX_CAPTURE_NUTZDATEN,
};

/// Frames zwischen Aufnahme- und Sende-Thread
const FRAME_QUEUE_GROESSE: usize = 4;

/// Wie oft der Sende-Thread das Running-Flag prueft
const POLL_INTERVALL: Duration = Duration::from_millis(100);

/// Alles, was die beiden Capture-Threads teilen
#[derive(Clone)]
pub(crate) struct CaptureKontext {
    pub socket: Arc<UdpSocket>,
    pub server: SocketAddr,
    pub benutzer: UserId,
    pub format: AudioFormat,
    pub keepalive_intervall: Duration,
    pub laeuft: Arc<AtomicBool>,
    pub muted: Arc<AtomicBool>,
    pub gain: Arc<Lautstaerke>,
    pub session: Arc<ClientSession>,
    pub events: Arc<dyn CallEvents>,
}

pub(crate) struct CaptureThreads {
    pub aufnahme: JoinHandle<Box<dyn CaptureSource>>,
    pub sender: JoinHandle<()>,
}

/// Startet Aufnahme- und Sende-Thread
pub(crate) fn starten(
    kontext: CaptureKontext,
    quelle: Box<dyn CaptureSource>,
) -> CallResult<CaptureThreads> {
    let (frame_tx, frame_rx) = bounded::<Vec<i16>>(FRAME_QUEUE_GROESSE);

    let sende_kontext = kontext.clone();
    let sender = std::thread::Builder::new()
        .name("voxroom-send".to_string())
        .spawn(move || sende_loop(sende_kontext, frame_rx))
        .map_err(|e| CallError::InitFehlgeschlagen(format!("Sende-Thread: {e}")))?;

    let aufnahme = std::thread::Builder::new()
        .name("voxroom-capture".to_string())
        .spawn(move || aufnahme_loop(kontext, quelle, frame_tx))
        .map_err(|e| CallError::InitFehlgeschlagen(format!("Capture-Thread: {e}")))?;

    Ok(CaptureThreads { aufnahme, sender })
}

// ---------------------------------------------------------------------------
// Aufnahme-Thread
// ---------------------------------------------------------------------------

fn aufnahme_loop(
    kontext: CaptureKontext,
    mut quelle: Box<dyn CaptureSource>,
    frame_tx: Sender<Vec<i16>>,
) -> Box<dyn CaptureSource> {
    let intervall = kontext.format.frame_dauer();
    let mut frame = vec![0i16; kontext.format.frame_samples()];
    let mut naechster_tick = Instant::now();

    debug!(
        frame_samples = frame.len(),
        intervall_ms = intervall.as_millis() as u64,
        "Aufnahme-Loop gestartet"
    );

    while kontext.laeuft.load(Ordering::Relaxed) {
        naechster_tick += intervall;
        let jetzt = Instant::now();
        if naechster_tick > jetzt {
            std::thread::sleep(naechster_tick - jetzt);
        } else if jetzt - naechster_tick > intervall {
            // Zu weit zurueck (z.B. nach Suspend): Takt neu ausrichten statt nachzuholen
            naechster_tick = jetzt;
        }

        if kontext.muted.load(Ordering::Relaxed) || !kontext.session.ist_verbunden() {
            continue;
        }

        match quelle.frame_lesen(&mut frame) {
            Ok(()) => match frame_tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => trace!("Frame-Queue voll, Frame verworfen"),
                Err(TrySendError::Disconnected(_)) => break,
            },
            Err(e) => {
                warn!(fehler = %e, "Capture-Fehler, versuche Wiederherstellung");
                if let Err(e) = quelle.wiederherstellen() {
                    warn!(fehler = %e, "Wiederherstellung fehlgeschlagen");
                }
            }
        }
    }

    quelle.stoppen();
    debug!("Aufnahme-Loop beendet");
    quelle
}

// ---------------------------------------------------------------------------
// Sende-Thread
// ---------------------------------------------------------------------------

fn sende_loop(kontext: CaptureKontext, frame_rx: Receiver<Vec<i16>>) {
    let hash = benutzer_hash(kontext.benutzer.as_str());
    let mut sequenz: u32 = 0;
    let mut letzte_sendung = Instant::now();
    let warten = POLL_INTERVALL.min(kontext.keepalive_intervall);

    debug!(benutzer = %kontext.benutzer, hash = format_args!("{hash:08x}"), "Sende-Loop gestartet");

    while kontext.laeuft.load(Ordering::Relaxed) {
        match frame_rx.recv_timeout(warten) {
            Ok(frame) => {
                if frame_senden(&kontext, frame, hash, &mut sequenz) {
                    letzte_sendung = Instant::now();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if kontext.session.ist_verbunden() && letzte_sendung.elapsed() >= kontext.keepalive_intervall {
            keepalive_senden(&kontext, hash, sequenz);
            letzte_sendung = Instant::now();
        }
    }

    debug!(gesendet = sequenz, "Sende-Loop beendet");
}

/// Gain, Pegel, Paketbau und Versand eines Frames. `true` wenn gesendet.
fn frame_senden(kontext: &CaptureKontext, mut frame: Vec<i16>, hash: u32, sequenz: &mut u32) -> bool {
    verstaerkung_anwenden(&mut frame, kontext.gain.wert());
    kontext
        .events
        .audio_pegel(kontext.benutzer.as_str(), pegel_berechnen(&frame));

    let mut pcm = samples_zu_pcm(&frame);
    pcm.truncate(MAX_CAPTURE_NUTZDATEN);

    let paket = match AudioPacket::neu(*sequenz, zeitstempel_ms(), hash, pcm) {
        Ok(p) => p,
        Err(e) => {
            warn!(fehler = %e, "Audio-Paket konnte nicht erstellt werden");
            return false;
        }
    };
    *sequenz = sequenz.wrapping_add(1);

    match kontext.socket.send_to(&paket.encode(), kontext.server) {
        Ok(_) => {
            trace!(
                sequence = paket.header.sequence,
                bytes = paket.groesse(),
                "Audio-Paket gesendet"
            );
            true
        }
        Err(e) => {
            warn!(fehler = %e, ziel = %kontext.server, "UDP-Sendefehler");
            false
        }
    }
}

/// Paket ohne Nutzdaten; die Sequenz wird nicht weitergezaehlt
fn keepalive_senden(kontext: &CaptureKontext, hash: u32, sequenz: u32) {
    let paket = AudioPacket {
        header: AudioPacketHeader {
            sequence: sequenz,
            timestamp: zeitstempel_ms(),
            user_id: hash,
            data_size: 0,
        },
        payload: Vec::new(),
    };
    match kontext.socket.send_to(&paket.encode(), kontext.server) {
        Ok(_) => trace!("Keepalive gesendet"),
        Err(e) => warn!(fehler = %e, ziel = %kontext.server, "Keepalive konnte nicht gesendet werden"),
    }
}

/// Wall-Clock in Millisekunden, auf 32 Bit abgeschnitten
fn zeitstempel_ms() -> u32 {
    chrono::Utc::now().timestamp_millis() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeitstempel_ist_abgeschnittene_wall_clock() {
        let vorher = chrono::Utc::now().timestamp_millis() as u32;
        let ts = zeitstempel_ms();
        // Wrap-around zwischen beiden Aufrufen ist praktisch ausgeschlossen
        assert!(ts.wrapping_sub(vorher) < 1000);
    }
}
