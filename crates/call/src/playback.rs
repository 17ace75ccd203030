//! Empfangs-Pipeline (Server -> Playback)
//!
//! ```text
//! Netzwerk-Thread: UdpSocket::recv_from() (Timeout 100 ms)
//!     -> Steuernachricht?  JOIN_OK / JOIN_FAIL -> ClientSession
//!                          JOIN / LEAVE        -> Peer-Benachrichtigung
//!     -> AudioPacket::decode()                 <- Validierung
//!     -> eigener Hash? nicht verbunden? -> verwerfen
//!     -> crossbeam bounded(10), bei voller Queue verwerfen
//! Playback-Thread
//!     -> Lautsprecher-Gain -> Stille verwerfen -> Pegel
//!     -> PlaybackSink::einreihen(), bei PufferVoll einmal nach 10 ms wiederholen
//! ```

use crate::error::{CallError, CallResult};
use crate::events::CallEvents;
use crate::session::{Ausloeser, CallState, ClientSession};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use voxroom_audio::{ist_stille, pegel_berechnen, verstaerkung_anwenden, AudioError, Lautstaerke, PlaybackSink};
use voxroom_core::types::{RoomId, UserId};
use voxroom_protocol::control::ControlMessage;
use voxroom_protocol::voice::{benutzer_hash, AudioPacket};

/// Maximale Anzahl wartender Pakete vor dem Playback-Thread
pub(crate) const PLAYBACK_QUEUE_GROESSE: usize = 10;

/// Wartezeit vor dem einzigen Wiederholungsversuch bei vollem Ausgabepuffer
const PUFFER_WARTEZEIT: Duration = Duration::from_millis(10);

const POLL_INTERVALL: Duration = Duration::from_millis(100);

const UDP_BUFFER_SIZE: usize = 2048;

/// Hash -> Benutzerkennung der bekannten Peers
pub(crate) type PeerTabelle = Arc<RwLock<HashMap<u32, UserId>>>;

// ---------------------------------------------------------------------------
// Netzwerk-Thread
// ---------------------------------------------------------------------------

pub(crate) struct EmpfangsKontext {
    pub socket: Arc<UdpSocket>,
    pub raum: RoomId,
    pub benutzer: UserId,
    pub join_timeout: Duration,
    pub laeuft: Arc<AtomicBool>,
    pub session: Arc<ClientSession>,
    pub events: Arc<dyn CallEvents>,
    pub peers: PeerTabelle,
}

pub(crate) struct WiedergabeKontext {
    pub laeuft: Arc<AtomicBool>,
    pub gain: Arc<Lautstaerke>,
    pub events: Arc<dyn CallEvents>,
    pub peers: PeerTabelle,
}

pub(crate) struct PlaybackThreads {
    pub netzwerk: JoinHandle<()>,
    pub wiedergabe: JoinHandle<Box<dyn PlaybackSink>>,
}

/// Startet Netzwerk- und Playback-Thread
pub(crate) fn starten(
    empfang: EmpfangsKontext,
    wiedergabe: WiedergabeKontext,
    senke: Box<dyn PlaybackSink>,
) -> CallResult<PlaybackThreads> {
    let (paket_tx, paket_rx) = bounded::<AudioPacket>(PLAYBACK_QUEUE_GROESSE);

    let netzwerk = std::thread::Builder::new()
        .name("voxroom-net".to_string())
        .spawn(move || empfangs_loop(empfang, paket_tx))
        .map_err(|e| CallError::InitFehlgeschlagen(format!("Netzwerk-Thread: {e}")))?;

    let wiedergabe = std::thread::Builder::new()
        .name("voxroom-playback".to_string())
        .spawn(move || wiedergabe_loop(wiedergabe, senke, paket_rx))
        .map_err(|e| CallError::InitFehlgeschlagen(format!("Playback-Thread: {e}")))?;

    Ok(PlaybackThreads {
        netzwerk,
        wiedergabe,
    })
}

fn empfangs_loop(kontext: EmpfangsKontext, paket_tx: Sender<AudioPacket>) {
    let eigener_hash = benutzer_hash(kontext.benutzer.as_str());
    let start = Instant::now();
    let mut buf = [0u8; UDP_BUFFER_SIZE];

    debug!("Empfangs-Loop gestartet");

    while kontext.laeuft.load(Ordering::Relaxed) {
        match kontext.socket.recv_from(&mut buf) {
            Ok((len, absender)) => {
                datagramm_verarbeiten(&kontext, &buf[..len], absender, eigener_hash, &paket_tx);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                if kontext.laeuft.load(Ordering::Relaxed) {
                    warn!(fehler = %e, "UDP-Empfangsfehler");
                }
                std::thread::sleep(PUFFER_WARTEZEIT);
            }
        }

        if kontext.session.zustand() == CallState::Connecting
            && start.elapsed() >= kontext.join_timeout
        {
            warn!(
                timeout_ms = kontext.join_timeout.as_millis() as u64,
                "Keine Antwort auf JOIN"
            );
            if let Ok(CallState::Error) = kontext.session.uebergang(Ausloeser::JoinTimeout) {
                kontext
                    .events
                    .fehler(&CallError::Netzwerk("join timeout".to_string()));
            }
        }
    }

    debug!("Empfangs-Loop beendet");
}

fn datagramm_verarbeiten(
    kontext: &EmpfangsKontext,
    daten: &[u8],
    absender: SocketAddr,
    eigener_hash: u32,
    paket_tx: &Sender<AudioPacket>,
) {
    match ControlMessage::erkennen(daten) {
        Some(Ok(nachricht)) => steuernachricht_verarbeiten(kontext, nachricht),
        Some(Err(e)) => debug!(absender = %absender, fehler = %e, "Ungueltige Steuernachricht"),
        None => {
            let paket = match AudioPacket::decode(daten) {
                Ok(p) => p,
                Err(e) => {
                    debug!(absender = %absender, bytes = daten.len(), fehler = %e, "Ungueltiges Audio-Paket");
                    return;
                }
            };

            if paket.header.user_id == eigener_hash {
                trace!("Eigenes Paket ignoriert");
                return;
            }
            if !kontext.session.ist_verbunden() {
                trace!("Audio vor dem Beitritt ignoriert");
                return;
            }

            match paket_tx.try_send(paket) {
                Ok(()) => {}
                Err(TrySendError::Full(p)) => trace!(
                    sequence = p.header.sequence,
                    "Playback-Queue voll, Paket verworfen"
                ),
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }
}

fn steuernachricht_verarbeiten(kontext: &EmpfangsKontext, nachricht: ControlMessage) {
    match nachricht {
        ControlMessage::JoinOk { raum, benutzer } => {
            if raum == kontext.raum && benutzer == kontext.benutzer {
                let _ = kontext.session.uebergang(Ausloeser::BeitrittBestaetigt);
            } else {
                debug!(raum = %raum, benutzer = %benutzer, "JOIN_OK fuer fremden Beitritt ignoriert");
            }
        }
        ControlMessage::JoinFail => {
            info!(raum = %kontext.raum, "Beitritt vom Server abgelehnt");
            let _ = kontext.session.uebergang(Ausloeser::BeitrittAbgelehnt);
        }
        ControlMessage::Join { raum, benutzer } => {
            if raum == kontext.raum && benutzer != kontext.benutzer {
                info!(peer = %benutzer, "Peer beigetreten");
                kontext
                    .peers
                    .write()
                    .insert(benutzer_hash(benutzer.as_str()), benutzer.clone());
                kontext.events.peer_beigetreten(&benutzer);
            }
        }
        ControlMessage::Leave { raum, benutzer } => {
            if raum == kontext.raum && benutzer != kontext.benutzer {
                info!(peer = %benutzer, "Peer hat den Raum verlassen");
                kontext.peers.write().remove(&benutzer_hash(benutzer.as_str()));
                kontext.events.peer_verlassen(&benutzer);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Playback-Thread
// ---------------------------------------------------------------------------

/// Ergebnis der Wiedergabe eines Pakets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wiedergabe {
    Eingereiht,
    /// Alle Samples nach dem Gain Null
    Still,
    /// Senke hatte auch nach dem Wiederholungsversuch keinen Platz
    PufferVoll,
    Fehler,
}

fn wiedergabe_loop(
    kontext: WiedergabeKontext,
    mut senke: Box<dyn PlaybackSink>,
    paket_rx: Receiver<AudioPacket>,
) -> Box<dyn PlaybackSink> {
    debug!("Playback-Loop gestartet");

    while kontext.laeuft.load(Ordering::Relaxed) {
        let paket = match paket_rx.recv_timeout(POLL_INTERVALL) {
            Ok(p) => p,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let schluessel = pegel_schluessel(&kontext.peers, paket.header.user_id);
        let ergebnis = paket_wiedergeben(
            senke.as_mut(),
            paket.samples(),
            kontext.gain.wert(),
            |pegel| kontext.events.audio_pegel(&schluessel, pegel),
        );
        trace!(
            sequence = paket.header.sequence,
            von = %schluessel,
            ergebnis = ?ergebnis,
            "Audio-Paket verarbeitet"
        );
    }

    senke.stoppen();
    debug!("Playback-Loop beendet");
    senke
}

/// Gain, Stille-Erkennung, Pegel und Einreihen eines Sample-Blocks
pub(crate) fn paket_wiedergeben(
    senke: &mut dyn PlaybackSink,
    mut samples: Vec<i16>,
    gain: f32,
    pegel_melden: impl FnOnce(f32),
) -> Wiedergabe {
    verstaerkung_anwenden(&mut samples, gain);
    if ist_stille(&samples) {
        return Wiedergabe::Still;
    }

    pegel_melden(pegel_berechnen(&samples));

    match senke.einreihen(&samples) {
        Ok(()) => Wiedergabe::Eingereiht,
        Err(AudioError::PufferVoll) => {
            std::thread::sleep(PUFFER_WARTEZEIT);
            match senke.einreihen(&samples) {
                Ok(()) => Wiedergabe::Eingereiht,
                Err(AudioError::PufferVoll) => {
                    trace!("Ausgabepuffer weiterhin voll, Paket verworfen");
                    Wiedergabe::PufferVoll
                }
                Err(e) => {
                    warn!(fehler = %e, "Playback-Fehler");
                    Wiedergabe::Fehler
                }
            }
        }
        Err(e) => {
            warn!(fehler = %e, "Playback-Fehler");
            Wiedergabe::Fehler
        }
    }
}

/// Bekannter Peer-Name oder der Hash als Hex-String
pub(crate) fn pegel_schluessel(peers: &PeerTabelle, hash: u32) -> String {
    match peers.read().get(&hash) {
        Some(name) => name.to_string(),
        None => format!("{hash:08x}"),
    }
}
