//! VoiceCall – ein Anruf in einem Raum
//!
//! Lifecycle:
//! 1. `neu()` – prueft die Konfiguration, noch kein Socket
//! 2. `connect()` – Socket binden, Geraete starten, Threads starten, JOIN senden
//! 3. JOIN_OK vom Server -> Connected, ab jetzt wird gesendet und abgespielt
//! 4. `disconnect()` – LEAVE senden, Threads stoppen und joinen, Geraete zurueck
//! 5. `reinitialisieren()` – zurueck nach Idle fuer den naechsten `connect()`
//!
//! Quelle und Senke wandern beim Verbinden in ihre Threads und kommen beim
//! Trennen ueber die JoinHandles zurueck, damit ein Anruf wiederholt werden kann.

use crate::capture::{self, CaptureKontext, CaptureThreads};
use crate::error::{CallError, CallResult};
use crate::events::CallEvents;
use crate::playback::{self, EmpfangsKontext, PeerTabelle, PlaybackThreads, WiedergabeKontext};
use crate::session::{Ausloeser, CallState, ClientSession};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use voxroom_audio::{AudioFormat, CaptureSource, Lautstaerke, PlaybackSink};
use voxroom_core::types::{RoomId, UserId, MAX_ID_LAENGE};
use voxroom_protocol::control::ControlMessage;

/// Lese-Timeout des Sockets; begrenzt, wie lange der Netzwerk-Thread das
/// Running-Flag nicht sieht
const SOCKET_READ_TIMEOUT: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CallKonfig {
    pub server: SocketAddr,
    pub raum: RoomId,
    pub benutzer: UserId,
    pub format: AudioFormat,
    pub join_timeout: Duration,
    /// Abstand der Keepalive-Pakete, solange kein Audio gesendet wird
    pub keepalive_intervall: Duration,
    pub mikrofon_lautstaerke: f32,
    pub lautsprecher_lautstaerke: f32,
}

impl CallKonfig {
    pub fn neu(server: SocketAddr, raum: impl Into<String>, benutzer: impl Into<String>) -> Self {
        Self {
            server,
            raum: RoomId::new(raum),
            benutzer: UserId::new(benutzer),
            format: AudioFormat::default(),
            join_timeout: Duration::from_millis(5000),
            keepalive_intervall: Duration::from_millis(2000),
            mikrofon_lautstaerke: 1.0,
            lautsprecher_lautstaerke: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Laufzeit eines verbundenen Anrufs
// ---------------------------------------------------------------------------

struct Laufzeit {
    socket: Arc<UdpSocket>,
    laeuft: Arc<AtomicBool>,
    capture: CaptureThreads,
    playback: PlaybackThreads,
}

// ---------------------------------------------------------------------------
// VoiceCall
// ---------------------------------------------------------------------------

pub struct VoiceCall {
    konfig: CallKonfig,
    events: Arc<dyn CallEvents>,
    session: Arc<ClientSession>,
    muted: Arc<AtomicBool>,
    mikrofon: Arc<Lautstaerke>,
    lautsprecher: Arc<Lautstaerke>,
    peers: PeerTabelle,
    quelle: Option<Box<dyn CaptureSource>>,
    senke: Option<Box<dyn PlaybackSink>>,
    laufzeit: Option<Laufzeit>,
}

impl VoiceCall {
    /// Erstellt einen Anruf im Zustand Idle
    ///
    /// # Fehler
    /// - `UngueltigerParameter` bei ungueltiger Kennung, Format oder Lautstaerke
    pub fn neu(
        konfig: CallKonfig,
        events: Arc<dyn CallEvents>,
        quelle: Box<dyn CaptureSource>,
        senke: Box<dyn PlaybackSink>,
    ) -> CallResult<Self> {
        konfig.raum.pruefen(MAX_ID_LAENGE)?;
        konfig.benutzer.pruefen(MAX_ID_LAENGE)?;
        konfig
            .format
            .pruefen()
            .map_err(|e| CallError::UngueltigerParameter(e.to_string()))?;
        if konfig.join_timeout.is_zero() {
            return Err(CallError::UngueltigerParameter(
                "join_timeout muss groesser als 0 sein".into(),
            ));
        }
        if konfig.keepalive_intervall.is_zero() {
            return Err(CallError::UngueltigerParameter(
                "keepalive_intervall muss groesser als 0 sein".into(),
            ));
        }

        let mikrofon = Arc::new(Lautstaerke::neu(konfig.mikrofon_lautstaerke)?);
        let lautsprecher = Arc::new(Lautstaerke::neu(konfig.lautsprecher_lautstaerke)?);

        Ok(Self {
            session: Arc::new(ClientSession::neu(Arc::clone(&events))),
            konfig,
            events,
            muted: Arc::new(AtomicBool::new(false)),
            mikrofon,
            lautsprecher,
            peers: Arc::new(RwLock::new(HashMap::new())),
            quelle: Some(quelle),
            senke: Some(senke),
            laufzeit: None,
        })
    }

    /// Startet den Anruf. Kehrt nach dem Senden des JOIN zurueck; der Wechsel
    /// nach Connected kommt asynchron mit dem JOIN_OK.
    pub fn connect(&mut self) -> CallResult<()> {
        self.session.uebergang(Ausloeser::Verbinden)?;

        info!(
            server = %self.konfig.server,
            raum = %self.konfig.raum,
            benutzer = %self.konfig.benutzer,
            "Verbinde"
        );

        match self.starten() {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(fehler = %e, "Verbindungsaufbau fehlgeschlagen");
                if let Some(laufzeit) = self.laufzeit.take() {
                    self.laufzeit_beenden(laufzeit);
                }
                let _ = self.session.uebergang(Ausloeser::LokalerFehler(e.to_string()));
                self.events.fehler(&e);
                Err(e)
            }
        }
    }

    /// Beendet den Anruf. Ohne laufenden Anruf passiert nichts.
    pub fn disconnect(&mut self) {
        let zustand = self.session.zustand();
        if matches!(zustand, CallState::Idle | CallState::Disconnected) {
            return;
        }

        if let Some(laufzeit) = self.laufzeit.take() {
            let leave = ControlMessage::Leave {
                raum: self.konfig.raum.clone(),
                benutzer: self.konfig.benutzer.clone(),
            };
            if let Err(e) = laufzeit.socket.send_to(&leave.encode(), self.konfig.server) {
                warn!(fehler = %e, "LEAVE konnte nicht gesendet werden");
            }
            self.laufzeit_beenden(laufzeit);
        }

        self.peers.write().clear();
        let _ = self.session.uebergang(Ausloeser::Trennen);
        info!(raum = %self.konfig.raum, "Anruf beendet");
    }

    /// Setzt einen beendeten oder fehlgeschlagenen Anruf auf Idle zurueck
    pub fn reinitialisieren(&mut self) -> CallResult<()> {
        if self.laufzeit.is_some() {
            // Error-Zustand mit noch laufenden Threads (z.B. nach JOIN_FAIL)
            self.disconnect();
        }
        self.session.uebergang(Ausloeser::Reinitialisieren)?;
        Ok(())
    }

    pub fn zustand(&self) -> CallState {
        self.session.zustand()
    }

    /// Mikrofon stumm schalten; Empfang laeuft weiter
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
        info!(muted, "Mikrofon-Mute");
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Mikrofon-Gain in [0, 1]
    pub fn set_mikrofon_lautstaerke(&self, wert: f32) -> CallResult<()> {
        self.mikrofon.setzen(wert)?;
        debug!(wert, "Mikrofon-Lautstaerke gesetzt");
        Ok(())
    }

    /// Lautsprecher-Gain in [0, 1]
    pub fn set_lautsprecher_lautstaerke(&self, wert: f32) -> CallResult<()> {
        self.lautsprecher.setzen(wert)?;
        debug!(wert, "Lautsprecher-Lautstaerke gesetzt");
        Ok(())
    }

    pub fn mikrofon_lautstaerke(&self) -> f32 {
        self.mikrofon.wert()
    }

    pub fn lautsprecher_lautstaerke(&self) -> f32 {
        self.lautsprecher.wert()
    }

    /// Lokale Adresse des Sockets, solange ein Anruf laeuft
    pub fn lokale_adresse(&self) -> Option<SocketAddr> {
        self.laufzeit
            .as_ref()
            .and_then(|l| l.socket.local_addr().ok())
    }

    /// Bekannte Peers im eigenen Raum (nur die seit dem eigenen Beitritt gemeldeten)
    pub fn peers(&self) -> Vec<UserId> {
        let mut liste: Vec<UserId> = self.peers.read().values().cloned().collect();
        liste.sort();
        liste
    }

    /// Loest einen Sender-Hash aus einem Audio-Paket in die Benutzerkennung auf
    pub fn peer_aufloesen(&self, hash: u32) -> CallResult<UserId> {
        self.peers
            .read()
            .get(&hash)
            .cloned()
            .ok_or_else(|| CallError::PeerNichtGefunden(format!("{hash:08x}")))
    }

    pub fn konfig(&self) -> &CallKonfig {
        &self.konfig
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn starten(&mut self) -> CallResult<()> {
        let bind_addr: SocketAddr = if self.konfig.server.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| CallError::Netzwerk(format!("Socket konnte nicht gebunden werden: {e}")))?;
        socket
            .set_read_timeout(Some(SOCKET_READ_TIMEOUT))
            .map_err(|e| CallError::Netzwerk(e.to_string()))?;
        let socket = Arc::new(socket);

        let format = self.konfig.format;
        self.geraete_starten(&format)?;
        let (Some(quelle), Some(senke)) = (self.quelle.take(), self.senke.take()) else {
            return Err(CallError::InitFehlgeschlagen(
                "Audio-Geraete nicht verfuegbar".into(),
            ));
        };

        self.peers.write().clear();
        let laeuft = Arc::new(AtomicBool::new(true));

        let playback = playback::starten(
            EmpfangsKontext {
                socket: Arc::clone(&socket),
                raum: self.konfig.raum.clone(),
                benutzer: self.konfig.benutzer.clone(),
                join_timeout: self.konfig.join_timeout,
                laeuft: Arc::clone(&laeuft),
                session: Arc::clone(&self.session),
                events: Arc::clone(&self.events),
                peers: Arc::clone(&self.peers),
            },
            WiedergabeKontext {
                laeuft: Arc::clone(&laeuft),
                gain: Arc::clone(&self.lautsprecher),
                events: Arc::clone(&self.events),
                peers: Arc::clone(&self.peers),
            },
            senke,
        );
        let playback = match playback {
            Ok(p) => p,
            Err(e) => {
                laeuft.store(false, Ordering::Relaxed);
                self.quelle = Some(quelle);
                return Err(e);
            }
        };

        let capture = capture::starten(
            CaptureKontext {
                socket: Arc::clone(&socket),
                server: self.konfig.server,
                benutzer: self.konfig.benutzer.clone(),
                format,
                keepalive_intervall: self.konfig.keepalive_intervall,
                laeuft: Arc::clone(&laeuft),
                muted: Arc::clone(&self.muted),
                gain: Arc::clone(&self.mikrofon),
                session: Arc::clone(&self.session),
                events: Arc::clone(&self.events),
            },
            quelle,
        );
        let capture = match capture {
            Ok(c) => c,
            Err(e) => {
                laeuft.store(false, Ordering::Relaxed);
                self.senke = playback.wiedergabe.join().ok();
                let _ = playback.netzwerk.join();
                return Err(e);
            }
        };

        let lokale = socket.local_addr().ok();
        self.laufzeit = Some(Laufzeit {
            socket: Arc::clone(&socket),
            laeuft,
            capture,
            playback,
        });

        let join = ControlMessage::Join {
            raum: self.konfig.raum.clone(),
            benutzer: self.konfig.benutzer.clone(),
        };
        socket
            .send_to(&join.encode(), self.konfig.server)
            .map_err(|e| CallError::Netzwerk(format!("JOIN konnte nicht gesendet werden: {e}")))?;

        debug!(lokal = ?lokale, "JOIN gesendet");
        Ok(())
    }

    /// Startet Quelle und Senke; bei Fehlern bleiben beide im VoiceCall
    fn geraete_starten(&mut self, format: &AudioFormat) -> CallResult<()> {
        let quelle = self
            .quelle
            .as_mut()
            .ok_or_else(|| CallError::InitFehlgeschlagen("Keine Aufnahmequelle".into()))?;
        quelle.starten(format)?;

        let senke = self
            .senke
            .as_mut()
            .ok_or_else(|| CallError::InitFehlgeschlagen("Keine Wiedergabesenke".into()))?;
        if let Err(e) = senke.starten(format) {
            if let Some(q) = self.quelle.as_mut() {
                q.stoppen();
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Stoppt alle Threads und holt Quelle und Senke zurueck
    fn laufzeit_beenden(&mut self, laufzeit: Laufzeit) {
        laufzeit.laeuft.store(false, Ordering::Relaxed);

        match laufzeit.capture.aufnahme.join() {
            Ok(quelle) => self.quelle = Some(quelle),
            Err(_) => warn!("Capture-Thread ist abgestuerzt"),
        }
        let _ = laufzeit.capture.sender.join();
        let _ = laufzeit.playback.netzwerk.join();
        match laufzeit.playback.wiedergabe.join() {
            Ok(senke) => self.senke = Some(senke),
            Err(_) => warn!("Playback-Thread ist abgestuerzt"),
        }

        debug!("Anruf-Threads beendet");
    }
}

impl Drop for VoiceCall {
    fn drop(&mut self) {
        self.disconnect();
        debug!("VoiceCall gedroppt");
    }
}
