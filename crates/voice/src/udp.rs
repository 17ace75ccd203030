//! UDP Relay Server – Empfangs-Loop um den [`PacketRelay`]
//!
//! ## Architektur
//!
//! ```text
//! UDP Socket (recv_from)
//!     |
//!     v
//! PacketRelay::verarbeiten()   <- Registry-Aenderung, Fan-out-Liste
//!     |
//!     v
//! UDP send_to pro Ausgang      <- Fehler werden geloggt, nicht wiederholt
//! ```
//!
//! Die Loop ist der einzige Schreiber der Registry. Neben dem Socket wartet
//! sie auf das Shutdown-Signal und, falls ein Sitzungs-Timeout gesetzt ist,
//! auf den periodischen Bereinigungs-Tick.

use crate::relay::{Ausgang, PacketRelay, RelayKonfig};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use voxroom_protocol::voice::{HEADER_GROESSE, MAX_NUTZDATEN};

/// Empfangspuffer; groesser als das groesste gueltige Paket, damit zu lange
/// Datagramme als solche erkannt und nicht abgeschnitten akzeptiert werden
const UDP_BUFFER_SIZE: usize = 2048;

/// Untergrenze fuer das Bereinigungs-Intervall
const MIN_BEREINIGUNGS_INTERVALL: Duration = Duration::from_millis(100);

pub struct RelayServer {
    socket: UdpSocket,
    relay: PacketRelay,
}

impl RelayServer {
    /// Bindet den UDP-Socket
    pub async fn binden(bind_addr: SocketAddr, konfig: RelayKonfig) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        tracing::info!(
            addr = %bind_addr,
            max_clients = konfig.max_clients,
            "UDP Relay Server gebunden"
        );

        Ok(Self {
            socket,
            relay: PacketRelay::neu(konfig),
        })
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn relay(&self) -> &PacketRelay {
        &self.relay
    }

    /// Startet die Empfangs-Loop (laeuft bis `shutdown_rx` ein Signal sendet)
    ///
    /// Gibt den Relay mit seinem Endzustand zurueck.
    pub async fn empfangs_loop_starten(
        mut self,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> PacketRelay {
        let mut buf = [0u8; UDP_BUFFER_SIZE];
        let mut ausgang: Vec<Ausgang> = Vec::new();

        let timeout = self.relay.konfig().sitzungs_timeout;
        let intervall = timeout
            .map(|t| (t / 2).max(MIN_BEREINIGUNGS_INTERVALL))
            .unwrap_or(Duration::from_secs(60));
        let mut bereinigung = tokio::time::interval(intervall);
        bereinigung.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            sitzungs_timeout_sek = timeout.map(|t| t.as_secs()).unwrap_or(0),
            "Relay-Empfangs-Loop gestartet"
        );

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, absender)) => {
                            self.relay.verarbeiten(&buf[..len], absender, Instant::now(), &mut ausgang);
                            self.ausgang_senden(&mut ausgang).await;
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "UDP-Empfangsfehler");
                            // Busy-Loop bei persistentem Fehler vermeiden
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                }

                _ = bereinigung.tick(), if timeout.is_some() => {
                    let entfernt = self.relay.inaktive_bereinigen(Instant::now(), &mut ausgang);
                    if entfernt > 0 {
                        tracing::debug!(
                            entfernt,
                            clients = self.relay.registry().client_anzahl(),
                            raeume = self.relay.registry().raum_anzahl(),
                            "Bereinigung abgeschlossen"
                        );
                    }
                    self.ausgang_senden(&mut ausgang).await;
                }

                _ = &mut shutdown_rx => {
                    tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        tracing::info!(
            clients = self.relay.registry().client_anzahl(),
            raeume = self.relay.registry().raum_anzahl(),
            "Relay-Empfangs-Loop beendet"
        );
        self.relay
    }

    /// Versendet und leert den Ausgangspuffer
    async fn ausgang_senden(&self, ausgang: &mut Vec<Ausgang>) {
        for a in ausgang.drain(..) {
            match self.socket.send_to(&a.daten, a.ziel).await {
                Ok(_) => {
                    tracing::trace!(bytes = a.daten.len(), ziel = %a.ziel, "UDP-Paket gesendet");
                }
                Err(e) => {
                    tracing::warn!(fehler = %e, ziel = %a.ziel, "UDP-Sendefehler");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
