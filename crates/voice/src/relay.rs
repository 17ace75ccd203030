//! Packet Relay – Klassifizierung und Fan-out eingehender Datagramme
//!
//! Reine Logik ohne Socket: `verarbeiten()` bekommt ein Datagramm und den
//! Absender, veraendert die [`RoomRegistry`] und legt die zu sendenden
//! Datagramme in einen Ausgangspuffer. Die UDP-Schicht (`udp.rs`) versendet sie.
//!
//! ```text
//! Datagramm
//!     |
//!     +-- "JOIN:"  -> Validierung -> Registry -> JOIN_OK an Absender
//!     |                                       -> JOIN an restliche Mitglieder
//!     +-- "LEAVE:" -> Registry -> LEAVE an verbleibende Mitglieder
//!     |
//!     +-- sonst    -> AudioPacket::pruefen() -> Raum des Absenders
//!                                            -> leer: Keepalive, sonst
//!                                               Original-Bytes an alle anderen
//!
//! Jedes Datagramm eines registrierten Endpunkts erneuert dessen Aktivitaet.
//! ```

use crate::registry::{RoomRegistry, Sitzung};
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use voxroom_core::types::{RoomId, UserId, MAX_ID_LAENGE};
use voxroom_core::VoxroomError;
use voxroom_protocol::control::ControlMessage;
use voxroom_protocol::voice::AudioPacket;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RelayKonfig {
    /// Maximale Anzahl gleichzeitiger Sitzungen
    pub max_clients: usize,
    /// Maximale Laenge von Raum- und Benutzerkennung in Bytes
    pub max_id_laenge: usize,
    /// Inaktivitaets-Timeout; `None` = deaktiviert
    pub sitzungs_timeout: Option<Duration>,
}

impl Default for RelayKonfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            max_id_laenge: MAX_ID_LAENGE,
            sitzungs_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgang / Verarbeitung
// ---------------------------------------------------------------------------

/// Ein zu sendendes Datagramm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ausgang {
    pub daten: Bytes,
    pub ziel: SocketAddr,
}

/// Ergebnis der Verarbeitung eines Datagramms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verarbeitung {
    Beigetreten {
        raum: RoomId,
        benutzer: UserId,
        /// Anzahl der Mitglieder, die den JOIN-Broadcast erhalten
        benachrichtigt: usize,
    },
    /// JOIN abgelehnt, JOIN_FAIL wurde an den Absender gelegt
    Abgelehnt(String),
    Verlassen {
        raum: RoomId,
        benutzer: UserId,
        benachrichtigt: usize,
    },
    /// LEAVE fuer einen Endpunkt, der nicht Mitglied des Raums ist
    NichtGefunden,
    AudioWeitergeleitet {
        raum: RoomId,
        empfaenger: usize,
    },
    /// Audio-Paket ohne Nutzdaten; haelt die Sitzung am Leben, wird nicht
    /// weitergeleitet
    KeepAlive,
    /// Ohne Antwort verworfen
    Verworfen(&'static str),
}

// ---------------------------------------------------------------------------
// PacketRelay
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PacketRelay {
    registry: RoomRegistry,
    konfig: RelayKonfig,
}

impl PacketRelay {
    pub fn neu(konfig: RelayKonfig) -> Self {
        Self {
            registry: RoomRegistry::neu(),
            konfig,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn konfig(&self) -> &RelayKonfig {
        &self.konfig
    }

    /// Verarbeitet ein eingehendes Datagramm.
    ///
    /// Zu sendende Datagramme werden an `ausgang` angehaengt.
    pub fn verarbeiten(
        &mut self,
        daten: &[u8],
        von: SocketAddr,
        jetzt: Instant,
        ausgang: &mut Vec<Ausgang>,
    ) -> Verarbeitung {
        // Jedes Datagramm eines registrierten Endpunkts zaehlt als Aktivitaet
        self.registry.aktivitaet_vermerken(&von, jetzt);

        match ControlMessage::vom_client_erkennen(daten) {
            Some(Ok(ControlMessage::Join { raum, benutzer })) => {
                self.join_verarbeiten(raum, benutzer, von, jetzt, ausgang)
            }
            Some(Ok(ControlMessage::Leave { raum, benutzer })) => {
                self.leave_verarbeiten(raum, benutzer, von, ausgang)
            }
            Some(Ok(andere)) => {
                tracing::debug!(absender = %von, art = andere.art(), "Unerwartete Steuernachricht");
                Verarbeitung::Verworfen("unerwartete Steuernachricht")
            }
            Some(Err(e)) => {
                tracing::debug!(absender = %von, fehler = %e, "Ungueltige Steuernachricht");
                Verarbeitung::Verworfen("ungueltige Steuernachricht")
            }
            None => self.audio_verarbeiten(daten, von, jetzt, ausgang),
        }
    }

    /// Entfernt inaktive Sitzungen und kuendigt sie per LEAVE an
    ///
    /// Gibt die Anzahl entfernter Sitzungen zurueck. Ohne konfigurierten
    /// Timeout passiert nichts.
    pub fn inaktive_bereinigen(&mut self, jetzt: Instant, ausgang: &mut Vec<Ausgang>) -> usize {
        let Some(timeout) = self.konfig.sitzungs_timeout else {
            return 0;
        };

        let entfernt = self.registry.inaktive_bereinigen(timeout, jetzt);
        for sitzung in &entfernt {
            let nachricht = ControlMessage::Leave {
                raum: sitzung.raum_id.clone(),
                benutzer: sitzung.user_id.clone(),
            };
            let benachrichtigt =
                self.broadcast(&sitzung.raum_id, &sitzung.endpunkt, Bytes::from(nachricht.encode()), ausgang);
            tracing::info!(
                endpunkt = %sitzung.endpunkt,
                raum = %sitzung.raum_id,
                benutzer = %sitzung.user_id,
                benachrichtigt,
                "Inaktive Sitzung entfernt"
            );
        }
        entfernt.len()
    }

    // -----------------------------------------------------------------------
    // Steuernachrichten
    // -----------------------------------------------------------------------

    fn join_verarbeiten(
        &mut self,
        raum: RoomId,
        benutzer: UserId,
        von: SocketAddr,
        jetzt: Instant,
        ausgang: &mut Vec<Ausgang>,
    ) -> Verarbeitung {
        if let Err(e) = self.join_pruefen(&raum, &benutzer, &von) {
            tracing::info!(absender = %von, raum = %raum, benutzer = %benutzer, grund = %e, "JOIN abgelehnt");
            ausgang.push(Ausgang {
                daten: Bytes::from(ControlMessage::JoinFail.encode()),
                ziel: von,
            });
            return Verarbeitung::Abgelehnt(e.to_string());
        }

        if let Some(alt) = self
            .registry
            .mitglied_hinzufuegen(von, benutzer.clone(), raum.clone(), jetzt)
        {
            // Der alte Raum kennt den Client unter seiner bisherigen Kennung
            let leave = ControlMessage::Leave {
                raum: alt.raum_id.clone(),
                benutzer: alt.user_id,
            };
            self.broadcast(&alt.raum_id, &von, Bytes::from(leave.encode()), ausgang);
        }

        let ok = ControlMessage::JoinOk {
            raum: raum.clone(),
            benutzer: benutzer.clone(),
        };
        ausgang.push(Ausgang {
            daten: Bytes::from(ok.encode()),
            ziel: von,
        });

        let join = ControlMessage::Join {
            raum: raum.clone(),
            benutzer: benutzer.clone(),
        };
        let benachrichtigt = self.broadcast(&raum, &von, Bytes::from(join.encode()), ausgang);

        tracing::info!(
            endpunkt = %von,
            raum = %raum,
            benutzer = %benutzer,
            mitglieder = benachrichtigt + 1,
            "Client beigetreten"
        );

        Verarbeitung::Beigetreten {
            raum,
            benutzer,
            benachrichtigt,
        }
    }

    fn join_pruefen(&self, raum: &RoomId, benutzer: &UserId, von: &SocketAddr) -> Result<(), VoxroomError> {
        raum.pruefen(self.konfig.max_id_laenge)?;
        benutzer.pruefen(self.konfig.max_id_laenge)?;

        let bekannt = self.registry.sitzung(von).is_some();
        if !bekannt && self.registry.client_anzahl() >= self.konfig.max_clients {
            return Err(VoxroomError::ServerVoll(self.konfig.max_clients));
        }
        Ok(())
    }

    fn leave_verarbeiten(
        &mut self,
        raum: RoomId,
        benutzer: UserId,
        von: SocketAddr,
        ausgang: &mut Vec<Ausgang>,
    ) -> Verarbeitung {
        // Entfernt wird nach Endpunkt; die Benutzerkennung wird nicht gegen
        // die Sitzung geprueft und unveraendert weitergereicht
        let Some(sitzung) = self.registry.mitglied_entfernen(&von, &raum) else {
            tracing::debug!(absender = %von, raum = %raum, "LEAVE ohne Mitgliedschaft");
            return Verarbeitung::NichtGefunden;
        };

        let leave = ControlMessage::Leave {
            raum: raum.clone(),
            benutzer: benutzer.clone(),
        };
        let benachrichtigt = self.broadcast(&raum, &von, Bytes::from(leave.encode()), ausgang);

        tracing::info!(
            endpunkt = %von,
            raum = %raum,
            benutzer = %benutzer,
            sitzung_benutzer = %sitzung.user_id,
            benachrichtigt,
            "Client hat den Raum verlassen"
        );

        Verarbeitung::Verlassen {
            raum,
            benutzer,
            benachrichtigt,
        }
    }

    // -----------------------------------------------------------------------
    // Audio
    // -----------------------------------------------------------------------

    fn audio_verarbeiten(
        &mut self,
        daten: &[u8],
        von: SocketAddr,
        jetzt: Instant,
        ausgang: &mut Vec<Ausgang>,
    ) -> Verarbeitung {
        let header = match AudioPacket::pruefen(daten) {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!(absender = %von, bytes = daten.len(), fehler = %e, "Ungueltiges Audio-Paket");
                return Verarbeitung::Verworfen("ungueltiges Audio-Paket");
            }
        };

        let Some(raum) = self.registry.raum_von(&von).cloned() else {
            tracing::debug!(absender = %von, "Audio von unbekanntem Absender");
            return Verarbeitung::Verworfen("unbekannter Absender");
        };

        if !self.registry.ist_mitglied(&von, &raum) {
            tracing::debug!(absender = %von, raum = %raum, "Absender nicht Mitglied des Raums");
            return Verarbeitung::Verworfen("kein Mitglied");
        }

        if header.data_size == 0 {
            tracing::trace!(absender = %von, raum = %raum, "Keepalive");
            return Verarbeitung::KeepAlive;
        }

        // Ein Puffer fuer alle Empfaenger, Bytes unveraendert
        let empfaenger = self.broadcast(&raum, &von, Bytes::copy_from_slice(daten), ausgang);

        tracing::trace!(
            absender = %von,
            raum = %raum,
            sequence = header.sequence,
            bytes = daten.len(),
            empfaenger,
            "Audio-Paket weitergeleitet"
        );

        Verarbeitung::AudioWeitergeleitet { raum, empfaenger }
    }

    /// Legt `daten` fuer jedes Raummitglied ausser `absender` in den Ausgang
    fn broadcast(
        &self,
        raum: &RoomId,
        absender: &SocketAddr,
        daten: Bytes,
        ausgang: &mut Vec<Ausgang>,
    ) -> usize {
        let vorher = ausgang.len();
        ausgang.extend(
            self.registry
                .mitglieder(raum)
                .filter(|s: &&Sitzung| s.endpunkt != *absender)
                .map(|s| Ausgang {
                    daten: daten.clone(),
                    ziel: s.endpunkt,
                }),
        );
        ausgang.len() - vorher
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
