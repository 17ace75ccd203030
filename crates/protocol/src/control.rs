//! Control-Protokoll (Text, UDP)
//!
//! Mitgliedschaft wird ueber kurze ASCII-Nachrichten auf demselben UDP-Socket
//! wie die Audio-Daten verwaltet:
//!
//! ```text
//! JOIN:<raum>:<benutzer>      Client -> Server
//! JOIN_OK:<raum>:<benutzer>   Server -> anfragender Client
//! JOIN_FAIL                   Server -> Client
//! LEAVE:<raum>:<benutzer>     Client -> Server, Server -> restliche Mitglieder
//! ```
//!
//! Erkannt wird ausschliesslich ueber das Byte-Praefix. Alles ohne bekanntes
//! Praefix ist ein Kandidat fuer ein Audio-Paket.

use crate::error::{ProtokollFehler, ProtokollResult};
use voxroom_core::types::{RoomId, UserId, FELD_TRENNER};

pub const PRAEFIX_JOIN: &[u8] = b"JOIN:";
pub const PRAEFIX_JOIN_OK: &[u8] = b"JOIN_OK";
pub const PRAEFIX_JOIN_FAIL: &[u8] = b"JOIN_FAIL";
pub const PRAEFIX_LEAVE: &[u8] = b"LEAVE:";

/// Eine Steuernachricht des Text-Protokolls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Beitrittswunsch (bzw. Beitritts-Broadcast an andere Mitglieder)
    Join { raum: RoomId, benutzer: UserId },
    /// Bestaetigung des Beitritts an den anfragenden Client
    JoinOk { raum: RoomId, benutzer: UserId },
    /// Beitritt abgelehnt
    JoinFail,
    /// Austritt (bzw. Austritts-Broadcast an verbleibende Mitglieder)
    Leave { raum: RoomId, benutzer: UserId },
}

impl ControlMessage {
    /// Erkennt eine Steuernachricht am Praefix.
    ///
    /// - `None`: kein Steuer-Praefix, das Datagramm ist ein Audio-Kandidat
    /// - `Some(Err(_))`: Praefix passt, aber die Felder sind unvollstaendig
    pub fn erkennen(daten: &[u8]) -> Option<ProtokollResult<Self>> {
        // JOIN_OK/JOIN_FAIL vor JOIN: pruefen ist nicht noetig ("JOIN_" != "JOIN:"),
        // die Reihenfolge folgt trotzdem der Spezifitaet
        if let Some(rest) = daten.strip_prefix(PRAEFIX_JOIN_OK) {
            let ergebnis = match rest.strip_prefix(b":") {
                Some(felder) => {
                    felder_parsen(felder, "JOIN_OK").map(|(raum, benutzer)| Self::JoinOk { raum, benutzer })
                }
                None => Err(ProtokollFehler::FehlendesFeld("JOIN_OK")),
            };
            return Some(ergebnis);
        }
        if daten.starts_with(PRAEFIX_JOIN_FAIL) {
            return Some(Ok(Self::JoinFail));
        }
        if let Some(felder) = daten.strip_prefix(PRAEFIX_JOIN) {
            return Some(felder_parsen(felder, "JOIN").map(|(raum, benutzer)| Self::Join { raum, benutzer }));
        }
        if let Some(felder) = daten.strip_prefix(PRAEFIX_LEAVE) {
            return Some(felder_parsen(felder, "LEAVE").map(|(raum, benutzer)| Self::Leave { raum, benutzer }));
        }
        None
    }

    /// Erkennt nur die Nachrichten, die ein Client an den Server schickt
    /// (`JOIN:` und `LEAVE:`). Alles andere, auch ein Datagramm mit
    /// `JOIN_OK`-Praefix, ist auf dem Server ein Audio-Kandidat.
    pub fn vom_client_erkennen(daten: &[u8]) -> Option<ProtokollResult<Self>> {
        if let Some(felder) = daten.strip_prefix(PRAEFIX_JOIN) {
            return Some(felder_parsen(felder, "JOIN").map(|(raum, benutzer)| Self::Join { raum, benutzer }));
        }
        if let Some(felder) = daten.strip_prefix(PRAEFIX_LEAVE) {
            return Some(felder_parsen(felder, "LEAVE").map(|(raum, benutzer)| Self::Leave { raum, benutzer }));
        }
        None
    }

    /// Serialisiert die Nachricht in ihre Wire-Form
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Kurzname des Nachrichtentyps (fuer Logs)
    pub fn art(&self) -> &'static str {
        match self {
            Self::Join { .. } => "JOIN",
            Self::JoinOk { .. } => "JOIN_OK",
            Self::JoinFail => "JOIN_FAIL",
            Self::Leave { .. } => "LEAVE",
        }
    }
}

impl std::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join { raum, benutzer } => write!(f, "JOIN:{raum}:{benutzer}"),
            Self::JoinOk { raum, benutzer } => write!(f, "JOIN_OK:{raum}:{benutzer}"),
            Self::JoinFail => f.write_str("JOIN_FAIL"),
            Self::Leave { raum, benutzer } => write!(f, "LEAVE:{raum}:{benutzer}"),
        }
    }
}

/// Zerlegt `<raum>:<benutzer>`. Der Benutzer ist der gesamte Rest nach dem
/// ersten Trenner; weitere ':' bleiben erhalten und fallen erst bei der
/// Kennungs-Validierung im Relay auf.
fn felder_parsen(felder: &[u8], art: &'static str) -> ProtokollResult<(RoomId, UserId)> {
    let text = std::str::from_utf8(felder).map_err(|_| ProtokollFehler::KeinUtf8)?;
    let (raum, benutzer) = text
        .split_once(FELD_TRENNER)
        .ok_or(ProtokollFehler::FehlendesFeld(art))?;
    Ok((RoomId::new(raum), UserId::new(benutzer)))
}
