//! Client-Sitzung – Zustandsmaschine eines Anrufs
//!
//! ```text
//!            Verbinden                 JOIN_OK
//!   Idle ─────────────> Connecting ─────────────> Connected
//!    ^                      │  JOIN_FAIL / Timeout     │
//!    │ Reinitialisieren     v  / lokaler Fehler        │ Trennen
//!    └──────────────── Error / Disconnected <──────────┘
//! ```
//!
//! Der Zustand wird nur ueber [`ClientSession::uebergang`] veraendert. Jeder
//! tatsaechliche Wechsel loest genau eine `zustand_geaendert`-Benachrichtigung
//! aus; Ereignisse ohne Wirkung bleiben stumm.

use crate::error::{CallError, CallResult};
use crate::events::CallEvents;
use parking_lot::Mutex;
use std::sync::Arc;

/// Zustand eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Ausloeser eines Zustandswechsels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ausloeser {
    Verbinden,
    /// JOIN_OK fuer den eigenen Beitritt
    BeitrittBestaetigt,
    /// JOIN_FAIL
    BeitrittAbgelehnt,
    JoinTimeout,
    /// Socket-, Geraete- oder sonstiger lokaler Fehler
    LokalerFehler(String),
    Trennen,
    Reinitialisieren,
}

/// Reine Uebergangsfunktion.
///
/// `Ok(None)`: das Ereignis hat im aktuellen Zustand keine Wirkung.
pub fn naechster_zustand(
    aktuell: CallState,
    ausloeser: &Ausloeser,
) -> CallResult<Option<(CallState, String)>> {
    use CallState::*;

    let ziel = match (aktuell, ausloeser) {
        (Idle, Ausloeser::Verbinden) => Some((Connecting, "Connecting to server...".to_string())),
        (_, Ausloeser::Verbinden) => return Err(CallError::BereitsImAnruf),

        (Connecting, Ausloeser::BeitrittBestaetigt) => {
            Some((Connected, "Connected successfully".to_string()))
        }
        (Connecting, Ausloeser::BeitrittAbgelehnt) => {
            Some((Error, "Join rejected by server".to_string()))
        }
        (Connecting, Ausloeser::JoinTimeout) => Some((Error, "join timeout".to_string())),
        (_, Ausloeser::BeitrittBestaetigt | Ausloeser::BeitrittAbgelehnt | Ausloeser::JoinTimeout) => None,

        (Error, Ausloeser::LokalerFehler(_)) => None,
        (_, Ausloeser::LokalerFehler(grund)) => Some((Error, grund.clone())),

        (Connecting | Connected | Error, Ausloeser::Trennen) => {
            Some((Disconnected, "Disconnected".to_string()))
        }
        (Idle | Disconnected, Ausloeser::Trennen) => None,

        (Disconnected | Error, Ausloeser::Reinitialisieren) => {
            Some((Idle, "Reinitialized".to_string()))
        }
        (Idle, Ausloeser::Reinitialisieren) => None,
        (Connecting | Connected, Ausloeser::Reinitialisieren) => {
            return Err(CallError::BereitsImAnruf)
        }
    };

    Ok(ziel)
}

/// Gemeinsam genutzte Sitzung; wird von allen Threads eines Anrufs gelesen
pub struct ClientSession {
    zustand: Mutex<CallState>,
    events: Arc<dyn CallEvents>,
}

impl ClientSession {
    pub fn neu(events: Arc<dyn CallEvents>) -> Self {
        Self {
            zustand: Mutex::new(CallState::Idle),
            events,
        }
    }

    pub fn zustand(&self) -> CallState {
        *self.zustand.lock()
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand() == CallState::Connected
    }

    /// Fuehrt einen Uebergang aus und gibt den resultierenden Zustand zurueck
    pub fn uebergang(&self, ausloeser: Ausloeser) -> CallResult<CallState> {
        let (neu, grund) = {
            let mut zustand = self.zustand.lock();
            match naechster_zustand(*zustand, &ausloeser)? {
                Some((neu, grund)) => {
                    *zustand = neu;
                    (neu, grund)
                }
                None => return Ok(*zustand),
            }
        };

        tracing::info!(zustand = %neu, grund = %grund, "Anruf-Zustand geaendert");
        // Ausserhalb des Locks, damit Callbacks den Zustand lesen duerfen
        self.events.zustand_geaendert(neu, &grund);
        Ok(neu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeineEvents;

    struct Mitschnitt(Mutex<Vec<(CallState, String)>>);

    impl CallEvents for Mitschnitt {
        fn zustand_geaendert(&self, zustand: CallState, grund: &str) {
            self.0.lock().push((zustand, grund.to_string()));
        }
    }

    fn session_mit_mitschnitt() -> (ClientSession, Arc<Mitschnitt>) {
        let mitschnitt = Arc::new(Mitschnitt(Mutex::new(Vec::new())));
        (ClientSession::neu(mitschnitt.clone()), mitschnitt)
    }

    #[test]
    fn normaler_ablauf() {
        let (s, m) = session_mit_mitschnitt();
        assert_eq!(s.uebergang(Ausloeser::Verbinden).unwrap(), CallState::Connecting);
        assert_eq!(s.uebergang(Ausloeser::BeitrittBestaetigt).unwrap(), CallState::Connected);
        assert!(s.ist_verbunden());
        assert_eq!(s.uebergang(Ausloeser::Trennen).unwrap(), CallState::Disconnected);
        assert_eq!(s.uebergang(Ausloeser::Reinitialisieren).unwrap(), CallState::Idle);

        let zustaende: Vec<_> = m.0.lock().iter().map(|(z, _)| *z).collect();
        assert_eq!(
            zustaende,
            vec![
                CallState::Connecting,
                CallState::Connected,
                CallState::Disconnected,
                CallState::Idle
            ]
        );
    }

    #[test]
    fn verbinden_nur_aus_idle() {
        let s = ClientSession::neu(Arc::new(KeineEvents));
        s.uebergang(Ausloeser::Verbinden).unwrap();
        assert!(matches!(
            s.uebergang(Ausloeser::Verbinden),
            Err(CallError::BereitsImAnruf)
        ));
        s.uebergang(Ausloeser::BeitrittBestaetigt).unwrap();
        assert!(matches!(
            s.uebergang(Ausloeser::Verbinden),
            Err(CallError::BereitsImAnruf)
        ));
        s.uebergang(Ausloeser::Trennen).unwrap();
        assert!(s.uebergang(Ausloeser::Verbinden).is_err(), "Erst reinitialisieren");
    }

    #[test]
    fn join_fail_und_timeout_fuehren_zu_error() {
        for ausloeser in [Ausloeser::BeitrittAbgelehnt, Ausloeser::JoinTimeout] {
            let (s, m) = session_mit_mitschnitt();
            s.uebergang(Ausloeser::Verbinden).unwrap();
            assert_eq!(s.uebergang(ausloeser).unwrap(), CallState::Error);
            assert_eq!(m.0.lock().last().unwrap().0, CallState::Error);
        }
    }

    #[test]
    fn timeout_grund() {
        let (s, m) = session_mit_mitschnitt();
        s.uebergang(Ausloeser::Verbinden).unwrap();
        s.uebergang(Ausloeser::JoinTimeout).unwrap();
        assert_eq!(m.0.lock().last().unwrap().1, "join timeout");
    }

    #[test]
    fn spaetes_join_ok_nach_timeout_ignoriert() {
        let s = ClientSession::neu(Arc::new(KeineEvents));
        s.uebergang(Ausloeser::Verbinden).unwrap();
        s.uebergang(Ausloeser::JoinTimeout).unwrap();
        assert_eq!(s.uebergang(Ausloeser::BeitrittBestaetigt).unwrap(), CallState::Error);
    }

    #[test]
    fn ereignis_ohne_wirkung_benachrichtigt_nicht() {
        let (s, m) = session_mit_mitschnitt();
        assert_eq!(s.uebergang(Ausloeser::Trennen).unwrap(), CallState::Idle);
        assert_eq!(s.uebergang(Ausloeser::BeitrittBestaetigt).unwrap(), CallState::Idle);
        assert!(m.0.lock().is_empty());
    }

    #[test]
    fn lokaler_fehler_aus_jedem_zustand() {
        for start in [CallState::Idle, CallState::Connecting, CallState::Connected, CallState::Disconnected] {
            let (neu, grund) = naechster_zustand(start, &Ausloeser::LokalerFehler("Socket weg".into()))
                .unwrap()
                .unwrap();
            assert_eq!(neu, CallState::Error);
            assert_eq!(grund, "Socket weg");
        }
        assert!(naechster_zustand(CallState::Error, &Ausloeser::LokalerFehler("x".into()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn trennen_aus_error() {
        let s = ClientSession::neu(Arc::new(KeineEvents));
        s.uebergang(Ausloeser::Verbinden).unwrap();
        s.uebergang(Ausloeser::BeitrittAbgelehnt).unwrap();
        assert_eq!(s.uebergang(Ausloeser::Trennen).unwrap(), CallState::Disconnected);
    }

    #[test]
    fn reinitialisieren_im_anruf_abgelehnt() {
        assert!(naechster_zustand(CallState::Connected, &Ausloeser::Reinitialisieren).is_err());
        assert_eq!(
            naechster_zustand(CallState::Error, &Ausloeser::Reinitialisieren)
                .unwrap()
                .map(|(z, _)| z),
            Some(CallState::Idle)
        );
    }
}
