//! Raum-Registry – Sitzungen und Raummitgliedschaften des Relays
//!
//! Zwei Indizes, die immer konsistent gehalten werden:
//! - Endpunkt -> Sitzung (Benutzer, Raum, letzte Aktivitaet)
//! - Raum -> Menge der Endpunkte
//!
//! Jeder Endpunkt in einer Raummenge hat genau eine Sitzung und umgekehrt.
//! Leere Raeume existieren nicht. Die Registry gehoert exklusiv der
//! Empfangs-Loop des Servers, daher gibt es hier keine Locks.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use voxroom_core::types::{RoomId, UserId};

// ---------------------------------------------------------------------------
// Sitzung
// ---------------------------------------------------------------------------

/// Serverseitige Sitzung eines Endpunkts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitzung {
    pub user_id: UserId,
    pub raum_id: RoomId,
    pub endpunkt: SocketAddr,
    /// Zeitpunkt des letzten Datagramms von diesem Endpunkt
    pub letzte_aktivitaet: Instant,
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RoomRegistry {
    sitzungen: HashMap<SocketAddr, Sitzung>,
    raeume: HashMap<RoomId, HashSet<SocketAddr>>,
}

impl RoomRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt die Sitzung fuer `endpunkt` an oder aktualisiert sie.
    ///
    /// War der Endpunkt bereits in einem anderen Raum, wird er dort zuerst
    /// entfernt. Gibt in diesem Fall die abgeloeste Sitzung zurueck (alter
    /// Raum und alte Benutzerkennung).
    pub fn mitglied_hinzufuegen(
        &mut self,
        endpunkt: SocketAddr,
        user_id: UserId,
        raum_id: RoomId,
        jetzt: Instant,
    ) -> Option<Sitzung> {
        let raumwechsel = self
            .sitzungen
            .get(&endpunkt)
            .is_some_and(|alt| alt.raum_id != raum_id);

        self.raeume
            .entry(raum_id.clone())
            .or_default()
            .insert(endpunkt);
        let alt = self.sitzungen.insert(
            endpunkt,
            Sitzung {
                user_id,
                raum_id: raum_id.clone(),
                endpunkt,
                letzte_aktivitaet: jetzt,
            },
        );

        let alt = alt.filter(|_| raumwechsel)?;
        self.aus_raum_loesen(&endpunkt, &alt.raum_id);
        tracing::debug!(
            endpunkt = %endpunkt,
            alter_raum = %alt.raum_id,
            neuer_raum = %raum_id,
            "Endpunkt wechselt den Raum"
        );
        Some(alt)
    }

    /// Entfernt den Endpunkt aus `raum_id`.
    ///
    /// Gibt die entfernte Sitzung zurueck, oder `None` wenn der Endpunkt
    /// nicht Mitglied dieses Raums war (dann bleibt alles unveraendert).
    pub fn mitglied_entfernen(&mut self, endpunkt: &SocketAddr, raum_id: &RoomId) -> Option<Sitzung> {
        if !self.ist_mitglied(endpunkt, raum_id) {
            return None;
        }
        self.aus_raum_loesen(endpunkt, raum_id);
        self.sitzungen.remove(endpunkt)
    }

    /// Raum, dem der Endpunkt angehoert
    pub fn raum_von(&self, endpunkt: &SocketAddr) -> Option<&RoomId> {
        self.sitzungen.get(endpunkt).map(|s| &s.raum_id)
    }

    pub fn sitzung(&self, endpunkt: &SocketAddr) -> Option<&Sitzung> {
        self.sitzungen.get(endpunkt)
    }

    /// Alle Sitzungen eines Raums (Reihenfolge ohne Bedeutung)
    pub fn mitglieder<'a>(&'a self, raum_id: &RoomId) -> impl Iterator<Item = &'a Sitzung> + 'a {
        self.raeume
            .get(raum_id)
            .into_iter()
            .flatten()
            .filter_map(|ep| self.sitzungen.get(ep))
    }

    pub fn ist_mitglied(&self, endpunkt: &SocketAddr, raum_id: &RoomId) -> bool {
        self.raeume
            .get(raum_id)
            .is_some_and(|menge| menge.contains(endpunkt))
    }

    /// Vermerkt Aktivitaet fuer einen bekannten Endpunkt
    pub fn aktivitaet_vermerken(&mut self, endpunkt: &SocketAddr, jetzt: Instant) {
        if let Some(sitzung) = self.sitzungen.get_mut(endpunkt) {
            sitzung.letzte_aktivitaet = jetzt;
        }
    }

    /// Entfernt alle Sitzungen, die laenger als `timeout` inaktiv sind
    pub fn inaktive_bereinigen(&mut self, timeout: Duration, jetzt: Instant) -> Vec<Sitzung> {
        let abgelaufen: Vec<(SocketAddr, RoomId)> = self
            .sitzungen
            .values()
            .filter(|s| jetzt.saturating_duration_since(s.letzte_aktivitaet) > timeout)
            .map(|s| (s.endpunkt, s.raum_id.clone()))
            .collect();

        abgelaufen
            .into_iter()
            .filter_map(|(ep, raum)| self.mitglied_entfernen(&ep, &raum))
            .collect()
    }

    /// Anzahl existierender (nicht leerer) Raeume
    pub fn raum_anzahl(&self) -> usize {
        self.raeume.len()
    }

    /// Anzahl registrierter Sitzungen
    pub fn client_anzahl(&self) -> usize {
        self.sitzungen.len()
    }

    fn aus_raum_loesen(&mut self, endpunkt: &SocketAddr, raum_id: &RoomId) {
        if let Some(menge) = self.raeume.get_mut(raum_id) {
            menge.remove(endpunkt);
            if menge.is_empty() {
                self.raeume.remove(raum_id);
                tracing::debug!(raum = %raum_id, "Leerer Raum entfernt");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ep(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Prueft die beiden Registry-Invarianten
    fn invarianten_pruefen(reg: &RoomRegistry) {
        for (raum, menge) in &reg.raeume {
            assert!(!menge.is_empty(), "Raum {raum} darf nicht leer sein");
            for e in menge {
                let s = reg.sitzungen.get(e).expect("Mitglied ohne Sitzung");
                assert_eq!(&s.raum_id, raum);
            }
        }
        for (e, s) in &reg.sitzungen {
            assert!(reg.ist_mitglied(e, &s.raum_id), "Sitzung ohne Raum-Eintrag");
        }
    }

    #[test]
    fn hinzufuegen_und_abfragen() {
        let mut reg = RoomRegistry::neu();
        let jetzt = Instant::now();
        reg.mitglied_hinzufuegen(ep(1), "alice".into(), "r1".into(), jetzt);
        reg.mitglied_hinzufuegen(ep(2), "bob".into(), "r1".into(), jetzt);

        assert_eq!(reg.raum_von(&ep(1)), Some(&RoomId::from("r1")));
        assert!(reg.ist_mitglied(&ep(2), &"r1".into()));
        assert!(!reg.ist_mitglied(&ep(2), &"r2".into()));
        assert_eq!(reg.mitglieder(&"r1".into()).count(), 2);
        assert_eq!(reg.raum_anzahl(), 1);
        assert_eq!(reg.client_anzahl(), 2);
        invarianten_pruefen(&reg);
    }

    #[test]
    fn erneuter_join_ueberschreibt_sitzung() {
        let mut reg = RoomRegistry::neu();
        let jetzt = Instant::now();
        reg.mitglied_hinzufuegen(ep(1), "alice".into(), "r1".into(), jetzt);
        let alt = reg.mitglied_hinzufuegen(ep(1), "alice2".into(), "r1".into(), jetzt);
        assert_eq!(alt, None);
        assert_eq!(reg.client_anzahl(), 1);
        assert_eq!(reg.sitzung(&ep(1)).unwrap().user_id.as_str(), "alice2");
    }

    #[test]
    fn raumwechsel_loescht_alten_raum() {
        let mut reg = RoomRegistry::neu();
        let jetzt = Instant::now();
        reg.mitglied_hinzufuegen(ep(1), "alice".into(), "r1".into(), jetzt);
        let alt = reg
            .mitglied_hinzufuegen(ep(1), "alice_neu".into(), "r2".into(), jetzt)
            .expect("Raumwechsel liefert die alte Sitzung");

        assert_eq!(alt.raum_id, RoomId::from("r1"));
        assert_eq!(alt.user_id, UserId::from("alice"));
        assert_eq!(reg.raum_anzahl(), 1);
        assert!(reg.ist_mitglied(&ep(1), &"r2".into()));
        assert_eq!(reg.mitglieder(&"r1".into()).count(), 0);
        invarianten_pruefen(&reg);
    }

    #[test]
    fn doppeltes_entfernen_ist_noop() {
        let mut reg = RoomRegistry::neu();
        reg.mitglied_hinzufuegen(ep(1), "alice".into(), "r1".into(), Instant::now());

        let entfernt = reg.mitglied_entfernen(&ep(1), &"r1".into());
        assert_eq!(entfernt.map(|s| s.user_id), Some(UserId::from("alice")));
        assert_eq!(reg.raum_anzahl(), 0, "Leerer Raum muss verschwinden");

        assert!(reg.mitglied_entfernen(&ep(1), &"r1".into()).is_none());
        invarianten_pruefen(&reg);
    }

    #[test]
    fn entfernen_aus_fremdem_raum_aendert_nichts() {
        let mut reg = RoomRegistry::neu();
        reg.mitglied_hinzufuegen(ep(1), "alice".into(), "r1".into(), Instant::now());
        assert!(reg.mitglied_entfernen(&ep(1), &"r2".into()).is_none());
        assert_eq!(reg.client_anzahl(), 1);
        invarianten_pruefen(&reg);
    }

    #[test]
    fn inaktive_sitzungen_bereinigen() {
        let mut reg = RoomRegistry::neu();
        let start = Instant::now();
        reg.mitglied_hinzufuegen(ep(1), "alt".into(), "r1".into(), start);
        reg.mitglied_hinzufuegen(ep(2), "aktiv".into(), "r1".into(), start);

        let spaeter = start + Duration::from_secs(30);
        reg.aktivitaet_vermerken(&ep(2), spaeter);

        let entfernt = reg.inaktive_bereinigen(Duration::from_secs(10), spaeter);
        assert_eq!(entfernt.len(), 1);
        assert_eq!(entfernt[0].endpunkt, ep(1));
        assert_eq!(reg.client_anzahl(), 1);
        invarianten_pruefen(&reg);
    }

    #[test]
    fn unbekannter_endpunkt_hat_keinen_raum() {
        let reg = RoomRegistry::neu();
        assert!(reg.raum_von(&ep(9)).is_none());
        assert_eq!(reg.mitglieder(&"nirgends".into()).count(), 0);
    }
}
