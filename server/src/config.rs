//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Relay ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use voxroom_voice::RelayKonfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Raum- und Sitzungs-Einstellungen
    pub raeume: RaumEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse des UDP-Sockets
    pub bind_adresse: String,
    /// Port fuer UDP (Steuernachrichten und Audio)
    pub udp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            udp_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaumEinstellungen {
    /// Maximale Anzahl gleichzeitiger Sitzungen
    pub max_clients: usize,
    /// Inaktivitaets-Timeout in Sekunden (0 = deaktiviert)
    pub sitzungs_timeout_sek: u64,
    /// Maximale Laenge von Raum- und Benutzerkennung in Bytes
    pub max_id_laenge: usize,
}

impl Default for RaumEinstellungen {
    fn default() -> Self {
        Self {
            max_clients: 512,
            sitzungs_timeout_sek: 0,
            max_id_laenge: voxroom_core::types::MAX_ID_LAENGE,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Vollstaendige Bind-Adresse fuer UDP
    pub fn udp_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.udp_port);
        adresse
            .parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse '{adresse}': {e}"))
    }

    /// Relay-Parameter aus dem Abschnitt `[raeume]`
    pub fn relay_konfig(&self) -> RelayKonfig {
        let timeout = self.raeume.sitzungs_timeout_sek;
        RelayKonfig {
            max_clients: self.raeume.max_clients,
            max_id_laenge: self.raeume.max_id_laenge,
            sitzungs_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.raeume.max_clients, 512);
        assert_eq!(cfg.raeume.max_id_laenge, 63);
        assert_eq!(cfg.netzwerk.udp_port, 8080);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(
            cfg.udp_bind_adresse().unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.bind_adresse = "kein-host".into();
        assert!(cfg.udp_bind_adresse().is_err());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            udp_port = 9000

            [raeume]
            max_clients = 16
            sitzungs_timeout_sek = 30
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.udp_port, 9000);
        assert_eq!(cfg.raeume.max_clients, 16);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.raeume.max_id_laenge, 63);

        let relay = cfg.relay_konfig();
        assert_eq!(relay.max_clients, 16);
        assert_eq!(relay.sitzungs_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn timeout_null_ist_deaktiviert() {
        assert_eq!(ServerConfig::default().relay_konfig().sitzungs_timeout, None);
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/voxroom.toml").unwrap();
        assert_eq!(cfg.netzwerk.udp_port, 8080);
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("voxroom-server-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[raeume]\nmax_clients = \"viele\"\n").unwrap();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        let _ = std::fs::remove_file(&pfad);
        assert!(ergebnis.is_err());
    }
}
