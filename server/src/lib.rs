//! voxroom-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use voxroom_voice::{PacketRelay, RelayServer};

/// Haelt den gebundenen Relay und seine Konfiguration zusammen
pub struct Server {
    pub config: ServerConfig,
    relay: RelayServer,
}

impl Server {
    /// Bindet den UDP-Socket gemaess Konfiguration
    pub async fn binden(config: ServerConfig) -> Result<Self> {
        let adresse = config.udp_bind_adresse()?;
        let relay = RelayServer::binden(adresse, config.relay_konfig())
            .await
            .map_err(|e| anyhow::anyhow!("UDP-Socket {adresse} konnte nicht gebunden werden: {e}"))?;
        Ok(Self { config, relay })
    }

    pub fn lokale_adresse(&self) -> Result<SocketAddr> {
        Ok(self.relay.lokale_adresse()?)
    }

    /// Laeuft bis `shutdown_rx` ausloest und gibt den Relay-Endzustand zurueck
    pub async fn starten(self, shutdown_rx: oneshot::Receiver<()>) -> PacketRelay {
        tracing::info!(
            udp = ?self.relay.lokale_adresse().ok(),
            max_clients = self.config.raeume.max_clients,
            sitzungs_timeout_sek = self.config.raeume.sitzungs_timeout_sek,
            "Relay laeuft"
        );
        let relay = self.relay.empfangs_loop_starten(shutdown_rx).await;
        tracing::info!(
            raeume = relay.registry().raum_anzahl(),
            clients = relay.registry().client_anzahl(),
            "Relay beendet"
        );
        relay
    }
}
