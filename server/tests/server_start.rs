//! Startet den Server aus einer Konfiguration und spricht ihn ueber Loopback an

use std::time::Duration;
use tokio::net::UdpSocket;
use voxroom_protocol::control::ControlMessage;
use voxroom_server::config::ServerConfig;
use voxroom_server::Server;

async fn empfangen(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("Antwort erwartet")
        .unwrap();
    buf[..len].to_vec()
}

#[tokio::test]
async fn server_aus_konfiguration_beantwortet_join() {
    let cfg: ServerConfig = toml::from_str(
        r#"
            [netzwerk]
            bind_adresse = "127.0.0.1"
            udp_port = 0

            [raeume]
            max_clients = 1
        "#,
    )
    .unwrap();

    let server = Server::binden(cfg).await.unwrap();
    let adresse = server.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(server.starten(shutdown_rx));

    let alice = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    alice.send_to(b"JOIN:r1:alice", adresse).await.unwrap();
    assert_eq!(empfangen(&alice).await, b"JOIN_OK:r1:alice");

    // max_clients = 1: der zweite Client wird abgelehnt
    let bob = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    bob.send_to(b"JOIN:r1:bob", adresse).await.unwrap();
    assert_eq!(
        ControlMessage::erkennen(&empfangen(&bob).await).unwrap().unwrap(),
        ControlMessage::JoinFail
    );

    shutdown_tx.send(()).unwrap();
    let relay = handle.await.unwrap();
    assert_eq!(relay.registry().client_anzahl(), 1);
}
