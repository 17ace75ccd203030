//! Integration-Tests fuer VoiceCall ueber Loopback-UDP
//!
//! Ein einfacher Test-Server (std::net::UdpSocket) spielt die Gegenseite, ein
//! Test ganz unten laeuft gegen den echten RelayServer.

use crossbeam_channel::{bounded, Receiver};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use voxroom_audio::{
    AudioError, AudioFormat, AudioResult, CaptureSource, DiscardSink, PlaybackSink, SinkStatistik,
    ToneSource,
};
use voxroom_call::{CallError, CallEvents, CallKonfig, CallState, VoiceCall};
use voxroom_core::types::UserId;
use voxroom_protocol::voice::{benutzer_hash, samples_zu_pcm, AudioPacket};

// ---------------------------------------------------------------------------
// Hilfen
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Protokoll {
    zustaende: Mutex<Vec<(CallState, String)>>,
    beigetreten: Mutex<Vec<String>>,
    verlassen: Mutex<Vec<String>>,
    pegel: Mutex<Vec<(String, f32)>>,
    fehler: Mutex<Vec<String>>,
}

impl CallEvents for Protokoll {
    fn zustand_geaendert(&self, zustand: CallState, grund: &str) {
        self.zustaende.lock().unwrap().push((zustand, grund.to_string()));
    }

    fn peer_beigetreten(&self, peer: &UserId) {
        self.beigetreten.lock().unwrap().push(peer.to_string());
    }

    fn peer_verlassen(&self, peer: &UserId) {
        self.verlassen.lock().unwrap().push(peer.to_string());
    }

    fn audio_pegel(&self, benutzer: &str, pegel: f32) {
        self.pegel.lock().unwrap().push((benutzer.to_string(), pegel));
    }

    fn fehler(&self, fehler: &CallError) {
        self.fehler.lock().unwrap().push(fehler.to_string());
    }
}

impl Protokoll {
    fn hat_pegel_von(&self, benutzer: &str) -> bool {
        self.pegel.lock().unwrap().iter().any(|(b, _)| b == benutzer)
    }
}

fn warten_bis(timeout: Duration, bedingung: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if bedingung() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    bedingung()
}

struct TestServer {
    socket: UdpSocket,
}

impl TestServer {
    fn neu() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        Self { socket }
    }

    fn adresse(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    fn empfangen(&self) -> Option<(Vec<u8>, SocketAddr)> {
        let mut buf = [0u8; 2048];
        self.socket
            .recv_from(&mut buf)
            .ok()
            .map(|(len, von)| (buf[..len].to_vec(), von))
    }

    /// Wartet auf das naechste Datagramm, das `passt`
    fn warten_auf(&self, passt: impl Fn(&[u8]) -> bool) -> Option<(Vec<u8>, SocketAddr)> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(3) {
            if let Some((daten, von)) = self.empfangen() {
                if passt(&daten) {
                    return Some((daten, von));
                }
            }
        }
        None
    }

    fn senden(&self, daten: &[u8], ziel: SocketAddr) {
        self.socket.send_to(daten, ziel).unwrap();
    }

    /// Nimmt den JOIN an und beantwortet ihn; gibt die Client-Adresse zurueck
    fn join_bestaetigen(&self, raum: &str, benutzer: &str) -> SocketAddr {
        let erwartet = format!("JOIN:{raum}:{benutzer}").into_bytes();
        let (_, client) = self
            .warten_auf(|d| d == erwartet.as_slice())
            .expect("JOIN erwartet");
        self.senden(format!("JOIN_OK:{raum}:{benutzer}").as_bytes(), client);
        client
    }
}

fn anruf(
    server: SocketAddr,
    events: Arc<Protokoll>,
    format: AudioFormat,
) -> (VoiceCall, Arc<SinkStatistik>) {
    let mut konfig = CallKonfig::neu(server, "r1", "alice");
    konfig.format = format;
    konfig.join_timeout = Duration::from_secs(3);
    let senke = DiscardSink::neu();
    let statistik = senke.statistik();
    let call = VoiceCall::neu(
        konfig,
        events,
        Box::new(ToneSource::neu(440.0)),
        Box::new(senke),
    )
    .expect("Konfiguration muss gueltig sein");
    (call, statistik)
}

/// Wie `anruf`, aber mit eigenen Geraeten
fn anruf_mit_geraeten(
    server: SocketAddr,
    events: Arc<Protokoll>,
    quelle: Box<dyn CaptureSource>,
    senke: Box<dyn PlaybackSink>,
) -> VoiceCall {
    let mut konfig = CallKonfig::neu(server, "r1", "alice");
    konfig.join_timeout = Duration::from_secs(3);
    VoiceCall::neu(konfig, events, quelle, senke).expect("Konfiguration muss gueltig sein")
}

/// Liefert konstante Samples; die ersten `fehler_rest` Lesevorgaenge
/// scheitern mit einem Stream-Fehler
struct KonstanteQuelle {
    wert: i16,
    fehler_rest: usize,
    wiederhergestellt: Arc<AtomicUsize>,
    geraet_fehlt: bool,
}

impl KonstanteQuelle {
    fn neu(wert: i16) -> Self {
        Self {
            wert,
            fehler_rest: 0,
            wiederhergestellt: Arc::new(AtomicUsize::new(0)),
            geraet_fehlt: false,
        }
    }
}

impl CaptureSource for KonstanteQuelle {
    fn starten(&mut self, format: &AudioFormat) -> AudioResult<()> {
        if self.geraet_fehlt {
            return Err(AudioError::GeraetNichtVerfuegbar("hw:9".into()));
        }
        format.pruefen()
    }

    fn frame_lesen(&mut self, frame: &mut [i16]) -> AudioResult<()> {
        if self.fehler_rest > 0 {
            self.fehler_rest -= 1;
            return Err(AudioError::StreamFehler("xrun".into()));
        }
        frame.fill(self.wert);
        Ok(())
    }

    fn wiederherstellen(&mut self) -> AudioResult<()> {
        self.wiederhergestellt.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Blockiert in `einreihen`, bis der Sender von `freigabe` fallen gelassen wird
struct BlockierendeSenke {
    freigabe: Receiver<()>,
    angenommen: Arc<AtomicUsize>,
}

impl PlaybackSink for BlockierendeSenke {
    fn einreihen(&mut self, _samples: &[i16]) -> AudioResult<()> {
        let _ = self.freigabe.recv();
        self.angenommen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn ist_audio_mit_nutzdaten(daten: &[u8]) -> bool {
    AudioPacket::decode(daten).is_ok_and(|p| p.header.data_size > 0)
}

fn verbunden(call: &VoiceCall) -> bool {
    call.zustand() == CallState::Connected
}

const WARTEZEIT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Tests gegen den Test-Server
// ---------------------------------------------------------------------------

#[test]
fn join_ok_startet_sendepipeline() {
    let server = TestServer::neu();
    let events = Arc::new(Protokoll::default());
    let (mut call, _) = anruf(server.adresse(), events.clone(), AudioFormat::default());

    call.connect().unwrap();
    assert!(call.lokale_adresse().is_some());
    server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    let (erstes, _) = server
        .warten_auf(|d| AudioPacket::decode(d).is_ok())
        .expect("Audio erwartet");
    let (zweites, _) = server
        .warten_auf(|d| AudioPacket::decode(d).is_ok())
        .expect("Audio erwartet");
    let erstes = AudioPacket::decode(&erstes).unwrap();
    let zweites = AudioPacket::decode(&zweites).unwrap();

    assert_eq!(erstes.header.sequence, 0, "Sequenz beginnt bei 0");
    assert_eq!(zweites.header.sequence, 1);
    assert_eq!(erstes.header.user_id, benutzer_hash("alice"));
    // 16 kHz Mono, 20 ms
    assert_eq!(erstes.header.data_size, 640);
    assert!(events.hat_pegel_von("alice"), "Eigener Pegel wird gemeldet");

    let zustaende: Vec<CallState> = events.zustaende.lock().unwrap().iter().map(|(z, _)| *z).collect();
    assert_eq!(zustaende, vec![CallState::Connecting, CallState::Connected]);

    call.disconnect();
}

#[test]
fn nutzdaten_werden_auf_640_bytes_begrenzt() {
    let server = TestServer::neu();
    let format = AudioFormat {
        sample_rate: 48000,
        channels: 1,
        frame_ms: 20,
    };
    let (mut call, _) = anruf(server.adresse(), Arc::new(Protokoll::default()), format);

    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");

    let (daten, _) = server
        .warten_auf(|d| AudioPacket::decode(d).is_ok())
        .expect("Audio erwartet");
    assert_eq!(daten.len(), 14 + 640);
    call.disconnect();
}

#[test]
fn join_timeout_fuehrt_zu_error() {
    let server = TestServer::neu();
    let events = Arc::new(Protokoll::default());
    let mut konfig = CallKonfig::neu(server.adresse(), "r1", "alice");
    konfig.join_timeout = Duration::from_millis(200);
    let mut call = VoiceCall::neu(
        konfig,
        events.clone(),
        Box::new(ToneSource::neu(440.0)),
        Box::new(DiscardSink::neu()),
    )
    .unwrap();

    call.connect().unwrap();
    assert!(warten_bis(WARTEZEIT, || call.zustand() == CallState::Error));

    let letzter = events.zustaende.lock().unwrap().last().cloned().unwrap();
    assert_eq!(letzter, (CallState::Error, "join timeout".to_string()));
    assert_eq!(events.fehler.lock().unwrap().len(), 1);

    call.disconnect();
    assert_eq!(call.zustand(), CallState::Disconnected);
}

#[test]
fn join_fail_und_erneuter_versuch() {
    let server = TestServer::neu();
    let (mut call, _) = anruf(server.adresse(), Arc::new(Protokoll::default()), AudioFormat::default());

    call.connect().unwrap();
    let (_, client) = server
        .warten_auf(|d| d.starts_with(b"JOIN:"))
        .expect("JOIN erwartet");
    server.senden(b"JOIN_FAIL", client);
    assert!(warten_bis(WARTEZEIT, || call.zustand() == CallState::Error));

    assert!(matches!(call.connect(), Err(CallError::BereitsImAnruf)));

    call.reinitialisieren().unwrap();
    assert_eq!(call.zustand(), CallState::Idle);

    // Quelle und Senke sind zurueckgegeben worden
    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));
    call.disconnect();
}

#[test]
fn zweites_connect_abgelehnt() {
    let server = TestServer::neu();
    let (mut call, _) = anruf(server.adresse(), Arc::new(Protokoll::default()), AudioFormat::default());
    call.connect().unwrap();
    assert!(matches!(call.connect(), Err(CallError::BereitsImAnruf)));
    call.disconnect();
}

#[test]
fn disconnect_sendet_leave() {
    let server = TestServer::neu();
    let events = Arc::new(Protokoll::default());
    let (mut call, _) = anruf(server.adresse(), events.clone(), AudioFormat::default());

    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    call.disconnect();
    assert_eq!(call.zustand(), CallState::Disconnected);
    assert!(call.lokale_adresse().is_none());
    assert!(server.warten_auf(|d| d == b"LEAVE:r1:alice").is_some());

    let letzter = events.zustaende.lock().unwrap().last().cloned().unwrap();
    assert_eq!(letzter.0, CallState::Disconnected);

    // Zweites disconnect ist wirkungslos
    call.disconnect();
    assert_eq!(events.zustaende.lock().unwrap().len(), 3);
}

#[test]
fn stumm_sendet_kein_audio() {
    let server = TestServer::neu();
    let (mut call, _) = anruf(server.adresse(), Arc::new(Protokoll::default()), AudioFormat::default());

    call.set_muted(true);
    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    // Mehrere Frame-Intervalle lang hoechstens Pakete ohne Nutzdaten
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(300) {
        if let Some((daten, _)) = server.empfangen() {
            assert!(!ist_audio_mit_nutzdaten(&daten), "Audio trotz Mute gesendet");
        }
    }
    call.disconnect();
}

#[test]
fn stumm_sendet_keepalive() {
    let server = TestServer::neu();
    let mut konfig = CallKonfig::neu(server.adresse(), "r1", "alice");
    konfig.keepalive_intervall = Duration::from_millis(100);
    let mut call = VoiceCall::neu(
        konfig,
        Arc::new(Protokoll::default()),
        Box::new(ToneSource::neu(440.0)),
        Box::new(DiscardSink::neu()),
    )
    .unwrap();

    call.set_muted(true);
    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    let (erstes, _) = server
        .warten_auf(|d| AudioPacket::decode(d).is_ok())
        .expect("Keepalive erwartet");
    let (zweites, _) = server
        .warten_auf(|d| AudioPacket::decode(d).is_ok())
        .expect("Keepalive erwartet");
    let erstes = AudioPacket::decode(&erstes).unwrap();
    let zweites = AudioPacket::decode(&zweites).unwrap();

    assert_eq!(erstes.header.data_size, 0);
    assert!(erstes.payload.is_empty());
    assert_eq!(erstes.header.user_id, benutzer_hash("alice"));
    // Keepalives verbrauchen keine Sequenznummer
    assert_eq!(erstes.header.sequence, 0);
    assert_eq!(zweites.header.sequence, 0);

    // Nach dem Aufheben der Stummschaltung kommt wieder echtes Audio
    call.set_muted(false);
    let (daten, _) = server
        .warten_auf(ist_audio_mit_nutzdaten)
        .expect("Audio erwartet");
    assert_eq!(AudioPacket::decode(&daten).unwrap().header.sequence, 0);
    call.disconnect();
}

#[test]
fn capture_fehler_werden_wiederhergestellt() {
    let server = TestServer::neu();
    let mut quelle = KonstanteQuelle::neu(1000);
    quelle.fehler_rest = 3;
    let wiederhergestellt = Arc::clone(&quelle.wiederhergestellt);
    let mut call = anruf_mit_geraeten(
        server.adresse(),
        Arc::new(Protokoll::default()),
        Box::new(quelle),
        Box::new(DiscardSink::neu()),
    );

    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");

    let (daten, _) = server
        .warten_auf(ist_audio_mit_nutzdaten)
        .expect("Audio nach Wiederherstellung erwartet");
    let paket = AudioPacket::decode(&daten).unwrap();
    assert_eq!(wiederhergestellt.load(Ordering::SeqCst), 3);
    assert_eq!(paket.header.sequence, 0, "Fehlgeschlagene Frames zaehlen nicht");
    assert!(paket.samples().iter().all(|&s| s == 1000));
    assert_eq!(call.zustand(), CallState::Connected);
    call.disconnect();
}

#[test]
fn mikrofon_gain_wird_angewendet() {
    let server = TestServer::neu();
    let mut call = anruf_mit_geraeten(
        server.adresse(),
        Arc::new(Protokoll::default()),
        Box::new(KonstanteQuelle::neu(1000)),
        Box::new(DiscardSink::neu()),
    );
    call.set_mikrofon_lautstaerke(0.5).unwrap();

    call.connect().unwrap();
    server.join_bestaetigen("r1", "alice");

    let (daten, _) = server
        .warten_auf(ist_audio_mit_nutzdaten)
        .expect("Audio erwartet");
    let samples = AudioPacket::decode(&daten).unwrap().samples();
    assert_eq!(samples.len(), 320);
    assert!(samples.iter().all(|&s| s == 500), "Gain 0.5 halbiert die Samples");
    call.disconnect();
}

#[test]
fn fehlendes_geraet_fuehrt_zu_error() {
    let server = TestServer::neu();
    let events = Arc::new(Protokoll::default());
    let mut quelle = KonstanteQuelle::neu(1000);
    quelle.geraet_fehlt = true;
    let mut call = anruf_mit_geraeten(
        server.adresse(),
        events.clone(),
        Box::new(quelle),
        Box::new(DiscardSink::neu()),
    );

    let ergebnis = call.connect();
    assert!(matches!(
        ergebnis,
        Err(CallError::Audio(AudioError::GeraetNichtVerfuegbar(_)))
    ));
    assert_eq!(call.zustand(), CallState::Error);
    assert!(call.lokale_adresse().is_none());

    let zustaende: Vec<CallState> = events.zustaende.lock().unwrap().iter().map(|(z, _)| *z).collect();
    assert_eq!(zustaende, vec![CallState::Connecting, CallState::Error]);
    let fehler = events.fehler.lock().unwrap().clone();
    assert_eq!(fehler.len(), 1);
    assert!(fehler[0].contains("hw:9"));

    // Ohne Geraet geht kein JOIN raus
    assert!(server.empfangen().is_none());

    call.disconnect();
    assert_eq!(call.zustand(), CallState::Disconnected);
}

#[test]
fn volle_playback_queue_verwirft_pakete() {
    let server = TestServer::neu();
    let (freigabe_tx, freigabe_rx) = bounded::<()>(0);
    let angenommen = Arc::new(AtomicUsize::new(0));
    let mut call = anruf_mit_geraeten(
        server.adresse(),
        Arc::new(Protokoll::default()),
        Box::new(KonstanteQuelle::neu(1000)),
        Box::new(BlockierendeSenke {
            freigabe: freigabe_rx,
            angenommen: Arc::clone(&angenommen),
        }),
    );
    call.set_muted(true);

    call.connect().unwrap();
    let client = server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    let pcm = samples_zu_pcm(&[1000i16; 32]);
    for seq in 0..30 {
        let paket = AudioPacket::neu(seq, 0, benutzer_hash("bob"), pcm.clone()).unwrap();
        server.senden(&paket.encode(), client);
    }
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(angenommen.load(Ordering::SeqCst), 0, "Senke blockiert noch");

    // Senke freigeben: nur was in der Queue lag (plus ein Paket in Arbeit) kommt an
    drop(freigabe_tx);
    std::thread::sleep(Duration::from_millis(300));
    let anzahl = angenommen.load(Ordering::SeqCst);
    assert!((10..=11).contains(&anzahl), "{anzahl} Pakete angenommen");

    call.disconnect();
}

#[test]
fn empfang_spielt_fremdes_audio_ab() {
    let server = TestServer::neu();
    let events = Arc::new(Protokoll::default());
    let (mut call, statistik) = anruf(server.adresse(), events.clone(), AudioFormat::default());
    call.set_muted(true);

    call.connect().unwrap();
    let client = server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    server.senden(b"JOIN:r1:bob", client);
    assert!(warten_bis(WARTEZEIT, || !events.beigetreten.lock().unwrap().is_empty()));
    assert_eq!(call.peers(), vec![UserId::from("bob")]);
    assert_eq!(call.peer_aufloesen(benutzer_hash("bob")).unwrap(), UserId::from("bob"));

    let signal = samples_zu_pcm(&vec![2000i16; 320]);
    let bob = AudioPacket::neu(0, 0, benutzer_hash("bob"), signal.clone()).unwrap();
    server.senden(&bob.encode(), client);
    assert!(warten_bis(WARTEZEIT, || statistik.angenommen() == 1));
    assert_eq!(statistik.letzter_puffer(), vec![2000i16; 320]);
    assert!(events.hat_pegel_von("bob"));

    // Eigener Hash, Stille und Muell werden verworfen
    let eigenes = AudioPacket::neu(1, 0, benutzer_hash("alice"), signal).unwrap();
    server.senden(&eigenes.encode(), client);
    let still = AudioPacket::neu(1, 0, benutzer_hash("bob"), vec![0; 640]).unwrap();
    server.senden(&still.encode(), client);
    server.senden(b"\x00\x01garbage", client);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(statistik.angenommen(), 1);

    // Unbekannter Sender: Pegel unter dem Hex-Hash
    let fremd = AudioPacket::neu(0, 0, 0x00C0FFEE, samples_zu_pcm(&[500i16; 64])).unwrap();
    server.senden(&fremd.encode(), client);
    assert!(warten_bis(WARTEZEIT, || statistik.angenommen() == 2));
    assert!(events.hat_pegel_von("00c0ffee"));

    server.senden(b"LEAVE:r1:bob", client);
    assert!(warten_bis(WARTEZEIT, || !events.verlassen.lock().unwrap().is_empty()));
    assert!(call.peers().is_empty());

    call.disconnect();
}

#[test]
fn lautsprecher_gain_wird_angewendet() {
    let server = TestServer::neu();
    let (mut call, statistik) = anruf(server.adresse(), Arc::new(Protokoll::default()), AudioFormat::default());
    call.set_muted(true);
    call.set_lautsprecher_lautstaerke(0.5).unwrap();

    call.connect().unwrap();
    let client = server.join_bestaetigen("r1", "alice");
    assert!(warten_bis(WARTEZEIT, || verbunden(&call)));

    let paket = AudioPacket::neu(0, 0, benutzer_hash("bob"), samples_zu_pcm(&[1000i16, -1000])).unwrap();
    server.senden(&paket.encode(), client);
    assert!(warten_bis(WARTEZEIT, || statistik.angenommen() == 1));
    assert_eq!(statistik.letzter_puffer(), vec![500, -500]);
    call.disconnect();
}

#[test]
fn audio_vor_join_ok_wird_ignoriert() {
    let server = TestServer::neu();
    let (mut call, statistik) = anruf(server.adresse(), Arc::new(Protokoll::default()), AudioFormat::default());

    call.connect().unwrap();
    let (_, client) = server
        .warten_auf(|d| d.starts_with(b"JOIN:"))
        .expect("JOIN erwartet");

    let paket = AudioPacket::neu(0, 0, benutzer_hash("bob"), samples_zu_pcm(&[1000i16; 32])).unwrap();
    server.senden(&paket.encode(), client);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(call.zustand(), CallState::Connecting);
    assert_eq!(statistik.angenommen(), 0);
    call.disconnect();
}

// ---------------------------------------------------------------------------
// Ende-zu-Ende ueber den echten Relay
// ---------------------------------------------------------------------------

#[test]
fn zwei_clients_ueber_relay() {
    use voxroom_voice::{RelayKonfig, RelayServer};

    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt
        .block_on(RelayServer::binden("127.0.0.1:0".parse().unwrap(), RelayKonfig::default()))
        .unwrap();
    let server_addr = server.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let relay_task = rt.spawn(server.empfangs_loop_starten(shutdown_rx));

    let alice_events = Arc::new(Protokoll::default());
    let (mut alice, alice_sink) = anruf(server_addr, alice_events.clone(), AudioFormat::default());

    let bob_events = Arc::new(Protokoll::default());
    let mut bob_konfig = CallKonfig::neu(server_addr, "r1", "bob");
    bob_konfig.join_timeout = Duration::from_secs(3);
    let bob_senke = DiscardSink::neu();
    let bob_sink = bob_senke.statistik();
    let mut bob = VoiceCall::neu(
        bob_konfig,
        bob_events.clone(),
        Box::new(ToneSource::neu(660.0)),
        Box::new(bob_senke),
    )
    .unwrap();

    alice.connect().unwrap();
    assert!(warten_bis(WARTEZEIT, || verbunden(&alice)));
    bob.connect().unwrap();
    assert!(warten_bis(WARTEZEIT, || verbunden(&bob)));

    assert!(warten_bis(WARTEZEIT, || alice_events
        .beigetreten
        .lock()
        .unwrap()
        .contains(&"bob".to_string())));

    assert!(warten_bis(WARTEZEIT, || bob_sink.angenommen() > 0), "Bob hoert Alice");
    assert!(warten_bis(WARTEZEIT, || alice_sink.angenommen() > 0), "Alice hoert Bob");
    assert!(warten_bis(WARTEZEIT, || alice_events.hat_pegel_von("bob")));

    bob.disconnect();
    assert!(warten_bis(WARTEZEIT, || alice_events
        .verlassen
        .lock()
        .unwrap()
        .contains(&"bob".to_string())));
    alice.disconnect();

    let _ = shutdown_tx.send(());
    let relay = rt.block_on(relay_task).unwrap();
    assert_eq!(relay.registry().client_anzahl(), 0);
    assert_eq!(relay.registry().raum_anzahl(), 0);
}
