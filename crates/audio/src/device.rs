//! Geraete-Schnittstelle fuer Capture und Playback
//!
//! Die Pipelines kennen keine Plattform-API. Sie brauchen nur zwei
//! Faehigkeiten: "einen Frame interleaved i16-PCM lesen" und "einen
//! PCM-Puffer zur Wiedergabe einreihen". Beide duerfen nicht laenger als
//! ein Frame-Intervall blockieren.
//!
//! Mitgeliefert werden ein Sinus-Generator ([`ToneSource`]) und eine
//! verwerfende Senke ([`DiscardSink`]) fuer den Headless-Betrieb und Tests.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{AudioError, AudioResult};

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// Frame-Format der Pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub channels: u16,
    /// Frame-Dauer in Millisekunden
    pub frame_ms: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_ms: 20,
        }
    }
}

impl AudioFormat {
    pub fn pruefen(&self) -> AudioResult<()> {
        if self.sample_rate == 0 || self.channels == 0 || self.frame_ms == 0 {
            return Err(AudioError::Konfiguration(format!(
                "Ungueltiges Format: {} Hz, {} Kanaele, {} ms",
                self.sample_rate, self.channels, self.frame_ms
            )));
        }
        if self.frame_samples() == 0 {
            return Err(AudioError::Konfiguration(
                "Frame enthaelt keine Samples".into(),
            ));
        }
        Ok(())
    }

    /// Samples pro Frame ueber alle Kanaele
    pub fn frame_samples(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * self.frame_ms as usize / 1000
    }

    /// Bytes pro Frame (i16)
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples() * 2
    }

    pub fn frame_dauer(&self) -> Duration {
        Duration::from_millis(u64::from(self.frame_ms))
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Aufnahmequelle
pub trait CaptureSource: Send {
    /// Wird einmal vor dem ersten Frame aufgerufen. Fehlt das Geraet:
    /// `AudioError::GeraetNichtVerfuegbar`.
    fn starten(&mut self, format: &AudioFormat) -> AudioResult<()> {
        format.pruefen()
    }

    /// Fuellt `frame` mit genau einem Frame interleaved PCM.
    ///
    /// Voruebergehende Fehler als `AudioError::StreamFehler`; die Pipeline
    /// ruft dann [`wiederherstellen`](Self::wiederherstellen) und liest im
    /// naechsten Takt weiter.
    fn frame_lesen(&mut self, frame: &mut [i16]) -> AudioResult<()>;

    /// Versucht das Geraet nach einem Lesefehler wiederherzustellen
    fn wiederherstellen(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn stoppen(&mut self) {}
}

/// Wiedergabesenke
pub trait PlaybackSink: Send {
    /// Fehlt das Geraet: `AudioError::GeraetNichtVerfuegbar`
    fn starten(&mut self, format: &AudioFormat) -> AudioResult<()> {
        format.pruefen()
    }

    /// Reiht einen PCM-Puffer ein. `Err(AudioError::PufferVoll)` bedeutet,
    /// dass das Geraet gerade keinen Platz hat.
    fn einreihen(&mut self, samples: &[i16]) -> AudioResult<()>;

    fn stoppen(&mut self) {}
}

// ---------------------------------------------------------------------------
// ToneSource
// ---------------------------------------------------------------------------

/// Sinus-Generator als Aufnahmequelle
pub struct ToneSource {
    frequenz_hz: f32,
    amplitude: f32,
    phase: f32,
    format: AudioFormat,
}

impl ToneSource {
    /// Amplitude relativ zur Vollaussteuerung
    const STANDARD_AMPLITUDE: f32 = 0.3;

    pub fn neu(frequenz_hz: f32) -> Self {
        Self {
            frequenz_hz,
            amplitude: Self::STANDARD_AMPLITUDE,
            phase: 0.0,
            format: AudioFormat::default(),
        }
    }

    pub fn mit_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }
}

impl CaptureSource for ToneSource {
    fn starten(&mut self, format: &AudioFormat) -> AudioResult<()> {
        format.pruefen()?;
        if !self.frequenz_hz.is_finite() || self.frequenz_hz <= 0.0 {
            return Err(AudioError::Konfiguration(format!(
                "Ungueltige Tonfrequenz: {}",
                self.frequenz_hz
            )));
        }
        self.format = *format;
        self.phase = 0.0;
        debug!(
            frequenz_hz = self.frequenz_hz,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Tongenerator gestartet"
        );
        Ok(())
    }

    fn frame_lesen(&mut self, frame: &mut [i16]) -> AudioResult<()> {
        let kanaele = usize::from(self.format.channels.max(1));
        let schritt = std::f32::consts::TAU * self.frequenz_hz / self.format.sample_rate as f32;

        for gruppe in frame.chunks_mut(kanaele) {
            let wert = (self.phase.sin() * self.amplitude * f32::from(i16::MAX)) as i16;
            gruppe.fill(wert);
            self.phase = (self.phase + schritt) % std::f32::consts::TAU;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DiscardSink
// ---------------------------------------------------------------------------

/// Von aussen lesbare Zaehler einer [`DiscardSink`]
#[derive(Debug, Default)]
pub struct SinkStatistik {
    angenommen: AtomicU64,
    abgelehnt: AtomicU64,
    letzter_puffer: Mutex<Vec<i16>>,
}

impl SinkStatistik {
    /// Anzahl angenommener Puffer
    pub fn angenommen(&self) -> u64 {
        self.angenommen.load(Ordering::Relaxed)
    }

    /// Anzahl mit `PufferVoll` abgelehnter Versuche
    pub fn abgelehnt(&self) -> u64 {
        self.abgelehnt.load(Ordering::Relaxed)
    }

    /// Kopie des zuletzt angenommenen Puffers
    pub fn letzter_puffer(&self) -> Vec<i16> {
        self.letzter_puffer.lock().clone()
    }
}

/// Senke, die Puffer zaehlt und verwirft.
///
/// Mit Kapazitaet nimmt sie nur so viele Puffer an und meldet danach
/// `PufferVoll`.
pub struct DiscardSink {
    kapazitaet: Option<u64>,
    statistik: Arc<SinkStatistik>,
}

impl DiscardSink {
    pub fn neu() -> Self {
        Self {
            kapazitaet: None,
            statistik: Arc::new(SinkStatistik::default()),
        }
    }

    pub fn mit_kapazitaet(kapazitaet: u64) -> Self {
        Self {
            kapazitaet: Some(kapazitaet),
            ..Self::neu()
        }
    }

    /// Handle auf die Zaehler; bleibt gueltig, nachdem die Senke verschoben wurde
    pub fn statistik(&self) -> Arc<SinkStatistik> {
        Arc::clone(&self.statistik)
    }
}

impl Default for DiscardSink {
    fn default() -> Self {
        Self::neu()
    }
}

impl PlaybackSink for DiscardSink {
    fn einreihen(&mut self, samples: &[i16]) -> AudioResult<()> {
        if let Some(max) = self.kapazitaet {
            if self.statistik.angenommen() >= max {
                self.statistik.abgelehnt.fetch_add(1, Ordering::Relaxed);
                return Err(AudioError::PufferVoll);
            }
        }
        self.statistik.angenommen.fetch_add(1, Ordering::Relaxed);
        let mut letzter = self.statistik.letzter_puffer.lock();
        letzter.clear();
        letzter.extend_from_slice(samples);
        Ok(())
    }
}
