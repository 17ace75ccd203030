//! Lautstaerke (Gain) fuer Mikrofon und Lautsprecher
//!
//! Der Gain liegt als f32-Bitmuster in einem `AtomicU32`, damit Setter aus dem
//! Steuer-Thread und die Audio-Threads ohne Lock zusammenarbeiten.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{AudioError, AudioResult};

/// Atomarer Gain-Wert im Bereich [0.0, 1.0]
#[derive(Debug)]
pub struct Lautstaerke {
    bits: AtomicU32,
}

impl Lautstaerke {
    /// Erstellt einen Gain; ungueltige Startwerte werden abgelehnt
    pub fn neu(wert: f32) -> AudioResult<Self> {
        pruefen(wert)?;
        Ok(Self {
            bits: AtomicU32::new(wert.to_bits()),
        })
    }

    /// Setzt den Gain. Werte ausserhalb [0, 1] (und NaN) werden abgelehnt,
    /// der bisherige Wert bleibt dann erhalten.
    pub fn setzen(&self, wert: f32) -> AudioResult<()> {
        pruefen(wert)?;
        self.bits.store(wert.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn wert(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for Lautstaerke {
    fn default() -> Self {
        Self {
            bits: AtomicU32::new(1.0f32.to_bits()),
        }
    }
}

fn pruefen(wert: f32) -> AudioResult<()> {
    if (0.0..=1.0).contains(&wert) {
        Ok(())
    } else {
        Err(AudioError::UngueltigerWert(format!(
            "Lautstaerke {wert} ausserhalb [0.0, 1.0]"
        )))
    }
}

/// Multipliziert jedes Sample mit `gain` (Richtung Null abgeschnitten)
pub fn verstaerkung_anwenden(samples: &mut [i16], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for s in samples.iter_mut() {
        *s = (f32::from(*s) * gain) as i16;
    }
}

/// Ein Puffer ist still, wenn jedes Sample Null ist
pub fn ist_stille(samples: &[i16]) -> bool {
    samples.iter().all(|&s| s == 0)
}
