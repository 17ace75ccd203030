//! Pegelmessung (RMS -> dB -> [0, 1])
//!
//! Rein beobachtend: das Ergebnis wird nur an die Level-Benachrichtigung
//! gemeldet und beeinflusst die Audiodaten nicht.

/// Untere Grenze der Anzeige in dB; alles darunter ergibt 0.0
const UNTERGRENZE_DB: f64 = -60.0;

/// Schutz gegen log10(0)
const EPSILON: f64 = 1e-10;

/// Berechnet den normierten Pegel eines Sample-Blocks.
///
/// RMS ueber `sample / 32768`, `db = 20 * log10(rms + 1e-10)`,
/// Ergebnis `clamp((db + 60) / 60, 0, 1)`. Ein leerer Block ergibt 0.0.
pub fn pegel_berechnen(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let summe: f64 = samples
        .iter()
        .map(|&s| {
            let x = f64::from(s) / 32768.0;
            x * x
        })
        .sum();
    let rms = (summe / samples.len() as f64).sqrt();

    let db = 20.0 * (rms + EPSILON).log10();
    ((db - UNTERGRENZE_DB) / -UNTERGRENZE_DB).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stille_ist_null() {
        assert_eq!(pegel_berechnen(&[0; 320]), 0.0);
        assert_eq!(pegel_berechnen(&[]), 0.0);
    }

    #[test]
    fn vollaussteuerung_ist_eins() {
        let block: Vec<i16> = (0..320)
            .map(|i| if i % 2 == 0 { 32767 } else { -32768 })
            .collect();
        let pegel = pegel_berechnen(&block);
        assert!((pegel - 1.0).abs() < 1e-3, "Pegel war {pegel}");
    }

    #[test]
    fn minus_zwanzig_db() {
        // Konstante Amplitude 0.1 -> -20 dB -> (40/60)
        let block = vec![3277i16; 160];
        let pegel = pegel_berechnen(&block);
        assert!((pegel - 2.0 / 3.0).abs() < 1e-3, "Pegel war {pegel}");
    }

    #[test]
    fn sehr_leise_wird_auf_null_begrenzt() {
        // 1/32768 ~ -90 dB
        assert_eq!(pegel_berechnen(&[1; 64]), 0.0);
    }
}
