//! Fehlertypen fuer das Wire-Protokoll

use thiserror::Error;

/// Fehler beim Parsen oder Validieren eines Datagramms
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtokollFehler {
    #[error("Steuernachricht '{0}' ohne Feldtrenner")]
    FehlendesFeld(&'static str),

    #[error("Steuernachricht ist kein gueltiges UTF-8")]
    KeinUtf8,

    #[error("Audio-Paket zu kurz: {0} Bytes (mindestens 14)")]
    ZuKurz(usize),

    #[error("Nutzdaten zu lang: {0} Bytes (Maximum {1})")]
    NutzdatenZuLang(usize, usize),

    #[error("Laengenfehler: Datagramm hat {ist} Bytes, Header verlangt {erwartet}")]
    LaengeFalsch { ist: usize, erwartet: usize },
}

pub type ProtokollResult<T> = Result<T, ProtokollFehler>;
