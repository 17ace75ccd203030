//! Voice-Protokoll (UDP)
//!
//! Binaere Paketstruktur fuer rohe PCM-Audiodaten. Der Server wertet nur den
//! Header aus und leitet das Datagramm unveraendert an die Raummitglieder weiter.
//!
//! ## Paketformat (Header = 14 Bytes, kein serde)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       4   SequenzNummer (big-endian)
//!  4       4   Zeitstempel in ms (big-endian, Wall-Clock modulo 2^32)
//!  8       4   Sender-Hash (big-endian, FNV-1a der Benutzerkennung)
//! 12       2   Nutzdaten-Laenge (big-endian)
//! 14+      N   Nutzdaten (PCM, 16 Bit signed little-endian)
//! ```

use crate::error::{ProtokollFehler, ProtokollResult};

/// Groesse des Audio-Headers in Bytes
pub const HEADER_GROESSE: usize = AudioPacketHeader::SIZE;

/// Maximale Nutzdaten-Laenge, die der Server akzeptiert
pub const MAX_NUTZDATEN: usize = 1024;

/// Maximale Nutzdaten-Laenge, die ein Client pro Paket versendet
pub const MAX_CAPTURE_NUTZDATEN: usize = 640;

// ---------------------------------------------------------------------------
// AudioPacketHeader
// ---------------------------------------------------------------------------

/// 14-Byte Header eines Audio-Datagramms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPacketHeader {
    /// Pro Sender fortlaufend, Wrap-around bei 2^32
    pub sequence: u32,
    /// Wall-Clock-Millisekunden beim Senden (abgeschnitten auf 32 Bit)
    pub timestamp: u32,
    /// Hash der Benutzerkennung des Senders (siehe [`benutzer_hash`])
    pub user_id: u32,
    /// Laenge der Nutzdaten in Bytes
    pub data_size: u16,
}

impl AudioPacketHeader {
    /// Header-Groesse in Bytes
    pub const SIZE: usize = 14;

    /// Serialisiert den Header (big-endian)
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.user_id.to_be_bytes());
        buf[12..14].copy_from_slice(&self.data_size.to_be_bytes());
        buf
    }

    /// Liest nur die 14 Header-Bytes, ohne die Gesamtlaenge zu pruefen
    pub fn decode(buf: &[u8]) -> ProtokollResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(ProtokollFehler::ZuKurz(buf.len()));
        }

        Ok(Self {
            sequence: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            user_id: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            data_size: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }

    /// Erwartete Gesamtlaenge des Datagramms laut Header
    pub fn paket_laenge(&self) -> usize {
        Self::SIZE + self.data_size as usize
    }
}

// ---------------------------------------------------------------------------
// AudioPacket
// ---------------------------------------------------------------------------

/// Vollstaendiges Audio-Datagramm (Header + PCM-Nutzdaten)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    pub header: AudioPacketHeader,
    pub payload: Vec<u8>,
}

impl AudioPacket {
    /// Erstellt ein Paket; `data_size` wird aus der Nutzdaten-Laenge abgeleitet
    ///
    /// # Fehler
    /// - `NutzdatenZuLang` wenn `payload` groesser als [`MAX_NUTZDATEN`] ist
    pub fn neu(sequence: u32, timestamp: u32, user_id: u32, payload: Vec<u8>) -> ProtokollResult<Self> {
        if payload.len() > MAX_NUTZDATEN {
            return Err(ProtokollFehler::NutzdatenZuLang(payload.len(), MAX_NUTZDATEN));
        }
        Ok(Self {
            header: AudioPacketHeader {
                sequence,
                timestamp,
                user_id,
                data_size: payload.len() as u16,
            },
            payload,
        })
    }

    /// Serialisiert das gesamte Paket
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.groesse());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Validiert ein Datagramm ohne die Nutzdaten zu kopieren
    ///
    /// Gueltig ist ein Datagramm genau dann, wenn es mindestens 14 Bytes hat,
    /// `data_size <= MAX_NUTZDATEN` gilt und die Laenge exakt `14 + data_size` ist.
    pub fn pruefen(buf: &[u8]) -> ProtokollResult<AudioPacketHeader> {
        let header = AudioPacketHeader::decode(buf)?;

        if header.data_size as usize > MAX_NUTZDATEN {
            return Err(ProtokollFehler::NutzdatenZuLang(
                header.data_size as usize,
                MAX_NUTZDATEN,
            ));
        }

        if buf.len() != header.paket_laenge() {
            return Err(ProtokollFehler::LaengeFalsch {
                ist: buf.len(),
                erwartet: header.paket_laenge(),
            });
        }

        Ok(header)
    }

    /// Deserialisiert und validiert ein Paket
    pub fn decode(buf: &[u8]) -> ProtokollResult<Self> {
        let header = Self::pruefen(buf)?;
        Ok(Self {
            header,
            payload: buf[AudioPacketHeader::SIZE..].to_vec(),
        })
    }

    /// Gesamtgroesse des Paketes in Bytes
    pub fn groesse(&self) -> usize {
        AudioPacketHeader::SIZE + self.payload.len()
    }

    /// Nutzdaten als PCM-Samples
    pub fn samples(&self) -> Vec<i16> {
        pcm_zu_samples(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-Bit FNV-1a Hash einer Benutzerkennung
///
/// Stabil ueber Prozessgrenzen hinweg, damit Empfaenger den Sender wieder
/// einer bekannten Kennung zuordnen koennen.
pub fn benutzer_hash(benutzer: &str) -> u32 {
    benutzer.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Wandelt PCM-Bytes (i16 little-endian) in Samples; ein ungerades Restbyte entfaellt
pub fn pcm_zu_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|paar| i16::from_le_bytes([paar[0], paar[1]]))
        .collect()
}

/// Wandelt Samples in PCM-Bytes (i16 little-endian)
pub fn samples_zu_pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
