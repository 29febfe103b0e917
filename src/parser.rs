use crate::packet::{FecPacket, FEC_PACKET_LEN, SYNC_BYTE, TYPE_FEC};
use crate::telem::{TelemInfo, TELEM_LEN, TELEM_SYNC_BYTES};
use log::{debug, trace};

// Scratch buffer cap; when exceeded, keep the trailing window so a frame that
// is still arriving survives the trim.
const BUF_CAP: usize = 0x10000;
const BUF_KEEP: usize = 4096;

/// A frame recovered from the byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// An erasure-coded file block.
    Fec(FecPacket),
    /// A telemetry report.
    Telem(TelemInfo),
}

/// Resynchronising parser for a stream that interleaves FEC and telemetry
/// frames.
///
/// Feed it raw bytes as they arrive from the UART or socket; it locks onto
/// the `0x55 0x68` FEC sync or the `0x5A 0xA5` telemetry sync, validates the
/// frame CRC and emits [`FrameEvent`]s in arrival order. Bytes that cannot
/// begin a valid frame are dropped. The parser is deterministic: the emitted
/// event sequence depends only on the concatenated input, not on how it is
/// chunked.
#[derive(Debug, Default)]
pub struct StreamParser {
    buf: Vec<u8>,
    fec_decoded: u64,
    telem_decoded: u64,
    crc_errors: u64,
}

impl StreamParser {
    /// Creates an empty parser.
    pub fn new() -> StreamParser {
        StreamParser::default()
    }

    /// Discards buffered bytes. Counters are kept.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of FEC frames emitted.
    pub fn fec_decoded(&self) -> u64 {
        self.fec_decoded
    }

    /// Number of telemetry frames emitted.
    pub fn telem_decoded(&self) -> u64 {
        self.telem_decoded
    }

    /// Number of sync candidates dropped for a bad CRC.
    pub fn crc_errors(&self) -> u64 {
        self.crc_errors
    }

    /// Consumes raw bytes and returns the frames completed by them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<FrameEvent> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();

        while self.buf.len() >= 2 {
            let fec_idx = self.buf.iter().position(|&b| b == SYNC_BYTE);
            let telem_idx = self
                .buf
                .windows(2)
                .position(|w| w == TELEM_SYNC_BYTES);
            let first = match (fec_idx, telem_idx) {
                (None, None) => {
                    self.buf.clear();
                    break;
                }
                (Some(f), None) => f,
                (None, Some(t)) => t,
                (Some(f), Some(t)) => f.min(t),
            };
            if first > 0 {
                trace!("skipping {first} bytes to next sync candidate");
                self.buf.drain(..first);
                continue;
            }

            if self.buf[0] == SYNC_BYTE && self.buf[1] == TYPE_FEC {
                if self.buf.len() < FEC_PACKET_LEN {
                    break;
                }
                match FecPacket::from_bytes(&self.buf[..FEC_PACKET_LEN]) {
                    Some(pkt) => {
                        self.fec_decoded += 1;
                        events.push(FrameEvent::Fec(pkt));
                        self.buf.drain(..FEC_PACKET_LEN);
                    }
                    None => {
                        self.crc_errors += 1;
                        debug!("FEC sync candidate failed CRC, resyncing");
                        self.buf.drain(..1);
                    }
                }
                continue;
            }

            if self.buf[..2] == TELEM_SYNC_BYTES {
                if self.buf.len() < TELEM_LEN {
                    break;
                }
                match TelemInfo::from_bytes(&self.buf[..TELEM_LEN]) {
                    Some(info) => {
                        self.telem_decoded += 1;
                        events.push(FrameEvent::Telem(info));
                        self.buf.drain(..TELEM_LEN);
                    }
                    None => {
                        self.crc_errors += 1;
                        debug!("telemetry sync candidate failed CRC, resyncing");
                        self.buf.drain(..2);
                    }
                }
                continue;
            }

            self.buf.drain(..1);
        }

        if self.buf.len() > BUF_CAP {
            let excess = self.buf.len() - BUF_KEEP;
            self.buf.drain(..excess);
        }
        events
    }
}
