//! # Erasure-coded file transfer for stratospheric imagery links
//!
//! This crate implements the transfer core of a telemetry/imagery link
//! between a ground or stratospheric transmitter and a receiver attached to
//! a radio-modem UART or a TCP socket. A file (typically a JPEG or WebP
//! image) is chunked into 200-byte data blocks, augmented with Reed-Solomon
//! parity blocks over GF(2⁸), and framed into fixed 256-byte packets. The
//! receiver reassembles the original bytes bit-for-bit as soon as any K of
//! the N transmitted blocks have arrived.
//!
//! Because GF(2⁸) limits a codeword to 255 symbols, images with many blocks
//! are split into interleaved Reed-Solomon groups (data block `i` belongs to
//! group `i mod num_groups`); each group tolerates the loss of up to
//! `m_per_group` of its blocks. [`GroupPlan`] chooses the split for a
//! requested parity ratio.
//!
//! The same byte stream interleaves 10-byte telemetry frames reporting
//! RSSI, SNR and transmit power. [`StreamParser`] locks onto the two sync
//! patterns, drops anything that fails its CRC, and emits [`FrameEvent`]s in
//! arrival order.
//!
//! The core is single-threaded and strictly in-memory: the I/O side feeds
//! raw bytes to [`StreamParser::feed`] and hands validated packets to an
//! [`ErasureDecoder`]; on the send side [`ErasureEncoder`] turns a file into
//! the ordered packet sequence and [`wire_stream`] serialises it, with
//! periodic telemetry, for the modem.
//!
//! A simple CLI application that can perform encoding and decoding can be
//! built with the `cli` feature, which is enabled by default.

#![warn(missing_docs)]

#[cfg(feature = "cli")]
pub mod cli;

mod decoder;
pub use decoder::{ErasureDecoder, SessionParams, SessionState};
mod encoder;
pub use encoder::{wire_stream, EncodeError, ErasureEncoder};
mod packet;
pub use packet::{
    crc32, decode_callsign, encode_callsign, FecPacket, FileType, BLOCK_PAYLOAD, FEC_PACKET_LEN,
};
mod parser;
pub use parser::{FrameEvent, StreamParser};
mod plan;
pub use plan::GroupPlan;
mod rs;
pub use rs::{RsCodec, RsError};
mod telem;
pub use telem::{build_telem, crc16_ccitt, TelemInfo, TELEM_LEN};
