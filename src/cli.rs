//! CLI application.
//!
//! This module implements the CLI application for encoding a file into an
//! FEC packet stream and recovering a file from a received byte stream.

use crate::{
    wire_stream, ErasureDecoder, ErasureEncoder, FrameEvent, StreamParser, TelemInfo,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{fs, path::PathBuf};

/// Erasure-FEC file transfer encoder and decoder.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a file into a wire byte stream of FEC packets.
    Encode {
        /// Sender callsign (up to 6 characters).
        #[arg(long, default_value = "LORETT")]
        callsign: String,
        /// Image id.
        #[arg(long, default_value_t = 0)]
        image_id: u8,
        /// Parity overhead ratio, clamped to [0.01, 2.0].
        #[arg(long, default_value_t = 0.25)]
        ratio: f64,
        /// Insert a telemetry frame before every Nth block (0 disables).
        #[arg(long, default_value_t = 64)]
        telem_every: usize,
        /// Reported RSSI, dBm.
        #[arg(long, default_value_t = -80, allow_hyphen_values = true)]
        rssi: i16,
        /// Reported SNR, quarter-dB units.
        #[arg(long, default_value_t = 112, allow_hyphen_values = true)]
        snr: i8,
        /// Reported transmit power, dBm.
        #[arg(long, default_value_t = 33)]
        tx_power: u8,
        /// Input file.
        input: PathBuf,
        /// Output file (wire byte stream).
        output: PathBuf,
    },
    /// Recover a file from a received byte stream.
    Decode {
        /// Write the zero-filled partial assembly if recovery fails.
        #[arg(long)]
        partial: bool,
        /// Input file (received byte stream).
        input: PathBuf,
        /// Output file (recovered bytes).
        output: PathBuf,
    },
}

/// Runs the CLI application.
pub fn run() -> Result<()> {
    let args = Args::parse();
    stderrlog::new()
        .verbosity(usize::from(args.verbose) + 1)
        .init()?;
    match args.command {
        Command::Encode {
            callsign,
            image_id,
            ratio,
            telem_every,
            rssi,
            snr,
            tx_power,
            input,
            output,
        } => {
            let encoder = ErasureEncoder::new(&callsign, image_id, ratio);
            let packets = encoder.encode_file(&input)?;
            let telem = TelemInfo {
                rssi,
                snr,
                tx_power,
            };
            fs::write(&output, wire_stream(&packets, &telem, telem_every))?;
        }
        Command::Decode {
            partial,
            input,
            output,
        } => {
            let data = fs::read(&input)?;
            let mut parser = StreamParser::new();
            let mut decoder = ErasureDecoder::new();
            for event in parser.feed(&data) {
                if let FrameEvent::Fec(pkt) = event {
                    decoder.add_packet(&pkt);
                }
            }
            if let Some(recovered) = decoder.decode() {
                fs::write(&output, recovered)?;
                return Ok(());
            }
            match decoder.params() {
                Some(params) if partial => {
                    eprintln!(
                        "recovery incomplete: {} of {} blocks received, writing partial assembly",
                        decoder.received_count(),
                        params.n_total,
                    );
                    fs::write(&output, decoder.assemble_partial())?;
                }
                Some(params) => {
                    anyhow::bail!(
                        "recovery failed: {} of {} blocks received (need any {})",
                        decoder.received_count(),
                        params.n_total,
                        params.k_data,
                    );
                }
                None => anyhow::bail!("no FEC packets found in input"),
            }
        }
    }
    Ok(())
}
