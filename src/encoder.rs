use crate::packet::{FecPacket, FileType, BLOCK_PAYLOAD};
use crate::plan::GroupPlan;
use crate::rs::{self, RsError};
use crate::telem::TelemInfo;
use log::info;
use std::path::Path;
use thiserror::Error;

/// Erasure-FEC encoder for one sender.
///
/// The encoder is configured once with the callsign, image id and parity
/// ratio; [`ErasureEncoder::encode_bytes`] then turns a file into the full
/// ordered packet sequence for that image. The packet list is the immutable
/// sender session: data packets first by ascending `block_id`, then parity
/// packets by ascending `block_id`.
#[derive(Debug, Clone)]
pub struct ErasureEncoder {
    callsign: String,
    image_id: u8,
    fec_ratio: f64,
}

/// Error produced by the FEC encoder.
///
/// This enum lists the errors that can be produced by [`ErasureEncoder`].
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Reading the input file failed.
    #[error("reading input failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file needs more blocks or groups than the packet header can
    /// describe.
    #[error("file too large for the packet header fields")]
    FileTooLarge,
    /// The Reed-Solomon codec rejected a group codeword.
    #[error("Reed-Solomon encoding failed: {0}")]
    Rs(#[from] RsError),
}

impl ErasureEncoder {
    /// Creates an encoder.
    ///
    /// The parity ratio is clamped to `[0.01, 2.0]`.
    pub fn new(callsign: &str, image_id: u8, fec_ratio: f64) -> ErasureEncoder {
        ErasureEncoder {
            callsign: callsign.to_string(),
            image_id,
            fec_ratio: fec_ratio.clamp(0.01, 2.0),
        }
    }

    /// Reads a file and encodes it into the ordered packet sequence.
    pub fn encode_file(&self, path: impl AsRef<Path>) -> Result<Vec<FecPacket>, EncodeError> {
        let data = std::fs::read(path)?;
        self.encode_bytes(&data)
    }

    /// Encodes a byte buffer into the ordered packet sequence.
    ///
    /// The buffer is chunked into 200-byte data blocks (the last block is
    /// zero-padded), split into Reed-Solomon groups and augmented with
    /// per-group parity blocks computed column-wise over the block payloads.
    pub fn encode_bytes(&self, data: &[u8]) -> Result<Vec<FecPacket>, EncodeError> {
        let file_size = u32::try_from(data.len()).map_err(|_| EncodeError::FileTooLarge)?;
        let file_type = FileType::detect(data);
        let k = data.len().div_ceil(BLOCK_PAYLOAD).max(1);

        let plan = GroupPlan::new(k, self.fec_ratio);
        if plan.n_total() > usize::from(u16::MAX) || plan.num_groups() > usize::from(u8::MAX) {
            return Err(EncodeError::FileTooLarge);
        }

        let mut rows = vec![[0u8; BLOCK_PAYLOAD]; k];
        for (row, chunk) in rows.iter_mut().zip(data.chunks(BLOCK_PAYLOAD)) {
            row[..chunk.len()].copy_from_slice(chunk);
        }

        let m = usize::from(plan.m_per_group());
        let codec = rs::cached(plan.m_per_group());
        let mut parity = vec![[0u8; BLOCK_PAYLOAD]; plan.m_total()];
        for g in 0..plan.num_groups() {
            let ids: Vec<usize> = plan.data_ids(g).collect();
            // message symbols beyond the group's data rows stay known-zero
            let mut msg = vec![0u8; plan.g_size()];
            for col in 0..BLOCK_PAYLOAD {
                for (pos, &id) in ids.iter().enumerate() {
                    msg[pos] = rows[id][col];
                }
                let codeword = codec.encode(&msg)?;
                for p in 0..m {
                    parity[g * m + p][col] = codeword[plan.g_size() + p];
                }
            }
        }

        info!(
            "encoded image {}: k={} + m={} = {} blocks ({} bytes, overhead {:.0}%)",
            self.image_id,
            k,
            plan.m_total(),
            plan.n_total(),
            file_size,
            plan.m_total() as f64 / k as f64 * 100.0,
        );

        let header = |block_id: usize, payload: [u8; BLOCK_PAYLOAD]| FecPacket {
            callsign: self.callsign.clone(),
            image_id: self.image_id,
            block_id: block_id as u16,
            k_data: k as u16,
            n_total: plan.n_total() as u16,
            file_size,
            file_type,
            m_per_group: plan.m_per_group(),
            num_groups: plan.num_groups() as u8,
            payload,
        };
        let mut packets = Vec::with_capacity(plan.n_total());
        for (i, row) in rows.into_iter().enumerate() {
            packets.push(header(i, row));
        }
        for (p, row) in parity.into_iter().enumerate() {
            packets.push(header(k + p, row));
        }
        Ok(packets)
    }
}

/// Serialises a packet sequence into one wire byte stream, inserting a
/// telemetry frame before every block whose id is a multiple of `every`.
///
/// `every = 0` disables telemetry interleaving. The radio firmware reports
/// link state this way once per 64 blocks.
pub fn wire_stream(packets: &[FecPacket], telem: &TelemInfo, every: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(packets.len() * crate::packet::FEC_PACKET_LEN);
    for pkt in packets {
        if every != 0 && usize::from(pkt.block_id) % every == 0 {
            out.extend_from_slice(&telem.to_bytes());
        }
        out.extend_from_slice(&pkt.to_bytes());
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::{FrameEvent, StreamParser};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|j| (j * 7 + j / 251) as u8).collect()
    }

    #[test]
    fn single_block_image() {
        let data: Vec<u8> = (0..=0xc7).collect();
        let packets = ErasureEncoder::new("LORETT", 0, 0.25)
            .encode_bytes(&data)
            .unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].k_data, 1);
        assert_eq!(packets[0].n_total, 2);
        assert_eq!(packets[0].m_per_group, 1);
        assert_eq!(&packets[0].payload[..], &data[..]);
        assert!(!packets[0].is_parity());
        assert!(packets[1].is_parity());
    }

    #[test]
    fn canonical_packet_order_and_common_header() {
        let packets = ErasureEncoder::new("N0CALL", 9, 0.25)
            .encode_bytes(&pattern(1000))
            .unwrap();
        assert_eq!(packets.len(), 7); // k=5, m=2
        for (j, pkt) in packets.iter().enumerate() {
            assert_eq!(usize::from(pkt.block_id), j);
            assert_eq!(pkt.callsign, "N0CALL");
            assert_eq!(pkt.image_id, 9);
            assert_eq!(pkt.k_data, 5);
            assert_eq!(pkt.n_total, 7);
            assert_eq!(pkt.file_size, 1000);
            assert_eq!(pkt.m_per_group, 2);
            assert_eq!(pkt.num_groups, 1);
            assert_eq!(pkt.is_parity(), j >= 5);
        }
    }

    #[test]
    fn last_block_is_zero_padded() {
        let packets = ErasureEncoder::new("A", 0, 0.25)
            .encode_bytes(&pattern(250))
            .unwrap();
        assert_eq!(packets[0].k_data, 2);
        assert_eq!(&packets[1].payload[..50], &pattern(250)[200..]);
        assert!(packets[1].payload[50..].iter().all(|&b| b == 0));
    }

    #[test]
    fn group_codewords_are_valid() {
        // Rebuild each group codeword column and check it decodes cleanly,
        // padding included.
        let data = pattern(60_000); // k=300, split into 2 groups of m=51
        let packets = ErasureEncoder::new("LORETT", 3, 0.25)
            .encode_bytes(&data)
            .unwrap();
        let plan = GroupPlan::new(300, 0.25);
        assert_eq!(plan.num_groups(), 2);
        let codec = rs::cached(plan.m_per_group());
        for g in 0..plan.num_groups() {
            let ids: Vec<usize> = plan.data_ids(g).collect();
            let m = usize::from(plan.m_per_group());
            for col in [0usize, 17, 199] {
                let mut cw = vec![0u8; plan.g_size() + m];
                for (pos, &id) in ids.iter().enumerate() {
                    cw[pos] = packets[id].payload[col];
                }
                for (pos, pid) in plan.parity_ids(g).enumerate() {
                    cw[plan.g_size() + pos] = packets[pid].payload[col];
                }
                let msg = codec.decode_erasures(&cw, &[]).unwrap();
                for (pos, &id) in ids.iter().enumerate() {
                    assert_eq!(msg[pos], packets[id].payload[col]);
                }
            }
        }
    }

    #[test]
    fn detects_jpeg_magic() {
        let mut data = pattern(5000);
        data[0] = 0xff;
        data[1] = 0xd8;
        let packets = ErasureEncoder::new("LORETT", 1, 0.25)
            .encode_bytes(&data)
            .unwrap();
        assert!(packets.iter().all(|p| p.file_type == FileType::Jpeg));
    }

    #[test]
    fn ratio_is_clamped() {
        let packets = ErasureEncoder::new("LORETT", 0, 1000.0)
            .encode_bytes(&pattern(400))
            .unwrap();
        // r clamps to 2.0: k=2, m=4
        assert_eq!(packets.len(), 6);
    }

    #[test]
    fn empty_input_still_produces_one_block() {
        let packets = ErasureEncoder::new("LORETT", 0, 0.25)
            .encode_bytes(&[])
            .unwrap();
        assert_eq!(packets[0].k_data, 1);
        assert_eq!(packets[0].file_size, 0);
        assert_eq!(packets.len(), 2);
    }

    #[test]
    fn wire_stream_interleaves_telemetry() {
        let packets = ErasureEncoder::new("LORETT", 2, 0.25)
            .encode_bytes(&pattern(1000))
            .unwrap();
        let telem = TelemInfo {
            rssi: -88,
            snr: 104,
            tx_power: 33,
        };
        let stream = wire_stream(&packets, &telem, 4);

        let mut parser = StreamParser::new();
        let events = parser.feed(&stream);
        let fec: Vec<u16> = events
            .iter()
            .filter_map(|e| match e {
                FrameEvent::Fec(p) => Some(p.block_id),
                FrameEvent::Telem(_) => None,
            })
            .collect();
        assert_eq!(fec, (0..7).collect::<Vec<u16>>());
        // blocks 0 and 4 trigger a report
        let telem_count = events
            .iter()
            .filter(|e| matches!(e, FrameEvent::Telem(_)))
            .count();
        assert_eq!(telem_count, 2);
        assert!(matches!(events[0], FrameEvent::Telem(t) if t == telem));
    }
}
