use crate::packet::{FecPacket, FileType, BLOCK_PAYLOAD};
use crate::plan::GroupPlan;
use crate::rs;
use log::{debug, info};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Session parameters adopted from the first accepted packet of an image.
///
/// Every packet of one image carries the same parameters, so whichever packet
/// arrives first is authoritative.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionParams {
    /// Sender callsign.
    pub callsign: String,
    /// Image id of the session.
    pub image_id: u8,
    /// Number of data blocks.
    pub k_data: u16,
    /// Total block count.
    pub n_total: u16,
    /// Original file size in bytes.
    pub file_size: u32,
    /// Payload kind of the original file.
    pub file_type: FileType,
    /// Parity blocks per Reed-Solomon group.
    pub m_per_group: u8,
    /// Number of Reed-Solomon groups.
    pub num_groups: u8,
}

impl SessionParams {
    fn from_packet(pkt: &FecPacket) -> SessionParams {
        SessionParams {
            callsign: pkt.callsign.clone(),
            image_id: pkt.image_id,
            k_data: pkt.k_data,
            n_total: pkt.n_total,
            file_size: pkt.file_size,
            file_type: pkt.file_type,
            m_per_group: pkt.m_per_group,
            num_groups: pkt.num_groups,
        }
    }
}

/// Receiver session lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SessionState {
    /// No packet accepted yet.
    Empty,
    /// Accumulating blocks, below the decode threshold.
    Accumulating,
    /// At least `k_data` blocks held; recovery can be attempted.
    Recoverable,
    /// The file has been recovered. Further matching packets are absorbed
    /// but no decode runs again.
    Recovered,
}

/// Erasure-FEC receiver session.
///
/// Blocks are accumulated keyed by `block_id` until any `k_data` of the
/// `n_total` blocks are held, at which point [`ErasureDecoder::decode`]
/// reconstructs the original file bit-for-bit. A packet with a different
/// `image_id` resets the session and starts accumulating the new image.
#[derive(Debug, Default)]
pub struct ErasureDecoder {
    params: Option<SessionParams>,
    blocks: HashMap<u16, [u8; BLOCK_PAYLOAD]>,
    decoded: Option<Vec<u8>>,
    duplicates: u64,
}

impl ErasureDecoder {
    /// Creates an empty session.
    pub fn new() -> ErasureDecoder {
        ErasureDecoder::default()
    }

    /// Drops all session state, equivalent to a fresh session.
    pub fn reset(&mut self) {
        self.params = None;
        self.blocks.clear();
        self.decoded = None;
        self.duplicates = 0;
    }

    /// Accepts one validated packet.
    ///
    /// The first packet of a session fixes the session parameters. A packet
    /// for a different image resets the session first. A block id already
    /// held is a no-op counted in [`ErasureDecoder::duplicates`].
    pub fn add_packet(&mut self, pkt: &FecPacket) {
        if let Some(params) = &self.params {
            if params.image_id != pkt.image_id {
                info!(
                    "image id changed {} -> {}, resetting session",
                    params.image_id, pkt.image_id
                );
                self.reset();
            }
        }
        if self.params.is_none() {
            info!(
                "session start: call={} image={} k={} n={} file={} bytes",
                pkt.callsign, pkt.image_id, pkt.k_data, pkt.n_total, pkt.file_size
            );
            self.params = Some(SessionParams::from_packet(pkt));
        }
        match self.blocks.entry(pkt.block_id) {
            Entry::Occupied(_) => self.duplicates += 1,
            Entry::Vacant(entry) => {
                entry.insert(pkt.payload);
            }
        }
    }

    /// Parameters of the current session, if any packet has been accepted.
    pub fn params(&self) -> Option<&SessionParams> {
        self.params.as_ref()
    }

    /// Number of distinct blocks held.
    pub fn received_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of duplicate packets absorbed.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// True once at least `k_data` distinct blocks are held.
    pub fn can_decode(&self) -> bool {
        match &self.params {
            Some(params) => params.k_data > 0 && self.blocks.len() >= usize::from(params.k_data),
            None => false,
        }
    }

    /// True once the file has been recovered.
    pub fn is_complete(&self) -> bool {
        self.decoded.is_some()
    }

    /// Fraction of the decode threshold reached, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        match &self.params {
            Some(params) if params.k_data > 0 => {
                (self.blocks.len() as f64 / f64::from(params.k_data)).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.params.is_none() {
            SessionState::Empty
        } else if self.decoded.is_some() {
            SessionState::Recovered
        } else if self.can_decode() {
            SessionState::Recoverable
        } else {
            SessionState::Accumulating
        }
    }

    /// Attempts the group-wise erasure decode.
    ///
    /// Returns the recovered file once at least `k_data` blocks are held and
    /// every group is missing at most `m_per_group` of its codeword
    /// positions; otherwise returns `None` and the session keeps
    /// accumulating. After a successful recovery the stored result is
    /// returned without decoding again.
    pub fn decode(&mut self) -> Option<&[u8]> {
        if self.decoded.is_some() {
            return self.decoded.as_deref();
        }
        if !self.can_decode() {
            return None;
        }
        let params = self.params.as_ref()?;
        let file_size = params.file_size;
        let plan = GroupPlan::from_params(params.k_data, params.m_per_group, params.num_groups)?;

        let m = usize::from(plan.m_per_group());
        let codec = rs::cached(plan.m_per_group());
        let mut recovered = vec![[0u8; BLOCK_PAYLOAD]; plan.k()];
        for g in 0..plan.num_groups() {
            let ids: Vec<usize> = plan.data_ids(g).collect();

            // Positions 0..gk are this group's data blocks, positions
            // g_size.. are its parity; the slots in between are known-zero
            // padding and are never erasures.
            let mut erasures = Vec::new();
            for (pos, &id) in ids.iter().enumerate() {
                if !self.blocks.contains_key(&(id as u16)) {
                    erasures.push(pos);
                }
            }
            let data_missing = erasures.len();
            for (pos, pid) in plan.parity_ids(g).enumerate() {
                if !self.blocks.contains_key(&(pid as u16)) {
                    erasures.push(plan.g_size() + pos);
                }
            }
            if erasures.len() > m {
                debug!(
                    "group {g}: {} erasures exceed parity budget {m}",
                    erasures.len()
                );
                return None;
            }

            if data_missing == 0 {
                for &id in &ids {
                    recovered[id] = self.blocks[&(id as u16)];
                }
                continue;
            }

            let mut codeword = vec![0u8; plan.g_size() + m];
            for col in 0..BLOCK_PAYLOAD {
                for (pos, &id) in ids.iter().enumerate() {
                    codeword[pos] = self
                        .blocks
                        .get(&(id as u16))
                        .map_or(0, |payload| payload[col]);
                }
                for (pos, pid) in plan.parity_ids(g).enumerate() {
                    codeword[plan.g_size() + pos] = self
                        .blocks
                        .get(&(pid as u16))
                        .map_or(0, |payload| payload[col]);
                }
                let msg = codec.decode_erasures(&codeword, &erasures).ok()?;
                for (pos, &id) in ids.iter().enumerate() {
                    recovered[id][col] = msg[pos];
                }
            }
        }

        let mut flat = Vec::with_capacity(plan.k() * BLOCK_PAYLOAD);
        for row in &recovered {
            flat.extend_from_slice(row);
        }
        flat.truncate(file_size as usize);
        info!("recovered file 1:1 ({} bytes)", flat.len());
        self.decoded = Some(flat);
        self.decoded.as_deref()
    }

    /// Best-effort concatenation of the data blocks held so far, with
    /// missing blocks zero-filled, truncated to the file size.
    ///
    /// Returns the recovered file once decoding has succeeded. Used for
    /// progressive image preview before the decode threshold.
    pub fn assemble_partial(&self) -> Vec<u8> {
        if let Some(decoded) = &self.decoded {
            return decoded.clone();
        }
        let Some(params) = &self.params else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(usize::from(params.k_data) * BLOCK_PAYLOAD);
        for i in 0..params.k_data {
            match self.blocks.get(&i) {
                Some(payload) => out.extend_from_slice(payload),
                None => out.extend_from_slice(&[0u8; BLOCK_PAYLOAD]),
            }
        }
        out.truncate(params.file_size as usize);
        out
    }
}
