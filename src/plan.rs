use crate::packet::RS_MAX;

/// Reed-Solomon group layout for an image of `k` data blocks.
///
/// GF(2⁸) limits a codeword to 255 symbols, so images with many blocks are
/// split into groups that are encoded independently. Data block `i` belongs
/// to group `i mod num_groups`; the group's parity blocks sit consecutively
/// in the parity range starting at `k + g * m_per_group`.
///
/// Within a group the codeword is laid out as
/// `[data symbols, zero padding up to g_size, parity symbols]`. A group with
/// fewer than `g_size` data blocks is padded with known-zero symbols before
/// encoding; padding is part of the encoded message, never an erasure.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GroupPlan {
    k: usize,
    g_size: usize,
    m_per_group: u8,
    num_groups: usize,
}

impl GroupPlan {
    /// Plans the group split for `k` data blocks and a parity ratio.
    ///
    /// If `k` plus the desired parity fits a single codeword, there is one
    /// group of exactly `k` data symbols and no padding. Otherwise the group
    /// size is chosen to preserve the requested overhead ratio as closely as
    /// possible, with per-group parity capped at 127 so that data symbols
    /// always outnumber parity in a split group.
    pub fn new(k: usize, fec_ratio: f64) -> GroupPlan {
        let m_desired = ((k as f64 * fec_ratio).ceil() as usize).max(1);
        if k + m_desired <= RS_MAX {
            return GroupPlan {
                k,
                g_size: k,
                m_per_group: m_desired as u8,
                num_groups: 1,
            };
        }
        let m_g = (fec_ratio * RS_MAX as f64 / (1.0 + fec_ratio)).round() as i64;
        let m_g = m_g.clamp(1, 127) as u8;
        let g_size = RS_MAX - usize::from(m_g);
        GroupPlan {
            k,
            g_size,
            m_per_group: m_g,
            num_groups: k.div_ceil(g_size),
        }
    }

    /// Rebuilds the plan from the parameters carried in every packet header.
    ///
    /// Returns `None` if the parameters cannot describe a valid layout.
    pub fn from_params(k: u16, m_per_group: u8, num_groups: u8) -> Option<GroupPlan> {
        let k = usize::from(k);
        if k == 0 || m_per_group == 0 || num_groups == 0 {
            return None;
        }
        let g_size = if num_groups == 1 {
            k
        } else {
            RS_MAX - usize::from(m_per_group)
        };
        if g_size + usize::from(m_per_group) > RS_MAX {
            return None;
        }
        if g_size * usize::from(num_groups) < k {
            return None;
        }
        Some(GroupPlan {
            k,
            g_size,
            m_per_group,
            num_groups: usize::from(num_groups),
        })
    }

    /// Number of data blocks.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Data symbols per group codeword, padding included.
    pub fn g_size(&self) -> usize {
        self.g_size
    }

    /// Parity blocks per group.
    pub fn m_per_group(&self) -> u8 {
        self.m_per_group
    }

    /// Number of groups.
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Total parity block count.
    pub fn m_total(&self) -> usize {
        usize::from(self.m_per_group) * self.num_groups
    }

    /// Total block count `k + m_total`.
    pub fn n_total(&self) -> usize {
        self.k + self.m_total()
    }

    /// Block ids of the data blocks in group `g`, in codeword position order.
    pub fn data_ids(&self, g: usize) -> impl Iterator<Item = usize> + '_ {
        (g..self.k).step_by(self.num_groups)
    }

    /// Block ids of the parity blocks in group `g`, in codeword position
    /// order.
    pub fn parity_ids(&self, g: usize) -> core::ops::Range<usize> {
        let start = self.k + g * usize::from(self.m_per_group);
        start..start + usize::from(self.m_per_group)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_block() {
        let plan = GroupPlan::new(1, 0.25);
        assert_eq!(plan.g_size(), 1);
        assert_eq!(plan.m_per_group(), 1);
        assert_eq!(plan.num_groups(), 1);
        assert_eq!(plan.n_total(), 2);
    }

    #[test]
    fn small_single_group() {
        let plan = GroupPlan::new(5, 0.25);
        assert_eq!(plan.g_size(), 5);
        assert_eq!(plan.m_per_group(), 2);
        assert_eq!(plan.num_groups(), 1);
        assert_eq!(plan.n_total(), 7);
    }

    #[test]
    fn split_at_quarter_ratio() {
        // 300 blocks at r = 0.25: per-group parity is round(0.25·255/1.25) = 51,
        // group size 204, two groups.
        let plan = GroupPlan::new(300, 0.25);
        assert_eq!(plan.m_per_group(), 51);
        assert_eq!(plan.g_size(), 204);
        assert_eq!(plan.num_groups(), 2);
        assert_eq!(plan.n_total(), 300 + 2 * 51);
    }

    #[test]
    fn large_image() {
        let plan = GroupPlan::new(1000, 0.25);
        assert_eq!(plan.m_per_group(), 51);
        assert_eq!(plan.g_size(), 204);
        assert_eq!(plan.num_groups(), 5);
    }

    #[test]
    fn interleaved_membership() {
        // 500 blocks at r = 0.25 split into 3 groups of 204.
        let plan = GroupPlan::new(500, 0.25);
        assert_eq!(plan.num_groups(), 3);
        let g0: Vec<usize> = plan.data_ids(0).collect();
        let g1: Vec<usize> = plan.data_ids(1).collect();
        assert!(g0.iter().all(|&i| i % 3 == 0));
        assert!(g1.iter().all(|&i| i % 3 == 1));
        assert_eq!(g0.len() + g1.len() + plan.data_ids(2).count(), plan.k());
        assert_eq!(plan.parity_ids(0), 500..551);
        assert_eq!(plan.parity_ids(1), 551..602);
    }

    #[test]
    fn limits_hold_across_ratio_grid() {
        for k in [1, 2, 10, 100, 255, 256, 300, 1000, 5000] {
            for r in [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 1.5, 2.0] {
                let plan = GroupPlan::new(k, r);
                assert!(plan.g_size() + usize::from(plan.m_per_group()) <= RS_MAX);
                assert!(plan.m_per_group() >= 1);
                assert!(plan.g_size() * usize::from(plan.num_groups()) >= k);
                if plan.num_groups() > 1 {
                    assert!(plan.m_per_group() <= 127);
                }
            }
        }
    }

    #[test]
    fn from_params_mirrors_planner() {
        for (k, r) in [(1, 0.25), (5, 0.25), (300, 0.25), (1000, 0.5)] {
            let plan = GroupPlan::new(k, r);
            let rebuilt = GroupPlan::from_params(
                k as u16,
                plan.m_per_group(),
                plan.num_groups() as u8,
            )
            .unwrap();
            assert_eq!(rebuilt, plan);
        }
    }

    #[test]
    fn from_params_rejects_nonsense() {
        assert!(GroupPlan::from_params(0, 1, 1).is_none());
        assert!(GroupPlan::from_params(10, 0, 1).is_none());
        assert!(GroupPlan::from_params(10, 1, 0).is_none());
        // one group of 300 data symbols cannot fit a codeword
        assert!(GroupPlan::from_params(300, 51, 1).is_none());
        // two groups of 204 cannot cover 1000 blocks
        assert!(GroupPlan::from_params(1000, 51, 2).is_none());
    }
}
