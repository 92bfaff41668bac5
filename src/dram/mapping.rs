use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sim::config::{DramConfig, MappingMode};

/// Picks the channel a request is steered to.
///
/// `Weighted` ignores the address entirely and consumes one draw per call, so two requests to
/// the same block can land in different channels and miss each other in the merge and forward
/// checks. `Interleaved` is a pure function of the block address.
#[derive(Debug)]
pub struct ChannelMapper {
    mode: MappingMode,
    channels: usize,
    log2_block_size: u32,
    // running sums of the per-channel weights
    thresholds: Vec<u64>,
    rng: StdRng,
}

impl ChannelMapper {
    pub fn new(config: &DramConfig) -> Self {
        let thresholds = config
            .weights
            .iter()
            .scan(0u64, |acc, &w| {
                *acc += u64::from(w);
                Some(*acc)
            })
            .collect();
        Self {
            mode: config.mapping,
            channels: config.channels,
            log2_block_size: config.log2_block_size,
            thresholds,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn select(&mut self, address: u64) -> usize {
        match self.mode {
            MappingMode::Weighted => self.draw(),
            MappingMode::Interleaved => {
                ((address >> self.log2_block_size) % self.channels as u64) as usize
            }
        }
    }

    fn draw(&mut self) -> usize {
        let total = self.thresholds.last().copied().unwrap_or(0);
        if total == 0 {
            return 0;
        }
        let sample = self.rng.gen_range(0..total);
        self.thresholds
            .iter()
            .position(|&threshold| sample < threshold)
            .unwrap_or(self.channels - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_is_a_function_of_block_address() {
        let config = DramConfig {
            mapping: MappingMode::Interleaved,
            ..DramConfig::default()
        };
        let mut mapper = ChannelMapper::new(&config);
        assert_eq!(mapper.select(0x0), 0);
        assert_eq!(mapper.select(0x3f), 0);
        assert_eq!(mapper.select(0x40), 1);
        assert_eq!(mapper.select(0xc0), 3);
        assert_eq!(mapper.select(0x100), 0);
        assert_eq!(mapper.select(0x40), mapper.select(0x7f));
    }

    #[test]
    fn weighted_draw_is_reproducible_per_seed() {
        let config = DramConfig::default();
        let mut a = ChannelMapper::new(&config);
        let mut b = ChannelMapper::new(&config);
        let xs: Vec<usize> = (0..64).map(|_| a.select(0x1000)).collect();
        let ys: Vec<usize> = (0..64).map(|_| b.select(0x1000)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&c| c < 4));
    }

    #[test]
    fn weighted_draw_follows_the_distribution() {
        let config = DramConfig {
            seed: 7,
            ..DramConfig::default()
        };
        let mut mapper = ChannelMapper::new(&config);
        let mut hist = [0usize; 4];
        let draws = 29500;
        for _ in 0..draws {
            hist[mapper.select(0)] += 1;
        }
        // expected 3300 / 1000 / 4500 / 20700
        assert!((2800..3800).contains(&hist[0]), "{hist:?}");
        assert!((700..1300).contains(&hist[1]), "{hist:?}");
        assert!((4000..5000).contains(&hist[2]), "{hist:?}");
        assert!((19700..21700).contains(&hist[3]), "{hist:?}");
    }

    #[test]
    fn zero_weight_channel_is_never_picked() {
        let config = DramConfig {
            channels: 3,
            weights: vec![0, 5, 0],
            ..DramConfig::default()
        };
        let mut mapper = ChannelMapper::new(&config);
        assert!((0..100).all(|_| mapper.select(0) == 1));
    }

    #[test]
    fn large_weights_keep_every_channel_reachable() {
        let config = DramConfig {
            channels: 3,
            weights: vec![u32::MAX, u32::MAX, u32::MAX],
            seed: 5,
            ..DramConfig::default()
        };
        let mut mapper = ChannelMapper::new(&config);
        let mut hist = [0usize; 3];
        for _ in 0..300 {
            hist[mapper.select(0)] += 1;
        }
        assert!(hist.iter().all(|&n| n > 50), "{hist:?}");
    }
}
