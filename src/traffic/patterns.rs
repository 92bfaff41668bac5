use crate::traffic::config::{TrafficConfig, TrafficPattern};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternOp {
    Read,
    Write,
    Prefetch,
}

impl PatternOp {
    pub fn is_store(self) -> bool {
        matches!(self, Self::Write)
    }

    pub fn short(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Prefetch => "p",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficOp {
    pub op: PatternOp,
    pub address: u64,
}

#[derive(Debug)]
struct CpuStream {
    rng: StdRng,
    next_idx: u64,
}

/// Address and op generator for every cpu. Each cpu draws from its own seeded stream, so the
/// sequence a cpu sees does not depend on how the others are scheduled.
#[derive(Debug)]
pub struct PatternEngine {
    pattern: TrafficPattern,
    base_addr: u64,
    footprint_bytes: u64,
    stride_bytes: u64,
    hot_blocks: u64,
    write_ratio: f64,
    prefetch_ratio: f64,
    streams: Vec<CpuStream>,
}

impl PatternEngine {
    pub fn new(config: &TrafficConfig, num_cpus: usize) -> Self {
        let streams = (0..num_cpus)
            .map(|cpu| CpuStream {
                rng: StdRng::seed_from_u64(config.seed.wrapping_add(cpu as u64)),
                next_idx: 0,
            })
            .collect();
        Self {
            pattern: config.pattern,
            base_addr: config.base_addr,
            footprint_bytes: config.footprint_bytes,
            stride_bytes: config.stride_bytes.max(1),
            hot_blocks: config.hot_blocks.max(1),
            write_ratio: config.write_ratio,
            prefetch_ratio: config.prefetch_ratio,
            streams,
        }
    }

    pub fn next(&mut self, cpu: usize) -> TrafficOp {
        let slots = (self.footprint_bytes / self.stride_bytes).max(1);
        // addresses wrap around the top of the address space
        let window = self
            .base_addr
            .wrapping_add((cpu as u64).wrapping_mul(self.footprint_bytes));
        let stream = &mut self.streams[cpu];

        let (start, slot) = match self.pattern {
            TrafficPattern::Stream => (window, stream.next_idx % slots),
            TrafficPattern::Random => (window, stream.rng.gen_range(0..slots)),
            TrafficPattern::Hot => (self.base_addr, stream.rng.gen_range(0..self.hot_blocks)),
        };
        let address = start.wrapping_add(slot.wrapping_mul(self.stride_bytes));
        stream.next_idx += 1;

        let roll: f64 = stream.rng.gen();
        let op = if roll < self.write_ratio {
            PatternOp::Write
        } else if roll < self.write_ratio + self.prefetch_ratio {
            PatternOp::Prefetch
        } else {
            PatternOp::Read
        };
        TrafficOp { op, address }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pattern: TrafficPattern) -> TrafficConfig {
        TrafficConfig {
            pattern,
            base_addr: 0x1000_0000,
            footprint_bytes: 0x1000,
            stride_bytes: 0x40,
            write_ratio: 0.0,
            ..TrafficConfig::default()
        }
    }

    #[test]
    fn stream_walks_and_wraps_per_cpu_window() {
        let mut engine = PatternEngine::new(&config(TrafficPattern::Stream), 2);
        assert_eq!(engine.next(0).address, 0x1000_0000);
        assert_eq!(engine.next(0).address, 0x1000_0040);
        assert_eq!(engine.next(1).address, 0x1000_1000);
        for _ in 2..64 {
            engine.next(0);
        }
        assert_eq!(engine.next(0).address, 0x1000_0000);
    }

    #[test]
    fn random_stays_inside_window_and_is_seeded() {
        let cfg = config(TrafficPattern::Random);
        let mut a = PatternEngine::new(&cfg, 1);
        let mut b = PatternEngine::new(&cfg, 1);
        for _ in 0..256 {
            let op = a.next(0);
            assert_eq!(op, b.next(0));
            assert!((0x1000_0000..0x1000_1000).contains(&op.address));
            assert_eq!(op.address % 0x40, 0);
        }
    }

    #[test]
    fn hot_blocks_are_shared_across_cpus() {
        let cfg = TrafficConfig {
            hot_blocks: 2,
            ..config(TrafficPattern::Hot)
        };
        let mut engine = PatternEngine::new(&cfg, 2);
        for cpu in [0, 1, 0, 1] {
            let addr = engine.next(cpu).address;
            assert!(addr == 0x1000_0000 || addr == 0x1000_0040);
        }
    }

    #[test]
    fn op_mix_follows_ratios() {
        let all_writes = TrafficConfig {
            write_ratio: 1.0,
            ..config(TrafficPattern::Stream)
        };
        let mut engine = PatternEngine::new(&all_writes, 1);
        assert!((0..32).all(|_| engine.next(0).op.is_store()));

        let all_prefetch = TrafficConfig {
            prefetch_ratio: 1.0,
            ..config(TrafficPattern::Stream)
        };
        let mut engine = PatternEngine::new(&all_prefetch, 1);
        assert!((0..32).all(|_| engine.next(0).op == PatternOp::Prefetch));
    }

    #[test]
    fn windows_near_the_top_wrap_around() {
        let cfg = TrafficConfig {
            base_addr: u64::MAX - 0x7ff,
            footprint_bytes: u64::MAX / 2,
            stride_bytes: 0x40,
            write_ratio: 0.0,
            ..TrafficConfig::default()
        };
        let mut engine = PatternEngine::new(&cfg, 3);
        assert_eq!(engine.next(0).address, u64::MAX - 0x7ff);
        assert_eq!(engine.next(0).address, u64::MAX - 0x7bf);
        assert_eq!(
            engine.next(2).address,
            (u64::MAX - 0x7ff).wrapping_add(2u64.wrapping_mul(u64::MAX / 2))
        );
        for _ in 0..64 {
            engine.next(1);
        }
    }
}
