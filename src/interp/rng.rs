//! Deterministic random stream backing `rand` and `random`.
//!
//! SplitMix64: the same seed yields the same sequence on every platform.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStream {
    state: u64,
}

impl RngStream {
    pub const fn new(seed: u64) -> Self {
        // SplitMix64 needs a non-zero state.
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        mix(self.state)
    }

    /// Uniform in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        // Upper 53 bits fill the f64 mantissa.
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

const fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
