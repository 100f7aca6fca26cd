//! Internal random number generator implementation based on PCG32.
//!
//! The session draws client keys and random car assignments from here. A seeded
//! generator makes a whole cup reproducible, which the tests rely on.
//!
//! Reference: <https://www.pcg-random.org/>
//!
//! # Usage
//!
//! ```rust
//! use pitlane::rng::{Pcg32, Rng, SeedableRng};
//!
//! let mut rng = Pcg32::seed_from_u64(12345);
//! let key = rng.next_u64();
//! let model = rng.gen_range_usize(0..3);
//! assert!(model < 3);
//! # let _ = key;
//! ```

use crate::{
    report_violation,
    telemetry::{ViolationKind, ViolationSeverity},
};

/// PCG32 random number generator.
///
/// PCG-XSH-RR with 64-bit state. NOT cryptographically secure: client keys drawn from
/// it tell clients apart, they do not authenticate them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

/// Default increment for single-stream PCG32.
const PCG_DEFAULT_INCREMENT: u64 = 1442695040888963407;

/// Multiplier constant for the LCG step.
const PCG_MULTIPLIER: u64 = 6364136223846793005;

impl Pcg32 {
    /// Creates a new PCG32 generator with the given state and stream.
    #[must_use]
    pub const fn new(state: u64, stream: u64) -> Self {
        // The increment must be odd
        let inc = (stream << 1) | 1;
        let mut pcg = Self { state: 0, inc };
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg.state = pcg.state.wrapping_add(state);
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg
    }

    /// Generates the next 32-bit random value.
    #[inline]
    #[must_use]
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc);
        // XSH-RR output permutation
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generates the next 64-bit random value by combining two 32-bit values.
    #[inline]
    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next_u32());
        let low = u64::from(self.next_u32());
        (high << 32) | low
    }
}

/// Trait for seeding random number generators.
pub trait SeedableRng: Sized {
    /// Creates a new RNG seeded from a 64-bit value.
    #[must_use]
    fn seed_from_u64(seed: u64) -> Self;

    /// Creates a new RNG seeded from the system clock.
    #[must_use]
    fn from_entropy() -> Self;
}

impl SeedableRng for Pcg32 {
    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed, PCG_DEFAULT_INCREMENT)
    }

    fn from_entropy() -> Self {
        Self::seed_from_u64(clock_entropy_seed())
    }
}

fn clock_entropy_seed() -> u64 {
    let nanos = web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    // Fold the 128-bit nanosecond count so both halves contribute.
    (nanos as u64) ^ ((nanos >> 64) as u64).rotate_left(17)
}

/// Trait for random number generation.
pub trait Rng {
    /// Returns the next 32-bit random value.
    fn next_u32(&mut self) -> u32;

    /// Returns the next 64-bit random value.
    fn next_u64(&mut self) -> u64;

    /// Generates a random `usize` value in the given range `[low, high)`.
    ///
    /// # Empty Range Behavior
    /// If `range.is_empty()`, reports a violation via telemetry and returns `range.start`.
    fn gen_range_usize(&mut self, range: std::ops::Range<usize>) -> usize {
        let span = range.end.wrapping_sub(range.start);
        if range.is_empty() {
            report_violation!(
                ViolationSeverity::Error,
                ViolationKind::Configuration,
                "gen_range_usize called with empty range [{}..{})",
                range.start,
                range.end
            );
            return range.start;
        }

        let span64 = span as u64;
        // Rejection sampling to avoid modulo bias
        let threshold = span64.wrapping_neg() % span64;
        loop {
            let random_value = self.next_u64();
            if random_value >= threshold {
                return range.start.wrapping_add((random_value % span64) as usize);
            }
        }
    }
}

impl Rng for Pcg32 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        Self::next_u32(self)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        Self::next_u64(self)
    }
}
