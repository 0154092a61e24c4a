//! Counter-based pseudo-random engines.
//!
//! The output of every engine in this module is a pure function of a `(seed, position)` pair.
//! Skipping ahead with [`CounterEngine::discard`] is cheap, which allows each event of a Monte
//! Carlo run to draw its random numbers from an engine positioned exactly where a sequential run
//! would be, independently of how the events are distributed among threads.
//!
//! All engines implement [`RngCore`] and [`SeedableRng`] from the `rand` crate, so they can be
//! used with its distributions as well.

mod ranluxpp;
mod squares;
mod uint576;

pub use ranluxpp::Ranluxpp;
pub use squares::{Squares3, Squares4};

use std::fmt::Debug;

/// A splittable random engine whose state is a seed and a position in its output stream.
pub trait CounterEngine: Clone + Debug + Send + Sync {
    /// The raw output word.
    type Word: Copy + Into<u64>;

    /// Number of random bits in each [`Self::Word`].
    const WORD_BITS: u32;

    /// Number of words consumed by [`CounterEngine::uniform_f64`].
    const WORDS_PER_F64: u64 = if Self::WORD_BITS >= 64 { 1 } else { 2 };

    /// Creates an engine at position zero of the stream selected by `seed`. Every seed,
    /// including zero, selects a well-mixed stream.
    fn with_seed(seed: u64) -> Self;

    /// Returns the seed the engine was created with.
    fn seed(&self) -> u64;

    /// Returns the number of words generated or discarded so far.
    fn position(&self) -> u64;

    /// Returns the next word and advances the position by one.
    fn next_word(&mut self) -> Self::Word;

    /// Advances the position by `n` words without generating them. The result is the same as
    /// calling [`CounterEngine::next_word`] `n` times. Positions wrap around modulo $2^{64}$.
    fn discard(&mut self, n: u64);

    /// Returns a uniformly distributed number in $[0, 1)$ with 52 random mantissa bits.
    fn uniform_f64(&mut self) -> f64 {
        let bits = if Self::WORD_BITS >= 64 {
            self.next_word().into()
        } else {
            let hi: u64 = self.next_word().into();
            let lo: u64 = self.next_word().into();
            (hi << 32) | lo
        };

        u64_to_unit_f64(bits)
    }

    /// Returns a uniformly distributed number in $[0, 1)$ built from a single word.
    fn uniform_f32(&mut self) -> f32 {
        let word: u64 = self.next_word().into();
        u64_to_unit_f32(word << (64 - Self::WORD_BITS))
    }

    /// Fills `buffer` with uniform numbers in $[0, 1)$.
    fn fill_uniform(&mut self, buffer: &mut [f64]) {
        for x in buffer {
            *x = self.uniform_f64();
        }
    }

    /// Creates an engine for `seed` positioned at `position`.
    fn at(seed: u64, position: u64) -> Self {
        let mut engine = Self::with_seed(seed);
        engine.discard(position);
        engine
    }
}

/// The SplitMix64 finaliser, used to turn user seeds into well-mixed keys.
pub const fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Maps the upper 52 bits of `bits` onto $[0, 1)$ by filling the mantissa of a number in
/// $[1, 2)$ and subtracting one. The result is never `1.0`.
#[inline]
pub fn u64_to_unit_f64(bits: u64) -> f64 {
    f64::from_bits(0x3ff0_0000_0000_0000 | (bits >> 12)) - 1.0
}

/// Single-precision version of [`u64_to_unit_f64`], using the upper 23 bits.
#[inline]
pub fn u64_to_unit_f32(bits: u64) -> f32 {
    f32::from_bits(0x3f80_0000 | (bits >> 41) as u32) - 1.0
}

/// Implements `rand::RngCore` and `rand::SeedableRng` on top of `CounterEngine`.
macro_rules! impl_rng_core {
    ($engine:ty) => {
        impl rand::RngCore for $engine {
            fn next_u32(&mut self) -> u32 {
                let word: u64 = $crate::random::CounterEngine::next_word(self).into();
                (word >> (<Self as $crate::random::CounterEngine>::WORD_BITS - 32)) as u32
            }

            fn next_u64(&mut self) -> u64 {
                if <Self as $crate::random::CounterEngine>::WORD_BITS >= 64 {
                    $crate::random::CounterEngine::next_word(self).into()
                } else {
                    let hi: u64 = $crate::random::CounterEngine::next_word(self).into();
                    let lo: u64 = $crate::random::CounterEngine::next_word(self).into();
                    (hi << 32) | lo
                }
            }

            fn fill_bytes(&mut self, dest: &mut [u8]) {
                for chunk in dest.chunks_mut(8) {
                    let bytes = self.next_u64().to_le_bytes();
                    chunk.copy_from_slice(&bytes[..chunk.len()]);
                }
            }

            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                self.fill_bytes(dest);
                Ok(())
            }
        }

        impl rand::SeedableRng for $engine {
            type Seed = [u8; 8];

            fn from_seed(seed: Self::Seed) -> Self {
                <Self as $crate::random::CounterEngine>::with_seed(u64::from_le_bytes(seed))
            }

            fn seed_from_u64(state: u64) -> Self {
                <Self as $crate::random::CounterEngine>::with_seed(state)
            }
        }
    };
}

pub(crate) use impl_rng_core;
