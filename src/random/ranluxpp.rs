//! RANLUX++, the linear congruential formulation of RANLUX by A. Sibidanov, "A revision of the
//! subtract-with-borrow random number generators" (Comput. Phys. Commun. 221 (2017) 299).

use super::uint576::{Uint576, MULTIPLIER};
use super::{impl_rng_core, CounterEngine};
use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;

/// Number of output words per LCG step.
const WORDS_PER_STEP: u64 = 9;

/// Default exponent of the multiplier, giving the highest luxury level.
pub const DEFAULT_EXPONENT: u64 = 2048;

/// Smallest exponent that is accepted.
pub const MIN_EXPONENT: u64 = 24;

/// `A^(2^k)` for `k = 0..64`.
type PowerTable = [Uint576; 64];

fn power_table(multiplier: Uint576) -> PowerTable {
    let mut table = [Uint576::ONE; 64];
    let mut power = multiplier;
    for entry in &mut table {
        *entry = power;
        power = power.square();
    }
    table
}

/// Returns `base * A^steps` using the table of squared powers.
fn jump(base: &Uint576, table: &PowerTable, steps: u64) -> Uint576 {
    let mut result = *base;
    let mut remaining = steps;
    let mut bit = 0;
    while remaining != 0 {
        if remaining & 1 == 1 {
            result = result.mul_mod(&table[bit]);
        }
        remaining >>= 1;
        bit += 1;
    }
    result
}

/// The RANLUX++ engine with 64-bit output words.
///
/// The state is the LCG value $x_k = x_\mathrm{seed} A^k \bmod m$ with $A = a^p$; the nine
/// limbs of each $x_k$, $k \geq 1$, are the next nine output words. Seeds select disjoint
/// streams by jumping $2^{96}$ steps per seed unit from $x_0 = 1$. Discarding is lazy: the
/// jump is performed in $O(\log n)$ multiplications when the next word is requested.
#[derive(Clone)]
pub struct Ranluxpp {
    seed: u64,
    exponent: u64,
    powers: Arc<PowerTable>,
    origin: Uint576,
    state: Uint576,
    steps: u64,
    position: u64,
}

impl Ranluxpp {
    /// Creates an engine for `seed` with multiplier $A = a^p$ where `p` is `exponent`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidExponent`] if `exponent` is smaller than 24.
    pub fn with_exponent(seed: u64, exponent: u64) -> Result<Self, ConfigError> {
        if exponent < MIN_EXPONENT {
            return Err(ConfigError::InvalidExponent(exponent));
        }

        let powers = power_table(MULTIPLIER.pow(exponent));

        // A^(2^96)
        let mut stream_stride = powers[63];
        for _ in 63..96 {
            stream_stride = stream_stride.square();
        }
        let origin = stream_stride.pow(seed);

        Ok(Self {
            seed,
            exponent,
            powers: Arc::new(powers),
            origin,
            state: origin,
            steps: 0,
            position: 0,
        })
    }

    /// Returns the exponent `p` of the multiplier $A = a^p$.
    pub const fn exponent(&self) -> u64 {
        self.exponent
    }

    fn seek(&mut self, steps: u64) {
        if steps >= self.steps {
            self.state = jump(&self.state, &self.powers, steps - self.steps);
        } else {
            self.state = jump(&self.origin, &self.powers, steps);
        }
        self.steps = steps;
    }
}

impl CounterEngine for Ranluxpp {
    type Word = u64;

    const WORD_BITS: u32 = 64;

    fn with_seed(seed: u64) -> Self {
        match Self::with_exponent(seed, DEFAULT_EXPONENT) {
            Ok(engine) => engine,
            Err(_) => unreachable!("the default exponent is valid"),
        }
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn next_word(&mut self) -> u64 {
        let step = self.position / WORDS_PER_STEP + 1;
        if step != self.steps {
            self.seek(step);
        }
        let word = self.state.0[(self.position % WORDS_PER_STEP) as usize];
        self.position = self.position.wrapping_add(1);
        word
    }

    fn discard(&mut self, n: u64) {
        self.position = self.position.wrapping_add(n);
    }
}

impl fmt::Debug for Ranluxpp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ranluxpp")
            .field("seed", &self.seed)
            .field("exponent", &self.exponent)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl_rng_core!(Ranluxpp);

#[cfg(test)]
mod tests {
    use super::*;

    fn first_words(seed: u64) -> ([u64; 3], u64) {
        let mut engine = Ranluxpp::with_seed(seed);
        let words = [engine.next_word(), engine.next_word(), engine.next_word()];
        engine.discard(6);
        (words, engine.next_word())
    }

    #[test]
    fn reference_words() {
        assert_eq!(
            first_words(0),
            (
                [0xed7f_aa90_747a_aad9, 0x4cec_2c78_af55_c101, 0xe64d_cb31_c482_28ec],
                0xb40a_094d_f59e_7813
            )
        );
        assert_eq!(
            first_words(1),
            (
                [0xf209_59a6_68a3_fa5f, 0x0bd8_22c1_4908_c4c1, 0xc19c_29fb_b45a_6fd7],
                0x92af_8c6e_15bb_c6f2
            )
        );
        assert_eq!(
            first_words(12345),
            (
                [0x24a9_9be4_93fe_16bc, 0x2c86_1bc1_138b_8e25, 0xd7ec_bc57_76db_702e],
                0x40c1_8f7f_4b5b_68e3
            )
        );
    }

    #[test]
    fn small_exponent_is_rejected() {
        assert_eq!(
            Ranluxpp::with_exponent(0, 23).unwrap_err(),
            ConfigError::InvalidExponent(23)
        );
        let engine = Ranluxpp::with_exponent(0, 24).unwrap();
        assert_eq!(engine.exponent(), 24);
    }

    #[test]
    fn seeking_backwards_after_clone() {
        let mut ahead = Ranluxpp::with_seed(4);
        ahead.discard(1000);
        let word = ahead.next_word();

        // a clone of an advanced engine rewinds from the origin
        let mut rewound = ahead.clone();
        rewound.position = 0;
        let mut fresh = Ranluxpp::with_seed(4);
        assert_eq!(rewound.next_word(), fresh.next_word());

        fresh.discard(999);
        assert_eq!(fresh.next_word(), word);
    }

    #[test]
    fn large_discard() {
        let mut engine = Ranluxpp::with_seed(8);
        engine.discard(u64::from(u32::MAX) * 9 + 4);
        let word = engine.next_word();

        let mut other = Ranluxpp::with_seed(8);
        other.discard(u64::from(u32::MAX) * 9);
        other.discard(4);
        assert_eq!(other.next_word(), word);
    }

    #[test]
    fn position_wraps_around() {
        let mut engine = Ranluxpp::at(1, u64::MAX);
        let last = engine.next_word();
        assert_eq!(engine.position(), 0);
        assert_eq!(engine.next_word(), Ranluxpp::with_seed(1).next_word());

        let mut other = Ranluxpp::at(1, u64::MAX - 1);
        other.discard(1);
        assert_eq!(other.next_word(), last);

        let mut engine = Ranluxpp::at(1, 5);
        engine.discard(u64::MAX);
        assert_eq!(engine.position(), 4);
        assert_eq!(engine.next_word(), Ranluxpp::at(1, 4).next_word());
    }
}
